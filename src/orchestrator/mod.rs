pub mod engine;
pub mod prompt;
pub mod review;
pub mod run;

pub use engine::{
    AbortReason, AbortedRun, DEFAULT_PROJECT_NAME, RunOutcome, RunReport, WorkflowOrchestrator,
};
pub use prompt::{PromptBuilder, is_approval, is_confirmation, progress_header};
pub use review::{ReviewDecision, SectionEdit, parse_review_reply};
pub use run::{RunStatus, WorkflowRun};
