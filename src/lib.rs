pub mod config;
pub mod error;
pub mod handoff;
pub mod knowledge;
pub mod models;
pub mod orchestrator;
pub mod output;
pub mod slug;
pub mod specialists;

// Re-export main types
pub use config::{CliConfig, SectionCatalog, WorkflowConfig};
pub use error::{
    HandoffProtocolError, PersistenceError, RetrievalError, SpecialistServiceError, WorkflowError,
};
pub use handoff::{Handoff, HandoffMode, HandoffRequest, HandoffResponse, HumanChannel};
pub use knowledge::{KnowledgeRetriever, LocalKnowledgeBase};
pub use models::{RequirementsDocument, SectionState, SectionStatus};
pub use orchestrator::{RunOutcome, RunReport, WorkflowOrchestrator, WorkflowRun};
pub use output::{FileDocumentSink, PersistenceSink};
pub use specialists::{ConfidenceEvaluator, DocumentGenerator, ResponseValidator};

// Re-export slug utilities
pub use slug::slugify;
