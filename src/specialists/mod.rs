//! Specialist services: stateless evaluators invoked by the orchestrator.
//!
//! The orchestrator depends only on the three traits below; each backing
//! implementation is one adapter (built-in heuristics, external command,
//! or a test double).

mod command;
mod generator;
mod heuristic;
mod json_utils;

pub use command::CommandSpecialist;
pub use generator::{AssemblingGenerator, assemble_document};
pub use heuristic::{CriteriaValidator, HeuristicEvaluator};
pub use json_utils::extract_json_block;

pub(crate) use heuristic::tokenize;

use async_trait::async_trait;

use crate::config::{Section, SectionCatalog};
use crate::error::SpecialistServiceError;
use crate::models::{ConfidenceAssessment, RequirementsDocument, ValidationReport};
use crate::orchestrator::WorkflowRun;

/// Input shared by the evaluator and the validator for one attempt
#[derive(Debug, Clone, Copy)]
pub struct EvaluationRequest<'a> {
    pub section: &'a Section,
    /// The prompt the human answered
    pub prompt: &'a str,
    pub answer: &'a str,
    /// Knowledge snippets used for the prompt, if any
    pub context: &'a [String],
}

/// Scores how complete and clear an answer is
#[async_trait]
pub trait ConfidenceEvaluator: Send + Sync {
    async fn evaluate(
        &self,
        request: &EvaluationRequest<'_>,
    ) -> Result<ConfidenceAssessment, SpecialistServiceError>;
}

/// Lists concrete problems with an answer, independent of its score
#[async_trait]
pub trait ResponseValidator: Send + Sync {
    async fn validate(
        &self,
        request: &EvaluationRequest<'_>,
    ) -> Result<ValidationReport, SpecialistServiceError>;
}

/// Builds the final document from a completed run. Must be deterministic.
#[async_trait]
pub trait DocumentGenerator: Send + Sync {
    async fn generate(
        &self,
        run: &WorkflowRun,
        catalog: &SectionCatalog,
    ) -> Result<RequirementsDocument, SpecialistServiceError>;
}
