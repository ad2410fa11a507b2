use async_trait::async_trait;

use crate::config::SectionCatalog;
use crate::error::SpecialistServiceError;
use crate::models::{DocumentEntry, IssueKind, RequirementsDocument, SectionStatus};
use crate::orchestrator::WorkflowRun;

use super::DocumentGenerator;

/// Assemble a document straight from the run's section states.
///
/// Pure: the same run always yields the same document, timestamp included.
pub fn assemble_document(run: &WorkflowRun, catalog: &SectionCatalog) -> RequirementsDocument {
    let entries = catalog
        .iter()
        .filter_map(|section| {
            let state = run.section(&section.id)?;
            let skipped = state.status == SectionStatus::Skipped;
            Some(DocumentEntry {
                section_id: section.id.clone(),
                ordinal: section.ordinal,
                title: section.title.clone(),
                answer: if skipped {
                    String::new()
                } else {
                    state.raw_answer.clone().unwrap_or_default()
                },
                confidence_score: state.confidence_score,
                acceptance: state.acceptance,
                attempts: state.attempts,
                issues: state.validation_issues(),
                issues_resolved: !state.issues.iter().any(|i| i.kind == IssueKind::Blocking),
                skipped,
            })
        })
        .collect();

    RequirementsDocument {
        project_name: run.project_name.clone(),
        generated_at: run.document_timestamp(),
        knowledge_enhanced: run.knowledge_used,
        entries,
    }
}

/// Default generator: plain assembly, no rewriting of answers.
#[derive(Debug, Clone, Default)]
pub struct AssemblingGenerator;

#[async_trait]
impl DocumentGenerator for AssemblingGenerator {
    async fn generate(
        &self,
        run: &WorkflowRun,
        catalog: &SectionCatalog,
    ) -> Result<RequirementsDocument, SpecialistServiceError> {
        Ok(assemble_document(run, catalog))
    }
}
