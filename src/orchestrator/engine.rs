//! WorkflowOrchestrator - drives one interview from first section to finalized document.
//!
//! Sections run strictly in catalog order. Each answer is scored and
//! validated concurrently; low-confidence answers get a refined follow-up
//! until the retry budget is spent, after which the answer is force-accepted.
//! The only blocking point is the handoff, which is raced against the
//! cancellation token.

use std::future::Future;
use std::time::Duration;

use futures::future::join;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{Section, SectionCatalog, WorkflowConfig};
use crate::error::{HandoffProtocolError, RetrievalError, SpecialistServiceError, WorkflowError};
use crate::handoff::{Handoff, HandoffRequest, HandoffResponse};
use crate::knowledge::KnowledgeRetriever;
use crate::models::{
    Acceptance, ConfidenceAssessment, IssueKind, RequirementsDocument, SectionState,
    ValidationReport,
};
use crate::output::PersistenceSink;
use crate::specialists::{
    AssemblingGenerator, ConfidenceEvaluator, DocumentGenerator, EvaluationRequest,
    ResponseValidator, assemble_document,
};

use super::prompt::{PromptBuilder, is_confirmation};
use super::review::{ReviewDecision, parse_review_reply};
use super::run::WorkflowRun;

pub const DEFAULT_PROJECT_NAME: &str = "Unnamed Project";

// ============================================================================
// Results
// ============================================================================

/// Why a run stopped before finalizing
#[derive(Debug)]
pub enum AbortReason {
    /// The cancellation token fired
    Cancelled,
    /// The human channel failed mid-wait
    ChannelFailure(HandoffProtocolError),
}

#[derive(Debug)]
pub struct RunReport {
    pub run: WorkflowRun,
    pub document: RequirementsDocument,
    /// Identifier returned by the persistence sink, if the save succeeded
    pub document_id: Option<String>,
    /// Recoverable problems (generator fallback, persistence failure)
    pub warnings: Vec<String>,
}

/// Partial run kept for diagnostics; no document is ever produced for it
#[derive(Debug)]
pub struct AbortedRun {
    pub run: WorkflowRun,
    pub reason: AbortReason,
}

#[derive(Debug)]
pub enum RunOutcome {
    Finalized(RunReport),
    Aborted(AbortedRun),
}

impl RunOutcome {
    pub fn run(&self) -> &WorkflowRun {
        match self {
            RunOutcome::Finalized(report) => &report.run,
            RunOutcome::Aborted(aborted) => &aborted.run,
        }
    }

    pub fn is_finalized(&self) -> bool {
        matches!(self, RunOutcome::Finalized(_))
    }

    /// The finished document, or the error that aborted the run
    pub fn into_document(self) -> Result<RequirementsDocument, WorkflowError> {
        match self {
            RunOutcome::Finalized(report) => Ok(report.document),
            RunOutcome::Aborted(AbortedRun {
                reason: AbortReason::ChannelFailure(e),
                ..
            }) => Err(WorkflowError::Handoff(e)),
            RunOutcome::Aborted(_) => Err(WorkflowError::Cancelled),
        }
    }
}

/// Result of one evaluation round, before it is applied to the section
struct Assessment {
    confidence: Result<ConfidenceAssessment, SpecialistServiceError>,
    validation: Result<ValidationReport, SpecialistServiceError>,
}

// ============================================================================
// Orchestrator
// ============================================================================

pub struct WorkflowOrchestrator {
    handoff: Handoff,
    evaluator: Box<dyn ConfidenceEvaluator>,
    validator: Box<dyn ResponseValidator>,
    generator: Box<dyn DocumentGenerator>,
    retriever: Option<Box<dyn KnowledgeRetriever>>,
    sink: Option<Box<dyn PersistenceSink>>,
    prompts: PromptBuilder,
    project_name: String,
    cancel: CancellationToken,
}

impl WorkflowOrchestrator {
    pub fn new(
        handoff: Handoff,
        evaluator: Box<dyn ConfidenceEvaluator>,
        validator: Box<dyn ResponseValidator>,
    ) -> Self {
        Self {
            handoff,
            evaluator,
            validator,
            generator: Box::new(AssemblingGenerator),
            retriever: None,
            sink: None,
            prompts: PromptBuilder::new(),
            project_name: DEFAULT_PROJECT_NAME.to_string(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_project_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !name.trim().is_empty() {
            self.project_name = name.trim().to_string();
        }
        self
    }

    pub fn with_generator(mut self, generator: Box<dyn DocumentGenerator>) -> Self {
        self.generator = generator;
        self
    }

    pub fn with_retriever(mut self, retriever: Box<dyn KnowledgeRetriever>) -> Self {
        self.retriever = Some(retriever);
        self
    }

    pub fn with_sink(mut self, sink: Box<dyn PersistenceSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Run a complete interview over `catalog`.
    ///
    /// Returns `Err` only for an invalid catalog or configuration. Channel
    /// failure and cancellation produce [`RunOutcome::Aborted`].
    pub async fn start_run(
        &mut self,
        catalog: &SectionCatalog,
        config: &WorkflowConfig,
    ) -> Result<RunOutcome, WorkflowError> {
        config.validate().map_err(WorkflowError::InvalidConfig)?;
        catalog.validate().map_err(WorkflowError::InvalidCatalog)?;

        let mut run = WorkflowRun::new(self.project_name.clone(), catalog);
        info!(
            "Starting run {} ({} sections, threshold {:.2}, max retries {})",
            run.run_id,
            catalog.len(),
            config.confidence_threshold,
            config.max_retries
        );

        let baseline = self.handoff.exchanges();
        let result = self.execute(&mut run, catalog, config).await;
        run.exchanges = self.handoff.exchanges() - baseline;

        let document = match result {
            Ok(document) => document,
            Err(reason) => {
                run.abort();
                match &reason {
                    AbortReason::Cancelled => warn!("Run {} cancelled", run.run_id),
                    AbortReason::ChannelFailure(e) => {
                        warn!("Run {} aborted: {}", run.run_id, e)
                    }
                }
                return Ok(RunOutcome::Aborted(AbortedRun { run, reason }));
            }
        };

        let mut warnings = run.annotations.clone();
        let document_id = match &self.sink {
            Some(sink) => match sink.save(&document).await {
                Ok(id) => {
                    info!("Saved document {}", id);
                    Some(id)
                }
                Err(e) => {
                    warn!("Failed to save document: {}", e);
                    warnings.push(format!("Document was not saved: {}", e));
                    None
                }
            },
            None => None,
        };

        info!(
            "Run {} finalized: {}/{} sections completed in {} exchanges",
            run.run_id,
            document.completed_sections(),
            catalog.len(),
            run.exchanges
        );

        Ok(RunOutcome::Finalized(RunReport {
            run,
            document,
            document_id,
            warnings,
        }))
    }

    async fn execute(
        &mut self,
        run: &mut WorkflowRun,
        catalog: &SectionCatalog,
        config: &WorkflowConfig,
    ) -> Result<RequirementsDocument, AbortReason> {
        while !run.is_exhausted() && !run.terminated {
            if self.cancel.is_cancelled() {
                return Err(AbortReason::Cancelled);
            }
            let index = run.current_index();
            if self.run_section(run, catalog, config, index).await? {
                run.terminated = true;
            }
            run.advance();
        }

        run.begin_review();
        info!("All sections answered, generating document for review");
        let document = self.generate(run, catalog, config).await;

        let prompt = self.prompts.review(&document, catalog);
        let response = self.ask(HandoffRequest::continue_with(prompt)).await?;
        let reply = response.text().unwrap_or_default();

        let document = match parse_review_reply(reply, catalog) {
            ReviewDecision::Approve => {
                info!("Document approved");
                document
            }
            ReviewDecision::Edit(edits) => {
                info!("Applying {} review edit(s)", edits.len());
                for edit in edits {
                    self.apply_edit(run, catalog, config, &edit.section_id, edit.answer)
                        .await?;
                }
                self.generate(run, catalog, config).await
            }
        };

        run.finalize();
        Ok(document)
    }

    /// Interview one section until it is complete or skipped.
    ///
    /// Returns true when the human's reply came back as a terminate response,
    /// which ends the section loop.
    async fn run_section(
        &mut self,
        run: &mut WorkflowRun,
        catalog: &SectionCatalog,
        config: &WorkflowConfig,
        index: usize,
    ) -> Result<bool, AbortReason> {
        let section = &catalog.sections[index];
        let max_attempts = config.max_attempts();
        let terminal = section.break_on_complete;
        info!(
            "Section {}/{}: {}",
            index + 1,
            catalog.len(),
            section.title
        );

        let snippets = self.retrieve_knowledge(run, catalog, index, section, config).await;
        if !snippets.is_empty() {
            run.knowledge_used = true;
        }
        let base = self
            .prompts
            .section_prompt(run, catalog, index, section, &snippets);

        let Some(state) = run.section_at_mut(index) else {
            return Ok(false);
        };

        let mut prompt = base.clone();
        let mut confirming = false;
        loop {
            state.begin_attempt();
            let request = if terminal {
                HandoffRequest::terminate_with(prompt.clone())
            } else {
                HandoffRequest::continue_with(prompt.clone())
            };
            let response = self.ask(request).await?;
            let ends_run = response.is_terminal();
            let answer = response.text().unwrap_or_default().to_string();

            if confirming && is_confirmation(&answer) {
                info!("Section {} confirmed by human", section.id);
                state.complete(Acceptance::Confirmed);
                return Ok(ends_run);
            }

            if answer.trim().is_empty() && !section.required {
                info!("Section {} skipped", section.id);
                state.skip();
                return Ok(ends_run);
            }

            state.receive_answer(answer.clone());
            let assessment = self
                .assess_cancellable(section, &prompt, &answer, &snippets, config)
                .await?;
            let verdict =
                record_assessment(state, &section.id, assessment, config.confidence_threshold);

            if verdict.passes {
                info!(
                    "Section {} complete after {} attempt(s)",
                    section.id, state.attempts
                );
                state.complete(Acceptance::Confident);
                return Ok(ends_run);
            }

            // A terminate response admits no follow-up
            if ends_run {
                let reason = low_confidence_reason(
                    state,
                    config.confidence_threshold,
                    verdict.service_failed,
                );
                state.annotate(IssueKind::LowConfidence, reason);
                state.complete(Acceptance::Final);
                return Ok(true);
            }

            if state.attempts >= max_attempts {
                let reason = low_confidence_reason(
                    state,
                    config.confidence_threshold,
                    verdict.service_failed,
                );
                warn!("Section {} force-accepted: {}", section.id, reason);
                state.annotate(IssueKind::LowConfidence, reason);
                state.complete(Acceptance::Forced);
                return Ok(false);
            }

            state.request_follow_up();
            confirming = verdict.service_failed;
            prompt = if verdict.service_failed {
                debug!("Section {} needs human confirmation", section.id);
                self.prompts.confirmation(&base, state)
            } else {
                debug!("Section {} needs follow-up", section.id);
                self.prompts
                    .follow_up(&base, state, state.attempts + 1, max_attempts)
            };
        }
    }

    /// Re-evaluate a section edited during review. No further prompts are issued.
    async fn apply_edit(
        &mut self,
        run: &mut WorkflowRun,
        catalog: &SectionCatalog,
        config: &WorkflowConfig,
        section_id: &str,
        answer: String,
    ) -> Result<(), AbortReason> {
        let Some(index) = catalog.iter().position(|s| s.id == section_id) else {
            return Ok(());
        };
        let section = &catalog.sections[index];
        let prompt = self.prompts.render_question(run, catalog, index, section);

        let assessment = self
            .assess_cancellable(section, &prompt, &answer, &[], config)
            .await?;

        let Some(state) = run.section_at_mut(index) else {
            return Ok(());
        };
        state.reopen(answer);
        let verdict =
            record_assessment(state, &section.id, assessment, config.confidence_threshold);

        if verdict.passes {
            state.complete(Acceptance::Confident);
        } else {
            let reason =
                low_confidence_reason(state, config.confidence_threshold, verdict.service_failed);
            state.annotate(IssueKind::LowConfidence, reason);
            state.complete(Acceptance::Final);
        }
        info!("Section {} updated during review", section.id);
        Ok(())
    }

    /// One handoff exchange, abandoned if the run is cancelled while waiting.
    async fn ask(&mut self, request: HandoffRequest) -> Result<HandoffResponse, AbortReason> {
        let cancel = self.cancel.clone();
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(AbortReason::Cancelled),
            result = self.handoff.request_input(request) => {
                result.map_err(AbortReason::ChannelFailure)
            }
        }
    }

    async fn assess_cancellable(
        &self,
        section: &Section,
        prompt: &str,
        answer: &str,
        context: &[String],
        config: &WorkflowConfig,
    ) -> Result<Assessment, AbortReason> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(AbortReason::Cancelled),
            assessment = self.assess(section, prompt, answer, context, config) => Ok(assessment),
        }
    }

    /// Run the evaluator and the validator concurrently, each under its timeout.
    async fn assess(
        &self,
        section: &Section,
        prompt: &str,
        answer: &str,
        context: &[String],
        config: &WorkflowConfig,
    ) -> Assessment {
        let request = EvaluationRequest {
            section,
            prompt,
            answer,
            context,
        };
        let secs = config.specialist_timeout_secs;

        let (confidence, validation) = join(
            bounded(
                "confidence evaluator",
                secs,
                self.evaluator.evaluate(&request),
            ),
            bounded(
                "response validator",
                secs,
                self.validator.validate(&request),
            ),
        )
        .await;

        let confidence = confidence.and_then(|assessment| {
            if (0.0..=1.0).contains(&assessment.score) {
                Ok(assessment)
            } else {
                Err(SpecialistServiceError::Malformed {
                    service: "confidence evaluator",
                    reason: format!("score {} outside [0, 1]", assessment.score),
                })
            }
        });

        Assessment {
            confidence,
            validation,
        }
    }

    /// Best-effort knowledge lookup; every failure degrades to no snippets.
    async fn retrieve_knowledge(
        &self,
        run: &WorkflowRun,
        catalog: &SectionCatalog,
        index: usize,
        section: &Section,
        config: &WorkflowConfig,
    ) -> Vec<String> {
        if !config.knowledge_enabled {
            return Vec::new();
        }
        let Some(retriever) = &self.retriever else {
            return Vec::new();
        };

        let query = self.prompts.render_question(run, catalog, index, section);
        let secs = config.retrieval_timeout_secs;
        let result = timeout(Duration::from_secs(secs), retriever.retrieve(&query))
            .await
            .unwrap_or(Err(RetrievalError::Timeout(secs)));

        match result {
            Ok(snippets) => {
                debug!(
                    "Retrieved {} snippet(s) for section {}",
                    snippets.len(),
                    section.id
                );
                snippets
            }
            Err(e) => {
                warn!("Knowledge retrieval failed for section {}: {}", section.id, e);
                Vec::new()
            }
        }
    }

    /// Generate the document, falling back to plain assembly on failure.
    async fn generate(
        &self,
        run: &mut WorkflowRun,
        catalog: &SectionCatalog,
        config: &WorkflowConfig,
    ) -> RequirementsDocument {
        let result = bounded(
            "document generator",
            config.specialist_timeout_secs,
            self.generator.generate(run, catalog),
        )
        .await;

        match result {
            Ok(document) => document,
            Err(e) => {
                warn!("Document generation failed, assembling directly: {}", e);
                run.annotations
                    .push(format!("Document generator unavailable: {}", e));
                assemble_document(run, catalog)
            }
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Apply `timeout` to a specialist call, mapping expiry to a service error.
async fn bounded<T, F>(service: &'static str, secs: u64, call: F) -> Result<T, SpecialistServiceError>
where
    F: Future<Output = Result<T, SpecialistServiceError>>,
{
    timeout(Duration::from_secs(secs), call)
        .await
        .unwrap_or(Err(SpecialistServiceError::Timeout { service, secs }))
}

/// How an evaluation round turned out for a section
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Verdict {
    /// Both specialists answered, the score meets the threshold and no blocking issue remains
    passes: bool,
    service_failed: bool,
}

/// Record scores and findings on the section and judge the answer.
fn record_assessment(
    state: &mut SectionState,
    section_id: &str,
    assessment: Assessment,
    threshold: f32,
) -> Verdict {
    let mut failed = false;
    let mut confident = false;

    match assessment.confidence {
        Ok(result) => {
            confident = result.meets(threshold);
            state.record_confidence(result.score, result.rationale);
        }
        Err(e) => {
            warn!("Section {}: {}", section_id, e);
            state.annotate(IssueKind::ServiceFailure, e.to_string());
            failed = true;
        }
    }
    match assessment.validation {
        Ok(report) => state.record_validation(&report),
        Err(e) => {
            warn!("Section {}: {}", section_id, e);
            state.annotate(IssueKind::ServiceFailure, e.to_string());
            failed = true;
        }
    }

    Verdict {
        passes: !failed && confident && !state.has_blocking_issues(),
        service_failed: failed,
    }
}

fn low_confidence_reason(state: &SectionState, threshold: f32, service_failed: bool) -> String {
    let attempts = state.attempts;
    match state.confidence_score {
        None => format!(
            "answer could not be assessed; accepted after {} attempt(s)",
            attempts
        ),
        Some(score) if score < threshold => format!(
            "score {:.2} below threshold {:.2} after {} attempt(s)",
            score, threshold, attempts
        ),
        Some(_) if service_failed => format!(
            "answer could not be validated; accepted after {} attempt(s)",
            attempts
        ),
        Some(_) => format!(
            "accepted with unresolved issues after {} attempt(s)",
            attempts
        ),
    }
}
