use std::fmt;

use serde::{Deserialize, Serialize};

use super::assessment::{IssueSeverity, ValidationReport};

// ============================================================================
// Status
// ============================================================================

/// Per-section state machine:
/// `Pending -> AwaitingInput -> Evaluating -> {NeedsFollowUp -> AwaitingInput | Complete | Skipped}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SectionStatus {
    Pending,
    AwaitingInput,
    Evaluating,
    NeedsFollowUp,
    Complete,
    Skipped,
}

impl SectionStatus {
    pub fn is_done(self) -> bool {
        matches!(self, SectionStatus::Complete | SectionStatus::Skipped)
    }
}

/// How a section reached `Complete`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Acceptance {
    /// Score at or above threshold with no blocking issues
    Confident,
    /// Human confirmed the answer after a specialist was unavailable
    Confirmed,
    /// Retry budget exhausted; accepted with issues retained
    Forced,
    /// Last response of the run (terminate-mode handoff or review edit); no follow-up possible
    Final,
}

// ============================================================================
// Issues
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IssueKind {
    /// Validator finding that blocks completion
    Blocking,
    /// Validator finding kept for the document only
    Advisory,
    /// A specialist call failed for this section
    ServiceFailure,
    /// Answer accepted below the confidence threshold
    LowConfidence,
}

impl IssueKind {
    /// Validator findings are replaced on every evaluation; annotations are kept.
    fn is_validator_finding(self) -> bool {
        matches!(self, IssueKind::Blocking | IssueKind::Advisory)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionIssue {
    pub kind: IssueKind,
    pub message: String,
}

impl fmt::Display for SectionIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            IssueKind::Blocking | IssueKind::Advisory => write!(f, "{}", self.message),
            IssueKind::ServiceFailure => write!(f, "[service unavailable] {}", self.message),
            IssueKind::LowConfidence => write!(f, "[low confidence] {}", self.message),
        }
    }
}

// ============================================================================
// Section State
// ============================================================================

/// Mutable progress of one section, owned by a single run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionState {
    pub section_id: String,
    /// Answers requested so far
    pub attempts: u32,
    pub raw_answer: Option<String>,
    /// None until an evaluation succeeds, or after one fails
    pub confidence_score: Option<f32>,
    pub rationale: Option<String>,
    pub issues: Vec<SectionIssue>,
    pub status: SectionStatus,
    pub acceptance: Option<Acceptance>,
}

impl SectionState {
    pub fn new(section_id: impl Into<String>) -> Self {
        Self {
            section_id: section_id.into(),
            attempts: 0,
            raw_answer: None,
            confidence_score: None,
            rationale: None,
            issues: Vec::new(),
            status: SectionStatus::Pending,
            acceptance: None,
        }
    }

    /// Ordered issue descriptions, annotations included.
    pub fn validation_issues(&self) -> Vec<String> {
        self.issues.iter().map(|i| i.to_string()).collect()
    }

    pub fn has_blocking_issues(&self) -> bool {
        self.issues.iter().any(|i| i.kind == IssueKind::Blocking)
    }

    /// Request another answer from the human.
    pub fn begin_attempt(&mut self) {
        self.attempts += 1;
        self.status = SectionStatus::AwaitingInput;
    }

    /// Store the human's answer and move to evaluation.
    pub fn receive_answer(&mut self, answer: impl Into<String>) {
        self.raw_answer = Some(answer.into());
        self.confidence_score = None;
        self.rationale = None;
        self.status = SectionStatus::Evaluating;
    }

    pub fn record_confidence(&mut self, score: f32, rationale: impl Into<String>) {
        self.confidence_score = Some(score);
        self.rationale = Some(rationale.into());
    }

    /// Replace the previous validator findings with this report's.
    pub fn record_validation(&mut self, report: &ValidationReport) {
        self.issues.retain(|i| !i.kind.is_validator_finding());
        self.issues.extend(report.issues.iter().map(|issue| SectionIssue {
            kind: match issue.severity {
                IssueSeverity::Blocking => IssueKind::Blocking,
                IssueSeverity::Advisory => IssueKind::Advisory,
            },
            message: issue.description.clone(),
        }));
    }

    pub fn annotate(&mut self, kind: IssueKind, message: impl Into<String>) {
        self.issues.push(SectionIssue {
            kind,
            message: message.into(),
        });
    }

    pub fn request_follow_up(&mut self) {
        self.status = SectionStatus::NeedsFollowUp;
    }

    pub fn complete(&mut self, acceptance: Acceptance) {
        self.acceptance = Some(acceptance);
        self.status = SectionStatus::Complete;
    }

    pub fn skip(&mut self) {
        self.status = SectionStatus::Skipped;
    }

    /// Re-open a finished section with an edited answer (review phase).
    /// Findings about the previous answer are discarded.
    pub fn reopen(&mut self, answer: impl Into<String>) {
        self.acceptance = None;
        self.issues.clear();
        self.receive_answer(answer);
    }

    /// `Complete` implies a passing score, human confirmation, or an exhausted budget.
    pub fn satisfies_completion_invariant(&self, threshold: f32, max_attempts: u32) -> bool {
        if self.status != SectionStatus::Complete {
            return true;
        }
        match self.acceptance {
            Some(Acceptance::Confident) => self.confidence_score.is_some_and(|s| s >= threshold),
            Some(Acceptance::Confirmed) => self.attempts >= 2,
            Some(Acceptance::Forced) => self.attempts >= max_attempts,
            Some(Acceptance::Final) => self.raw_answer.is_some(),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ValidationIssue;

    #[test]
    fn test_attempt_lifecycle() {
        let mut state = SectionState::new("scope");
        assert_eq!(state.status, SectionStatus::Pending);

        state.begin_attempt();
        assert_eq!(state.attempts, 1);
        assert_eq!(state.status, SectionStatus::AwaitingInput);

        state.receive_answer("We build a CLI");
        assert_eq!(state.status, SectionStatus::Evaluating);
        assert_eq!(state.raw_answer.as_deref(), Some("We build a CLI"));

        state.record_confidence(0.9, "detailed");
        state.complete(Acceptance::Confident);
        assert!(state.status.is_done());
        assert!(state.satisfies_completion_invariant(0.6, 3));
    }

    #[test]
    fn test_validation_replaces_findings_but_keeps_annotations() {
        let mut state = SectionState::new("scope");
        state.annotate(IssueKind::ServiceFailure, "evaluator timed out");
        state.record_validation(&ValidationReport::new(vec![
            ValidationIssue::blocking("Missing goals"),
            ValidationIssue::advisory("Add examples"),
        ]));
        assert!(state.has_blocking_issues());
        assert_eq!(state.issues.len(), 3);

        state.record_validation(&ValidationReport::default());
        assert!(!state.has_blocking_issues());
        assert_eq!(
            state.validation_issues(),
            vec!["[service unavailable] evaluator timed out".to_string()]
        );
    }

    #[test]
    fn test_new_answer_clears_previous_score() {
        let mut state = SectionState::new("scope");
        state.begin_attempt();
        state.receive_answer("short");
        state.record_confidence(0.3, "too short");
        state.request_follow_up();

        state.begin_attempt();
        state.receive_answer("longer answer");
        assert_eq!(state.attempts, 2);
        assert!(state.confidence_score.is_none());
        assert!(state.rationale.is_none());
    }

    #[test]
    fn test_confident_acceptance_requires_passing_score() {
        let mut state = SectionState::new("scope");
        state.begin_attempt();
        state.receive_answer("answer");
        state.record_confidence(0.4, "weak");
        state.complete(Acceptance::Confident);
        assert!(!state.satisfies_completion_invariant(0.6, 3));
    }

    #[test]
    fn test_reopen_discards_previous_findings() {
        let mut state = SectionState::new("scope");
        state.begin_attempt();
        state.receive_answer("short");
        state.record_confidence(0.3, "too short");
        state.annotate(IssueKind::LowConfidence, "score 0.30 below threshold 0.60");
        state.complete(Acceptance::Forced);

        state.reopen("a much better answer");
        assert_eq!(state.status, SectionStatus::Evaluating);
        assert!(state.acceptance.is_none());
        assert!(state.issues.is_empty());
        assert_eq!(state.raw_answer.as_deref(), Some("a much better answer"));
        assert_eq!(state.attempts, 1);
    }
}
