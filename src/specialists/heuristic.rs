use std::collections::HashSet;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::SpecialistServiceError;
use crate::models::{ConfidenceAssessment, ValidationIssue, ValidationReport};

use super::{ConfidenceEvaluator, EvaluationRequest, ResponseValidator};

/// Words: alphanumeric runs, allowing inner apostrophes and hyphens
static WORD_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[[:alnum:]]+(?:['-][[:alnum:]]+)*").expect("invalid WORD_PATTERN regex")
});

/// Lowercased words of `text`, in order
pub(crate) fn tokenize(text: &str) -> Vec<String> {
    WORD_PATTERN
        .find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .collect()
}

// ============================================================================
// Confidence
// ============================================================================

/// Scores answers by length and vocabulary richness.
#[derive(Debug, Clone, Default)]
pub struct HeuristicEvaluator;

impl HeuristicEvaluator {
    pub fn score(answer: &str) -> ConfidenceAssessment {
        let words = tokenize(answer);
        let word_count = words.len();
        let unique: HashSet<&str> = words.iter().map(String::as_str).collect();
        let richness = unique.len() as f32 / word_count.max(1) as f32;

        // Scored out of 10, reported in [0, 1]
        let mut points: f32 = match word_count {
            0..=19 => 3.0,
            20..=49 => 5.0,
            50..=99 => 7.0,
            _ => 8.5,
        };
        if richness > 0.7 {
            points += 1.0;
        }
        let score = points.min(10.0) / 10.0;

        ConfidenceAssessment::new(
            score,
            format!(
                "Response length: {} words. Vocabulary richness: {:.2}",
                word_count, richness
            ),
        )
    }
}

#[async_trait]
impl ConfidenceEvaluator for HeuristicEvaluator {
    async fn evaluate(
        &self,
        request: &EvaluationRequest<'_>,
    ) -> Result<ConfidenceAssessment, SpecialistServiceError> {
        Ok(Self::score(request.answer))
    }
}

// ============================================================================
// Validation
// ============================================================================

/// Checks an answer against its section's completion criteria.
#[derive(Debug, Clone)]
pub struct CriteriaValidator {
    /// Answers shorter than this get an advisory note
    pub min_words: usize,
}

impl Default for CriteriaValidator {
    fn default() -> Self {
        Self { min_words: 8 }
    }
}

#[async_trait]
impl ResponseValidator for CriteriaValidator {
    async fn validate(
        &self,
        request: &EvaluationRequest<'_>,
    ) -> Result<ValidationReport, SpecialistServiceError> {
        let answer = request.answer.trim();
        if answer.is_empty() {
            return Ok(ValidationReport::new(vec![ValidationIssue::blocking(
                "No answer provided",
            )]));
        }

        let mut issues: Vec<ValidationIssue> = request
            .section
            .criteria
            .iter()
            .filter(|c| !c.is_met_by(answer))
            .map(|c| ValidationIssue::blocking(c.description.clone()))
            .collect();

        let words = tokenize(answer).len();
        if words < self.min_words {
            issues.push(ValidationIssue::advisory(format!(
                "Answer is very short ({} words); consider adding detail",
                words
            )));
        }

        Ok(ValidationReport::new(issues))
    }
}
