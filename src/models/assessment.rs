use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Result of the confidence evaluator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ConfidenceAssessment {
    /// Score in [0, 1]
    pub score: f32,
    /// Short explanation of the score, shown in follow-up prompts
    #[serde(default)]
    pub rationale: String,
}

impl ConfidenceAssessment {
    pub fn new(score: f32, rationale: impl Into<String>) -> Self {
        Self {
            score,
            rationale: rationale.into(),
        }
    }

    pub fn meets(&self, threshold: f32) -> bool {
        self.score >= threshold
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    /// Prevents the section from completing on this attempt
    #[default]
    Blocking,
    /// Reported in the document but does not trigger a follow-up
    Advisory,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ValidationIssue {
    pub description: String,
    #[serde(default)]
    pub severity: IssueSeverity,
}

impl ValidationIssue {
    pub fn blocking(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            severity: IssueSeverity::Blocking,
        }
    }

    pub fn advisory(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            severity: IssueSeverity::Advisory,
        }
    }
}

/// Result of the response validator. An empty list means no issues.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ValidationReport {
    #[serde(default)]
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn new(issues: Vec<ValidationIssue>) -> Self {
        Self { issues }
    }

    pub fn has_blocking(&self) -> bool {
        self.issues
            .iter()
            .any(|i| i.severity == IssueSeverity::Blocking)
    }
}
