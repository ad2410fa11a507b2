use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::section::Acceptance;

/// One finished section in the requirements document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentEntry {
    pub section_id: String,
    pub ordinal: u32,
    pub title: String,
    /// Final answer; empty for skipped sections
    pub answer: String,
    pub confidence_score: Option<f32>,
    pub acceptance: Option<Acceptance>,
    pub attempts: u32,
    /// Outstanding issues and annotations
    pub issues: Vec<String>,
    /// No blocking validator findings remain
    pub issues_resolved: bool,
    pub skipped: bool,
}

/// Read-only snapshot built once from a completed run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequirementsDocument {
    pub project_name: String,
    pub generated_at: DateTime<Utc>,
    pub knowledge_enhanced: bool,
    pub entries: Vec<DocumentEntry>,
}

impl RequirementsDocument {
    /// SHA-256 over project name, knowledge flag and entries.
    /// The timestamp is excluded so identical content hashes identically.
    pub fn content_hash(&self) -> String {
        let canonical = serde_json::json!({
            "project_name": self.project_name,
            "knowledge_enhanced": self.knowledge_enhanced,
            "entries": self.entries,
        });
        let mut hasher = Sha256::new();
        hasher.update(canonical.to_string().as_bytes());
        format!("{:x}", hasher.finalize())
    }

    pub fn completed_sections(&self) -> usize {
        self.entries.iter().filter(|e| !e.skipped).count()
    }

    pub fn entry(&self, section_id: &str) -> Option<&DocumentEntry> {
        self.entries.iter().find(|e| e.section_id == section_id)
    }

    /// Render the document as markdown. Output depends only on the document.
    pub fn to_markdown(&self) -> String {
        let generated = self.generated_at.format("%Y-%m-%d %H:%M:%S UTC");
        let mut md = String::new();

        md.push_str(&format!("# Requirements Document: {}\n\n", self.project_name));
        md.push_str(&format!("*Generated on: {}*\n\n", generated));
        if self.knowledge_enhanced {
            md.push_str("*Enhanced with knowledge base context*\n\n");
        }

        md.push_str("## Executive Summary\n\n");
        md.push_str(
            "This document outlines the requirements gathered for the project \
             through a structured, assisted interview.\n\n",
        );

        for entry in &self.entries {
            md.push_str(&format!("## {}. {}\n\n", entry.ordinal, entry.title));
            if entry.skipped || entry.answer.trim().is_empty() {
                md.push_str("*No information provided for this section.*\n\n");
                continue;
            }
            md.push_str(entry.answer.trim());
            md.push_str("\n\n");

            let confidence = entry
                .confidence_score
                .map(|s| format!("{:.2}", s))
                .unwrap_or_else(|| "unknown".to_string());
            let acceptance = match entry.acceptance {
                Some(Acceptance::Confident) => "accepted",
                Some(Acceptance::Confirmed) => "confirmed by reviewer",
                Some(Acceptance::Forced) => "accepted after retries",
                Some(Acceptance::Final) => "accepted as final input",
                None => "pending",
            };
            md.push_str(&format!(
                "**Confidence**: {} | **Status**: {} | **Attempts**: {}\n\n",
                confidence, acceptance, entry.attempts
            ));

            if !entry.issues.is_empty() {
                md.push_str("**Open issues**:\n");
                for issue in &entry.issues {
                    md.push_str(&format!("- {}\n", issue));
                }
                md.push('\n');
            }
        }

        md.push_str("## Metadata\n\n");
        md.push_str(&format!("- **Project Name**: {}\n", self.project_name));
        md.push_str(&format!("- **Date Generated**: {}\n", generated));
        md.push_str(&format!(
            "- **Sections Completed**: {}/{}\n",
            self.completed_sections(),
            self.entries.len()
        ));
        md.push_str(&format!(
            "- **Knowledge Base Enhanced**: {}\n",
            if self.knowledge_enhanced { "Yes" } else { "No" }
        ));

        md
    }
}
