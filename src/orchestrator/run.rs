//! WorkflowRun - state of a single interview.
//!
//! Owned by exactly one orchestrator for its lifetime and never shared
//! between runs. Snapshots can be written for diagnostics, including for
//! aborted runs whose partial section states are preserved.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::SectionCatalog;
use crate::models::SectionState;
use crate::slug::slugify;

/// Run-level states: `Running -> Reviewing -> Finalized`, or `Running -> Aborted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    Running,
    Reviewing,
    Finalized,
    Aborted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowRun {
    pub run_id: String,
    pub project_name: String,
    pub started_at: DateTime<Utc>,
    /// Fixed when review begins; used as the document timestamp so that
    /// regenerating after an edit reproduces unaffected content exactly
    pub review_started_at: Option<DateTime<Utc>>,
    pub status: RunStatus,
    /// Set once a terminate-mode handoff has been answered
    pub terminated: bool,
    /// Human exchanges completed (section answers and review)
    pub exchanges: u32,
    /// At least one prompt was enriched with knowledge snippets
    pub knowledge_used: bool,
    /// Run-level warnings (generator fallback and similar)
    pub annotations: Vec<String>,
    current_index: usize,
    sections: Vec<SectionState>,
}

impl WorkflowRun {
    pub fn new(project_name: impl Into<String>, catalog: &SectionCatalog) -> Self {
        let project_name = project_name.into();
        let started_at = Utc::now();
        Self {
            run_id: format!(
                "{}-{}",
                slugify(&project_name),
                started_at.format("%Y%m%d-%H%M%S")
            ),
            project_name,
            started_at,
            review_started_at: None,
            status: RunStatus::Running,
            terminated: false,
            exchanges: 0,
            knowledge_used: false,
            annotations: Vec::new(),
            current_index: 0,
            sections: catalog
                .iter()
                .map(|s| SectionState::new(s.id.clone()))
                .collect(),
        }
    }

    /// Section states in catalog order
    pub fn sections(&self) -> &[SectionState] {
        &self.sections
    }

    pub fn section(&self, id: &str) -> Option<&SectionState> {
        self.sections.iter().find(|s| s.section_id == id)
    }

    pub fn section_mut(&mut self, id: &str) -> Option<&mut SectionState> {
        self.sections.iter_mut().find(|s| s.section_id == id)
    }

    pub fn section_at_mut(&mut self, index: usize) -> Option<&mut SectionState> {
        self.sections.get_mut(index)
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    /// Move to the next section. Never moves backwards or past the end.
    pub fn advance(&mut self) {
        self.current_index = (self.current_index + 1).min(self.sections.len());
    }

    pub fn is_exhausted(&self) -> bool {
        self.current_index >= self.sections.len()
    }

    pub fn begin_review(&mut self) {
        self.status = RunStatus::Reviewing;
        if self.review_started_at.is_none() {
            self.review_started_at = Some(Utc::now());
        }
    }

    pub fn finalize(&mut self) {
        self.status = RunStatus::Finalized;
    }

    pub fn abort(&mut self) {
        self.status = RunStatus::Aborted;
    }

    pub fn document_timestamp(&self) -> DateTime<Utc> {
        self.review_started_at.unwrap_or(self.started_at)
    }

    /// Write the run as JSON to `<runs_dir>/<run_id>.json` (temp file + rename).
    pub fn save_snapshot(&self, runs_dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(runs_dir).context("Failed to create runs directory")?;

        let path = runs_dir.join(format!("{}.json", self.run_id));
        let temp = runs_dir.join(format!(".{}.json.tmp", self.run_id));

        let json = serde_json::to_string_pretty(self).context("Failed to serialize run")?;
        fs::write(&temp, json).context("Failed to write temp run snapshot")?;
        fs::rename(&temp, &path).context("Failed to rename run snapshot")?;

        Ok(path)
    }

    pub fn load_snapshot(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("Failed to read run snapshot: {:?}", path))?;
        serde_json::from_str(&json).context("Failed to parse run snapshot")
    }
}
