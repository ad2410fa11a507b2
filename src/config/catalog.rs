use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// A keyword check an answer should satisfy before a section is considered complete
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionCriterion {
    /// Issue text reported when the criterion is not met
    pub description: String,
    /// Any one of these (case-insensitive) satisfies the criterion
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl CompletionCriterion {
    fn new(description: &str, keywords: &[&str]) -> Self {
        Self {
            description: description.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }

    /// Whether the answer mentions at least one of the keywords.
    /// A criterion without keywords is always satisfied.
    pub fn is_met_by(&self, answer: &str) -> bool {
        if self.keywords.is_empty() {
            return true;
        }
        let lowered = answer.to_lowercase();
        self.keywords
            .iter()
            .any(|k| lowered.contains(&k.to_lowercase()))
    }
}

/// One unit of the interview. Immutable once the catalog is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub id: String,
    /// 1-based position in the catalog
    pub ordinal: u32,
    pub title: String,
    /// minijinja template for the question shown to the human
    pub prompt: String,
    #[serde(default = "default_true")]
    pub required: bool,
    /// True only for the closing section; its handoff uses terminate mode
    #[serde(default)]
    pub break_on_complete: bool,
    #[serde(default)]
    pub criteria: Vec<CompletionCriterion>,
}

fn default_true() -> bool {
    true
}

/// Ordered, immutable list of interview sections
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionCatalog {
    pub sections: Vec<Section>,
}

impl Default for SectionCatalog {
    fn default() -> Self {
        Self {
            sections: vec![
                Section {
                    id: "project-scope".to_string(),
                    ordinal: 1,
                    title: "Project Scope".to_string(),
                    prompt: "What are the objectives, main goals and overall scope of {{ project }}? \
                             Who are its users?"
                        .to_string(),
                    required: true,
                    break_on_complete: false,
                    criteria: vec![
                        CompletionCriterion::new(
                            "Missing clear project goals or objectives",
                            &["goal", "objective"],
                        ),
                        CompletionCriterion::new("Missing user information", &["user"]),
                    ],
                },
                Section {
                    id: "user-stories".to_string(),
                    ordinal: 2,
                    title: "User Stories".to_string(),
                    prompt: "Describe the user stories, use cases and workflows for {{ project }}. \
                             Use the form \"As a <role>, I want to <action> so that <benefit>\"."
                        .to_string(),
                    required: true,
                    break_on_complete: false,
                    criteria: vec![
                        CompletionCriterion::new("Missing 'As a...' user story format", &["as a"]),
                        CompletionCriterion::new(
                            "Missing 'want to/need to' in user stories",
                            &["want to", "need to"],
                        ),
                    ],
                },
                Section {
                    id: "technical-constraints".to_string(),
                    ordinal: 3,
                    title: "Technical Constraints".to_string(),
                    prompt: "What technical requirements, target platforms and limitations \
                             apply to {{ project }}?"
                        .to_string(),
                    required: true,
                    break_on_complete: false,
                    criteria: vec![CompletionCriterion::new(
                        "Missing specific technical requirements",
                        &["requirement", "must", "platform"],
                    )],
                },
                Section {
                    id: "success-criteria".to_string(),
                    ordinal: 4,
                    title: "Success Criteria".to_string(),
                    prompt: "How will you measure the success of {{ project }}? \
                             List metrics and acceptance criteria."
                        .to_string(),
                    required: true,
                    break_on_complete: false,
                    criteria: vec![CompletionCriterion::new(
                        "Missing measurable success criteria",
                        &["measure", "metric", "%"],
                    )],
                },
                Section {
                    id: "file-format-support".to_string(),
                    ordinal: 5,
                    title: "File Format Support".to_string(),
                    prompt: "Which file formats and data specifications must {{ project }} \
                             read or produce?"
                        .to_string(),
                    required: true,
                    break_on_complete: false,
                    criteria: vec![CompletionCriterion::new(
                        "Missing file format specifications",
                        &["format", "json", "csv", "xml", "pdf"],
                    )],
                },
                Section {
                    id: "additional-information".to_string(),
                    ordinal: 6,
                    title: "Additional Information".to_string(),
                    prompt: "Is there anything else about {{ project }} we should capture? \
                             Leave empty to finish."
                        .to_string(),
                    required: false,
                    break_on_complete: true,
                    criteria: Vec::new(),
                },
            ],
        }
    }
}

impl SectionCatalog {
    pub fn new(sections: Vec<Section>) -> Self {
        Self { sections }
    }

    /// Load a catalog from a YAML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read catalog: {:?}", path))?;
        let catalog: SectionCatalog = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse catalog: {:?}", path))?;
        Ok(catalog)
    }

    /// Load the catalog at `path`, falling back to the built-in sections
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::from_file(p),
            None => Ok(Self::default()),
        }
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to serialize catalog")
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Section> {
        self.sections.iter()
    }

    /// Check structural rules; returns a description of the first violation.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.sections.is_empty() {
            return Err("catalog has no sections".to_string());
        }

        let mut seen = HashSet::new();
        for (i, section) in self.sections.iter().enumerate() {
            if section.id.trim().is_empty() {
                return Err(format!("section {} has an empty id", i + 1));
            }
            if !seen.insert(section.id.as_str()) {
                return Err(format!("duplicate section id '{}'", section.id));
            }
            if section.ordinal as usize != i + 1 {
                return Err(format!(
                    "section '{}' has ordinal {} but is at position {}",
                    section.id,
                    section.ordinal,
                    i + 1
                ));
            }
            if section.break_on_complete && i + 1 != self.sections.len() {
                return Err(format!(
                    "section '{}' breaks on complete but is not the last section",
                    section.id
                ));
            }
        }

        Ok(())
    }
}
