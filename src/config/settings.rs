use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main CLI configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub workflow: WorkflowConfig,
    pub specialists: SpecialistsConfig,
    pub knowledge: KnowledgeConfig,
    pub output: OutputConfig,
}

/// Parameters of a single interview run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Additional attempts allowed per section after the first answer
    pub max_retries: u32,
    /// Minimum confidence score (0.0-1.0) to accept an answer
    pub confidence_threshold: f32,
    /// Enrich prompts with knowledge base snippets
    pub knowledge_enabled: bool,
    /// Bound on each evaluator/validator/generator call
    pub specialist_timeout_secs: u64,
    /// Bound on each knowledge retrieval call
    pub retrieval_timeout_secs: u64,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            confidence_threshold: 0.6,
            knowledge_enabled: false,
            specialist_timeout_secs: 30,
            retrieval_timeout_secs: 10,
        }
    }
}

impl WorkflowConfig {
    /// Maximum number of answers collected for one section
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(format!(
                "confidence_threshold must be within 0.0-1.0, got {}",
                self.confidence_threshold
            ));
        }
        if self.specialist_timeout_secs == 0 || self.retrieval_timeout_secs == 0 {
            return Err("timeouts must be at least one second".to_string());
        }
        Ok(())
    }
}

/// External program used as a specialist backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandConfig {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

/// Optional external specialists. Unset entries use the built-in heuristics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SpecialistsConfig {
    pub evaluator: Option<CommandConfig>,
    pub validator: Option<CommandConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeConfig {
    /// Directory holding knowledge base documents
    pub dir: Option<PathBuf>,
    /// Glob pattern, relative to `dir`, selecting indexed files
    pub pattern: String,
    /// Snippets returned per query
    pub max_snippets: usize,
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            dir: None,
            pattern: "**/*.md".to_string(),
            max_snippets: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Where finished requirements documents are written
    /// Defaults to ~/.config/req-forge/documents/
    pub documents_dir: PathBuf,
    /// Where run snapshots are written for diagnostics
    /// Defaults to ~/.config/req-forge/runs/
    pub runs_dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        let base = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("req-forge");
        Self {
            documents_dir: base.join("documents"),
            runs_dir: base.join("runs"),
        }
    }
}

impl CliConfig {
    /// Load configuration from a YAML file
    pub fn from_file(path: &PathBuf) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: CliConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration, falling back to defaults if file doesn't exist
    pub fn load_or_default(path: Option<&PathBuf>) -> anyhow::Result<Self> {
        match path {
            Some(p) if p.exists() => Self::from_file(p),
            _ => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_workflow_defaults() {
        let config = WorkflowConfig::default();
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.max_attempts(), 3);
        assert!((config.confidence_threshold - 0.6).abs() < f32::EPSILON);
        assert!(!config.knowledge_enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_threshold_out_of_range() {
        let config = WorkflowConfig {
            confidence_threshold: 1.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = WorkflowConfig {
            confidence_threshold: -0.1,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(
            &path,
            "workflow:\n  max_retries: 1\nspecialists:\n  evaluator:\n    program: ./score.sh\n",
        )
        .unwrap();

        let config = CliConfig::from_file(&path).unwrap();
        assert_eq!(config.workflow.max_retries, 1);
        assert!((config.workflow.confidence_threshold - 0.6).abs() < f32::EPSILON);
        assert_eq!(config.specialists.evaluator.unwrap().program, "./score.sh");
        assert!(config.specialists.validator.is_none());
        assert_eq!(config.knowledge.pattern, "**/*.md");
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let missing = PathBuf::from("/nonexistent/req-forge.yaml");
        let config = CliConfig::load_or_default(Some(&missing)).unwrap();
        assert_eq!(config.workflow.max_retries, 2);
    }
}
