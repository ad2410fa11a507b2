use std::collections::HashSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::KnowledgeConfig;
use crate::error::RetrievalError;
use crate::specialists::tokenize;

use super::KnowledgeRetriever;

/// Query terms shorter than this are ignored when ranking
const MIN_TERM_LENGTH: usize = 4;

/// Paragraph-level search over text files in a local directory.
#[derive(Debug, Clone)]
pub struct LocalKnowledgeBase {
    dir: PathBuf,
    pattern: String,
    max_snippets: usize,
}

struct Candidate {
    score: usize,
    source: String,
    text: String,
}

impl LocalKnowledgeBase {
    pub fn new(dir: impl Into<PathBuf>, pattern: impl Into<String>, max_snippets: usize) -> Self {
        Self {
            dir: dir.into(),
            pattern: pattern.into(),
            max_snippets,
        }
    }

    /// Build from config; `None` when no directory is configured.
    pub fn from_config(config: &KnowledgeConfig) -> Option<Self> {
        config
            .dir
            .as_ref()
            .map(|dir| Self::new(dir, config.pattern.clone(), config.max_snippets))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn matching_files(&self) -> Result<Vec<PathBuf>, RetrievalError> {
        let pattern = self.dir.join(&self.pattern).to_string_lossy().to_string();

        // glob walks the filesystem synchronously
        let files = tokio::task::spawn_blocking(move || {
            glob::glob(&pattern).map(|paths| {
                let mut files: Vec<PathBuf> =
                    paths.flatten().filter(|p| p.is_file()).collect();
                files.sort();
                files
            })
        })
        .await
        .map_err(|e| RetrievalError::Unavailable(format!("glob task failed: {}", e)))?
        .map_err(|e| RetrievalError::Pattern(e.to_string()))?;

        Ok(files)
    }
}

#[async_trait]
impl KnowledgeRetriever for LocalKnowledgeBase {
    async fn retrieve(&self, query: &str) -> Result<Vec<String>, RetrievalError> {
        if !self.dir.is_dir() {
            return Err(RetrievalError::Unavailable(format!(
                "{} is not a directory",
                self.dir.display()
            )));
        }

        let terms: HashSet<String> = tokenize(query)
            .into_iter()
            .filter(|t| t.chars().count() >= MIN_TERM_LENGTH)
            .collect();
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let mut candidates = Vec::new();
        for path in self.matching_files().await? {
            let content = match tokio::fs::read_to_string(&path).await {
                Ok(content) => content,
                Err(source) => {
                    let error = RetrievalError::Io {
                        path: path.clone(),
                        source,
                    };
                    warn!("Skipping knowledge file: {}", error);
                    continue;
                }
            };
            let source = path
                .strip_prefix(&self.dir)
                .unwrap_or(&path)
                .display()
                .to_string();

            for paragraph in content.split("\n\n").map(str::trim) {
                if paragraph.is_empty() {
                    continue;
                }
                let words: HashSet<String> = tokenize(paragraph).into_iter().collect();
                let score = terms.intersection(&words).count();
                if score > 0 {
                    candidates.push(Candidate {
                        score,
                        source: source.clone(),
                        text: paragraph.to_string(),
                    });
                }
            }
        }

        // Stable sort keeps file order among equal scores
        candidates.sort_by(|a, b| b.score.cmp(&a.score));
        candidates.truncate(self.max_snippets);
        debug!(
            "Knowledge base returned {} snippet(s) for query",
            candidates.len()
        );

        Ok(candidates
            .into_iter()
            .enumerate()
            .map(|(i, c)| format!("Source {} ({}):\n{}", i + 1, c.source, c.text))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn knowledge_dir() -> tempfile::TempDir {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("formats.md"),
            "# Formats\n\nThe importer accepts CSV and JSON files up to 10MB.\n\nExports are generated nightly.",
        )
        .unwrap();
        fs::create_dir_all(dir.path().join("guides")).unwrap();
        fs::write(
            dir.path().join("guides/users.md"),
            "Project managers assign tasks to team members.\n\nTeam members export CSV reports.",
        )
        .unwrap();
        fs::write(dir.path().join("notes.txt"), "CSV export CSV export").unwrap();
        dir
    }

    #[tokio::test]
    async fn test_retrieve_ranks_by_term_overlap() {
        let dir = knowledge_dir();
        let kb = LocalKnowledgeBase::new(dir.path(), "**/*.md", 2);

        let snippets = kb
            .retrieve("Which files should the importer accept, JSON? Any reports?")
            .await
            .unwrap();

        assert_eq!(snippets.len(), 2);
        assert!(snippets[0].starts_with("Source 1 (formats.md):\n"));
        assert!(snippets[0].contains("CSV and JSON"));
        assert!(snippets[1].starts_with("Source 2 (guides/users.md):\n"));
        assert!(snippets.iter().all(|s| !s.contains("notes.txt")));
    }

    #[tokio::test]
    async fn test_retrieve_without_matches_is_empty() {
        let dir = knowledge_dir();
        let kb = LocalKnowledgeBase::new(dir.path(), "**/*.md", 3);

        let snippets = kb.retrieve("quantum entanglement").await.unwrap();
        assert!(snippets.is_empty());

        // Only short terms: nothing to rank on
        let snippets = kb.retrieve("a an of to").await.unwrap();
        assert!(snippets.is_empty());
    }

    #[tokio::test]
    async fn test_unreadable_file_is_skipped() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("a.md"),
            "The importer accepts JSON uploads.",
        )
        .unwrap();
        fs::write(dir.path().join("b.md"), [0xff, 0xfe, 0x00, 0x81]).unwrap();
        let kb = LocalKnowledgeBase::new(dir.path(), "*.md", 3);

        let snippets = kb.retrieve("importer json").await.unwrap();
        assert_eq!(snippets.len(), 1);
        assert!(snippets[0].starts_with("Source 1 (a.md):\n"));
    }

    #[tokio::test]
    async fn test_missing_directory_is_unavailable() {
        let dir = tempdir().unwrap();
        let kb = LocalKnowledgeBase::new(dir.path().join("missing"), "**/*.md", 3);

        let result = kb.retrieve("export formats").await;
        assert!(matches!(result, Err(RetrievalError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_invalid_pattern() {
        let dir = knowledge_dir();
        let kb = LocalKnowledgeBase::new(dir.path(), "[*.md", 3);

        let result = kb.retrieve("export formats").await;
        assert!(matches!(result, Err(RetrievalError::Pattern(_))));
    }

    #[test]
    fn test_from_config() {
        let config = KnowledgeConfig::default();
        assert!(LocalKnowledgeBase::from_config(&config).is_none());

        let config = KnowledgeConfig {
            dir: Some(PathBuf::from("/tmp/kb")),
            ..KnowledgeConfig::default()
        };
        let kb = LocalKnowledgeBase::from_config(&config).unwrap();
        assert_eq!(kb.dir(), Path::new("/tmp/kb"));
    }
}
