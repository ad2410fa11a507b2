use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, info};

use crate::error::PersistenceError;
use crate::models::RequirementsDocument;
use crate::slugify;

use super::PersistenceSink;

/// Hex digits of the content hash used in document identifiers
const HASH_PREFIX_LEN: usize = 12;

/// Writes documents as `<slug>-<hash>.md` plus a `.json` twin.
pub struct FileDocumentSink {
    dir: PathBuf,
}

impl FileDocumentSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Identifier derived from project name and content
    pub fn document_id(document: &RequirementsDocument) -> String {
        let hash = document.content_hash();
        format!(
            "{}-{}",
            slugify(&document.project_name),
            &hash[..HASH_PREFIX_LEN.min(hash.len())]
        )
    }

    pub fn markdown_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.md", id))
    }

    pub fn json_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }

    /// Write via temp file + rename so readers never see partial content
    async fn write_atomic(&self, path: &Path, content: &str) -> Result<(), PersistenceError> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let temp = self.dir.join(format!(".{}.tmp", file_name));

        fs::write(&temp, content)
            .await
            .map_err(|source| PersistenceError::Io {
                path: temp.clone(),
                source,
            })?;
        fs::rename(&temp, path)
            .await
            .map_err(|source| PersistenceError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(())
    }
}

#[async_trait]
impl PersistenceSink for FileDocumentSink {
    async fn save(&self, document: &RequirementsDocument) -> Result<String, PersistenceError> {
        let id = Self::document_id(document);
        let json_path = self.json_path(&id);

        if fs::try_exists(&json_path).await.unwrap_or(false) {
            debug!("Document {} already saved, skipping write", id);
            return Ok(id);
        }

        fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| PersistenceError::Io {
                path: self.dir.clone(),
                source,
            })?;

        let md_path = self.markdown_path(&id);
        self.write_atomic(&md_path, &document.to_markdown()).await?;
        // JSON last: its presence marks a complete save
        let json = serde_json::to_string_pretty(document)?;
        self.write_atomic(&json_path, &json).await?;

        info!("Wrote {:?}", md_path);
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tempfile::tempdir;

    use crate::models::{Acceptance, DocumentEntry};

    fn sample_document(answer: &str) -> RequirementsDocument {
        RequirementsDocument {
            project_name: "Task Tracker".to_string(),
            generated_at: Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap(),
            knowledge_enhanced: false,
            entries: vec![DocumentEntry {
                section_id: "project-scope".to_string(),
                ordinal: 1,
                title: "Project Scope".to_string(),
                answer: answer.to_string(),
                confidence_score: Some(0.8),
                acceptance: Some(Acceptance::Confident),
                attempts: 1,
                issues: Vec::new(),
                issues_resolved: true,
                skipped: false,
            }],
        }
    }

    #[tokio::test]
    async fn test_save_writes_markdown_and_json() {
        let dir = tempdir().unwrap();
        let sink = FileDocumentSink::new(dir.path().join("docs"));
        let document = sample_document("Track tasks for small teams");

        let id = sink.save(&document).await.unwrap();
        assert!(id.starts_with("task-tracker-"));
        assert_eq!(id.len(), "task-tracker-".len() + HASH_PREFIX_LEN);

        let md = std::fs::read_to_string(sink.markdown_path(&id)).unwrap();
        assert!(md.contains("Track tasks for small teams"));

        let json = std::fs::read_to_string(sink.json_path(&id)).unwrap();
        let parsed: RequirementsDocument = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, document);
    }

    #[tokio::test]
    async fn test_save_is_idempotent() {
        let dir = tempdir().unwrap();
        let sink = FileDocumentSink::new(dir.path());
        let document = sample_document("Track tasks for small teams");

        let first = sink.save(&document).await.unwrap();
        std::fs::write(sink.markdown_path(&first), "marker").unwrap();

        let second = sink.save(&document).await.unwrap();
        assert_eq!(first, second);
        // Existing artifact was not rewritten
        assert_eq!(
            std::fs::read_to_string(sink.markdown_path(&first)).unwrap(),
            "marker"
        );

        let files = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(files, 2);
    }

    #[tokio::test]
    async fn test_changed_content_gets_new_id() {
        let dir = tempdir().unwrap();
        let sink = FileDocumentSink::new(dir.path());

        let first = sink
            .save(&sample_document("Track tasks for small teams"))
            .await
            .unwrap();
        let second = sink
            .save(&sample_document("Track tasks for schools"))
            .await
            .unwrap();

        assert_ne!(first, second);
        assert!(sink.json_path(&first).exists());
        assert!(sink.json_path(&second).exists());
    }

    #[tokio::test]
    async fn test_timestamp_does_not_change_id() {
        let mut later = sample_document("Track tasks for small teams");
        later.generated_at = Utc.with_ymd_and_hms(2027, 6, 1, 0, 0, 0).unwrap();

        assert_eq!(
            FileDocumentSink::document_id(&sample_document("Track tasks for small teams")),
            FileDocumentSink::document_id(&later)
        );
    }
}
