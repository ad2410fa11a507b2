//! Knowledge retrieval for prompt enrichment.
//!
//! Retrieval is best effort: the orchestrator bounds every call with a
//! timeout and falls back to the plain prompt on any error or empty result.

mod local;

pub use local::LocalKnowledgeBase;

use async_trait::async_trait;

use crate::error::RetrievalError;

#[async_trait]
pub trait KnowledgeRetriever: Send + Sync {
    /// Snippets relevant to `query`, most relevant first. May be empty.
    async fn retrieve(&self, query: &str) -> Result<Vec<String>, RetrievalError>;
}
