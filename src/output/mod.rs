pub mod files;

pub use files::*;

use async_trait::async_trait;

use crate::error::PersistenceError;
use crate::models::RequirementsDocument;

/// Destination for finished requirements documents
#[async_trait]
pub trait PersistenceSink: Send + Sync {
    /// Persist the document and return its identifier.
    ///
    /// Saving identical content twice must return the same identifier.
    async fn save(&self, document: &RequirementsDocument) -> Result<String, PersistenceError>;
}
