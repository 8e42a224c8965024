//! Seen-paper storage — cross-run deduplication state.

pub mod libsql_backend;

pub use libsql_backend::LibSqlSeenStore;

use async_trait::async_trait;

use crate::error::StorageError;
use crate::model::Paper;

/// Backend-agnostic store of paper ids that were already notified.
#[async_trait]
pub trait SeenStore: Send + Sync {
    /// Drop papers whose ids have been seen before.
    async fn filter_new(&self, papers: Vec<Paper>) -> Result<Vec<Paper>, StorageError>;

    /// Record paper ids as seen.
    async fn mark_seen(&self, paper_ids: &[String]) -> Result<(), StorageError>;

    /// Delete entries older than `keep_days`. Returns the number removed.
    async fn prune(&self, keep_days: u32) -> Result<usize, StorageError>;
}
