//! libSQL backend — async `SeenStore` implementation.
//!
//! Supports local file and in-memory databases. Timestamps are stored as
//! RFC 3339 strings, which compare correctly as text.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::info;

use crate::error::StorageError;
use crate::model::Paper;
use crate::store::SeenStore;

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS seen_papers (
        paper_id TEXT PRIMARY KEY,
        first_seen TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_seen_papers_first_seen ON seen_papers(first_seen);
"#;

/// libSQL seen-paper store.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlSeenStore {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlSeenStore {
    /// Open (or create) a local database file and initialize the schema.
    pub async fn new_local(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StorageError::Open(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| StorageError::Open(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| StorageError::Open(format!("Failed to create connection: {e}")))?;

        let store = Self {
            db: Arc::new(db),
            conn,
        };
        store.init_schema().await?;
        info!(path = %path.display(), "Seen-paper store opened");
        Ok(store)
    }

    /// Create an in-memory store (for tests).
    pub async fn new_memory() -> Result<Self, StorageError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| StorageError::Open(format!("Failed to create in-memory database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| StorageError::Open(format!("Failed to create connection: {e}")))?;

        let store = Self {
            db: Arc::new(db),
            conn,
        };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), StorageError> {
        self.conn
            .execute_batch(SCHEMA)
            .await
            .map_err(|e| StorageError::Open(format!("Schema init failed: {e}")))?;
        Ok(())
    }

    async fn is_seen(&self, paper_id: &str) -> Result<bool, StorageError> {
        let mut rows = self
            .conn
            .query(
                "SELECT 1 FROM seen_papers WHERE paper_id = ?1",
                params![paper_id],
            )
            .await
            .map_err(|e| StorageError::Query(format!("is_seen: {e}")))?;

        match rows.next().await {
            Ok(row) => Ok(row.is_some()),
            Err(e) => Err(StorageError::Query(format!("is_seen: {e}"))),
        }
    }
}

#[async_trait]
impl SeenStore for LibSqlSeenStore {
    async fn filter_new(&self, papers: Vec<Paper>) -> Result<Vec<Paper>, StorageError> {
        let total = papers.len();
        let mut new_papers = Vec::with_capacity(total);
        for paper in papers {
            if !self.is_seen(&paper.id).await? {
                new_papers.push(paper);
            }
        }

        info!(total, new = new_papers.len(), "Filtered seen papers");
        Ok(new_papers)
    }

    async fn mark_seen(&self, paper_ids: &[String]) -> Result<(), StorageError> {
        let now = Utc::now().to_rfc3339();
        for paper_id in paper_ids {
            self.conn
                .execute(
                    "INSERT OR IGNORE INTO seen_papers (paper_id, first_seen) VALUES (?1, ?2)",
                    params![paper_id.as_str(), now.as_str()],
                )
                .await
                .map_err(|e| StorageError::Query(format!("mark_seen: {e}")))?;
        }

        info!(count = paper_ids.len(), "Marked papers as seen");
        Ok(())
    }

    async fn prune(&self, keep_days: u32) -> Result<usize, StorageError> {
        let cutoff = (Utc::now() - TimeDelta::days(i64::from(keep_days))).to_rfc3339();
        let removed = self
            .conn
            .execute(
                "DELETE FROM seen_papers WHERE first_seen < ?1",
                params![cutoff.as_str()],
            )
            .await
            .map_err(|e| StorageError::Query(format!("prune: {e}")))?;

        if removed > 0 {
            info!(removed, keep_days, "Pruned old seen-paper entries");
        }
        Ok(removed as usize)
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn paper(id: &str) -> Paper {
        Paper {
            id: id.to_string(),
            title: format!("Paper {id}"),
            summary: "An abstract.".into(),
            authors: vec![],
            published: Utc::now(),
            updated: Utc::now(),
            link: format!("http://arxiv.org/abs/{id}"),
            categories: vec![],
        }
    }

    #[tokio::test]
    async fn filter_new_on_empty_store_keeps_everything() {
        let store = LibSqlSeenStore::new_memory().await.unwrap();
        let papers = vec![paper("a"), paper("b")];
        let new = store.filter_new(papers).await.unwrap();
        assert_eq!(new.len(), 2);
    }

    #[tokio::test]
    async fn mark_seen_then_filter_drops_known_ids() {
        let store = LibSqlSeenStore::new_memory().await.unwrap();
        store
            .mark_seen(&["a".to_string(), "b".to_string()])
            .await
            .unwrap();

        let new = store
            .filter_new(vec![paper("a"), paper("b"), paper("c")])
            .await
            .unwrap();
        assert_eq!(new.len(), 1);
        assert_eq!(new[0].id, "c");
    }

    #[tokio::test]
    async fn mark_seen_is_idempotent() {
        let store = LibSqlSeenStore::new_memory().await.unwrap();
        store.mark_seen(&["a".to_string()]).await.unwrap();
        store.mark_seen(&["a".to_string()]).await.unwrap();

        let new = store.filter_new(vec![paper("a")]).await.unwrap();
        assert!(new.is_empty());
    }

    #[tokio::test]
    async fn prune_keeps_recent_entries() {
        let store = LibSqlSeenStore::new_memory().await.unwrap();
        store.mark_seen(&["recent".to_string()]).await.unwrap();

        let removed = store.prune(30).await.unwrap();
        assert_eq!(removed, 0);

        let new = store.filter_new(vec![paper("recent")]).await.unwrap();
        assert!(new.is_empty());
    }

    #[tokio::test]
    async fn prune_removes_old_entries() {
        let store = LibSqlSeenStore::new_memory().await.unwrap();
        let old = (Utc::now() - TimeDelta::days(60)).to_rfc3339();
        store
            .conn
            .execute(
                "INSERT INTO seen_papers (paper_id, first_seen) VALUES ('old', ?1)",
                params![old.as_str()],
            )
            .await
            .unwrap();

        let removed = store.prune(30).await.unwrap();
        assert_eq!(removed, 1);

        let new = store.filter_new(vec![paper("old")]).await.unwrap();
        assert_eq!(new.len(), 1);
    }

    #[tokio::test]
    async fn local_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seen.db");

        {
            let store = LibSqlSeenStore::new_local(&path).await.unwrap();
            store.mark_seen(&["persisted".to_string()]).await.unwrap();
        }

        let store = LibSqlSeenStore::new_local(&path).await.unwrap();
        let new = store.filter_new(vec![paper("persisted")]).await.unwrap();
        assert!(new.is_empty());
    }
}
