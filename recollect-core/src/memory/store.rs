//! Store trait the consolidation engine reads from and writes merges through
//!
//! Persistence is not the engine's concern. Any backend (SQL, vector DB,
//! remote service, in-memory map) can drive the engine by implementing
//! [`MemoryStore`].

use std::collections::BTreeSet;

use async_trait::async_trait;

use super::record::MemoryRecord;
use crate::error::Result;

/// The memory store collaborator
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// Fetch the given records. Records without an embedding may be returned;
    /// the analyzer skips them.
    async fn fetch_by_ids(&self, ids: &[String]) -> Result<Vec<MemoryRecord>>;

    /// Fetch up to `limit` of the most recent records that carry an embedding.
    async fn fetch_recent_with_embeddings(&self, limit: usize) -> Result<Vec<MemoryRecord>>;

    /// Fetch full records (tags and metadata included) in the order of `ids`.
    /// Unknown ids are skipped.
    async fn fetch_full(&self, ids: &[String]) -> Result<Vec<MemoryRecord>>;

    /// Replace the content and tags of a surviving record.
    async fn update_record(&self, id: &str, content: &str, tags: &BTreeSet<String>) -> Result<()>;

    /// Delete records, returning how many existed.
    async fn delete_records(&self, ids: &[String]) -> Result<usize>;
}
