//! In-memory store for testing and lightweight deployments
//!
//! Records live in a HashMap behind a RwLock. Useful for:
//!
//! - Unit and integration testing
//! - Running consolidation over a JSON export (the CLI)
//! - Quick prototyping

use std::collections::{BTreeSet, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::Utc;

use super::record::MemoryRecord;
use super::store::MemoryStore;
use crate::error::{RecollectError, Result};

/// In-memory store for testing and lightweight use
pub struct InMemoryStore {
    records: RwLock<HashMap<String, MemoryRecord>>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Create a store pre-populated with records
    pub fn with_records(records: impl IntoIterator<Item = MemoryRecord>) -> Self {
        let map = records.into_iter().map(|r| (r.id.clone(), r)).collect();
        Self {
            records: RwLock::new(map),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<String, MemoryRecord>>> {
        self.records
            .read()
            .map_err(|e| RecollectError::Store(format!("lock poisoned: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, MemoryRecord>>> {
        self.records
            .write()
            .map_err(|e| RecollectError::Store(format!("lock poisoned: {}", e)))
    }

    /// Insert or replace a record
    pub fn insert(&self, record: MemoryRecord) -> Result<()> {
        self.write()?.insert(record.id.clone(), record);
        Ok(())
    }

    /// Store new content (e.g. a generated summary) and return its ID
    pub fn store(&self, content: impl Into<String>, tags: BTreeSet<String>) -> Result<String> {
        let id = uuid::Uuid::new_v4().to_string();
        let mut record = MemoryRecord::new(id.clone(), content);
        record.tags = tags;
        self.insert(record)?;
        Ok(id)
    }

    /// Get a record by ID
    pub fn get(&self, id: &str) -> Result<Option<MemoryRecord>> {
        Ok(self.read()?.get(id).cloned())
    }

    /// Number of stored records
    pub fn len(&self) -> Result<usize> {
        Ok(self.read()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Snapshot of all records, oldest first
    pub fn records(&self) -> Result<Vec<MemoryRecord>> {
        let mut records: Vec<MemoryRecord> = self.read()?.values().cloned().collect();
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(records)
    }

    /// Clear all records
    pub fn clear(&self) -> Result<()> {
        self.write()?.clear();
        Ok(())
    }
}

#[async_trait]
impl MemoryStore for InMemoryStore {
    async fn fetch_by_ids(&self, ids: &[String]) -> Result<Vec<MemoryRecord>> {
        let records = self.read()?;
        Ok(ids.iter().filter_map(|id| records.get(id).cloned()).collect())
    }

    async fn fetch_recent_with_embeddings(&self, limit: usize) -> Result<Vec<MemoryRecord>> {
        let mut recent: Vec<MemoryRecord> = self
            .read()?
            .values()
            .filter(|r| r.has_embedding())
            .cloned()
            .collect();

        recent.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        recent.truncate(limit);
        Ok(recent)
    }

    async fn fetch_full(&self, ids: &[String]) -> Result<Vec<MemoryRecord>> {
        self.fetch_by_ids(ids).await
    }

    async fn update_record(&self, id: &str, content: &str, tags: &BTreeSet<String>) -> Result<()> {
        let mut records = self.write()?;
        let record = records
            .get_mut(id)
            .ok_or_else(|| RecollectError::Store(format!("memory not found: {}", id)))?;

        record.content = content.to_string();
        record.tags = tags.clone();
        record.updated_at = Some(Utc::now());
        Ok(())
    }

    async fn delete_records(&self, ids: &[String]) -> Result<usize> {
        let mut records = self.write()?;
        Ok(ids.iter().filter(|id| records.remove(*id).is_some()).count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(id: &str, days_ago: i64, embedded: bool) -> MemoryRecord {
        let mut r = MemoryRecord::new(id, format!("content {}", id))
            .with_created_at(Utc::now() - Duration::days(days_ago));
        if embedded {
            r = r.with_embedding(vec![1.0, 0.0]);
        }
        r
    }

    #[tokio::test]
    async fn test_fetch_recent_orders_and_filters() {
        let store = InMemoryStore::with_records(vec![
            record("old", 10, true),
            record("new", 1, true),
            record("bare", 0, false),
            record("mid", 5, true),
        ]);

        let recent = store.fetch_recent_with_embeddings(2).await.unwrap();
        let ids: Vec<&str> = recent.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["new", "mid"]);
    }

    #[tokio::test]
    async fn test_fetch_full_preserves_order_and_skips_unknown() {
        let store = InMemoryStore::with_records(vec![record("a", 1, true), record("b", 2, true)]);

        let ids = vec!["b".to_string(), "missing".to_string(), "a".to_string()];
        let records = store.fetch_full(&ids).await.unwrap();
        let fetched: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(fetched, vec!["b", "a"]);
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let store = InMemoryStore::with_records(vec![record("a", 1, true), record("b", 2, true)]);

        let tags: BTreeSet<String> = ["merged".to_string()].into_iter().collect();
        store.update_record("a", "merged content", &tags).await.unwrap();

        let updated = store.get("a").unwrap().unwrap();
        assert_eq!(updated.content, "merged content");
        assert!(updated.tags.contains("merged"));
        assert!(updated.updated_at.is_some());

        let deleted = store
            .delete_records(&["b".to_string(), "b".to_string(), "zzz".to_string()])
            .await
            .unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(store.len().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_update_missing_record_fails() {
        let store = InMemoryStore::new();
        let result = store.update_record("nope", "x", &BTreeSet::new()).await;
        assert!(matches!(result, Err(RecollectError::Store(_))));
    }

    #[test]
    fn test_store_generates_ids() {
        let store = InMemoryStore::new();
        let id = store.store("A summary", BTreeSet::new()).unwrap();
        assert_eq!(store.get(&id).unwrap().unwrap().content, "A summary");

        store.clear().unwrap();
        assert!(store.is_empty().unwrap());
    }
}
