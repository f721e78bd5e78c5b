//! Memory records as seen by the consolidation engine

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Category of a memory, owned by the surrounding system.
///
/// The engine never changes a record's kind; it only reports the kinds it
/// merged in [`crate::consolidation::MergeMetadata`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MemoryKind {
    /// Durable fact or knowledge
    #[default]
    Semantic,

    /// Something that happened, optionally tied to a session
    Episodic {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        session_id: Option<String>,
    },

    /// How to do something
    Procedural {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        skill: Option<String>,
    },
}

impl MemoryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Semantic => "semantic",
            Self::Episodic { .. } => "episodic",
            Self::Procedural { .. } => "procedural",
        }
    }
}

/// A stored memory: text, embedding and bookkeeping fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryRecord {
    /// Unique identifier
    pub id: String,

    /// Memory content
    pub content: String,

    /// Embedding vector, absent when the record has not been embedded yet
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,

    /// Importance score (0.0-1.0)
    #[serde(default = "default_importance")]
    pub importance: f64,

    /// When the memory was created
    pub created_at: DateTime<Utc>,

    /// When the memory was last modified
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub tags: BTreeSet<String>,

    #[serde(default)]
    pub kind: MemoryKind,

    /// Opaque metadata owned by the store
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

fn default_importance() -> f64 {
    0.5
}

impl MemoryRecord {
    /// Create a record with the given id and content, created now.
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            embedding: None,
            importance: default_importance(),
            created_at: Utc::now(),
            updated_at: None,
            tags: BTreeSet::new(),
            kind: MemoryKind::default(),
            metadata: serde_json::Map::new(),
        }
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn with_updated_at(mut self, updated_at: DateTime<Utc>) -> Self {
        self.updated_at = Some(updated_at);
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn with_kind(mut self, kind: MemoryKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_importance(mut self, importance: f64) -> Self {
        self.importance = importance.clamp(0.0, 1.0);
        self
    }

    /// Whether the record carries a usable embedding.
    pub fn has_embedding(&self) -> bool {
        self.embedding.as_ref().is_some_and(|e| !e.is_empty())
    }

    /// Last modification time, falling back to creation time.
    pub fn last_modified(&self) -> DateTime<Utc> {
        self.updated_at.unwrap_or(self.created_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_builder() {
        let record = MemoryRecord::new("mem_1", "Rust has ownership")
            .with_embedding(vec![0.1, 0.2])
            .with_tag("rust")
            .with_importance(1.5);

        assert!(record.has_embedding());
        assert!(record.tags.contains("rust"));
        assert_eq!(record.importance, 1.0);
        assert_eq!(record.last_modified(), record.created_at);
    }

    #[test]
    fn test_empty_embedding_is_not_usable() {
        let record = MemoryRecord::new("mem_1", "text").with_embedding(Vec::new());
        assert!(!record.has_embedding());
    }

    #[test]
    fn test_kind_deserialization() {
        let json = serde_json::json!({
            "id": "mem_1",
            "content": "Met Alice at the conference",
            "created_at": "2024-01-01T00:00:00Z",
            "kind": { "type": "episodic", "session_id": "s-42" }
        });

        let record: MemoryRecord = serde_json::from_value(json).unwrap();
        assert_eq!(
            record.kind,
            MemoryKind::Episodic {
                session_id: Some("s-42".to_string())
            }
        );
        assert_eq!(record.kind.as_str(), "episodic");
        assert_eq!(record.importance, 0.5);
        assert!(record.embedding.is_none());
    }
}
