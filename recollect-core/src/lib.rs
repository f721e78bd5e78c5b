//! # Recollect - Memory Consolidation
//!
//! Recollect keeps a long-lived memory store from filling up with restatements
//! of the same fact. It:
//! - Scores memory pairs by embedding similarity, guarding exact matches with a text check
//! - Clusters similar pairs into duplicate groups
//! - Recommends a resolution strategy per group
//! - Merges, keeps one, or summarizes, degrading safely when text generation fails
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use recollect_core::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let store = Arc::new(InMemoryStore::new());
//!     store.insert(MemoryRecord::new("a", "Standup is at 9:30").with_embedding(vec![1.0, 0.0]))?;
//!     store.insert(MemoryRecord::new("b", "standup is at 9:30").with_embedding(vec![1.0, 0.0]))?;
//!
//!     let engine = ConsolidationEngine::new(
//!         store,
//!         Arc::new(StubLLMProvider),
//!         ConsolidationConfig::default(),
//!     );
//!
//!     let summary = engine.bulk_consolidate(&ConsolidationRequest::new()).await?;
//!     println!("removed {} duplicates", summary.memories_removed);
//!     Ok(())
//! }
//! ```
//!
//! ## Collaborators
//!
//! The engine owns no storage and no model. It reads and writes through a
//! [`memory::MemoryStore`] and generates text through an [`llm::LLMProvider`].
//! Without a configured provider, merges fall back to keeping the newest
//! record and summaries report failure.
//!
//! ## Feature Flags
//!
//! - `llm-ollama` (default): Ollama text generation over HTTP

pub mod config;
pub mod consolidation;
pub mod error;
pub mod llm;
pub mod memory;

/// Current library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{LLMBackend, LLMProviderConfig, RecollectConfig};
    pub use crate::consolidation::{
        BulkConsolidationSummary, ConsolidationConfig, ConsolidationEngine, ConsolidationRequest,
        ConsolidationResult, ConsolidationStrategy, DuplicateGroup, DuplicateType, GroupAction,
        GroupOutcome, MergeStatus, SimilarityThresholds,
    };
    pub use crate::error::{RecollectError, Result};
    pub use crate::llm::{LLMConfig, LLMProvider, LLMProviderFactory, StubLLMProvider};
    pub use crate::memory::{InMemoryStore, MemoryKind, MemoryRecord, MemoryStore};
}
