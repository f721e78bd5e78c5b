use std::collections::HashSet;
use std::sync::Arc;

use crate::error::{RecollectError, Result};
use crate::llm::LLMProvider;
use crate::memory::{MemoryRecord, MemoryStore};

use super::config::{ConsolidationConfig, ConsolidationRequest};
use super::grouping::DuplicateGrouper;
use super::merge::MergeExecutor;
use super::similarity::SimilarityAnalyzer;
use super::strategy::{SAMPLE_SIZE, StrategySelector};
use super::types::{ConsolidationResult, ConsolidationStrategy, DuplicateGroup, MergeDetail};

/// Memory consolidation engine.
///
/// Finds duplicate and near-duplicate memories, recommends how to resolve
/// each group, and applies the chosen strategy through the store. The engine
/// holds no state between calls beyond its collaborators and configuration.
///
/// # Example
///
/// ```rust,no_run
/// use std::collections::HashSet;
/// use std::sync::Arc;
/// use recollect_core::prelude::*;
///
/// # async fn run() -> recollect_core::error::Result<()> {
/// let store = Arc::new(InMemoryStore::new());
/// let engine = ConsolidationEngine::new(
///     store,
///     Arc::new(StubLLMProvider),
///     ConsolidationConfig::default(),
/// );
///
/// let groups = engine
///     .analyze_duplicates(&ConsolidationRequest::new().with_threshold(0.7))
///     .await?;
/// for group in &groups {
///     engine.consolidate_group(group, None).await?;
/// }
/// # Ok(())
/// # }
/// ```
pub struct ConsolidationEngine {
    store: Arc<dyn MemoryStore>,
    executor: MergeExecutor,
    analyzer: SimilarityAnalyzer,
    grouper: DuplicateGrouper,
    selector: StrategySelector,
    config: ConsolidationConfig,
}

impl ConsolidationEngine {
    /// Create a new consolidation engine.
    ///
    /// `config` is used as given; build it through the builders or call
    /// [`ConsolidationConfig::validate`] first, or use [`Self::try_new`].
    pub fn new(
        store: Arc<dyn MemoryStore>,
        llm: Arc<dyn LLMProvider>,
        config: ConsolidationConfig,
    ) -> Self {
        Self {
            store,
            executor: MergeExecutor::new(llm, &config),
            analyzer: SimilarityAnalyzer::new(config.thresholds, config.max_records_per_analysis),
            grouper: DuplicateGrouper::new(config.thresholds),
            selector: StrategySelector::new(config.length_variance_threshold),
            config,
        }
    }

    /// Create a new consolidation engine after validating `config`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `config` fails validation.
    pub fn try_new(
        store: Arc<dyn MemoryStore>,
        llm: Arc<dyn LLMProvider>,
        config: ConsolidationConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(store, llm, config))
    }

    /// Get the configuration
    pub fn config(&self) -> &ConsolidationConfig {
        &self.config
    }

    /// Find duplicate groups among the requested (or most recent) memories.
    ///
    /// Store failures are logged and yield an empty list.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the request threshold is outside [0, 1].
    pub async fn analyze_duplicates(
        &self,
        request: &ConsolidationRequest,
    ) -> Result<Vec<DuplicateGroup>> {
        let threshold = request.threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(RecollectError::Validation(format!(
                "similarity threshold must be within [0, 1], got {}",
                threshold
            )));
        }

        let fetched = match &request.memory_ids {
            Some(ids) => self.store.fetch_by_ids(ids).await,
            None => {
                self.store
                    .fetch_recent_with_embeddings(self.config.recent_fetch_limit)
                    .await
            }
        };

        let records = match fetched {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!("Failed to fetch memories for duplicate analysis: {}", e);
                return Ok(Vec::new());
            }
        };

        if records.is_empty() {
            tracing::warn!("No memories available for duplicate analysis");
            return Ok(Vec::new());
        }

        let analyzer = self.analyzer.clone();
        let edges = tokio::task::spawn_blocking(move || analyzer.analyze(&records, threshold))
            .await
            .map_err(|e| RecollectError::Other(format!("similarity analysis task failed: {}", e)))?;

        let mut groups = self.grouper.group(&edges);
        for group in &mut groups {
            group.recommended_strategy = Some(self.recommend_strategy(group).await);
        }

        tracing::info!(
            "Found {} duplicate groups (threshold {:.2})",
            groups.len(),
            threshold
        );

        Ok(groups)
    }

    /// Recommend a strategy for `group`, sampling its first records if needed.
    ///
    /// Never fails: a sample that cannot be fetched yields KEEP_NEWEST.
    pub async fn recommend_strategy(&self, group: &DuplicateGroup) -> ConsolidationStrategy {
        if !StrategySelector::needs_sample(group) {
            return self.selector.select(group, &[]);
        }

        let sample_ids = &group.memory_ids[..group.memory_ids.len().min(SAMPLE_SIZE)];
        match self.store.fetch_full(sample_ids).await {
            Ok(sample) => self.selector.select(group, &sample),
            Err(e) => {
                tracing::warn!("Failed to sample group for strategy selection: {}", e);
                ConsolidationStrategy::KeepNewest
            }
        }
    }

    /// Consolidate one group and commit the result to the store.
    ///
    /// The strategy defaults to the group's recommendation. Nothing is
    /// written in dry-run mode, for summaries, or for failed results.
    ///
    /// # Errors
    ///
    /// - validation error for a group of fewer than two distinct ids
    /// - data fetch error if fewer than two records can be loaded
    /// - store error if the commit fails
    pub async fn consolidate_group(
        &self,
        group: &DuplicateGroup,
        strategy: Option<ConsolidationStrategy>,
    ) -> Result<ConsolidationResult> {
        let mut seen = HashSet::new();
        let ids: Vec<String> = group
            .memory_ids
            .iter()
            .filter(|id| seen.insert(id.as_str()))
            .cloned()
            .collect();

        if ids.len() < 2 {
            return Err(RecollectError::Validation(format!(
                "a duplicate group needs at least two distinct memories, got {}",
                ids.len()
            )));
        }

        let mut records = self
            .store
            .fetch_full(&ids)
            .await
            .map_err(|e| RecollectError::DataFetch(format!("failed to load group: {}", e)))?;

        let mut loaded = HashSet::new();
        records.retain(|r| loaded.insert(r.id.clone()));

        if records.len() < 2 {
            return Err(RecollectError::DataFetch(format!(
                "only {} of {} group memories could be loaded",
                records.len(),
                group.len()
            )));
        }

        let strategy = strategy
            .or(group.recommended_strategy)
            .unwrap_or_else(|| self.selector.select(group, &records));

        let result = self.executor.execute(group, &records, strategy).await?;

        if self.config.dry_run {
            tracing::info!(
                "Dry run: {} would keep {:?} and remove {} memories",
                result.strategy,
                result.surviving_id,
                result.removed_ids.len()
            );
        } else {
            self.commit(&records, &result).await?;
        }

        Ok(result)
    }

    /// Write a destructive result back: update the survivor, delete the rest.
    ///
    /// If the delete fails after the survivor was rewritten, the survivor's
    /// previous content and tags are put back before the error is returned.
    async fn commit(&self, records: &[MemoryRecord], result: &ConsolidationResult) -> Result<()> {
        if result.status.is_failed() {
            return Ok(());
        }
        let Some(surviving_id) = &result.surviving_id else {
            return Ok(());
        };

        if result.removed_ids.contains(surviving_id) {
            return Err(RecollectError::Validation(format!(
                "refusing to commit: survivor {} is also marked for removal",
                surviving_id
            )));
        }

        let survivor = records
            .iter()
            .find(|r| &r.id == surviving_id)
            .ok_or_else(|| RecollectError::Other(format!("survivor {} not in group", surviving_id)))?;

        let tags = match &result.metadata.detail {
            MergeDetail::Content { tags, .. } => tags.clone(),
            _ => survivor.tags.clone(),
        };
        let content = result.content.as_deref().unwrap_or(&survivor.content);

        let rewritten = content != survivor.content || tags != survivor.tags;
        if rewritten {
            self.store.update_record(surviving_id, content, &tags).await?;
        }

        if result.removed_ids.is_empty() {
            return Ok(());
        }

        match self.store.delete_records(&result.removed_ids).await {
            Ok(deleted) => {
                tracing::debug!("Removed {} memories merged into {}", deleted, surviving_id);
                Ok(())
            }
            Err(e) => {
                if rewritten {
                    if let Err(restore) = self
                        .store
                        .update_record(surviving_id, &survivor.content, &survivor.tags)
                        .await
                    {
                        tracing::error!(
                            "Failed to restore {} after a failed delete: {}",
                            surviving_id,
                            restore
                        );
                    }
                }
                Err(e)
            }
        }
    }
}
