//! Merge strategies and their fallbacks.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::error::{RecollectError, Result};
use crate::llm::{LLMConfig, LLMProvider};
use crate::memory::MemoryRecord;

use super::config::ConsolidationConfig;
use super::types::{
    ConsolidationResult, ConsolidationStrategy, DuplicateGroup, FallbackInfo, MergeDetail,
    MergeMetadata, MergeStatus,
};

const MERGE_SYSTEM_PROMPT: &str = "You consolidate personal knowledge notes. Output only the consolidated note, without preamble.";

const SUMMARY_SYSTEM_PROMPT: &str = "You write concise overviews of related personal notes. Output only the overview.";

/// Executes consolidation strategies against a group's full records.
///
/// Generation failures never escape: MERGE_CONTENT falls back to KEEP_NEWEST
/// and CREATE_SUMMARY reports [`MergeStatus::Failed`] with no removals.
pub struct MergeExecutor {
    llm: Arc<dyn LLMProvider>,
    generation_timeout: Duration,
    merge_max_tokens: usize,
    summary_max_tokens: usize,
    summary_sample_size: usize,
    temperature: f32,
}

impl MergeExecutor {
    pub fn new(llm: Arc<dyn LLMProvider>, config: &ConsolidationConfig) -> Self {
        Self {
            llm,
            generation_timeout: config.generation_timeout,
            merge_max_tokens: config.merge_max_tokens,
            summary_max_tokens: config.summary_max_tokens,
            summary_sample_size: config.summary_sample_size,
            temperature: config.temperature,
        }
    }

    /// Run `strategy` over `records` (the group's full records, in group order).
    ///
    /// # Errors
    ///
    /// Returns a validation error if fewer than two records are supplied.
    pub async fn execute(
        &self,
        group: &DuplicateGroup,
        records: &[MemoryRecord],
        strategy: ConsolidationStrategy,
    ) -> Result<ConsolidationResult> {
        if records.len() < 2 {
            return Err(RecollectError::Validation(format!(
                "consolidation needs at least two records, got {}",
                records.len()
            )));
        }

        tracing::debug!(
            "Executing {} on group of {} ({})",
            strategy,
            group.len(),
            group.duplicate_type.as_str()
        );

        let result = match strategy {
            ConsolidationStrategy::KeepNewest => keep_by_time(records, true, strategy),
            ConsolidationStrategy::KeepOldest => keep_by_time(records, false, strategy),
            ConsolidationStrategy::MergeContent => self.merge_content(records).await,
            ConsolidationStrategy::CreateSummary => self.create_summary(records).await,
        };

        Ok(result)
    }

    async fn merge_content(&self, records: &[MemoryRecord]) -> ConsolidationResult {
        let requested = ConsolidationStrategy::MergeContent;
        let pair = &records[..2];

        let prompt = format!(
            r#"Merge the following two notes into a single note.

- Keep every piece of information that appears in only one of them.
- Where they contradict each other, prefer the more recent note and mention the change.
- Preserve the chronological context of events.

NOTE 1 (written {}):
{}

NOTE 2 (written {}):
{}"#,
            pair[0].created_at.to_rfc3339(),
            pair[0].content,
            pair[1].created_at.to_rfc3339(),
            pair[1].content
        );

        let merged = match self.generate(&prompt, self.merge_max_tokens, MERGE_SYSTEM_PROMPT).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("Content merge failed, keeping newest instead: {}", e);
                let mut fallback = keep_by_time(records, true, requested);
                let reason = e.to_string();
                fallback.status = MergeStatus::FellBack {
                    from: requested,
                    reason: reason.clone(),
                };
                fallback.metadata.fallback = Some(FallbackInfo {
                    from: requested,
                    to: ConsolidationStrategy::KeepNewest,
                    reason,
                });
                return fallback;
            }
        };

        // The oldest record survives so repeated merges keep a stable identity.
        let ordered = sorted_by_time(records);
        let survivor = ordered[0];
        let removed_ids = ordered
            .iter()
            .filter(|r| r.id != survivor.id)
            .map(|r| r.id.clone())
            .collect();

        let tags = records.iter().flat_map(|r| r.tags.iter().cloned()).collect();
        let original_lengths = pair
            .iter()
            .map(|r| (r.id.clone(), r.content.chars().count()))
            .collect::<BTreeMap<_, _>>();

        ConsolidationResult {
            strategy: requested,
            status: MergeStatus::Completed,
            surviving_id: Some(survivor.id.clone()),
            removed_ids,
            metadata: metadata(
                records,
                requested,
                MergeDetail::Content {
                    tags,
                    original_lengths,
                    merged_length: merged.chars().count(),
                },
            ),
            content: Some(merged),
        }
    }

    async fn create_summary(&self, records: &[MemoryRecord]) -> ConsolidationResult {
        let requested = ConsolidationStrategy::CreateSummary;
        let sample = &records[..records.len().min(self.summary_sample_size)];

        let listing = sample
            .iter()
            .enumerate()
            .map(|(i, r)| format!("[{}] ({}) {}", i + 1, r.created_at.format("%Y-%m-%d"), r.content))
            .collect::<Vec<_>>()
            .join("\n");

        let prompt = format!(
            r#"The following memories cover overlapping ground. Write a short overview
that captures the shared theme and the details that differ between them.

MEMORIES:
{}"#,
            listing
        );

        match self.generate(&prompt, self.summary_max_tokens, SUMMARY_SYSTEM_PROMPT).await {
            Ok(text) => {
                let summary = format!("{}\n\n[Summary of {} memories]", text, sample.len());
                ConsolidationResult {
                    strategy: requested,
                    status: MergeStatus::Completed,
                    surviving_id: None,
                    removed_ids: Vec::new(),
                    metadata: metadata(
                        records,
                        requested,
                        MergeDetail::Summary {
                            summarized_count: sample.len(),
                            summary_length: summary.chars().count(),
                        },
                    ),
                    content: Some(summary),
                }
            }
            Err(e) => {
                tracing::warn!("Summary generation failed, leaving group untouched: {}", e);
                ConsolidationResult {
                    strategy: requested,
                    status: MergeStatus::Failed {
                        reason: e.to_string(),
                    },
                    surviving_id: None,
                    removed_ids: Vec::new(),
                    content: None,
                    metadata: metadata(records, requested, MergeDetail::None),
                }
            }
        }
    }

    /// One generation call under the configured deadline.
    async fn generate(&self, prompt: &str, max_tokens: usize, system_prompt: &str) -> Result<String> {
        let config = LLMConfig::new()
            .with_temperature(self.temperature)
            .with_max_tokens(max_tokens)
            .with_system_prompt(system_prompt);

        let text = tokio::time::timeout(self.generation_timeout, self.llm.generate(prompt, &config))
            .await
            .map_err(|_| RecollectError::GenerationTimeout(self.generation_timeout))?
            .map_err(|e| {
                if e.is_generation() {
                    e
                } else {
                    RecollectError::Generation(e.to_string())
                }
            })?;

        let text = text.trim();
        if text.is_empty() {
            return Err(RecollectError::Generation("empty generation output".to_string()));
        }
        Ok(text.to_string())
    }
}

/// Records ordered oldest first by (last modified, created, id).
fn sorted_by_time(records: &[MemoryRecord]) -> Vec<&MemoryRecord> {
    let mut ordered: Vec<&MemoryRecord> = records.iter().collect();
    ordered.sort_by(|a, b| {
        a.last_modified()
            .cmp(&b.last_modified())
            .then_with(|| a.created_at.cmp(&b.created_at))
            .then_with(|| a.id.cmp(&b.id))
    });
    ordered
}

/// KEEP_NEWEST / KEEP_OLDEST. Deterministic and never fails.
fn keep_by_time(
    records: &[MemoryRecord],
    newest: bool,
    requested: ConsolidationStrategy,
) -> ConsolidationResult {
    let ordered = sorted_by_time(records);
    let survivor = if newest {
        ordered[ordered.len() - 1]
    } else {
        ordered[0]
    };

    let removed_ids: Vec<String> = ordered
        .iter()
        .filter(|r| r.id != survivor.id)
        .map(|r| r.id.clone())
        .collect();

    let strategy = if newest {
        ConsolidationStrategy::KeepNewest
    } else {
        ConsolidationStrategy::KeepOldest
    };

    ConsolidationResult {
        strategy,
        status: MergeStatus::Completed,
        surviving_id: Some(survivor.id.clone()),
        content: Some(survivor.content.clone()),
        metadata: metadata(
            records,
            requested,
            MergeDetail::Timestamp {
                chosen_timestamp: survivor.last_modified(),
                removed_count: removed_ids.len(),
            },
        ),
        removed_ids,
    }
}

fn metadata(
    records: &[MemoryRecord],
    requested: ConsolidationStrategy,
    detail: MergeDetail,
) -> MergeMetadata {
    MergeMetadata {
        requested_strategy: requested,
        source_ids: records.iter().map(|r| r.id.clone()).collect(),
        source_kinds: records
            .iter()
            .map(|r| r.kind.as_str().to_string())
            .collect::<BTreeSet<_>>(),
        fallback: None,
        detail,
        consolidated_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consolidation::types::DuplicateType;
    use crate::llm::StubLLMProvider;
    use crate::memory::MemoryKind;
    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;
    use std::sync::Mutex;

    struct FixedProvider {
        reply: String,
        prompts: Mutex<Vec<String>>,
    }

    impl FixedProvider {
        fn new(reply: &str) -> Self {
            Self {
                reply: reply.to_string(),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LLMProvider for FixedProvider {
        async fn generate(&self, prompt: &str, _config: &LLMConfig) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(self.reply.clone())
        }
    }

    struct SlowProvider;

    #[async_trait]
    impl LLMProvider for SlowProvider {
        async fn generate(&self, _prompt: &str, _config: &LLMConfig) -> Result<String> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok("too late".to_string())
        }
    }

    fn records() -> Vec<MemoryRecord> {
        let base = Utc::now() - ChronoDuration::days(10);
        vec![
            MemoryRecord::new("mid", "Rust 1.80 released")
                .with_created_at(base + ChronoDuration::days(2))
                .with_tag("rust"),
            MemoryRecord::new("old", "Rust 1.80 is out")
                .with_created_at(base)
                .with_tag("release")
                .with_kind(MemoryKind::Episodic { session_id: None }),
            MemoryRecord::new("new", "Rust 1.80 shipped")
                .with_created_at(base + ChronoDuration::days(1))
                .with_updated_at(base + ChronoDuration::days(5)),
        ]
    }

    fn group_of(records: &[MemoryRecord]) -> DuplicateGroup {
        DuplicateGroup {
            memory_ids: records.iter().map(|r| r.id.clone()).collect(),
            similarity_score: 0.9,
            duplicate_type: DuplicateType::NearDuplicate,
            recommended_strategy: None,
        }
    }

    fn executor(llm: Arc<dyn LLMProvider>) -> MergeExecutor {
        MergeExecutor::new(
            llm,
            &ConsolidationConfig::new().with_generation_timeout(Duration::from_millis(50)),
        )
    }

    #[tokio::test]
    async fn keep_newest_uses_update_time() {
        let records = records();
        let result = executor(Arc::new(StubLLMProvider))
            .execute(&group_of(&records), &records, ConsolidationStrategy::KeepNewest)
            .await
            .unwrap();

        assert_eq!(result.surviving_id.as_deref(), Some("new"));
        assert_eq!(result.removed_ids, vec!["old", "mid"]);
        assert_eq!(result.content.as_deref(), Some("Rust 1.80 shipped"));
        assert_eq!(result.status, MergeStatus::Completed);
        assert!(matches!(
            result.metadata.detail,
            MergeDetail::Timestamp { removed_count: 2, .. }
        ));
    }

    #[tokio::test]
    async fn keep_oldest_picks_earliest() {
        let records = records();
        let result = executor(Arc::new(StubLLMProvider))
            .execute(&group_of(&records), &records, ConsolidationStrategy::KeepOldest)
            .await
            .unwrap();

        assert_eq!(result.surviving_id.as_deref(), Some("old"));
        assert!(!result.removed_ids.contains(&"old".to_string()));
        assert_eq!(result.removed_ids.len(), 2);
    }

    #[tokio::test]
    async fn merge_content_anchors_on_oldest() {
        let records = records();
        let provider = Arc::new(FixedProvider::new("Rust 1.80 was released and shipped."));
        let result = executor(provider.clone())
            .execute(&group_of(&records), &records, ConsolidationStrategy::MergeContent)
            .await
            .unwrap();

        assert_eq!(result.strategy, ConsolidationStrategy::MergeContent);
        assert_eq!(result.surviving_id.as_deref(), Some("old"));
        assert_eq!(result.removed_ids, vec!["mid", "new"]);
        assert_eq!(result.content.as_deref(), Some("Rust 1.80 was released and shipped."));

        match &result.metadata.detail {
            MergeDetail::Content {
                tags,
                original_lengths,
                merged_length,
            } => {
                assert!(tags.contains("rust") && tags.contains("release"));
                assert_eq!(original_lengths.len(), 2);
                assert_eq!(original_lengths["mid"], "Rust 1.80 released".len());
                assert_eq!(*merged_length, 35);
            }
            other => panic!("unexpected detail: {:?}", other),
        }

        let kinds: Vec<&str> = result.metadata.source_kinds.iter().map(String::as_str).collect();
        assert_eq!(kinds, vec!["episodic", "semantic"]);

        let prompts = provider.prompts.lock().unwrap();
        assert!(prompts[0].contains("Rust 1.80 released"));
        assert!(prompts[0].contains("Rust 1.80 is out"));
    }

    #[tokio::test]
    async fn merge_content_failure_matches_keep_newest() {
        let records = records();
        let group = group_of(&records);
        let exec = executor(Arc::new(StubLLMProvider));

        let merged = exec
            .execute(&group, &records, ConsolidationStrategy::MergeContent)
            .await
            .unwrap();
        let newest = exec
            .execute(&group, &records, ConsolidationStrategy::KeepNewest)
            .await
            .unwrap();

        assert_eq!(merged.surviving_id, newest.surviving_id);
        assert_eq!(merged.removed_ids, newest.removed_ids);
        assert_eq!(merged.strategy, ConsolidationStrategy::KeepNewest);
        assert!(matches!(
            merged.status,
            MergeStatus::FellBack {
                from: ConsolidationStrategy::MergeContent,
                ..
            }
        ));
        let fallback = merged.metadata.fallback.unwrap();
        assert_eq!(fallback.to, ConsolidationStrategy::KeepNewest);
        assert_eq!(merged.metadata.requested_strategy, ConsolidationStrategy::MergeContent);
    }

    #[tokio::test]
    async fn merge_content_timeout_falls_back() {
        let records = records();
        let result = executor(Arc::new(SlowProvider))
            .execute(&group_of(&records), &records, ConsolidationStrategy::MergeContent)
            .await
            .unwrap();

        assert_eq!(result.surviving_id.as_deref(), Some("new"));
        match result.status {
            MergeStatus::FellBack { reason, .. } => assert!(reason.contains("timed out")),
            other => panic!("expected fallback, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn blank_generation_counts_as_failure() {
        let records = records();
        let result = executor(Arc::new(FixedProvider::new("   \n")))
            .execute(&group_of(&records), &records, ConsolidationStrategy::MergeContent)
            .await
            .unwrap();

        assert_eq!(result.strategy, ConsolidationStrategy::KeepNewest);
    }

    #[tokio::test]
    async fn summary_keeps_all_originals() {
        let records = records();
        let result = executor(Arc::new(FixedProvider::new("Rust 1.80 came out.")))
            .execute(&group_of(&records), &records, ConsolidationStrategy::CreateSummary)
            .await
            .unwrap();

        assert!(result.is_summary());
        assert!(result.surviving_id.is_none());
        assert!(result.removed_ids.is_empty());
        let content = result.content.unwrap();
        assert!(content.starts_with("Rust 1.80 came out."));
        assert!(content.ends_with("[Summary of 3 memories]"));
    }

    #[tokio::test]
    async fn summary_sample_is_capped() {
        let records: Vec<MemoryRecord> = (0..15)
            .map(|i| MemoryRecord::new(format!("m{}", i), format!("note {}", i)))
            .collect();
        let provider = Arc::new(FixedProvider::new("overview"));
        let result = executor(provider.clone())
            .execute(&group_of(&records), &records, ConsolidationStrategy::CreateSummary)
            .await
            .unwrap();

        assert!(result.content.unwrap().ends_with("[Summary of 10 memories]"));
        let prompt = provider.prompts.lock().unwrap()[0].clone();
        assert!(prompt.contains("[10]"));
        assert!(!prompt.contains("[11]"));
    }

    #[tokio::test]
    async fn summary_failure_is_non_destructive() {
        let records = records();
        let result = executor(Arc::new(StubLLMProvider))
            .execute(&group_of(&records), &records, ConsolidationStrategy::CreateSummary)
            .await
            .unwrap();

        assert!(result.status.is_failed());
        assert!(result.removed_ids.is_empty());
        assert!(result.surviving_id.is_none());
        assert!(result.content.is_none());
        assert!(!result.is_summary());
    }

    #[tokio::test]
    async fn merge_content_never_removes_survivor() {
        let mut records = records();
        records.insert(1, records[1].clone());
        let result = executor(Arc::new(FixedProvider::new("merged")))
            .execute(&group_of(&records), &records, ConsolidationStrategy::MergeContent)
            .await
            .unwrap();

        assert_eq!(result.surviving_id.as_deref(), Some("old"));
        assert!(!result.removed_ids.contains(&"old".to_string()));
    }

    #[tokio::test]
    async fn single_record_is_rejected() {
        let records = vec![MemoryRecord::new("a", "alone")];
        let result = executor(Arc::new(StubLLMProvider))
            .execute(&group_of(&records), &records, ConsolidationStrategy::KeepNewest)
            .await;

        assert!(matches!(result, Err(RecollectError::Validation(_))));
    }
}
