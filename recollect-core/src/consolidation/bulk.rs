//! Batch consolidation across every group found in one analysis.

use futures::stream::{self, StreamExt};

use crate::error::Result;

use super::config::ConsolidationRequest;
use super::engine::ConsolidationEngine;
use super::types::{
    BulkConsolidationSummary, DuplicateGroup, DuplicateType, GroupAction, GroupOutcome,
};

/// Reason a group is left alone, or `None` if it may be consolidated.
///
/// Exact groups always qualify. Anything else needs `auto_merge` and a score
/// at or above `auto_merge_threshold`.
pub fn skip_reason(
    group: &DuplicateGroup,
    auto_merge: bool,
    auto_merge_threshold: f64,
) -> Option<String> {
    if group.duplicate_type == DuplicateType::Exact {
        return None;
    }
    if !auto_merge {
        return Some(format!(
            "{} group requires auto_merge",
            group.duplicate_type.as_str()
        ));
    }
    if group.similarity_score < auto_merge_threshold {
        return Some(format!(
            "similarity {:.3} below auto-merge threshold {:.2}",
            group.similarity_score, auto_merge_threshold
        ));
    }
    None
}

impl ConsolidationEngine {
    /// Analyze, then consolidate every qualifying group.
    ///
    /// Groups run concurrently up to `max_concurrent_merges`. A group that
    /// fails is recorded and the rest of the batch continues.
    ///
    /// # Errors
    ///
    /// Only request validation errors from the analysis are returned.
    pub async fn bulk_consolidate(
        &self,
        request: &ConsolidationRequest,
    ) -> Result<BulkConsolidationSummary> {
        let groups = self.analyze_duplicates(request).await?;
        let config = self.config();

        let mut details: Vec<Option<GroupOutcome>> = Vec::with_capacity(groups.len());
        let mut pending = Vec::new();

        for (index, group) in groups.into_iter().enumerate() {
            match skip_reason(&group, request.auto_merge, config.auto_merge_threshold) {
                Some(reason) => {
                    tracing::debug!("Skipping group of {}: {}", group.len(), reason);
                    details.push(Some(GroupOutcome {
                        group,
                        action: GroupAction::Skipped { reason },
                    }));
                }
                None => {
                    details.push(None);
                    pending.push((index, group));
                }
            }
        }

        let completed: Vec<(usize, GroupOutcome)> = stream::iter(pending)
            .map(|(index, group)| async move {
                let action = match self.consolidate_group(&group, None).await {
                    Ok(result) => GroupAction::Consolidated { result },
                    Err(e) => {
                        tracing::warn!("Failed to consolidate group {:?}: {}", group.memory_ids, e);
                        GroupAction::Failed {
                            error: e.to_string(),
                        }
                    }
                };
                (index, GroupOutcome { group, action })
            })
            .buffer_unordered(config.max_concurrent_merges.max(1))
            .collect()
            .await;

        for (index, outcome) in completed {
            details[index] = Some(outcome);
        }

        let mut summary = BulkConsolidationSummary {
            groups_found: details.len(),
            ..Default::default()
        };

        for outcome in details.into_iter().flatten() {
            if let GroupAction::Consolidated { result } = &outcome.action {
                if !result.status.is_failed() {
                    summary.groups_consolidated += 1;
                    if !config.dry_run {
                        summary.memories_removed += result.removed_ids.len();
                    }
                }
            }
            summary.details.push(outcome);
        }

        tracing::info!(
            "Bulk consolidation: {} groups found, {} consolidated, {} memories removed",
            summary.groups_found,
            summary.groups_consolidated,
            summary.memories_removed
        );

        Ok(summary)
    }
}
