//! Heuristic strategy recommendation for duplicate groups.

use crate::memory::MemoryRecord;

use super::types::{ConsolidationStrategy, DuplicateGroup, DuplicateType};

/// Records the selector inspects beyond the group itself.
pub const SAMPLE_SIZE: usize = 2;

/// Recommends a merge strategy for a group. Never fails.
#[derive(Debug, Clone)]
pub struct StrategySelector {
    length_variance_threshold: f64,
}

impl StrategySelector {
    pub fn new(length_variance_threshold: f64) -> Self {
        Self {
            length_variance_threshold,
        }
    }

    /// Whether [`Self::select`] needs a record sample for this group.
    pub fn needs_sample(group: &DuplicateGroup) -> bool {
        group.duplicate_type != DuplicateType::Exact
    }

    /// Pick a strategy from the group and a sample of its first records.
    ///
    /// - exact groups keep the newest record
    /// - a large length asymmetry between the first two records merges content
    /// - low-confidence groups are summarized, never destructively merged
    /// - everything else merges content
    ///
    /// Without at least two sampled records the answer is KEEP_NEWEST.
    pub fn select(&self, group: &DuplicateGroup, sample: &[MemoryRecord]) -> ConsolidationStrategy {
        if group.duplicate_type == DuplicateType::Exact {
            return ConsolidationStrategy::KeepNewest;
        }

        let [first, second, ..] = sample else {
            return ConsolidationStrategy::KeepNewest;
        };

        let variance = length_variance(&[first.content.chars().count(), second.content.chars().count()]);
        if variance > self.length_variance_threshold {
            return ConsolidationStrategy::MergeContent;
        }

        match group.duplicate_type {
            DuplicateType::Similar => ConsolidationStrategy::CreateSummary,
            _ => ConsolidationStrategy::MergeContent,
        }
    }
}

/// Population variance of character lengths.
fn length_variance(lengths: &[usize]) -> f64 {
    if lengths.is_empty() {
        return 0.0;
    }
    let n = lengths.len() as f64;
    let mean = lengths.iter().map(|&l| l as f64).sum::<f64>() / n;
    lengths
        .iter()
        .map(|&l| {
            let d = l as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / n
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(duplicate_type: DuplicateType) -> DuplicateGroup {
        DuplicateGroup {
            memory_ids: vec!["a".to_string(), "b".to_string()],
            similarity_score: 0.9,
            duplicate_type,
            recommended_strategy: None,
        }
    }

    fn sample(len_a: usize, len_b: usize) -> Vec<MemoryRecord> {
        vec![
            MemoryRecord::new("a", "x".repeat(len_a)),
            MemoryRecord::new("b", "y".repeat(len_b)),
        ]
    }

    fn selector() -> StrategySelector {
        StrategySelector::new(10_000.0)
    }

    #[test]
    fn exact_keeps_newest_without_sample() {
        assert!(!StrategySelector::needs_sample(&group(DuplicateType::Exact)));
        assert_eq!(
            selector().select(&group(DuplicateType::Exact), &[]),
            ConsolidationStrategy::KeepNewest
        );
    }

    #[test]
    fn length_asymmetry_merges_content() {
        // lengths 10 and 500: variance = 245^2 = 60025
        assert_eq!(
            selector().select(&group(DuplicateType::Similar), &sample(10, 500)),
            ConsolidationStrategy::MergeContent
        );
    }

    #[test]
    fn similar_with_comparable_lengths_summarizes() {
        assert_eq!(
            selector().select(&group(DuplicateType::Similar), &sample(100, 120)),
            ConsolidationStrategy::CreateSummary
        );
    }

    #[test]
    fn near_duplicate_defaults_to_merge() {
        assert_eq!(
            selector().select(&group(DuplicateType::NearDuplicate), &sample(100, 120)),
            ConsolidationStrategy::MergeContent
        );
    }

    #[test]
    fn short_sample_defaults_to_keep_newest() {
        let one = vec![MemoryRecord::new("a", "only")];
        assert_eq!(
            selector().select(&group(DuplicateType::Similar), &one),
            ConsolidationStrategy::KeepNewest
        );
    }

    #[test]
    fn variance_of_two_lengths() {
        assert_eq!(length_variance(&[0, 200]), 10_000.0);
        assert_eq!(length_variance(&[]), 0.0);
    }
}
