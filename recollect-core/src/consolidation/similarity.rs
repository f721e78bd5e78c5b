//! Pairwise similarity scoring and pair classification.

use std::collections::HashSet;

use crate::memory::MemoryRecord;

use super::config::SimilarityThresholds;
use super::types::{EdgeKind, SimilarityEdge};

/// Cosine similarity between two vectors, clamped to [0, 1].
///
/// Returns 0.0 for empty, mismatched or zero-magnitude vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let (mut dot, mut mag_a, mut mag_b) = (0.0f64, 0.0f64, 0.0f64);
    for (x, y) in a.iter().zip(b.iter()) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        mag_a += x * x;
        mag_b += y * y;
    }
    let denom = mag_a.sqrt() * mag_b.sqrt();
    if denom < f64::EPSILON || !denom.is_finite() {
        0.0
    } else {
        (dot / denom).clamp(0.0, 1.0)
    }
}

/// Lowercase, trim and collapse whitespace. Punctuation is significant.
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Scores record pairs and keeps the ones worth grouping.
#[derive(Debug, Clone)]
pub struct SimilarityAnalyzer {
    thresholds: SimilarityThresholds,
    max_records: usize,
}

impl SimilarityAnalyzer {
    pub fn new(thresholds: SimilarityThresholds, max_records: usize) -> Self {
        Self {
            thresholds,
            max_records,
        }
    }

    /// Classify a pair score, or `None` if it falls below the moderate band.
    ///
    /// An exact-band score only counts as [`EdgeKind::Exact`] when the
    /// normalized texts are identical.
    pub fn classify(&self, score: f64, text_a: &str, text_b: &str) -> Option<EdgeKind> {
        self.band(score, normalize_text(text_a) == normalize_text(text_b))
    }

    fn band(&self, score: f64, same_text: bool) -> Option<EdgeKind> {
        if score >= self.thresholds.exact {
            Some(if same_text { EdgeKind::Exact } else { EdgeKind::Semantic })
        } else if score >= self.thresholds.high {
            Some(EdgeKind::Semantic)
        } else if score >= self.thresholds.moderate {
            Some(EdgeKind::Partial)
        } else {
            None
        }
    }

    /// Compute similarity edges at or above `threshold`.
    ///
    /// Records without an embedding are skipped, and a repeated id is only
    /// scored once. At most the configured number of records is compared;
    /// the rest are dropped with a warning.
    pub fn analyze(&self, records: &[MemoryRecord], threshold: f64) -> Vec<SimilarityEdge> {
        let mut seen = HashSet::new();
        let mut embedded: Vec<(&MemoryRecord, &[f32], String)> = records
            .iter()
            .filter(|r| seen.insert(r.id.as_str()))
            .filter_map(|r| match &r.embedding {
                Some(e) if !e.is_empty() => Some((r, e.as_slice(), normalize_text(&r.content))),
                _ => None,
            })
            .collect();

        let skipped = records.len() - embedded.len();
        if skipped > 0 {
            tracing::debug!("Skipping {} repeated or unembedded memories", skipped);
        }

        if embedded.len() > self.max_records {
            tracing::warn!(
                "Truncating similarity analysis from {} to {} memories",
                embedded.len(),
                self.max_records
            );
            embedded.truncate(self.max_records);
        }

        let cutoff = threshold.max(self.thresholds.moderate);
        let mut edges = Vec::new();

        for i in 0..embedded.len() {
            for j in (i + 1)..embedded.len() {
                let (rec_a, emb_a, norm_a) = &embedded[i];
                let (rec_b, emb_b, norm_b) = &embedded[j];
                if rec_a.id == rec_b.id {
                    continue;
                }

                let score = cosine_similarity(emb_a, emb_b);
                if score < cutoff {
                    continue;
                }
                let Some(kind) = self.band(score, norm_a == norm_b) else {
                    continue;
                };

                edges.push(SimilarityEdge {
                    id_a: rec_a.id.clone(),
                    id_b: rec_b.id.clone(),
                    score,
                    kind,
                });
            }
        }

        tracing::debug!(
            "Found {} similarity edges among {} memories (cutoff {:.2})",
            edges.len(),
            embedded.len(),
            cutoff
        );

        edges
    }
}
