//! Connected-component clustering of similarity edges.
//!
//! Nodes live in an arena indexed by discovery order; traversal is an
//! explicit-stack DFS so group size never affects call-stack depth.

use std::collections::HashMap;

use super::config::SimilarityThresholds;
use super::types::{DuplicateGroup, DuplicateType, EdgeKind, SimilarityEdge};

/// Turns similarity edges into duplicate groups.
#[derive(Debug, Clone)]
pub struct DuplicateGrouper {
    thresholds: SimilarityThresholds,
}

/// Per-call graph; never shared between calls.
struct EdgeGraph<'a> {
    ids: Vec<&'a str>,
    index: HashMap<&'a str, usize>,
    adjacency: Vec<Vec<usize>>,
}

impl<'a> EdgeGraph<'a> {
    fn build(edges: &'a [SimilarityEdge]) -> Self {
        let mut graph = Self {
            ids: Vec::new(),
            index: HashMap::new(),
            adjacency: Vec::new(),
        };

        for edge in edges {
            let a = graph.node(edge.id_a.as_str());
            let b = graph.node(edge.id_b.as_str());
            if a != b {
                graph.adjacency[a].push(b);
                graph.adjacency[b].push(a);
            }
        }

        graph
    }

    fn node(&mut self, id: &'a str) -> usize {
        if let Some(&existing) = self.index.get(id) {
            return existing;
        }
        let next = self.ids.len();
        self.ids.push(id);
        self.index.insert(id, next);
        self.adjacency.push(Vec::new());
        next
    }

    /// Component index for every node, plus the component count.
    fn components(&self) -> (Vec<usize>, usize) {
        let mut component = vec![usize::MAX; self.ids.len()];
        let mut count = 0;
        let mut stack = Vec::new();

        for start in 0..self.ids.len() {
            if component[start] != usize::MAX {
                continue;
            }
            component[start] = count;
            stack.push(start);

            while let Some(current) = stack.pop() {
                for &next in &self.adjacency[current] {
                    if component[next] == usize::MAX {
                        component[next] = count;
                        stack.push(next);
                    }
                }
            }
            count += 1;
        }

        (component, count)
    }
}

impl DuplicateGrouper {
    pub fn new(thresholds: SimilarityThresholds) -> Self {
        Self { thresholds }
    }

    /// Group edges into connected components of two or more records,
    /// most confident first.
    pub fn group(&self, edges: &[SimilarityEdge]) -> Vec<DuplicateGroup> {
        if edges.is_empty() {
            return Vec::new();
        }

        let graph = EdgeGraph::build(edges);
        let (component, count) = graph.components();

        let mut members: Vec<Vec<String>> = vec![Vec::new(); count];
        for (node, &c) in component.iter().enumerate() {
            members[c].push(graph.ids[node].to_string());
        }

        // (score sum, edge count, all edges exact)
        let mut stats: Vec<(f64, usize, bool)> = vec![(0.0, 0, true); count];
        for edge in edges.iter().filter(|e| e.id_a != e.id_b) {
            if let Some(&node) = graph.index.get(edge.id_a.as_str()) {
                let entry = &mut stats[component[node]];
                entry.0 += edge.score;
                entry.1 += 1;
                entry.2 &= edge.kind == EdgeKind::Exact;
            }
        }

        let mut groups: Vec<DuplicateGroup> = members
            .into_iter()
            .zip(stats)
            .filter(|(ids, _)| ids.len() >= 2)
            .map(|(memory_ids, (sum, n, all_exact))| {
                let similarity_score = if n == 0 { 0.0 } else { sum / n as f64 };
                DuplicateGroup {
                    memory_ids,
                    similarity_score,
                    duplicate_type: self.classify(similarity_score, all_exact),
                    recommended_strategy: None,
                }
            })
            .collect();

        groups.sort_by(|a, b| b.similarity_score.total_cmp(&a.similarity_score));

        tracing::debug!(
            "Grouped {} edges into {} duplicate groups",
            edges.len(),
            groups.len()
        );

        groups
    }

    /// Exact only when the score clears the exact band and every pair in the
    /// group had identical text.
    fn classify(&self, score: f64, all_exact: bool) -> DuplicateType {
        if score >= self.thresholds.exact && all_exact {
            DuplicateType::Exact
        } else if score >= self.thresholds.high {
            DuplicateType::NearDuplicate
        } else {
            DuplicateType::Similar
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn edge(a: &str, b: &str, score: f64, kind: EdgeKind) -> SimilarityEdge {
        SimilarityEdge {
            id_a: a.to_string(),
            id_b: b.to_string(),
            score,
            kind,
        }
    }

    fn grouper() -> DuplicateGrouper {
        DuplicateGrouper::new(SimilarityThresholds::default())
    }

    #[test]
    fn empty_edges_yield_no_groups() {
        assert!(grouper().group(&[]).is_empty());
    }

    #[test]
    fn transitive_pairs_form_one_group() {
        let edges = vec![
            edge("a", "b", 0.9, EdgeKind::Semantic),
            edge("b", "c", 0.8, EdgeKind::Partial),
        ];

        let groups = grouper().group(&edges);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].memory_ids, vec!["a", "b", "c"]);
        assert!((groups[0].similarity_score - 0.85).abs() < 1e-9);
        assert_eq!(groups[0].duplicate_type, DuplicateType::NearDuplicate);
    }

    #[test]
    fn groups_are_disjoint_and_sorted() {
        let edges = vec![
            edge("a", "b", 0.75, EdgeKind::Partial),
            edge("x", "y", 0.99, EdgeKind::Exact),
            edge("c", "b", 0.72, EdgeKind::Partial),
            edge("p", "q", 0.9, EdgeKind::Semantic),
        ];

        let groups = grouper().group(&edges);
        let scores: Vec<f64> = groups.iter().map(|g| g.similarity_score).collect();
        assert_eq!(groups.len(), 3);
        assert!(scores.windows(2).all(|w| w[0] >= w[1]));

        assert_eq!(groups[0].duplicate_type, DuplicateType::Exact);
        assert_eq!(groups[2].duplicate_type, DuplicateType::Similar);

        let mut seen = HashSet::new();
        for group in &groups {
            assert!(group.memory_ids.len() >= 2);
            for id in &group.memory_ids {
                assert!(seen.insert(id.clone()), "{} appears in two groups", id);
            }
        }
    }

    #[test]
    fn high_score_with_semantic_edge_is_not_exact() {
        let groups = grouper().group(&[edge("a", "b", 0.97, EdgeKind::Semantic)]);
        assert_eq!(groups[0].duplicate_type, DuplicateType::NearDuplicate);
    }

    #[test]
    fn self_edges_do_not_inflate_score() {
        let edges = vec![
            edge("a", "a", 1.0, EdgeKind::Exact),
            edge("a", "b", 0.87, EdgeKind::Semantic),
        ];

        let groups = grouper().group(&edges);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].memory_ids, vec!["a", "b"]);
        assert!((groups[0].similarity_score - 0.87).abs() < 1e-9);
    }

    #[test]
    fn long_chain_does_not_recurse() {
        let edges: Vec<SimilarityEdge> = (0..50_000)
            .map(|i| edge(&format!("n{}", i), &format!("n{}", i + 1), 0.8, EdgeKind::Partial))
            .collect();

        let groups = grouper().group(&edges);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].len(), 50_001);
    }
}
