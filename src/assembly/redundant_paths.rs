//! Redundant Path (Bubble) Removal
//! ===============================
//!
//! From every node that branches on one side, all branches are walked in
//! lock-step for at most `length_threshold` nodes. When a second branch arrives
//! at a node that has several inbound links on the arrival side, the branches
//! that enter it from the same side form a bubble. The branch with the highest
//! mean coverage survives; nodes exclusive to the other branches are removed.

use crate::assembly::graph::{DeBruijnGraph, Extension, Side};
use crate::assembly::purger::{DeBruijnPath, GraphErrorPurger};
use crate::core::data_structures::NodeId;
use crate::core::kmer::KmerData;
use ahash::AHashSet;
use rayon::prelude::*;
use std::cmp::Ordering;

/// Parallel branches sharing both end nodes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathCluster {
    pub paths: Vec<DeBruijnPath>,
}

impl PathCluster {
    fn start(&self) -> Option<NodeId> {
        self.paths.first().and_then(DeBruijnPath::first)
    }

    fn end(&self) -> Option<NodeId> {
        self.paths.first().and_then(DeBruijnPath::last)
    }
}

#[derive(Debug, Clone)]
struct BranchWalk {
    nodes: Vec<NodeId>,
    /// Next step follows left extensions
    grows_left: bool,
    finished: bool,
}

#[derive(Debug, Clone)]
pub struct RedundantPathsPurger {
    length_threshold: usize,
}

impl RedundantPathsPurger {
    pub fn new(length_threshold: usize) -> Self {
        Self { length_threshold }
    }

    /// Find bubbles, keeping one copy of bubbles reachable from both ends
    pub fn detect_redundant_paths(&self, graph: &DeBruijnGraph) -> Vec<PathCluster> {
        let clusters: Vec<PathCluster> = graph
            .live_node_ids()
            .into_par_iter()
            .flat_map_iter(|id| {
                let node = graph.node(id);
                let mut found = Vec::new();
                if node.right_extension_count() > 1 {
                    self.trace_diverging_paths(graph, id, node.extensions(Side::Right), true, &mut found);
                }
                if node.left_extension_count() > 1 {
                    self.trace_diverging_paths(graph, id, node.extensions(Side::Left), false, &mut found);
                }
                found
            })
            .collect();

        Self::remove_duplicates(graph, clusters)
    }

    fn trace_diverging_paths(
        &self,
        graph: &DeBruijnGraph,
        start: NodeId,
        divergent: Vec<Extension>,
        is_forward: bool,
        clusters: &mut Vec<PathCluster>,
    ) {
        let mut walks: Vec<BranchWalk> = divergent
            .into_iter()
            .map(|extension| BranchWalk {
                nodes: vec![start, extension.target],
                grows_left: is_forward ^ extension.same_orientation,
                finished: false,
            })
            .collect();

        let mut length = 2;
        let mut finished = 0;
        let mut possible_ends: AHashSet<NodeId> = AHashSet::new();
        let mut convergent: Option<NodeId> = None;

        while length <= self.length_threshold && finished != walks.len() && convergent.is_none() {
            for walk in walks.iter_mut().filter(|walk| !walk.finished) {
                let Some(&tail) = walk.nodes.last() else {
                    continue;
                };
                let side = if walk.grows_left { Side::Left } else { Side::Right };
                let extensions = graph.node(tail).extensions(side);

                if extensions.len() != 1 {
                    walk.finished = true;
                    finished += 1;
                    continue;
                }

                let next = extensions[0];
                if walk.nodes.contains(&next.target) {
                    // cycle
                    walk.finished = true;
                    finished += 1;
                    continue;
                }

                walk.grows_left = !(walk.grows_left ^ next.same_orientation);
                walk.nodes.push(next.target);

                let arriving = graph.node(next.target);
                let inbound = if walk.grows_left {
                    arriving.right_extension_count()
                } else {
                    arriving.left_extension_count()
                };
                if inbound > 1 {
                    if possible_ends.contains(&next.target) {
                        walk.finished = true;
                        finished += 1;
                        convergent = Some(next.target);
                    } else {
                        possible_ends.insert(next.target);
                    }
                }
            }

            length += 1;

            if let Some(node) = convergent.take() {
                if Self::confirm_redundant_paths(graph, node, &mut walks, clusters) {
                    return;
                }
            }
        }
    }

    /// Cut the walks that reached `convergent` and group those entering it
    /// from the same side
    fn confirm_redundant_paths(
        graph: &DeBruijnGraph,
        convergent: NodeId,
        walks: &mut [BranchWalk],
        clusters: &mut Vec<PathCluster>,
    ) -> bool {
        let mut converging: Vec<&mut BranchWalk> = walks
            .iter_mut()
            .filter(|walk| walk.nodes.contains(&convergent))
            .collect();

        for walk in converging.iter_mut() {
            if let Some(position) = walk.nodes.iter().position(|&n| n == convergent) {
                walk.nodes.truncate(position + 1);
            }
        }

        let mut found = false;
        for side in [Side::Left, Side::Right] {
            let entry_nodes: AHashSet<NodeId> = graph
                .node(convergent)
                .extensions(side)
                .iter()
                .map(|e| e.target)
                .collect();

            let same_side: Vec<DeBruijnPath> = converging
                .iter()
                .filter(|walk| {
                    walk.nodes.len() >= 2 && entry_nodes.contains(&walk.nodes[walk.nodes.len() - 2])
                })
                .map(|walk| DeBruijnPath::new(walk.nodes.clone()))
                .collect();

            if same_side.len() > 1 {
                found = true;
                clusters.push(PathCluster { paths: same_side });
            }
        }

        found
    }

    /// A bubble found from both of its ends is kept once: the copy whose
    /// start k-mer is not smaller than its end k-mer
    fn remove_duplicates(graph: &DeBruijnGraph, clusters: Vec<PathCluster>) -> Vec<PathCluster> {
        let ends: Vec<(Option<NodeId>, Option<NodeId>)> =
            clusters.iter().map(|c| (c.start(), c.end())).collect();

        clusters
            .into_iter()
            .enumerate()
            .filter(|(i, _)| {
                let (start, end) = ends[*i];
                let (Some(start), Some(end)) = (start, end) else {
                    return false;
                };
                let mirrored = ends
                    .iter()
                    .any(|&(s, e)| s == Some(end) && e == Some(start));
                !mirrored || graph.node(start).kmer() >= graph.node(end).kmer()
            })
            .map(|(_, cluster)| cluster)
            .collect()
    }

    /// Highest mean coverage wins; ties go to the lexicographically smallest
    /// sequence of node k-mers
    fn best_path_index(graph: &DeBruijnGraph, cluster: &PathCluster) -> usize {
        let kmers = |path: &DeBruijnPath| -> Vec<KmerData> {
            path.nodes.iter().map(|&id| graph.node(id).kmer()).collect()
        };

        let mut best = 0;
        for (i, path) in cluster.paths.iter().enumerate().skip(1) {
            let candidate = path.average_coverage(graph);
            let current = cluster.paths[best].average_coverage(graph);
            let better = match candidate.partial_cmp(&current) {
                Some(Ordering::Greater) => true,
                Some(Ordering::Equal) => kmers(path) < kmers(&cluster.paths[best]),
                _ => false,
            };
            if better {
                best = i;
            }
        }
        best
    }

    /// Nodes to delete from each cluster: every branch except the winner,
    /// minus the nodes it shares with the winner
    pub fn redundant_nodes(graph: &DeBruijnGraph, clusters: &[PathCluster]) -> Vec<DeBruijnPath> {
        let mut removals = Vec::new();
        for cluster in clusters {
            let best = Self::best_path_index(graph, cluster);
            let keep: AHashSet<NodeId> = cluster.paths[best].nodes.iter().copied().collect();
            for (i, path) in cluster.paths.iter().enumerate() {
                if i != best {
                    removals.push(DeBruijnPath::new(
                        path.nodes.iter().copied().filter(|n| !keep.contains(n)).collect(),
                    ));
                }
            }
        }
        removals
    }
}

impl GraphErrorPurger for RedundantPathsPurger {
    fn name(&self) -> &'static str {
        "redundant paths purger"
    }

    fn length_threshold(&self) -> usize {
        self.length_threshold
    }

    fn set_length_threshold(&mut self, threshold: usize) {
        self.length_threshold = threshold;
    }

    fn detect_erroneous_nodes(&self, graph: &DeBruijnGraph) -> Vec<DeBruijnPath> {
        let clusters = self.detect_redundant_paths(graph);
        Self::redundant_nodes(graph, &clusters)
    }

    fn remove_erroneous_nodes(&self, graph: &mut DeBruijnGraph, paths: &[DeBruijnPath]) -> usize {
        let doomed: AHashSet<NodeId> = paths
            .iter()
            .flat_map(|path| path.nodes.iter().copied())
            .collect();

        let mut ordered: Vec<NodeId> = doomed.iter().copied().collect();
        ordered.sort_unstable();
        for &node in &ordered {
            graph.detach(node, &doomed);
        }
        graph.remove_nodes(ordered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::kmer::reverse_complement;

    const SOURCE: &str = "GATTACAGGCTTCAAGGTCCATGCAACGTGAGTTCCA";
    const VARIANT: &str = "GATTACAGGCTTCAAGGTACATGCAACGTGAGTTCCA";

    fn tiled(sequence: &str, start: usize, stop: usize) -> Vec<String> {
        (start..stop)
            .step_by(3)
            .map(|i| sequence[i..i + 16].to_string())
            .collect()
    }

    fn bubble_reads() -> Vec<String> {
        let mut reads = tiled(SOURCE, 0, SOURCE.len() - 15);
        reads.push(SOURCE[SOURCE.len() - 16..].to_string());
        let mut doubled = reads.clone();
        doubled.extend(reads);
        doubled.extend(tiled(VARIANT, 4, VARIANT.len() - 19));
        doubled
    }

    #[test]
    fn test_bubble_detected_once() {
        let graph = DeBruijnGraph::build(bubble_reads(), 7).unwrap();
        assert_eq!(graph.node_count(), 38);
        assert_eq!(graph.extension_count(), 76);

        let purger = RedundantPathsPurger::new(24);
        let clusters = purger.detect_redundant_paths(&graph);
        assert_eq!(clusters.len(), 1);

        let removals = RedundantPathsPurger::redundant_nodes(&graph, &clusters);
        assert_eq!(removals.len(), 1);
        assert_eq!(removals[0].len(), 7);
    }

    #[test]
    fn test_removal_leaves_source_graph() {
        let mut graph = DeBruijnGraph::build(bubble_reads(), 7).unwrap();
        let clean = DeBruijnGraph::build(vec![SOURCE], 7).unwrap();

        let purger = RedundantPathsPurger::new(24);
        let paths = purger.detect_erroneous_nodes(&graph);
        assert_eq!(purger.remove_erroneous_nodes(&mut graph, &paths), 7);

        assert_eq!(graph.node_count(), 31);
        assert_eq!(graph.extension_count(), 60);
        assert_eq!(graph.node_count(), clean.node_count());
        assert_eq!(graph.extension_count(), clean.extension_count());
        assert!(purger.detect_erroneous_nodes(&graph).is_empty());
    }

    #[test]
    fn test_equal_coverage_keeps_smallest_kmer_branch() {
        let kept = DeBruijnGraph::build(vec![VARIANT], 7).unwrap();
        let orders = [
            vec![SOURCE.to_string(), VARIANT.to_string()],
            vec![VARIANT.to_string(), SOURCE.to_string()],
            vec![reverse_complement(SOURCE), VARIANT.to_string()],
        ];

        for reads in orders {
            let mut graph = DeBruijnGraph::build(reads, 7).unwrap();
            let purger = RedundantPathsPurger::new(24);
            let clusters = purger.detect_redundant_paths(&graph);
            assert_eq!(clusters.len(), 1);
            // both branches are covered once
            let coverages: Vec<f64> = clusters[0]
                .paths
                .iter()
                .map(|path| path.average_coverage(&graph))
                .collect();
            assert!(coverages.windows(2).all(|w| w[0] == w[1]));

            let paths = purger.detect_erroneous_nodes(&graph);
            assert_eq!(purger.remove_erroneous_nodes(&mut graph, &paths), 7);
            assert_eq!(graph.node_count(), 31);
            for i in 0..=VARIANT.len() - 7 {
                assert!(graph.find(&VARIANT[i..i + 7]).is_some());
            }
            assert_eq!(graph.extension_count(), kept.extension_count());
        }
    }

    #[test]
    fn test_short_threshold_misses_bubble() {
        let graph = DeBruijnGraph::build(bubble_reads(), 7).unwrap();
        let purger = RedundantPathsPurger::new(3);
        assert!(purger.detect_redundant_paths(&graph).is_empty());
    }

    #[test]
    fn test_no_bubble_in_linear_graph() {
        let graph = DeBruijnGraph::build(vec![SOURCE], 7).unwrap();
        let purger = RedundantPathsPurger::new(24);
        assert!(purger.detect_erroneous_nodes(&graph).is_empty());
    }
}
