//! Simple-path contig construction
//!
//! Contigs are read off a pruned copy of the graph adjacency in which every
//! branching side, every palindromic node and every single self-link is cut.
//! In the pruned view each side has at most one link, so the graph falls
//! apart into linear paths, isolated nodes and simple cycles.
//!
//! Palindromic k-mers (even k only) are always split off as their own contig;
//! the walk cannot tell which of the two equivalent strands to continue on.

use crate::assembly::graph::{DeBruijnGraph, Extension, Side};
use crate::core::data_structures::{Contig, ContigType, NodeId};
use ahash::AHashSet;
use std::collections::VecDeque;
use tracing::{debug, info};

/// Turns a cleaned graph into contig sequences
pub trait ContigBuilder: Send + Sync {
    fn build(&self, graph: &DeBruijnGraph) -> Vec<Contig>;
}

/// Deletes the nodes of poorly supported contigs from the graph
pub trait LowCoverageContigPurger: Send + Sync {
    /// Returns the number of nodes removed
    fn remove_low_coverage_contigs(&self, graph: &mut DeBruijnGraph, threshold: f64) -> usize;
}

/// One unambiguous walk through the pruned view
#[derive(Debug, Clone)]
struct SimplePath {
    nodes: Vec<NodeId>,
    sequence: String,
    contig_type: ContigType,
}

impl SimplePath {
    fn average_coverage(&self, graph: &DeBruijnGraph) -> f64 {
        if self.nodes.is_empty() {
            return 0.0;
        }
        let total: u64 = self
            .nodes
            .iter()
            .map(|&id| u64::from(graph.node(id).count()))
            .sum();
        total as f64 / self.nodes.len() as f64
    }
}

/// Per-node left/right slots after pruning; `None` for deleted nodes
struct PrunedView {
    slots: Vec<Option<[[Option<Extension>; 4]; 2]>>,
}

impl PrunedView {
    fn new(graph: &DeBruijnGraph) -> Self {
        let mut cut_pairs: AHashSet<(NodeId, NodeId)> = AHashSet::new();
        let mut cut_self_links: AHashSet<(NodeId, Side)> = AHashSet::new();

        for (id, node) in graph.nodes() {
            let palindrome = node.is_palindrome();
            for side in [Side::Left, Side::Right] {
                let targets: Vec<NodeId> = node.slots(side).iter().flatten().map(|e| e.target).collect();
                if palindrome || targets.len() > 1 {
                    for target in targets {
                        cut_pairs.insert((id, target));
                        cut_pairs.insert((target, id));
                    }
                } else if targets.len() == 1 && targets[0] == id {
                    cut_self_links.insert((id, side));
                }
            }
        }

        let slots = (0..graph.capacity())
            .map(|index| {
                let id = NodeId(index);
                let node = graph.node(id);
                if node.is_deleted() {
                    return None;
                }
                let mut sides = [*node.slots(Side::Left), *node.slots(Side::Right)];
                for (side, table) in [Side::Left, Side::Right].into_iter().zip(sides.iter_mut()) {
                    for slot in table.iter_mut() {
                        let keep = match slot {
                            Some(e) => {
                                !cut_pairs.contains(&(id, e.target))
                                    && !(e.target == id && cut_self_links.contains(&(id, side)))
                                    && !graph.node(e.target).is_deleted()
                            }
                            None => true,
                        };
                        if !keep {
                            *slot = None;
                        }
                    }
                }
                Some(sides)
            })
            .collect();

        Self { slots }
    }

    fn side_slots(&self, id: NodeId, side: Side) -> &[Option<Extension>; 4] {
        const EMPTY: [Option<Extension>; 4] = [None; 4];
        match &self.slots[id.index()] {
            Some(sides) => match side {
                Side::Left => &sides[0],
                Side::Right => &sides[1],
            },
            None => &EMPTY,
        }
    }

    fn count(&self, id: NodeId, side: Side) -> usize {
        self.side_slots(id, side).iter().flatten().count()
    }

    fn first(&self, id: NodeId, side: Side) -> Option<Extension> {
        self.side_slots(id, side).iter().flatten().next().copied()
    }
}

#[derive(Debug, Clone, Default)]
pub struct SimplePathContigBuilder;

impl SimplePathContigBuilder {
    pub fn new() -> Self {
        Self
    }

    fn simple_paths(&self, graph: &DeBruijnGraph) -> Vec<SimplePath> {
        let view = PrunedView::new(graph);
        let mut visited = vec![false; graph.capacity()];
        let mut paths = Vec::new();
        let live = graph.live_node_ids();

        for &id in &live {
            let left = view.count(id, Side::Left);
            let right = view.count(id, Side::Right);

            if left + right == 0 {
                visited[id.index()] = true;
                paths.push(SimplePath {
                    nodes: vec![id],
                    sequence: graph.node(id).kmer().to_string(),
                    contig_type: ContigType::Singleton,
                });
            } else if left == 1 && right == 0 {
                paths.extend(Self::trace_simple_path(graph, &view, &mut visited, id, false, true));
            } else if right == 1 && left == 0 {
                paths.extend(Self::trace_simple_path(graph, &view, &mut visited, id, true, true));
            }
        }

        // Anything left over sits on a cycle
        for &id in &live {
            if !visited[id.index()] {
                paths.extend(Self::trace_simple_path(graph, &view, &mut visited, id, true, false));
            }
        }

        paths
    }

    /// Walk from `start` until an end, a cut, or a node already on the path.
    ///
    /// A linear path is found from both of its ends; with `skip_mirrored` set
    /// only the walk whose first k-mer is not smaller than its last is kept.
    fn trace_simple_path(
        graph: &DeBruijnGraph,
        view: &PrunedView,
        visited: &mut [bool],
        start: NodeId,
        forward: bool,
        skip_mirrored: bool,
    ) -> Option<SimplePath> {
        let mut sequence: VecDeque<u8> = graph.node(start).kmer().to_string().into_bytes().into();
        let mut path = vec![start];
        let mut on_path: AHashSet<NodeId> = AHashSet::new();
        on_path.insert(start);
        visited[start.index()] = true;

        let start_side = if forward { Side::Right } else { Side::Left };
        let mut next = view.first(start, start_side);
        let mut closed = false;

        while let Some(extension) = next.take() {
            let (node, same) = (extension.target, extension.same_orientation);
            visited[node.index()] = true;
            let side = if forward ^ same { Side::Left } else { Side::Right };

            if on_path.contains(&node) {
                closed = node == start;
                break;
            }

            path.push(node);
            on_path.insert(node);
            let symbol = graph.next_symbol(node, forward, same);
            if forward {
                sequence.push_back(symbol);
            } else {
                sequence.push_front(symbol);
            }

            if view.count(node, side) == 0 {
                break;
            }

            next = view.first(node, side).map(|e| Extension {
                target: e.target,
                same_orientation: !(same ^ e.same_orientation),
            });
        }

        let first = graph.node(path[0]).kmer();
        let last = graph.node(path[path.len() - 1]).kmer();
        if skip_mirrored && first < last {
            return None;
        }

        Some(SimplePath {
            nodes: path,
            sequence: String::from_utf8_lossy(sequence.make_contiguous()).into_owned(),
            contig_type: if closed { ContigType::Circular } else { ContigType::Linear },
        })
    }
}

impl ContigBuilder for SimplePathContigBuilder {
    fn build(&self, graph: &DeBruijnGraph) -> Vec<Contig> {
        let contigs: Vec<Contig> = self
            .simple_paths(graph)
            .into_iter()
            .enumerate()
            .map(|(id, path)| Contig {
                id,
                length: path.sequence.len(),
                coverage: path.average_coverage(graph),
                sequence: path.sequence,
                node_path: path.nodes,
                contig_type: path.contig_type,
            })
            .collect();

        info!("🧩 Built {} contigs from {} nodes", contigs.len(), graph.node_count());
        contigs
    }
}

impl LowCoverageContigPurger for SimplePathContigBuilder {
    fn remove_low_coverage_contigs(&self, graph: &mut DeBruijnGraph, threshold: f64) -> usize {
        let doomed: AHashSet<NodeId> = self
            .simple_paths(graph)
            .into_iter()
            .filter(|path| path.average_coverage(graph) < threshold)
            .flat_map(|path| path.nodes)
            .collect();

        let mut ordered: Vec<NodeId> = doomed.iter().copied().collect();
        ordered.sort_unstable();
        for &node in &ordered {
            graph.detach(node, &doomed);
        }
        let removed = graph.remove_nodes(ordered);
        debug!(
            "Removed {} nodes on contigs with coverage below {:.2}",
            removed, threshold
        );
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::kmer::reverse_complement;

    fn contig_strings(contigs: &[Contig]) -> Vec<String> {
        let mut sequences: Vec<String> = contigs.iter().map(|c| c.sequence.clone()).collect();
        sequences.sort();
        sequences
    }

    #[test]
    fn test_single_read_is_one_contig() {
        let graph = DeBruijnGraph::build(vec!["GATTACAGGC"], 5).unwrap();
        let contigs = SimplePathContigBuilder::new().build(&graph);
        assert_eq!(contigs.len(), 1);
        let sequence = &contigs[0].sequence;
        assert!(sequence == "GATTACAGGC" || *sequence == reverse_complement("GATTACAGGC"));
        assert_eq!(contigs[0].contig_type, ContigType::Linear);
        assert_eq!(contigs[0].node_path.len(), 6);
        assert!((contigs[0].coverage - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_builder_leaves_graph_untouched() {
        let graph = DeBruijnGraph::build(vec!["GATTACAGGCTTCAAGG"], 5).unwrap();
        let (nodes, extensions) = (graph.node_count(), graph.extension_count());
        let _ = SimplePathContigBuilder::new().build(&graph);
        assert_eq!(graph.node_count(), nodes);
        assert_eq!(graph.extension_count(), extensions);
    }

    #[test]
    fn test_every_node_consumed_once() {
        let graph = DeBruijnGraph::build(vec!["GGAACGTTCA", "GATTACAGGCTTCA"], 4).unwrap();
        let contigs = SimplePathContigBuilder::new().build(&graph);
        let mut consumed: Vec<NodeId> = contigs.iter().flat_map(|c| c.node_path.clone()).collect();
        consumed.sort();
        let before = consumed.len();
        consumed.dedup();
        assert_eq!(before, consumed.len());
        assert_eq!(consumed.len(), graph.node_count());
    }

    #[test]
    fn test_palindrome_is_split_off() {
        // ACGT is its own reverse complement
        let graph = DeBruijnGraph::build(vec!["AACGTT"], 4).unwrap();
        let contigs = SimplePathContigBuilder::new().build(&graph);
        assert_eq!(contig_strings(&contigs), vec!["AACG", "ACGT"]);
        assert!(contigs.iter().all(|c| c.contig_type == ContigType::Singleton));
    }

    #[test]
    fn test_palindrome_inside_read() {
        let graph = DeBruijnGraph::build(vec!["GGAACGTTCA"], 4).unwrap();
        let contigs = SimplePathContigBuilder::new().build(&graph);
        assert_eq!(contig_strings(&contigs), vec!["ACGT", "GAACG", "GGAA", "TGAA"]);
    }

    #[test]
    fn test_circular_sequence() {
        let circle = "AGCTTGACCATGTTAGGCAAC";
        let read = format!("{}{}", circle, &circle[..6]);
        let graph = DeBruijnGraph::build(vec![read], 7).unwrap();
        assert_eq!(graph.node_count(), 21);

        let contigs = SimplePathContigBuilder::new().build(&graph);
        assert_eq!(contigs.len(), 1);
        assert_eq!(contigs[0].contig_type, ContigType::Circular);
        assert_eq!(contigs[0].node_path.len(), 21);
        assert_eq!(contigs[0].sequence, "AACAGCTTGACCATGTTAGGCAACAGC");
    }

    #[test]
    fn test_low_coverage_contig_removal() {
        let strong = "GATTACAGGCTTCAAGG";
        let weak = "CCCTGAGTGTTTCGAC";
        let mut graph = DeBruijnGraph::build(vec![strong, strong, strong, weak], 7).unwrap();
        let strong_nodes = strong.len() - 6;

        let removed = SimplePathContigBuilder::new().remove_low_coverage_contigs(&mut graph, 2.0);
        assert_eq!(removed, weak.len() - 6);
        assert_eq!(graph.node_count(), strong_nodes);

        let contigs = SimplePathContigBuilder::new().build(&graph);
        assert_eq!(contigs.len(), 1);
        assert!((contigs[0].coverage - 3.0).abs() < 1e-9);
    }
}
