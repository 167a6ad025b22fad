//! Contig overlap graph
//!
//! Contigs produced from the same de Bruijn graph share `k - 1` symbols with
//! their former neighbours. This graph records those overlaps on both sides of
//! every contig, in either orientation, and is the search space for scaffold
//! path tracing.

use crate::assembly::graph::Side;
use crate::core::kmer::reverse_complement;
use ahash::AHashMap;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;

#[derive(Debug, Clone)]
pub struct ContigNode {
    pub sequence: String,
}

/// Overlap leaving `side` of the source contig
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlapEdge {
    pub side: Side,
    /// Target is read in the same orientation as the source
    pub same_orientation: bool,
}

/// Neighbour of a contig in the overlap graph
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContigLink {
    pub target: usize,
    pub same_orientation: bool,
}

pub struct ContigGraph {
    graph: DiGraph<ContigNode, OverlapEdge>,
    kmer_length: usize,
}

impl ContigGraph {
    /// Link every contig to the contigs overlapping its (k-1)-prefix and
    /// (k-1)-suffix. Node indices equal contig indices.
    pub fn build<S: AsRef<str>>(contigs: &[S], kmer_length: usize) -> Self {
        let overlap = kmer_length.saturating_sub(1);
        let mut graph = DiGraph::with_capacity(contigs.len(), contigs.len() * 2);
        for contig in contigs {
            graph.add_node(ContigNode {
                sequence: contig.as_ref().to_string(),
            });
        }

        let mut by_prefix: AHashMap<&str, Vec<usize>> = AHashMap::new();
        let mut by_suffix: AHashMap<&str, Vec<usize>> = AHashMap::new();
        for (i, contig) in contigs.iter().enumerate() {
            let sequence = contig.as_ref();
            if sequence.len() < overlap {
                continue;
            }
            by_prefix.entry(&sequence[..overlap]).or_default().push(i);
            by_suffix
                .entry(&sequence[sequence.len() - overlap..])
                .or_default()
                .push(i);
        }

        let lookup = |map: &AHashMap<&str, Vec<usize>>, key: &str| -> Vec<usize> {
            map.get(key).cloned().unwrap_or_default()
        };

        for (i, contig) in contigs.iter().enumerate() {
            let sequence = contig.as_ref();
            if sequence.len() < overlap {
                continue;
            }
            let prefix = &sequence[..overlap];
            let suffix = &sequence[sequence.len() - overlap..];

            let left = lookup(&by_suffix, prefix)
                .into_iter()
                .map(|j| (j, true))
                .chain(
                    lookup(&by_prefix, &reverse_complement(prefix))
                        .into_iter()
                        .map(|j| (j, false)),
                );
            add_side(&mut graph, i, Side::Left, left);

            let right = lookup(&by_prefix, suffix)
                .into_iter()
                .map(|j| (j, true))
                .chain(
                    lookup(&by_suffix, &reverse_complement(suffix))
                        .into_iter()
                        .map(|j| (j, false)),
                );
            add_side(&mut graph, i, Side::Right, right);
        }

        Self { graph, kmer_length }
    }

    pub fn kmer_length(&self) -> usize {
        self.kmer_length
    }

    pub fn contig_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn overlap_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn sequence(&self, contig: usize) -> &str {
        &self.graph[NodeIndex::new(contig)].sequence
    }

    pub fn contig_len(&self, contig: usize) -> usize {
        self.sequence(contig).len()
    }

    /// Overlapping contigs on `side`, in discovery order
    pub fn links(&self, contig: usize, side: Side) -> Vec<ContigLink> {
        let mut edges: Vec<_> = self
            .graph
            .edges(NodeIndex::new(contig))
            .filter(|edge| edge.weight().side == side)
            .map(|edge| {
                (
                    edge.id().index(),
                    ContigLink {
                        target: edge.target().index(),
                        same_orientation: edge.weight().same_orientation,
                    },
                )
            })
            .collect();
        edges.sort_unstable_by_key(|(id, _)| *id);
        edges.into_iter().map(|(_, link)| link).collect()
    }

    pub fn has_links(&self, contig: usize) -> bool {
        self.graph
            .edges(NodeIndex::new(contig))
            .next()
            .is_some()
    }

    /// Contigs overlapping at least one other contig, ascending
    pub fn linked_contigs(&self) -> Vec<usize> {
        (0..self.contig_count())
            .filter(|&i| self.has_links(i))
            .collect()
    }
}

/// One edge per target on a side; the first overlap found wins
fn add_side(
    graph: &mut DiGraph<ContigNode, OverlapEdge>,
    source: usize,
    side: Side,
    candidates: impl Iterator<Item = (usize, bool)>,
) {
    let mut seen = Vec::new();
    for (target, same_orientation) in candidates {
        if seen.contains(&target) {
            continue;
        }
        seen.push(target);
        graph.add_edge(
            NodeIndex::new(source),
            NodeIndex::new(target),
            OverlapEdge {
                side,
                same_orientation,
            },
        );
    }
}
