//! De Bruijn Graph Arena
//! =====================
//!
//! Nodes live in a `Vec` ordered by canonical k-mer value and are addressed
//! through [`NodeId`] handles. Each node keeps two fixed tables of four
//! extension slots (one per base) for its left and right side; a slot records
//! the neighbour handle and whether the neighbour is traversed in the same
//! orientation as it is stored.
//!
//! Construction counts canonical k-mers concurrently in a `DashMap`, then
//! freezes the table into the sorted arena and derives every link from k-mer
//! membership. Deletion is a tombstone: removed nodes stay in the arena but are
//! skipped by every iterator and count.

use crate::core::data_structures::NodeId;
use crate::core::kmer::{complement_base, is_unambiguous_dna, KmerData, KmerWindows, MAX_KMER_LENGTH};
use crate::utils::configuration::AssemblyError;
use ahash::{AHashMap, AHashSet, RandomState};
use anyhow::Result;
use dashmap::DashMap;
use parking_lot::Mutex;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Which end of a k-mer an extension hangs off
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn opposite(self) -> Self {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }
}

/// One outgoing link of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extension {
    pub target: NodeId,
    /// True when the neighbour's stored k-mer reads on the same strand
    pub same_orientation: bool,
}

type ExtensionSlots = [Option<Extension>; 4];

#[derive(Debug, Clone)]
pub struct DeBruijnNode {
    kmer: KmerData,
    count: u8,
    left: ExtensionSlots,
    right: ExtensionSlots,
    deleted: bool,
}

impl DeBruijnNode {
    fn new(kmer: KmerData, count: u8) -> Self {
        Self {
            kmer,
            count,
            left: [None; 4],
            right: [None; 4],
            deleted: false,
        }
    }

    /// Canonical k-mer stored in this node
    pub fn kmer(&self) -> KmerData {
        self.kmer
    }

    /// Number of times the k-mer was observed (saturates at 255)
    pub fn count(&self) -> u8 {
        self.count
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    pub fn is_palindrome(&self) -> bool {
        self.kmer.is_palindrome()
    }

    pub fn slots(&self, side: Side) -> &[Option<Extension>; 4] {
        match side {
            Side::Left => &self.left,
            Side::Right => &self.right,
        }
    }

    /// Filled slots on one side; a neighbour reachable through two bases counts twice
    pub fn extension_count(&self, side: Side) -> usize {
        self.slots(side).iter().flatten().count()
    }

    pub fn left_extension_count(&self) -> usize {
        self.extension_count(Side::Left)
    }

    pub fn right_extension_count(&self) -> usize {
        self.extension_count(Side::Right)
    }

    pub fn total_extension_count(&self) -> usize {
        self.left_extension_count() + self.right_extension_count()
    }

    /// Distinct neighbours on one side with their orientation, in base order
    pub fn extensions(&self, side: Side) -> Vec<Extension> {
        let mut unique: Vec<Extension> = Vec::with_capacity(4);
        for extension in self.slots(side).iter().flatten() {
            if !unique.iter().any(|e| e.target == extension.target) {
                unique.push(*extension);
            }
        }
        unique
    }

    /// Distinct neighbours on either side, left side first
    pub fn extension_nodes(&self) -> Vec<NodeId> {
        let mut nodes: Vec<NodeId> = Vec::with_capacity(8);
        for extension in self.left.iter().chain(self.right.iter()).flatten() {
            if !nodes.contains(&extension.target) {
                nodes.push(extension.target);
            }
        }
        nodes
    }

    /// Clear every slot pointing at `target`, returning how many were cleared
    pub fn remove_extensions_to(&mut self, target: NodeId) -> usize {
        let mut removed = 0;
        for slot in self.left.iter_mut().chain(self.right.iter_mut()) {
            if matches!(slot, Some(e) if e.target == target) {
                *slot = None;
                removed += 1;
            }
        }
        removed
    }
}

/// Counters gathered while reading input
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildStatistics {
    pub reads_used: usize,
    pub skipped_reads: usize,
    pub kmers_observed: usize,
}

#[derive(Debug, Clone)]
pub struct DeBruijnGraph {
    kmer_length: usize,
    nodes: Vec<DeBruijnNode>,
    index: AHashMap<KmerData, NodeId>,
    live_nodes: usize,
    build_statistics: BuildStatistics,
}

impl DeBruijnGraph {
    /// Build the graph from reads in parallel.
    ///
    /// Reads shorter than `kmer_length` or containing symbols other than
    /// A, C, G, T are skipped and counted in [`BuildStatistics::skipped_reads`].
    pub fn build<I, R>(reads: I, kmer_length: usize) -> Result<Self>
    where
        I: IntoIterator<Item = R>,
        I::IntoIter: Send,
        R: AsRef<str> + Send,
    {
        if kmer_length == 0 || kmer_length > MAX_KMER_LENGTH {
            return Err(AssemblyError::ValidationError {
                field: "assembly.kmer_length".to_string(),
                reason: format!("must be between 1 and {MAX_KMER_LENGTH}, got {kmer_length}"),
            }
            .into());
        }

        let counts: DashMap<KmerData, u8, RandomState> = DashMap::with_hasher(RandomState::new());
        let statistics = Mutex::new(BuildStatistics::default());

        reads.into_iter().par_bridge().for_each(|read| {
            let sequence = read.as_ref();
            if sequence.len() < kmer_length || !is_unambiguous_dna(sequence) {
                statistics.lock().skipped_reads += 1;
                return;
            }

            let mut observed = 0;
            for (_, forward, reverse) in KmerWindows::new(sequence.as_bytes(), kmer_length) {
                let canonical = forward.min(reverse);
                counts
                    .entry(canonical)
                    .and_modify(|count| *count = count.saturating_add(1))
                    .or_insert(1);
                observed += 1;
            }

            let mut stats = statistics.lock();
            stats.reads_used += 1;
            stats.kmers_observed += observed;
        });

        let mut entries: Vec<(KmerData, u8)> = counts.into_iter().collect();
        entries.par_sort_unstable_by_key(|(kmer, _)| *kmer);

        let mut graph = Self::from_sorted_counts(kmer_length, entries);
        graph.build_statistics = statistics.into_inner();

        info!(
            "🧬 Built de Bruijn graph: k={}, {} nodes, {} extensions ({} reads skipped)",
            kmer_length,
            graph.node_count(),
            graph.extension_count(),
            graph.build_statistics.skipped_reads
        );

        Ok(graph)
    }

    fn from_sorted_counts(kmer_length: usize, entries: Vec<(KmerData, u8)>) -> Self {
        let index: AHashMap<KmerData, NodeId> = entries
            .iter()
            .enumerate()
            .map(|(i, (kmer, _))| (*kmer, NodeId(i)))
            .collect();

        let links: Vec<(ExtensionSlots, ExtensionSlots)> = entries
            .par_iter()
            .map(|(kmer, _)| {
                let mut left: ExtensionSlots = [None; 4];
                let mut right: ExtensionSlots = [None; 4];
                for code in 0..4u64 {
                    right[code as usize] = Self::lookup_extension(&index, kmer.shift_right(code));
                    left[code as usize] = Self::lookup_extension(&index, kmer.shift_left(code));
                }
                (left, right)
            })
            .collect();

        let nodes: Vec<DeBruijnNode> = entries
            .into_iter()
            .zip(links)
            .map(|((kmer, count), (left, right))| {
                let mut node = DeBruijnNode::new(kmer, count);
                node.left = left;
                node.right = right;
                node
            })
            .collect();

        let live_nodes = nodes.len();
        debug!("Froze {} k-mers into the node arena", live_nodes);

        Self {
            kmer_length,
            nodes,
            index,
            live_nodes,
            build_statistics: BuildStatistics::default(),
        }
    }

    fn lookup_extension(index: &AHashMap<KmerData, NodeId>, candidate: KmerData) -> Option<Extension> {
        let (canonical, same_orientation) = candidate.canonical();
        index.get(&canonical).map(|&target| Extension {
            target,
            same_orientation,
        })
    }

    pub fn kmer_length(&self) -> usize {
        self.kmer_length
    }

    pub fn build_statistics(&self) -> &BuildStatistics {
        &self.build_statistics
    }

    /// Number of live (not deleted) nodes
    pub fn node_count(&self) -> usize {
        self.live_nodes
    }

    /// Total filled extension slots over live nodes
    pub fn extension_count(&self) -> usize {
        self.nodes()
            .map(|(_, node)| node.total_extension_count())
            .sum()
    }

    /// Size of the arena including tombstones
    pub fn capacity(&self) -> usize {
        self.nodes.len()
    }

    pub fn node(&self, id: NodeId) -> &DeBruijnNode {
        &self.nodes[id.index()]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut DeBruijnNode {
        &mut self.nodes[id.index()]
    }

    /// Live nodes in k-mer order
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &DeBruijnNode)> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| !node.deleted)
            .map(|(i, node)| (NodeId(i), node))
    }

    pub fn live_node_ids(&self) -> Vec<NodeId> {
        self.nodes().map(|(id, _)| id).collect()
    }

    /// Locate the node holding `kmer` in either orientation
    pub fn find(&self, kmer: &str) -> Option<NodeId> {
        let kmer = KmerData::new(kmer).ok()?;
        if kmer.len() != self.kmer_length {
            return None;
        }
        let (canonical, _) = kmer.canonical();
        self.index
            .get(&canonical)
            .copied()
            .filter(|id| !self.node(*id).deleted)
    }

    /// Symbol contributed by `id` when a walk reaches it.
    ///
    /// `same_orientation` selects the stored k-mer or its reverse complement;
    /// a forward walk takes the last symbol, a backward walk the first.
    pub fn next_symbol(&self, id: NodeId, forward: bool, same_orientation: bool) -> u8 {
        let kmer = self.node(id).kmer;
        match (same_orientation, forward) {
            (true, true) => kmer.last_symbol(),
            (true, false) => kmer.first_symbol(),
            (false, true) => complement_base(kmer.first_symbol()),
            (false, false) => complement_base(kmer.last_symbol()),
        }
    }

    /// Drop links that point at `node` from each of its neighbours outside `skip`
    pub fn detach(&mut self, node: NodeId, skip: &AHashSet<NodeId>) -> usize {
        let neighbours = self.node(node).extension_nodes();
        let mut removed = 0;
        for neighbour in neighbours {
            if neighbour != node && !skip.contains(&neighbour) {
                removed += self.node_mut(neighbour).remove_extensions_to(node);
            }
        }
        removed
    }

    /// Tombstone nodes; returns how many were live before the call
    pub fn remove_nodes<I>(&mut self, ids: I) -> usize
    where
        I: IntoIterator<Item = NodeId>,
    {
        let mut removed = 0;
        for id in ids {
            let node = &mut self.nodes[id.index()];
            if !node.deleted {
                node.deleted = true;
                removed += 1;
            }
        }
        self.live_nodes -= removed;
        removed
    }

    /// Coverage values of all live nodes, unsorted
    pub fn coverages(&self) -> Vec<u8> {
        self.nodes().map(|(_, node)| node.count).collect()
    }
}
