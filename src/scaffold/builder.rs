//! Scaffold construction
//! =====================
//!
//! Places mate reads on the contigs, turns agreeing mate pairs into distance
//! estimated contig links and resolves them in two passes:
//!
//! 1. overlap paths through the contig graph that explain every mate link of
//!    their root contig are spelled out with the `k - 1` overlaps collapsed;
//! 2. links between contigs left untouched by the first pass are chained
//!    greedily, strongest link first, with the estimated gap filled by `N`.
//!
//! Contigs that end up in no scaffold are returned unchanged after the
//! scaffolds.

use crate::core::data_structures::SequenceRead;
use crate::core::kmer::reverse_complement;
use crate::core::paired_reads::{CloneLibrary, MateName};
use crate::scaffold::contig_graph::ContigGraph;
use crate::scaffold::distance::DistanceCalculator;
use crate::scaffold::mate_pairs::{pair_count, ContigMatePairs, MatePairLinks, MatePairMapper};
use crate::scaffold::orientation_filter::OrientationBasedMatePairFilter;
use crate::scaffold::path_purger::PathPurger;
use crate::scaffold::read_mapper::ReadContigMapper;
use crate::scaffold::trace_path::{ScaffoldPath, TracePath};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::{debug, info};

/// Symbol used for unknown gap positions
pub const GAP_SYMBOL: char = 'N';

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScaffoldStatistics {
    pub contig_overlaps: usize,
    pub mate_pairs: usize,
    pub contig_links: usize,
    pub traced_paths: usize,
    pub overlap_scaffolds: usize,
    pub gapped_scaffolds: usize,
    pub unplaced_contigs: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ScaffoldOutput {
    pub scaffolds: Vec<String>,
    pub statistics: ScaffoldStatistics,
}

#[derive(Debug, Clone)]
pub struct GraphScaffoldBuilder {
    kmer_length: usize,
    depth: usize,
    redundancy: usize,
}

/// Contig placed in a gapped chain
#[derive(Debug, Clone, Copy)]
struct Placed {
    contig: usize,
    reversed: bool,
}

#[derive(Debug, Clone)]
struct Chain {
    members: Vec<Placed>,
    /// `gaps[i]` separates `members[i]` and `members[i + 1]`
    gaps: Vec<usize>,
}

impl Chain {
    fn single(contig: usize) -> Self {
        Self {
            members: vec![Placed {
                contig,
                reversed: false,
            }],
            gaps: Vec::new(),
        }
    }

    fn flip(&mut self) {
        self.members.reverse();
        for member in &mut self.members {
            member.reversed = !member.reversed;
        }
        self.gaps.reverse();
    }

    fn head(&self) -> Option<Placed> {
        self.members.first().copied()
    }

    fn tail(&self) -> Option<Placed> {
        self.members.last().copied()
    }
}

impl GraphScaffoldBuilder {
    pub fn new(kmer_length: usize, depth: usize, redundancy: usize) -> Self {
        Self {
            kmer_length,
            depth,
            redundancy,
        }
    }

    /// Build scaffolds from contig sequences and the full read set
    pub fn build_scaffolds<S: AsRef<str> + Sync>(
        &self,
        contigs: &[S],
        reads: &[SequenceRead],
        library: &CloneLibrary,
    ) -> Result<ScaffoldOutput> {
        let k = self.kmer_length;
        let graph = ContigGraph::build(contigs, k);
        let mappable = graph.linked_contigs();
        debug!(
            "Contig graph: {} contigs, {} overlaps, {} mappable",
            graph.contig_count(),
            graph.overlap_count(),
            mappable.len()
        );

        let mate_reads: Vec<SequenceRead> = reads
            .iter()
            .filter(|read| MateName::parse(&read.id).is_some())
            .cloned()
            .collect();

        let mapper = ReadContigMapper::new(contigs, &mappable, k);
        let placements = mapper.map_reads(&mate_reads)?;

        let links = MatePairMapper::new(library).map_mate_pairs(&mate_reads, &placements, contigs);
        let mate_pairs = pair_count(&links);

        let mut filtered = OrientationBasedMatePairFilter::new(self.redundancy).filter_pairs(&links);
        DistanceCalculator::new().calculate_distances(&mut filtered, contigs);
        let contig_links = filtered.values().map(|targets| targets.len()).sum();
        info!(
            "🔗 {} mate pairs support {} contig links",
            mate_pairs, contig_links
        );

        let traced = TracePath::new(self.depth, k).find_paths(&graph, &filtered);
        let traced_paths = traced.len();
        let paths = PathPurger::new().purge_paths(traced);

        let mut used = vec![false; contigs.len()];
        let mut scaffolds = Vec::new();
        for path in &paths {
            scaffolds.push(self.spell_path(path, contigs));
            for contig in path.contigs() {
                used[contig] = true;
            }
        }
        let overlap_scaffolds = scaffolds.len();

        let chains = Self::chain_gapped_links(&filtered, &used, contigs.len());
        for chain in &chains {
            scaffolds.push(Self::spell_chain(chain, contigs));
            for member in &chain.members {
                used[member.contig] = true;
            }
        }
        let gapped_scaffolds = chains.len();

        let mut unplaced_contigs = 0;
        for (contig, sequence) in contigs.iter().enumerate() {
            if !used[contig] {
                scaffolds.push(sequence.as_ref().to_string());
                unplaced_contigs += 1;
            }
        }

        info!(
            "🧱 Scaffolding produced {} sequences ({} overlap paths, {} gapped chains)",
            scaffolds.len(),
            overlap_scaffolds,
            gapped_scaffolds
        );

        Ok(ScaffoldOutput {
            scaffolds,
            statistics: ScaffoldStatistics {
                contig_overlaps: graph.overlap_count(),
                mate_pairs,
                contig_links,
                traced_paths,
                overlap_scaffolds,
                gapped_scaffolds,
                unplaced_contigs,
            },
        })
    }

    /// Spell a path, dropping the `k - 1` symbols shared by neighbours
    pub fn spell_path<S: AsRef<str>>(&self, path: &ScaffoldPath, contigs: &[S]) -> String {
        let overlap = self.kmer_length.saturating_sub(1);
        let mut reversed = false;
        let mut sequence = String::new();

        for (i, step) in path.steps.iter().enumerate() {
            if i > 0 {
                reversed ^= !step.same_orientation;
            }
            let contig = contigs[step.contig].as_ref();
            let oriented = if reversed {
                reverse_complement(contig)
            } else {
                contig.to_string()
            };

            if i == 0 {
                sequence = oriented;
            } else if path.grows_right {
                sequence.push_str(oriented.get(overlap..).unwrap_or(""));
            } else {
                let keep = oriented.len().saturating_sub(overlap);
                sequence.insert_str(0, &oriented[..keep]);
            }
        }

        sequence
    }

    /// Greedy chaining of links between contigs no path consumed.
    ///
    /// Links are taken by weight (descending), then deviation (ascending),
    /// then contig indices. A link is skipped when either contig already has a
    /// neighbour on the required end, when the orientations disagree, or
    /// when it would close a cycle.
    fn chain_gapped_links(links: &MatePairLinks, used: &[bool], contig_count: usize) -> Vec<Chain> {
        let mut candidates: Vec<(usize, usize, &ContigMatePairs)> = links
            .iter()
            .flat_map(|(&a, targets)| targets.iter().map(move |(&b, link)| (a, b, link)))
            .filter(|&(a, b, _)| a != b && !used[a] && !used[b])
            .collect();

        let deviation = |link: &ContigMatePairs| {
            link.standard_deviation[Self::gap_orientation(link)]
        };
        candidates.sort_by(|x, y| {
            y.2.weight
                .cmp(&x.2.weight)
                .then_with(|| {
                    deviation(x.2)
                        .partial_cmp(&deviation(y.2))
                        .unwrap_or(Ordering::Equal)
                })
                .then_with(|| (x.0, x.1).cmp(&(y.0, y.1)))
        });

        let mut chains: Vec<Option<Chain>> = Vec::new();
        let mut chain_of: Vec<Option<usize>> = vec![None; contig_count];

        for (a, b, link) in candidates {
            let chain_a = *chain_of[a].get_or_insert_with(|| {
                chains.push(Some(Chain::single(a)));
                chains.len() - 1
            });
            let chain_b = *chain_of[b].get_or_insert_with(|| {
                chains.push(Some(Chain::single(b)));
                chains.len() - 1
            });
            if chain_a == chain_b {
                continue;
            }

            let b_reversed = Self::gap_orientation(link) == 1;
            let (Some(mut left), Some(mut right)) = (chains[chain_a].take(), chains[chain_b].take()) else {
                continue;
            };

            let left_ok = Self::orient_end(&mut left, a, false, true);
            let right_ok = Self::orient_end(&mut right, b, b_reversed, false);
            if !(left_ok && right_ok) {
                debug!("Skipping gapped link {} -> {}: conflicting placement", a, b);
                chains[chain_a] = Some(left);
                chains[chain_b] = Some(right);
                continue;
            }

            let o = Self::gap_orientation(link);
            let gap = link.distance[o].round().max(1.0) as usize;
            left.gaps.push(gap);
            left.gaps.extend(right.gaps);
            for member in &right.members {
                chain_of[member.contig] = Some(chain_a);
            }
            left.members.extend(right.members);
            chains[chain_a] = Some(left);
        }

        let mut joined: Vec<Chain> = chains
            .into_iter()
            .flatten()
            .filter(|chain| chain.members.len() > 1)
            .collect();
        joined.sort_by_key(|chain| chain.members.iter().map(|m| m.contig).min());
        joined
    }

    /// 0 when the majority of pairs keep both reads on one strand
    fn gap_orientation(link: &ContigMatePairs) -> usize {
        let same = link.pairs.iter().filter(|p| p.same_strand).count();
        ContigMatePairs::orientation_index(same * 2 >= link.pairs.len())
    }

    /// Make `contig` the tail (or head) of `chain` with the requested
    /// orientation, flipping the chain if needed
    fn orient_end(chain: &mut Chain, contig: usize, reversed: bool, at_tail: bool) -> bool {
        let end = if at_tail { chain.tail() } else { chain.head() };
        if let Some(placed) = end {
            if placed.contig == contig && placed.reversed == reversed {
                return true;
            }
        }
        let other = if at_tail { chain.head() } else { chain.tail() };
        if let Some(placed) = other {
            if placed.contig == contig && placed.reversed != reversed {
                chain.flip();
                return true;
            }
        }
        false
    }

    fn spell_chain<S: AsRef<str>>(chain: &Chain, contigs: &[S]) -> String {
        let mut sequence = String::new();
        for (i, member) in chain.members.iter().enumerate() {
            if i > 0 {
                let gap = chain.gaps.get(i - 1).copied().unwrap_or(1);
                sequence.extend(std::iter::repeat(GAP_SYMBOL).take(gap));
            }
            let contig = contigs[member.contig].as_ref();
            if member.reversed {
                sequence.push_str(&reverse_complement(contig));
            } else {
                sequence.push_str(contig);
            }
        }
        sequence
    }
}
