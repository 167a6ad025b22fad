//! Mate-constrained path search through the contig overlap graph
//!
//! Starting from every contig with mate links, overlap paths are explored
//! breadth-first in both directions. A branch is pruned when it reaches a
//! mate-linked contig at a length the mate distance rules out. A path is
//! reported once it contains every contig its root is mate-linked to.

use crate::assembly::graph::Side;
use crate::scaffold::contig_graph::ContigGraph;
use crate::scaffold::mate_pairs::{ContigMatePairs, MatePairLinks};
use rayon::prelude::*;
use std::collections::{BTreeMap, VecDeque};

/// Contig on a path with its orientation relative to the previous step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PathStep {
    pub contig: usize,
    pub same_orientation: bool,
}

/// Overlap path anchored at its first contig
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScaffoldPath {
    pub steps: Vec<PathStep>,
    /// Path extends to the right of its first contig
    pub grows_right: bool,
}

impl ScaffoldPath {
    pub fn contigs(&self) -> impl Iterator<Item = usize> + '_ {
        self.steps.iter().map(|step| step.contig)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Contigs in left-to-right order, each with its strand relative to the
    /// first contig of the path
    pub fn layout(&self) -> Vec<(usize, bool)> {
        let mut reversed = false;
        let mut placed: Vec<(usize, bool)> = self
            .steps
            .iter()
            .enumerate()
            .map(|(i, step)| {
                if i > 0 {
                    reversed ^= !step.same_orientation;
                }
                (step.contig, reversed)
            })
            .collect();
        if !self.grows_right {
            placed.reverse();
        }
        placed
    }

    /// Right-growing path spelling the given layout
    pub fn from_layout(layout: &[(usize, bool)]) -> Self {
        let steps = layout
            .iter()
            .enumerate()
            .map(|(i, &(contig, reversed))| PathStep {
                contig,
                same_orientation: i == 0 || layout[i - 1].1 == reversed,
            })
            .collect();
        Self {
            steps,
            grows_right: true,
        }
    }
}

struct Pending {
    step: PathStep,
    /// Direction the parent was being extended in
    came_right: bool,
    trail: Vec<PathStep>,
    grows_right: bool,
}

#[derive(Debug, Clone)]
pub struct TracePath {
    depth: usize,
    kmer_length: usize,
}

impl TracePath {
    pub fn new(depth: usize, kmer_length: usize) -> Self {
        Self { depth, kmer_length }
    }

    /// Paths from every root in ascending contig order
    pub fn find_paths(&self, graph: &ContigGraph, links: &MatePairLinks) -> Vec<ScaffoldPath> {
        let roots: Vec<(&usize, &BTreeMap<usize, ContigMatePairs>)> = links.iter().collect();
        roots
            .par_iter()
            .map(|&(&root, targets)| self.paths_from(graph, root, targets))
            .collect::<Vec<_>>()
            .into_iter()
            .flatten()
            .collect()
    }

    fn paths_from(
        &self,
        graph: &ContigGraph,
        root: usize,
        targets: &BTreeMap<usize, ContigMatePairs>,
    ) -> Vec<ScaffoldPath> {
        let mut queue = VecDeque::new();
        let mut found = Vec::new();
        let start = PathStep {
            contig: root,
            same_orientation: true,
        };

        self.extend(graph, targets, start, false, &[], false, &mut queue, &mut found);
        self.extend(graph, targets, start, true, &[], true, &mut queue, &mut found);

        while let Some(pending) = queue.pop_front() {
            let right = if pending.came_right {
                pending.step.same_orientation
            } else {
                !pending.step.same_orientation
            };
            self.extend(
                graph,
                targets,
                pending.step,
                right,
                &pending.trail,
                pending.grows_right,
                &mut queue,
                &mut found,
            );
        }

        found
    }

    #[allow(clippy::too_many_arguments)]
    fn extend(
        &self,
        graph: &ContigGraph,
        targets: &BTreeMap<usize, ContigMatePairs>,
        step: PathStep,
        right: bool,
        trail: &[PathStep],
        grows_right: bool,
        queue: &mut VecDeque<Pending>,
        found: &mut Vec<ScaffoldPath>,
    ) {
        let mut extended = trail.to_vec();
        extended.push(step);
        let covered = Self::covers(&extended, targets);

        let side = if right { Side::Right } else { Side::Left };
        let children = graph.links(step.contig, side);

        if children.is_empty() {
            if covered {
                found.push(ScaffoldPath {
                    steps: extended,
                    grows_right,
                });
            }
            return;
        }

        for child in children {
            let next = PathStep {
                contig: child.target,
                same_orientation: child.same_orientation,
            };
            if self.fits_mate_distance(graph, targets, next, &extended)
                && extended.len() < self.depth
                && !covered
            {
                queue.push_back(Pending {
                    step: next,
                    came_right: right,
                    trail: extended.clone(),
                    grows_right,
                });
            } else if covered {
                found.push(ScaffoldPath {
                    steps: extended.clone(),
                    grows_right,
                });
            }
        }
    }

    fn covers(trail: &[PathStep], targets: &BTreeMap<usize, ContigMatePairs>) -> bool {
        targets
            .keys()
            .all(|target| trail.iter().any(|step| step.contig == *target))
    }

    /// Contigs without a mate link to the root always fit
    fn fits_mate_distance(
        &self,
        graph: &ContigGraph,
        targets: &BTreeMap<usize, ContigMatePairs>,
        next: PathStep,
        trail: &[PathStep],
    ) -> bool {
        let Some(link) = targets.get(&next.contig) else {
            return true;
        };
        let k = self.kmer_length as i64;
        let spanned: i64 = trail
            .iter()
            .skip(1)
            .map(|step| graph.contig_len(step.contig) as i64 - k)
            .sum::<i64>()
            - k;
        link.accepts(spanned as f64, next.same_orientation)
    }
}
