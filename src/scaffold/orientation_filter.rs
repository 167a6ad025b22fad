//! Orientation based mate pair filtering
//!
//! For every pair of linked contigs only the better supported direction
//! survives, and within it only the majority strand class. Links left with
//! fewer pairs than the configured redundancy are dropped entirely.

use crate::scaffold::mate_pairs::{ContigMatePairs, MatePairLinks, ValidMatePair};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct OrientationBasedMatePairFilter {
    redundancy: usize,
}

impl OrientationBasedMatePairFilter {
    pub fn new(redundancy: usize) -> Self {
        Self { redundancy }
    }

    pub fn redundancy(&self) -> usize {
        self.redundancy
    }

    pub fn filter_pairs(&self, links: &MatePairLinks) -> MatePairLinks {
        let mut filtered = MatePairLinks::new();
        let mut dropped = 0usize;

        for (&forward, targets) in links {
            for (&reverse, link) in targets {
                let opposite = links
                    .get(&reverse)
                    .and_then(|t| t.get(&forward))
                    .map_or(0, |l| l.pairs.len());

                // the other direction is handled on its own turn
                if opposite > link.pairs.len() || (opposite == link.pairs.len() && reverse < forward) {
                    continue;
                }

                let (same, flipped): (Vec<ValidMatePair>, Vec<ValidMatePair>) =
                    link.pairs.iter().cloned().partition(|pair| pair.same_strand);
                let majority = if same.len() >= flipped.len() { same } else { flipped };

                if majority.is_empty() || majority.len() < self.redundancy {
                    dropped += 1;
                    continue;
                }

                filtered
                    .entry(forward)
                    .or_default()
                    .insert(reverse, ContigMatePairs::new(majority));
            }
        }

        debug!(
            "Orientation filter kept {} contig links, dropped {} below redundancy {}",
            filtered.values().map(|t| t.len()).sum::<usize>(),
            dropped,
            self.redundancy
        );
        filtered
    }
}
