//! Mate pair evidence linking contigs

use crate::core::data_structures::SequenceRead;
use crate::core::paired_reads::{CloneLibrary, MateName, ReadOrientation};
use crate::scaffold::read_mapper::ReadPlacements;
use ahash::AHashMap;
use std::collections::BTreeMap;
use tracing::debug;

/// One mate pair with its reads placed on two different contigs
#[derive(Debug, Clone, PartialEq)]
pub struct ValidMatePair {
    /// Start of the forward read on the forward contig
    pub forward_contig_start: usize,
    /// Last position of the reverse read on the reverse contig
    pub reverse_contig_start: usize,
    /// Same position measured on the reverse complement of the reverse contig
    pub reverse_complement_start: usize,
    /// Both mates matched the same strand of their contigs
    pub same_strand: bool,
    pub mean: f64,
    pub standard_deviation: f64,
}

/// Evidence for one directed contig link and its distance estimate.
///
/// Index 0 of `distance`/`standard_deviation` assumes the reverse contig
/// keeps its orientation, index 1 that it is reverse complemented.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ContigMatePairs {
    pub pairs: Vec<ValidMatePair>,
    pub distance: [f64; 2],
    pub standard_deviation: [f64; 2],
    pub weight: usize,
}

impl ContigMatePairs {
    pub fn new(pairs: Vec<ValidMatePair>) -> Self {
        Self {
            pairs,
            ..Self::default()
        }
    }

    /// Orientation index for a target read in `same_orientation`
    pub fn orientation_index(same_orientation: bool) -> usize {
        if same_orientation {
            0
        } else {
            1
        }
    }

    /// Whether `length` lies within three deviations of the estimate
    pub fn accepts(&self, length: f64, same_orientation: bool) -> bool {
        let o = Self::orientation_index(same_orientation);
        let slack = 3.0 * self.standard_deviation[o];
        length >= self.distance[o] - slack && length <= self.distance[o] + slack
    }
}

/// forward contig -> reverse contig -> evidence
pub type MatePairLinks = BTreeMap<usize, BTreeMap<usize, ContigMatePairs>>;

pub struct MatePairMapper<'a> {
    library: &'a CloneLibrary,
}

impl<'a> MatePairMapper<'a> {
    pub fn new(library: &'a CloneLibrary) -> Self {
        Self { library }
    }

    /// Pair up placed reads by name and emit a link for every placement of
    /// the two mates on distinct contigs
    pub fn map_mate_pairs<S: AsRef<str>>(
        &self,
        reads: &[SequenceRead],
        placements: &AHashMap<String, ReadPlacements>,
        contigs: &[S],
    ) -> MatePairLinks {
        let named: AHashMap<&str, MateName> = reads
            .iter()
            .filter_map(|read| MateName::parse(&read.id).map(|name| (read.id.as_str(), name)))
            .collect();

        let empty = ReadPlacements::new();
        let mut links = MatePairLinks::new();
        let mut unknown_libraries = 0usize;

        for read in reads {
            let Some(name) = named.get(read.id.as_str()) else {
                continue;
            };
            if name.orientation() != ReadOrientation::Forward {
                continue;
            }
            let mate_id = name.mate_id();
            if !named.contains_key(mate_id.as_str()) {
                continue;
            }
            let record = match self.library.require(&name.library) {
                Ok(record) => record,
                Err(e) => {
                    debug!("Skipping mate pair {}: {}", name, e);
                    unknown_libraries += 1;
                    continue;
                }
            };

            let forward_maps = placements.get(&read.id).unwrap_or(&empty);
            let reverse_maps = placements.get(&mate_id).unwrap_or(&empty);

            for (&forward_contig, forward_list) in forward_maps {
                for (&reverse_contig, reverse_list) in reverse_maps {
                    if forward_contig == reverse_contig {
                        continue;
                    }
                    let Some(reverse_length) = contigs.get(reverse_contig).map(|c| c.as_ref().len()) else {
                        continue;
                    };

                    for forward in forward_list {
                        for reverse in reverse_list {
                            let pair = ValidMatePair {
                                forward_contig_start: forward.contig_start,
                                reverse_contig_start: reverse.contig_start + reverse.length - 1,
                                reverse_complement_start: reverse_length
                                    .saturating_sub(reverse.contig_start + 1),
                                same_strand: forward.is_forward == reverse.is_forward,
                                mean: record.mean,
                                standard_deviation: record.standard_deviation,
                            };
                            links
                                .entry(forward_contig)
                                .or_default()
                                .entry(reverse_contig)
                                .or_default()
                                .pairs
                                .push(pair);
                        }
                    }
                }
            }
        }

        if unknown_libraries > 0 {
            debug!("{} mate pairs named an unknown clone library", unknown_libraries);
        }
        links
    }
}

/// Total number of pairs across all links
pub fn pair_count(links: &MatePairLinks) -> usize {
    links
        .values()
        .flat_map(|targets| targets.values())
        .map(|link| link.pairs.len())
        .sum()
}
