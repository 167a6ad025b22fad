//! Exact k-mer placement of reads on contigs

use crate::core::data_structures::SequenceRead;
use crate::core::kmer::{KmerData, KmerWindows};
use crate::utils::configuration::AssemblyError;
use crate::Result;
use ahash::{AHashMap, AHashSet};
use rayon::prelude::*;
use std::collections::BTreeMap;

/// Collinear exact match between a read and a contig
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadContigMap {
    /// Leftmost contig position covered by the match
    pub contig_start: usize,
    /// Read position of the first matching k-mer
    pub read_start: usize,
    pub length: usize,
    /// Read matches the contig's forward strand
    pub is_forward: bool,
    /// Whole read is covered
    pub full_overlap: bool,
}

/// Matches of one read, per contig index
pub type ReadPlacements = BTreeMap<usize, Vec<ReadContigMap>>;

pub struct ReadContigMapper {
    kmer_length: usize,
    index: AHashMap<KmerData, Vec<(usize, usize)>>,
}

impl ReadContigMapper {
    /// Index the forward k-mers of the selected contigs
    pub fn new<S: AsRef<str>>(contigs: &[S], selected: &[usize], kmer_length: usize) -> Self {
        let mut index: AHashMap<KmerData, Vec<(usize, usize)>> = AHashMap::new();
        for &contig in selected {
            let Some(sequence) = contigs.get(contig) else {
                continue;
            };
            for (position, forward, _) in KmerWindows::new(sequence.as_ref().as_bytes(), kmer_length) {
                index.entry(forward).or_default().push((contig, position));
            }
        }

        Self { kmer_length, index }
    }

    pub fn kmer_length(&self) -> usize {
        self.kmer_length
    }

    /// Place every read, rejecting duplicate identifiers
    pub fn map_reads(&self, reads: &[SequenceRead]) -> Result<AHashMap<String, ReadPlacements>> {
        let mut seen = AHashSet::with_capacity(reads.len());
        for read in reads {
            if !seen.insert(read.id.as_str()) {
                return Err(AssemblyError::DuplicateRead {
                    id: read.id.clone(),
                }
                .into());
            }
        }

        let mapped: Vec<(String, ReadPlacements)> = reads
            .par_iter()
            .map(|read| (read.id.clone(), self.map_read(&read.sequence)))
            .collect();
        Ok(mapped.into_iter().collect())
    }

    /// Extend an existing match by one k-mer or open a new one
    pub fn map_read(&self, sequence: &str) -> ReadPlacements {
        let k = self.kmer_length;
        let mut placements = ReadPlacements::new();

        for (read_position, forward, reverse) in KmerWindows::new(sequence.as_bytes(), k) {
            let forward_hits = self.hits(&forward).iter().map(|&(c, p)| (c, p, true));
            let reverse_hits = self.hits(&reverse).iter().map(|&(c, p)| (c, p, false));

            for (contig, contig_position, is_forward) in forward_hits.chain(reverse_hits) {
                let maps = placements.entry(contig).or_default();
                let extended = maps.iter_mut().any(|map| {
                    if map.is_forward != is_forward || read_position != map.read_start + map.length - k + 1 {
                        return false;
                    }
                    if is_forward && contig_position == map.contig_start + map.length - k + 1 {
                        map.length += 1;
                        return true;
                    }
                    if !is_forward && contig_position + 1 == map.contig_start {
                        map.length += 1;
                        map.contig_start = contig_position;
                        return true;
                    }
                    false
                });

                if !extended {
                    maps.push(ReadContigMap {
                        contig_start: contig_position,
                        read_start: read_position,
                        length: k,
                        is_forward,
                        full_overlap: false,
                    });
                }
            }
        }

        let read_length = sequence.len();
        for map in placements.values_mut().flatten() {
            map.full_overlap = map.length == read_length;
        }
        placements
    }

    fn hits(&self, kmer: &KmerData) -> &[(usize, usize)] {
        self.index.get(kmer).map(Vec::as_slice).unwrap_or(&[])
    }
}
