//! Property-based tests for k-mers, graph construction and assembly
//! Tests invariants that should hold across randomly generated DNA

use denovo_forge::assembly::DeBruijnGraph;
use denovo_forge::core::kmer::{reverse_complement, KmerData};
use denovo_forge::{AssemblerConfiguration, ParallelDeNovoAssembler, SequenceRead};
use std::collections::HashSet;

fn random_dna(rng: &mut fastrand::Rng, length: usize) -> String {
    (0..length)
        .map(|_| match rng.usize(0..4) {
            0 => 'A',
            1 => 'C',
            2 => 'G',
            _ => 'T',
        })
        .collect()
}

/// Random windows over a random genome, roughly a third of them reverse complemented
fn random_reads(rng: &mut fastrand::Rng, min_length: usize) -> Vec<SequenceRead> {
    let genome_length = rng.usize(60..150);
    let genome = random_dna(rng, genome_length);
    (0..rng.usize(5..40))
        .map(|i| {
            let length = rng.usize(min_length..=30);
            let start = rng.usize(0..=genome.len() - length);
            let window = &genome[start..start + length];
            let sequence = if rng.usize(0..3) == 0 {
                reverse_complement(window)
            } else {
                window.to_string()
            };
            SequenceRead::anonymous(i, sequence)
        })
        .collect()
}

#[cfg(test)]
pub mod kmer_properties {
    use super::*;

    #[test]
    fn property_reverse_complement_involution() {
        let mut rng = fastrand::Rng::with_seed(7);
        for _ in 0..200 {
            let length = rng.usize(1..64);
            let seq = random_dna(&mut rng, length);
            assert_eq!(reverse_complement(&reverse_complement(&seq)), seq);
        }
    }

    #[test]
    fn property_canonical_form_shared_by_both_strands() {
        let mut rng = fastrand::Rng::with_seed(11);
        for _ in 0..200 {
            let length = rng.usize(1..=31);
            let seq = random_dna(&mut rng, length);
            let forward = KmerData::new(&seq).unwrap();
            let reverse = KmerData::new(&reverse_complement(&seq)).unwrap();

            assert_eq!(forward.canonical().0, reverse.canonical().0);
            assert_eq!(forward.reverse_complement(), reverse);
        }
    }

    #[test]
    fn property_packing_preserves_sequence_and_order() {
        let mut rng = fastrand::Rng::with_seed(13);
        for _ in 0..200 {
            let k = rng.usize(1..=31);
            let a = random_dna(&mut rng, k);
            let b = random_dna(&mut rng, k);
            let (ka, kb) = (KmerData::new(&a).unwrap(), KmerData::new(&b).unwrap());

            assert_eq!(ka.to_sequence(), a);
            assert_eq!(ka < kb, a < b);
            assert_eq!(ka == kb, a == b);
        }
    }

    #[test]
    fn property_rejects_non_acgt() {
        for bad in ["ACGN", "AC-T", ""] {
            assert!(KmerData::new(bad).is_err(), "{bad:?} should not pack");
        }
        assert!(KmerData::new(&"A".repeat(32)).is_err());
    }
}

#[cfg(test)]
pub mod graph_properties {
    use super::*;

    #[test]
    fn property_graph_independent_of_read_strand() {
        let mut rng = fastrand::Rng::with_seed(17);
        for _ in 0..30 {
            let reads = random_reads(&mut rng, 10);
            let k = [5, 7, 9][rng.usize(0..3)];
            let forward: Vec<&str> = reads.iter().map(|r| r.sequence.as_str()).collect();
            let flipped: Vec<String> = forward.iter().map(|s| reverse_complement(s)).collect();

            let a = DeBruijnGraph::build(forward, k).unwrap();
            let b = DeBruijnGraph::build(flipped, k).unwrap();
            assert_eq!(a.node_count(), b.node_count());
            assert_eq!(a.extension_count(), b.extension_count());
        }
    }

    #[test]
    fn property_every_kmer_of_every_read_is_a_node() {
        let mut rng = fastrand::Rng::with_seed(19);
        for _ in 0..20 {
            let reads = random_reads(&mut rng, 10);
            let k = 7;
            let graph = DeBruijnGraph::build(reads.iter().map(|r| r.sequence.as_str()), k).unwrap();

            let mut distinct = HashSet::new();
            for read in &reads {
                for start in 0..=read.len() - k {
                    let kmer = &read.sequence[start..start + k];
                    assert!(graph.find(kmer).is_some());
                    let rc = reverse_complement(kmer);
                    distinct.insert(if rc.as_str() < kmer { rc } else { kmer.to_string() });
                }
            }
            assert_eq!(distinct.len(), graph.node_count());
        }
    }
}

#[cfg(test)]
pub mod assembly_properties {
    use super::*;

    fn config(k: usize) -> AssemblerConfiguration {
        let mut config = AssemblerConfiguration::default();
        config.assembly.kmer_length = Some(k);
        config.performance.num_threads = 2;
        config
    }

    #[test]
    fn property_contigs_partition_surviving_nodes() {
        let mut rng = fastrand::Rng::with_seed(23);
        for _ in 0..25 {
            let reads = random_reads(&mut rng, 12);
            let k = [5, 7, 9][rng.usize(0..3)];
            let output = ParallelDeNovoAssembler::new(config(k)).assemble(reads).unwrap();

            let mut seen = HashSet::new();
            for contig in &output.contigs {
                assert_eq!(contig.length, contig.sequence.len());
                assert_eq!(contig.sequence.len(), contig.node_path.len() + k - 1);
                for node in &contig.node_path {
                    assert!(seen.insert(*node), "node {:?} used twice", node);
                }
            }
            assert_eq!(seen.len(), output.statistics.after_cleanup.nodes);
        }
    }

    #[test]
    fn property_cleaning_never_grows_graph() {
        let mut rng = fastrand::Rng::with_seed(29);
        for _ in 0..25 {
            let reads = random_reads(&mut rng, 12);
            let output = ParallelDeNovoAssembler::new(config(7)).assemble(reads).unwrap();
            let stats = &output.statistics;

            assert!(stats.after_undangle.nodes <= stats.after_build.nodes);
            assert!(stats.after_redundancy.nodes <= stats.after_undangle.nodes);
            assert!(stats.after_cleanup.nodes <= stats.after_redundancy.nodes);
            assert_eq!(
                stats.after_build.nodes - stats.after_cleanup.nodes,
                stats.dangling_nodes_removed + stats.redundant_nodes_removed + stats.low_coverage_nodes_removed
            );
        }
    }

    #[test]
    fn property_contig_sequences_are_dna() {
        let mut rng = fastrand::Rng::with_seed(31);
        for _ in 0..15 {
            let reads = random_reads(&mut rng, 12);
            let output = ParallelDeNovoAssembler::new(config(9)).assemble(reads).unwrap();
            for sequence in output.contig_sequences() {
                assert!(sequence.bytes().all(|b| b"ACGT".contains(&b)));
            }
        }
    }
}
