//! Assembly driver
//! ===============
//!
//! Runs the whole pipeline on one read set:
//!
//! 1. build the de Bruijn graph (k estimated from read lengths when unset)
//! 2. remove tips, eroding low-coverage ends first when enabled
//! 3. remove bubbles until none is found, then remove tips again
//! 4. optionally delete low-coverage simple paths
//! 5. build contigs from the simple paths
//! 6. optionally scaffold contigs with mate pairs
//!
//! Parallel work runs on a dedicated rayon pool sized from the configuration.

use crate::assembly::contig_builder::{ContigBuilder, LowCoverageContigPurger, SimplePathContigBuilder};
use crate::assembly::dangling_links::DanglingLinksPurger;
use crate::assembly::graph::DeBruijnGraph;
use crate::assembly::purger::GraphErrorPurger;
use crate::assembly::redundant_paths::RedundantPathsPurger;
use crate::core::data_structures::{AssemblyStats, Contig, SequenceRead};
use crate::core::kmer::{is_unambiguous_dna, MAX_KMER_LENGTH};
use crate::scaffold::builder::{GraphScaffoldBuilder, ScaffoldStatistics};
use crate::utils::configuration::{AssemblerConfiguration, AssemblyError};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Graph size after one pipeline phase
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub nodes: usize,
    pub extensions: usize,
}

impl GraphSnapshot {
    fn of(graph: &DeBruijnGraph) -> Self {
        Self {
            nodes: graph.node_count(),
            extensions: graph.extension_count(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssemblyStatistics {
    pub kmer_length: usize,
    pub total_reads: usize,
    pub skipped_reads: usize,
    pub after_build: GraphSnapshot,
    pub after_undangle: GraphSnapshot,
    pub after_redundancy: GraphSnapshot,
    pub after_cleanup: GraphSnapshot,
    pub dangling_nodes_removed: usize,
    pub redundant_nodes_removed: usize,
    pub low_coverage_nodes_removed: usize,
    pub contigs: AssemblyStats,
    pub scaffold: Option<ScaffoldStatistics>,
    pub elapsed_ms: u64,
}

impl AssemblyStatistics {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[derive(Debug, Clone)]
pub struct AssemblyOutput {
    pub contigs: Vec<Contig>,
    /// Present only when scaffolding ran
    pub scaffolds: Option<Vec<String>>,
    pub statistics: AssemblyStatistics,
}

impl AssemblyOutput {
    pub fn contig_sequences(&self) -> Vec<String> {
        self.contigs.iter().map(|c| c.sequence.clone()).collect()
    }
}

/// Coverage thresholds derived from the graph when not configured
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoverageThresholds {
    pub erosion: usize,
    pub contig_coverage: f64,
}

pub struct ParallelDeNovoAssembler {
    config: AssemblerConfiguration,
    dangling_purger: Box<dyn GraphErrorPurger>,
    redundant_purger: Box<dyn GraphErrorPurger>,
    contig_builder: Box<dyn ContigBuilder>,
    low_coverage_purger: Box<dyn LowCoverageContigPurger>,
}

impl ParallelDeNovoAssembler {
    pub fn new(config: AssemblerConfiguration) -> Self {
        Self {
            config,
            dangling_purger: Box::new(DanglingLinksPurger::new(0)),
            redundant_purger: Box::new(RedundantPathsPurger::new(0)),
            contig_builder: Box::new(SimplePathContigBuilder::new()),
            low_coverage_purger: Box::new(SimplePathContigBuilder::new()),
        }
    }

    pub fn with_dangling_links_purger(mut self, purger: Box<dyn GraphErrorPurger>) -> Self {
        self.dangling_purger = purger;
        self
    }

    pub fn with_redundant_paths_purger(mut self, purger: Box<dyn GraphErrorPurger>) -> Self {
        self.redundant_purger = purger;
        self
    }

    pub fn with_contig_builder(mut self, builder: Box<dyn ContigBuilder>) -> Self {
        self.contig_builder = builder;
        self
    }

    pub fn with_low_coverage_purger(mut self, purger: Box<dyn LowCoverageContigPurger>) -> Self {
        self.low_coverage_purger = purger;
        self
    }

    pub fn config(&self) -> &AssemblerConfiguration {
        &self.config
    }

    /// Assemble `reads` into contigs and, when configured, scaffolds
    pub fn assemble<I>(&mut self, reads: I) -> Result<AssemblyOutput>
    where
        I: IntoIterator<Item = SequenceRead>,
    {
        let reads: Vec<SequenceRead> = reads.into_iter().collect();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.performance.num_threads.max(1))
            .build()?;
        pool.install(|| self.run(&reads))
    }

    fn run(&mut self, reads: &[SequenceRead]) -> Result<AssemblyOutput> {
        let start = Instant::now();
        info!("🚀 Starting de novo assembly");
        info!("   📊 Input: {} reads", reads.len());

        let usable: Vec<&SequenceRead> = reads
            .iter()
            .filter(|read| !read.is_empty() && is_unambiguous_dna(&read.sequence))
            .collect();
        if usable.is_empty() {
            warn!("No reads made only of A, C, G, T; nothing to assemble");
            return Ok(AssemblyOutput {
                contigs: Vec::new(),
                scaffolds: None,
                statistics: AssemblyStatistics {
                    total_reads: reads.len(),
                    skipped_reads: reads.len(),
                    elapsed_ms: start.elapsed().as_millis() as u64,
                    ..AssemblyStatistics::default()
                },
            });
        }

        let lengths = usable.iter().map(|read| read.len());
        let shortest = lengths.clone().min().unwrap_or(0);
        let longest = lengths.max().unwrap_or(0);

        let k = match self.config.assembly.kmer_length {
            Some(k) => k,
            None => estimate_kmer_length(shortest, longest)?,
        };
        validate_kmer_length(k, shortest)?;
        info!("   🧬 K-mer length: {}", k);

        let mut graph = DeBruijnGraph::build(reads.iter().map(|read| read.sequence.as_str()), k)?;
        let mut statistics = AssemblyStatistics {
            kmer_length: k,
            total_reads: reads.len(),
            skipped_reads: graph.build_statistics().skipped_reads,
            after_build: GraphSnapshot::of(&graph),
            ..AssemblyStatistics::default()
        };
        info!(
            "   📈 Graph: {} nodes, {} extensions ({} reads skipped)",
            statistics.after_build.nodes, statistics.after_build.extensions, statistics.skipped_reads
        );

        let assembly = self.config.assembly.clone();
        let dangling_threshold = assembly.dangling_links_threshold_for(k);
        let redundant_threshold = assembly.redundant_path_length_threshold_for(k);

        let needs_estimate = (assembly.erosion && assembly.erosion_threshold.is_none())
            || (assembly.low_coverage_contig_removal && assembly.contig_coverage_threshold.is_none());
        let estimated = if needs_estimate {
            estimate_coverage_thresholds(&graph)
        } else {
            CoverageThresholds {
                erosion: 0,
                contig_coverage: 0.0,
            }
        };

        let erosion_threshold = if assembly.erosion {
            Some(assembly.erosion_threshold.unwrap_or(estimated.erosion))
        } else {
            None
        };
        statistics.dangling_nodes_removed += self.undangle(&mut graph, dangling_threshold, erosion_threshold);
        statistics.after_undangle = GraphSnapshot::of(&graph);
        info!(
            "   ✂️  Tip removal: {} nodes left",
            statistics.after_undangle.nodes
        );

        statistics.redundant_nodes_removed = self.redundant_purger.clean(&mut graph, redundant_threshold);
        statistics.after_redundancy = GraphSnapshot::of(&graph);
        info!(
            "   🫧 Bubble removal: {} nodes removed",
            statistics.redundant_nodes_removed
        );

        statistics.dangling_nodes_removed += self.undangle(&mut graph, dangling_threshold, None);

        if assembly.low_coverage_contig_removal {
            let threshold = assembly
                .contig_coverage_threshold
                .unwrap_or(estimated.contig_coverage);
            if threshold > 0.0 {
                statistics.low_coverage_nodes_removed = self
                    .low_coverage_purger
                    .remove_low_coverage_contigs(&mut graph, threshold);
                debug!(
                    "Removed {} nodes on paths below coverage {:.2}",
                    statistics.low_coverage_nodes_removed, threshold
                );
            }
        }
        statistics.after_cleanup = GraphSnapshot::of(&graph);

        let contigs = self.contig_builder.build(&graph);
        statistics.contigs = AssemblyStats::from_contigs(&contigs);
        info!(
            "   🧩 {} contigs, N50 {}",
            contigs.len(),
            statistics.contigs.n50
        );

        let scaffolds = self.scaffold(&contigs, reads, k, &mut statistics)?;

        statistics.elapsed_ms = start.elapsed().as_millis() as u64;
        info!("✅ Assembly complete in {} ms", statistics.elapsed_ms);

        Ok(AssemblyOutput {
            contigs,
            scaffolds,
            statistics,
        })
    }

    /// Tip removal with a growing threshold.
    ///
    /// Each threshold below `threshold` gets a single round; erosion, when
    /// requested, replaces that ladder with the tip lengths it observed. The
    /// final threshold repeats until nothing is found.
    fn undangle(&mut self, graph: &mut DeBruijnGraph, threshold: usize, erosion: Option<usize>) -> usize {
        if threshold == 0 {
            return 0;
        }
        let purger = &mut self.dangling_purger;
        purger.set_length_threshold(threshold - 1);

        let ladder: Vec<usize> = match (erosion, purger.as_eroder()) {
            (Some(erosion_threshold), Some(eroder)) => eroder
                .erode_graph_ends(graph, erosion_threshold)
                .into_iter()
                .collect(),
            _ => (1..threshold).collect(),
        };

        let mut removed = 0;
        for length in ladder {
            if graph.node_count() >= length {
                purger.set_length_threshold(length);
                let paths = purger.detect_erroneous_nodes(graph);
                removed += purger.remove_erroneous_nodes(graph, &paths);
            }
        }

        purger.set_length_threshold(threshold);
        while graph.node_count() >= threshold {
            let paths = purger.detect_erroneous_nodes(graph);
            if paths.is_empty() {
                break;
            }
            removed += purger.remove_erroneous_nodes(graph, &paths);
        }

        removed
    }

    fn scaffold(
        &self,
        contigs: &[Contig],
        reads: &[SequenceRead],
        k: usize,
        statistics: &mut AssemblyStatistics,
    ) -> Result<Option<Vec<String>>> {
        let scaffold = &self.config.scaffold;
        if !scaffold.enabled {
            return Ok(None);
        }
        let library = scaffold.clone_library()?;
        if library.is_empty() {
            warn!("Scaffolding enabled but no clone library configured; skipping");
            return Ok(None);
        }

        let sequences: Vec<&str> = contigs.iter().map(|c| c.sequence.as_str()).collect();
        let output = GraphScaffoldBuilder::new(k, scaffold.depth, scaffold.redundancy)
            .build_scaffolds(&sequences, reads, &library)?;
        statistics.scaffold = Some(output.statistics);
        Ok(Some(output.scaffolds))
    }
}

/// Pick an odd k between half the longest and the shortest read length
pub fn estimate_kmer_length(shortest: usize, longest: usize) -> Result<usize> {
    let low = (longest / 2).max(1);
    let high = shortest;

    let mut k = if low < high { (low + high + 1) / 2 } else { high };
    if k % 2 == 0 {
        k += 1;
        if k > high {
            k = k.saturating_sub(2);
        }
    }
    let k = k.max(1);

    if high < k {
        return Err(AssemblyError::ValidationError {
            field: "kmer_length".to_string(),
            reason: format!("no k-mer length fits reads of length {shortest}"),
        }
        .into());
    }
    Ok(k.min(MAX_KMER_LENGTH))
}

fn validate_kmer_length(k: usize, shortest: usize) -> Result<()> {
    if k == 0 || k > MAX_KMER_LENGTH {
        return Err(AssemblyError::ValidationError {
            field: "kmer_length".to_string(),
            reason: format!("must be between 1 and {MAX_KMER_LENGTH}, got {k}"),
        }
        .into());
    }
    if k > shortest {
        return Err(AssemblyError::ValidationError {
            field: "kmer_length".to_string(),
            reason: format!("{k} exceeds the shortest read length {shortest}"),
        }
        .into());
    }
    Ok(())
}

/// Square root of the median coverage over nodes seen more than twice
pub fn estimate_coverage_thresholds(graph: &DeBruijnGraph) -> CoverageThresholds {
    let mut coverages: Vec<u8> = graph.coverages().into_iter().filter(|&c| c > 2).collect();
    let estimate = if coverages.is_empty() {
        2.0
    } else {
        coverages.sort_unstable();
        let middle = coverages.len() / 2;
        let median = if coverages.len() % 2 == 1 {
            f64::from(coverages[middle])
        } else {
            (f64::from(coverages[middle - 1]) + f64::from(coverages[middle])) / 2.0
        };
        median.sqrt()
    };

    CoverageThresholds {
        erosion: estimate.round() as usize,
        contig_coverage: estimate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reads(sequences: &[&str]) -> Vec<SequenceRead> {
        sequences
            .iter()
            .enumerate()
            .map(|(i, s)| SequenceRead::anonymous(i, *s))
            .collect()
    }

    fn config(k: usize) -> AssemblerConfiguration {
        let mut config = AssemblerConfiguration::default();
        config.assembly.kmer_length = Some(k);
        // a lone read is itself a dangling link
        config.assembly.dangling_links_threshold = Some(0);
        config.performance.num_threads = 2;
        config
    }

    #[test]
    fn test_estimate_kmer_length() {
        assert_eq!(estimate_kmer_length(12, 17).unwrap(), 11);
        assert_eq!(estimate_kmer_length(7, 13).unwrap(), 7);
        assert_eq!(estimate_kmer_length(100, 100).unwrap(), 31);
        assert_eq!(estimate_kmer_length(1, 1).unwrap(), 1);
        assert_eq!(estimate_kmer_length(4, 4).unwrap(), 3);
    }

    #[test]
    fn test_coverage_threshold_estimate() {
        let graph = DeBruijnGraph::build(vec!["ACGTT"; 9], 5).unwrap();
        let thresholds = estimate_coverage_thresholds(&graph);
        assert_eq!(thresholds.erosion, 3);
        assert!((thresholds.contig_coverage - 3.0).abs() < 1e-12);

        let graph = DeBruijnGraph::build(vec!["ACGTT"], 5).unwrap();
        assert_eq!(estimate_coverage_thresholds(&graph).contig_coverage, 2.0);
    }

    #[test]
    fn test_kmer_longer_than_reads_rejected() {
        let mut assembler = ParallelDeNovoAssembler::new(config(9));
        let err = assembler.assemble(reads(&["GATTACA"])).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AssemblyError>(),
            Some(AssemblyError::ValidationError { .. })
        ));
    }

    #[test]
    fn test_only_ambiguous_reads() {
        let mut assembler = ParallelDeNovoAssembler::new(config(3));
        let output = assembler.assemble(reads(&["NNNN", "ACNGT"])).unwrap();
        assert!(output.contigs.is_empty());
        assert_eq!(output.statistics.skipped_reads, 2);
    }

    #[test]
    fn test_single_read_round_trips() {
        let mut assembler = ParallelDeNovoAssembler::new(config(5));
        let output = assembler.assemble(reads(&["GATTACAGGC"])).unwrap();
        let sequences = output.contig_sequences();
        assert_eq!(sequences.len(), 1);
        assert!(sequences[0] == "GATTACAGGC" || sequences[0] == "GCCTGTAATC");
        assert!(output.scaffolds.is_none());
        assert_eq!(output.statistics.after_build.nodes, 6);
    }

    #[test]
    fn test_statistics_serialize() {
        let mut assembler = ParallelDeNovoAssembler::new(config(5));
        let output = assembler.assemble(reads(&["GATTACAGGC"])).unwrap();
        let json = output.statistics.to_json().unwrap();
        assert!(json.contains("\"kmer_length\": 5"));
    }
}
