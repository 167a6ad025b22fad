//! De Bruijn graph assembly
//!
//! Graph construction, error purging (tips and bubbles), contig building and
//! the driver tying them together.

pub mod assembler;
pub mod contig_builder;
pub mod dangling_links;
pub mod graph;
pub mod purger;
pub mod redundant_paths;

pub use assembler::{
    estimate_coverage_thresholds, estimate_kmer_length, AssemblyOutput, AssemblyStatistics,
    CoverageThresholds, GraphSnapshot, ParallelDeNovoAssembler,
};
pub use contig_builder::{ContigBuilder, LowCoverageContigPurger, SimplePathContigBuilder};
pub use dangling_links::DanglingLinksPurger;
pub use graph::{BuildStatistics, DeBruijnGraph, DeBruijnNode, Extension, Side};
pub use purger::{DeBruijnPath, GraphEndsEroder, GraphErrorPurger};
pub use redundant_paths::{PathCluster, RedundantPathsPurger};
