//! Mate-pair scaffolding of assembled contigs

pub mod builder;
pub mod contig_graph;
pub mod distance;
pub mod mate_pairs;
pub mod orientation_filter;
pub mod path_purger;
pub mod read_mapper;
pub mod trace_path;

pub use builder::{GraphScaffoldBuilder, ScaffoldOutput, ScaffoldStatistics, GAP_SYMBOL};
pub use contig_graph::{ContigGraph, ContigLink};
pub use distance::DistanceCalculator;
pub use mate_pairs::{ContigMatePairs, MatePairLinks, MatePairMapper, ValidMatePair};
pub use orientation_filter::OrientationBasedMatePairFilter;
pub use path_purger::PathPurger;
pub use read_mapper::{ReadContigMap, ReadContigMapper, ReadPlacements};
pub use trace_path::{PathStep, ScaffoldPath, TracePath};
