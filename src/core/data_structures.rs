//! Core data structures shared by the assembly and scaffolding phases

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable handle of a node inside the de Bruijn graph arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub usize);

impl NodeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// An input read: identifier plus symbol sequence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceRead {
    pub id: String,
    pub sequence: String,
}

impl SequenceRead {
    pub fn new(id: impl Into<String>, sequence: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            sequence: sequence.into(),
        }
    }

    /// Read without a meaningful identifier (contig assembly only)
    pub fn anonymous(index: usize, sequence: impl Into<String>) -> Self {
        Self::new(format!("read_{index}"), sequence)
    }

    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }
}

impl AsRef<str> for SequenceRead {
    fn as_ref(&self) -> &str {
        &self.sequence
    }
}

/// How a contig was produced from the graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContigType {
    /// Unbranched path traced between two ends
    Linear,
    /// Closed loop of nodes with no end points
    Circular,
    /// Single node without usable extensions
    Singleton,
}

/// Assembled contig with the graph nodes it consumed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contig {
    pub id: usize,
    pub sequence: String,
    pub length: usize,
    /// Mean k-mer coverage over `node_path`
    pub coverage: f64,
    pub node_path: Vec<NodeId>,
    pub contig_type: ContigType,
}

/// Summary statistics of a sequence set
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssemblyStats {
    pub total_length: usize,
    pub num_sequences: usize,
    pub n50: usize,
    pub largest: usize,
    pub coverage_mean: f64,
}

impl AssemblyStats {
    pub fn from_contigs(contigs: &[Contig]) -> Self {
        let mut stats = Self::from_lengths(contigs.iter().map(|c| c.length));
        if stats.total_length > 0 {
            let weighted: f64 = contigs
                .iter()
                .map(|c| c.coverage * c.length as f64)
                .sum();
            stats.coverage_mean = weighted / stats.total_length as f64;
        }
        stats
    }

    pub fn from_sequences<S: AsRef<str>>(sequences: &[S]) -> Self {
        Self::from_lengths(sequences.iter().map(|s| s.as_ref().len()))
    }

    fn from_lengths(lengths: impl Iterator<Item = usize>) -> Self {
        let mut lengths: Vec<usize> = lengths.collect();
        if lengths.is_empty() {
            return Self::default();
        }
        lengths.sort_unstable_by(|a, b| b.cmp(a));

        let total_length: usize = lengths.iter().sum();
        let mut cumulative = 0;
        let mut n50 = 0;
        for &length in &lengths {
            cumulative += length;
            if cumulative * 2 >= total_length {
                n50 = length;
                break;
            }
        }

        Self {
            total_length,
            num_sequences: lengths.len(),
            n50,
            largest: lengths[0],
            coverage_mean: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_from_sequences() {
        let stats = AssemblyStats::from_sequences(&["AAAAAAAAAA", "CCCCC", "GGG"]);
        assert_eq!(stats.total_length, 18);
        assert_eq!(stats.num_sequences, 3);
        assert_eq!(stats.largest, 10);
        assert_eq!(stats.n50, 10);
    }

    #[test]
    fn test_stats_empty() {
        let stats = AssemblyStats::from_sequences::<&str>(&[]);
        assert_eq!(stats, AssemblyStats::default());
    }

    #[test]
    fn test_coverage_weighted_by_length() {
        let contig = |length: usize, coverage: f64| Contig {
            id: 0,
            sequence: "A".repeat(length),
            length,
            coverage,
            node_path: Vec::new(),
            contig_type: ContigType::Linear,
        };
        let stats = AssemblyStats::from_contigs(&[contig(30, 2.0), contig(10, 6.0)]);
        assert!((stats.coverage_mean - 3.0).abs() < 1e-9);
    }
}
