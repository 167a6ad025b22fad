//! # denovo-forge - De Bruijn Graph Genome Assembler
//!
//! A parallel de novo assembler built in Rust. Reads are decomposed into
//! canonical k-mers, the resulting de Bruijn graph is cleaned of tips and
//! bubbles, unbranched paths become contigs, and contigs can optionally be
//! ordered into scaffolds using mate-pair reads and clone library insert sizes.

pub mod assembly;
pub mod core;
pub mod scaffold;
pub mod utils;

// Re-export commonly used types at crate level
pub use crate::assembly::{AssemblyOutput, AssemblyStatistics, DeBruijnGraph, ParallelDeNovoAssembler};
pub use crate::core::data_structures::*;
pub use crate::core::paired_reads::{CloneLibrary, CloneLibraryRecord};
pub use crate::scaffold::GraphScaffoldBuilder;
pub use crate::utils::configuration::{AssemblerConfiguration, AssemblyError, ConfigurationManager};

/// Result type used throughout the crate
pub type Result<T> = anyhow::Result<T>;

/// Error type used throughout the crate
pub type Error = anyhow::Error;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_error_survives_anyhow() {
        fn failing() -> Result<()> {
            Err(AssemblyError::DuplicateRead {
                id: "r.F:lib".to_string(),
            }
            .into())
        }

        let err = failing().unwrap_err();
        assert!(err.to_string().contains("r.F:lib"));
        assert!(matches!(
            err.downcast_ref::<AssemblyError>(),
            Some(AssemblyError::DuplicateRead { .. })
        ));
    }

    #[test]
    fn test_module_exports() {
        let contig = Contig {
            id: 1,
            sequence: "ATCGATCG".to_string(),
            length: 8,
            coverage: 10.0,
            node_path: vec![NodeId(0), NodeId(1), NodeId(2), NodeId(3)],
            contig_type: ContigType::Linear,
        };
        assert_eq!(contig.length, contig.sequence.len());

        let library = CloneLibrary::with_builtin_libraries();
        assert!(library.get("0.5K").is_some());

        let graph = DeBruijnGraph::build(vec!["GATTACA"], 5).unwrap();
        assert_eq!(graph.node_count(), 3);

        let scaffolds = GraphScaffoldBuilder::new(5, 3, 1)
            .build_scaffolds(&["GATTACA"], &[], &library)
            .unwrap();
        assert_eq!(scaffolds.scaffolds, vec!["GATTACA".to_string()]);

        let mut config = AssemblerConfiguration::default();
        config.assembly.kmer_length = Some(5);
        let output = ParallelDeNovoAssembler::new(config)
            .assemble(Vec::<SequenceRead>::new())
            .unwrap();
        assert!(output.contigs.is_empty());
    }
}
