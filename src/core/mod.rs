pub mod data_structures;
pub mod kmer;
pub mod paired_reads;

pub use data_structures::{AssemblyStats, Contig, ContigType, NodeId, SequenceRead};
pub use kmer::{reverse_complement, KmerData, KmerWindows, MAX_KMER_LENGTH};
pub use paired_reads::{CloneLibrary, CloneLibraryRecord, MateName, ReadOrientation};
