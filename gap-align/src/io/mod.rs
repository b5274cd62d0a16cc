pub mod fasta;
pub mod report;

pub use fasta::{read_fasta_file, FastaReader, FastaRecord};
pub use report::ReportWriter;
