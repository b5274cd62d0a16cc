pub mod bulk;
pub mod hash;

pub use bulk::{BulkIndex, ContigSpan};
pub use hash::{hash_words, SequenceIndex, NO_WORD};
