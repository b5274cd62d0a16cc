//! 碱基组成与 Poisson 显著性模型，用于区分真实匹配与偶然的词命中。

pub mod composition;
pub mod significance;

pub use composition::{composition_of, prob_word, Composition, MAX_POLY};
pub use significance::{expected_scores, SignificanceModel};
