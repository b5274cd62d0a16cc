//! # gap-align
//!
//! 面向组装读段与 contig 的序列比较引擎，适用于带 pad 的序列。
//!
//! 本 crate 提供：
//!
//! - **k-mer 索引**：2-bit 滚动哈希，按位置串起同一词的所有出现
//! - **显著性模型**：由碱基组成推出随机词命中概率，再用 Poisson 尾概率给出对角线阈值
//! - **种子查找**：灵敏模式（对角线直方图）与块模式（精确匹配块）
//! - **块链**：选出得分最高的有序不重叠块链
//! - **带状比对**：三状态仿射 gap 动态规划，对已有 pad 的 gap 只收很小的代价
//!
//! ## 快速示例
//!
//! ```rust,no_run
//! use gap_align::align::Comparer;
//! use gap_align::config::CompareOpt;
//!
//! let seq1 = b"GATTACAGGCTTAACGTAGCATCGATCGGATCCTAGGCTAGCTAGGATCC";
//! let seq2 = b"CTTAACGTAGCATCGATCGGATCCTAGGCTAGCTAGGATCCGGTTAACCAAT";
//!
//! let mut cmp = Comparer::new(CompareOpt::default()).expect("config");
//! let index = cmp.build_index(seq1).expect("index");
//! if let Some(ov) = cmp.compare(&index, seq2).expect("compare") {
//!     println!("{} bp overlap, {:.1}% identity", ov.length, ov.percent);
//! }
//! ```
//!
//! ## 模块说明
//!
//! - [`index`] — k-mer 索引与多 contig 拼接索引
//! - [`stats`] — 碱基组成与显著性阈值表
//! - [`align`] — 种子、块链、带状比对、分段拼接与比较入口
//! - [`batch`] — 多序列并行两两比较
//! - [`config`] — 比较参数与 TOML 配置
//! - [`io`] — FASTA 读取与重叠报告输出
//! - [`util`] — DNA 编码、互补、去 pad 等工具函数

pub mod align;
pub mod batch;
pub mod config;
pub mod error;
pub mod index;
pub mod io;
pub mod stats;
pub mod util;

pub use align::overlap::{Direction, Overlap};
pub use align::Comparer;
pub use config::CompareOpt;
pub use error::{AlignError, AlignResult};
