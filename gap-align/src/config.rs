//! 比较引擎的配置面：词长、最小匹配、带宽、gap 罚分、边缘 gap 策略、pad 符号等。
//!
//! 所有字段都有默认值，可以从 TOML 文件加载部分字段，再由命令行参数覆盖。

use std::ops::{BitOr, BitOrAssign};
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::{AlignError, AlignResult};

/// 边缘 gap 与回溯起点策略（位掩码）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdgeMode(u8);

impl EdgeMode {
    /// 前导 gap 正常计分
    pub const EDGE_GAPS_COUNT: EdgeMode = EdgeMode(1);
    /// 两条序列的前导 gap 都不计分
    pub const EDGE_GAPS_ZERO: EdgeMode = EdgeMode(2);
    /// 只有 seq2 越过 seq1 左端时（第 0 行）的前导 gap 不计分
    pub const EDGE_GAPS_ZEROX: EdgeMode = EdgeMode(4);
    /// 回溯必须从右下角开始
    pub const FULL_LENGTH_TRACE: EdgeMode = EdgeMode(8);
    /// 在最后一行与最后一列中取最优分数开始回溯
    pub const BEST_EDGE_TRACE: EdgeMode = EdgeMode(16);

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub fn from_bits(bits: u8) -> AlignResult<Self> {
        let mode = EdgeMode(bits);
        mode.check()?;
        Ok(mode)
    }

    pub const fn contains(self, other: EdgeMode) -> bool {
        self.0 & other.0 == other.0
    }

    /// 第 0 行（seq1 一个字符都未消耗）上的前导 gap 是否免费
    pub fn free_leading_row(self) -> bool {
        self.contains(Self::EDGE_GAPS_ZERO) || self.contains(Self::EDGE_GAPS_ZEROX)
    }

    /// 第 0 列上的前导 gap 是否免费
    pub fn free_leading_col(self) -> bool {
        self.contains(Self::EDGE_GAPS_ZERO)
    }

    pub fn best_edge(self) -> bool {
        self.contains(Self::BEST_EDGE_TRACE)
    }

    /// 只保留与前导 gap 相关的位
    pub fn leading(self) -> EdgeMode {
        EdgeMode(self.0 & 0b0111)
    }

    /// 只保留与回溯起点相关的位
    pub fn trailing(self) -> EdgeMode {
        EdgeMode(self.0 & 0b1_1000)
    }

    fn check(self) -> AlignResult<()> {
        if self.0 & !0b1_1111 != 0 {
            return Err(AlignError::invalid(format!("unknown edge mode bits {:#x}", self.0)));
        }
        let leading = [Self::EDGE_GAPS_COUNT, Self::EDGE_GAPS_ZERO, Self::EDGE_GAPS_ZEROX]
            .iter()
            .filter(|&&m| self.contains(m))
            .count();
        if leading != 1 {
            return Err(AlignError::invalid(
                "edge mode needs exactly one of EDGE_GAPS_COUNT / EDGE_GAPS_ZERO / EDGE_GAPS_ZEROX",
            ));
        }
        if self.contains(Self::FULL_LENGTH_TRACE) == self.contains(Self::BEST_EDGE_TRACE) {
            return Err(AlignError::invalid(
                "edge mode needs exactly one of FULL_LENGTH_TRACE / BEST_EDGE_TRACE",
            ));
        }
        Ok(())
    }
}

impl BitOr for EdgeMode {
    type Output = EdgeMode;
    fn bitor(self, rhs: EdgeMode) -> EdgeMode {
        EdgeMode(self.0 | rhs.0)
    }
}

impl BitOrAssign for EdgeMode {
    fn bitor_assign(&mut self, rhs: EdgeMode) {
        self.0 |= rhs.0;
    }
}

impl Default for EdgeMode {
    fn default() -> Self {
        Self::EDGE_GAPS_ZERO | Self::BEST_EDGE_TRACE
    }
}

/// 带宽：绝对对角线数，或较短序列长度的百分比。`Absolute(0)` 表示不限带宽。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BandWidth {
    Absolute(usize),
    Percent(f64),
}

impl BandWidth {
    /// 对给定的序列对求出实际带宽；0 表示不限带宽
    pub fn resolve(self, len1: usize, len2: usize) -> usize {
        match self {
            BandWidth::Absolute(n) => n,
            BandWidth::Percent(p) => {
                let shorter = len1.min(len2) as f64;
                ((shorter * p / 100.0).ceil() as usize).max(1)
            }
        }
    }
}

impl Default for BandWidth {
    fn default() -> Self {
        BandWidth::Absolute(20)
    }
}

/// 种子查找方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// 对角线直方图 + 统计阈值，单次带状比对
    Sensitive,
    /// 精确匹配块 + 链 + 分段比对
    Block,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompareOpt {
    pub mode: SearchMode,
    /// 4, 8, 12 或 14；其他值向上取整
    pub word_length: usize,
    pub min_match: usize,
    /// 匹配块数组的初始容量，超过后加倍
    pub max_matches: usize,
    /// 可接受的最大错配百分比
    pub max_mismatch: f64,
    pub fast_mode: bool,
    pub gap_open: i32,
    pub gap_extend: i32,
    /// 与已有 pad 对齐时的 gap 代价
    pub gap_to_gap: i32,
    pub match_score: i32,
    pub mismatch_score: i32,
    pub edge_mode: EdgeMode,
    pub old_pad: Option<char>,
    pub new_pad: char,
    /// 出现次数超过该值的词在 bulk 比较中被忽略；0 表示不过滤
    pub filter_words: usize,
    pub max_prob: f64,
    pub min_diagonal: usize,
    pub min_block_percent: f64,
    pub fast_min_block_percent: f64,
    pub fast_max_gap: usize,
    pub fast_max_diag_jump: usize,
    /// 链构建时每个块最多考察的不重叠前驱数
    pub chain_window: usize,
    /// 回溯单元数超过该值时改用紧凑存储
    pub packed_trace_cells: usize,
    pub max_trace_bytes: usize,
    pub poisson_iterations: usize,
    pub both_strands: bool,
    pub threads: usize,
    /// 放在最后：TOML 中表必须位于普通键之后
    pub band: BandWidth,
}

impl Default for CompareOpt {
    fn default() -> Self {
        Self {
            mode: SearchMode::Block,
            word_length: 8,
            min_match: 20,
            max_matches: 5000,
            max_mismatch: 30.0,
            fast_mode: false,
            band: BandWidth::default(),
            gap_open: 12,
            gap_extend: 4,
            gap_to_gap: 1,
            match_score: 10,
            mismatch_score: -10,
            edge_mode: EdgeMode::default(),
            old_pad: Some('*'),
            new_pad: '.',
            filter_words: 0,
            max_prob: 1.0e-6,
            min_diagonal: 20,
            min_block_percent: 10.0,
            fast_min_block_percent: 30.0,
            fast_max_gap: 1000,
            fast_max_diag_jump: 50,
            chain_window: 10,
            packed_trace_cells: 10_000_000,
            max_trace_bytes: 1 << 30,
            poisson_iterations: 10_000,
            both_strands: true,
            threads: 1,
        }
    }
}

impl CompareOpt {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let opt: CompareOpt = toml::from_str(text).context("invalid comparison config")?;
        opt.validate()?;
        Ok(opt)
    }

    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read config '{}'", path.display()))?;
        Self::from_toml_str(&text).with_context(|| format!("in config '{}'", path.display()))
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// 实际使用的词长：向上取整到 4/8/12/14
    pub fn effective_word_length(&self) -> usize {
        round_word_length(self.word_length)
    }

    pub fn old_pad_byte(&self) -> Option<u8> {
        self.old_pad.map(|c| c as u8)
    }

    pub fn new_pad_byte(&self) -> u8 {
        self.new_pad as u8
    }

    pub fn validate(&self) -> AlignResult<()> {
        if self.word_length == 0 || self.word_length > 14 {
            return Err(AlignError::invalid(format!(
                "word length {} outside 1..=14",
                self.word_length
            )));
        }
        if self.min_match < self.effective_word_length() {
            return Err(AlignError::invalid(format!(
                "min_match {} shorter than word length {}",
                self.min_match,
                self.effective_word_length()
            )));
        }
        if self.max_matches == 0 {
            return Err(AlignError::invalid("max_matches must be positive"));
        }
        if !(0.0..=100.0).contains(&self.max_mismatch) {
            return Err(AlignError::invalid("max_mismatch must be a percentage"));
        }
        if self.gap_open < 0 || self.gap_extend < 0 || self.gap_to_gap < 0 {
            return Err(AlignError::invalid("gap costs must be non-negative"));
        }
        if let BandWidth::Percent(p) = self.band {
            if !(p > 0.0 && p <= 100.0) {
                return Err(AlignError::invalid("band percentage must be in (0, 100]"));
            }
        }
        if !(self.max_prob > 0.0 && self.max_prob < 1.0) {
            return Err(AlignError::invalid("max_prob must be in (0, 1)"));
        }
        if !self.new_pad.is_ascii() || self.old_pad.map_or(false, |c| !c.is_ascii()) {
            return Err(AlignError::invalid("pad symbols must be ASCII"));
        }
        if self.old_pad == Some(self.new_pad) {
            return Err(AlignError::invalid("old and new pad symbols must differ"));
        }
        if self.chain_window == 0 {
            return Err(AlignError::invalid("chain_window must be positive"));
        }
        self.edge_mode.check()
    }
}

/// 词长取整：<=4 -> 4，<=8 -> 8，<=12 -> 12，其余 -> 14
pub fn round_word_length(k: usize) -> usize {
    match k {
        0..=4 => 4,
        5..=8 => 8,
        9..=12 => 12,
        _ => 14,
    }
}
