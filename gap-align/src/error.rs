//! 比对引擎的错误类型。
//!
//! "没有显著匹配" 不是错误：比较函数以 `Ok(None)` 表示正常的阴性结果。

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AlignError {
    /// 序列短于词长或最小匹配长度，调用方跳过该序列对
    #[error("sequence too short: length {len}, need at least {required}")]
    InputTooShort { len: usize, required: usize },

    /// 序列中不存在任何不含未知符号的完整词
    #[error("sequence contains no hashable word of length {word_length}")]
    Unhashable { word_length: usize },

    /// 匹配数组增长失败或回溯矩阵过大，调用方应切换策略
    #[error("capacity exceeded for {what}: {requested} requested")]
    CapacityExceeded { what: &'static str, requested: usize },

    #[error("invalid parameters: {0}")]
    InvalidParams(String),

    /// 逻辑错误，不可恢复，该序列对的处理必须终止
    #[error("invariant violated: {0}")]
    InvariantViolation(String),
}

pub type AlignResult<T> = Result<T, AlignError>;

impl AlignError {
    pub fn invalid<S: Into<String>>(message: S) -> Self {
        Self::InvalidParams(message.into())
    }

    pub fn invariant<S: Into<String>>(message: S) -> Self {
        Self::InvariantViolation(message.into())
    }

    /// 可在本地恢复（跳过该序列对继续批处理）的错误
    pub fn is_skippable(&self) -> bool {
        matches!(self, Self::InputTooShort { .. } | Self::Unhashable { .. })
    }

    /// 需要上一层换用更省内存的策略重试的错误
    pub fn wants_fallback(&self) -> bool {
        matches!(self, Self::CapacityExceeded { .. })
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::InvariantViolation(_))
    }
}
