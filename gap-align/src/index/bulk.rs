use crate::error::{AlignError, AlignResult};

use super::hash::SequenceIndex;

/// contig 之间的分隔符：不属于任何编码，既不会被哈希，也不会与读段字符相等
const SEPARATOR: u8 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContigSpan {
    pub offset: usize,
    pub len: usize,
}

/// 多条 contig 首尾相连（以分隔符隔开）后的单一索引，用于一条序列对多条 contig 的批量比较
#[derive(Debug, Clone)]
pub struct BulkIndex {
    index: SequenceIndex,
    spans: Vec<ContigSpan>,
}

impl BulkIndex {
    pub fn build<S: AsRef<[u8]>>(contigs: &[S], word_length: usize) -> AlignResult<Self> {
        if contigs.is_empty() {
            return Err(AlignError::invalid("bulk index needs at least one contig"));
        }
        let total: usize = contigs.iter().map(|c| c.as_ref().len() + 1).sum();
        let mut text = Vec::with_capacity(total);
        let mut spans = Vec::with_capacity(contigs.len());
        for c in contigs {
            let c = c.as_ref();
            spans.push(ContigSpan { offset: text.len(), len: c.len() });
            text.extend_from_slice(c);
            text.push(SEPARATOR);
        }
        text.pop();
        let index = SequenceIndex::build(&text, word_length)?;
        Ok(Self { index, spans })
    }

    pub fn index(&self) -> &SequenceIndex {
        &self.index
    }

    pub fn spans(&self) -> &[ContigSpan] {
        &self.spans
    }

    pub fn n_contigs(&self) -> usize {
        self.spans.len()
    }

    pub fn contig_seq(&self, i: usize) -> &[u8] {
        let s = self.spans[i];
        &self.index.seq()[s.offset..s.offset + s.len]
    }

    /// 将拼接文本中的位置映射为 (contig 下标, contig 内偏移)；落在分隔符上时返回 None
    pub fn locate(&self, pos: usize) -> Option<(usize, usize)> {
        let mut lo = 0usize;
        let mut hi = self.spans.len();
        while lo < hi {
            let mid = (lo + hi) / 2;
            let c = &self.spans[mid];
            if pos < c.offset {
                hi = mid;
            } else if pos >= c.offset + c.len {
                lo = mid + 1;
            } else {
                return Some((mid, pos - c.offset));
            }
        }
        None
    }
}
