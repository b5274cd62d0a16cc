use std::collections::HashMap;

use crate::config::round_word_length;
use crate::error::{AlignError, AlignResult};
use crate::util::dna::{self, UNKNOWN};

/// 含未知符号的窗口的词值
pub const NO_WORD: i32 = -1;

/// 词长不超过该值时使用按 4^k 分配的稠密表，否则使用 HashMap
const DENSE_MAX_WORD: usize = 8;

#[derive(Debug, Clone, Copy, Default)]
struct WordHead {
    count: u32,
    /// 该词最近一次出现的位置
    last: i32,
}

#[derive(Debug, Clone)]
enum WordTable {
    Dense { counts: Vec<u32>, last: Vec<i32> },
    Sparse(HashMap<u32, WordHead>),
}

impl WordTable {
    fn new(word_length: usize) -> Self {
        if word_length <= DENSE_MAX_WORD {
            let size = 1usize << (2 * word_length);
            WordTable::Dense { counts: vec![0; size], last: vec![NO_WORD; size] }
        } else {
            WordTable::Sparse(HashMap::new())
        }
    }

    fn clear(&mut self) {
        match self {
            WordTable::Dense { counts, last } => {
                counts.iter_mut().for_each(|c| *c = 0);
                last.iter_mut().for_each(|l| *l = NO_WORD);
            }
            WordTable::Sparse(map) => map.clear(),
        }
    }

    #[inline]
    fn head(&self, word: u32) -> WordHead {
        match self {
            WordTable::Dense { counts, last } => WordHead {
                count: counts[word as usize],
                last: last[word as usize],
            },
            WordTable::Sparse(map) => map
                .get(&word)
                .copied()
                .unwrap_or(WordHead { count: 0, last: NO_WORD }),
        }
    }

    /// 记录一次新出现，返回该词之前的最近位置
    #[inline]
    fn push(&mut self, word: u32, pos: i32) -> i32 {
        match self {
            WordTable::Dense { counts, last } => {
                let w = word as usize;
                let prev = last[w];
                counts[w] += 1;
                last[w] = pos;
                prev
            }
            WordTable::Sparse(map) => {
                let head = map.entry(word).or_insert(WordHead { count: 0, last: NO_WORD });
                let prev = head.last;
                head.count += 1;
                head.last = pos;
                prev
            }
        }
    }
}

/// 把序列切成长度为 k 的词，每个窗口起点一个 2-bit 打包值；含未知符号的窗口为 [`NO_WORD`]。
///
/// 序列短于 k 时返回 `InputTooShort`，没有任何有效窗口时返回 `Unhashable`。
pub fn hash_words(seq: &[u8], word_length: usize) -> AlignResult<Vec<i32>> {
    let k = word_length;
    if seq.len() < k {
        return Err(AlignError::InputTooShort { len: seq.len(), required: k });
    }
    let mask: u32 = if k >= 16 { u32::MAX } else { (1u32 << (2 * k)) - 1 };
    let mut words = vec![NO_WORD; seq.len() + 1 - k];
    let mut value = 0u32;
    let mut run = 0usize;
    let mut any = false;

    for (j, &b) in seq.iter().enumerate() {
        let code = dna::base_code(b);
        if code == UNKNOWN {
            run = 0;
        } else {
            value = ((value << 2) | code as u32) & mask;
            run += 1;
        }
        if j + 1 >= k && run >= k {
            words[j + 1 - k] = value as i32;
            any = true;
        }
    }

    if !any {
        return Err(AlignError::Unhashable { word_length: k });
    }
    Ok(words)
}

/// seq1 的 k-mer 索引：每个词的出现次数、最近位置，以及按位置串起来的"上一次出现"链。
///
/// 查询一个词的所有位置是 O(出现次数)，顺序为从新到旧。
#[derive(Debug, Clone)]
pub struct SequenceIndex {
    word_length: usize,
    seq: Vec<u8>,
    words: Vec<i32>,
    table: WordTable,
    /// prev_occurrence[pos] = 同一个词的上一次出现位置，或 NO_WORD
    prev_occurrence: Vec<i32>,
}

impl SequenceIndex {
    /// 词长会被向上取整到 4/8/12/14
    pub fn build(seq: &[u8], word_length: usize) -> AlignResult<Self> {
        let k = round_word_length(word_length);
        let mut index = Self {
            word_length: k,
            seq: Vec::new(),
            words: Vec::new(),
            table: WordTable::new(k),
            prev_occurrence: Vec::new(),
        };
        index.rebuild(seq)?;
        Ok(index)
    }

    /// 换一条 seq1 重新建索引，复用已分配的表
    pub fn rebuild(&mut self, seq: &[u8]) -> AlignResult<()> {
        self.words = hash_words(seq, self.word_length)?;
        self.seq.clear();
        self.seq.extend_from_slice(seq);
        self.table.clear();
        self.prev_occurrence.clear();
        self.prev_occurrence.resize(self.words.len(), NO_WORD);

        for (pos, &word) in self.words.iter().enumerate() {
            if word == NO_WORD {
                continue;
            }
            let prev = self.table.push(word as u32, pos as i32);
            self.prev_occurrence[pos] = prev;
        }
        Ok(())
    }

    pub fn word_length(&self) -> usize {
        self.word_length
    }

    /// 完整词表大小 4^k
    pub fn size_hash(&self) -> usize {
        1usize << (2 * self.word_length)
    }

    pub fn seq(&self) -> &[u8] {
        &self.seq
    }

    pub fn len(&self) -> usize {
        self.seq.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seq.is_empty()
    }

    /// 以 pos 为起点的词值
    pub fn word_at(&self, pos: usize) -> i32 {
        self.words.get(pos).copied().unwrap_or(NO_WORD)
    }

    pub fn count(&self, word: i32) -> usize {
        if word < 0 {
            return 0;
        }
        self.table.head(word as u32).count as usize
    }

    /// 按从新到旧的顺序列出词的所有出现位置
    pub fn occurrences(&self, word: i32) -> Occurrences<'_> {
        let next = if word < 0 { NO_WORD } else { self.table.head(word as u32).last };
        Occurrences { prev: &self.prev_occurrence, next }
    }
}

pub struct Occurrences<'a> {
    prev: &'a [i32],
    next: i32,
}

impl<'a> Iterator for Occurrences<'a> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.next < 0 {
            return None;
        }
        let pos = self.next as usize;
        self.next = self.prev[pos];
        Some(pos)
    }
}
