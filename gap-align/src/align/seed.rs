//! 种子查找。
//!
//! 扫描 seq2 的每个词，在 seq1 的索引中找到相同词的位置，把命中向两侧延伸为无错配的匹配段。
//! 同一条对角线上已经覆盖过的位置由水位线数组跳过，避免同一匹配段被重复发现。
//!
//! 对角线编号为 p2 - p1：正数表示 seq2 的起点在 seq1 内部之后，负数反之。

use log::debug;

use crate::error::{AlignError, AlignResult};
use crate::index::{hash_words, BulkIndex, SequenceIndex, NO_WORD};
use crate::stats::SignificanceModel;
use crate::util::dna::{self, UNKNOWN};

/// 灵敏模式中超过显著性阈值的对角线
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiagMatch {
    pub diagonal: isize,
    /// 直方图计数（对角线上的词命中数）
    pub score: u32,
    /// score / 对角线长度
    pub prob: f64,
}

/// 块模式的匹配块，best_score / prev_block 仅在链构建中有效
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockMatch {
    pub pos_seq1: usize,
    pub pos_seq2: usize,
    pub length: usize,
    pub diagonal: isize,
    pub best_score: i64,
    pub prev_block: Option<usize>,
}

impl BlockMatch {
    pub fn new(pos_seq1: usize, pos_seq2: usize, length: usize) -> Self {
        Self {
            pos_seq1,
            pos_seq2,
            length,
            diagonal: pos_seq2 as isize - pos_seq1 as isize,
            best_score: 0,
            prev_block: None,
        }
    }

    pub fn end_seq1(&self) -> usize {
        self.pos_seq1 + self.length
    }

    pub fn end_seq2(&self) -> usize {
        self.pos_seq2 + self.length
    }
}

/// 对角线上的单元数
pub fn diagonal_length(len1: usize, len2: usize, diagonal: isize) -> usize {
    if diagonal >= 0 {
        let d = diagonal as usize;
        if d >= len2 {
            0
        } else {
            len1.min(len2 - d)
        }
    } else {
        let d = diagonal.unsigned_abs();
        if d >= len1 {
            0
        } else {
            (len1 - d).min(len2)
        }
    }
}

/// 扫描缓冲区，可跨序列对复用
#[derive(Debug, Default)]
pub struct SeedBuffer {
    /// 每条对角线上已覆盖到的 seq2 位置（不含）
    watermark: Vec<usize>,
    hist: Vec<u32>,
}

impl SeedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    fn reset(&mut self, n_diagonals: usize) {
        self.watermark.clear();
        self.watermark.resize(n_diagonals, 0);
        self.hist.clear();
        self.hist.resize(n_diagonals, 0);
    }
}

#[inline]
fn same_base(a: u8, b: u8) -> bool {
    let ca = dna::base_code(a);
    ca != UNKNOWN && ca == dna::base_code(b)
}

/// 从长度为 k 的种子 (p1, p2) 向前后延伸，返回完整匹配段的 (起点1, 起点2, 长度)；不容忍错配
pub fn match_fwd_back(seq1: &[u8], seq2: &[u8], p1: usize, p2: usize, k: usize) -> (usize, usize, usize) {
    let mut back = 0usize;
    while back < p1 && back < p2 && same_base(seq1[p1 - back - 1], seq2[p2 - back - 1]) {
        back += 1;
    }
    let mut fwd = k;
    while p1 + fwd < seq1.len() && p2 + fwd < seq2.len() && same_base(seq1[p1 + fwd], seq2[p2 + fwd]) {
        fwd += 1;
    }
    (p1 - back, p2 - back, back + fwd)
}

/// 枚举 seq2 与索引序列之间所有互不重复的最大匹配段，回调参数为 (起点1, 起点2, 长度)。
///
/// filter_words > 0 时跳过在 seq1 中出现次数超过它的词。
fn scan_matches<F>(
    index: &SequenceIndex,
    seq2: &[u8],
    filter_words: usize,
    buf: &mut SeedBuffer,
    mut on_match: F,
) -> AlignResult<()>
where
    F: FnMut(usize, usize, usize, &mut SeedBuffer) -> AlignResult<()>,
{
    let k = index.word_length();
    let seq1 = index.seq();
    let len1 = seq1.len();
    let words2 = hash_words(seq2, k)?;
    buf.reset(len1 + seq2.len() - 1);

    for (p2, &word) in words2.iter().enumerate() {
        if word == NO_WORD {
            continue;
        }
        if filter_words > 0 && index.count(word) > filter_words {
            continue;
        }
        for p1 in index.occurrences(word) {
            let d = len1 - 1 - p1 + p2;
            if p2 < buf.watermark[d] {
                continue;
            }
            let (s1, s2, len) = match_fwd_back(seq1, seq2, p1, p2, k);
            buf.watermark[d] = s2 + len;
            on_match(s1, s2, len, buf)?;
        }
    }
    Ok(())
}

/// 灵敏模式：按对角线累计长度不小于 min_match 的匹配段中的词数，返回超过显著性阈值的对角线（按对角线编号排序）
pub fn diagonal_candidates(
    index: &SequenceIndex,
    seq2: &[u8],
    min_match: usize,
    model: &SignificanceModel,
    buf: &mut SeedBuffer,
) -> AlignResult<Vec<DiagMatch>> {
    let k = index.word_length();
    let len1 = index.len();
    let len2 = seq2.len();
    scan_matches(index, seq2, 0, buf, |s1, s2, len, buf| {
        if len >= min_match {
            buf.hist[len1 - 1 - s1 + s2] += (len + 1 - k) as u32;
        }
        Ok(())
    })?;

    let mut out = Vec::new();
    for (d, &score) in buf.hist.iter().enumerate() {
        if score == 0 {
            continue;
        }
        let diagonal = d as isize - (len1 as isize - 1);
        let diag_len = diagonal_length(len1, len2, diagonal);
        if model.is_significant(diag_len, score) {
            out.push(DiagMatch { diagonal, score, prob: score as f64 / diag_len as f64 });
        }
    }
    Ok(out)
}

/// 反复计算候选对角线按 prob 加权的重心并剔除离重心最远者，直到只剩一条。
///
/// 距离相同的候选中剔除先出现的那条（候选按对角线编号有序）。
pub fn best_intercept(candidates: &[DiagMatch]) -> Option<isize> {
    let mut live: Vec<DiagMatch> = candidates.to_vec();
    while live.len() > 1 {
        let total: f64 = live.iter().map(|c| c.prob).sum();
        let centroid = live.iter().map(|c| c.prob * c.diagonal as f64).sum::<f64>() / total;
        let mut far = 0usize;
        let mut far_dist = -1.0f64;
        for (i, c) in live.iter().enumerate() {
            let dist = (c.diagonal as f64 - centroid).abs();
            if dist > far_dist {
                far = i;
                far_dist = dist;
            }
        }
        live.remove(far);
    }
    live.first().map(|c| c.diagonal)
}

/// 块模式：收集长度不小于 min_match 的匹配段。
///
/// 数组初始容量为 max_matches，满了以后加倍；分配失败时返回 `CapacityExceeded`。
pub fn block_matches(
    index: &SequenceIndex,
    seq2: &[u8],
    min_match: usize,
    max_matches: usize,
    filter_words: usize,
    buf: &mut SeedBuffer,
) -> AlignResult<Vec<BlockMatch>> {
    let mut blocks: Vec<BlockMatch> = Vec::new();
    blocks
        .try_reserve_exact(max_matches)
        .map_err(|_| AlignError::CapacityExceeded { what: "block matches", requested: max_matches })?;
    let mut cap = max_matches.max(1);

    scan_matches(index, seq2, filter_words, buf, |s1, s2, len, _| {
        if len < min_match {
            return Ok(());
        }
        if blocks.len() == cap {
            let grown = cap.saturating_mul(2);
            blocks.try_reserve_exact(grown - cap).map_err(|_| AlignError::CapacityExceeded {
                what: "block matches",
                requested: grown,
            })?;
            debug!("block match array grown from {} to {}", cap, grown);
            cap = grown;
        }
        blocks.push(BlockMatch::new(s1, s2, len));
        Ok(())
    })?;
    Ok(blocks)
}

/// 把拼接坐标下的匹配块按 contig 分组并换成 contig 内坐标；跨分隔符的块不会出现
pub fn split_by_contig(bulk: &BulkIndex, blocks: &[BlockMatch]) -> Vec<(usize, Vec<BlockMatch>)> {
    let mut groups: Vec<Vec<BlockMatch>> = vec![Vec::new(); bulk.n_contigs()];
    for b in blocks {
        if let Some((contig, offset)) = bulk.locate(b.pos_seq1) {
            groups[contig].push(BlockMatch::new(offset, b.pos_seq2, b.length));
        }
    }
    groups
        .into_iter()
        .enumerate()
        .filter(|(_, g)| !g.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::composition_of;

    fn index(seq: &[u8], k: usize) -> SequenceIndex {
        SequenceIndex::build(seq, k).expect("index")
    }

    #[test]
    fn diagonal_lengths() {
        assert_eq!(diagonal_length(10, 10, 0), 10);
        assert_eq!(diagonal_length(10, 10, 3), 7);
        assert_eq!(diagonal_length(10, 10, -4), 6);
        assert_eq!(diagonal_length(10, 4, -2), 4);
        assert_eq!(diagonal_length(10, 4, 4), 0);
    }

    #[test]
    fn extension_stops_at_mismatch_and_unknown() {
        let seq1 = b"TTACGTACGGA";
        let seq2 = b"CACGTACGNA";
        // 种子 GTAC：seq1[4..8]、seq2[3..7]
        let (s1, s2, len) = match_fwd_back(seq1, seq2, 4, 3, 4);
        assert_eq!((s1, s2, len), (2, 1, 7));
    }

    #[test]
    fn identical_sequences_give_one_block() {
        let idx = index(b"ACGTACGT", 4);
        let mut buf = SeedBuffer::new();
        let blocks = block_matches(&idx, b"ACGTACGT", 8, 16, 0, &mut buf).expect("blocks");
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0], BlockMatch::new(0, 0, 8));
    }

    #[test]
    fn watermark_suppresses_rediscovery() {
        let idx = index(b"ACGTACGT", 4);
        let mut buf = SeedBuffer::new();
        let blocks = block_matches(&idx, b"ACGTACGT", 4, 16, 0, &mut buf).expect("blocks");
        // 主对角线 1 个，±4 各 1 个
        assert_eq!(blocks.len(), 3);
        let mut diags: Vec<isize> = blocks.iter().map(|b| b.diagonal).collect();
        diags.sort();
        assert_eq!(diags, vec![-4, 0, 4]);
    }

    #[test]
    fn match_array_doubles() {
        let seq = b"AAAACAAAAGAAAATAAAACAAAAGAAAAT";
        let idx = index(seq, 4);
        let mut buf = SeedBuffer::new();
        let blocks = block_matches(&idx, seq, 4, 1, 0, &mut buf).expect("blocks");
        assert!(blocks.len() > 1);
        assert!(blocks.iter().any(|b| b.diagonal == 0 && b.length == seq.len()));
    }

    #[test]
    fn repetitive_words_are_filtered() {
        let seq = b"AAAAAAAAAAAACGTTGCA";
        let idx = index(seq, 4);
        let mut buf = SeedBuffer::new();
        let all = block_matches(&idx, b"AAAAAAAA", 4, 16, 0, &mut buf).expect("blocks");
        assert!(!all.is_empty());
        let filtered = block_matches(&idx, b"AAAAAAAA", 4, 16, 3, &mut buf).expect("blocks");
        assert!(filtered.is_empty());
    }

    #[test]
    fn best_intercept_rejects_outliers() {
        let c = |diagonal, prob| DiagMatch { diagonal, score: 1, prob };
        let cands = vec![c(-40, 0.05), c(2, 0.9), c(3, 0.8), c(60, 0.1)];
        assert_eq!(best_intercept(&cands), Some(2));
        assert_eq!(best_intercept(&[]), None);
        // 等距时先剔除排在前面的
        assert_eq!(best_intercept(&[c(-5, 0.5), c(5, 0.5)]), Some(5));
    }

    #[test]
    fn sensitive_mode_finds_shared_diagonal() {
        let shared = b"GATTACAGGCTTAACGTAGCATCGATCGGATCCTAGGCTAGCTAGGATCCGATC";
        let seq1 = [&b"TTTTTTTTTTTTTTTTTTTT"[..], shared].concat();
        let seq2 = [&shared[..], b"CCCCCCCCCCCCCCCCCCCCCC"].concat();
        let idx = index(&seq1, 8);
        let comp = composition_of(&seq1);
        let model = SignificanceModel::new(20, seq1.len().min(seq2.len()), 8, 1e-6, &comp, 10_000)
            .expect("model");
        let mut buf = SeedBuffer::new();
        let cands = diagonal_candidates(&idx, &seq2, 20, &model, &mut buf).expect("scan");
        assert_eq!(best_intercept(&cands), Some(-20));
    }

    #[test]
    fn bulk_blocks_split_per_contig() {
        let bulk = BulkIndex::build(&[&b"ACGTTGCAAC"[..], &b"GGGCATGCATCC"[..]], 4).expect("bulk");
        let mut buf = SeedBuffer::new();
        let blocks = block_matches(bulk.index(), b"CATGCAT", 7, 8, 0, &mut buf).expect("blocks");
        let groups = split_by_contig(&bulk, &blocks);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].0, 1);
        assert_eq!(groups[0].1, vec![BlockMatch::new(3, 0, 7)]);
    }
}
