use crate::config::CompareOpt;

use super::seed::{diagonal_length, BlockMatch};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChainParams {
    /// 每个块最多考察的不重叠前驱数
    pub window: usize,
    /// 链覆盖率（百分比）必须超过该值
    pub min_percent: f64,
    pub fast: bool,
    pub max_gap: usize,
    pub max_diag_jump: usize,
}

impl ChainParams {
    pub fn from_opt(opt: &CompareOpt) -> Self {
        Self {
            window: opt.chain_window,
            min_percent: if opt.fast_mode { opt.fast_min_block_percent } else { opt.min_block_percent },
            fast: opt.fast_mode,
            max_gap: opt.fast_max_gap,
            max_diag_jump: opt.fast_max_diag_jump,
        }
    }
}

/// 有序、互不重叠的块链
#[derive(Debug, Clone, PartialEq)]
pub struct Chain {
    pub blocks: Vec<BlockMatch>,
    pub score: i64,
    /// 100 * 块总长 / 中位对角线长度
    pub percent: f64,
}

impl Chain {
    pub fn total_length(&self) -> usize {
        self.blocks.iter().map(|b| b.length).sum()
    }
}

/// 块 j 作为块 i 的前驱时 i 的有效得分增量；j 的起点必须在两条序列上都严格早于 i
fn link_gain(j: &BlockMatch, i: &BlockMatch) -> Option<(i64, bool)> {
    if j.pos_seq1 >= i.pos_seq1 || j.pos_seq2 >= i.pos_seq2 {
        return None;
    }
    let overlap1 = j.end_seq1().saturating_sub(i.pos_seq1);
    let overlap2 = j.end_seq2().saturating_sub(i.pos_seq2);
    let overlap = overlap1.max(overlap2);
    if overlap >= i.length {
        return None;
    }
    let g1 = i.pos_seq1.saturating_sub(j.end_seq1());
    let g2 = i.pos_seq2.saturating_sub(j.end_seq2());
    let shift = (i.diagonal - j.diagonal).unsigned_abs() as i64;
    let gain = (i.length - overlap) as i64 - shift - g1.min(g2) as i64;
    Some((gain, overlap == 0))
}

/// 从未排序、可能重叠的匹配块中选出得分最高的有序链并消除残余重叠。
///
/// 链覆盖率不足，或快速模式下块间距/对角线跳变过大时返回 None。
pub fn align_blocks(
    blocks: &mut [BlockMatch],
    len1: usize,
    len2: usize,
    params: &ChainParams,
) -> Option<Chain> {
    if blocks.is_empty() {
        return None;
    }
    blocks.sort_by_key(|b| (b.pos_seq1 + b.pos_seq2, b.pos_seq1));

    for b in blocks.iter_mut() {
        b.best_score = b.length as i64 - b.pos_seq1.min(b.pos_seq2) as i64;
        b.prev_block = None;
    }

    for i in 1..blocks.len() {
        let cur = blocks[i];
        let mut best = cur.best_score;
        let mut prev = None;
        let mut disjoint = 0usize;
        for j in (0..i).rev() {
            let Some((gain, no_overlap)) = link_gain(&blocks[j], &cur) else {
                continue;
            };
            let cand = blocks[j].best_score + gain;
            if cand > best {
                best = cand;
                prev = Some(j);
            }
            if no_overlap {
                disjoint += 1;
                if disjoint >= params.window {
                    break;
                }
            }
        }
        blocks[i].best_score = best;
        blocks[i].prev_block = prev;
    }

    // 以到最近右端的距离扣分后取全局最优
    let mut last = 0usize;
    let mut last_score = i64::MIN;
    for (i, b) in blocks.iter().enumerate() {
        let tail = len1.saturating_sub(b.end_seq1()).min(len2.saturating_sub(b.end_seq2())) as i64;
        let s = b.best_score - tail;
        if s > last_score {
            last_score = s;
            last = i;
        }
    }

    let mut chain = Vec::new();
    let mut cur = Some(last);
    while let Some(i) = cur {
        chain.push(blocks[i]);
        cur = blocks[i].prev_block;
    }
    chain.reverse();

    trim_overlaps(&mut chain);
    if chain.is_empty() {
        return None;
    }

    if params.fast {
        for w in chain.windows(2) {
            let gap = (w[1].pos_seq1 - w[0].end_seq1()).max(w[1].pos_seq2 - w[0].end_seq2());
            if gap > params.max_gap {
                return None;
            }
            if (w[1].diagonal - w[0].diagonal).unsigned_abs() > params.max_diag_jump {
                return None;
            }
        }
    }

    let mut diags: Vec<isize> = chain.iter().map(|b| b.diagonal).collect();
    diags.sort_unstable();
    let median = diags[(diags.len() - 1) / 2];
    let total: usize = chain.iter().map(|b| b.length).sum();
    let diag_len = diagonal_length(len1, len2, median).max(1);
    let percent = 100.0 * total as f64 / diag_len as f64;
    if percent <= params.min_percent {
        return None;
    }

    Some(Chain { blocks: chain, score: last_score, percent })
}

/// 相邻块在任一序列上重叠时缩短较短的块（前块截尾、后块去头），直到稳定
pub fn trim_overlaps(chain: &mut Vec<BlockMatch>) {
    let mut more_shuffling = true;
    while more_shuffling {
        more_shuffling = false;
        let mut i = 0;
        while i + 1 < chain.len() {
            let (a, b) = (chain[i], chain[i + 1]);
            let overlap = a
                .end_seq1()
                .saturating_sub(b.pos_seq1)
                .max(a.end_seq2().saturating_sub(b.pos_seq2));
            if overlap > 0 {
                more_shuffling = true;
                if a.length <= b.length {
                    chain[i].length = a.length.saturating_sub(overlap);
                } else {
                    let n = overlap.min(b.length);
                    chain[i + 1].pos_seq1 += n;
                    chain[i + 1].pos_seq2 += n;
                    chain[i + 1].length -= n;
                }
            }
            i += 1;
        }
        chain.retain(|b| b.length > 0);
    }
}
