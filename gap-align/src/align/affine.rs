//! 三状态仿射 gap 动态规划（Gotoh），可限制在对角带内。
//!
//! 行对应 seq1，列对应 seq2。每个单元三个得分：F 对角（匹配/错配），
//! G 向下（seq2 中插入 gap），H 向右（seq1 中插入 gap）。
//! 与已有 pad 对齐的 gap 只收 gap_to_gap 代价，已经解决过的插入/缺失不会被重复罚分。

use log::debug;

use crate::config::{CompareOpt, EdgeMode};
use crate::error::{AlignError, AlignResult};
use crate::util::dna;

use super::overlap::{EditPair, PadSymbols};
use super::trace::{
    Band, DenseTrace, PackedTrace, TraceLayout, TracebackStore, ACROSS, ACROSS_EXTENDED, DIAG, DOWN,
    DOWN_EXTENDED, STATE_MASK,
};

const NEG_INF: i32 = i32::MIN / 4;

/// 128×128 替换得分矩阵，显式传入比对函数
#[derive(Clone)]
pub struct ScoreMatrix {
    table: Vec<i32>,
}

impl ScoreMatrix {
    /// 相同符号得 match_score，两个不同的 A/C/G/T 得 mismatch_score，涉及 N 的得 0，其余按错配计
    pub fn dna(match_score: i32, mismatch_score: i32) -> Self {
        let mut table = vec![mismatch_score; 128 * 128];
        for a in 0..128u8 {
            for b in 0..128u8 {
                let (ua, ub) = (a.to_ascii_uppercase(), b.to_ascii_uppercase());
                let same = if dna::is_acgt(ua) && dna::is_acgt(ub) {
                    dna::base_code(ua) == dna::base_code(ub)
                } else {
                    ua == ub
                };
                table[a as usize * 128 + b as usize] = if same {
                    match_score
                } else if (ua == b'N' && ub.is_ascii_alphabetic()) || (ub == b'N' && ua.is_ascii_alphabetic()) {
                    0
                } else {
                    mismatch_score
                };
            }
        }
        Self { table }
    }

    pub fn from_opt(opt: &CompareOpt) -> Self {
        Self::dna(opt.match_score, opt.mismatch_score)
    }

    #[inline]
    pub fn score(&self, a: u8, b: u8) -> i32 {
        self.table[(a & 0x7f) as usize * 128 + (b & 0x7f) as usize]
    }
}

impl std::fmt::Debug for ScoreMatrix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScoreMatrix")
            .field("AA", &self.score(b'A', b'A'))
            .field("AC", &self.score(b'A', b'C'))
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlignParams {
    pub gap_open: i32,
    pub gap_extend: i32,
    pub gap_to_gap: i32,
    pub edge_mode: EdgeMode,
    pub band: Option<Band>,
    pub pads: PadSymbols,
    /// 回溯单元数超过该值时使用紧凑存储
    pub packed_trace_cells: usize,
    pub max_trace_bytes: usize,
}

impl AlignParams {
    pub fn from_opt(opt: &CompareOpt) -> Self {
        Self {
            gap_open: opt.gap_open,
            gap_extend: opt.gap_extend,
            gap_to_gap: opt.gap_to_gap,
            edge_mode: opt.edge_mode,
            band: None,
            pads: PadSymbols { old: opt.old_pad_byte(), new: opt.new_pad_byte() },
            packed_trace_cells: opt.packed_trace_cells,
            max_trace_bytes: opt.max_trace_bytes,
        }
    }

    pub fn with_band(mut self, band: Option<Band>) -> Self {
        self.band = band;
        self
    }

    pub fn with_edge_mode(mut self, edge_mode: EdgeMode) -> Self {
        self.edge_mode = edge_mode;
        self
    }

    #[inline]
    fn open_cost(&self, c: u8) -> i32 {
        if Some(c) == self.pads.old {
            self.gap_to_gap
        } else {
            self.gap_open + self.gap_extend
        }
    }

    #[inline]
    fn extend_cost(&self, c: u8) -> i32 {
        if Some(c) == self.pads.old {
            self.gap_to_gap
        } else {
            self.gap_extend
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceKind {
    Dense,
    Packed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Alignment {
    pub score: i32,
    pub edits: EditPair,
    /// 回溯起点（矩阵坐标）
    pub end: (usize, usize),
    pub trace: TraceKind,
}

/// 估计回溯矩阵的存储方式与字节数
pub fn estimate_trace_bytes(
    len1: usize,
    len2: usize,
    band: Option<Band>,
    packed_trace_cells: usize,
) -> (TraceKind, usize) {
    let cells = TraceLayout::new(len1, len2, band).cells();
    if cells > packed_trace_cells {
        (TraceKind::Packed, PackedTrace::bytes_for(cells))
    } else {
        (TraceKind::Dense, DenseTrace::bytes_for(cells))
    }
}

/// 按估计内存选择稠密或紧凑回溯存储后比对；两者结果完全一致
pub fn affine_align(
    seq1: &[u8],
    seq2: &[u8],
    matrix: &ScoreMatrix,
    params: &AlignParams,
) -> AlignResult<Alignment> {
    let layout = TraceLayout::new(seq1.len(), seq2.len(), params.band);
    let (kind, bytes) =
        estimate_trace_bytes(seq1.len(), seq2.len(), params.band, params.packed_trace_cells);
    if bytes > params.max_trace_bytes {
        return Err(AlignError::CapacityExceeded { what: "traceback", requested: bytes });
    }
    match kind {
        TraceKind::Dense => {
            let mut store = DenseTrace::new(layout.cells())?;
            align_into(seq1, seq2, matrix, params, layout, &mut store, kind)
        }
        TraceKind::Packed => {
            debug!(
                "packed traceback for {}x{} ({} cells, {} bytes)",
                seq1.len(),
                seq2.len(),
                layout.cells(),
                bytes
            );
            let mut store = PackedTrace::new(layout.cells())?;
            align_into(seq1, seq2, matrix, params, layout, &mut store, kind)
        }
    }
}

/// 使用调用方提供的回溯存储比对，存储容量至少为布局的单元数
pub fn affine_align_with_store<S: TracebackStore>(
    seq1: &[u8],
    seq2: &[u8],
    matrix: &ScoreMatrix,
    params: &AlignParams,
    store: &mut S,
    kind: TraceKind,
) -> AlignResult<Alignment> {
    let layout = TraceLayout::new(seq1.len(), seq2.len(), params.band);
    align_into(seq1, seq2, matrix, params, layout, store, kind)
}

/// 前导 gap 的闭式代价：gap[k] 为在对面插入 k 个 gap、消耗 seq[..k] 的得分
fn leading_gap_scores(seq: &[u8], free: bool, params: &AlignParams) -> Vec<i32> {
    let mut out = Vec::with_capacity(seq.len() + 1);
    out.push(0);
    let mut acc = 0i32;
    for (k, &c) in seq.iter().enumerate() {
        if !free {
            acc -= if k == 0 { params.open_cost(c) } else { params.extend_cost(c) };
        }
        out.push(acc.max(NEG_INF));
    }
    out
}

#[inline]
fn best_of(f: i32, g: i32, h: i32) -> (i32, u8) {
    if f >= g && f >= h {
        (f, DIAG)
    } else if g >= h {
        (g, DOWN)
    } else {
        (h, ACROSS)
    }
}

fn align_into<S: TracebackStore>(
    seq1: &[u8],
    seq2: &[u8],
    matrix: &ScoreMatrix,
    params: &AlignParams,
    layout: TraceLayout,
    store: &mut S,
    kind: TraceKind,
) -> AlignResult<Alignment> {
    let len1 = seq1.len();
    let len2 = seq2.len();
    let cols = len2 + 1;
    let mode = params.edge_mode;

    let row0 = leading_gap_scores(seq2, mode.free_leading_row(), params);
    let col0 = leading_gap_scores(seq1, mode.free_leading_col(), params);

    let mut prev_f = vec![NEG_INF; cols];
    let mut prev_g = vec![NEG_INF; cols];
    let mut prev_h = vec![NEG_INF; cols];
    let mut cur_f = vec![NEG_INF; cols];
    let mut cur_g = vec![NEG_INF; cols];
    let mut cur_h = vec![NEG_INF; cols];

    // 最后一行/列上的候选回溯起点：(得分, i, j)
    let mut last_row: Vec<(i32, usize)> = Vec::new();
    let mut last_col: Vec<(i32, usize)> = Vec::new();
    let mut started = false;

    for i in 0..=len1 {
        let (lo, hi) = match layout.row_range(i) {
            Some(r) => r,
            None if started => break,
            None => continue,
        };
        started = true;

        // 左侧保护单元：cur_* 此时还留着 i - 2 行的值，本行 j = lo 处会读 cur[lo - 1]
        if lo > 0 {
            cur_f[lo - 1] = NEG_INF;
            cur_g[lo - 1] = NEG_INF;
            cur_h[lo - 1] = NEG_INF;
        }

        for j in lo..=hi {
            let (f, g, h, code) = if i == 0 && j == 0 {
                (0, NEG_INF, NEG_INF, DIAG)
            } else if i == 0 {
                (NEG_INF, NEG_INF, row0[j], ACROSS | ACROSS_EXTENDED)
            } else if j == 0 {
                (NEG_INF, col0[i], NEG_INF, DOWN | DOWN_EXTENDED)
            } else {
                let a = seq1[i - 1];
                let b = seq2[j - 1];

                let (diag_best, _) = best_of(prev_f[j - 1], prev_g[j - 1], prev_h[j - 1]);
                let f = (diag_best + matrix.score(a, b)).max(NEG_INF);

                let (up_best, _) = best_of(prev_f[j], prev_g[j], prev_h[j]);
                let g_ext = prev_g[j] - params.extend_cost(a);
                let g_open = up_best - params.open_cost(a);
                let (g, g_bit) = if g_ext >= g_open { (g_ext, DOWN_EXTENDED) } else { (g_open, 0) };

                let (left_best, _) = best_of(cur_f[j - 1], cur_g[j - 1], cur_h[j - 1]);
                let h_ext = cur_h[j - 1] - params.extend_cost(b);
                let h_open = left_best - params.open_cost(b);
                let (h, h_bit) = if h_ext >= h_open { (h_ext, ACROSS_EXTENDED) } else { (h_open, 0) };

                let g = g.max(NEG_INF);
                let h = h.max(NEG_INF);
                let (_, state) = best_of(f, g, h);
                (f, g, h, state | g_bit | h_bit)
            };

            cur_f[j] = f;
            cur_g[j] = g;
            cur_h[j] = h;
            let idx = layout
                .index(i, j)
                .ok_or_else(|| AlignError::invariant(format!("cell ({}, {}) outside trace layout", i, j)))?;
            store.set(idx, code);

            if i == len1 {
                last_row.push((best_of(f, g, h).0, j));
            }
            if j == len2 {
                last_col.push((best_of(f, g, h).0, i));
            }
        }

        // 右侧保护单元，下一行读 prev[hi + 1]
        if hi + 1 < cols {
            cur_f[hi + 1] = NEG_INF;
            cur_g[hi + 1] = NEG_INF;
            cur_h[hi + 1] = NEG_INF;
        }
        std::mem::swap(&mut prev_f, &mut cur_f);
        std::mem::swap(&mut prev_g, &mut cur_g);
        std::mem::swap(&mut prev_h, &mut cur_h);
    }

    let corner = last_row.iter().find(|&&(_, j)| j == len2).map(|&(s, _)| s);
    let (score, ei, ej) = if mode.best_edge() {
        let mut best: Option<(i32, usize, usize)> = corner.map(|s| (s, len1, len2));
        for &(s, j) in &last_row {
            if best.map_or(true, |(b, _, _)| s > b) {
                best = Some((s, len1, j));
            }
        }
        for &(s, i) in &last_col {
            if best.map_or(true, |(b, _, _)| s > b) {
                best = Some((s, i, len2));
            }
        }
        best.ok_or_else(|| AlignError::invalid("band does not reach the last row or column"))?
    } else {
        let s = corner.ok_or_else(|| AlignError::invalid("band does not contain the end corner"))?;
        (s, len1, len2)
    };
    if score <= NEG_INF / 2 {
        return Err(AlignError::invalid("band does not connect the alignment start and end"));
    }

    let edits = trace_back(store, &layout, len1, len2, ei, ej)?;
    Ok(Alignment { score, edits, end: (ei, ej), trace: kind })
}

fn trace_back<S: TracebackStore>(
    store: &S,
    layout: &TraceLayout,
    len1: usize,
    len2: usize,
    ei: usize,
    ej: usize,
) -> AlignResult<EditPair> {
    let code_at = |i: usize, j: usize| -> AlignResult<u8> {
        layout
            .index(i, j)
            .map(|idx| store.get(idx))
            .ok_or_else(|| AlignError::invariant(format!("traceback left the band at ({}, {})", i, j)))
    };

    let mut moves: Vec<u8> = Vec::with_capacity(ei + ej);
    let (mut i, mut j) = (ei, ej);
    let mut state = code_at(i, j)? & STATE_MASK;
    while i > 0 && j > 0 {
        let code = code_at(i, j)?;
        moves.push(state);
        let stay = match state {
            DIAG => {
                i -= 1;
                j -= 1;
                false
            }
            DOWN => {
                i -= 1;
                code & DOWN_EXTENDED != 0
            }
            ACROSS => {
                j -= 1;
                code & ACROSS_EXTENDED != 0
            }
            other => return Err(AlignError::invariant(format!("bad trace state {}", other))),
        };
        if !stay && i > 0 && j > 0 {
            state = code_at(i, j)? & STATE_MASK;
        }
    }

    let mut edits = EditPair::with_capacity(len1 + len2 + 2);
    if i > 0 {
        edits.push_gap_in_seq2(i)?;
    }
    if j > 0 {
        edits.push_gap_in_seq1(j)?;
    }
    for &m in moves.iter().rev() {
        match m {
            DIAG => edits.push_aligned(1)?,
            DOWN => edits.push_gap_in_seq2(1)?,
            _ => edits.push_gap_in_seq1(1)?,
        }
    }
    if ei < len1 {
        edits.push_gap_in_seq2(len1 - ei)?;
    }
    if ej < len2 {
        edits.push_gap_in_seq1(len2 - ej)?;
    }
    Ok(edits)
}
