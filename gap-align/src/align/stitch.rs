//! 沿块链分段比对：首块之前、相邻块之间、末块之后各做一次带状比对，块本身按完全匹配拼接。

use crate::config::EdgeMode;
use crate::error::AlignResult;

use super::affine::{affine_align, AlignParams, ScoreMatrix};
use super::overlap::EditPair;
use super::seed::BlockMatch;
use super::trace::Band;

/// 拼接后的全局比对
#[derive(Debug, Clone, PartialEq)]
pub struct Stitched {
    pub edits: EditPair,
    pub score: i64,
}

fn band(diagonal: isize, width: usize) -> Option<Band> {
    if width == 0 {
        None
    } else {
        Some(Band { diagonal, width })
    }
}

/// 块之间的区段：两端都固定，带必须同时包含起点与终点
fn inner_band(g1: usize, g2: usize, width: usize) -> Option<Band> {
    let spread = (g2 as isize - g1 as isize).unsigned_abs();
    band(0, if width == 0 { 0 } else { width.max(spread) })
}

/// 按块链把 seq1 与 seq2 拼成一条全局编辑脚本。
///
/// 首段使用调用方的前导 gap 策略并必须到达首块左上角；中间段前导 gap 计分、必须走满；
/// 末段前导 gap 计分，回溯起点沿用调用方的策略。`width` 为 0 时不限带宽。
pub fn align_wrap(
    seq1: &[u8],
    seq2: &[u8],
    blocks: &[BlockMatch],
    matrix: &ScoreMatrix,
    params: &AlignParams,
    width: usize,
    match_score: i32,
) -> AlignResult<Stitched> {
    let mut edits = EditPair::with_capacity(seq1.len() + seq2.len() + 2);
    let mut score = 0i64;
    let mode = params.edge_mode;

    let (first, last) = match (blocks.first(), blocks.last()) {
        (Some(f), Some(l)) => (*f, *l),
        _ => {
            let aln = affine_align(seq1, seq2, matrix, params)?;
            return Ok(Stitched { edits: aln.edits, score: aln.score as i64 });
        }
    };

    // 首段：以终点所在对角线为中心
    let (l1, l2) = (first.pos_seq1, first.pos_seq2);
    if l1 > 0 || l2 > 0 {
        let p = params
            .with_edge_mode(mode.leading() | EdgeMode::FULL_LENGTH_TRACE)
            .with_band(band(l2 as isize - l1 as isize, width));
        let aln = affine_align(&seq1[..l1], &seq2[..l2], matrix, &p)?;
        edits.append(&aln.edits)?;
        score += aln.score as i64;
    }

    for (k, b) in blocks.iter().enumerate() {
        if k > 0 {
            let a = &blocks[k - 1];
            let (s1, e1) = (a.end_seq1(), b.pos_seq1);
            let (s2, e2) = (a.end_seq2(), b.pos_seq2);
            if e1 > s1 || e2 > s2 {
                let p = params
                    .with_edge_mode(EdgeMode::EDGE_GAPS_COUNT | EdgeMode::FULL_LENGTH_TRACE)
                    .with_band(inner_band(e1 - s1, e2 - s2, width));
                let aln = affine_align(&seq1[s1..e1], &seq2[s2..e2], matrix, &p)?;
                edits.append(&aln.edits)?;
                score += aln.score as i64;
            }
        }
        edits.push_aligned(b.length)?;
        score += b.length as i64 * match_score as i64;
    }

    // 末段：从 (0, 0) 出发
    let (r1, r2) = (last.end_seq1(), last.end_seq2());
    if r1 < seq1.len() || r2 < seq2.len() {
        let trailing = mode.trailing();
        let tail_band = if trailing.best_edge() {
            band(0, width)
        } else {
            inner_band(seq1.len() - r1, seq2.len() - r2, width)
        };
        let p = params
            .with_edge_mode(EdgeMode::EDGE_GAPS_COUNT | trailing)
            .with_band(tail_band);
        let aln = affine_align(&seq1[r1..], &seq2[r2..], matrix, &p)?;
        edits.append(&aln.edits)?;
        score += aln.score as i64;
    }

    Ok(Stitched { edits, score })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompareOpt;

    fn setup() -> (ScoreMatrix, AlignParams) {
        let opt = CompareOpt::default();
        (ScoreMatrix::from_opt(&opt), AlignParams::from_opt(&opt))
    }

    #[test]
    fn single_full_block() {
        let (m, p) = setup();
        let blocks = [BlockMatch::new(0, 0, 8)];
        let st = align_wrap(b"ACGTACGT", b"ACGTACGT", &blocks, &m, &p, 20, 10).expect("stitch");
        assert_eq!(st.edits.s1.runs(), &[8]);
        assert_eq!(st.edits.s2.runs(), &[8]);
        assert_eq!(st.score, 80);
    }

    #[test]
    fn segments_between_blocks_are_aligned() {
        let (m, p) = setup();
        // 两块之间 seq1 多出 3 个碱基
        let left = b"ACGTTGCAAGCTTAGCATGC";
        let right = b"GGATCCTAGGCTAGCTTACG";
        let seq1 = [&left[..], b"TTT", right].concat();
        let seq2 = [&left[..], right].concat();
        let blocks = [BlockMatch::new(0, 0, 20), BlockMatch::new(23, 20, 20)];
        let st = align_wrap(&seq1, &seq2, &blocks, &m, &p, 5, 10).expect("stitch");
        assert_eq!(st.edits.s1.runs(), &[43]);
        assert_eq!(st.edits.s2.runs(), &[20, -3, 20]);
        assert_eq!(st.score, 400 - (12 + 3 * 4));
    }

    #[test]
    fn overhangs_use_edge_policy() {
        let (m, p) = setup();
        let core = b"ACGTTGCAAGCTTAGCATGC";
        let seq1 = [&b"GGGGG"[..], core].concat();
        let seq2 = [&core[..], b"CCCCCCC"].concat();
        let blocks = [BlockMatch::new(5, 0, 20)];
        let st = align_wrap(&seq1, &seq2, &blocks, &m, &p, 10, 10).expect("stitch");
        assert_eq!(st.edits.s1.consumed(), seq1.len());
        assert_eq!(st.edits.s2.consumed(), seq2.len());
        assert_eq!(st.edits.s1.runs(), &[25, -7]);
        assert_eq!(st.edits.s2.runs(), &[-5, 27]);
        assert_eq!(st.score, 200);
    }
}
