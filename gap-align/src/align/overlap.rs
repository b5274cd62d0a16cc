//! 比对结果：游程编码的编辑脚本，以及由比对字符串归纳出的重叠统计。

use std::fmt::Write as _;

use crate::error::{AlignError, AlignResult};

/// 一条序列的编辑脚本：正数 n 消耗 n 个真实字符，负数 -n 插入 n 个新 gap
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditScript {
    runs: Vec<i32>,
}

impl EditScript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_runs(runs: &[i32]) -> Self {
        let mut s = Self::new();
        for &r in runs {
            s.push_run(r);
        }
        s
    }

    pub fn runs(&self) -> &[i32] {
        &self.runs
    }

    /// 与末尾同号的游程合并；0 被忽略
    pub fn push_run(&mut self, n: i32) {
        if n == 0 {
            return;
        }
        if let Some(last) = self.runs.last_mut() {
            if (*last > 0) == (n > 0) {
                *last += n;
                return;
            }
        }
        self.runs.push(n);
    }

    /// 正游程之和，即消耗的真实字符数
    pub fn consumed(&self) -> usize {
        self.runs.iter().filter(|&&r| r > 0).map(|&r| r as usize).sum()
    }

    pub fn gaps(&self) -> usize {
        self.runs.iter().filter(|&&r| r < 0).map(|&r| (-r) as usize).sum()
    }

    pub fn aligned_len(&self) -> usize {
        self.consumed() + self.gaps()
    }

    /// 在序列中插入新 gap 得到比对后的字符串
    pub fn expand(&self, seq: &[u8], new_pad: u8) -> AlignResult<Vec<u8>> {
        if self.consumed() != seq.len() {
            return Err(AlignError::invariant(format!(
                "edit script consumes {} characters of a {} character sequence",
                self.consumed(),
                seq.len()
            )));
        }
        let mut out = Vec::with_capacity(self.aligned_len());
        let mut pos = 0usize;
        for &r in &self.runs {
            if r > 0 {
                let n = r as usize;
                out.extend_from_slice(&seq[pos..pos + n]);
                pos += n;
            } else {
                out.extend(std::iter::repeat(new_pad).take((-r) as usize));
            }
        }
        Ok(out)
    }
}

/// 两条序列各自的编辑脚本，按比对列同步增长。
///
/// 游程数上限在创建时给定，超出时返回 `CapacityExceeded`，由调用方按更大的容量重试。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditPair {
    pub s1: EditScript,
    pub s2: EditScript,
    limit: usize,
}

impl EditPair {
    pub fn with_capacity(limit: usize) -> Self {
        Self {
            s1: EditScript { runs: Vec::with_capacity(limit.min(1 << 16)) },
            s2: EditScript { runs: Vec::with_capacity(limit.min(1 << 16)) },
            limit,
        }
    }

    /// 两条序列都消耗 n 个字符（匹配或错配）
    pub fn push_aligned(&mut self, n: usize) -> AlignResult<()> {
        self.s1.push_run(n as i32);
        self.s2.push_run(n as i32);
        self.check()
    }

    /// seq1 中插入 n 个 gap，对面是 seq2 的 n 个字符
    pub fn push_gap_in_seq1(&mut self, n: usize) -> AlignResult<()> {
        self.s1.push_run(-(n as i32));
        self.s2.push_run(n as i32);
        self.check()
    }

    /// seq2 中插入 n 个 gap
    pub fn push_gap_in_seq2(&mut self, n: usize) -> AlignResult<()> {
        self.s1.push_run(n as i32);
        self.s2.push_run(-(n as i32));
        self.check()
    }

    pub fn append(&mut self, other: &EditPair) -> AlignResult<()> {
        for &r in other.s1.runs() {
            self.s1.push_run(r);
        }
        for &r in other.s2.runs() {
            self.s2.push_run(r);
        }
        self.check()
    }

    pub fn is_empty(&self) -> bool {
        self.s1.runs.is_empty() && self.s2.runs.is_empty()
    }

    fn check(&self) -> AlignResult<()> {
        let used = self.s1.runs.len().max(self.s2.runs.len());
        if used > self.limit {
            return Err(AlignError::CapacityExceeded { what: "edit script", requested: used });
        }
        Ok(())
    }
}

/// 两条序列的相对位置关系
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// seq2 在左：seq1 的前缀与 seq2 的后缀重叠
    Seq2Left,
    /// seq1 在左：seq1 的后缀与 seq2 的前缀重叠
    Seq1Left,
    Seq1ContainsSeq2,
    Seq2ContainsSeq1,
}

impl Direction {
    pub fn from_extents(left1: usize, right1: usize, left2: usize, right2: usize) -> Self {
        if left1 <= left2 && right1 >= right2 {
            Direction::Seq1ContainsSeq2
        } else if left2 <= left1 && right2 >= right1 {
            Direction::Seq2ContainsSeq1
        } else if left1 < left2 {
            Direction::Seq1Left
        } else {
            Direction::Seq2Left
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Seq2Left => "seq2-left",
            Direction::Seq1Left => "seq1-left",
            Direction::Seq1ContainsSeq2 => "seq1-contains-seq2",
            Direction::Seq2ContainsSeq1 => "seq2-contains-seq1",
        }
    }
}

/// 重叠区统计，坐标均为比对列号（从 0 开始，闭区间）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlapStats {
    pub left1: usize,
    pub right1: usize,
    pub left2: usize,
    pub right2: usize,
    pub left: usize,
    pub right: usize,
    pub length: usize,
    pub matches: usize,
    pub percent: f64,
    pub direction: Direction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PadSymbols {
    pub old: Option<u8>,
    pub new: u8,
}

impl PadSymbols {
    /// 某一列是否计为匹配：相同字符，或新 gap 对已有 pad
    #[inline]
    pub fn column_matches(&self, a: u8, b: u8) -> bool {
        if a.eq_ignore_ascii_case(&b) {
            return true;
        }
        match self.old {
            Some(old) => (a == self.new && b == old) || (a == old && b == self.new),
            None => false,
        }
    }
}

/// 仅凭两条比对字符串计算重叠长度、一致性百分比与方向；没有公共列时返回 None
pub fn seq_to_overlap(seq1_out: &[u8], seq2_out: &[u8], pads: PadSymbols) -> Option<OverlapStats> {
    let len = seq1_out.len().min(seq2_out.len());
    let real = |c: u8| c != pads.new;
    let left1 = seq1_out[..len].iter().position(|&c| real(c))?;
    let right1 = seq1_out[..len].iter().rposition(|&c| real(c))?;
    let left2 = seq2_out[..len].iter().position(|&c| real(c))?;
    let right2 = seq2_out[..len].iter().rposition(|&c| real(c))?;

    let left = left1.max(left2);
    let right = right1.min(right2);
    if right < left {
        return None;
    }
    let length = right - left + 1;
    let matches = (left..=right)
        .filter(|&i| pads.column_matches(seq1_out[i], seq2_out[i]))
        .count();

    Some(OverlapStats {
        left1,
        right1,
        left2,
        right2,
        left,
        right,
        length,
        matches,
        percent: 100.0 * matches as f64 / length as f64,
        direction: Direction::from_extents(left1, right1, left2, right2),
    })
}

/// 一次比较的最终结果
#[derive(Debug, Clone, PartialEq)]
pub struct Overlap {
    pub seq1_len: usize,
    pub seq2_len: usize,
    pub length: usize,
    /// 重叠区内的一致性百分比
    pub percent: f64,
    pub score: f64,
    pub direction: Direction,
    pub left1: usize,
    pub right1: usize,
    pub left2: usize,
    pub right2: usize,
    pub left: usize,
    pub right: usize,
    pub edits: EditPair,
    pub seq1_out: Vec<u8>,
    pub seq2_out: Vec<u8>,
}

impl Overlap {
    /// 展开编辑脚本并计算统计量。脚本未完整覆盖两条序列属于逻辑错误。
    pub fn from_edits(
        seq1: &[u8],
        seq2: &[u8],
        edits: EditPair,
        score: f64,
        pads: PadSymbols,
    ) -> AlignResult<Option<Overlap>> {
        let seq1_out = edits.s1.expand(seq1, pads.new)?;
        let seq2_out = edits.s2.expand(seq2, pads.new)?;
        if seq1_out.len() != seq2_out.len() {
            return Err(AlignError::invariant(format!(
                "aligned lengths differ: {} vs {}",
                seq1_out.len(),
                seq2_out.len()
            )));
        }
        let stats = match seq_to_overlap(&seq1_out, &seq2_out, pads) {
            Some(s) => s,
            None => return Ok(None),
        };
        Ok(Some(Overlap {
            seq1_len: seq1.len(),
            seq2_len: seq2.len(),
            length: stats.length,
            percent: stats.percent,
            score,
            direction: stats.direction,
            left1: stats.left1,
            right1: stats.right1,
            left2: stats.left2,
            right2: stats.right2,
            left: stats.left,
            right: stats.right,
            edits,
            seq1_out,
            seq2_out,
        }))
    }

    pub fn mismatch_percent(&self) -> f64 {
        100.0 - self.percent
    }

    /// 比对列 col 之前 seq1 消耗的真实字符数
    pub fn seq1_pos_at(&self, col: usize, new_pad: u8) -> usize {
        self.seq1_out[..col.min(self.seq1_out.len())]
            .iter()
            .filter(|&&c| c != new_pad)
            .count()
    }

    pub fn seq2_pos_at(&self, col: usize, new_pad: u8) -> usize {
        self.seq2_out[..col.min(self.seq2_out.len())]
            .iter()
            .filter(|&&c| c != new_pad)
            .count()
    }

    /// 按 width 列分块输出重叠区，中间一行用 '|' 标出匹配列
    pub fn display_alignment(&self, width: usize, pads: PadSymbols) -> String {
        let width = width.max(1);
        let mut out = String::new();
        let mut col = self.left;
        while col <= self.right {
            let end = (col + width).min(self.right + 1);
            let a = &self.seq1_out[col..end];
            let b = &self.seq2_out[col..end];
            let bar: String = a
                .iter()
                .zip(b)
                .map(|(&x, &y)| if pads.column_matches(x, y) { '|' } else { ' ' })
                .collect();
            let _ = writeln!(out, "{:>8}  {}", self.seq1_pos_at(col, pads.new) + 1, String::from_utf8_lossy(a));
            let _ = writeln!(out, "{:>8}  {}", "", bar);
            let _ = writeln!(out, "{:>8}  {}", self.seq2_pos_at(col, pads.new) + 1, String::from_utf8_lossy(b));
            out.push('\n');
            col = end;
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PADS: PadSymbols = PadSymbols { old: Some(b'*'), new: b'.' };

    #[test]
    fn runs_merge_by_sign() {
        let s = EditScript::from_runs(&[3, 2, -1, -2, 0, 4]);
        assert_eq!(s.runs(), &[5, -3, 4]);
        assert_eq!(s.consumed(), 9);
        assert_eq!(s.gaps(), 3);
        assert_eq!(s.aligned_len(), 12);
    }

    #[test]
    fn expand_checks_conservation() {
        let s = EditScript::from_runs(&[2, -2, 2]);
        assert_eq!(s.expand(b"ACGT", b'.').expect("expand"), b"AC..GT");
        assert!(matches!(s.expand(b"ACG", b'.'), Err(AlignError::InvariantViolation(_))));
    }

    #[test]
    fn edit_pair_keeps_columns_in_step() {
        let mut p = EditPair::with_capacity(16);
        p.push_gap_in_seq1(3).expect("push");
        p.push_aligned(5).expect("push");
        p.push_gap_in_seq2(2).expect("push");
        assert_eq!(p.s1.runs(), &[-3, 7]);
        assert_eq!(p.s2.runs(), &[8, -2]);
        assert_eq!(p.s1.aligned_len(), p.s2.aligned_len());
    }

    #[test]
    fn edit_pair_capacity() {
        let mut p = EditPair::with_capacity(2);
        p.push_aligned(1).expect("push");
        p.push_gap_in_seq1(1).expect("push");
        let err = p.push_aligned(1).unwrap_err();
        assert!(matches!(err, AlignError::CapacityExceeded { what: "edit script", .. }));
    }

    #[test]
    fn overlap_of_dovetail() {
        // seq1 在左
        let a = b"ACGTACGT....";
        let b = b"....ACGTTTTT";
        let st = seq_to_overlap(a, b, PADS).expect("overlap");
        assert_eq!((st.left1, st.right1, st.left2, st.right2), (0, 7, 4, 11));
        assert_eq!(st.length, 4);
        assert_eq!(st.percent, 100.0);
        assert_eq!(st.direction, Direction::Seq1Left);

        let st = seq_to_overlap(b, a, PADS).expect("overlap");
        assert_eq!(st.direction, Direction::Seq2Left);
    }

    #[test]
    fn containment_and_identity() {
        let st = seq_to_overlap(b"ACGTACGT", b"..GTAC..", PADS).expect("overlap");
        assert_eq!(st.direction, Direction::Seq1ContainsSeq2);
        assert_eq!(st.length, 4);
        let st = seq_to_overlap(b"..GTAC..", b"ACGTACGT", PADS).expect("overlap");
        assert_eq!(st.direction, Direction::Seq2ContainsSeq1);
        let st = seq_to_overlap(b"ACGT", b"ACGT", PADS).expect("overlap");
        assert_eq!(st.direction, Direction::Seq1ContainsSeq2);
    }

    #[test]
    fn new_gap_against_old_pad_counts_as_match() {
        let st = seq_to_overlap(b"AC**GT", b"AC..GT", PADS).expect("overlap");
        assert_eq!(st.percent, 100.0);
        let plain = PadSymbols { old: None, new: b'.' };
        let st = seq_to_overlap(b"AC**GT", b"AC..GT", plain).expect("overlap");
        assert!((st.percent - 400.0 / 6.0).abs() < 1e-9);
    }

    #[test]
    fn disjoint_alignment_has_no_overlap() {
        assert!(seq_to_overlap(b"ACG...", b"...TTA", PADS).is_none());
    }

    #[test]
    fn overlap_from_edits() {
        let mut p = EditPair::with_capacity(8);
        p.push_gap_in_seq2(2).expect("push");
        p.push_aligned(4).expect("push");
        let ov = Overlap::from_edits(b"TTACGT", b"ACGA", p, 17.0, PADS)
            .expect("ok")
            .expect("overlap");
        assert_eq!(ov.seq1_out, b"TTACGT");
        assert_eq!(ov.seq2_out, b"..ACGA");
        assert_eq!(ov.length, 4);
        assert_eq!(ov.percent, 75.0);
        assert_eq!(ov.mismatch_percent(), 25.0);
        assert_eq!(ov.direction, Direction::Seq1ContainsSeq2);
        assert_eq!(ov.seq1_pos_at(ov.left, b'.'), 2);
        let shown = ov.display_alignment(60, PADS);
        assert!(shown.contains("ACGT"));
        assert!(shown.contains("||| "));
    }
}
