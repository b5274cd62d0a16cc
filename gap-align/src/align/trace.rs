//! 回溯信息的存储。
//!
//! 每个 DP 单元 4 bit：低两位是该单元三种状态中得分最高者，另外两位分别记录
//! "沿 seq1 方向的 gap 是延伸而来"和"沿 seq2 方向的 gap 是延伸而来"。
//! 回溯在 gap 内部依靠扩展位停留在同一状态。
//! 稠密存储每单元一个字节；紧凑存储每字节两个单元（高低半字节），内存为稠密存储的一半。

use crate::error::{AlignError, AlignResult};

/// 对角线移动（匹配/错配）
pub const DIAG: u8 = 0;
/// 只消耗 seq1（seq2 中插入 gap），矩阵中向下
pub const DOWN: u8 = 1;
/// 只消耗 seq2（seq1 中插入 gap），矩阵中向右
pub const ACROSS: u8 = 2;
pub const STATE_MASK: u8 = 0b0011;
pub const DOWN_EXTENDED: u8 = 0b0100;
pub const ACROSS_EXTENDED: u8 = 0b1000;

pub trait TracebackStore {
    fn get(&self, idx: usize) -> u8;
    fn set(&mut self, idx: usize, code: u8);
    fn bytes(&self) -> usize;
}

fn alloc(bytes: usize) -> AlignResult<Vec<u8>> {
    let mut v = Vec::new();
    v.try_reserve_exact(bytes)
        .map_err(|_| AlignError::CapacityExceeded { what: "traceback", requested: bytes })?;
    v.resize(bytes, 0);
    Ok(v)
}

/// 每单元一字节
pub struct DenseTrace {
    data: Vec<u8>,
}

impl DenseTrace {
    pub fn new(cells: usize) -> AlignResult<Self> {
        Ok(Self { data: alloc(cells)? })
    }

    pub fn bytes_for(cells: usize) -> usize {
        cells
    }
}

impl TracebackStore for DenseTrace {
    #[inline]
    fn get(&self, idx: usize) -> u8 {
        self.data[idx]
    }

    #[inline]
    fn set(&mut self, idx: usize, code: u8) {
        self.data[idx] = code;
    }

    fn bytes(&self) -> usize {
        self.data.len()
    }
}

/// 每字节两个单元
pub struct PackedTrace {
    data: Vec<u8>,
}

impl PackedTrace {
    pub fn new(cells: usize) -> AlignResult<Self> {
        Ok(Self { data: alloc(Self::bytes_for(cells))? })
    }

    pub fn bytes_for(cells: usize) -> usize {
        (cells + 1) / 2
    }
}

impl TracebackStore for PackedTrace {
    #[inline]
    fn get(&self, idx: usize) -> u8 {
        let b = self.data[idx >> 1];
        if idx & 1 == 0 {
            b & 0x0f
        } else {
            b >> 4
        }
    }

    #[inline]
    fn set(&mut self, idx: usize, code: u8) {
        let b = &mut self.data[idx >> 1];
        if idx & 1 == 0 {
            *b = (*b & 0xf0) | (code & 0x0f);
        } else {
            *b = (*b & 0x0f) | ((code & 0x0f) << 4);
        }
    }

    fn bytes(&self) -> usize {
        self.data.len()
    }
}

/// 带状区域：以 j - i == diagonal 为中心，两侧各 width 条对角线
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Band {
    pub diagonal: isize,
    pub width: usize,
}

/// DP 矩阵（行 = seq1 已消耗字符数，列 = seq2 已消耗字符数）到回溯数组下标的映射
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceLayout {
    rows: usize,
    cols: usize,
    band: Option<Band>,
}

impl TraceLayout {
    /// 覆盖整个矩阵的带会被规约为不限带宽
    pub fn new(len1: usize, len2: usize, band: Option<Band>) -> Self {
        let rows = len1 + 1;
        let cols = len2 + 1;
        let band = band.filter(|b| {
            let w = b.width as isize;
            let covers_all = (rows as isize - 1) + b.diagonal - w <= 0 && b.diagonal + w >= cols as isize - 1;
            !covers_all
        });
        Self { rows, cols, band }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn band(&self) -> Option<Band> {
        self.band
    }

    /// 每行在回溯数组中占的单元数
    pub fn row_width(&self) -> usize {
        match self.band {
            Some(b) => 2 * b.width + 1,
            None => self.cols,
        }
    }

    pub fn cells(&self) -> usize {
        self.rows * self.row_width()
    }

    /// 第 i 行的列区间 [lo, hi]；带与该行不相交时返回 None
    pub fn row_range(&self, i: usize) -> Option<(usize, usize)> {
        match self.band {
            None => Some((0, self.cols - 1)),
            Some(b) => {
                let center = i as isize + b.diagonal;
                let lo = (center - b.width as isize).max(0);
                let hi = (center + b.width as isize).min(self.cols as isize - 1);
                if lo > hi {
                    None
                } else {
                    Some((lo as usize, hi as usize))
                }
            }
        }
    }

    pub fn contains(&self, i: usize, j: usize) -> bool {
        self.index(i, j).is_some()
    }

    /// 单元 (i, j) 的下标；不在矩阵或带内时返回 None
    #[inline]
    pub fn index(&self, i: usize, j: usize) -> Option<usize> {
        if i >= self.rows || j >= self.cols {
            return None;
        }
        match self.band {
            None => Some(i * self.cols + j),
            Some(b) => {
                let first = i as isize + b.diagonal - b.width as isize;
                let off = j as isize - first;
                if off < 0 || off > 2 * b.width as isize {
                    None
                } else {
                    Some(i * (2 * b.width + 1) + off as usize)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packed_and_dense_store_the_same_codes() {
        let codes: Vec<u8> = (0..37u8).map(|i| i % 16).collect();
        let mut dense = DenseTrace::new(codes.len()).expect("dense");
        let mut packed = PackedTrace::new(codes.len()).expect("packed");
        for (i, &c) in codes.iter().enumerate() {
            dense.set(i, c);
            packed.set(i, c);
        }
        for (i, &c) in codes.iter().enumerate() {
            assert_eq!(dense.get(i), c);
            assert_eq!(packed.get(i), c);
        }
        assert_eq!(packed.bytes(), 19);
        assert_eq!(dense.bytes(), 37);
    }

    #[test]
    fn extension_flags_survive_neighbour_writes() {
        let mut packed = PackedTrace::new(4).expect("packed");
        packed.set(1, ACROSS | ACROSS_EXTENDED | DOWN_EXTENDED);
        packed.set(0, DOWN | DOWN_EXTENDED);
        packed.set(2, STATE_MASK);
        packed.set(0, DIAG);
        assert_eq!(packed.get(1) & STATE_MASK, ACROSS);
        assert_ne!(packed.get(1) & ACROSS_EXTENDED, 0);
        assert_ne!(packed.get(1) & DOWN_EXTENDED, 0);
        assert_eq!(packed.get(0), DIAG);
        assert_eq!(packed.get(3), 0);
        assert_eq!(packed.bytes(), 2);
    }

    #[test]
    fn unbanded_layout() {
        let l = TraceLayout::new(3, 4, None);
        assert_eq!(l.cells(), 20);
        assert_eq!(l.index(2, 3), Some(13));
        assert_eq!(l.index(4, 0), None);
        assert_eq!(l.row_range(3), Some((0, 4)));
    }

    #[test]
    fn banded_layout_shifts_one_column_per_row() {
        let l = TraceLayout::new(10, 10, Some(Band { diagonal: 0, width: 2 }));
        assert_eq!(l.row_width(), 5);
        assert_eq!(l.row_range(0), Some((0, 2)));
        assert_eq!(l.row_range(5), Some((3, 7)));
        assert_eq!(l.row_range(10), Some((8, 10)));
        assert_eq!(l.index(5, 3), Some(25));
        assert_eq!(l.index(5, 7), Some(29));
        assert_eq!(l.index(5, 8), None);
        assert_eq!(l.index(6, 4), Some(30));
    }

    #[test]
    fn banded_indices_are_unique() {
        let l = TraceLayout::new(12, 7, Some(Band { diagonal: -3, width: 2 }));
        let mut seen = std::collections::HashSet::new();
        for i in 0..l.rows() {
            if let Some((lo, hi)) = l.row_range(i) {
                for j in lo..=hi {
                    let idx = l.index(i, j).expect("in band");
                    assert!(idx < l.cells());
                    assert!(seen.insert(idx));
                }
            }
        }
        assert_eq!(l.row_range(0), None);
    }

    #[test]
    fn covering_band_is_dropped() {
        let l = TraceLayout::new(5, 5, Some(Band { diagonal: 0, width: 5 }));
        assert_eq!(l.band(), None);
        let l = TraceLayout::new(5, 5, Some(Band { diagonal: 0, width: 4 }));
        assert!(l.band().is_some());
    }
}
