//! 比较引擎入口：建索引、灵敏模式比较、块模式比较、批量 contig 比较，以及灵敏模式失败时回退到块模式的驱动。

pub mod affine;
pub mod chain;
pub mod overlap;
pub mod seed;
pub mod stitch;
pub mod trace;

use log::{error, info};

use crate::config::{CompareOpt, SearchMode};
use crate::error::{AlignError, AlignResult};
use crate::index::{BulkIndex, SequenceIndex};
use crate::stats::{composition_of, SignificanceModel};

use affine::{affine_align, AlignParams, ScoreMatrix};
use chain::{align_blocks, ChainParams};
use overlap::{Overlap, PadSymbols};
use seed::{best_intercept, block_matches, diagonal_candidates, split_by_contig, SeedBuffer};
use trace::Band;

pub use overlap::{Direction, EditPair, EditScript};

/// 一条序列对批量 contig 的命中
#[derive(Debug, Clone, PartialEq)]
pub struct BulkHit {
    pub contig: usize,
    pub overlap: Overlap,
}

/// 持有一次配置下复用的得分矩阵、比对参数与扫描缓冲区。
///
/// 每个线程各用一个；`SequenceIndex` 由调用方按 seq1 建立，可在多次比较间复用。
pub struct Comparer {
    opt: CompareOpt,
    matrix: ScoreMatrix,
    params: AlignParams,
    buf: SeedBuffer,
}

impl Comparer {
    pub fn new(opt: CompareOpt) -> AlignResult<Self> {
        opt.validate()?;
        let matrix = ScoreMatrix::from_opt(&opt);
        let params = AlignParams::from_opt(&opt);
        Ok(Self { opt, matrix, params, buf: SeedBuffer::new() })
    }

    pub fn opt(&self) -> &CompareOpt {
        &self.opt
    }

    pub fn pads(&self) -> PadSymbols {
        self.params.pads
    }

    fn check_length(&self, len: usize) -> AlignResult<()> {
        let required = self.opt.min_match.max(self.opt.effective_word_length());
        if len < required {
            return Err(AlignError::InputTooShort { len, required });
        }
        Ok(())
    }

    pub fn build_index(&self, seq: &[u8]) -> AlignResult<SequenceIndex> {
        self.check_length(seq.len())?;
        SequenceIndex::build(seq, self.opt.word_length)
    }

    /// 按配置的模式比较；灵敏模式带回退
    pub fn compare(&mut self, index: &SequenceIndex, seq2: &[u8]) -> AlignResult<Option<Overlap>> {
        match self.opt.mode {
            SearchMode::Sensitive => self.compare_with_fallback(index, seq2),
            SearchMode::Block => self.compare_blocks(index, seq2),
        }
    }

    /// 对角线直方图找出最佳对角线，然后在其周围做一次带状比对
    pub fn compare_sensitive(&mut self, index: &SequenceIndex, seq2: &[u8]) -> AlignResult<Option<Overlap>> {
        self.check_length(seq2.len())?;
        let seq1 = index.seq();
        let (len1, len2) = (seq1.len(), seq2.len());
        let comp = composition_of(seq1);
        let model = SignificanceModel::new(
            self.opt.min_diagonal,
            len1.min(len2),
            index.word_length(),
            self.opt.max_prob,
            &comp,
            self.opt.poisson_iterations,
        )?;
        let candidates = diagonal_candidates(index, seq2, self.opt.min_match, &model, &mut self.buf)?;
        let diagonal = match best_intercept(&candidates) {
            Some(d) => d,
            None => return Ok(None),
        };

        let mut width = self.opt.band.resolve(len1, len2);
        if width > 0 && !self.params.edge_mode.best_edge() {
            let corner = len2 as isize - len1 as isize;
            width = width.max((corner - diagonal).unsigned_abs());
        }
        let band = if width == 0 { None } else { Some(Band { diagonal, width }) };
        let aln = affine_align(seq1, seq2, &self.matrix, &self.params.with_band(band))?;
        self.finish(seq1, seq2, aln.edits, aln.score as f64)
    }

    /// 精确匹配块成链后分段比对
    pub fn compare_blocks(&mut self, index: &SequenceIndex, seq2: &[u8]) -> AlignResult<Option<Overlap>> {
        self.check_length(seq2.len())?;
        let mut blocks = block_matches(
            index,
            seq2,
            self.opt.min_match,
            self.opt.max_matches,
            0,
            &mut self.buf,
        )?;
        self.chain_and_stitch(index.seq(), seq2, &mut blocks)
    }

    /// seq2 对拼接索引中的全部 contig；重复词按 filter_words 过滤
    pub fn compare_bulk(&mut self, bulk: &BulkIndex, seq2: &[u8]) -> AlignResult<Vec<BulkHit>> {
        self.check_length(seq2.len())?;
        let blocks = block_matches(
            bulk.index(),
            seq2,
            self.opt.min_match,
            self.opt.max_matches,
            self.opt.filter_words,
            &mut self.buf,
        )?;
        let mut hits = Vec::new();
        for (contig, mut group) in split_by_contig(bulk, &blocks) {
            if let Some(overlap) = self.chain_and_stitch(bulk.contig_seq(contig), seq2, &mut group)? {
                hits.push(BulkHit { contig, overlap });
            }
        }
        Ok(hits)
    }

    /// 灵敏模式内存不足时改用块模式
    pub fn compare_with_fallback(&mut self, index: &SequenceIndex, seq2: &[u8]) -> AlignResult<Option<Overlap>> {
        match self.compare_sensitive(index, seq2) {
            Err(e) if e.wants_fallback() => {
                info!("sensitive comparison gave up ({}), retrying in block mode", e);
                self.compare_blocks(index, seq2)
            }
            other => other,
        }
    }

    fn chain_and_stitch(
        &self,
        seq1: &[u8],
        seq2: &[u8],
        blocks: &mut [seed::BlockMatch],
    ) -> AlignResult<Option<Overlap>> {
        let chain = match align_blocks(blocks, seq1.len(), seq2.len(), &ChainParams::from_opt(&self.opt)) {
            Some(c) => c,
            None => return Ok(None),
        };
        let width = self.opt.band.resolve(seq1.len(), seq2.len());
        let st = stitch::align_wrap(
            seq1,
            seq2,
            &chain.blocks,
            &self.matrix,
            &self.params,
            width,
            self.opt.match_score,
        )?;
        self.finish(seq1, seq2, st.edits, st.score as f64)
    }

    fn finish(&self, seq1: &[u8], seq2: &[u8], edits: EditPair, score: f64) -> AlignResult<Option<Overlap>> {
        let overlap = Overlap::from_edits(seq1, seq2, edits, score, self.params.pads).map_err(|e| {
            if e.is_fatal() {
                error!("alignment of {}x{} is inconsistent: {}", seq1.len(), seq2.len(), e);
            }
            e
        })?;
        Ok(overlap.filter(|o| o.mismatch_percent() <= self.opt.max_mismatch))
    }
}

pub fn build_index(seq: &[u8], opt: &CompareOpt) -> AlignResult<SequenceIndex> {
    Comparer::new(opt.clone())?.build_index(seq)
}

pub fn compare_sensitive(index: &SequenceIndex, seq2: &[u8], opt: &CompareOpt) -> AlignResult<Option<Overlap>> {
    Comparer::new(opt.clone())?.compare_sensitive(index, seq2)
}

pub fn compare_blocks(index: &SequenceIndex, seq2: &[u8], opt: &CompareOpt) -> AlignResult<Option<Overlap>> {
    Comparer::new(opt.clone())?.compare_blocks(index, seq2)
}

pub fn compare_bulk(bulk: &BulkIndex, seq2: &[u8], opt: &CompareOpt) -> AlignResult<Vec<BulkHit>> {
    Comparer::new(opt.clone())?.compare_bulk(bulk, seq2)
}

pub fn compare_with_fallback(index: &SequenceIndex, seq2: &[u8], opt: &CompareOpt) -> AlignResult<Option<Overlap>> {
    Comparer::new(opt.clone())?.compare_with_fallback(index, seq2)
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: &[u8] = b"GATTACAGGCTTAACGTAGCATCGATCGGATCCTAGGCTAGCTAGGATCCGATCAAGTCGTACG";

    #[test]
    fn identical_sequences_block_mode() {
        let opt = CompareOpt::default();
        let idx = build_index(A, &opt).expect("index");
        let ov = compare_blocks(&idx, A, &opt).expect("compare").expect("overlap");
        assert_eq!(ov.length, A.len());
        assert_eq!(ov.percent, 100.0);
        assert_eq!(ov.direction, Direction::Seq1ContainsSeq2);
    }

    #[test]
    fn identical_sequences_sensitive_mode() {
        let opt = CompareOpt { mode: SearchMode::Sensitive, ..CompareOpt::default() };
        let idx = build_index(A, &opt).expect("index");
        let ov = compare_sensitive(&idx, A, &opt).expect("compare").expect("overlap");
        assert_eq!(ov.length, A.len());
        assert_eq!(ov.percent, 100.0);
    }

    #[test]
    fn short_input_is_reported() {
        let opt = CompareOpt::default();
        let err = build_index(b"ACGTACGT", &opt).unwrap_err();
        assert!(err.is_skippable());
    }

    #[test]
    fn fallback_to_block_mode_on_trace_limit() {
        let opt = CompareOpt {
            mode: SearchMode::Sensitive,
            max_trace_bytes: 64,
            band: crate::config::BandWidth::Absolute(0),
            ..CompareOpt::default()
        };
        let idx = build_index(A, &opt).expect("index");
        assert!(compare_sensitive(&idx, A, &opt).unwrap_err().wants_fallback());
        let ov = compare_with_fallback(&idx, A, &opt).expect("compare").expect("overlap");
        assert_eq!(ov.percent, 100.0);
    }

    #[test]
    fn bulk_reports_matching_contig() {
        let opt = CompareOpt::default();
        let other = b"TTTTGGGGCCCCAAAATTTTGGGGCCCCAAAATTTTGGGG";
        let bulk = BulkIndex::build(&[&other[..], A], opt.word_length).expect("bulk");
        let hits = compare_bulk(&bulk, &A[10..50], &opt).expect("bulk");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].contig, 1);
        assert_eq!(hits[0].overlap.length, 40);
    }
}
