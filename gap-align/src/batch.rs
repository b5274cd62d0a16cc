//! 多序列两两比较。外层序列并行（rayon），每个工作线程为自己的外层序列建索引并持有独立的 `Comparer`。

use log::{debug, error, info, warn};
use rayon::prelude::*;

use crate::align::overlap::Overlap;
use crate::align::Comparer;
use crate::config::CompareOpt;
use crate::error::{AlignError, AlignResult};
use crate::util::dna;

#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    /// 外层（建索引）序列的下标
    pub seq1: usize,
    pub seq2: usize,
    /// seq2 以反向互补参与比较
    pub complemented: bool,
    pub overlap: Overlap,
}

#[derive(Debug, Default, Clone)]
pub struct BatchReport {
    pub hits: Vec<Hit>,
    /// 完成比较（无论是否命中）的序列对数
    pub compared: usize,
    /// 因序列过短或无法哈希而跳过的序列对数
    pub skipped: usize,
    pub failed: usize,
}

impl BatchReport {
    fn merge(mut self, other: BatchReport) -> BatchReport {
        self.hits.extend(other.hits);
        self.compared += other.compared;
        self.skipped += other.skipped;
        self.failed += other.failed;
        self
    }

    fn record_error(&mut self, e: &AlignError, i: usize, j: usize) {
        if e.is_skippable() {
            debug!("pair ({}, {}) skipped: {}", i, j, e);
            self.skipped += 1;
        } else if e.is_fatal() {
            error!("pair ({}, {}) failed: {}", i, j, e);
            self.failed += 1;
        } else {
            warn!("pair ({}, {}) abandoned: {}", i, j, e);
            self.failed += 1;
        }
    }
}

/// 集合内两两比较（i < j）
pub fn compare_all<S: AsRef<[u8]> + Sync>(seqs: &[S], opt: &CompareOpt) -> AlignResult<BatchReport> {
    let seqs: Vec<&[u8]> = seqs.iter().map(|s| s.as_ref()).collect();
    run(&seqs, &seqs, true, opt)
}

/// targets 中的每条序列对 queries 中的每条序列（queries 建索引）
pub fn compare_sets<S, T>(queries: &[S], targets: &[T], opt: &CompareOpt) -> AlignResult<BatchReport>
where
    S: AsRef<[u8]> + Sync,
    T: AsRef<[u8]> + Sync,
{
    let outer: Vec<&[u8]> = queries.iter().map(|s| s.as_ref()).collect();
    let inner: Vec<&[u8]> = targets.iter().map(|s| s.as_ref()).collect();
    run(&outer, &inner, false, opt)
}

fn run(outer: &[&[u8]], inner: &[&[u8]], same_set: bool, opt: &CompareOpt) -> AlignResult<BatchReport> {
    opt.validate()?;
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(opt.threads.max(1))
        .build()
        .map_err(|e| AlignError::invalid(format!("cannot start worker threads: {}", e)))?;

    let mut report = pool.install(|| {
        (0..outer.len())
            .into_par_iter()
            .map(|i| {
                let start = if same_set { i + 1 } else { 0 };
                compare_outer(i, outer[i], inner, start, opt)
            })
            .reduce(BatchReport::default, BatchReport::merge)
    });

    report
        .hits
        .sort_by(|a, b| (a.seq1, a.seq2, a.complemented).cmp(&(b.seq1, b.seq2, b.complemented)));
    info!(
        "compared {} pairs: {} hits, {} skipped, {} failed",
        report.compared,
        report.hits.len(),
        report.skipped,
        report.failed
    );
    Ok(report)
}

fn compare_outer(i: usize, seq1: &[u8], inner: &[&[u8]], start: usize, opt: &CompareOpt) -> BatchReport {
    let mut report = BatchReport::default();
    let n_pairs = inner.len().saturating_sub(start);
    if n_pairs == 0 {
        return report;
    }
    let mut comparer = match Comparer::new(opt.clone()) {
        Ok(c) => c,
        Err(e) => {
            report.record_error(&e, i, start);
            report.failed += n_pairs - 1;
            return report;
        }
    };
    let index = match comparer.build_index(seq1) {
        Ok(idx) => idx,
        Err(e) => {
            debug!("sequence {} cannot be indexed: {}", i, e);
            if e.is_skippable() {
                report.skipped += n_pairs;
            } else {
                report.failed += n_pairs;
            }
            return report;
        }
    };

    for (j, seq2) in inner.iter().enumerate().skip(start) {
        let forward = comparer.compare(&index, seq2);
        let reverse = if opt.both_strands {
            Some(comparer.compare(&index, &dna::revcomp(seq2)))
        } else {
            None
        };

        let mut best: Option<(bool, Overlap)> = None;
        let mut err = None;
        for (complemented, outcome) in std::iter::once((false, forward)).chain(reverse.map(|r| (true, r))) {
            match outcome {
                Ok(Some(ov)) => {
                    if best.as_ref().map_or(true, |(_, b)| ov.score > b.score) {
                        best = Some((complemented, ov));
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    if err.as_ref().map_or(true, |prev: &AlignError| e.is_fatal() && !prev.is_fatal()) {
                        err = Some(e);
                    }
                }
            }
        }

        match (best, err) {
            (_, Some(e)) if e.is_fatal() => report.record_error(&e, i, j),
            (Some((complemented, overlap)), _) => {
                report.compared += 1;
                report.hits.push(Hit { seq1: i, seq2: j, complemented, overlap });
            }
            (None, Some(e)) => report.record_error(&e, i, j),
            (None, None) => report.compared += 1,
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn random_seq(rng: &mut StdRng, len: usize) -> Vec<u8> {
        (0..len).map(|_| b"ACGT"[rng.gen_range(0..4)]).collect()
    }

    #[test]
    fn overlapping_reads_are_paired() {
        let mut rng = StdRng::seed_from_u64(7);
        let genome = random_seq(&mut rng, 600);
        let reads = vec![
            genome[0..250].to_vec(),
            genome[200..450].to_vec(),
            random_seq(&mut rng, 250),
            dna::revcomp(&genome[400..600]),
            b"ACGT".to_vec(),
        ];
        let opt = CompareOpt { threads: 2, ..CompareOpt::default() };
        let report = compare_all(&reads, &opt).expect("batch");

        let pairs: Vec<(usize, usize, bool)> =
            report.hits.iter().map(|h| (h.seq1, h.seq2, h.complemented)).collect();
        assert_eq!(pairs, vec![(0, 1, false), (1, 3, true)]);
        // 4 条可比较序列之间 6 对，短序列参与的 4 对被跳过
        assert_eq!(report.compared, 6);
        assert_eq!(report.skipped, 4);
        assert_eq!(report.failed, 0);
        assert_eq!(report.hits[0].overlap.length, 50);
    }

    #[test]
    fn single_strand_misses_reverse_hits() {
        let mut rng = StdRng::seed_from_u64(11);
        let genome = random_seq(&mut rng, 300);
        let reads = vec![genome[0..200].to_vec(), dna::revcomp(&genome[100..300])];
        let opt = CompareOpt { both_strands: false, ..CompareOpt::default() };
        let report = compare_all(&reads, &opt).expect("batch");
        assert!(report.hits.is_empty());
        assert_eq!(report.compared, 1);

        let report = compare_all(&reads, &CompareOpt::default()).expect("batch");
        assert_eq!(report.hits.len(), 1);
        assert!(report.hits[0].complemented);
    }

    #[test]
    fn sets_compare_every_target() {
        let mut rng = StdRng::seed_from_u64(3);
        let genome = random_seq(&mut rng, 400);
        let queries = vec![genome[0..300].to_vec()];
        let targets = vec![genome[100..400].to_vec(), genome[50..150].to_vec()];
        let report = compare_sets(&queries, &targets, &CompareOpt::default()).expect("batch");
        assert_eq!(report.hits.len(), 2);
        assert_eq!(report.hits[1].overlap.length, 100);
    }
}
