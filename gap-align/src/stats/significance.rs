//! 对角线直方图的显著性阈值表。
//!
//! 长度为 d 的对角线上随机词命中数近似服从 Poisson(λ = d · p_word)。
//! 对每个 d，表中记录满足 P(X > j) < max_prob 的最小 j；命中数必须超过它才算真实匹配。

use log::{debug, warn};

use crate::error::{AlignError, AlignResult};

use super::composition::{prob_word, Composition};

/// double 精度下尾概率计算的可靠下限
const DOUBLE_FLOOR: f64 = 1.0e-14;
/// 单精度宿主上的下限
const FLOAT_FLOOR: f64 = 1.0e-37;

#[derive(Debug, Clone)]
pub struct SignificanceModel {
    scores: Vec<u32>,
    min_diagonal: usize,
    p_word: f64,
}

impl SignificanceModel {
    pub fn new(
        min_diagonal: usize,
        max_diagonal: usize,
        word_length: usize,
        max_prob: f64,
        comp: &Composition,
        max_iterations: usize,
    ) -> AlignResult<Self> {
        let p_word = prob_word(word_length, comp)?;
        let scores = poisson_scores(max_diagonal, p_word, max_prob, max_iterations)?;
        debug!(
            "significance table: {} diagonals, p_word={:.3e}, max_prob={:.1e}",
            scores.len(),
            p_word,
            max_prob
        );
        Ok(Self { scores, min_diagonal, p_word })
    }

    /// 长度为 diagonal_length 的对角线所需的命中数阈值
    pub fn expected(&self, diagonal_length: usize) -> u32 {
        match self.scores.get(diagonal_length) {
            Some(&s) => s,
            None => self.scores.last().copied().unwrap_or(0),
        }
    }

    pub fn is_significant(&self, diagonal_length: usize, score: u32) -> bool {
        diagonal_length >= self.min_diagonal
            && diagonal_length < self.scores.len()
            && score > self.expected(diagonal_length)
    }

    pub fn scores(&self) -> &[u32] {
        &self.scores
    }

    pub fn p_word(&self) -> f64 {
        self.p_word
    }
}

/// 对 0..=max_diagonal 的每个长度计算阈值。结果对长度单调不减。
pub fn expected_scores(
    min_diagonal: usize,
    max_diagonal: usize,
    word_length: usize,
    max_prob: f64,
    comp: &Composition,
    max_iterations: usize,
) -> AlignResult<Vec<u32>> {
    SignificanceModel::new(min_diagonal, max_diagonal, word_length, max_prob, comp, max_iterations)
        .map(|m| m.scores)
}

fn poisson_scores(
    max_diagonal: usize,
    p_word: f64,
    max_prob: f64,
    max_iterations: usize,
) -> AlignResult<Vec<u32>> {
    if !(max_prob > 0.0 && max_prob < 1.0) {
        return Err(AlignError::invalid(format!("max_prob {} outside (0, 1)", max_prob)));
    }
    let mut prob = max_prob.max(FLOAT_FLOOR);
    let mut correction = 1.0f64;
    if prob < DOUBLE_FLOOR {
        correction = prob.log10() / DOUBLE_FLOOR.log10();
        prob = DOUBLE_FLOOR;
    }

    let mut scores = Vec::with_capacity(max_diagonal + 1);
    let mut j = 0usize;
    let mut warned = false;
    for d in 0..=max_diagonal {
        let lambda = d as f64 * p_word;
        if lambda <= 0.0 {
            scores.push(0);
            continue;
        }
        // P(X <= λ - √λ - 1) <= e^{-1/2}，更小的 j 的尾概率不可能低于 0.25
        if prob < 0.25 {
            j = j.max((lambda - lambda.sqrt() - 1.0).max(0.0).floor() as usize);
        }
        let mut iterations = 0usize;
        loop {
            let (tail, used) = poisson_upper_tail(lambda, j, max_iterations);
            iterations += used + 1;
            if tail < prob {
                break;
            }
            if iterations >= max_iterations {
                if !warned {
                    warn!(
                        "poisson threshold did not converge for diagonal length {} (lambda={:.3}); using bound {}",
                        d, lambda, j
                    );
                    warned = true;
                }
                break;
            }
            j += 1;
        }
        scores.push((j as f64 * correction).ceil() as u32);
    }
    Ok(scores)
}

/// P(X > j)，X ~ Poisson(λ)，在对数空间中自 j+1 向上求和。返回 (尾概率, 求和项数)。
fn poisson_upper_tail(lambda: f64, j: usize, max_terms: usize) -> (f64, usize) {
    let ln_lambda = lambda.ln();
    let mut i = j + 1;
    let mut term = (-lambda + i as f64 * ln_lambda - ln_factorial(i)).exp();
    let mut sum = 0.0f64;
    let mut used = 0usize;
    while used < max_terms.max(1) {
        sum += term;
        used += 1;
        i += 1;
        term *= lambda / i as f64;
        if term <= sum * 1.0e-17 || term == 0.0 {
            break;
        }
    }
    (sum, used)
}

/// ln(n!)：小 n 精确求和，大 n 用 Stirling 级数
fn ln_factorial(n: usize) -> f64 {
    if n <= 32 {
        return (2..=n).map(|i| (i as f64).ln()).sum();
    }
    let x = n as f64;
    let x2 = x * x;
    x * x.ln() - x + 0.5 * (2.0 * std::f64::consts::PI * x).ln() + 1.0 / (12.0 * x)
        - 1.0 / (360.0 * x * x2)
        + 1.0 / (1260.0 * x * x2 * x2)
}

#[cfg(test)]
mod tests {
    use super::*;

    const UNIFORM: Composition = [0.25, 0.25, 0.25, 0.25, 0.0];

    #[test]
    fn ln_factorial_matches_exact_sum() {
        for n in [0usize, 1, 5, 32, 33, 100, 500] {
            let exact: f64 = (2..=n).map(|i| (i as f64).ln()).sum();
            assert!((ln_factorial(n) - exact).abs() < 1e-9, "n={}", n);
        }
    }

    #[test]
    fn tail_of_small_poisson() {
        // P(X > 0) = 1 - e^-λ
        let (t, _) = poisson_upper_tail(0.5, 0, 1000);
        assert!((t - (1.0 - (-0.5f64).exp())).abs() < 1e-12);
        // P(X > 2) = 1 - e^-λ(1 + λ + λ²/2)
        let l = 2.0f64;
        let (t, _) = poisson_upper_tail(l, 2, 1000);
        let want = 1.0 - (-l).exp() * (1.0 + l + l * l / 2.0);
        assert!((t - want).abs() < 1e-12);
    }

    #[test]
    fn monotone_in_diagonal_length() {
        for k in [4usize, 8, 12] {
            let s = expected_scores(20, 5000, k, 1e-6, &UNIFORM, 10_000).expect("scores");
            assert_eq!(s.len(), 5001);
            for d in 0..5000 {
                assert!(s[d] <= s[d + 1], "k={} d={}", k, d);
            }
        }
    }

    #[test]
    fn stricter_probability_needs_higher_score() {
        let loose = expected_scores(20, 3000, 8, 1e-3, &UNIFORM, 10_000).expect("loose");
        let strict = expected_scores(20, 3000, 8, 1e-9, &UNIFORM, 10_000).expect("strict");
        let floor = expected_scores(20, 3000, 8, 1e-30, &UNIFORM, 10_000).expect("floor");
        for d in 0..=3000 {
            assert!(loose[d] <= strict[d]);
            assert!(strict[d] <= floor[d]);
        }
        assert!(strict[3000] > loose[3000]);
    }

    #[test]
    fn threshold_is_a_true_poisson_quantile() {
        let s = expected_scores(1, 1000, 4, 1e-4, &UNIFORM, 10_000).expect("scores");
        let lambda = 1000.0 * 0.25f64.powi(4);
        let j = s[1000] as usize;
        assert!(poisson_upper_tail(lambda, j, 1000).0 < 1e-4);
        assert!(poisson_upper_tail(lambda, j - 1, 1000).0 >= 1e-4);
    }

    #[test]
    fn non_convergence_falls_back() {
        let s = expected_scores(1, 2000, 4, 1e-6, &UNIFORM, 3).expect("scores");
        assert_eq!(s.len(), 2001);
        for d in 0..2000 {
            assert!(s[d] <= s[d + 1]);
        }
    }

    #[test]
    fn model_gates_short_diagonals() {
        let m = SignificanceModel::new(50, 1000, 8, 1e-6, &UNIFORM, 10_000).expect("model");
        assert!(!m.is_significant(40, 100));
        assert!(m.is_significant(500, m.expected(500) + 1));
        assert!(!m.is_significant(500, m.expected(500)));
        assert!(!m.is_significant(5000, 1000));
    }
}
