use crate::error::{AlignError, AlignResult};
use crate::util::dna::{self, UNKNOWN};

/// 碱基组成 (A, C, G, T, 其他)
pub type Composition = [f64; 5];

/// 多项式卷积的最大项数
pub const MAX_POLY: usize = 20;

/// 空序列返回全零向量
pub fn composition_of(seq: &[u8]) -> Composition {
    let mut comp = [0.0f64; 5];
    if seq.is_empty() {
        return comp;
    }
    let mut counts = [0usize; 5];
    for &b in seq {
        counts[dna::base_code(b) as usize] += 1;
    }
    let n = seq.len() as f64;
    for (c, &k) in comp.iter_mut().zip(counts.iter()) {
        *c = k as f64 / n;
    }
    comp
}

/// 单个位置上两条随机序列碱基相同的概率；"其他"符号不参与匹配
pub fn prob_base_match(comp: &Composition) -> f64 {
    comp[..UNKNOWN as usize].iter().map(|p| p * p).sum()
}

/// 长度为 k 的两个随机词中恰好有 i 个位置相同的概率分布（i = 0..=k），
/// 由单位置多项式 (1-p) + p·x 自乘 k 次得到
pub fn match_count_distribution(word_length: usize, comp: &Composition) -> AlignResult<Vec<f64>> {
    if word_length + 1 > MAX_POLY {
        return Err(AlignError::invalid(format!(
            "word length {} exceeds polynomial bound {}",
            word_length,
            MAX_POLY - 1
        )));
    }
    let p = prob_base_match(comp);
    let base = [1.0 - p, p];
    let mut poly = vec![1.0f64];
    for _ in 0..word_length {
        let mut next = vec![0.0f64; poly.len() + 1];
        for (i, &a) in poly.iter().enumerate() {
            for (j, &b) in base.iter().enumerate() {
                next[i + j] += a * b;
            }
        }
        poly = next;
    }
    Ok(poly)
}

/// 一个随机词与另一个随机词完全相同的概率
pub fn prob_word(word_length: usize, comp: &Composition) -> AlignResult<f64> {
    let dist = match_count_distribution(word_length, comp)?;
    Ok(dist[word_length])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composition_counts_other() {
        let c = composition_of(b"AACG*N");
        assert!((c[0] - 2.0 / 6.0).abs() < 1e-12);
        assert!((c[1] - 1.0 / 6.0).abs() < 1e-12);
        assert!((c[2] - 1.0 / 6.0).abs() < 1e-12);
        assert_eq!(c[3], 0.0);
        assert!((c[4] - 2.0 / 6.0).abs() < 1e-12);
        assert_eq!(composition_of(b""), [0.0; 5]);
    }

    #[test]
    fn uniform_word_probability() {
        let comp = [0.25, 0.25, 0.25, 0.25, 0.0];
        let p = prob_word(8, &comp).expect("prob");
        assert!((p - 0.25f64.powi(8)).abs() < 1e-15);
        let dist = match_count_distribution(4, &comp).expect("dist");
        assert!((dist.iter().sum::<f64>() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn polynomial_bound() {
        let comp = [0.25, 0.25, 0.25, 0.25, 0.0];
        assert!(prob_word(19, &comp).is_ok());
        assert!(matches!(prob_word(20, &comp), Err(AlignError::InvalidParams(_))));
    }
}
