/// 2-bit 编码之外的符号（歧义码、pad、分隔符）
pub const UNKNOWN: u8 = 4;

const fn build_code_table() -> [u8; 256] {
    let mut t = [UNKNOWN; 256];
    t[b'A' as usize] = 0;
    t[b'a' as usize] = 0;
    t[b'C' as usize] = 1;
    t[b'c' as usize] = 1;
    t[b'G' as usize] = 2;
    t[b'g' as usize] = 2;
    t[b'T' as usize] = 3;
    t[b't' as usize] = 3;
    t[b'U' as usize] = 3;
    t[b'u' as usize] = 3;
    t
}

static CODE: [u8; 256] = build_code_table();

/// A/C/G/T -> 0..4，其他 -> [`UNKNOWN`]
#[inline]
pub fn base_code(b: u8) -> u8 {
    CODE[b as usize]
}

#[inline]
pub fn is_acgt(b: u8) -> bool {
    CODE[b as usize] != UNKNOWN
}

#[inline]
pub fn complement(base: u8) -> u8 {
    match base.to_ascii_uppercase() {
        b'A' => b'T',
        b'C' => b'G',
        b'G' => b'C',
        b'T' | b'U' => b'A',
        b'R' => b'Y',
        b'Y' => b'R',
        b'K' => b'M',
        b'M' => b'K',
        b'B' => b'V',
        b'V' => b'B',
        b'D' => b'H',
        b'H' => b'D',
        // pads, N, S, W are their own complement
        other => other,
    }
}

pub fn revcomp(seq: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(seq.len());
    for &b in seq.iter().rev() {
        out.push(complement(b));
    }
    out
}

/// 去掉所有 pad 符号
pub fn depad(seq: &[u8], pad: u8) -> Vec<u8> {
    seq.iter().copied().filter(|&b| b != pad).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes() {
        assert_eq!(base_code(b'A'), 0);
        assert_eq!(base_code(b'c'), 1);
        assert_eq!(base_code(b'G'), 2);
        assert_eq!(base_code(b'u'), 3);
        assert_eq!(base_code(b'N'), UNKNOWN);
        assert_eq!(base_code(b'*'), UNKNOWN);
        assert_eq!(base_code(0), UNKNOWN);
    }

    #[test]
    fn revcomp_keeps_pads_in_place() {
        assert_eq!(revcomp(b"AAC*GT"), b"AC*GTT");
        assert_eq!(revcomp(b"RYN"), b"NRY");
    }

    #[test]
    fn depad_removes_only_pads() {
        assert_eq!(depad(b"AC**GT*", b'*'), b"ACGT");
    }
}
