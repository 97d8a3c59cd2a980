pub const SIGMA: usize = 5; // {0:$, 1:A, 2:C, 3:G, 4:T}

/// 种子图按此顺序枚举子分支，保证结果确定性。
pub const BASES: [u8; 4] = [1, 2, 3, 4];

/// 孔道 k-mer 模型不含 N，未知碱基统一映射为 A。
#[inline]
pub fn to_alphabet(b: u8) -> u8 {
    if b == 0 { return 0; }
    match b.to_ascii_uppercase() {
        b'C' => 2,
        b'G' => 3,
        b'T' | b'U' => 4,
        _ => 1,
    }
}

#[inline]
pub fn from_alphabet(a: u8) -> u8 {
    match a {
        0 => b'$',
        2 => b'C',
        3 => b'G',
        4 => b'T',
        _ => b'A',
    }
}

pub fn normalize_seq(seq: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(seq.len());
    for &b in seq {
        let up = b.to_ascii_uppercase();
        let nb = match up {
            b'A' | b'C' | b'G' | b'T' => up,
            b'U' => b'T',
            _ => b'A',
        };
        out.push(nb);
    }
    out
}

/// 编码后字母表上的互补（1<->4, 2<->3）。
#[inline]
pub fn complement_code(a: u8) -> u8 {
    match a {
        1 => 4,
        2 => 3,
        3 => 2,
        4 => 1,
        other => other,
    }
}

/// 编码序列的反向互补，用于构建负链索引。
pub fn revcomp_code(seq: &[u8]) -> Vec<u8> {
    seq.iter().rev().map(|&a| complement_code(a)).collect()
}

/// 将 ASCII 序列编码为 [0..SIGMA) 字母表。
pub fn encode_seq(seq: &[u8]) -> Vec<u8> {
    normalize_seq(seq).iter().map(|&b| to_alphabet(b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_maps_unknown_to_a() {
        assert_eq!(encode_seq(b"acgtNXu"), vec![1, 2, 3, 4, 1, 1, 4]);
    }

    #[test]
    fn revcomp_code_roundtrip() {
        let seq = encode_seq(b"ACCGT");
        let rc = revcomp_code(&seq);
        assert_eq!(rc, vec![1, 2, 3, 3, 4]); // ACGGT
        assert_eq!(revcomp_code(&rc), seq);
    }

    #[test]
    fn alphabet_roundtrip() {
        for a in 1..SIGMA as u8 {
            assert_eq!(to_alphabet(from_alphabet(a)), a);
        }
    }
}
