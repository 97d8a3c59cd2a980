use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::{Read, Write};

use crate::error::{ConstructionError, LoadError};
use crate::index::range::Range;
use crate::index::{bwt, sa};
use crate::util::dna::SIGMA;

const INDEX_MAGIC: &[u8; 4] = b"SGFI";
const INDEX_VERSION: u32 = 1;

/// 全文索引能力：后缀区间的单字符回溯扩展与行定位。
///
/// 两个互换实现：[`SampledFmi`]（自建，occ/SA 均按 tally gap 采样）与
/// [`DenseFmi`]（包装外部已建好的 BWT + 完整后缀数组）。调用方只依赖
/// 本 trait，不区分实现。
pub trait Fmi {
    /// 匹配单字符后缀的整个区间。
    fn full_range(&self, sym: u8) -> Range;
    /// 回溯扩展一个字符；空区间入参必须原样返回空区间，不报错。
    fn extend(&self, range: Range, sym: u8) -> Range;
    /// 后缀数组查询：区间行号 -> 文本位置。
    fn locate(&self, row: u64) -> u64;
    /// 被索引的符号总数（不含哨兵）。
    fn length(&self) -> u64;
}

/// 自建 FM 索引：
/// - BWT + 每 `tally_gap` 行采样一次的 occ 表（块内顺扫补偿）；
/// - 按文本位置采样的稀疏 SA（`pos % tally_gap == 0`），LF 回走恢复，
///   单次 locate 至多走 `tally_gap` 步。
#[derive(Debug, Serialize, Deserialize)]
pub struct SampledFmi {
    version: u32,
    tally_gap: u32,
    /// C[i] = BWT 中字母 < i 的累计数量；末位为总长。
    c: Vec<u64>,
    bwt: Vec<u8>,
    /// occ 采样（按块存储，行优先展平）：tally[block * SIGMA + sym]
    tally: Vec<u64>,
    /// 稀疏 SA：行号 -> 文本位置（仅 pos % tally_gap == 0 的行）。
    sa_samples: HashMap<u64, u64>,
}

impl SampledFmi {
    /// 从编码序列（[1..SIGMA)，不含哨兵）构建；内部追加哨兵。
    pub fn construct(seq: &[u8], tally_gap: usize) -> Result<Self, ConstructionError> {
        if seq.is_empty() {
            return Err(ConstructionError::EmptyText);
        }
        if seq.len() >= u32::MAX as usize {
            return Err(ConstructionError::TextTooLong { len: seq.len() });
        }
        if tally_gap == 0 {
            return Err(ConstructionError::ZeroTallyGap);
        }

        let mut text = Vec::with_capacity(seq.len() + 1);
        text.extend_from_slice(seq);
        text.push(0);

        let sa_arr = sa::build_sa(&text);
        let bwt_arr = bwt::build_bwt(&text, &sa_arr);
        let n = bwt_arr.len();

        let mut freq = vec![0u64; SIGMA];
        for &ch in &bwt_arr {
            freq[ch as usize] += 1;
        }
        let mut c = vec![0u64; SIGMA + 1];
        for i in 0..SIGMA {
            c[i + 1] = c[i] + freq[i];
        }

        let num_blocks = n / tally_gap + 1;
        let mut tally = vec![0u64; num_blocks * SIGMA];
        let mut running = vec![0u64; SIGMA];
        for (i, &ch) in bwt_arr.iter().enumerate() {
            if i % tally_gap == 0 {
                tally[(i / tally_gap) * SIGMA..(i / tally_gap + 1) * SIGMA]
                    .copy_from_slice(&running);
            }
            running[ch as usize] += 1;
        }
        if n % tally_gap == 0 {
            let last = n / tally_gap;
            tally[last * SIGMA..(last + 1) * SIGMA].copy_from_slice(&running);
        }

        let gap = tally_gap as u64;
        let sa_samples: HashMap<u64, u64> = sa_arr
            .iter()
            .enumerate()
            .filter(|&(_, &pos)| u64::from(pos) % gap == 0)
            .map(|(row, &pos)| (row as u64, u64::from(pos)))
            .collect();

        Ok(Self {
            version: INDEX_VERSION,
            tally_gap: tally_gap as u32,
            c,
            bwt: bwt_arr,
            tally,
            sa_samples,
        })
    }

    pub fn tally_gap(&self) -> u32 {
        self.tally_gap
    }

    /// 返回 BWT[0..pos) 中 sym 的出现次数。
    #[inline]
    fn occ(&self, sym: u8, pos: u64) -> u64 {
        let gap = self.tally_gap as u64;
        let block = pos / gap;
        let mut count = self.tally[block as usize * SIGMA + sym as usize];
        for &ch in &self.bwt[(block * gap) as usize..pos as usize] {
            if ch == sym {
                count += 1;
            }
        }
        count
    }

    #[inline]
    fn lf(&self, row: u64) -> u64 {
        let sym = self.bwt[row as usize];
        self.c[sym as usize] + self.occ(sym, row)
    }

    pub fn save(&self, path: &str) -> Result<(), LoadError> {
        let mut f = std::fs::File::create(path)?;
        f.write_all(INDEX_MAGIC)?;
        bincode::serialize_into(&mut f, self)?;
        Ok(())
    }

    pub fn load(path: &str) -> Result<Self, LoadError> {
        let mut f = std::fs::File::open(path)?;
        let mut magic = [0u8; 4];
        f.read_exact(&mut magic)?;
        if &magic != INDEX_MAGIC {
            return Err(LoadError::BadMagic);
        }
        let idx: Self = bincode::deserialize_from(&mut f)?;
        if idx.version != INDEX_VERSION {
            return Err(LoadError::VersionMismatch {
                found: idx.version,
                expected: INDEX_VERSION,
            });
        }
        idx.validate()?;
        Ok(idx)
    }

    /// 载入后的一致性校验；采样间隔记录在文件里，错配即拒绝。
    fn validate(&self) -> Result<(), LoadError> {
        if self.tally_gap == 0 {
            return Err(LoadError::Corrupt("tally gap is zero".to_string()));
        }
        if self.c.len() != SIGMA + 1 {
            return Err(LoadError::Corrupt("C table has wrong arity".to_string()));
        }
        let n = self.bwt.len() as u64;
        if self.c[SIGMA] != n {
            return Err(LoadError::Corrupt(
                "C table total disagrees with BWT length".to_string(),
            ));
        }
        let expected_blocks = (self.bwt.len() / self.tally_gap as usize + 1) * SIGMA;
        if self.tally.len() != expected_blocks {
            return Err(LoadError::Corrupt(
                "tally table size disagrees with recorded gap".to_string(),
            ));
        }
        // 采样必须齐全：缺失的样本会让 locate 的 LF 回走失去终点
        let gap = u64::from(self.tally_gap);
        let expected_samples = ((n + gap - 1) / gap) as usize;
        if self.sa_samples.len() != expected_samples {
            return Err(LoadError::Corrupt(format!(
                "SA sample set has {} of {expected_samples} entries",
                self.sa_samples.len()
            )));
        }
        for (&row, &pos) in &self.sa_samples {
            if row >= n || pos >= n {
                return Err(LoadError::Corrupt("SA sample out of bounds".to_string()));
            }
            if pos % gap != 0 {
                return Err(LoadError::Corrupt("SA sample off the sampling grid".to_string()));
            }
        }
        Ok(())
    }
}

impl Fmi for SampledFmi {
    fn full_range(&self, sym: u8) -> Range {
        if sym == 0 || sym as usize >= SIGMA {
            return Range::empty();
        }
        let low = self.c[sym as usize];
        let high = self.c[sym as usize + 1];
        if low == high {
            Range::empty()
        } else {
            Range::new(low, high - 1)
        }
    }

    fn extend(&self, range: Range, sym: u8) -> Range {
        if range.is_empty() || sym == 0 || sym as usize >= SIGMA {
            return Range::empty();
        }
        let base = self.c[sym as usize];
        let low = base + self.occ(sym, range.low);
        let high = base + self.occ(sym, range.high + 1);
        if low == high {
            Range::empty()
        } else {
            Range::new(low, high - 1)
        }
    }

    fn locate(&self, row: u64) -> u64 {
        let mut cur = row;
        let mut steps = 0u64;
        loop {
            if let Some(&pos) = self.sa_samples.get(&cur) {
                return pos + steps;
            }
            cur = self.lf(cur);
            steps += 1;
        }
    }

    fn length(&self) -> u64 {
        self.bwt.len() as u64 - 1
    }
}

/// 包装外部已建好的索引组件（BWT + 完整 SA，教科书式稠密布局）。
/// 与 [`SampledFmi`] 行为完全一致，仅内部格式不同；occ 采用固定块宽。
#[derive(Debug)]
pub struct DenseFmi {
    c: Vec<u64>,
    bwt: Vec<u8>,
    block: usize,
    occ_samples: Vec<u64>,
    sa: Vec<u32>,
}

const DENSE_OCC_BLOCK: usize = 128;

impl DenseFmi {
    /// 采纳外部构建的 BWT 与后缀数组（均含哨兵行）。
    pub fn from_parts(bwt_arr: Vec<u8>, sa_arr: Vec<u32>) -> Result<Self, ConstructionError> {
        if bwt_arr.len() <= 1 {
            return Err(ConstructionError::EmptyText);
        }
        if bwt_arr.len() != sa_arr.len() {
            return Err(ConstructionError::PartsMismatch {
                bwt: bwt_arr.len(),
                sa: sa_arr.len(),
            });
        }
        let n = bwt_arr.len();

        let mut freq = vec![0u64; SIGMA];
        for &ch in &bwt_arr {
            freq[ch as usize] += 1;
        }
        let mut c = vec![0u64; SIGMA + 1];
        for i in 0..SIGMA {
            c[i + 1] = c[i] + freq[i];
        }

        let num_blocks = n / DENSE_OCC_BLOCK + 1;
        let mut occ_samples = vec![0u64; num_blocks * SIGMA];
        let mut running = vec![0u64; SIGMA];
        for (i, &ch) in bwt_arr.iter().enumerate() {
            if i % DENSE_OCC_BLOCK == 0 {
                occ_samples[(i / DENSE_OCC_BLOCK) * SIGMA..(i / DENSE_OCC_BLOCK + 1) * SIGMA]
                    .copy_from_slice(&running);
            }
            running[ch as usize] += 1;
        }
        if n % DENSE_OCC_BLOCK == 0 {
            let last = n / DENSE_OCC_BLOCK;
            occ_samples[last * SIGMA..(last + 1) * SIGMA].copy_from_slice(&running);
        }

        Ok(Self { c, bwt: bwt_arr, block: DENSE_OCC_BLOCK, occ_samples, sa: sa_arr })
    }

    /// 便捷构造：直接从编码序列走 SA -> BWT -> 包装。
    pub fn construct(seq: &[u8]) -> Result<Self, ConstructionError> {
        if seq.is_empty() {
            return Err(ConstructionError::EmptyText);
        }
        if seq.len() >= u32::MAX as usize {
            return Err(ConstructionError::TextTooLong { len: seq.len() });
        }
        let mut text = Vec::with_capacity(seq.len() + 1);
        text.extend_from_slice(seq);
        text.push(0);
        let sa_arr = sa::build_sa(&text);
        let bwt_arr = bwt::build_bwt(&text, &sa_arr);
        Self::from_parts(bwt_arr, sa_arr)
    }

    #[inline]
    fn occ(&self, sym: u8, pos: u64) -> u64 {
        let bi = pos as usize / self.block;
        let mut count = self.occ_samples[bi * SIGMA + sym as usize];
        for &ch in &self.bwt[bi * self.block..pos as usize] {
            if ch == sym {
                count += 1;
            }
        }
        count
    }
}

impl Fmi for DenseFmi {
    fn full_range(&self, sym: u8) -> Range {
        if sym == 0 || sym as usize >= SIGMA {
            return Range::empty();
        }
        let low = self.c[sym as usize];
        let high = self.c[sym as usize + 1];
        if low == high {
            Range::empty()
        } else {
            Range::new(low, high - 1)
        }
    }

    fn extend(&self, range: Range, sym: u8) -> Range {
        if range.is_empty() || sym == 0 || sym as usize >= SIGMA {
            return Range::empty();
        }
        let base = self.c[sym as usize];
        let low = base + self.occ(sym, range.low);
        let high = base + self.occ(sym, range.high + 1);
        if low == high {
            Range::empty()
        } else {
            Range::new(low, high - 1)
        }
    }

    fn locate(&self, row: u64) -> u64 {
        u64::from(self.sa[row as usize])
    }

    fn length(&self) -> u64 {
        self.bwt.len() as u64 - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::dna::encode_seq;

    fn lcg_seq(len: usize, seed: u32) -> Vec<u8> {
        let bases = [b'A', b'C', b'G', b'T'];
        let mut x = seed;
        let mut v = Vec::with_capacity(len);
        for _ in 0..len {
            x = x.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            v.push(bases[(x >> 16) as usize % 4]);
        }
        v
    }

    fn count_occurrences(hay: &[u8], needle: &[u8]) -> u64 {
        if needle.is_empty() || needle.len() > hay.len() {
            return 0;
        }
        hay.windows(needle.len()).filter(|w| w == &needle).count() as u64
    }

    fn backward_match<F: Fmi>(fmi: &F, pat: &[u8]) -> Range {
        let mut it = pat.iter().rev();
        let Some(&last) = it.next() else { return Range::empty() };
        let mut r = fmi.full_range(last);
        for &sym in it {
            r = fmi.extend(r, sym);
        }
        r
    }

    #[test]
    fn construct_rejects_bad_input() {
        assert!(matches!(
            SampledFmi::construct(&[], 4),
            Err(ConstructionError::EmptyText)
        ));
        assert!(matches!(
            SampledFmi::construct(&[1, 2, 3], 0),
            Err(ConstructionError::ZeroTallyGap)
        ));
    }

    #[test]
    fn substring_ranges_count_occurrences() {
        let seq = encode_seq(&lcg_seq(200, 99));
        let fmi = SampledFmi::construct(&seq, 8).unwrap();
        for start in (0..180).step_by(13) {
            for len in [1usize, 3, 7, 16] {
                let pat = &seq[start..start + len];
                let r = backward_match(&fmi, pat);
                assert_eq!(r.size(), count_occurrences(&seq, pat), "start={start} len={len}");
            }
        }
    }

    #[test]
    fn extend_never_grows_a_range() {
        let seq = encode_seq(&lcg_seq(150, 5));
        let fmi = SampledFmi::construct(&seq, 4).unwrap();
        for sym in 1..=4u8 {
            let r = fmi.full_range(sym);
            for child_sym in 1..=4u8 {
                let child = fmi.extend(r, child_sym);
                assert!(child.size() <= r.size());
            }
        }
    }

    #[test]
    fn extend_on_empty_range_is_a_noop() {
        let seq = encode_seq(b"ACGTACGT");
        let fmi = SampledFmi::construct(&seq, 2).unwrap();
        for sym in 0..=5u8 {
            assert!(fmi.extend(Range::empty(), sym).is_empty());
        }
    }

    #[test]
    fn locate_agrees_with_naive_sa_for_all_gaps() {
        let seq = encode_seq(&lcg_seq(200, 77));
        let mut text = seq.clone();
        text.push(0);
        let sa_arr = sa::build_sa(&text);
        for gap in [1usize, 2, 3, 5, 10, 64, 200] {
            let fmi = SampledFmi::construct(&seq, gap).unwrap();
            for (row, &pos) in sa_arr.iter().enumerate() {
                assert_eq!(fmi.locate(row as u64), u64::from(pos), "gap={gap} row={row}");
            }
        }
    }

    #[test]
    fn providers_are_interchangeable() {
        let seq = encode_seq(&lcg_seq(120, 11));
        let sampled = SampledFmi::construct(&seq, 6).unwrap();
        let dense = DenseFmi::construct(&seq).unwrap();
        assert_eq!(sampled.length(), dense.length());
        for sym in 1..=4u8 {
            assert_eq!(sampled.full_range(sym), dense.full_range(sym));
        }
        for start in (0..100).step_by(7) {
            let pat = &seq[start..start + 5];
            let rs = backward_match(&sampled, pat);
            let rd = backward_match(&dense, pat);
            assert_eq!(rs, rd);
            if !rs.is_empty() {
                let mut ps: Vec<u64> = (rs.low..=rs.high).map(|row| sampled.locate(row)).collect();
                let mut pd: Vec<u64> = (rd.low..=rd.high).map(|row| dense.locate(row)).collect();
                ps.sort_unstable();
                pd.sort_unstable();
                assert_eq!(ps, pd);
            }
        }
    }

    #[test]
    fn save_load_roundtrip_answers_identically() {
        let seq = encode_seq(&lcg_seq(100, 3));
        let fmi = SampledFmi::construct(&seq, 10).unwrap();
        let dir = std::env::temp_dir().join("sigalign_fm_roundtrip");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("ref.fmi");
        let path = path.to_str().unwrap();
        fmi.save(path).unwrap();

        let loaded = SampledFmi::load(path).unwrap();
        assert_eq!(loaded.tally_gap(), 10);
        assert_eq!(loaded.length(), fmi.length());
        for start in (0..80).step_by(9) {
            let pat = &seq[start..start + 6];
            assert_eq!(backward_match(&loaded, pat), backward_match(&fmi, pat));
        }
        for row in 0..fmi.length() + 1 {
            assert_eq!(loaded.locate(row), fmi.locate(row));
        }
    }

    #[test]
    fn load_rejects_thinned_sa_samples() {
        // 主体（BWT/C/tally）完好但 SA 采样缺失的文件必须拒载，
        // 否则首次 locate 会无限 LF 回走
        let seq = encode_seq(&lcg_seq(60, 21));
        let dir = std::env::temp_dir().join("sigalign_fm_thinned");
        std::fs::create_dir_all(&dir).unwrap();

        let mut fmi = SampledFmi::construct(&seq, 8).unwrap();
        fmi.sa_samples.clear();
        let path = dir.join("empty_samples.fmi");
        let path = path.to_str().unwrap();
        fmi.save(path).unwrap();
        assert!(matches!(SampledFmi::load(path), Err(LoadError::Corrupt(_))));

        let mut fmi = SampledFmi::construct(&seq, 8).unwrap();
        let &row = fmi.sa_samples.keys().next().unwrap();
        fmi.sa_samples.remove(&row);
        let path = dir.join("one_missing.fmi");
        let path = path.to_str().unwrap();
        fmi.save(path).unwrap();
        assert!(matches!(SampledFmi::load(path), Err(LoadError::Corrupt(_))));
    }

    #[test]
    fn load_rejects_bad_magic_and_truncation() {
        let dir = std::env::temp_dir().join("sigalign_fm_badfiles");
        std::fs::create_dir_all(&dir).unwrap();

        let bad_magic = dir.join("bad_magic.fmi");
        std::fs::write(&bad_magic, b"NOPE0000000000").unwrap();
        assert!(matches!(
            SampledFmi::load(bad_magic.to_str().unwrap()),
            Err(LoadError::BadMagic)
        ));

        let truncated = dir.join("truncated.fmi");
        std::fs::write(&truncated, b"SGFI\x01").unwrap();
        assert!(SampledFmi::load(truncated.to_str().unwrap()).is_err());
    }
}
