use std::io::BufRead;
use thiserror::Error;

use crate::io::events::Event;

/// 每条 read 的归一化参数：normalized = scale * raw + shift。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormParams {
    pub shift: f64,
    pub scale: f64,
}

impl NormParams {
    /// 恒等归一化，事件已在模型坐标系时使用。
    pub fn identity() -> Self {
        Self { shift: 0.0, scale: 1.0 }
    }

    #[inline]
    pub fn apply(&self, raw_mean: f64) -> f64 {
        self.scale * raw_mean + self.shift
    }
}

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model file has no k-mer rows")]
    Empty,
    #[error("unsupported k-mer length {0} (expected 1..=8)")]
    UnsupportedK(usize),
    #[error("line {line}: malformed model row")]
    MalformedRow { line: usize },
    #[error("duplicate k-mer '{0}'")]
    DuplicateKmer(String),
    #[error("model table is incomplete: {present} of {expected} k-mers present")]
    Incomplete { present: usize, expected: usize },
    #[error("level_stdv must be positive (k-mer '{0}')")]
    BadStdv(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// 孔道 k-mer 模型：每个 k-mer 的期望电流分布（level_mean/level_stdv），
/// 外加各前缀长度的混合边缘分布，供上下文尚未凑满 k 个碱基的种子打分。
///
/// 发射打分统一减去峰值密度，使每步贡献 <= 0，保证种子分数单调不增。
#[derive(Debug, Clone)]
pub struct KmerModel {
    k: usize,
    level_mean: Vec<f64>,
    level_stdv: Vec<f64>,
    /// partial_mean[j-1][ctx]：前 j 个碱基为 ctx 的所有 k-mer 的混合均值。
    partial_mean: Vec<Vec<f64>>,
    partial_stdv: Vec<Vec<f64>>,
    /// skip_mean[j-1][ctx]：首碱基未知、随后 j 个碱基为 ctx 的混合均值。
    skip_mean: Vec<Vec<f64>>,
    skip_stdv: Vec<Vec<f64>>,
    model_mean: f64,
    model_stdv: f64,
}

impl KmerModel {
    /// 从完整的 level 表构建；levels[id] = (level_mean, level_stdv)，
    /// id 为高位在前的 base-4 编码（A=0, C=1, G=2, T=3）。
    pub fn from_table(k: usize, levels: &[(f64, f64)]) -> Result<Self, ModelError> {
        if k == 0 || k > 8 {
            return Err(ModelError::UnsupportedK(k));
        }
        let expected = 1usize << (2 * k);
        if levels.len() != expected {
            return Err(ModelError::Incomplete { present: levels.len(), expected });
        }

        let mut level_mean = Vec::with_capacity(expected);
        let mut level_stdv = Vec::with_capacity(expected);
        for (id, &(mean, stdv)) in levels.iter().enumerate() {
            if !(stdv > 0.0) {
                return Err(ModelError::BadStdv(kmer_to_string(id as u32, k)));
            }
            level_mean.push(mean);
            level_stdv.push(stdv);
        }

        // 混合边缘：把桶内各 k-mer 当作等权高斯分量
        let mixture = |bucket_of: &dyn Fn(usize) -> usize, buckets: usize| {
            let mut sum = vec![0.0f64; buckets];
            let mut sum_sq = vec![0.0f64; buckets];
            let mut count = vec![0u32; buckets];
            for id in 0..expected {
                let b = bucket_of(id);
                sum[b] += level_mean[id];
                sum_sq[b] += level_stdv[id] * level_stdv[id] + level_mean[id] * level_mean[id];
                count[b] += 1;
            }
            let mut means = Vec::with_capacity(buckets);
            let mut stdvs = Vec::with_capacity(buckets);
            for b in 0..buckets {
                let n = f64::from(count[b]).max(1.0);
                let m = sum[b] / n;
                let var = (sum_sq[b] / n - m * m).max(1e-6);
                means.push(m);
                stdvs.push(var.sqrt());
            }
            (means, stdvs)
        };

        // 前缀边缘：共享前 j 个碱基（种子上下文未满 k 时的发射）
        let mut partial_mean = Vec::with_capacity(k - 1);
        let mut partial_stdv = Vec::with_capacity(k - 1);
        // 跳位边缘：首碱基未知、其后 j 个碱基已知（skip 假设的发射）
        let mut skip_mean = Vec::with_capacity(k - 1);
        let mut skip_stdv = Vec::with_capacity(k - 1);
        for j in 1..k {
            let buckets = 1usize << (2 * j);
            let prefix_shift = 2 * (k - j);
            let (pm, ps) = mixture(&|id| id >> prefix_shift, buckets);
            partial_mean.push(pm);
            partial_stdv.push(ps);
            let mid_shift = 2 * (k - 1 - j);
            let mask = buckets - 1;
            let (sm, ss) = mixture(&|id| (id >> mid_shift) & mask, buckets);
            skip_mean.push(sm);
            skip_stdv.push(ss);
        }

        let model_mean = level_mean.iter().sum::<f64>() / expected as f64;
        let var = level_mean.iter().map(|m| (m - model_mean) * (m - model_mean)).sum::<f64>()
            / expected as f64;
        let model_stdv = var.sqrt().max(1e-9);

        Ok(Self {
            k,
            level_mean,
            level_stdv,
            partial_mean,
            partial_stdv,
            skip_mean,
            skip_stdv,
            model_mean,
            model_stdv,
        })
    }

    /// 解析标准孔道模型 TSV：`kmer  level_mean  level_stdv [sd_mean sd_stdv]`。
    /// 允许 `#` 注释与一行表头；要求 4^k 行齐全。
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self, ModelError> {
        let mut k = 0usize;
        let mut rows: Vec<Option<(f64, f64)>> = Vec::new();
        let mut present = 0usize;

        for (lineno, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut fields = line.split_whitespace();
            let kmer = fields.next().ok_or(ModelError::MalformedRow { line: lineno + 1 })?;
            if kmer.eq_ignore_ascii_case("kmer") {
                continue; // 表头
            }
            let mean: f64 = fields
                .next()
                .and_then(|s| s.parse().ok())
                .ok_or(ModelError::MalformedRow { line: lineno + 1 })?;
            let stdv: f64 = fields
                .next()
                .and_then(|s| s.parse().ok())
                .ok_or(ModelError::MalformedRow { line: lineno + 1 })?;

            if rows.is_empty() {
                k = kmer.len();
                if k == 0 || k > 8 {
                    return Err(ModelError::UnsupportedK(k));
                }
                rows = vec![None; 1 << (2 * k)];
            }
            let id = kmer_from_str(kmer, k)
                .ok_or(ModelError::MalformedRow { line: lineno + 1 })?;
            if rows[id as usize].is_some() {
                return Err(ModelError::DuplicateKmer(kmer.to_string()));
            }
            rows[id as usize] = Some((mean, stdv));
            present += 1;
        }

        if rows.is_empty() {
            return Err(ModelError::Empty);
        }
        let expected = rows.len();
        if present != expected {
            return Err(ModelError::Incomplete { present, expected });
        }
        let levels: Vec<(f64, f64)> = rows.into_iter().map(|r| r.unwrap()).collect();
        Self::from_table(k, &levels)
    }

    pub fn from_file(path: &str) -> Result<Self, ModelError> {
        let f = std::fs::File::open(path)?;
        Self::from_reader(std::io::BufReader::new(f))
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn kmer_count(&self) -> u64 {
        self.level_mean.len() as u64
    }

    /// 完整 k-mer 发射：归一化事件均值的高斯对数密度，平移至峰值为 0。
    #[inline]
    pub fn log_prob(&self, kmer_id: u32, norm_mean: f64) -> f64 {
        let mu = self.level_mean[kmer_id as usize];
        let sigma = self.level_stdv[kmer_id as usize];
        let z = (norm_mean - mu) / sigma;
        -0.5 * z * z
    }

    /// 部分上下文发射：仅已知 k-mer 的前 ctx_len 个碱基时，
    /// 用对应前缀的混合边缘分布打分。ctx_len >= k 时退化为完整发射。
    #[inline]
    pub fn log_prob_partial(&self, ctx_id: u32, ctx_len: usize, norm_mean: f64) -> f64 {
        if ctx_len >= self.k {
            return self.log_prob(ctx_id, norm_mean);
        }
        debug_assert!(ctx_len >= 1);
        let mu = self.partial_mean[ctx_len - 1][ctx_id as usize];
        let sigma = self.partial_stdv[ctx_len - 1][ctx_id as usize];
        let z = (norm_mean - mu) / sigma;
        -0.5 * z * z
    }

    /// 跳位发射：事件归属于再往左一个、首碱基尚未解析的 k-mer，
    /// 已知的只有它后面的若干碱基（当前上下文的前缀）。
    #[inline]
    pub fn log_prob_skip(&self, ctx_id: u32, ctx_len: usize, norm_mean: f64) -> f64 {
        if self.k == 1 {
            let z = (norm_mean - self.model_mean) / self.model_stdv;
            return -0.5 * z * z;
        }
        debug_assert!(ctx_len >= 1);
        let j = ctx_len.min(self.k - 1);
        let ctx = ctx_id >> (2 * (ctx_len - j));
        let mu = self.skip_mean[j - 1][ctx as usize];
        let sigma = self.skip_stdv[j - 1][ctx as usize];
        let z = (norm_mean - mu) / sigma;
        -0.5 * z * z
    }

    /// 上下文前插一个碱基（编码 1..=4）：上下文记录 k-mer 的前若干碱基，
    /// 回溯扩展时最新碱基成为新首位，满 k 后丢弃最旧一位。
    #[inline]
    pub fn extend_context(&self, ctx_id: u32, ctx_len: usize, base: u8) -> (u32, usize) {
        let digit = u32::from(base - 1);
        if ctx_len < self.k {
            ((digit << (2 * ctx_len)) | ctx_id, ctx_len + 1)
        } else {
            ((digit << (2 * (self.k - 1))) | (ctx_id >> 2), self.k)
        }
    }

    /// 逐条 read 的矩匹配归一化：把原始事件均值分布映射到模型 level 分布。
    pub fn estimate_norm_params(&self, events: &[Event]) -> NormParams {
        if events.is_empty() {
            return NormParams::identity();
        }
        let n = events.len() as f64;
        let raw_mean = events.iter().map(|e| e.mean).sum::<f64>() / n;
        let raw_var =
            events.iter().map(|e| (e.mean - raw_mean) * (e.mean - raw_mean)).sum::<f64>() / n;
        let raw_sd = raw_var.sqrt();
        if raw_sd <= f64::EPSILON {
            return NormParams::identity();
        }
        let scale = self.model_stdv / raw_sd;
        let shift = self.model_mean - scale * raw_mean;
        NormParams { shift, scale }
    }
}

/// k-mer 字符串 -> 高位在前的 base-4 编码。
pub fn kmer_from_str(kmer: &str, k: usize) -> Option<u32> {
    if kmer.len() != k {
        return None;
    }
    let mut id = 0u32;
    for b in kmer.bytes() {
        let digit = match b.to_ascii_uppercase() {
            b'A' => 0,
            b'C' => 1,
            b'G' => 2,
            b'T' | b'U' => 3,
            _ => return None,
        };
        id = (id << 2) | digit;
    }
    Some(id)
}

pub fn kmer_to_string(id: u32, k: usize) -> String {
    let bases = [b'A', b'C', b'G', b'T'];
    (0..k)
        .map(|i| bases[((id >> (2 * (k - 1 - i))) & 3) as usize] as char)
        .collect()
}

/// 编码序列（1..=4）各位置起始 k-mer 的编号；末尾不足 k 的位置省略。
pub fn seq_to_kmer_ids(seq: &[u8], k: usize) -> Vec<u32> {
    if seq.len() < k {
        return Vec::new();
    }
    let mask = if k == 16 { u32::MAX } else { (1u32 << (2 * k)) - 1 };
    let mut ids = Vec::with_capacity(seq.len() - k + 1);
    let mut id = 0u32;
    for (i, &b) in seq.iter().enumerate() {
        id = ((id << 2) | u32::from(b - 1)) & mask;
        if i + 1 >= k {
            ids.push(id);
        }
    }
    ids
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn flat_model(k: usize) -> KmerModel {
        let n = 1usize << (2 * k);
        let levels: Vec<(f64, f64)> = (0..n).map(|id| (id as f64 * 10.0, 1.0)).collect();
        KmerModel::from_table(k, &levels).unwrap()
    }

    #[test]
    fn kmer_codec_roundtrip() {
        for (s, id) in [("AAAA", 0u32), ("AAAC", 1), ("TTTT", 255), ("GATC", 0b10_00_11_01)] {
            assert_eq!(kmer_from_str(s, 4), Some(id));
            assert_eq!(kmer_to_string(id, 4), s);
        }
        assert_eq!(kmer_from_str("ACGN", 4), None);
        assert_eq!(kmer_from_str("ACG", 4), None);
    }

    #[test]
    fn seq_kmer_ids_slide_forward() {
        // ACGT -> AC, CG, GT
        let seq = [1u8, 2, 3, 4];
        assert_eq!(seq_to_kmer_ids(&seq, 2), vec![0b0001, 0b0110, 0b1011]);
    }

    #[test]
    fn log_prob_peaks_at_zero() {
        let model = flat_model(2);
        for id in 0..16u32 {
            assert_eq!(model.log_prob(id, id as f64 * 10.0), 0.0);
            assert!(model.log_prob(id, id as f64 * 10.0 + 3.0) < 0.0);
        }
    }

    #[test]
    fn partial_marginal_covers_prefix_bucket() {
        let model = flat_model(3);
        // 前缀 A（j=1）：覆盖 id 0..16，均值应为它们 level 的平均
        let expected = (0..16).map(|i| i as f64 * 10.0).sum::<f64>() / 16.0;
        let lp_at_expected = model.log_prob_partial(0, 1, expected);
        assert!(lp_at_expected > model.log_prob_partial(0, 1, expected + 500.0));
        assert_eq!(lp_at_expected, 0.0);
    }

    #[test]
    fn skip_marginal_ignores_unresolved_first_base() {
        let model = flat_model(2);
        // 已知上下文 "C"：跳位 k-mer 为 ?C，即 {AC,CC,GC,TC}，
        // level 为 {10,50,90,130}，混合均值 70
        let ctx = kmer_from_str("C", 1).unwrap();
        assert_eq!(model.log_prob_skip(ctx, 1, 70.0), 0.0);
        assert!(model.log_prob_skip(ctx, 1, 200.0) < model.log_prob_skip(ctx, 1, 70.0));
    }

    #[test]
    fn extend_context_prepends_newest_base() {
        let model = flat_model(3);
        // 空上下文 -> "G"
        let (ctx, len) = model.extend_context(0, 0, 3);
        assert_eq!((ctx, len), (kmer_from_str("G", 1).unwrap(), 1));
        // 前插 C -> "CG"
        let (ctx, len) = model.extend_context(ctx, len, 2);
        assert_eq!(kmer_to_string(ctx, 2), "CG");
        assert_eq!(len, 2);
        // 前插 T -> "TCG"（满 k）
        let (ctx, len) = model.extend_context(ctx, len, 4);
        assert_eq!(kmer_to_string(ctx, 3), "TCG");
        assert_eq!(len, 3);
        // 再前插 A -> "ATC"，最旧的 G 被挤出
        let (ctx, len) = model.extend_context(ctx, len, 1);
        assert_eq!(kmer_to_string(ctx, 3), "ATC");
        assert_eq!(len, 3);
    }

    #[test]
    fn tsv_roundtrip_and_validation() {
        let mut tsv = String::from("#ONT pore model\nkmer\tlevel_mean\tlevel_stdv\n");
        for id in 0..16u32 {
            tsv.push_str(&format!("{}\t{}\t{}\n", kmer_to_string(id, 2), id as f64 * 5.0, 1.5));
        }
        let model = KmerModel::from_reader(Cursor::new(tsv.as_bytes())).unwrap();
        assert_eq!(model.k(), 2);
        assert_eq!(model.kmer_count(), 16);
        assert_eq!(model.log_prob(kmer_from_str("CA", 2).unwrap(), 20.0), 0.0);

        // 缺行
        let partial: String = tsv.lines().take(10).collect::<Vec<_>>().join("\n");
        assert!(matches!(
            KmerModel::from_reader(Cursor::new(partial.as_bytes())),
            Err(ModelError::Incomplete { .. })
        ));

        // 重复行
        let dup = format!("{}AA\t0.0\t1.0\n", tsv);
        assert!(matches!(
            KmerModel::from_reader(Cursor::new(dup.as_bytes())),
            Err(ModelError::DuplicateKmer(_))
        ));
    }

    #[test]
    fn norm_params_recover_moment_match() {
        let model = flat_model(2);
        // 原始事件 = 模型坐标 * 2 + 30，估计出的参数应把它还原
        let in_model: Vec<f64> = (0..16).map(|i| i as f64 * 10.0).collect();
        let events: Vec<Event> = in_model
            .iter()
            .map(|&m| Event { mean: (m - 30.0) / 2.0, stdev: 1.0, duration: 0.01 })
            .collect();
        let norm = model.estimate_norm_params(&events);
        for (&m, e) in in_model.iter().zip(&events) {
            assert!((norm.apply(e.mean) - m).abs() < 1e-6);
        }
    }

    #[test]
    fn empty_events_fall_back_to_identity() {
        let model = flat_model(2);
        assert_eq!(model.estimate_norm_params(&[]), NormParams::identity());
    }
}
