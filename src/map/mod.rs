pub mod seed_graph;

pub use seed_graph::{SeedGraph, SeedGraphParams, SeedHit, Strand};

use anyhow::{Context, Result};
use rayon::prelude::*;
use std::time::Instant;
use tracing::{info, warn};

use crate::index::fm::{DenseFmi, Fmi, SampledFmi};
use crate::io::events::{read_events_file, Event};
use crate::io::fasta::FastaReader;
use crate::model::KmerModel;
use crate::util::dna;

#[derive(Debug, Clone)]
pub struct MapOpt {
    pub tally_gap: usize,
    /// 已持久化索引的前缀；为空则从参考现场构建。
    pub index_prefix: Option<String>,
    /// 选用稠密后缀数组实现（外部构建的互换索引）。
    pub dense: bool,
    pub threads: usize,
    pub params: SeedGraphParams,
}

/// 读取参考 FASTA 并拼接为单一编码序列（多条记录首尾相接）。
pub fn load_reference(path: &str) -> Result<Vec<u8>> {
    let fh = std::fs::File::open(path)
        .with_context(|| format!("cannot open reference FASTA '{path}'"))?;
    let records = FastaReader::new(std::io::BufReader::new(fh)).read_all()?;
    let mut seq = Vec::new();
    for rec in &records {
        seq.extend(dna::encode_seq(&rec.seq));
    }
    info!(sequences = records.len(), total_len = seq.len(), "reference parsed");
    Ok(seq)
}

/// 构建正/负链索引并持久化（`<prefix>.fwd.fmi` / `<prefix>.rev.fmi`）。
pub fn run_index(reference: &str, output: &str, tally_gap: usize) -> Result<()> {
    let seq = load_reference(reference)?;

    info!("building forward index");
    let fwd = SampledFmi::construct(&seq, tally_gap)
        .with_context(|| format!("cannot index '{reference}'"))?;
    info!("building reverse index");
    let rev = SampledFmi::construct(&dna::revcomp_code(&seq), tally_gap)
        .with_context(|| format!("cannot index '{reference}'"))?;

    let fwd_path = format!("{output}.fwd.fmi");
    let rev_path = format!("{output}.rev.fmi");
    fwd.save(&fwd_path).with_context(|| format!("cannot write index to '{fwd_path}'"))?;
    rev.save(&rev_path).with_context(|| format!("cannot write index to '{rev_path}'"))?;

    println!("reference: {reference}");
    println!("indexed_len: {}", fwd.length());
    println!("tally_gap: {tally_gap}");
    println!("built: {}", chrono::Utc::now().to_rfc3339());
    println!("index saved: {fwd_path} {rev_path}");
    Ok(())
}

/// 对每个 read 文件做双链信号比对，结果行写 stdout，计时与警告走 stderr。
/// 单个 read 的缺失/损坏只跳过该 read，不中断整次运行。
pub fn run_map(reference: &str, model_path: &str, reads: &[String], opt: &MapOpt) -> Result<()> {
    opt.params.validate().context("invalid seed graph parameters")?;
    if opt.threads > 0 {
        rayon::ThreadPoolBuilder::new().num_threads(opt.threads).build_global().ok();
    }

    info!("loading model");
    let model = KmerModel::from_file(model_path)
        .with_context(|| format!("cannot load k-mer model '{model_path}'"))?;

    if let Some(prefix) = &opt.index_prefix {
        let fwd_path = format!("{prefix}.fwd.fmi");
        let rev_path = format!("{prefix}.rev.fmi");
        info!("loading indexes");
        let fwd = SampledFmi::load(&fwd_path)
            .with_context(|| format!("cannot load index '{fwd_path}'"))?;
        let rev = SampledFmi::load(&rev_path)
            .with_context(|| format!("cannot load index '{rev_path}'"))?;
        if fwd.tally_gap() as usize != opt.tally_gap {
            warn!(
                recorded = fwd.tally_gap(),
                requested = opt.tally_gap,
                "index was built with a different tally gap; the recorded one applies"
            );
        }
        return map_reads(&model, &fwd, &rev, reads, opt);
    }

    let seq = load_reference(reference)?;
    if opt.dense {
        info!("building forward index (dense)");
        let fwd = DenseFmi::construct(&seq)?;
        info!("building reverse index (dense)");
        let rev = DenseFmi::construct(&dna::revcomp_code(&seq))?;
        map_reads(&model, &fwd, &rev, reads, opt)
    } else {
        info!("building forward index");
        let fwd = SampledFmi::construct(&seq, opt.tally_gap)?;
        info!("building reverse index");
        let rev = SampledFmi::construct(&dna::revcomp_code(&seq), opt.tally_gap)?;
        map_reads(&model, &fwd, &rev, reads, opt)
    }
}

fn map_reads<F: Fmi + Sync>(
    model: &KmerModel,
    fwd: &F,
    rev: &F,
    reads: &[String],
    opt: &MapOpt,
) -> Result<()> {
    // 索引只读共享，read 间并行；输出按输入顺序逐块打印保证确定性
    let blocks: Vec<Vec<String>> = reads
        .par_iter()
        .map(|path| match map_one_read(model, fwd, rev, path, &opt.params) {
            Ok(lines) => lines,
            Err(skip) => {
                warn!("{skip}, skipping");
                Vec::new()
            }
        })
        .collect();

    let mut out = std::io::stdout().lock();
    use std::io::Write;
    for block in blocks {
        for line in block {
            writeln!(out, "{line}")?;
        }
    }
    Ok(())
}

fn map_one_read<F: Fmi>(
    model: &KmerModel,
    fwd: &F,
    rev: &F,
    path: &str,
    params: &SeedGraphParams,
) -> std::result::Result<Vec<String>, crate::error::InputSkipped> {
    let events = read_events_file(path)?;
    let norm = model.estimate_norm_params(&events);

    let mut lines = Vec::new();
    for (strand, fmi) in [(Strand::Rev, rev), (Strand::Fwd, fwd)] {
        let timer = Instant::now();
        let hits = align_strand(model, fmi, strand, &events, norm, params);
        for h in hits {
            let (start, end) = genomic_coords(&h, fmi.length());
            lines.push(format!(
                "{}\t{}\t{}\t{}\t{}\t{:.3}",
                h.strand, path, start, end, h.length, h.score
            ));
        }
        info!(read = path, %strand, elapsed_ms = timer.elapsed().as_millis(), "strand mapped");
    }
    Ok(lines)
}

/// 单链比对：事件按新到旧喂入（回溯扩展向参考左侧推进）。
fn align_strand<F: Fmi>(
    model: &KmerModel,
    fmi: &F,
    strand: Strand,
    events: &[Event],
    norm: crate::model::NormParams,
    params: &SeedGraphParams,
) -> Vec<SeedHit> {
    // 参数在 run_map 入口已校验过，这里的构造不会失败
    let Ok(mut sg) = SeedGraph::new(model, fmi, norm, strand, *params) else {
        return Vec::new();
    };
    let mut hits = Vec::new();
    for e in events.iter().rev() {
        hits.extend(sg.add_event(e));
    }
    hits
}

/// 负链命中换算回正链基因组坐标；正链原样返回。
fn genomic_coords(hit: &SeedHit, indexed_len: u64) -> (u64, u64) {
    match hit.strand {
        Strand::Fwd => (hit.ref_start, hit.ref_end),
        Strand::Rev => (indexed_len - hit.ref_end, indexed_len - hit.ref_start),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NormParams;

    #[test]
    fn rev_strand_hits_map_back_to_forward_coords() {
        let hit = SeedHit { strand: Strand::Rev, ref_start: 10, ref_end: 42, length: 32, score: 0.0 };
        assert_eq!(genomic_coords(&hit, 100), (58, 90));
        let hit = SeedHit { strand: Strand::Fwd, ..hit };
        assert_eq!(genomic_coords(&hit, 100), (10, 42));
    }

    #[test]
    fn align_strand_feeds_events_newest_first() {
        // 正向事件流（旧到新）经 align_strand 反转后与直接倒喂 add_event 等价
        let k_model = 4;
        let n = 1usize << (2 * k_model);
        let levels: Vec<(f64, f64)> = (0..n).map(|id| (id as f64 * 10.0, 1.0)).collect();
        let model = KmerModel::from_table(k_model, &levels).unwrap();

        let bases = [b'A', b'C', b'G', b'T'];
        let mut x = 77u32;
        let mut refseq = Vec::with_capacity(500);
        for _ in 0..500 {
            x = x.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            refseq.push(bases[(x >> 16) as usize % 4]);
        }
        let seq = dna::encode_seq(&refseq);
        let fmi = SampledFmi::construct(&seq, 8).unwrap();

        let ids = crate::model::kmer::seq_to_kmer_ids(&seq, k_model);
        let events: Vec<Event> = (300..320)
            .map(|p| Event { mean: f64::from(ids[p]) * 10.0, stdev: 1.0, duration: 0.004 })
            .collect();

        let params = SeedGraphParams {
            k: 16,
            event_window: 32,
            min_step_prob: -4.0,
            ..Default::default()
        };
        let hits = align_strand(
            &model,
            &fmi,
            Strand::Fwd,
            &events,
            NormParams::identity(),
            &params,
        );
        assert!(!hits.is_empty());
        // 20 个事件、k=16：最早促升覆盖 [300+20-16, 320)
        assert!(hits.iter().any(|h| h.ref_start == 304 && h.ref_end == 320));
    }
}
