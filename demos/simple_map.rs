//! 演示如何在 library 模式下使用 sigalign-rust 进行信号比对。
//!
//! 运行方式：
//! ```bash
//! cargo run --example simple_map
//! ```

use sigalign_rust::index::fm::{Fmi, SampledFmi};
use sigalign_rust::io::events::Event;
use sigalign_rust::map::{SeedGraph, SeedGraphParams, Strand};
use sigalign_rust::model::kmer::seq_to_kmer_ids;
use sigalign_rust::model::{KmerModel, NormParams};
use sigalign_rust::util::dna;

fn main() -> anyhow::Result<()> {
    // 1. 构建参考序列（伪随机，足够长以保证 16-mer 近似唯一）
    let bases = [b'A', b'C', b'G', b'T'];
    let mut x: u32 = 7;
    let mut reference = Vec::with_capacity(2_000);
    for _ in 0..2_000 {
        x = x.wrapping_mul(1_103_515_245).wrapping_add(12_345);
        reference.push(bases[(x >> 16) as usize % 4]);
    }
    println!("参考长度: {} bp", reference.len());

    // 2. 构建正/负链 FM 索引
    let codes = dna::encode_seq(&reference);
    let fwd = SampledFmi::construct(&codes, 16)?;
    let rev = SampledFmi::construct(&dna::revcomp_code(&codes), 16)?;
    println!("FM 索引构建完成：文本长度={}, tally_gap={}", fwd.length(), fwd.tally_gap());

    // 3. 合成 k-mer 模型（实际使用中由孔道模型 TSV 载入：KmerModel::from_file）
    let k_model = 5;
    let n = 1usize << (2 * k_model);
    let levels: Vec<(f64, f64)> = (0..n).map(|id| (id as f64 * 2.0, 1.0)).collect();
    let model = KmerModel::from_table(k_model, &levels)?;
    println!("模型: {}-mer，{} 个 level", model.k(), model.kmer_count());

    // 4. 合成事件流：参考 [800, 840) 的无噪发射，外加一次停顿
    let ids = seq_to_kmer_ids(&codes, k_model);
    let mut events = Vec::new();
    for p in 800..840 {
        events.push(Event { mean: f64::from(ids[p]) * 2.0, stdev: 1.0, duration: 0.004 });
        if p == 820 {
            events.push(Event { mean: f64::from(ids[p]) * 2.0, stdev: 1.0, duration: 0.004 });
        }
    }
    println!("事件数: {}（含 1 次停顿）", events.len());

    // 5. 归一化参数：实际使用中由 read 的原始信号估计
    let norm = NormParams::identity();

    // 6. 双链种子图搜索：事件按新到旧喂入
    let params = SeedGraphParams { k: 24, event_window: 48, ..Default::default() };
    for (strand, fmi) in [(Strand::Fwd, &fwd), (Strand::Rev, &rev)] {
        let mut sg = SeedGraph::new(&model, fmi, norm, strand, params)?;
        let mut hits = Vec::new();
        for e in events.iter().rev() {
            hits.extend(sg.add_event(e));
        }
        println!("\n{strand} 链命中 {} 处:", hits.len());
        for h in &hits {
            // 负链坐标换算回正链
            let (start, end) = match h.strand {
                Strand::Fwd => (h.ref_start, h.ref_end),
                Strand::Rev => (fmi.length() - h.ref_end, fmi.length() - h.ref_start),
            };
            println!("  ref[{start}..{end}] 长度={} 得分={:.3}", h.length, h.score);
        }
    }

    println!("\n完成！");
    Ok(())
}
