//! # sigalign-rust
//!
//! 受 [UNCALLED](https://github.com/skovaka/UNCALLED) 启发的 Rust 版
//! 原始纳米孔信号比对器：跳过碱基识别，把事件级电流信号直接比对到参考序列。
//!
//! 本 crate 提供：
//!
//! - **索引构建**：FM 索引回溯搜索结构（后缀数组 + BWT + 采样 occ/SA），
//!   含自建与外部包装两种互换实现
//! - **发射模型**：孔道 k-mer 模型加载、逐 read 归一化与高斯发射打分
//! - **种子图**：逐事件推进的有界宽度束搜索，停顿/跳位容忍，促升即报告
//!
//! ## 快速示例
//!
//! ```rust,no_run
//! use sigalign_rust::index::fm::SampledFmi;
//! use sigalign_rust::io::events::Event;
//! use sigalign_rust::map::{SeedGraph, SeedGraphParams, Strand};
//! use sigalign_rust::model::{KmerModel, NormParams};
//! use sigalign_rust::util::dna;
//!
//! # fn main() -> anyhow::Result<()> {
//! // 构建索引与模型
//! let reference = dna::encode_seq(b"ACGTACGTAGCTGATCGTAGCTAGCTAGCTGAT");
//! let fmi = SampledFmi::construct(&reference, 16)?;
//! let model = KmerModel::from_file("r9_5mer.model")?;
//!
//! // 逐事件（新到旧）推进种子图
//! let mut sg = SeedGraph::new(
//!     &model, &fmi, NormParams::identity(), Strand::Fwd, SeedGraphParams::default(),
//! )?;
//! let event = Event { mean: 84.2, stdev: 1.1, duration: 0.004 };
//! for hit in sg.add_event(&event) {
//!     println!("{}\t{}\t{}\t{:.3}", hit.strand, hit.ref_start, hit.ref_end, hit.score);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## 模块说明
//!
//! - [`io`] — FASTA 参考与事件 TSV 解析
//! - [`index`] — FM 索引（后缀区间、后缀数组、BWT、两种索引实现）
//! - [`model`] — k-mer 发射模型与归一化参数估计
//! - [`map`] — 种子图搜索引擎与双链比对流程
//! - [`util`] — DNA 编码 / 反向互补等工具函数
//! - [`error`] — 错误分类（配置 / 构建 / 载入 / 跳过）

pub mod error;
pub mod index;
pub mod io;
pub mod map;
pub mod model;
pub mod util;
