use std::collections::HashMap;

use crate::error::ConfigError;
use crate::index::fm::Fmi;
use crate::index::range::Range;
use crate::io::events::Event;
use crate::model::{KmerModel, NormParams};
use crate::util::dna::BASES;

/// 搜索方向：正链或反向互补链（各自对应一个独立索引实例）。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strand {
    Fwd,
    Rev,
}

impl std::fmt::Display for Strand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Strand::Fwd => write!(f, "fwd"),
            Strand::Rev => write!(f, "rev"),
        }
    }
}

/// 种子图参数。阈值与惩罚均为对数概率（<= 0）。
///
/// 剪枝规则（本实现的既定选择）：绝对每步阈值——一个子种子被丢弃，
/// 当且仅当其区间为空或本步得分低于 `min_step_prob`；不与当轮最优比较。
/// 促升规则：`length >= k` 且区间行数 `<= max_hits` 即促升。
#[derive(Debug, Clone, Copy)]
pub struct SeedGraphParams {
    /// 最小种子长度（促升所需的事件数）。
    pub k: u32,
    /// 种子最长存活事件数；到期未促升即退役。
    pub event_window: u32,
    /// 绝对每步得分阈值。
    pub min_step_prob: f64,
    /// 停顿惩罚：事件重复发射上一个 k-mer。
    pub stay_penalty: f64,
    /// 跳位惩罚：事件归属于尚未解析的下一个 k-mer。
    pub skip_penalty: f64,
    /// 促升时允许的最大区间行数。
    pub max_hits: u64,
}

impl Default for SeedGraphParams {
    fn default() -> Self {
        Self {
            k: 32,
            event_window: 64,
            min_step_prob: -9.2103,
            stay_penalty: -3.75,
            skip_penalty: -5.2983,
            max_hits: 10,
        }
    }
}

impl SeedGraphParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.k == 0 {
            return Err(ConfigError::ZeroSeedLength);
        }
        if self.event_window < self.k {
            return Err(ConfigError::WindowTooSmall { window: self.event_window, k: self.k });
        }
        for (name, value) in [
            ("min_step_prob", self.min_step_prob),
            ("stay_penalty", self.stay_penalty),
            ("skip_penalty", self.skip_penalty),
        ] {
            if !value.is_finite() {
                return Err(ConfigError::NonFiniteThreshold { name, value });
            }
        }
        if self.max_hits == 0 {
            return Err(ConfigError::ZeroMaxHits);
        }
        Ok(())
    }
}

/// 在途候选比对：锚定在一个后缀区间上的部分匹配。
/// 上下文记录匹配串最前端（最新）的至多 k_model 个碱基，供发射打分。
#[derive(Debug, Clone)]
struct Seed {
    range: Range,
    length: u32,
    ctx: u32,
    ctx_len: usize,
    score: f64,
}

/// 促升产出的终态结果；坐标为该链索引的文本坐标。
#[derive(Debug, Clone, PartialEq)]
pub struct SeedHit {
    pub strand: Strand,
    pub ref_start: u64,
    pub ref_end: u64,
    pub length: u32,
    pub score: f64,
}

/// 种子图：每个事件推进一轮的有界宽度束搜索。
///
/// 调用方按新到旧的顺序逐事件调用 [`add_event`](Self::add_event)
/// （回溯扩展向参考左侧推进）。单个实例不可并发修改；
/// 并行化按 read/链 各建一个实例，共享只读索引。
pub struct SeedGraph<'a, F: Fmi> {
    model: &'a KmerModel,
    fmi: &'a F,
    norm: NormParams,
    strand: Strand,
    params: SeedGraphParams,
    active: Vec<Seed>,
    /// 已报告的参考区间；后续与之重叠的促升一律抑制，
    /// 避免同一锚点的影子种子逐事件重复报告。
    emitted: Vec<(u64, u64)>,
}

impl<'a, F: Fmi> SeedGraph<'a, F> {
    pub fn new(
        model: &'a KmerModel,
        fmi: &'a F,
        norm: NormParams,
        strand: Strand,
        params: SeedGraphParams,
    ) -> Result<Self, ConfigError> {
        params.validate()?;
        Ok(Self { model, fmi, norm, strand, params, active: Vec::new(), emitted: Vec::new() })
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// 本步得分：三个转移假设取最优，各假设都用事件打分且 <= 0，
    /// 因此种子总分单调不增。
    fn step_score(
        &self,
        parent_ctx: u32,
        parent_ctx_len: usize,
        child_ctx: u32,
        child_ctx_len: usize,
        norm_mean: f64,
    ) -> f64 {
        let moved = self.model.log_prob_partial(child_ctx, child_ctx_len, norm_mean);
        let stayed = if parent_ctx_len > 0 {
            self.params.stay_penalty
                + self.model.log_prob_partial(parent_ctx, parent_ctx_len, norm_mean)
        } else {
            f64::NEG_INFINITY
        };
        let skipped =
            self.params.skip_penalty + self.model.log_prob_skip(child_ctx, child_ctx_len, norm_mean);
        moved.max(stayed).max(skipped)
    }

    /// 推进一个事件：扩展所有在途种子并锚定新种子，剪枝后促升终态者。
    /// 区间异常一律以剪枝吸收，绝不报错。
    pub fn add_event(&mut self, event: &Event) -> Vec<SeedHit> {
        let norm_mean = self.norm.apply(event.mean);
        let mut next: HashMap<(u64, u64, u32), Seed> = HashMap::new();
        let mut candidates: Vec<SeedHit> = Vec::new();

        let parents = std::mem::take(&mut self.active);
        for parent in &parents {
            for &b in &BASES {
                let range = self.fmi.extend(parent.range, b);
                self.spawn_child(parent, b, range, norm_mean, &mut next, &mut candidates);
            }
        }
        // 每事件同时锚定新的单碱基种子
        let anchor = Seed { range: Range::empty(), length: 0, ctx: 0, ctx_len: 0, score: 0.0 };
        for &b in &BASES {
            let range = self.fmi.full_range(b);
            self.spawn_child(&anchor, b, range, norm_mean, &mut next, &mut candidates);
        }

        self.active = next.into_values().collect();

        // 促升结果按基因组位置升序报告；与已报告区间重叠者抑制
        candidates.sort_by(|a, b| {
            a.ref_start
                .cmp(&b.ref_start)
                .then(b.length.cmp(&a.length))
                .then(b.score.total_cmp(&a.score))
        });
        let mut hits = Vec::new();
        for cand in candidates {
            let overlaps = self
                .emitted
                .iter()
                .any(|&(s, e)| cand.ref_start < e && s < cand.ref_end);
            if overlaps {
                continue;
            }
            self.emitted.push((cand.ref_start, cand.ref_end));
            hits.push(cand);
        }
        hits
    }

    /// 生成一个子种子：剪枝（空区间 / 低于阈值）、促升或并入下一代。
    fn spawn_child(
        &self,
        parent: &Seed,
        b: u8,
        range: Range,
        norm_mean: f64,
        next: &mut HashMap<(u64, u64, u32), Seed>,
        candidates: &mut Vec<SeedHit>,
    ) {
        if range.is_empty() {
            return;
        }

        let (ctx, ctx_len) = self.model.extend_context(parent.ctx, parent.ctx_len, b);
        let step = self.step_score(parent.ctx, parent.ctx_len, ctx, ctx_len, norm_mean);
        if step < self.params.min_step_prob {
            return;
        }

        let child = Seed {
            range,
            length: parent.length + 1,
            ctx,
            ctx_len,
            score: parent.score + step,
        };

        if child.length >= self.params.k && child.range.size() <= self.params.max_hits {
            for row in child.range.low..=child.range.high {
                let start = self.fmi.locate(row);
                candidates.push(SeedHit {
                    strand: self.strand,
                    ref_start: start,
                    ref_end: start + u64::from(child.length),
                    length: child.length,
                    score: child.score,
                });
            }
            return; // 促升即离开活跃集
        }
        if child.length >= self.params.event_window {
            return; // 窗口耗尽，退役
        }

        // 相同 (区间, 长度) 锚点合并，保留最优得分
        let key = (child.range.low, child.range.high, child.length);
        match next.entry(key) {
            std::collections::hash_map::Entry::Occupied(mut e) => {
                if child.score > e.get().score {
                    e.insert(child);
                }
            }
            std::collections::hash_map::Entry::Vacant(e) => {
                e.insert(child);
            }
        }
    }
}
