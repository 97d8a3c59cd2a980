use serde::{Deserialize, Serialize};

/// 后缀区间：已排序后缀行上的闭区间 [low, high]。
/// `low > high` 表示空区间（无剩余匹配）。值类型，只派生不修改。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Range {
    pub low: u64,
    pub high: u64,
}

impl Range {
    #[inline]
    pub fn new(low: u64, high: u64) -> Self {
        Self { low, high }
    }

    /// 空区间哨兵。
    #[inline]
    pub fn empty() -> Self {
        Self { low: 1, high: 0 }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.low > self.high
    }

    #[inline]
    pub fn size(&self) -> u64 {
        if self.is_empty() { 0 } else { self.high - self.low + 1 }
    }
}
