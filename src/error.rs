use thiserror::Error;

/// 种子图构造参数非法。仅在构造时触发，只影响该实例。
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("minimum seed length k must be positive")]
    ZeroSeedLength,
    #[error("event window ({window}) must be at least the seed length ({k})")]
    WindowTooSmall { window: u32, k: u32 },
    #[error("{name} must be finite, got {value}")]
    NonFiniteThreshold { name: &'static str, value: f64 },
    #[error("max_hits must be positive")]
    ZeroMaxHits,
}

/// 索引构建失败，对需要该索引的整次运行是致命的。
#[derive(Debug, Error)]
pub enum ConstructionError {
    #[error("cannot index an empty sequence")]
    EmptyText,
    #[error("sequence of {len} symbols exceeds the maximum indexable length")]
    TextTooLong { len: usize },
    #[error("tally gap must be positive")]
    ZeroTallyGap,
    #[error("BWT and suffix array disagree in length ({bwt} vs {sa})")]
    PartsMismatch { bwt: usize, sa: usize },
}

/// 持久化索引反序列化失败。损坏或版本不符的文件绝不产出可用但错误的索引。
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("not a sigalign index file (bad magic)")]
    BadMagic,
    #[error("unsupported index format version {found} (expected {expected})")]
    VersionMismatch { found: u32, expected: u32 },
    #[error("index file is internally inconsistent: {0}")]
    Corrupt(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("index decoding failed: {0}")]
    Codec(#[from] bincode::Error),
}

/// 单个输入 read 被跳过的原因；记录警告后继续处理其余输入。
#[derive(Debug, Error)]
pub enum InputSkipped {
    #[error("cannot open '{path}': {source}")]
    Unreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("'{path}' does not contain any signal events")]
    NoEvents { path: String },
    #[error("'{path}' line {line}: malformed event row")]
    MalformedRow { path: String, line: usize },
}
