pub mod kmer;

pub use kmer::{KmerModel, ModelError, NormParams};
