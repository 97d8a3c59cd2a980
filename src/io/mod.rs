pub mod events;
pub mod fasta;
