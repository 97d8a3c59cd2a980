pub mod bwt;
pub mod fm;
pub mod range;
pub mod sa;
