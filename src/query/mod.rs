pub mod eval;
pub mod plan;
