pub mod dae;
pub mod qp;

pub use dae::{Dae, DaeArgs, DaeFn};
pub use qp::QpStructure;
