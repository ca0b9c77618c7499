//! Built-in backends and the time-grid simulator for gridsim.
//!
//! # Modules
//!
//! - [`integrator`] — fixed-step integrators (`"euler"`, `"rk4"`)
//! - [`qp`] — QP (`"cholesky"`) and stabilized QP (`"qp"`) solvers
//! - [`plugins`] — plugin families and the process-wide tables that select
//!   backends by name
//! - [`simulation`] — the [`Simulator`] that samples an integrator over a
//!   time grid
//!
//! [`Simulator`]: simulation::Simulator

pub mod integrator;
pub mod plugins;
pub mod qp;
pub mod simulation;

pub use simulation::{Grid, OutputFunction, Simulator};
