//! Core traits and types for gridsim.
//!
//! This crate defines the shared abstractions that backends, the simulator,
//! and observers build on:
//!
//! - [`Sparsity`] and [`Matrix`] — structurally sparse numeric values
//! - [`Schema`] and [`Io`] — named slot layouts and the buffers behind them
//! - [`SolverInterface`] and [`Integrator`] — contracts for pluggable backends
//! - [`Registry`] — name-based selection of backends within a [`Family`]
//! - [`Dae`] and [`QpStructure`] — problem structures handed to factories
//! - [`Observer`] — receives events from a running simulation
//! - [`Error`] — the error taxonomy shared by every crate

mod error;
mod matrix;
mod observer;
mod options;
mod schema;
mod sparsity;

pub mod problems;
pub mod registry;
pub mod solver;

pub use error::Error;
pub use matrix::Matrix;
pub use observer::Observer;
pub use options::{OptionValue, Options};
pub use problems::{Dae, DaeArgs, QpStructure};
pub use registry::{Family, Plugin, Registry};
pub use schema::{Io, Schema, Slot};
pub use solver::{Integrator, SolverInterface};
pub use sparsity::Sparsity;
