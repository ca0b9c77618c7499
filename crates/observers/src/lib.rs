//! Reusable observers for gridsim simulations.
//!
//! This crate provides [`Observer`] implementations and capability traits for
//! the events a [`Simulator`] emits while it runs.
//!
//! # Modules
//!
//! - [`traits`] — Capability traits over simulation events
//!   ([`HasCheckpoint`], [`HasTime`])
//!
//! # Observers
//!
//! - [`TracingObserver`] — logs the enabled checkpoints through `tracing`
//! - [`Recorder`] — keeps owned copies of events as [`Record`]s
//!
//! [`Observer`]: gridsim_core::Observer
//! [`Simulator`]: gridsim_solvers::Simulator
//! [`HasCheckpoint`]: traits::HasCheckpoint
//! [`HasTime`]: traits::HasTime

pub mod traits;

mod logger;
mod recorder;

pub use logger::TracingObserver;
pub use recorder::{Record, Recorder};
