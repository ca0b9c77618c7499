//! Capability traits for simulation observers.
//!
//! These traits abstract over the event types observers receive, so the same
//! observer works on live [`simulation::Event`]s and on [`Record`]s replayed
//! from a [`Recorder`].
//!
//! - [`HasCheckpoint`] — events that belong to a named checkpoint
//! - [`HasTime`] — events that may carry a grid time
//!
//! # Example
//!
//! ```rust
//! use std::convert::Infallible;
//!
//! use gridsim_core::Observer;
//! use gridsim_observers::traits::HasTime;
//!
//! /// Tracks the latest grid time seen.
//! #[derive(Default)]
//! struct Clock {
//!     latest: Option<f64>,
//! }
//!
//! impl<E: HasTime> Observer<E, Infallible> for Clock {
//!     fn observe(&mut self, event: &E) -> Option<Infallible> {
//!         if let Some(t) = event.time() {
//!             self.latest = Some(t);
//!         }
//!         None
//!     }
//! }
//! ```
//!
//! [`simulation::Event`]: gridsim_solvers::simulation::Event
//! [`Record`]: crate::Record
//! [`Recorder`]: crate::Recorder

use gridsim_solvers::simulation::{Checkpoint, Event};

use crate::Record;

/// An event that belongs to a checkpoint.
pub trait HasCheckpoint {
    fn checkpoint(&self) -> Checkpoint;
}

/// An event that may carry the grid time it was emitted at.
pub trait HasTime {
    /// Returns the grid time, or `None` for events not tied to a grid point.
    fn time(&self) -> Option<f64>;
}

// --- simulation::Event ---

impl HasCheckpoint for Event<'_> {
    fn checkpoint(&self) -> Checkpoint {
        Event::checkpoint(self)
    }
}

impl HasTime for Event<'_> {
    fn time(&self) -> Option<f64> {
        Event::time(self)
    }
}

// --- Record ---

impl HasCheckpoint for Record {
    fn checkpoint(&self) -> Checkpoint {
        match self {
            Record::Initial { .. } => Checkpoint::Initial,
            Record::Step { .. } | Record::Integrated { .. } => Checkpoint::Step,
        }
    }
}

impl HasTime for Record {
    fn time(&self) -> Option<f64> {
        match self {
            Record::Initial { .. } => None,
            Record::Step { time, .. } | Record::Integrated { time, .. } => Some(*time),
        }
    }
}
