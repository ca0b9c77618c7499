use std::{fmt, str::FromStr};

use gridsim_core::{Error, Matrix};

/// Event emitted by a [`Simulator`](super::Simulator) while it evaluates.
///
/// Values are borrowed from the simulator's components and are only valid
/// for the duration of the observer call.
#[derive(Debug, Clone, Copy)]
pub enum Event<'a> {
    /// The initial condition has been passed to the integrator.
    Initial {
        x0: &'a Matrix,
        z0: &'a Matrix,
        p: &'a Matrix,
    },

    /// The integrator is about to advance to grid point `index`.
    Step {
        index: usize,
        time: f64,
        x0: &'a Matrix,
        z0: &'a Matrix,
        p: &'a Matrix,
    },

    /// The integrator has reached grid point `index`.
    Integrated {
        index: usize,
        time: f64,
        xf: &'a Matrix,
        zf: &'a Matrix,
    },
}

impl Event<'_> {
    /// The checkpoint this event belongs to.
    #[must_use]
    pub fn checkpoint(&self) -> Checkpoint {
        match self {
            Self::Initial { .. } => Checkpoint::Initial,
            Self::Step { .. } | Self::Integrated { .. } => Checkpoint::Step,
        }
    }

    /// The grid time of the event, if it belongs to a step.
    #[must_use]
    pub fn time(&self) -> Option<f64> {
        match self {
            Self::Initial { .. } => None,
            Self::Step { time, .. } | Self::Integrated { time, .. } => Some(*time),
        }
    }

    /// The grid index of the event, if it belongs to a step.
    #[must_use]
    pub fn index(&self) -> Option<usize> {
        match self {
            Self::Initial { .. } => None,
            Self::Step { index, .. } | Self::Integrated { index, .. } => Some(*index),
        }
    }
}

/// Named groups of events observers can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Checkpoint {
    Initial,
    Step,
}

impl Checkpoint {
    pub const ALL: [Checkpoint; 2] = [Checkpoint::Initial, Checkpoint::Step];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Initial => "initial",
            Self::Step => "step",
        }
    }
}

impl fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Checkpoint {
    type Err = Error;

    /// Parses `"initial"` or `"step"`.
    fn from_str(s: &str) -> Result<Self, Error> {
        Self::ALL
            .into_iter()
            .find(|checkpoint| checkpoint.as_str() == s)
            .ok_or_else(|| Error::InvalidOption {
                name: "checkpoint".into(),
                reason: format!("unknown checkpoint \"{s}\", expected \"initial\" or \"step\""),
            })
    }
}
