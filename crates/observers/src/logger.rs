use gridsim_core::{Error, Observer};
use gridsim_solvers::simulation::{Checkpoint, Event};

/// Logs simulation events through `tracing` at the `INFO` level.
///
/// Only events of the enabled checkpoints are logged. Matrices are formatted
/// with their `Display` implementation.
///
/// # Example
///
/// ```
/// use gridsim_observers::TracingObserver;
///
/// let observer = TracingObserver::from_names(["step"])?;
/// # Ok::<(), gridsim_core::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TracingObserver {
    initial: bool,
    step: bool,
}

impl TracingObserver {
    /// Logs every checkpoint.
    #[must_use]
    pub fn new() -> Self {
        Self::only(Checkpoint::ALL)
    }

    /// Logs only the given checkpoints.
    #[must_use]
    pub fn only(checkpoints: impl IntoIterator<Item = Checkpoint>) -> Self {
        let mut observer = Self {
            initial: false,
            step: false,
        };
        for checkpoint in checkpoints {
            match checkpoint {
                Checkpoint::Initial => observer.initial = true,
                Checkpoint::Step => observer.step = true,
            }
        }
        observer
    }

    /// Logs the checkpoints named `"initial"` and/or `"step"`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOption`] for an unknown name.
    pub fn from_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Result<Self, Error> {
        let checkpoints = names
            .into_iter()
            .map(str::parse)
            .collect::<Result<Vec<Checkpoint>, _>>()?;
        Ok(Self::only(checkpoints))
    }

    #[must_use]
    pub fn is_enabled(&self, checkpoint: Checkpoint) -> bool {
        match checkpoint {
            Checkpoint::Initial => self.initial,
            Checkpoint::Step => self.step,
        }
    }
}

impl Default for TracingObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> Observer<Event<'_>, A> for TracingObserver {
    fn observe(&mut self, event: &Event<'_>) -> Option<A> {
        if !self.is_enabled(event.checkpoint()) {
            return None;
        }
        match event {
            Event::Initial { x0, z0, p } => {
                tracing::info!(%x0, %z0, %p, "initial condition");
            }
            Event::Step {
                index,
                time,
                x0,
                z0,
                p,
            } => {
                tracing::info!(index, time, %x0, %z0, %p, "integrating up to grid point");
            }
            Event::Integrated {
                index,
                time,
                xf,
                zf,
            } => {
                tracing::info!(index, time, %xf, %zf, "reached grid point");
            }
        }
        None
    }
}
