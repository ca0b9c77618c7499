//! Sampling an integrator's trajectory over a time grid.
//!
//! A [`Simulator`] owns one [`Integrator`] and one [`OutputFunction`]. It
//! advances the integrator through each point of a [`Grid`] in order and
//! stores the output function's result at every point as one column of a
//! dense output matrix.
//!
//! # Example
//!
//! ```
//! use gridsim_core::{Dae, Matrix, Options, Sparsity};
//! use gridsim_solvers::{plugins, simulation::Simulator};
//!
//! let dae = Dae::ode(Sparsity::scalar(), Sparsity::scalar(), |args| {
//!     Ok(vec![-args.p[0] * args.x[0]])
//! });
//! let integrator = plugins::integrator("rk4", &dae, &Options::new())?;
//!
//! let mut sim = Simulator::new(integrator, None, vec![0.0, 0.5, 1.0])?;
//! sim.initialize()?;
//! sim.set_input_by_name("x0", &Matrix::scalar(1.0))?;
//! sim.set_input_by_name("p", &Matrix::scalar(0.1))?;
//! sim.evaluate()?;
//!
//! let xf = sim.output_array(0)?;
//! assert_eq!(xf.dim(), (1, 3));
//! # Ok::<(), gridsim_core::Error>(())
//! ```

mod event;
mod grid;
mod output;

#[cfg(test)]
mod tests;

pub use event::{Checkpoint, Event};
pub use grid::Grid;
pub use output::{Inputs, OutputArgs, OutputFn, OutputFunction};

use std::{convert::Infallible, fmt};

use gridsim_core::{
    Error, Integrator, Io, Matrix, Observer, Schema, SolverInterface, Sparsity,
    solver::{dae_slots, integrator_slots as slots},
};
use ndarray::Array2;

/// Lifecycle of a [`Simulator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Constructed,
    Initialized,
    Evaluating,
    Done,
    Failed,
}

impl Phase {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Constructed => "constructed",
            Self::Initialized => "initialized",
            Self::Evaluating => "evaluating",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Drives an integrator across a time grid and samples an output function
/// at every grid point.
///
/// Inputs mirror the integrator's (`x0`, `z0`, `p`). Output `i` is a dense
/// `numel_i x grid.len()` matrix whose column `k` holds output `i` of the
/// output function at `grid[k]`.
pub struct Simulator {
    integrator: Box<dyn Integrator>,
    output_fn: Option<OutputFunction>,
    grid: Grid,
    io: Io,
    phase: Phase,
}

impl Simulator {
    /// Creates a simulator over the sample times `times`.
    ///
    /// With `output_fn` set to `None`, [`Simulator::initialize`] synthesizes
    /// [`OutputFunction::identity`] over the integrator's slots.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidGrid`] if `times` is not non-decreasing.
    pub fn new(
        integrator: Box<dyn Integrator>,
        output_fn: Option<OutputFunction>,
        times: Vec<f64>,
    ) -> Result<Self, Error> {
        Ok(Self::with_grid(integrator, output_fn, Grid::new(times)?))
    }

    /// Creates a simulator over an already validated grid.
    #[must_use]
    pub fn with_grid(
        integrator: Box<dyn Integrator>,
        output_fn: Option<OutputFunction>,
        grid: Grid,
    ) -> Self {
        let io = Io::new(
            Schema::new("simulator_in", simulator_inputs(integrator.as_ref())),
            Schema::new("simulator_out", Vec::<(String, Sparsity)>::new()),
        );
        Self {
            integrator,
            output_fn,
            grid,
            io,
            phase: Phase::Constructed,
        }
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[must_use]
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// The integrator currently driven by this simulator.
    ///
    /// After initialization over a non-empty grid this is the fresh instance
    /// configured for `[grid[0], grid[last]]`.
    #[must_use]
    pub fn integrator(&self) -> &dyn Integrator {
        self.integrator.as_ref()
    }

    /// The output function, once supplied or synthesized.
    #[must_use]
    pub fn output_function(&self) -> Option<&OutputFunction> {
        self.output_fn.as_ref()
    }

    /// Prepares the integrator, output function and output buffers.
    ///
    /// Over a non-empty grid, the integrator is replaced by a fresh instance
    /// from [`Integrator::instantiate`] with its interval set to the grid's
    /// first and last times. Inputs are then copied from the integrator.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] unless the simulator was just
    /// constructed, [`Error::SchemaMismatch`] if the output function's slots
    /// are incompatible with the integrator's, and any error the integrator
    /// raises while being recreated or initialized. Any failure leaves the
    /// simulator [`Phase::Failed`].
    pub fn initialize(&mut self) -> Result<(), Error> {
        self.require("initialize", &[Phase::Constructed])?;
        match self.try_initialize() {
            Ok(()) => {
                self.phase = Phase::Initialized;
                tracing::debug!(
                    integrator = self.integrator.plugin_name(),
                    grid_len = self.grid.len(),
                    outputs = self.io.output_schema().len(),
                    "simulator initialized"
                );
                Ok(())
            }
            Err(err) => Err(self.fail("initialize", err)),
        }
    }

    /// Runs the simulation without observation.
    ///
    /// # Errors
    ///
    /// See [`Simulator::evaluate_observed`].
    pub fn evaluate(&mut self) -> Result<(), Error> {
        self.evaluate_observed(())
    }

    /// Runs the simulation, reporting progress to `observer`.
    ///
    /// The integrator is loaded with the simulator's inputs and reset once,
    /// then integrated to each grid time in order. Evaluating again after
    /// success reruns the whole grid and overwrites the outputs.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] unless initialized or done, errors
    /// from the integrator or output function unchanged, and
    /// [`Error::InternalInvariantViolation`] if the output buffers were not
    /// filled exactly. Any failure leaves the simulator [`Phase::Failed`].
    pub fn evaluate_observed<O>(&mut self, mut observer: O) -> Result<(), Error>
    where
        O: for<'a> Observer<Event<'a>, Infallible>,
    {
        self.require("evaluate", &[Phase::Initialized, Phase::Done])?;
        self.phase = Phase::Evaluating;
        tracing::debug!(grid_len = self.grid.len(), "simulation started");

        match self.run(&mut observer) {
            Ok(()) => {
                self.phase = Phase::Done;
                tracing::debug!(grid_len = self.grid.len(), "simulation finished");
                Ok(())
            }
            Err(err) => Err(self.fail("evaluate", err)),
        }
    }

    /// Writes simulator input `slot` (`x0`, `z0` or `p`).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] unless initialized or done, and
    /// [`Error::SchemaMismatch`] if `value` does not match the slot.
    pub fn set_input(&mut self, slot: usize, value: &Matrix) -> Result<(), Error> {
        self.require("set an input", &[Phase::Initialized, Phase::Done])?;
        self.io.set_input(slot, value)
    }

    /// Writes the simulator input called `name`.
    ///
    /// # Errors
    ///
    /// As [`Simulator::set_input`], or [`Error::UnknownSlot`].
    pub fn set_input_by_name(&mut self, name: &str, value: &Matrix) -> Result<(), Error> {
        let slot = self.io.input_schema().index_of(name)?;
        self.set_input(slot, value)
    }

    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] before initialization or after a
    /// failure.
    pub fn input(&self, slot: usize) -> Result<&Matrix, Error> {
        self.require("read an input", &[Phase::Initialized, Phase::Done])?;
        self.io.input(slot)
    }

    /// Output `slot` sampled over the grid, as stored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] unless a run completed.
    pub fn output(&self, slot: usize) -> Result<&Matrix, Error> {
        self.require("read outputs", &[Phase::Done])?;
        self.io.output(slot)
    }

    /// # Errors
    ///
    /// As [`Simulator::output`], or [`Error::UnknownSlot`].
    pub fn output_by_name(&self, name: &str) -> Result<&Matrix, Error> {
        let slot = self.io.output_schema().index_of(name)?;
        self.output(slot)
    }

    /// Output `slot` as a dense `numel x grid.len()` array.
    ///
    /// # Errors
    ///
    /// As [`Simulator::output`].
    pub fn output_array(&self, slot: usize) -> Result<Array2<f64>, Error> {
        Ok(self.output(slot)?.to_dense())
    }

    /// Every output, in slot order.
    ///
    /// # Errors
    ///
    /// As [`Simulator::output`].
    pub fn outputs(&self) -> Result<Vec<&Matrix>, Error> {
        (0..self.io.output_schema().len())
            .map(|slot| self.output(slot))
            .collect()
    }

    fn require(&self, operation: &'static str, allowed: &[Phase]) -> Result<(), Error> {
        if allowed.contains(&self.phase) {
            Ok(())
        } else {
            Err(Error::InvalidState {
                operation,
                phase: self.phase.as_str(),
            })
        }
    }

    fn fail(&mut self, operation: &'static str, err: Error) -> Error {
        self.phase = Phase::Failed;
        if err.is_fatal() {
            tracing::error!(operation, error = %err, "simulator invariant violated");
        } else {
            tracing::warn!(operation, error = %err, "simulator failed");
        }
        err
    }

    fn try_initialize(&mut self) -> Result<(), Error> {
        if let (Some(t0), Some(tf)) = (self.grid.first(), self.grid.last()) {
            let mut fresh = self.integrator.instantiate()?;
            fresh.set_interval(t0, tf)?;
            fresh.init()?;
            self.integrator = fresh;
        } else if !self.integrator.is_initialized() {
            self.integrator.init()?;
        }

        let integrator = self.integrator.as_ref();
        let output_fn = self.output_fn.get_or_insert_with(|| {
            let sparsity = |slot| {
                integrator
                    .input_schema()
                    .slot(slot)
                    .map(|s| s.sparsity().clone())
                    .unwrap_or_else(|_| Sparsity::dense(0, 1))
            };
            OutputFunction::identity(sparsity(slots::X0), sparsity(slots::Z0), sparsity(slots::P))
        });
        output_fn.init();

        let mut outputs = Vec::with_capacity(output_fn.output_schema().len());
        for slot in output_fn.output_schema().iter() {
            let sp = slot.sparsity();
            if !sp.is_empty() && !sp.is_column() {
                return Err(Error::schema_mismatch(format!(
                    "output \"{}\" has shape {}, but a column is expected",
                    slot.name(),
                    sp.dim()
                )));
            }
            outputs.push((
                slot.name().to_string(),
                Sparsity::dense(sp.numel(), self.grid.len()),
            ));
        }

        check_output_inputs(output_fn.input_schema(), integrator.input_schema())?;

        self.io = Io::new(
            Schema::new("simulator_in", simulator_inputs(integrator)),
            Schema::new("simulator_out", outputs),
        );
        self.io.allocate();
        for slot in [slots::X0, slots::Z0, slots::P] {
            self.io.set_input(slot, self.integrator.input(slot)?)?;
        }
        Ok(())
    }

    fn run<O>(&mut self, observer: &mut O) -> Result<(), Error>
    where
        O: for<'a> Observer<Event<'a>, Infallible>,
    {
        let output_fn = self.output_fn.as_mut().ok_or_else(|| Error::NotInitialized {
            what: "simulator output function".into(),
        })?;
        let integrator = self.integrator.as_mut();

        // Load the initial condition and parameters.
        for slot in [slots::X0, slots::Z0, slots::P] {
            integrator.set_input(slot, self.io.input(slot)?)?;
        }
        observer.observe(&Event::Initial {
            x0: integrator.input(slots::X0)?,
            z0: integrator.input(slots::Z0)?,
            p: integrator.input(slots::P)?,
        });

        integrator.reset()?;

        // Slots without non-zeros are never written.
        let unused = |slot: usize| -> Result<bool, Error> {
            Ok(output_fn.input_schema().slot(slot)?.is_unused())
        };
        let transfer = [
            !unused(dae_slots::T)?,
            !unused(dae_slots::X)?,
            !unused(dae_slots::Z)?,
            !unused(dae_slots::P)?,
        ];
        let t_sparsity = output_fn.input_schema().slot(dae_slots::T)?.sparsity().clone();

        let n_out = self.io.output_schema().len();
        let mut cursors = vec![0; n_out];

        for (index, time) in self.grid.iter().enumerate() {
            observer.observe(&Event::Step {
                index,
                time,
                x0: integrator.input(slots::X0)?,
                z0: integrator.input(slots::Z0)?,
                p: integrator.input(slots::P)?,
            });

            // Advance from the previous grid point.
            integrator.integrate(time)?;

            let xf = integrator.output(slots::XF)?;
            let zf = integrator.output(slots::ZF)?;
            observer.observe(&Event::Integrated {
                index,
                time,
                xf,
                zf,
            });

            // Feed the output function.
            if transfer[dae_slots::T] {
                let t = Matrix::new(t_sparsity.clone(), vec![time; t_sparsity.nnz()])?;
                output_fn.set_input(dae_slots::T, &t)?;
            }
            if transfer[dae_slots::X] {
                output_fn.set_input(dae_slots::X, xf)?;
            }
            if transfer[dae_slots::Z] {
                output_fn.set_input(dae_slots::Z, zf)?;
            }
            if transfer[dae_slots::P] {
                output_fn.set_input(dae_slots::P, self.io.input(slots::P)?)?;
            }

            output_fn.evaluate()?;

            // Write column `index` of each output buffer.
            for (slot, cursor) in cursors.iter_mut().enumerate() {
                let value = output_fn.output(slot)?;
                let numel = value.sparsity().numel();
                let buffer = self.io.output_nonzeros_mut(slot)?;
                let end = *cursor + numel;
                let column = buffer.get_mut(*cursor..end).ok_or_else(|| {
                    Error::invariant(format!(
                        "output {slot} overflows its buffer at grid point {index}"
                    ))
                })?;
                column.fill(0.0);
                for ((r, _), v) in value.sparsity().entries().zip(value.nonzeros()) {
                    column[r] = *v;
                }
                *cursor = end;
            }

            tracing::trace!(index, time, "grid point sampled");
        }

        // Every buffer must be exactly full.
        for (slot, cursor) in cursors.iter().enumerate() {
            let capacity = self.io.output(slot)?.nonzeros().len();
            if *cursor != capacity {
                return Err(Error::invariant(format!(
                    "output {slot} holds {capacity} values but {cursor} were written"
                )));
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Simulator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Simulator")
            .field("integrator", &self.integrator.plugin_name())
            .field("output_fn", &self.output_fn)
            .field("grid", &self.grid)
            .field("phase", &self.phase)
            .finish_non_exhaustive()
    }
}

/// The simulator's input layout, copied from the integrator.
fn simulator_inputs(integrator: &dyn Integrator) -> Vec<(String, Sparsity)> {
    integrator
        .input_schema()
        .iter()
        .map(|slot| (slot.name().to_string(), slot.sparsity().clone()))
        .collect()
}

/// Checks that the output function can consume the integrator's values.
///
/// `t` must have at most one element. `x`, `z` and `p` must either have an
/// empty shape or match the integrator's slot exactly. Data transfer skips
/// slots with no non-zeros, which is a separate condition from an empty
/// shape.
fn check_output_inputs(output: &Schema, integrator: &Schema) -> Result<(), Error> {
    let t = output.slot(dae_slots::T)?.sparsity();
    if t.numel() > 1 {
        return Err(Error::schema_mismatch(format!(
            "output function argument t must be scalar or empty, but got {}",
            t.dim()
        )));
    }

    for (dae_slot, integrator_slot) in [
        (dae_slots::P, slots::P),
        (dae_slots::X, slots::X0),
        (dae_slots::Z, slots::Z0),
    ] {
        let declared = output.slot(dae_slot)?;
        let expected = integrator.slot(integrator_slot)?;
        if !declared.sparsity().is_empty() && declared.sparsity() != expected.sparsity() {
            return Err(Error::schema_mismatch(format!(
                "output function argument {} must be empty or match integrator input {} ({}), \
                 but got {}",
                declared.name(),
                expected.name(),
                expected.sparsity(),
                declared.sparsity()
            )));
        }
    }
    Ok(())
}

impl SolverInterface for Simulator {
    fn plugin_name(&self) -> &'static str {
        "simulator"
    }

    fn io(&self) -> &Io {
        &self.io
    }

    fn io_mut(&mut self) -> &mut Io {
        &mut self.io
    }

    fn init(&mut self) -> Result<(), Error> {
        self.initialize()
    }

    fn evaluate(&mut self) -> Result<(), Error> {
        Simulator::evaluate(self)
    }

    fn set_input(&mut self, slot: usize, value: &Matrix) -> Result<(), Error> {
        Simulator::set_input(self, slot, value)
    }

    fn input(&self, slot: usize) -> Result<&Matrix, Error> {
        Simulator::input(self, slot)
    }

    fn output(&self, slot: usize) -> Result<&Matrix, Error> {
        Simulator::output(self, slot)
    }
}
