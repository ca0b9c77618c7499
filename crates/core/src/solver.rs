//! Contracts implemented by pluggable numerical backends.

use crate::{Error, Io, Matrix, Schema, Sparsity, problems::Dae};

/// Slot indices shared by all integrators.
pub mod integrator_slots {
    /// Initial differential state.
    pub const X0: usize = 0;
    /// Initial guess for the algebraic variables.
    pub const Z0: usize = 1;
    /// Parameters.
    pub const P: usize = 2;

    /// Differential state at the integrator's current time.
    pub const XF: usize = 0;
    /// Algebraic variables at the integrator's current time.
    pub const ZF: usize = 1;

    pub const INPUT_NAMES: [&str; 3] = ["x0", "z0", "p"];
    pub const OUTPUT_NAMES: [&str; 2] = ["xf", "zf"];
}

/// Slot indices of a function of `(t, x, z, p)`, as consumed by output
/// functions.
pub mod dae_slots {
    pub const T: usize = 0;
    pub const X: usize = 1;
    pub const Z: usize = 2;
    pub const P: usize = 3;

    pub const NAMES: [&str; 4] = ["t", "x", "z", "p"];
}

/// The common contract of every pluggable backend.
///
/// A backend declares its input and output [`Schema`]s when constructed. Its
/// buffers are unallocated until [`SolverInterface::init`] runs; every slot
/// accessor fails with [`Error::NotInitialized`] before that.
pub trait SolverInterface {
    /// The registry name this backend was created under.
    fn plugin_name(&self) -> &'static str;

    /// The slot buffers backing this instance.
    fn io(&self) -> &Io;

    fn io_mut(&mut self) -> &mut Io;

    /// Allocates buffers and performs backend-specific preparation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Numerical`] or [`Error::SchemaMismatch`] if the
    /// problem structure is not admissible for this backend.
    fn init(&mut self) -> Result<(), Error>;

    /// Consumes the current inputs and produces outputs.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Numerical`] on backend failure and
    /// [`Error::NotInitialized`] before `init()`.
    fn evaluate(&mut self) -> Result<(), Error>;

    fn is_initialized(&self) -> bool {
        self.io().is_allocated()
    }

    fn input_schema(&self) -> &Schema {
        self.io().input_schema()
    }

    fn output_schema(&self) -> &Schema {
        self.io().output_schema()
    }

    /// # Errors
    ///
    /// Fails before `init()` or for an unknown slot.
    fn input(&self, slot: usize) -> Result<&Matrix, Error> {
        self.io().input(slot)
    }

    /// # Errors
    ///
    /// Fails before `init()` or for an unknown slot.
    fn output(&self, slot: usize) -> Result<&Matrix, Error> {
        self.io().output(slot)
    }

    /// Writes an input slot.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SchemaMismatch`] if `value` does not match the slot's
    /// declared sparsity.
    fn set_input(&mut self, slot: usize, value: &Matrix) -> Result<(), Error> {
        self.io_mut().set_input(slot, value)
    }

    /// Writes an input slot looked up by name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownSlot`] for an unknown name, otherwise as
    /// [`SolverInterface::set_input`].
    fn set_input_by_name(&mut self, name: &str, value: &Matrix) -> Result<(), Error> {
        let slot = self.input_schema().index_of(name)?;
        self.set_input(slot, value)
    }

    /// Reads an output slot looked up by name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownSlot`] for an unknown name, otherwise as
    /// [`SolverInterface::output`].
    fn output_by_name(&self, name: &str) -> Result<&Matrix, Error> {
        let slot = self.output_schema().index_of(name)?;
        self.output(slot)
    }
}

/// A stateful time integrator for a [`Dae`].
///
/// Inputs are laid out as [`integrator_slots::INPUT_NAMES`] and outputs as
/// [`integrator_slots::OUTPUT_NAMES`]. After [`Integrator::reset`] the clock
/// sits at `t0`; each [`Integrator::integrate`] call advances it forward to
/// the requested time and refreshes the outputs.
pub trait Integrator: SolverInterface {
    /// The problem this integrator was built for.
    fn dae(&self) -> &Dae;

    /// The configured `(t0, tf)` interval.
    fn interval(&self) -> (f64, f64);

    /// Configures the operating interval. Only allowed before `init()`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] after `init()`, or
    /// [`Error::InvalidOption`] if the interval is not finite.
    fn set_interval(&mut self, t0: f64, tf: f64) -> Result<(), Error>;

    /// The current integration time, or `None` before the first reset.
    fn time(&self) -> Option<f64>;

    /// Restores the state to the initial condition held in the input slots.
    ///
    /// # Errors
    ///
    /// Fails before `init()` or if the algebraic equation cannot be solved.
    fn reset(&mut self) -> Result<(), Error>;

    /// Advances from the current time to `t`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BackwardStep`] if `t` is earlier than the current
    /// time, [`Error::InvalidState`] before a reset, and
    /// [`Error::Numerical`] if `t` is not finite or the solution diverges.
    fn integrate(&mut self, t: f64) -> Result<(), Error>;

    /// Creates a fresh, uninitialized instance from the same problem and
    /// configuration, including the interval.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be rebuilt.
    fn instantiate(&self) -> Result<Box<dyn Integrator>, Error>;
}

/// The input schema every integrator over `dae` declares.
#[must_use]
pub fn integrator_input_schema(dae: &Dae) -> Schema {
    let [x0, z0, p] = integrator_slots::INPUT_NAMES;
    Schema::new(
        "integrator_in",
        [(x0, dae.x().clone()), (z0, dae.z().clone()), (p, dae.p().clone())],
    )
}

/// The output schema every integrator over `dae` declares.
#[must_use]
pub fn integrator_output_schema(dae: &Dae) -> Schema {
    let [xf, zf] = integrator_slots::OUTPUT_NAMES;
    Schema::new(
        "integrator_out",
        [(xf, dae.x().clone()), (zf, dae.z().clone())],
    )
}

/// The `(t, x, z, p)` input schema of a function consuming integrator output.
#[must_use]
pub fn dae_input_schema(t: Sparsity, x: Sparsity, z: Sparsity, p: Sparsity) -> Schema {
    let [tn, xn, zn, pn] = dae_slots::NAMES;
    Schema::new("dae_in", [(tn, t), (xn, x), (zn, z), (pn, p)])
}
