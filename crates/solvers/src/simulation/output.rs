use std::{error::Error as StdError, fmt};

use gridsim_core::{
    Error, Io, Matrix, Schema, Sparsity,
    solver::{dae_input_schema, dae_slots, integrator_slots},
};

/// Arguments passed to an output function: the current buffer contents of
/// its `t`, `x`, `z` and `p` slots.
///
/// Slots declared unused are never written by the simulator and hold zeros.
#[derive(Debug, Clone, Copy)]
pub struct OutputArgs<'a> {
    pub t: &'a Matrix,
    pub x: &'a Matrix,
    pub z: &'a Matrix,
    pub p: &'a Matrix,
}

/// The callable behind an [`OutputFunction`].
pub type OutputFn =
    dyn Fn(&OutputArgs<'_>) -> Result<Vec<Matrix>, Box<dyn StdError + Send + Sync>> + Send + Sync;

/// Input sparsity of an [`OutputFunction`].
///
/// Each slot defaults to a `0x1` pattern, which marks it unused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inputs {
    pub t: Sparsity,
    pub x: Sparsity,
    pub z: Sparsity,
    pub p: Sparsity,
}

impl Default for Inputs {
    fn default() -> Self {
        let unused = Sparsity::dense(0, 1);
        Self {
            t: unused.clone(),
            x: unused.clone(),
            z: unused.clone(),
            p: unused,
        }
    }
}

/// Maps a sampled trajectory point `(t, x, z, p)` to derived outputs.
///
/// Every output the callable returns must match its declared sparsity
/// exactly; the simulator additionally requires each output to be a column.
pub struct OutputFunction {
    io: Io,
    f: Box<OutputFn>,
}

impl OutputFunction {
    /// Creates an output function with the given slot layout.
    pub fn new<N, O, F>(name: &str, inputs: Inputs, outputs: O, f: F) -> Self
    where
        N: Into<String>,
        O: IntoIterator<Item = (N, Sparsity)>,
        F: Fn(&OutputArgs<'_>) -> Result<Vec<Matrix>, Box<dyn StdError + Send + Sync>>
            + Send
            + Sync
            + 'static,
    {
        let Inputs { t, x, z, p } = inputs;
        Self {
            io: Io::new(
                dae_input_schema(t, x, z, p),
                Schema::new(format!("{name}_out"), outputs),
            ),
            f: Box::new(f),
        }
    }

    /// The output function that returns the state and algebraic variables
    /// unchanged, as `xf` and `zf`.
    #[must_use]
    pub fn identity(x: Sparsity, z: Sparsity, p: Sparsity) -> Self {
        let [xf, zf] = integrator_slots::OUTPUT_NAMES;
        let outputs = [(xf, x.clone()), (zf, z.clone())];
        let inputs = Inputs {
            t: Sparsity::scalar(),
            x,
            z,
            p,
        };
        Self::new("identity", inputs, outputs, |args| {
            Ok(vec![args.x.clone(), args.z.clone()])
        })
    }

    #[must_use]
    pub fn input_schema(&self) -> &Schema {
        self.io.input_schema()
    }

    #[must_use]
    pub fn output_schema(&self) -> &Schema {
        self.io.output_schema()
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.io.is_allocated()
    }

    /// Allocates the slot buffers.
    pub fn init(&mut self) {
        self.io.allocate();
    }

    /// # Errors
    ///
    /// Fails before `init()`, for an unknown slot, or if `value` does not
    /// match the slot's sparsity.
    pub fn set_input(&mut self, slot: usize, value: &Matrix) -> Result<(), Error> {
        self.io.set_input(slot, value)
    }

    /// # Errors
    ///
    /// Fails before `init()` or for an unknown slot.
    pub fn input(&self, slot: usize) -> Result<&Matrix, Error> {
        self.io.input(slot)
    }

    /// # Errors
    ///
    /// Fails before `init()` or for an unknown slot.
    pub fn output(&self, slot: usize) -> Result<&Matrix, Error> {
        self.io.output(slot)
    }

    /// Calls the function on the current inputs and stores its outputs.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Callback`] if the callable fails and
    /// [`Error::SchemaMismatch`] if it returns the wrong number of outputs or
    /// an output with the wrong sparsity.
    pub fn evaluate(&mut self) -> Result<(), Error> {
        let args = OutputArgs {
            t: self.io.input(dae_slots::T)?,
            x: self.io.input(dae_slots::X)?,
            z: self.io.input(dae_slots::Z)?,
            p: self.io.input(dae_slots::P)?,
        };
        let values = (self.f)(&args).map_err(Error::Callback)?;

        let expected = self.io.output_schema().len();
        if values.len() != expected {
            return Err(Error::schema_mismatch(format!(
                "{} returned {} outputs, expected {expected}",
                self.io.output_schema().name(),
                values.len()
            )));
        }
        for (slot, value) in values.iter().enumerate() {
            self.io.set_output(slot, value)?;
        }
        Ok(())
    }
}

impl fmt::Debug for OutputFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputFunction")
            .field("inputs", self.io.input_schema())
            .field("outputs", self.io.output_schema())
            .finish_non_exhaustive()
    }
}
