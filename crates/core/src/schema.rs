//! Named slot layouts and the buffers that back them.

use crate::{Error, Matrix, Sparsity};

/// One named input or output position of a function-like component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    name: String,
    sparsity: Sparsity,
}

impl Slot {
    pub fn new(name: impl Into<String>, sparsity: Sparsity) -> Self {
        Self {
            name: name.into(),
            sparsity,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn sparsity(&self) -> &Sparsity {
        &self.sparsity
    }

    /// A slot with zero structural non-zeros carries no data.
    ///
    /// Unused slots are never written or read during evaluation.
    #[must_use]
    pub fn is_unused(&self) -> bool {
        self.sparsity.nnz() == 0
    }
}

/// An ordered, named list of [`Slot`]s.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    name: String,
    slots: Vec<Slot>,
}

impl Schema {
    /// Creates a schema from `(name, sparsity)` pairs in slot order.
    pub fn new<N, I>(name: impl Into<String>, slots: I) -> Self
    where
        N: Into<String>,
        I: IntoIterator<Item = (N, Sparsity)>,
    {
        Self {
            name: name.into(),
            slots: slots
                .into_iter()
                .map(|(slot, sparsity)| Slot::new(slot, sparsity))
                .collect(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Slot> {
        self.slots.iter()
    }

    /// Returns the slot at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownSlot`] if `index` is out of range.
    pub fn slot(&self, index: usize) -> Result<&Slot, Error> {
        self.slots.get(index).ok_or_else(|| Error::UnknownSlot {
            schema: self.name.clone(),
            slot: format!("#{index}"),
        })
    }

    /// Returns the index of the slot called `name`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownSlot`] if no slot has that name.
    pub fn index_of(&self, name: &str) -> Result<usize, Error> {
        self.slots
            .iter()
            .position(|slot| slot.name == name)
            .ok_or_else(|| Error::UnknownSlot {
                schema: self.name.clone(),
                slot: name.to_string(),
            })
    }
}

/// Input and output buffers laid out by a pair of schemas.
///
/// Buffers stay unallocated until [`Io::allocate`] is called, which backends
/// do from their `init()`. Values are checked against the declared sparsity
/// on every write.
#[derive(Debug, Clone)]
pub struct Io {
    inputs: Schema,
    outputs: Schema,
    buffers: Option<Buffers>,
}

#[derive(Debug, Clone)]
struct Buffers {
    inputs: Vec<Matrix>,
    outputs: Vec<Matrix>,
}

impl Io {
    #[must_use]
    pub fn new(inputs: Schema, outputs: Schema) -> Self {
        Self {
            inputs,
            outputs,
            buffers: None,
        }
    }

    #[must_use]
    pub fn input_schema(&self) -> &Schema {
        &self.inputs
    }

    #[must_use]
    pub fn output_schema(&self) -> &Schema {
        &self.outputs
    }

    /// Allocates zero-filled buffers for every slot.
    ///
    /// Calling this again discards any previously stored values.
    pub fn allocate(&mut self) {
        let zeros = |schema: &Schema| -> Vec<Matrix> {
            schema
                .iter()
                .map(|slot| Matrix::zeros(slot.sparsity().clone()))
                .collect()
        };
        self.buffers = Some(Buffers {
            inputs: zeros(&self.inputs),
            outputs: zeros(&self.outputs),
        });
    }

    #[must_use]
    pub fn is_allocated(&self) -> bool {
        self.buffers.is_some()
    }

    /// # Errors
    ///
    /// Fails if buffers are unallocated or `index` is out of range.
    pub fn input(&self, index: usize) -> Result<&Matrix, Error> {
        self.inputs.slot(index)?;
        Ok(&self.buffers()?.inputs[index])
    }

    /// # Errors
    ///
    /// Fails if buffers are unallocated or `index` is out of range.
    pub fn output(&self, index: usize) -> Result<&Matrix, Error> {
        self.outputs.slot(index)?;
        Ok(&self.buffers()?.outputs[index])
    }

    /// Writes `value` into input slot `index`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SchemaMismatch`] if `value` does not have the slot's
    /// exact sparsity, or fails if buffers are unallocated.
    pub fn set_input(&mut self, index: usize, value: &Matrix) -> Result<(), Error> {
        let slot = self.inputs.slot(index)?;
        let context = format!("input \"{}\" of {}", slot.name(), self.inputs.name());
        let target = &mut self.buffers_mut()?.inputs[index];
        target
            .assign(value)
            .map_err(|err| Error::schema_mismatch(format!("{context}: {err}")))
    }

    /// Writes `value` into output slot `index`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SchemaMismatch`] if `value` does not have the slot's
    /// exact sparsity, or fails if buffers are unallocated.
    pub fn set_output(&mut self, index: usize, value: &Matrix) -> Result<(), Error> {
        let slot = self.outputs.slot(index)?;
        let context = format!("output \"{}\" of {}", slot.name(), self.outputs.name());
        let target = &mut self.buffers_mut()?.outputs[index];
        target
            .assign(value)
            .map_err(|err| Error::schema_mismatch(format!("{context}: {err}")))
    }

    /// Mutable access to the non-zeros of output slot `index`.
    ///
    /// # Errors
    ///
    /// Fails if buffers are unallocated or `index` is out of range.
    pub fn output_nonzeros_mut(&mut self, index: usize) -> Result<&mut [f64], Error> {
        self.outputs.slot(index)?;
        Ok(self.buffers_mut()?.outputs[index].nonzeros_mut())
    }

    fn buffers(&self) -> Result<&Buffers, Error> {
        self.buffers
            .as_ref()
            .ok_or_else(|| not_initialized(&self.inputs))
    }

    fn buffers_mut(&mut self) -> Result<&mut Buffers, Error> {
        self.buffers
            .as_mut()
            .ok_or_else(|| not_initialized(&self.inputs))
    }
}

fn not_initialized(inputs: &Schema) -> Error {
    Error::NotInitialized {
        what: format!("buffers of {}", inputs.name()),
    }
}
