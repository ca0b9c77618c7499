use crate::{Error, Sparsity};

/// Structure of a quadratic program.
///
/// ```text
/// min  ½ xᵀ H x + gᵀ x
///  x
/// s.t. lba <= A x <= uba
///      lbx <=   x <= ubx
/// ```
///
/// `h` is `n x n` (only its lower triangle is read) and `a` is `nc x n`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QpStructure {
    pub h: Sparsity,
    pub a: Sparsity,
}

impl QpStructure {
    pub fn new(h: Sparsity, a: Sparsity) -> Self {
        Self { h, a }
    }

    /// A structure with no linear constraints.
    pub fn unconstrained(h: Sparsity) -> Self {
        let n = h.ncol();
        Self {
            h,
            a: Sparsity::empty(0, n),
        }
    }

    /// Number of decision variables.
    #[must_use]
    pub fn n(&self) -> usize {
        self.h.ncol()
    }

    /// Number of linear constraints.
    #[must_use]
    pub fn nc(&self) -> usize {
        self.a.nrow()
    }

    /// Checks that `h` is square and `a` has one column per variable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SchemaMismatch`] describing the first violation.
    pub fn validate(&self) -> Result<(), Error> {
        if !self.h.is_square() {
            return Err(Error::schema_mismatch(format!(
                "H must be square, got {}",
                self.h.dim()
            )));
        }
        if self.a.ncol() != self.n() {
            return Err(Error::schema_mismatch(format!(
                "A must have {} columns, got {}",
                self.n(),
                self.a.dim()
            )));
        }
        Ok(())
    }
}
