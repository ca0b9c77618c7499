use std::fmt;

use ndarray::Array2;

use crate::{Error, Sparsity};

/// A sparse numeric matrix: a [`Sparsity`] plus one value per non-zero.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "MatrixParts"))]
pub struct Matrix {
    sparsity: Sparsity,
    nonzeros: Vec<f64>,
}

impl Matrix {
    /// Creates a matrix from a pattern and its non-zero values.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SchemaMismatch`] if `nonzeros.len()` differs from the
    /// pattern's non-zero count.
    pub fn new(sparsity: Sparsity, nonzeros: Vec<f64>) -> Result<Self, Error> {
        if nonzeros.len() != sparsity.nnz() {
            return Err(Error::schema_mismatch(format!(
                "pattern {sparsity} needs {} values, got {}",
                sparsity.nnz(),
                nonzeros.len()
            )));
        }
        Ok(Self { sparsity, nonzeros })
    }

    /// A matrix with the given pattern and all non-zeros set to `0.0`.
    #[must_use]
    pub fn zeros(sparsity: Sparsity) -> Self {
        let nonzeros = vec![0.0; sparsity.nnz()];
        Self { sparsity, nonzeros }
    }

    /// A dense column vector.
    #[must_use]
    pub fn dense_column(values: Vec<f64>) -> Self {
        Self {
            sparsity: Sparsity::column(values.len()),
            nonzeros: values,
        }
    }

    #[must_use]
    pub fn scalar(value: f64) -> Self {
        Self {
            sparsity: Sparsity::scalar(),
            nonzeros: vec![value],
        }
    }

    #[must_use]
    pub fn sparsity(&self) -> &Sparsity {
        &self.sparsity
    }

    #[must_use]
    pub fn nonzeros(&self) -> &[f64] {
        &self.nonzeros
    }

    #[must_use]
    pub fn nonzeros_mut(&mut self) -> &mut [f64] {
        &mut self.nonzeros
    }

    /// Returns the entry at `(r, c)`; structural zeros read as `0.0`.
    #[must_use]
    pub fn get(&self, r: usize, c: usize) -> f64 {
        self.sparsity.find(r, c).map_or(0.0, |k| self.nonzeros[k])
    }

    /// Overwrites the non-zeros with those of `other`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SchemaMismatch`] unless both patterns are identical.
    pub fn assign(&mut self, other: &Matrix) -> Result<(), Error> {
        if self.sparsity != other.sparsity {
            return Err(Error::schema_mismatch(format!(
                "cannot assign {} to {}",
                other.sparsity, self.sparsity
            )));
        }
        self.nonzeros.copy_from_slice(&other.nonzeros);
        Ok(())
    }

    /// Expands into a dense `nrow x ncol` array.
    #[must_use]
    pub fn to_dense(&self) -> Array2<f64> {
        let mut dense = Array2::zeros((self.sparsity.nrow(), self.sparsity.ncol()));
        for ((r, c), value) in self.sparsity.entries().zip(&self.nonzeros) {
            dense[[r, c]] = *value;
        }
        dense
    }

    /// Returns `true` if every non-zero is finite.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.nonzeros.iter().all(|v| v.is_finite())
    }
}

impl fmt::Display for Matrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {:?}", self.sparsity.dim(), self.nonzeros)
    }
}

#[cfg(feature = "serde")]
#[derive(serde::Deserialize)]
struct MatrixParts {
    sparsity: Sparsity,
    nonzeros: Vec<f64>,
}

#[cfg(feature = "serde")]
impl TryFrom<MatrixParts> for Matrix {
    type Error = Error;

    fn try_from(parts: MatrixParts) -> Result<Self, Error> {
        Self::new(parts.sparsity, parts.nonzeros)
    }
}
