use gridsim_core::{Error, Matrix};

/// An ordered, non-decreasing sequence of sample times.
///
/// An empty grid is allowed; simulating over it performs no steps.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Grid(Vec<f64>);

impl Grid {
    /// Creates a grid from sample times.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidGrid`] if a time is NaN or a later time is
    /// smaller than an earlier one.
    pub fn new(times: Vec<f64>) -> Result<Self, Error> {
        if let Some(i) = times.iter().position(|t| t.is_nan()) {
            return Err(Error::InvalidGrid {
                reason: format!("time {i} is NaN"),
            });
        }
        if let Some(i) = times.windows(2).position(|pair| pair[1] < pair[0]) {
            return Err(Error::InvalidGrid {
                reason: format!(
                    "times must be non-decreasing, but t[{}] = {} < t[{i}] = {}",
                    i + 1,
                    times[i + 1],
                    times[i]
                ),
            });
        }
        Ok(Self(times))
    }

    /// Creates a grid from a dense column matrix.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidGrid`] if `matrix` is not a dense column or its
    /// values are not a valid grid.
    pub fn from_matrix(matrix: &Matrix) -> Result<Self, Error> {
        let sp = matrix.sparsity();
        if !sp.is_column() {
            return Err(Error::InvalidGrid {
                reason: format!("grid must be a column, but got {}", sp.dim()),
            });
        }
        if !sp.is_dense() {
            return Err(Error::InvalidGrid {
                reason: format!("grid must be dense, but got {sp}"),
            });
        }
        Self::new(matrix.nonzeros().to_vec())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn first(&self) -> Option<f64> {
        self.0.first().copied()
    }

    #[must_use]
    pub fn last(&self) -> Option<f64> {
        self.0.last().copied()
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = f64> + '_ {
        self.0.iter().copied()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }
}

impl TryFrom<Vec<f64>> for Grid {
    type Error = Error;

    fn try_from(times: Vec<f64>) -> Result<Self, Error> {
        Self::new(times)
    }
}

impl TryFrom<&Matrix> for Grid {
    type Error = Error;

    fn try_from(matrix: &Matrix) -> Result<Self, Error> {
        Self::from_matrix(matrix)
    }
}
