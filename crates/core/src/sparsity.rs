use std::fmt;

use crate::Error;

/// Shape plus the set of structurally non-zero positions of a matrix.
///
/// Stored in compressed-column form: the row indices of column `c` are
/// `row[colind[c]..colind[c + 1]]`, sorted and unique.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "CompressedColumn"))]
pub struct Sparsity {
    nrow: usize,
    ncol: usize,
    colind: Vec<usize>,
    row: Vec<usize>,
}

impl Sparsity {
    /// A fully dense `nrow x ncol` pattern.
    #[must_use]
    pub fn dense(nrow: usize, ncol: usize) -> Self {
        let colind = (0..=ncol).map(|c| c * nrow).collect();
        let row = (0..ncol).flat_map(|_| 0..nrow).collect();
        Self {
            nrow,
            ncol,
            colind,
            row,
        }
    }

    /// A dense column vector with `n` entries.
    #[must_use]
    pub fn column(n: usize) -> Self {
        Self::dense(n, 1)
    }

    /// A dense `1 x 1` pattern.
    #[must_use]
    pub fn scalar() -> Self {
        Self::dense(1, 1)
    }

    /// An `nrow x ncol` pattern without any structural non-zeros.
    #[must_use]
    pub fn empty(nrow: usize, ncol: usize) -> Self {
        Self {
            nrow,
            ncol,
            colind: vec![0; ncol + 1],
            row: Vec::new(),
        }
    }

    /// An `n x n` pattern with only the diagonal populated.
    #[must_use]
    pub fn diagonal(n: usize) -> Self {
        Self {
            nrow: n,
            ncol: n,
            colind: (0..=n).collect(),
            row: (0..n).collect(),
        }
    }

    /// A dense lower-triangular `n x n` pattern, diagonal included.
    #[must_use]
    pub fn lower(n: usize) -> Self {
        let mut colind = Vec::with_capacity(n + 1);
        let mut row = Vec::with_capacity(n * (n + 1) / 2);
        colind.push(0);
        for c in 0..n {
            row.extend(c..n);
            colind.push(row.len());
        }
        Self {
            nrow: n,
            ncol: n,
            colind,
            row,
        }
    }

    /// Builds a pattern from raw compressed-column data.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SchemaMismatch`] unless `colind` has `ncol + 1`
    /// non-decreasing offsets starting at zero and ending at `row.len()`,
    /// and the rows of every column are strictly increasing and below
    /// `nrow`.
    pub fn from_compressed(
        nrow: usize,
        ncol: usize,
        colind: Vec<usize>,
        row: Vec<usize>,
    ) -> Result<Self, Error> {
        if colind.len() != ncol + 1 {
            return Err(Error::schema_mismatch(format!(
                "{ncol} columns need {} column offsets, got {}",
                ncol + 1,
                colind.len()
            )));
        }
        if colind[0] != 0 || colind[ncol] != row.len() {
            return Err(Error::schema_mismatch(format!(
                "column offsets must span 0..{}, got {}..{}",
                row.len(),
                colind[0],
                colind[ncol]
            )));
        }
        for (c, bounds) in colind.windows(2).enumerate() {
            let rows = row.get(bounds[0]..bounds[1]).ok_or_else(|| {
                Error::schema_mismatch(format!("column offsets decrease at column {c}"))
            })?;
            if rows.iter().any(|&r| r >= nrow) || rows.windows(2).any(|w| w[0] >= w[1]) {
                return Err(Error::schema_mismatch(format!(
                    "rows of column {c} must be increasing and below {nrow}"
                )));
            }
        }
        Ok(Self {
            nrow,
            ncol,
            colind,
            row,
        })
    }

    /// Builds a pattern from `(row, col)` pairs.
    ///
    /// Duplicate pairs are merged. Returns `None` if any pair lies outside
    /// the `nrow x ncol` shape.
    #[must_use]
    pub fn triplet(nrow: usize, ncol: usize, entries: &[(usize, usize)]) -> Option<Self> {
        if entries.iter().any(|&(r, c)| r >= nrow || c >= ncol) {
            return None;
        }

        let mut sorted: Vec<(usize, usize)> = entries.iter().map(|&(r, c)| (c, r)).collect();
        sorted.sort_unstable();
        sorted.dedup();

        let mut colind = vec![0; ncol + 1];
        for &(c, _) in &sorted {
            colind[c + 1] += 1;
        }
        for c in 0..ncol {
            colind[c + 1] += colind[c];
        }
        let row = sorted.into_iter().map(|(_, r)| r).collect();

        Some(Self {
            nrow,
            ncol,
            colind,
            row,
        })
    }

    #[must_use]
    pub fn nrow(&self) -> usize {
        self.nrow
    }

    #[must_use]
    pub fn ncol(&self) -> usize {
        self.ncol
    }

    /// Number of elements in the shape, structural zeros included.
    #[must_use]
    pub fn numel(&self) -> usize {
        self.nrow * self.ncol
    }

    /// Number of structural non-zeros.
    #[must_use]
    pub fn nnz(&self) -> usize {
        self.row.len()
    }

    /// Returns `true` if either dimension is zero.
    ///
    /// This is a statement about the shape only. A non-empty shape can still
    /// have zero structural non-zeros; see [`Sparsity::nnz`].
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nrow == 0 || self.ncol == 0
    }

    #[must_use]
    pub fn is_column(&self) -> bool {
        self.ncol == 1
    }

    #[must_use]
    pub fn is_scalar(&self) -> bool {
        self.nrow == 1 && self.ncol == 1
    }

    #[must_use]
    pub fn is_dense(&self) -> bool {
        self.nnz() == self.numel()
    }

    /// Returns `true` if `nrow == ncol`.
    #[must_use]
    pub fn is_square(&self) -> bool {
        self.nrow == self.ncol
    }

    /// The shape formatted as `"RxC"`.
    #[must_use]
    pub fn dim(&self) -> String {
        format!("{}x{}", self.nrow, self.ncol)
    }

    /// Compressed column offsets, `ncol + 1` entries.
    #[must_use]
    pub fn colind(&self) -> &[usize] {
        &self.colind
    }

    /// Row index of each structural non-zero.
    #[must_use]
    pub fn row(&self) -> &[usize] {
        &self.row
    }

    /// Returns the position of `(r, c)` in the non-zero storage, if present.
    #[must_use]
    pub fn find(&self, r: usize, c: usize) -> Option<usize> {
        if c >= self.ncol {
            return None;
        }
        let (start, end) = (self.colind[c], self.colind[c + 1]);
        self.row[start..end]
            .binary_search(&r)
            .ok()
            .map(|offset| start + offset)
    }

    #[must_use]
    pub fn has_nz(&self, r: usize, c: usize) -> bool {
        self.find(r, c).is_some()
    }

    /// Iterates over `(row, col)` of each non-zero in storage order.
    pub fn entries(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        (0..self.ncol).flat_map(move |c| {
            self.row[self.colind[c]..self.colind[c + 1]]
                .iter()
                .map(move |&r| (r, c))
        })
    }

    /// The union of two patterns of the same shape.
    ///
    /// Returns `None` if the shapes differ.
    #[must_use]
    pub fn union(&self, other: &Self) -> Option<Self> {
        if self.nrow != other.nrow || self.ncol != other.ncol {
            return None;
        }
        let entries: Vec<_> = self.entries().chain(other.entries()).collect();
        Self::triplet(self.nrow, self.ncol, &entries)
    }
}

impl fmt::Display for Sparsity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} nz)", self.dim(), self.nnz())
    }
}

/// Deserialized compressed-column data, checked before it becomes a
/// [`Sparsity`].
#[cfg(feature = "serde")]
#[derive(serde::Deserialize)]
struct CompressedColumn {
    nrow: usize,
    ncol: usize,
    colind: Vec<usize>,
    row: Vec<usize>,
}

#[cfg(feature = "serde")]
impl TryFrom<CompressedColumn> for Sparsity {
    type Error = Error;

    fn try_from(raw: CompressedColumn) -> Result<Self, Error> {
        Self::from_compressed(raw.nrow, raw.ncol, raw.colind, raw.row)
    }
}
