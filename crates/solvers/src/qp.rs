//! Built-in QP and stabilized QP backends.
//!
//! - `"cholesky"` ([`CholeskyQp`]) — unconstrained minimizer via a dense
//!   Cholesky factorization of `H`
//! - `"qp"` ([`StabilizedViaQp`]) — stabilized QP that regularizes `H` and
//!   delegates to a QP plugin chosen by name
//!
//! Both declare the slot layouts in [`slots`].

mod cholesky;
mod stabilized;

pub use cholesky::CholeskyQp;
pub use stabilized::StabilizedViaQp;

use gridsim_core::{QpStructure, Schema, Sparsity};
use ndarray::{Array1, Array2};

/// Slot indices of QP and stabilized QP backends.
pub mod slots {
    pub const H: usize = 0;
    pub const G: usize = 1;
    pub const A: usize = 2;
    pub const LBA: usize = 3;
    pub const UBA: usize = 4;
    pub const LBX: usize = 5;
    pub const UBX: usize = 6;
    pub const X0: usize = 7;
    pub const LAM_X0: usize = 8;
    /// Stabilized QP only: primal regularization weight.
    pub const MU_R: usize = 9;
    /// Stabilized QP only: constraint regularization.
    pub const MU_E: usize = 10;
    /// Stabilized QP only: multiplier estimate.
    pub const MU: usize = 11;

    pub const X: usize = 0;
    pub const COST: usize = 1;
    pub const LAM_A: usize = 2;
    pub const LAM_X: usize = 3;

    pub const INPUT_NAMES: [&str; 9] =
        ["h", "g", "a", "lba", "uba", "lbx", "ubx", "x0", "lam_x0"];
    pub const STABILIZED_INPUT_NAMES: [&str; 3] = ["mu_r", "mu_e", "mu"];
    pub const OUTPUT_NAMES: [&str; 4] = ["x", "cost", "lam_a", "lam_x"];
}

/// The input schema of a QP backend for `st`.
#[must_use]
pub fn input_schema(st: &QpStructure) -> Schema {
    Schema::new("qp_in", qp_inputs(st))
}

/// The input schema of a stabilized QP backend for `st`.
#[must_use]
pub fn stabilized_input_schema(st: &QpStructure) -> Schema {
    let nc = st.nc();
    let [mu_r, mu_e, mu] = slots::STABILIZED_INPUT_NAMES;
    let mut inputs = qp_inputs(st);
    inputs.extend([
        (mu_r, Sparsity::scalar()),
        (mu_e, Sparsity::column(nc)),
        (mu, Sparsity::column(nc)),
    ]);
    Schema::new("stabilized_qp_in", inputs)
}

/// The output schema shared by QP and stabilized QP backends.
#[must_use]
pub fn output_schema(st: &QpStructure) -> Schema {
    let [x, cost, lam_a, lam_x] = slots::OUTPUT_NAMES;
    Schema::new(
        "qp_out",
        [
            (x, Sparsity::column(st.n())),
            (cost, Sparsity::scalar()),
            (lam_a, Sparsity::column(st.nc())),
            (lam_x, Sparsity::column(st.n())),
        ],
    )
}

fn qp_inputs(st: &QpStructure) -> Vec<(&'static str, Sparsity)> {
    let (n, nc) = (st.n(), st.nc());
    let [h, g, a, lba, uba, lbx, ubx, x0, lam_x0] = slots::INPUT_NAMES;
    vec![
        (h, st.h.clone()),
        (g, Sparsity::column(n)),
        (a, st.a.clone()),
        (lba, Sparsity::column(nc)),
        (uba, Sparsity::column(nc)),
        (lbx, Sparsity::column(n)),
        (ubx, Sparsity::column(n)),
        (x0, Sparsity::column(n)),
        (lam_x0, Sparsity::column(n)),
    ]
}

/// Expands the lower triangle of a sparse `n x n` matrix into a dense
/// symmetric one. Entries above the diagonal are ignored.
fn symmetric_from_lower(h: &gridsim_core::Matrix) -> Array2<f64> {
    let n = h.sparsity().ncol();
    let mut dense = Array2::zeros((n, n));
    for ((r, c), value) in h.sparsity().entries().zip(h.nonzeros()) {
        if r >= c {
            dense[[r, c]] = *value;
            dense[[c, r]] = *value;
        }
    }
    dense
}

/// Lower Cholesky factor of a symmetric matrix.
///
/// Returns `None` if the matrix is not positive definite.
fn cholesky(h: &Array2<f64>) -> Option<Array2<f64>> {
    let n = h.nrows();
    let mut l = Array2::<f64>::zeros((n, n));
    for j in 0..n {
        let mut diag = h[[j, j]];
        for k in 0..j {
            diag -= l[[j, k]] * l[[j, k]];
        }
        if !(diag > 0.0) || !diag.is_finite() {
            return None;
        }
        let ljj = diag.sqrt();
        l[[j, j]] = ljj;
        for i in (j + 1)..n {
            let mut sum = h[[i, j]];
            for k in 0..j {
                sum -= l[[i, k]] * l[[j, k]];
            }
            l[[i, j]] = sum / ljj;
        }
    }
    Some(l)
}

/// Solves `L Lᵀ x = b` given the lower Cholesky factor `L`.
fn cholesky_solve(l: &Array2<f64>, b: &Array1<f64>) -> Array1<f64> {
    let n = l.nrows();
    let mut y = Array1::<f64>::zeros(n);
    for i in 0..n {
        let mut sum = b[i];
        for k in 0..i {
            sum -= l[[i, k]] * y[k];
        }
        y[i] = sum / l[[i, i]];
    }
    let mut x = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let mut sum = y[i];
        for k in (i + 1)..n {
            sum -= l[[k, i]] * x[k];
        }
        x[i] = sum / l[[i, i]];
    }
    x
}
