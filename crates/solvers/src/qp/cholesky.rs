use gridsim_core::{Error, Io, Matrix, Options, Plugin, QpStructure, SolverInterface, Sparsity};
use ndarray::Array1;
use thiserror::Error;

use crate::plugins::QpSolvers;

use super::{cholesky, cholesky_solve, input_schema, output_schema, slots, symmetric_from_lower};

/// Configuration of [`CholeskyQp`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CholeskyConfig {
    tolerance: f64,
}

/// Errors that can occur when validating a [`CholeskyConfig`].
#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum CholeskyConfigError {
    #[error("tolerance must be finite and non-negative, got {0}")]
    Tolerance(f64),
}

impl From<CholeskyConfigError> for Error {
    fn from(err: CholeskyConfigError) -> Self {
        Error::InvalidOption {
            name: "tolerance".into(),
            reason: err.to_string(),
        }
    }
}

impl Default for CholeskyConfig {
    fn default() -> Self {
        Self { tolerance: 1e-9 }
    }
}

impl CholeskyConfig {
    pub const KEYS: [&'static str; 1] = ["tolerance"];

    /// Creates a validated config.
    ///
    /// # Errors
    ///
    /// Returns an error if `tolerance` is negative or not finite.
    pub fn new(tolerance: f64) -> Result<Self, CholeskyConfigError> {
        if !tolerance.is_finite() || tolerance < 0.0 {
            return Err(CholeskyConfigError::Tolerance(tolerance));
        }
        Ok(Self { tolerance })
    }

    /// # Errors
    ///
    /// Returns [`Error::InvalidOption`] for unknown keys or a bad tolerance.
    pub fn from_options(options: &Options) -> Result<Self, Error> {
        options.ensure_known(&Self::KEYS)?;
        let tolerance = options
            .real("tolerance")?
            .unwrap_or(Self::default().tolerance);
        Ok(Self::new(tolerance)?)
    }

    /// Allowed bound violation of the unconstrained minimizer.
    #[must_use]
    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }
}

/// Dense Cholesky solver for QPs whose bounds are inactive at the optimum.
///
/// Solves `H x = -g` and then checks the result against the bounds. A bound
/// that would be active is reported as a numerical failure rather than
/// handled.
pub struct CholeskyQp {
    structure: QpStructure,
    config: CholeskyConfig,
    io: Io,
}

impl CholeskyQp {
    pub const NAME: &'static str = "cholesky";

    #[must_use]
    pub fn new(structure: QpStructure, config: CholeskyConfig) -> Self {
        let io = Io::new(input_schema(&structure), output_schema(&structure));
        Self {
            structure,
            config,
            io,
        }
    }

    /// Registry factory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOption`] for unreadable options.
    pub fn create(
        structure: &QpStructure,
        options: &Options,
    ) -> Result<Box<dyn SolverInterface>, Error> {
        let config = CholeskyConfig::from_options(options)?;
        Ok(Box::new(Self::new(structure.clone(), config)))
    }

    /// Registry loader.
    ///
    /// # Errors
    ///
    /// Never fails.
    pub fn load() -> Result<Plugin<QpSolvers>, String> {
        Ok(Plugin {
            factory: Self::create,
            doc: "Unconstrained QP minimizer using a dense Cholesky factorization of H. \
                  Fails if the solution violates a bound.",
        })
    }

    fn check_bounds(&self, what: &str, values: &[f64], lower: usize, upper: usize) -> Result<(), Error> {
        let tol = self.config.tolerance;
        let lb = self.io.input(lower)?.nonzeros();
        let ub = self.io.input(upper)?.nonzeros();
        for (i, value) in values.iter().enumerate() {
            if *value < lb[i] - tol || *value > ub[i] + tol {
                return Err(Error::numerical(format!(
                    "{what}[{i}] = {value} violates [{}, {}]; active constraints are not supported",
                    lb[i], ub[i]
                )));
            }
        }
        Ok(())
    }
}

impl SolverInterface for CholeskyQp {
    fn plugin_name(&self) -> &'static str {
        Self::NAME
    }

    fn io(&self) -> &Io {
        &self.io
    }

    fn io_mut(&mut self) -> &mut Io {
        &mut self.io
    }

    fn init(&mut self) -> Result<(), Error> {
        self.structure.validate()?;
        let n = self.structure.n();
        if let Some(i) = (0..n).find(|&i| !self.structure.h.has_nz(i, i)) {
            return Err(Error::numerical(format!(
                "H[{i},{i}] is structurally zero, H cannot be positive definite"
            )));
        }

        self.io.allocate();
        let nc = self.structure.nc();
        let fill = |len: usize, value: f64| Matrix::new(Sparsity::column(len), vec![value; len]);
        self.io.set_input(slots::LBX, &fill(n, f64::NEG_INFINITY)?)?;
        self.io.set_input(slots::UBX, &fill(n, f64::INFINITY)?)?;
        self.io.set_input(slots::LBA, &fill(nc, f64::NEG_INFINITY)?)?;
        self.io.set_input(slots::UBA, &fill(nc, f64::INFINITY)?)?;

        tracing::debug!(plugin = Self::NAME, n, nc, "QP solver initialized");
        Ok(())
    }

    fn evaluate(&mut self) -> Result<(), Error> {
        let h = symmetric_from_lower(self.io.input(slots::H)?);
        let l = cholesky(&h).ok_or_else(|| Error::numerical("H is not positive definite"))?;

        let g = Array1::from(self.io.input(slots::G)?.nonzeros().to_vec());
        let x = cholesky_solve(&l, &-&g);
        let cost = 0.5 * x.dot(&h.dot(&x)) + g.dot(&x);

        let ax = self.io.input(slots::A)?.to_dense().dot(&x).to_vec();
        let x = x.to_vec();
        self.check_bounds("x", &x, slots::LBX, slots::UBX)?;
        self.check_bounds("Ax", &ax, slots::LBA, slots::UBA)?;

        let (n, nc) = (self.structure.n(), self.structure.nc());
        self.io.set_output(slots::X, &Matrix::dense_column(x))?;
        self.io.set_output(slots::COST, &Matrix::scalar(cost))?;
        self.io.set_output(slots::LAM_A, &Matrix::zeros(Sparsity::column(nc)))?;
        self.io.set_output(slots::LAM_X, &Matrix::zeros(Sparsity::column(n)))?;

        tracing::trace!(plugin = Self::NAME, cost, "QP solved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;

    /// H = [[2, 0], [0, 4]] stored as its lower triangle.
    fn diag_structure() -> QpStructure {
        QpStructure::unconstrained(Sparsity::lower(2))
    }

    fn solver(structure: QpStructure) -> CholeskyQp {
        let mut qp = CholeskyQp::new(structure, CholeskyConfig::default());
        qp.init().unwrap();
        qp
    }

    #[test]
    fn solves_unconstrained_problem() {
        let mut qp = solver(diag_structure());
        // Lower triangle of 2x2, column-major: (0,0), (1,0), (1,1).
        let h = Matrix::new(Sparsity::lower(2), vec![2.0, 0.0, 4.0]).unwrap();
        qp.set_input(slots::H, &h).unwrap();
        qp.set_input(slots::G, &Matrix::dense_column(vec![-2.0, -8.0])).unwrap();
        qp.evaluate().unwrap();

        let x = qp.output(slots::X).unwrap().nonzeros();
        assert_relative_eq!(x[0], 1.0, epsilon = 1e-14);
        assert_relative_eq!(x[1], 2.0, epsilon = 1e-14);
        // ½(2 + 16) - (2 + 16)
        assert_relative_eq!(qp.output(slots::COST).unwrap().nonzeros()[0], -9.0, epsilon = 1e-12);
        assert_eq!(qp.output(slots::LAM_X).unwrap().nonzeros(), &[0.0, 0.0]);
    }

    #[test]
    fn structurally_singular_h_fails_init() {
        let structure = QpStructure::unconstrained(Sparsity::triplet(2, 2, &[(0, 0)]).unwrap());
        let mut qp = CholeskyQp::new(structure, CholeskyConfig::default());
        assert!(matches!(qp.init(), Err(Error::Numerical { .. })));
        assert!(!qp.is_initialized());
    }

    #[test]
    fn non_square_h_fails_init() {
        let structure = QpStructure::new(Sparsity::dense(2, 3), Sparsity::empty(0, 3));
        let mut qp = CholeskyQp::new(structure, CholeskyConfig::default());
        assert!(matches!(qp.init(), Err(Error::SchemaMismatch { .. })));
    }

    #[test]
    fn indefinite_h_fails_evaluate() {
        let mut qp = solver(diag_structure());
        let h = Matrix::new(Sparsity::lower(2), vec![1.0, 3.0, 1.0]).unwrap();
        qp.set_input(slots::H, &h).unwrap();
        assert!(matches!(qp.evaluate(), Err(Error::Numerical { .. })));
    }

    #[test]
    fn active_bounds_are_reported() {
        let mut qp = solver(diag_structure());
        let h = Matrix::new(Sparsity::lower(2), vec![2.0, 0.0, 4.0]).unwrap();
        qp.set_input(slots::H, &h).unwrap();
        qp.set_input(slots::G, &Matrix::dense_column(vec![-2.0, -8.0])).unwrap();
        qp.set_input(slots::UBX, &Matrix::dense_column(vec![0.5, 10.0])).unwrap();
        assert!(matches!(qp.evaluate(), Err(Error::Numerical { .. })));
    }

    #[test]
    fn linear_constraints_are_checked() {
        let structure = QpStructure::new(Sparsity::lower(2), Sparsity::dense(1, 2));
        let mut qp = solver(structure);
        let h = Matrix::new(Sparsity::lower(2), vec![2.0, 0.0, 4.0]).unwrap();
        qp.set_input(slots::H, &h).unwrap();
        qp.set_input(slots::G, &Matrix::dense_column(vec![-2.0, -8.0])).unwrap();
        let a = Matrix::new(Sparsity::dense(1, 2), vec![1.0, 1.0]).unwrap();
        qp.set_input(slots::A, &a).unwrap();

        // x = (1, 2) satisfies x0 + x1 <= 3 exactly.
        qp.set_input(slots::UBA, &Matrix::scalar(3.0)).unwrap();
        qp.evaluate().unwrap();

        qp.set_input(slots::UBA, &Matrix::scalar(2.5)).unwrap();
        assert!(matches!(qp.evaluate(), Err(Error::Numerical { .. })));
    }

    #[test]
    fn options_are_validated() {
        let options = Options::new().with("tolerance", -1.0);
        assert!(matches!(
            CholeskyConfig::from_options(&options),
            Err(Error::InvalidOption { .. })
        ));
        let options = Options::new().with("max_iter", 3_i64);
        assert!(CholeskyConfig::from_options(&options).is_err());
        assert_eq!(
            CholeskyConfig::from_options(&Options::new()).unwrap(),
            CholeskyConfig::default()
        );
    }
}
