use gridsim_core::{Error, Io, Matrix, Options, Plugin, QpStructure, SolverInterface, Sparsity};

use crate::plugins::{self, StabilizedQpSolvers};

use super::{output_schema, slots, stabilized_input_schema};

/// Option naming the QP plugin that solves the regularized problem.
pub const QP_SOLVER: &str = "qp_solver";

/// Option holding the options passed to the inner QP plugin, as text of the
/// form `key=value,key=value`.
pub const QP_SOLVER_OPTIONS: &str = "qp_solver_options";

/// Solves a stabilized QP by handing `H + muR I` to a QP plugin.
///
/// The inner solver is created through the process-wide QP table when this
/// instance is initialized. `mu_e` and `mu` are accepted but unused, since
/// the regularization only touches the Hessian.
pub struct StabilizedViaQp {
    structure: QpStructure,
    inner_structure: QpStructure,
    inner_name: String,
    inner_options: Options,
    inner: Option<Box<dyn SolverInterface>>,
    io: Io,
}

impl StabilizedViaQp {
    pub const NAME: &'static str = "qp";

    /// Creates an instance backed by the QP plugin `inner_name`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SchemaMismatch`] if `structure` is inconsistent.
    pub fn new(
        structure: QpStructure,
        inner_name: impl Into<String>,
        inner_options: Options,
    ) -> Result<Self, Error> {
        structure.validate()?;
        let n = structure.n();
        let h = structure
            .h
            .union(&Sparsity::diagonal(n))
            .ok_or_else(|| Error::invariant("regularized Hessian has a different shape"))?;
        let inner_structure = QpStructure::new(h, structure.a.clone());
        let io = Io::new(stabilized_input_schema(&structure), output_schema(&structure));
        Ok(Self {
            structure,
            inner_structure,
            inner_name: inner_name.into(),
            inner_options,
            inner: None,
            io,
        })
    }

    /// Registry factory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOption`] for unknown or mistyped options and
    /// [`Error::SchemaMismatch`] for an inconsistent structure.
    pub fn create(
        structure: &QpStructure,
        options: &Options,
    ) -> Result<Box<dyn SolverInterface>, Error> {
        options.ensure_known(&[QP_SOLVER, QP_SOLVER_OPTIONS])?;
        let name = options.text(QP_SOLVER)?.unwrap_or(super::CholeskyQp::NAME);
        let inner_options = match options.text(QP_SOLVER_OPTIONS)? {
            Some(text) => parse_inner_options(text)?,
            None => Options::new(),
        };
        Ok(Box::new(Self::new(structure.clone(), name, inner_options)?))
    }

    /// Registry loader.
    ///
    /// # Errors
    ///
    /// Never fails.
    pub fn load() -> Result<Plugin<StabilizedQpSolvers>, String> {
        Ok(Plugin {
            factory: Self::create,
            doc: "Stabilized QP solved as a QP with Hessian H + muR I. \
                  The QP plugin is chosen with `qp_solver`.",
        })
    }

    /// The name of the QP plugin solving the regularized problem.
    #[must_use]
    pub fn inner_name(&self) -> &str {
        &self.inner_name
    }

    fn regularized_hessian(&self, mu_r: f64) -> Result<Matrix, Error> {
        let h = self.io.input(slots::H)?;
        let sp = &self.inner_structure.h;
        let mut values = vec![0.0; sp.nnz()];
        for ((r, c), value) in h.sparsity().entries().zip(h.nonzeros()) {
            let k = sp
                .find(r, c)
                .ok_or_else(|| Error::invariant(format!("H[{r},{c}] missing from regularized pattern")))?;
            values[k] = *value;
        }
        for i in 0..self.structure.n() {
            let k = sp
                .find(i, i)
                .ok_or_else(|| Error::invariant(format!("diagonal {i} missing from regularized pattern")))?;
            values[k] += mu_r;
        }
        Matrix::new(sp.clone(), values)
    }
}

impl SolverInterface for StabilizedViaQp {
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
        let mut inner = plugins::qp_solver(&self.inner_name, &self.inner_structure, &self.inner_options)?;
        inner.init()?;

        self.io.allocate();
        // Inherit the inner solver's default bounds.
        for slot in [slots::LBA, slots::UBA, slots::LBX, slots::UBX] {
            self.io.set_input(slot, inner.input(slot)?)?;
        }
        self.inner = Some(inner);

        tracing::debug!(
            plugin = Self::NAME,
            qp_solver = %self.inner_name,
            "stabilized QP solver initialized"
        );
        Ok(())
    }

    fn evaluate(&mut self) -> Result<(), Error> {
        let mu_r = self.io.input(slots::MU_R)?.nonzeros()[0];
        if !(mu_r >= 0.0) {
            return Err(Error::numerical(format!(
                "regularization mu_r must be non-negative, got {mu_r}"
            )));
        }
        let h = self.regularized_hessian(mu_r)?;

        let inner = self.inner.as_mut().ok_or_else(|| Error::NotInitialized {
            what: Self::NAME.to_string(),
        })?;
        inner.set_input(slots::H, &h)?;
        for slot in [
            slots::G,
            slots::A,
            slots::LBA,
            slots::UBA,
            slots::LBX,
            slots::UBX,
            slots::X0,
            slots::LAM_X0,
        ] {
            inner.set_input(slot, self.io.input(slot)?)?;
        }
        inner.evaluate()?;

        let x = inner.output(slots::X)?.clone();
        let penalty: f64 = x.nonzeros().iter().map(|v| v * v).sum::<f64>() * 0.5 * mu_r;
        let cost = inner.output(slots::COST)?.nonzeros()[0] - penalty;

        self.io.set_output(slots::X, &x)?;
        self.io.set_output(slots::COST, &Matrix::scalar(cost))?;
        self.io.set_output(slots::LAM_A, inner.output(slots::LAM_A)?)?;
        self.io.set_output(slots::LAM_X, inner.output(slots::LAM_X)?)
    }
}

/// Parses `key=value` pairs separated by commas.
///
/// Values parse as integer, then real, then `true`/`false`, falling back to
/// text.
fn parse_inner_options(text: &str) -> Result<Options, Error> {
    let mut options = Options::new();
    for pair in text.split(',').map(str::trim).filter(|pair| !pair.is_empty()) {
        let (key, value) = pair.split_once('=').ok_or_else(|| Error::InvalidOption {
            name: QP_SOLVER_OPTIONS.into(),
            reason: format!("expected `key=value`, got `{pair}`"),
        })?;
        let (key, value) = (key.trim(), value.trim());
        if let Ok(int) = value.parse::<i64>() {
            options.set(key, int);
        } else if let Ok(real) = value.parse::<f64>() {
            options.set(key, real);
        } else if let Ok(flag) = value.parse::<bool>() {
            options.set(key, flag);
        } else {
            options.set(key, value);
        }
    }
    Ok(options)
}
