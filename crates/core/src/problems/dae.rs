use std::{error::Error as StdError, fmt, sync::Arc};

use crate::{Error, Sparsity};

/// Arguments passed to DAE callbacks, as non-zero slices.
#[derive(Debug, Clone, Copy)]
pub struct DaeArgs<'a> {
    pub t: f64,
    pub x: &'a [f64],
    pub z: &'a [f64],
    pub p: &'a [f64],
}

/// Signature of the DAE right-hand side and algebraic callbacks.
pub type DaeFn =
    dyn Fn(&DaeArgs<'_>) -> Result<Vec<f64>, Box<dyn StdError + Send + Sync>> + Send + Sync;

/// A semi-explicit differential-algebraic system.
///
/// ```text
/// x' = f(t, x, z, p)
/// z  = g(t, x, z_guess, p)
/// ```
///
/// The sparsity of `x`, `z` and `p` fixes the integrator's slot layout. When
/// no algebraic callback is supplied, `z` is carried unchanged from its
/// initial guess.
///
/// Callbacks are reference-counted so a `Dae` can be cloned into a fresh
/// integrator instance.
#[derive(Clone)]
pub struct Dae {
    x: Sparsity,
    z: Sparsity,
    p: Sparsity,
    ode: Arc<DaeFn>,
    alg: Option<Arc<DaeFn>>,
}

impl Dae {
    /// An ODE `x' = f(t, x, p)` without algebraic variables.
    pub fn ode<F>(x: Sparsity, p: Sparsity, f: F) -> Self
    where
        F: Fn(&DaeArgs<'_>) -> Result<Vec<f64>, Box<dyn StdError + Send + Sync>>
            + Send
            + Sync
            + 'static,
    {
        Self {
            x,
            z: Sparsity::dense(0, 1),
            p,
            ode: Arc::new(f),
            alg: None,
        }
    }

    /// Adds algebraic variables `z` computed by `g`.
    #[must_use]
    pub fn with_algebraic<G>(mut self, z: Sparsity, g: G) -> Self
    where
        G: Fn(&DaeArgs<'_>) -> Result<Vec<f64>, Box<dyn StdError + Send + Sync>>
            + Send
            + Sync
            + 'static,
    {
        self.z = z;
        self.alg = Some(Arc::new(g));
        self
    }

    /// Declares algebraic variables that are carried from their initial guess.
    #[must_use]
    pub fn with_passive_algebraic(mut self, z: Sparsity) -> Self {
        self.z = z;
        self.alg = None;
        self
    }

    #[must_use]
    pub fn x(&self) -> &Sparsity {
        &self.x
    }

    #[must_use]
    pub fn z(&self) -> &Sparsity {
        &self.z
    }

    #[must_use]
    pub fn p(&self) -> &Sparsity {
        &self.p
    }

    /// Evaluates the state derivative.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Callback`] if the callback fails and
    /// [`Error::SchemaMismatch`] if it returns the wrong number of values.
    pub fn rhs(&self, args: &DaeArgs<'_>) -> Result<Vec<f64>, Error> {
        let xdot = (self.ode)(args).map_err(Error::Callback)?;
        check_len("ode right-hand side", &xdot, self.x.nnz())?;
        Ok(xdot)
    }

    /// Solves for the algebraic variables, using `args.z` as the guess.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Callback`] if the callback fails and
    /// [`Error::SchemaMismatch`] if it returns the wrong number of values.
    pub fn algebraic(&self, args: &DaeArgs<'_>) -> Result<Vec<f64>, Error> {
        match &self.alg {
            None => Ok(args.z.to_vec()),
            Some(g) => {
                let z = g(args).map_err(Error::Callback)?;
                check_len("algebraic equation", &z, self.z.nnz())?;
                Ok(z)
            }
        }
    }
}

fn check_len(what: &str, values: &[f64], expected: usize) -> Result<(), Error> {
    if values.len() == expected {
        Ok(())
    } else {
        Err(Error::schema_mismatch(format!(
            "{what} returned {} values, expected {expected}",
            values.len()
        )))
    }
}

impl fmt::Debug for Dae {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dae")
            .field("x", &self.x)
            .field("z", &self.z)
            .field("p", &self.p)
            .field("algebraic", &self.alg.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decay() -> Dae {
        Dae::ode(Sparsity::column(2), Sparsity::scalar(), |args| {
            Ok(args.x.iter().map(|x| -args.p[0] * x).collect())
        })
    }

    #[test]
    fn ode_has_no_algebraic_variables() {
        let dae = decay();
        assert_eq!(dae.z().nnz(), 0);
        assert!(dae.z().is_empty());
    }

    #[test]
    fn rhs_uses_arguments() {
        let dae = decay();
        let args = DaeArgs {
            t: 0.0,
            x: &[1.0, 2.0],
            z: &[],
            p: &[0.5],
        };
        assert_eq!(dae.rhs(&args).unwrap(), vec![-0.5, -1.0]);
        assert!(dae.algebraic(&args).unwrap().is_empty());
    }

    #[test]
    fn rhs_length_is_checked() {
        let dae = Dae::ode(Sparsity::column(2), Sparsity::dense(0, 1), |_| Ok(vec![0.0]));
        let args = DaeArgs {
            t: 0.0,
            x: &[1.0, 2.0],
            z: &[],
            p: &[],
        };
        assert!(matches!(dae.rhs(&args), Err(Error::SchemaMismatch { .. })));
    }

    #[test]
    fn algebraic_callback_overrides_guess() {
        let dae = decay().with_algebraic(Sparsity::scalar(), |args| Ok(vec![args.x[0] + args.x[1]]));
        let args = DaeArgs {
            t: 0.0,
            x: &[1.0, 2.0],
            z: &[0.0],
            p: &[1.0],
        };
        assert_eq!(dae.algebraic(&args).unwrap(), vec![3.0]);
    }

    #[test]
    fn passive_algebraic_keeps_guess() {
        let dae = decay().with_passive_algebraic(Sparsity::scalar());
        let args = DaeArgs {
            t: 0.0,
            x: &[1.0, 2.0],
            z: &[7.0],
            p: &[1.0],
        };
        assert_eq!(dae.algebraic(&args).unwrap(), vec![7.0]);
    }
}
