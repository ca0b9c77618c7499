use gridsim_core::{Dae, DaeArgs, Error};

/// A single-step explicit method used by [`FixedStep`](super::FixedStep).
pub trait Scheme: 'static {
    /// Registry name of integrators using this scheme.
    const NAME: &'static str;

    /// Plugin documentation.
    const DOC: &'static str;

    /// Advances `x` from `t` by `h`, holding `p` fixed.
    ///
    /// `z` is the algebraic state consistent with `(t, x)`; schemes that
    /// evaluate intermediate stages re-solve it at each stage.
    ///
    /// # Errors
    ///
    /// Propagates callback failures from `dae`.
    fn step(dae: &Dae, t: f64, h: f64, x: &[f64], z: &[f64], p: &[f64]) -> Result<Vec<f64>, Error>;
}

/// Explicit (forward) Euler: `x + h f(t, x)`.
#[derive(Debug, Clone, Copy)]
pub struct ForwardEuler;

impl Scheme for ForwardEuler {
    const NAME: &'static str = "euler";
    const DOC: &'static str = "Fixed-step explicit Euler over [t0, tf] with `intervals` steps.";

    fn step(dae: &Dae, t: f64, h: f64, x: &[f64], z: &[f64], p: &[f64]) -> Result<Vec<f64>, Error> {
        let k = dae.rhs(&DaeArgs { t, x, z, p })?;
        Ok(axpy(x, h, &k))
    }
}

/// The classical fourth-order Runge-Kutta method.
#[derive(Debug, Clone, Copy)]
pub struct RungeKutta4;

impl Scheme for RungeKutta4 {
    const NAME: &'static str = "rk4";
    const DOC: &'static str =
        "Fixed-step classical Runge-Kutta (order 4) over [t0, tf] with `intervals` steps.";

    fn step(dae: &Dae, t: f64, h: f64, x: &[f64], z: &[f64], p: &[f64]) -> Result<Vec<f64>, Error> {
        let half = 0.5 * h;

        let k1 = dae.rhs(&DaeArgs { t, x, z, p })?;

        let x2 = axpy(x, half, &k1);
        let z2 = dae.algebraic(&DaeArgs { t: t + half, x: &x2, z, p })?;
        let k2 = dae.rhs(&DaeArgs { t: t + half, x: &x2, z: &z2, p })?;

        let x3 = axpy(x, half, &k2);
        let z3 = dae.algebraic(&DaeArgs { t: t + half, x: &x3, z: &z2, p })?;
        let k3 = dae.rhs(&DaeArgs { t: t + half, x: &x3, z: &z3, p })?;

        let x4 = axpy(x, h, &k3);
        let z4 = dae.algebraic(&DaeArgs { t: t + h, x: &x4, z: &z3, p })?;
        let k4 = dae.rhs(&DaeArgs { t: t + h, x: &x4, z: &z4, p })?;

        Ok(x
            .iter()
            .enumerate()
            .map(|(i, xi)| xi + h / 6.0 * (k1[i] + 2.0 * k2[i] + 2.0 * k3[i] + k4[i]))
            .collect())
    }
}

/// Returns `x + a * k`.
fn axpy(x: &[f64], a: f64, k: &[f64]) -> Vec<f64> {
    x.iter().zip(k).map(|(xi, ki)| xi + a * ki).collect()
}
