use std::marker::PhantomData;

use gridsim_core::{
    Dae, DaeArgs, Error, Integrator, Io, Matrix, Options, Plugin, SolverInterface,
    solver::{integrator_input_schema, integrator_output_schema, integrator_slots as slots},
};

use crate::plugins::Integrators;

use super::{Config, Scheme};

/// A fixed-step integrator parameterized by its single-step [`Scheme`].
///
/// The nominal step is `(tf - t0) / intervals`. Each call to
/// [`Integrator::integrate`] takes nominal steps toward the target and clips
/// the last one so the clock lands exactly on it. Targets beyond `tf` are
/// reached the same way.
pub struct FixedStep<S: Scheme> {
    dae: Dae,
    config: Config,
    io: Io,
    state: Option<State>,
    scheme: PhantomData<S>,
}

/// The trajectory point the integrator currently sits at.
#[derive(Debug, Clone)]
struct State {
    t: f64,
    x: Vec<f64>,
    z: Vec<f64>,
    p: Vec<f64>,
}

impl<S: Scheme> FixedStep<S> {
    #[must_use]
    pub fn new(dae: Dae, config: Config) -> Self {
        let io = Io::new(integrator_input_schema(&dae), integrator_output_schema(&dae));
        Self {
            dae,
            config,
            io,
            state: None,
            scheme: PhantomData,
        }
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Registry factory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOption`] if `options` cannot be read into a
    /// [`Config`].
    pub fn create(dae: &Dae, options: &Options) -> Result<Box<dyn Integrator>, Error> {
        let config = Config::from_options(options)?;
        Ok(Box::new(Self::new(dae.clone(), config)))
    }

    /// Registry loader.
    ///
    /// # Errors
    ///
    /// Never fails; built-in schemes are always available.
    pub fn load() -> Result<Plugin<Integrators>, String> {
        Ok(Plugin {
            factory: Self::create,
            doc: S::DOC,
        })
    }

    fn publish(&mut self) -> Result<(), Error> {
        let state = self.state.as_ref().ok_or(Error::InvalidState {
            operation: "read integrator output",
            phase: "not reset",
        })?;
        let xf = Matrix::new(self.dae.x().clone(), state.x.clone())?;
        let zf = Matrix::new(self.dae.z().clone(), state.z.clone())?;
        self.io.set_output(slots::XF, &xf)?;
        self.io.set_output(slots::ZF, &zf)
    }
}

impl<S: Scheme> SolverInterface for FixedStep<S> {
    fn plugin_name(&self) -> &'static str {
        S::NAME
    }

    fn io(&self) -> &Io {
        &self.io
    }

    fn io_mut(&mut self) -> &mut Io {
        &mut self.io
    }

    fn init(&mut self) -> Result<(), Error> {
        let config = Config::new(self.config.t0(), self.config.tf(), self.config.intervals())?;
        self.config = config;
        self.io.allocate();
        self.state = None;
        tracing::debug!(
            plugin = S::NAME,
            t0 = config.t0(),
            tf = config.tf(),
            intervals = config.intervals(),
            "integrator initialized"
        );
        Ok(())
    }

    /// Integrates over the whole configured interval `[t0, tf]`.
    fn evaluate(&mut self) -> Result<(), Error> {
        self.reset()?;
        self.integrate(self.config.tf())
    }
}

impl<S: Scheme> Integrator for FixedStep<S> {
    fn dae(&self) -> &Dae {
        &self.dae
    }

    fn interval(&self) -> (f64, f64) {
        (self.config.t0(), self.config.tf())
    }

    fn set_interval(&mut self, t0: f64, tf: f64) -> Result<(), Error> {
        if self.is_initialized() {
            return Err(Error::InvalidState {
                operation: "set the integration interval",
                phase: "initialized",
            });
        }
        self.config = self.config.with_interval(t0, tf)?;
        Ok(())
    }

    fn time(&self) -> Option<f64> {
        self.state.as_ref().map(|state| state.t)
    }

    fn reset(&mut self) -> Result<(), Error> {
        let t = self.config.t0();
        let x = self.io.input(slots::X0)?.nonzeros().to_vec();
        let z0 = self.io.input(slots::Z0)?.nonzeros().to_vec();
        let p = self.io.input(slots::P)?.nonzeros().to_vec();
        let z = self.dae.algebraic(&DaeArgs {
            t,
            x: &x,
            z: &z0,
            p: &p,
        })?;

        self.state = Some(State { t, x, z, p });
        self.publish()
    }

    fn integrate(&mut self, t: f64) -> Result<(), Error> {
        let max_step = self.config.max_step();
        let state = self.state.as_mut().ok_or(Error::InvalidState {
            operation: "integrate",
            phase: "not reset",
        })?;

        if !t.is_finite() {
            return Err(Error::numerical(format!(
                "{} integrator target must be finite, got {t}",
                S::NAME
            )));
        }
        if t < state.t {
            return Err(Error::BackwardStep {
                current: state.t,
                target: t,
            });
        }

        while state.t < t {
            let remaining = t - state.t;
            let (h, next) = if max_step > 0.0 && remaining > max_step {
                (max_step, state.t + max_step)
            } else {
                (remaining, t)
            };
            // A step too small to move the clock jumps straight to the target.
            let (h, next) = if next > state.t { (h, next) } else { (remaining, t) };

            let x = S::step(&self.dae, state.t, h, &state.x, &state.z, &state.p)?;
            if let Some(i) = x.iter().position(|v| !v.is_finite()) {
                return Err(Error::numerical(format!(
                    "{} integrator diverged: x[{i}] = {} at t = {next}",
                    S::NAME,
                    x[i]
                )));
            }
            let z = self.dae.algebraic(&DaeArgs {
                t: next,
                x: &x,
                z: &state.z,
                p: &state.p,
            })?;

            state.t = next;
            state.x = x;
            state.z = z;
        }

        self.publish()
    }

    fn instantiate(&self) -> Result<Box<dyn Integrator>, Error> {
        Ok(Box::new(Self::new(self.dae.clone(), self.config)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;
    use gridsim_core::Sparsity;

    use crate::integrator::{Euler, Rk4};

    /// x' = -k x with k as the single parameter.
    fn decay() -> Dae {
        Dae::ode(Sparsity::scalar(), Sparsity::scalar(), |args| {
            Ok(vec![-args.p[0] * args.x[0]])
        })
    }

    fn ready<S: Scheme>(mut integrator: FixedStep<S>, x0: f64, k: f64) -> FixedStep<S> {
        integrator.init().unwrap();
        integrator.set_input(slots::X0, &Matrix::scalar(x0)).unwrap();
        integrator.set_input(slots::P, &Matrix::scalar(k)).unwrap();
        integrator
    }

    #[test]
    fn accessing_slots_requires_init() {
        let integrator = Euler::new(decay(), Config::default());
        assert!(!integrator.is_initialized());
        assert!(matches!(
            integrator.input(slots::X0),
            Err(Error::NotInitialized { .. })
        ));
    }

    #[test]
    fn integrate_requires_reset() {
        let mut integrator = ready(Euler::new(decay(), Config::default()), 1.0, 1.0);
        assert!(matches!(
            integrator.integrate(0.5),
            Err(Error::InvalidState { .. })
        ));
    }

    #[test]
    fn euler_steps_are_clipped_to_target() {
        let config = Config::new(0.0, 1.0, 4).unwrap();
        let mut integrator = ready(Euler::new(decay(), config), 1.0, 1.0);
        integrator.reset().unwrap();

        integrator.integrate(0.3).unwrap();
        assert_eq!(integrator.time(), Some(0.3));
        // One full step of 0.25 then a clipped step of 0.05.
        let expected = (1.0 - 0.25) * (1.0 - 0.05);
        assert_relative_eq!(
            integrator.output(slots::XF).unwrap().nonzeros()[0],
            expected,
            epsilon = 1e-15
        );
    }

    #[test]
    fn rk4_tracks_exponential_decay() {
        let config = Config::new(0.0, 2.0, 40).unwrap();
        let mut integrator = ready(Rk4::new(decay(), config), 3.0, 0.5);
        integrator.evaluate().unwrap();

        let xf = integrator.output(slots::XF).unwrap().nonzeros()[0];
        assert_relative_eq!(xf, 3.0 * (-1.0_f64).exp(), epsilon = 1e-6);
        assert_eq!(integrator.time(), Some(2.0));
    }

    #[test]
    fn backward_targets_are_rejected() {
        let mut integrator = ready(Euler::new(decay(), Config::default()), 1.0, 1.0);
        integrator.reset().unwrap();
        integrator.integrate(0.5).unwrap();
        integrator.integrate(0.5).unwrap();
        assert!(matches!(
            integrator.integrate(0.4),
            Err(Error::BackwardStep { current, target }) if current == 0.5 && target == 0.4
        ));
    }

    #[test]
    fn non_finite_targets_are_rejected() {
        let mut integrator = ready(Euler::new(decay(), Config::default()), 1.0, 1.0);
        integrator.reset().unwrap();

        assert!(matches!(
            integrator.integrate(f64::NAN),
            Err(Error::Numerical { .. })
        ));
        assert!(matches!(
            integrator.integrate(f64::INFINITY),
            Err(Error::Numerical { .. })
        ));
        assert_eq!(integrator.time(), Some(0.0));
        assert_eq!(integrator.output(slots::XF).unwrap().nonzeros(), &[1.0]);
    }

    #[test]
    fn unresolvable_steps_span_the_whole_remainder() {
        // At 1e17 the spacing between floats is 16, so a nominal step of 1
        // cannot move the clock.
        let t0 = 1e17;
        let config = Config::new(t0, t0 + 64.0, 64).unwrap();
        let mut integrator = ready(Euler::new(decay(), config), 1.0, 1e-3);
        integrator.reset().unwrap();
        integrator.integrate(t0 + 64.0).unwrap();

        assert_eq!(integrator.time(), Some(t0 + 64.0));
        assert_relative_eq!(
            integrator.output(slots::XF).unwrap().nonzeros()[0],
            1.0 - 64.0 * 1e-3,
            epsilon = 1e-12
        );
    }

    #[test]
    fn reset_restarts_the_trajectory() {
        let mut integrator = ready(Euler::new(decay(), Config::default()), 2.0, 1.0);
        integrator.reset().unwrap();
        integrator.integrate(1.0).unwrap();
        assert!(integrator.output(slots::XF).unwrap().nonzeros()[0] < 2.0);

        integrator.reset().unwrap();
        assert_eq!(integrator.time(), Some(0.0));
        assert_eq!(integrator.output(slots::XF).unwrap().nonzeros(), &[2.0]);
    }

    #[test]
    fn divergence_is_a_numerical_error() {
        let dae = Dae::ode(Sparsity::scalar(), Sparsity::dense(0, 1), |args| {
            Ok(vec![args.x[0] * 1e300])
        });
        let mut integrator = Euler::new(dae, Config::default());
        integrator.init().unwrap();
        integrator.set_input(slots::X0, &Matrix::scalar(1e300)).unwrap();
        assert!(matches!(
            integrator.evaluate(),
            Err(Error::Numerical { .. })
        ));
    }

    #[test]
    fn interval_is_fixed_after_init() {
        let mut integrator = Euler::new(decay(), Config::default());
        integrator.set_interval(1.0, 3.0).unwrap();
        assert_eq!(integrator.interval(), (1.0, 3.0));
        assert!(integrator.set_interval(2.0, 1.0).is_err());

        integrator.init().unwrap();
        assert!(matches!(
            integrator.set_interval(0.0, 1.0),
            Err(Error::InvalidState { .. })
        ));
    }

    #[test]
    fn instantiate_copies_configuration_but_not_buffers() {
        let mut integrator = Euler::new(decay(), Config::new(0.0, 5.0, 10).unwrap());
        integrator.init().unwrap();

        let fresh = integrator.instantiate().unwrap();
        assert!(!fresh.is_initialized());
        assert_eq!(fresh.interval(), (0.0, 5.0));
        assert_eq!(fresh.plugin_name(), "euler");
    }

    #[test]
    fn algebraic_variables_follow_the_state() {
        let dae = decay().with_algebraic(Sparsity::scalar(), |args| Ok(vec![2.0 * args.x[0]]));
        let mut integrator = Euler::new(dae, Config::default());
        integrator.init().unwrap();
        integrator.set_input(slots::X0, &Matrix::scalar(1.0)).unwrap();
        integrator.set_input(slots::P, &Matrix::scalar(1.0)).unwrap();
        integrator.reset().unwrap();
        assert_eq!(integrator.output(slots::ZF).unwrap().nonzeros(), &[2.0]);

        integrator.integrate(0.5).unwrap();
        let x = integrator.output(slots::XF).unwrap().nonzeros()[0];
        let z = integrator.output(slots::ZF).unwrap().nonzeros()[0];
        assert_relative_eq!(z, 2.0 * x);
    }
}
