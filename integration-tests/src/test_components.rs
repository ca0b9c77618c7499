pub mod problems {
    use gridsim_core::{Dae, Sparsity};

    /// Exponential decay `x' = -k x` with the rate `k` as the only parameter.
    pub fn decay() -> Dae {
        Dae::ode(Sparsity::scalar(), Sparsity::scalar(), |args| {
            Ok(vec![-args.p[0] * args.x[0]])
        })
    }

    /// A unit harmonic oscillator with position and velocity as its state.
    ///
    /// The algebraic variable tracks the energy `½ (x₀² + x₁²)`, which the
    /// exact solution conserves.
    pub fn oscillator() -> Dae {
        Dae::ode(Sparsity::column(2), Sparsity::dense(0, 1), |args| {
            Ok(vec![args.x[1], -args.x[0]])
        })
        .with_algebraic(Sparsity::scalar(), |args| {
            Ok(vec![0.5 * (args.x[0] * args.x[0] + args.x[1] * args.x[1])])
        })
    }
}

pub mod exact {
    use gridsim_core::{
        Dae, Error, Integrator, Io, Matrix, Options, Plugin, SolverInterface,
        solver::{integrator_input_schema, integrator_output_schema, integrator_slots as slots},
    };
    use gridsim_solvers::plugins::Integrators;

    /// Integrates [`decay`](super::problems::decay) in closed form.
    ///
    /// Used to check that the simulator drives any [`Integrator`], not just
    /// the built-in fixed-step ones.
    pub struct ExactDecay {
        dae: Dae,
        interval: (f64, f64),
        io: Io,
        state: Option<State>,
    }

    #[derive(Debug, Clone, Copy)]
    struct State {
        t: f64,
        x0: f64,
        k: f64,
    }

    impl ExactDecay {
        pub const NAME: &'static str = "exact";

        pub fn new(dae: Dae) -> Self {
            let io = Io::new(integrator_input_schema(&dae), integrator_output_schema(&dae));
            Self {
                dae,
                interval: (0.0, 1.0),
                io,
                state: None,
            }
        }

        pub fn create(dae: &Dae, options: &Options) -> Result<Box<dyn Integrator>, Error> {
            options.ensure_known(&[])?;
            Ok(Box::new(Self::new(dae.clone())))
        }

        pub fn load() -> Result<Plugin<Integrators>, String> {
            Ok(Plugin {
                factory: Self::create,
                doc: "Closed-form exponential decay.",
            })
        }

        fn publish(&mut self) -> Result<(), Error> {
            let state = self.state.ok_or(Error::InvalidState {
                operation: "read integrator output",
                phase: "not reset",
            })?;
            let x = state.x0 * (-state.k * (state.t - self.interval.0)).exp();
            self.io.set_output(slots::XF, &Matrix::scalar(x))?;
            self.io
                .set_output(slots::ZF, &Matrix::zeros(self.dae.z().clone()))
        }
    }

    impl SolverInterface for ExactDecay {
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
            self.io.allocate();
            self.state = None;
            Ok(())
        }

        fn evaluate(&mut self) -> Result<(), Error> {
            self.reset()?;
            self.integrate(self.interval.1)
        }
    }

    impl Integrator for ExactDecay {
        fn dae(&self) -> &Dae {
            &self.dae
        }

        fn interval(&self) -> (f64, f64) {
            self.interval
        }

        fn set_interval(&mut self, t0: f64, tf: f64) -> Result<(), Error> {
            if self.is_initialized() {
                return Err(Error::InvalidState {
                    operation: "set the integration interval",
                    phase: "initialized",
                });
            }
            self.interval = (t0, tf);
            Ok(())
        }

        fn time(&self) -> Option<f64> {
            self.state.map(|state| state.t)
        }

        fn reset(&mut self) -> Result<(), Error> {
            self.state = Some(State {
                t: self.interval.0,
                x0: self.io.input(slots::X0)?.nonzeros()[0],
                k: self.io.input(slots::P)?.nonzeros()[0],
            });
            self.publish()
        }

        fn integrate(&mut self, t: f64) -> Result<(), Error> {
            let state = self.state.as_mut().ok_or(Error::InvalidState {
                operation: "integrate",
                phase: "not reset",
            })?;
            if t < state.t {
                return Err(Error::BackwardStep {
                    current: state.t,
                    target: t,
                });
            }
            state.t = t;
            self.publish()
        }

        fn instantiate(&self) -> Result<Box<dyn Integrator>, Error> {
            let mut fresh = Self::new(self.dae.clone());
            fresh.interval = self.interval;
            Ok(Box::new(fresh))
        }
    }
}
