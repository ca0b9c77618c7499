use super::*;

use std::{cell::RefCell, rc::Rc};

use approx::assert_relative_eq;
use gridsim_core::{
    Dae,
    solver::{integrator_input_schema, integrator_output_schema},
};

use crate::integrator::{Config, Euler};

// --- Test fixtures ---

#[derive(Debug, Clone, PartialEq)]
enum Call {
    SetInterval(f64, f64),
    Init,
    Reset,
    Integrate(f64),
}

/// An integrator with identity dynamics that records every call.
///
/// Instances created by `instantiate` share the same log.
struct Recording {
    dae: Dae,
    interval: (f64, f64),
    io: Io,
    time: Option<f64>,
    fail_at: Option<f64>,
    log: Rc<RefCell<Vec<Call>>>,
}

impl Recording {
    fn new(x: Sparsity, p: Sparsity) -> Self {
        let dae = Dae::ode(x, p, |args| Ok(vec![0.0; args.x.len()]));
        let io = Io::new(integrator_input_schema(&dae), integrator_output_schema(&dae));
        Self {
            dae,
            interval: (0.0, 1.0),
            io,
            time: None,
            fail_at: None,
            log: Rc::default(),
        }
    }

    fn failing_at(mut self, t: f64) -> Self {
        self.fail_at = Some(t);
        self
    }

    fn calls(&self) -> Rc<RefCell<Vec<Call>>> {
        Rc::clone(&self.log)
    }
}

impl SolverInterface for Recording {
    fn plugin_name(&self) -> &'static str {
        "recording"
    }

    fn io(&self) -> &Io {
        &self.io
    }

    fn io_mut(&mut self) -> &mut Io {
        &mut self.io
    }

    fn init(&mut self) -> Result<(), Error> {
        self.log.borrow_mut().push(Call::Init);
        self.io.allocate();
        Ok(())
    }

    fn evaluate(&mut self) -> Result<(), Error> {
        self.reset()?;
        self.integrate(self.interval.1)
    }
}

impl Integrator for Recording {
    fn dae(&self) -> &Dae {
        &self.dae
    }

    fn interval(&self) -> (f64, f64) {
        self.interval
    }

    fn set_interval(&mut self, t0: f64, tf: f64) -> Result<(), Error> {
        self.log.borrow_mut().push(Call::SetInterval(t0, tf));
        self.interval = (t0, tf);
        Ok(())
    }

    fn time(&self) -> Option<f64> {
        self.time
    }

    fn reset(&mut self) -> Result<(), Error> {
        self.log.borrow_mut().push(Call::Reset);
        let x0 = self.io.input(slots::X0)?.clone();
        let z0 = self.io.input(slots::Z0)?.clone();
        self.io.set_output(slots::XF, &x0)?;
        self.io.set_output(slots::ZF, &z0)?;
        self.time = Some(self.interval.0);
        Ok(())
    }

    fn integrate(&mut self, t: f64) -> Result<(), Error> {
        self.log.borrow_mut().push(Call::Integrate(t));
        let current = self.time.ok_or(Error::InvalidState {
            operation: "integrate",
            phase: "not reset",
        })?;
        if t < current {
            return Err(Error::BackwardStep { current, target: t });
        }
        if self.fail_at.is_some_and(|at| t >= at) {
            return Err(Error::numerical("step size underflow"));
        }
        self.time = Some(t);
        Ok(())
    }

    fn instantiate(&self) -> Result<Box<dyn Integrator>, Error> {
        let mut fresh = Recording::new(self.dae.x().clone(), self.dae.p().clone());
        fresh.interval = self.interval;
        fresh.fail_at = self.fail_at;
        fresh.log = Rc::clone(&self.log);
        Ok(Box::new(fresh))
    }
}

fn state2() -> Recording {
    Recording::new(Sparsity::column(2), Sparsity::scalar())
}

fn ready(integrator: Recording, output_fn: Option<OutputFunction>, grid: Vec<f64>) -> Simulator {
    let mut sim = Simulator::new(Box::new(integrator), output_fn, grid).expect("valid grid");
    sim.initialize().expect("should initialize");
    sim
}

// --- Tests ---

#[test]
fn grid_inversions_fail_at_construction() {
    for grid in [vec![1.0, 0.0], vec![0.0, 2.0, 1.0], vec![0.0, 0.0, -1e-12]] {
        let err = Simulator::new(Box::new(state2()), None, grid).unwrap_err();
        assert!(matches!(err, Error::InvalidGrid { .. }));
    }
    for grid in [vec![], vec![0.0], vec![0.0, 0.0, 1.0, 3.0]] {
        let sim = Simulator::new(Box::new(state2()), None, grid).unwrap();
        assert_eq!(sim.phase(), Phase::Constructed);
    }
}

#[test]
fn buffers_are_sized_by_numel_and_grid_length() {
    let output_fn = OutputFunction::new(
        "stats",
        Inputs {
            x: Sparsity::column(2),
            ..Inputs::default()
        },
        [
            ("sum", Sparsity::scalar()),
            ("both", Sparsity::column(2)),
            ("sparse", Sparsity::triplet(3, 1, &[(1, 0)]).unwrap()),
        ],
        |args| {
            let x = args.x.nonzeros();
            Ok(vec![
                Matrix::scalar(x[0] + x[1]),
                args.x.clone(),
                Matrix::new(Sparsity::triplet(3, 1, &[(1, 0)]).unwrap(), vec![x[0]])?,
            ])
        },
    );
    let mut sim = ready(state2(), Some(output_fn), vec![0.0, 1.0, 2.0, 3.0]);

    let expected = [(1, 4), (2, 4), (3, 4)];
    for (slot, (rows, cols)) in expected.into_iter().enumerate() {
        let declared = sim.io().output_schema().slot(slot).unwrap().sparsity().clone();
        assert_eq!(declared, Sparsity::dense(rows, cols));
    }

    sim.set_input(slots::X0, &Matrix::dense_column(vec![1.0, 2.0])).unwrap();
    sim.evaluate().unwrap();
    for (slot, (rows, cols)) in expected.into_iter().enumerate() {
        assert_eq!(sim.output(slot).unwrap().nonzeros().len(), rows * cols);
    }

    // The sparse output is densified, with its structural zeros filled in.
    let sparse = sim.output_array(2).unwrap();
    assert_eq!(sparse.column(0).to_vec(), vec![0.0, 1.0, 0.0]);
    assert_eq!(sim.output_array(0).unwrap().row(0).to_vec(), vec![3.0; 4]);
}

#[test]
fn default_output_is_the_state() {
    let mut sim = ready(state2(), None, vec![0.0, 1.0, 2.0]);
    let x0 = Matrix::dense_column(vec![1.5, -2.0]);
    sim.set_input_by_name("x0", &x0).unwrap();
    sim.evaluate().unwrap();

    let xf = sim.output_array(0).unwrap();
    assert_eq!(xf.dim(), (2, 3));
    for column in xf.columns() {
        assert_eq!(column.to_vec(), x0.nonzeros());
    }
    assert_eq!(sim.output_by_name("zf").unwrap().sparsity().dim(), "0x3");
}

#[test]
fn mismatched_parameter_slot_fails_initialization() {
    let mismatches = [
        Sparsity::column(2),
        Sparsity::dense(1, 2),
        Sparsity::empty(1, 1),
    ];
    for p in mismatches {
        let output_fn = OutputFunction::new(
            "uses_p",
            Inputs {
                p,
                ..Inputs::default()
            },
            [("y", Sparsity::scalar())],
            |_| Ok(vec![Matrix::scalar(0.0)]),
        );
        let mut sim = Simulator::new(Box::new(state2()), Some(output_fn), vec![0.0, 1.0]).unwrap();
        assert!(matches!(sim.initialize(), Err(Error::SchemaMismatch { .. })));
        assert_eq!(sim.phase(), Phase::Failed);
    }
}

#[test]
fn mismatched_algebraic_slot_fails_initialization() {
    // The integrator has no algebraic variables, so any non-empty z differs.
    for z in [Sparsity::scalar(), Sparsity::column(2)] {
        let output_fn = OutputFunction::new(
            "uses_z",
            Inputs {
                z,
                ..Inputs::default()
            },
            [("y", Sparsity::scalar())],
            |_| Ok(vec![Matrix::scalar(0.0)]),
        );
        let mut sim = Simulator::new(Box::new(state2()), Some(output_fn), vec![0.0, 1.0]).unwrap();
        assert!(matches!(sim.initialize(), Err(Error::SchemaMismatch { .. })));
        assert_eq!(sim.phase(), Phase::Failed);
    }
}

#[test]
fn inputs_are_phase_checked_through_the_solver_interface() {
    let mut sim = Simulator::new(Box::new(state2()), None, vec![0.0, 1.0]).unwrap();
    let solver: &mut dyn SolverInterface = &mut sim;
    assert!(matches!(
        solver.input(slots::X0),
        Err(Error::InvalidState { .. })
    ));

    solver.init().unwrap();
    solver
        .set_input(slots::X0, &Matrix::dense_column(vec![1.0, 2.0]))
        .unwrap();
    assert_eq!(solver.input(slots::X0).unwrap().nonzeros(), &[1.0, 2.0]);
}

#[test]
fn empty_shaped_slots_skip_validation() {
    // `0x3` has an empty shape, so it is not compared with the integrator's
    // state; it also has no non-zeros, so it is never written.
    let output_fn = OutputFunction::new(
        "constant",
        Inputs {
            x: Sparsity::dense(0, 3),
            ..Inputs::default()
        },
        [("c", Sparsity::scalar())],
        |_| Ok(vec![Matrix::scalar(7.0)]),
    );
    let mut sim = ready(state2(), Some(output_fn), vec![0.0, 1.0]);
    sim.evaluate().unwrap();
    assert_eq!(sim.output(0).unwrap().nonzeros(), &[7.0, 7.0]);
}

#[test]
fn time_slot_must_be_scalar_or_empty() {
    let output_fn = OutputFunction::new(
        "bad_t",
        Inputs {
            t: Sparsity::column(2),
            ..Inputs::default()
        },
        [("y", Sparsity::scalar())],
        |_| Ok(vec![Matrix::scalar(0.0)]),
    );
    let mut sim = Simulator::new(Box::new(state2()), Some(output_fn), vec![0.0]).unwrap();
    assert!(matches!(sim.initialize(), Err(Error::SchemaMismatch { .. })));
}

#[test]
fn outputs_must_be_columns() {
    let output_fn = OutputFunction::new(
        "square",
        Inputs::default(),
        [("m", Sparsity::dense(2, 2))],
        |_| Ok(vec![Matrix::zeros(Sparsity::dense(2, 2))]),
    );
    let mut sim = Simulator::new(Box::new(state2()), Some(output_fn), vec![0.0]).unwrap();
    assert!(matches!(sim.initialize(), Err(Error::SchemaMismatch { .. })));
    assert!(matches!(sim.evaluate(), Err(Error::InvalidState { .. })));
}

#[test]
fn integrates_each_grid_point_once_in_order() {
    let integrator = state2();
    let calls = integrator.calls();
    let mut sim = ready(integrator, None, vec![0.0, 2.0, 5.0]);

    assert_eq!(
        *calls.borrow(),
        vec![Call::SetInterval(0.0, 5.0), Call::Init]
    );
    calls.borrow_mut().clear();

    sim.evaluate().unwrap();
    assert_eq!(
        *calls.borrow(),
        vec![
            Call::Reset,
            Call::Integrate(0.0),
            Call::Integrate(2.0),
            Call::Integrate(5.0),
        ]
    );
    assert_eq!(sim.integrator().time(), Some(5.0));
}

#[test]
fn empty_grid_performs_no_steps() {
    let integrator = state2();
    let calls = integrator.calls();
    let mut sim = ready(integrator, None, vec![]);
    sim.evaluate().unwrap();

    assert_eq!(*calls.borrow(), vec![Call::Init, Call::Reset]);
    assert_eq!(sim.output(0).unwrap().sparsity().dim(), "2x0");
    assert_eq!(sim.phase(), Phase::Done);
}

#[test]
fn time_and_parameters_reach_the_output_function() {
    let output_fn = OutputFunction::new(
        "scaled_time",
        Inputs {
            t: Sparsity::scalar(),
            p: Sparsity::scalar(),
            ..Inputs::default()
        },
        [("pt", Sparsity::scalar())],
        |args| Ok(vec![Matrix::scalar(args.p.nonzeros()[0] * args.t.nonzeros()[0])]),
    );
    let mut sim = ready(state2(), Some(output_fn), vec![0.0, 2.0, 5.0]);
    sim.set_input(slots::P, &Matrix::scalar(3.0)).unwrap();
    sim.evaluate().unwrap();
    assert_eq!(sim.output(0).unwrap().nonzeros(), &[0.0, 6.0, 15.0]);
}

#[test]
fn outputs_are_readable_only_when_done() {
    let mut sim = Simulator::new(Box::new(state2()), None, vec![0.0, 1.0]).unwrap();
    assert!(matches!(sim.output(0), Err(Error::InvalidState { .. })));
    assert!(matches!(
        sim.set_input(slots::X0, &Matrix::dense_column(vec![0.0, 0.0])),
        Err(Error::InvalidState { .. })
    ));

    sim.initialize().unwrap();
    assert!(matches!(sim.output(0), Err(Error::InvalidState { .. })));
    assert!(matches!(sim.initialize(), Err(Error::InvalidState { .. })));

    sim.evaluate().unwrap();
    assert_eq!(sim.outputs().unwrap().len(), 2);
}

#[test]
fn step_failures_propagate_and_poison_the_simulator() {
    let integrator = state2().failing_at(2.0);
    let mut sim = ready(integrator, None, vec![0.0, 1.0, 2.0, 3.0]);

    assert!(matches!(sim.evaluate(), Err(Error::Numerical { .. })));
    assert_eq!(sim.phase(), Phase::Failed);
    assert!(matches!(sim.output(0), Err(Error::InvalidState { .. })));
    assert!(matches!(sim.evaluate(), Err(Error::InvalidState { .. })));
}

#[test]
fn rerunning_overwrites_outputs() {
    let mut sim = ready(state2(), None, vec![0.0, 1.0]);
    sim.set_input(slots::X0, &Matrix::dense_column(vec![1.0, 1.0])).unwrap();
    sim.evaluate().unwrap();

    sim.set_input(slots::X0, &Matrix::dense_column(vec![4.0, 5.0])).unwrap();
    sim.evaluate().unwrap();
    assert_eq!(sim.output(0).unwrap().nonzeros(), &[4.0, 5.0, 4.0, 5.0]);
}

#[test]
fn observer_sees_checkpoints_in_order() {
    let mut sim = ready(state2(), None, vec![0.0, 0.5]);
    sim.set_input(slots::X0, &Matrix::dense_column(vec![1.0, 2.0])).unwrap();

    let mut seen = Vec::new();
    sim.evaluate_observed(|event: &Event<'_>| -> Option<Infallible> {
        let label = match event {
            Event::Initial { x0, .. } => format!("initial {:?}", x0.nonzeros()),
            Event::Step { index, time, .. } => format!("step {index} to {time}"),
            Event::Integrated { index, xf, .. } => format!("done {index} {:?}", xf.nonzeros()),
        };
        seen.push((event.checkpoint(), label));
        None
    })
    .unwrap();

    let labels: Vec<_> = seen.iter().map(|(_, label)| label.as_str()).collect();
    assert_eq!(
        labels,
        vec![
            "initial [1.0, 2.0]",
            "step 0 to 0",
            "done 0 [1.0, 2.0]",
            "step 1 to 0.5",
            "done 1 [1.0, 2.0]",
        ]
    );
    assert_eq!(seen[0].0, Checkpoint::Initial);
    assert!(seen[1..].iter().all(|(checkpoint, _)| *checkpoint == Checkpoint::Step));
}

#[test]
fn euler_trajectory_is_sampled_on_the_grid() {
    // x' = -x sampled at the end of each unit interval with fine steps.
    let dae = Dae::ode(Sparsity::scalar(), Sparsity::dense(0, 1), |args| {
        Ok(vec![-args.x[0]])
    });
    let config = Config::new(0.0, 1.0, 2000).unwrap();
    let integrator = Euler::new(dae, config);
    let mut sim = Simulator::new(Box::new(integrator), None, vec![0.0, 1.0, 2.0]).unwrap();
    sim.initialize().unwrap();

    // The fresh integrator was configured from the grid.
    assert_eq!(sim.integrator().interval(), (0.0, 2.0));

    sim.set_input(slots::X0, &Matrix::scalar(1.0)).unwrap();
    sim.evaluate().unwrap();
    let xf = sim.output(0).unwrap().nonzeros();
    assert_relative_eq!(xf[0], 1.0);
    assert_relative_eq!(xf[1], (-1.0_f64).exp(), epsilon = 1e-3);
    assert_relative_eq!(xf[2], (-2.0_f64).exp(), epsilon = 1e-3);
}
