use gridsim_core::{Matrix, Observer};
use gridsim_solvers::simulation::{Checkpoint, Event};

/// An owned copy of a simulation [`Event`].
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Initial {
        x0: Matrix,
        z0: Matrix,
        p: Matrix,
    },
    Step {
        index: usize,
        time: f64,
        x0: Matrix,
        z0: Matrix,
        p: Matrix,
    },
    Integrated {
        index: usize,
        time: f64,
        xf: Matrix,
        zf: Matrix,
    },
}

impl From<&Event<'_>> for Record {
    fn from(event: &Event<'_>) -> Self {
        match *event {
            Event::Initial { x0, z0, p } => Record::Initial {
                x0: x0.clone(),
                z0: z0.clone(),
                p: p.clone(),
            },
            Event::Step {
                index,
                time,
                x0,
                z0,
                p,
            } => Record::Step {
                index,
                time,
                x0: x0.clone(),
                z0: z0.clone(),
                p: p.clone(),
            },
            Event::Integrated {
                index,
                time,
                xf,
                zf,
            } => Record::Integrated {
                index,
                time,
                xf: xf.clone(),
                zf: zf.clone(),
            },
        }
    }
}

/// Stores owned copies of simulation events for inspection after a run.
///
/// Pass `&mut Recorder` to [`Simulator::evaluate_observed`] to keep access
/// to the records afterwards.
///
/// [`Simulator::evaluate_observed`]: gridsim_solvers::Simulator::evaluate_observed
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    checkpoints: Option<Vec<Checkpoint>>,
    records: Vec<Record>,
}

impl Recorder {
    /// A recorder that keeps every event.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A recorder that keeps only events of the given checkpoints.
    #[must_use]
    pub fn only(checkpoints: impl IntoIterator<Item = Checkpoint>) -> Self {
        Self {
            checkpoints: Some(checkpoints.into_iter().collect()),
            records: Vec::new(),
        }
    }

    #[must_use]
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    #[must_use]
    pub fn into_records(self) -> Vec<Record> {
        self.records
    }

    /// The `(time, xf)` pairs of every recorded integration result.
    #[must_use]
    pub fn trajectory(&self) -> Vec<(f64, Vec<f64>)> {
        self.records
            .iter()
            .filter_map(|record| match record {
                Record::Integrated { time, xf, .. } => Some((*time, xf.nonzeros().to_vec())),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    fn keeps(&self, checkpoint: Checkpoint) -> bool {
        self.checkpoints
            .as_ref()
            .is_none_or(|only| only.contains(&checkpoint))
    }
}

impl<A> Observer<Event<'_>, A> for Recorder {
    fn observe(&mut self, event: &Event<'_>) -> Option<A> {
        if self.keeps(event.checkpoint()) {
            self.records.push(Record::from(event));
        }
        None
    }
}

/// Allows `&mut Recorder` to be passed to a simulator that takes its observer
/// by value.
impl<A> Observer<Event<'_>, A> for &mut Recorder {
    fn observe(&mut self, event: &Event<'_>) -> Option<A> {
        (*self).observe(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::convert::Infallible;

    use approx::assert_relative_eq;
    use gridsim_core::{Dae, Options, Sparsity};
    use gridsim_solvers::{Simulator, plugins};

    use crate::traits::HasTime;

    fn growth_sim(grid: Vec<f64>) -> Simulator {
        let dae = Dae::ode(Sparsity::scalar(), Sparsity::dense(0, 1), |args| {
            Ok(vec![args.x[0]])
        });
        let options = Options::new().with("intervals", 100_i64);
        let integrator = plugins::integrator("rk4", &dae, &options).unwrap();
        let mut sim = Simulator::new(integrator, None, grid).unwrap();
        sim.initialize().unwrap();
        sim.set_input_by_name("x0", &Matrix::scalar(1.0)).unwrap();
        sim
    }

    #[test]
    fn records_every_event_in_order() {
        let mut sim = growth_sim(vec![0.0, 0.5, 1.0]);
        let mut recorder = Recorder::new();
        sim.evaluate_observed(&mut recorder).unwrap();

        // One initial event plus a step and an integrated event per point.
        assert_eq!(recorder.records().len(), 7);
        assert!(matches!(recorder.records()[0], Record::Initial { .. }));

        let trajectory = recorder.trajectory();
        let times: Vec<f64> = trajectory.iter().map(|(t, _)| *t).collect();
        assert_eq!(times, vec![0.0, 0.5, 1.0]);
        assert_relative_eq!(trajectory[2].1[0], 1.0_f64.exp(), epsilon = 1e-8);
    }

    #[test]
    fn filters_by_checkpoint() {
        let mut sim = growth_sim(vec![0.0, 1.0]);
        let mut recorder = Recorder::only([Checkpoint::Initial]);
        sim.evaluate_observed(&mut recorder).unwrap();

        assert_eq!(recorder.records().len(), 1);
        assert_eq!(recorder.records()[0].time(), None);
        assert!(recorder.trajectory().is_empty());
    }

    #[test]
    fn records_outlive_the_run() {
        let mut sim = growth_sim(vec![2.0]);
        let mut recorder = Recorder::new();
        sim.evaluate_observed(&mut recorder).unwrap();
        drop(sim);

        let records = recorder.into_records();
        assert_eq!(records.last().and_then(HasTime::time), Some(2.0));
    }

    #[test]
    fn works_with_any_action_type() {
        let x = Matrix::scalar(0.0);
        let event = Event::Initial {
            x0: &x,
            z0: &x,
            p: &x,
        };
        let mut recorder = Recorder::new();
        let action: Option<Infallible> = recorder.observe(&event);
        assert!(action.is_none());
        assert_eq!(recorder.records().len(), 1);
    }
}
