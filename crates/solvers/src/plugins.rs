//! Plugin families and the process-wide tables of built-in backends.
//!
//! Each family has one table, created on first use with the built-ins
//! registered. Further backends can be added through the guard returned by
//! [`integrators`], [`qp_solvers`] or [`stabilized_qp_solvers`]:
//!
//! ```
//! use gridsim_core::{Error, Plugin};
//! use gridsim_solvers::plugins::{self, Integrators};
//!
//! fn load_missing() -> Result<Plugin<Integrators>, String> {
//!     Err("library not available".into())
//! }
//!
//! plugins::integrators().register("missing", load_missing);
//! assert!(matches!(
//!     plugins::integrators().load_plugin("missing"),
//!     Err(Error::PluginLoad { .. })
//! ));
//! ```

use std::sync::{LazyLock, Mutex, MutexGuard, PoisonError};

use gridsim_core::{
    Dae, Error, Family, Integrator, Options, QpStructure, Registry, Schema, SolverInterface,
    solver::{integrator_input_schema, integrator_output_schema},
};

use crate::{
    integrator::{Euler, Rk4},
    qp::{self, CholeskyQp, StabilizedViaQp},
};

/// Time integrators over a [`Dae`].
#[derive(Debug)]
pub struct Integrators;

impl Family for Integrators {
    const NAME: &'static str = "integrator";
    type Structure = Dae;
    type Instance = dyn Integrator;

    fn validate(instance: &Self::Instance, dae: &Dae) -> Result<(), Error> {
        check_layout(
            instance,
            &integrator_input_schema(dae),
            &integrator_output_schema(dae),
        )
    }
}

/// QP solvers over a [`QpStructure`].
#[derive(Debug)]
pub struct QpSolvers;

impl Family for QpSolvers {
    const NAME: &'static str = "QP solver";
    type Structure = QpStructure;
    type Instance = dyn SolverInterface;

    fn validate(instance: &Self::Instance, st: &QpStructure) -> Result<(), Error> {
        check_layout(instance, &qp::input_schema(st), &qp::output_schema(st))
    }
}

/// Stabilized QP solvers over a [`QpStructure`].
#[derive(Debug)]
pub struct StabilizedQpSolvers;

impl Family for StabilizedQpSolvers {
    const NAME: &'static str = "stabilized QP solver";
    type Structure = QpStructure;
    type Instance = dyn SolverInterface;

    fn validate(instance: &Self::Instance, st: &QpStructure) -> Result<(), Error> {
        check_layout(
            instance,
            &qp::stabilized_input_schema(st),
            &qp::output_schema(st),
        )
    }
}

/// Compares declared slot layouts, ignoring schema names.
fn check_layout<I: SolverInterface + ?Sized>(
    instance: &I,
    inputs: &Schema,
    outputs: &Schema,
) -> Result<(), Error> {
    for (kind, declared, expected) in [
        ("input", instance.input_schema(), inputs),
        ("output", instance.output_schema(), outputs),
    ] {
        if declared.len() != expected.len() {
            return Err(Error::schema_mismatch(format!(
                "{} declares {} {kind} slots, expected {}",
                instance.plugin_name(),
                declared.len(),
                expected.len()
            )));
        }
        for (got, want) in declared.iter().zip(expected.iter()) {
            if got.name() != want.name() || got.sparsity() != want.sparsity() {
                return Err(Error::schema_mismatch(format!(
                    "{} {kind} `{}` is {}, expected `{}` with {}",
                    instance.plugin_name(),
                    got.name(),
                    got.sparsity(),
                    want.name(),
                    want.sparsity()
                )));
            }
        }
    }
    Ok(())
}

static INTEGRATORS: LazyLock<Mutex<Registry<Integrators>>> = LazyLock::new(|| {
    let mut registry = Registry::new();
    registry.register("euler", Euler::load);
    registry.register("rk4", Rk4::load);
    Mutex::new(registry)
});

static QP_SOLVERS: LazyLock<Mutex<Registry<QpSolvers>>> = LazyLock::new(|| {
    let mut registry = Registry::new();
    registry.register(CholeskyQp::NAME, CholeskyQp::load);
    Mutex::new(registry)
});

static STABILIZED_QP_SOLVERS: LazyLock<Mutex<Registry<StabilizedQpSolvers>>> =
    LazyLock::new(|| {
        let mut registry = Registry::new();
        registry.register(StabilizedViaQp::NAME, StabilizedViaQp::load);
        Mutex::new(registry)
    });

/// Locks the process-wide integrator table.
///
/// A table poisoned by a panicking holder is still usable; registration and
/// loading leave it consistent at every step.
pub fn integrators() -> MutexGuard<'static, Registry<Integrators>> {
    INTEGRATORS.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Locks the process-wide QP solver table.
pub fn qp_solvers() -> MutexGuard<'static, Registry<QpSolvers>> {
    QP_SOLVERS.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Locks the process-wide stabilized QP solver table.
pub fn stabilized_qp_solvers() -> MutexGuard<'static, Registry<StabilizedQpSolvers>> {
    STABILIZED_QP_SOLVERS
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

/// Creates an uninitialized integrator named `name` for `dae`.
///
/// # Errors
///
/// See [`Registry::create`].
pub fn integrator(name: &str, dae: &Dae, options: &Options) -> Result<Box<dyn Integrator>, Error> {
    integrators().create(name, dae, options)
}

/// Creates an uninitialized QP solver named `name`.
///
/// # Errors
///
/// See [`Registry::create`].
pub fn qp_solver(
    name: &str,
    structure: &QpStructure,
    options: &Options,
) -> Result<Box<dyn SolverInterface>, Error> {
    qp_solvers().create(name, structure, options)
}

/// Creates an uninitialized stabilized QP solver named `name`.
///
/// # Errors
///
/// See [`Registry::create`].
pub fn stabilized_qp_solver(
    name: &str,
    structure: &QpStructure,
    options: &Options,
) -> Result<Box<dyn SolverInterface>, Error> {
    stabilized_qp_solvers().create(name, structure, options)
}
