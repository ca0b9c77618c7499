//! Built-in fixed-step integrators.
//!
//! Both backends integrate a semi-explicit [`Dae`](gridsim_core::Dae) with
//! a nominal step of `(tf - t0) / intervals`:
//!
//! - `"euler"` — [`Euler`], explicit first-order
//! - `"rk4"` — [`Rk4`], classical fourth-order Runge-Kutta
//!
//! # Options
//!
//! - `t0` (real, default `0`) — start of the interval
//! - `tf` (real, default `1`) — end of the interval
//! - `intervals` (int, default `20`) — number of nominal steps on `[t0, tf]`

mod config;
mod fixed_step;
mod scheme;

pub use config::{Config, ConfigError};
pub use fixed_step::FixedStep;
pub use scheme::{ForwardEuler, RungeKutta4, Scheme};

/// Fixed-step explicit Euler.
pub type Euler = FixedStep<ForwardEuler>;

/// Fixed-step classical Runge-Kutta.
pub type Rk4 = FixedStep<RungeKutta4>;
