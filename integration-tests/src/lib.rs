//! Shared fixtures for the gridsim integration tests.

pub mod test_components;
