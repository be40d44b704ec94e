//! Library side of the `beacon` binary: configuration and tracing setup,
//! shared with the integration tests.

pub mod config;
pub mod observability;
