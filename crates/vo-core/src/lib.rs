//! Operations toolkit for a single-host, multi-service deployment: service
//! registry, reverse-proxy config generation, health probing and
//! git-based deploys with maintenance mode.

pub mod error;
pub mod models;
pub mod services;

pub use error::{FailedRestore, OpsError, Result};
