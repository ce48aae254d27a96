//! `pulse-core`: configuration and the burn-rate vocabulary shared by the
//! scheduler and the gateway.

pub mod burn;
pub mod config;
pub mod error;

pub use burn::{classify, BurnClass, BUILDING_CEILING, OPTIMAL_FLOOR};
pub use config::PulseConfig;
pub use error::{ConfigError, Result};
