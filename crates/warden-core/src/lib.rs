pub mod config;
pub mod types;

pub use config::{ConfigError, LaunchConfig, Verbosity};
pub use types::{ChildState, Decision, FailureReason, SupervisionState};
