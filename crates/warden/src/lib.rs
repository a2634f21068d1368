//! # warden
//!
//! Supervised launcher for a vector-database server.
//!
//! Spawns an externally supplied server process, polls its health endpoint
//! until it is ready, and restarts it with bounded exponential backoff when
//! it dies. Pairs with `warden-core` for configuration and shared types.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use tokio::sync::watch;
//! use warden_core::config::LaunchConfig;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let config = LaunchConfig::default();
//! let (_shutdown_tx, shutdown_rx) = watch::channel(false);
//!
//! match warden::supervisor::run(&config, shutdown_rx).await {
//!     Ok(()) => println!("clean shutdown"),
//!     Err(e) => eprintln!("terminal failure: {}", e),
//! }
//! # }
//! ```

pub mod health;
pub mod launcher;
pub mod output;
pub mod policy;
pub mod supervisor;

pub use health::ReadyOutcome;
pub use launcher::{ChildHandle, SpawnError};
pub use policy::RestartPolicy;
pub use supervisor::SuperviseError;
