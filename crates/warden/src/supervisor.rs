use tokio::sync::watch;

use crate::health::{self, ReadyOutcome};
use crate::launcher::{self, ChildHandle, SpawnError};
use crate::policy::RestartPolicy;
use warden_core::config::LaunchConfig;
use warden_core::types::{ChildState, Decision, FailureReason, SupervisionState};

#[derive(Debug)]
pub enum SuperviseError {
	/// Could not create the child process at all. Fatal, never retried.
	Spawn(SpawnError),
	/// Restart budget exhausted; carries the last underlying failure.
	GiveUp { restarts: u32, last: FailureReason },
}

impl std::fmt::Display for SuperviseError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			SuperviseError::Spawn(e) => write!(f, "{}", e),
			SuperviseError::GiveUp { restarts, last } => {
				write!(f, "giving up after {} restarts: {}", restarts, last)
			}
		}
	}
}

impl std::error::Error for SuperviseError {
	fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
		match self {
			SuperviseError::Spawn(e) => Some(e),
			SuperviseError::GiveUp { last, .. } => Some(last),
		}
	}
}

enum RunOutcome {
	Exited(i32),
	Shutdown,
}

/// The supervision loop: start the child, poll it to readiness, then watch
/// it until it exits or a shutdown request arrives. Unexpected exits go
/// through the restart policy; a requested stop returns Ok without
/// consulting it. The previous child is always fully stopped or observed
/// exited before a new attempt holds the port.
pub async fn run(
	config: &LaunchConfig,
	mut shutdown: watch::Receiver<bool>,
) -> Result<(), SuperviseError> {
	let policy = RestartPolicy::new(config);
	let mut state = SupervisionState::default();

	loop {
		if *shutdown.borrow() {
			return Ok(());
		}

		tracing::info!("starting server on {}:{}", config.host, config.port);
		let mut handle = launcher::start(config).await.map_err(SuperviseError::Spawn)?;

		let reason = match health::await_ready(&mut handle, config, &mut shutdown).await {
			ReadyOutcome::Ready => {
				policy.on_ready(&mut state);
				tracing::info!(
					"ready on {}:{} (pid {}, took {:.1}s)",
					config.host,
					config.port,
					handle.pid,
					handle.started_at.elapsed().as_secs_f64()
				);

				match watch_running(&mut handle, &mut shutdown).await {
					RunOutcome::Shutdown => {
						tracing::info!("stop requested, terminating pid {}", handle.pid);
						launcher::stop(&mut handle, config.stop_grace).await;
						return Ok(());
					}
					RunOutcome::Exited(code) => {
						tracing::warn!("server exited unexpectedly (code {})", code);
						FailureReason::ChildDied(code)
					}
				}
			}
			ReadyOutcome::Interrupted => {
				tracing::info!("stop requested during startup, terminating pid {}", handle.pid);
				launcher::stop(&mut handle, config.stop_grace).await;
				return Ok(());
			}
			ReadyOutcome::TimedOut => {
				tracing::warn!(
					"server not ready after {:.1}s, terminating pid {}",
					config.startup_timeout.as_secs_f64(),
					handle.pid
				);
				launcher::stop(&mut handle, config.stop_grace).await;
				handle.state = ChildState::Failed;
				FailureReason::TimedOut(config.startup_timeout)
			}
			ReadyOutcome::ChildDied(code) => {
				// The shell reporting "cannot run this command" is not a
				// crash: no restart will fix it.
				if let Some(e) = launcher::shell_exec_failure(config, code) {
					return Err(SuperviseError::Spawn(e));
				}
				tracing::warn!("server exited before becoming ready (code {})", code);
				FailureReason::ChildDied(code)
			}
		};

		match policy.on_exit(&mut state, reason) {
			Decision::Restart { after } => {
				tracing::info!(
					"restarting in {:.1}s (attempt {}/{})",
					after.as_secs_f64(),
					state.consecutive_failures,
					policy.max_attempts()
				);
				tokio::select! {
					_ = tokio::time::sleep(after) => {}
					_ = shutdown.changed() => return Ok(()),
				}
			}
			Decision::GiveUp(last) => {
				return Err(SuperviseError::GiveUp {
					restarts: state.consecutive_failures,
					last,
				});
			}
		}
	}
}

async fn watch_running(handle: &mut ChildHandle, shutdown: &mut watch::Receiver<bool>) -> RunOutcome {
	tokio::select! {
		status = handle.child.wait() => {
			let code = status.ok().and_then(|s| s.code()).unwrap_or(-1);
			handle.state = ChildState::Exited(code);
			RunOutcome::Exited(code)
		}
		_ = shutdown.changed() => RunOutcome::Shutdown,
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn give_up_message_counts_restarts() {
		let err = SuperviseError::GiveUp {
			restarts: 2,
			last: FailureReason::ChildDied(1),
		};
		assert_eq!(
			err.to_string(),
			"giving up after 2 restarts: server exited with code 1"
		);
	}
}
