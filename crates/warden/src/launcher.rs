use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::process::{Child, Command};

use crate::output;
use warden_core::config::LaunchConfig;
use warden_core::types::ChildState;

/// One running attempt of the server process. Owned exclusively by the
/// supervision loop; at most one handle is live at a time.
pub struct ChildHandle {
	pub pid: u32,
	pub started_at: Instant,
	pub state: ChildState,
	pub(crate) child: Child,
}

#[derive(Debug)]
pub enum SpawnError {
	/// A foreign process already holds the configured port.
	PortInUse { host: String, port: u16 },
	/// The shell could not execute the command (127: not found,
	/// 126: not executable).
	CommandNotRunnable { command: String, code: i32 },
	Io(std::io::Error),
}

impl std::fmt::Display for SpawnError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			SpawnError::PortInUse { host, port } => {
				write!(f, "{}:{} is already bound by another process", host, port)
			}
			SpawnError::CommandNotRunnable { command, code } => {
				let why = if *code == 127 {
					"command not found"
				} else {
					"not executable"
				};
				write!(f, "cannot run '{}': {}", command, why)
			}
			SpawnError::Io(e) => write!(f, "failed to spawn server: {}", e),
		}
	}
}

impl std::error::Error for SpawnError {
	fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
		match self {
			SpawnError::Io(e) => Some(e),
			SpawnError::PortInUse { .. } | SpawnError::CommandNotRunnable { .. } => None,
		}
	}
}

/// Spawn the server process in its own process group, stdout/stderr piped
/// through the output forwarder. The port is bind-probed first so a foreign
/// listener fails fast instead of burning restart attempts.
pub async fn start(config: &LaunchConfig) -> Result<ChildHandle, SpawnError> {
	probe_port_free(&config.host, config.port).await?;

	let command = render_command(config);
	let mut cmd = Command::new("sh");
	cmd.args(["-c", &command])
		.stdout(Stdio::piped())
		.stderr(Stdio::piped())
		.process_group(0);

	let mut child = cmd.spawn().map_err(SpawnError::Io)?;
	let pid = child.id().unwrap_or(0);

	if let Some(stdout) = child.stdout.take() {
		tokio::spawn(output::forward(stdout, pid, "stdout"));
	}
	if let Some(stderr) = child.stderr.take() {
		tokio::spawn(output::forward(stderr, pid, "stderr"));
	}

	tracing::debug!("spawned pid {}: {}", pid, command);

	Ok(ChildHandle {
		pid,
		started_at: Instant::now(),
		state: ChildState::Starting,
		child,
	})
}

/// Graceful termination: SIGTERM to the process group, wait out the grace
/// period, SIGKILL, then block until the process has been reaped. Best
/// effort, never fails; the handle ends in Exited.
pub async fn stop(handle: &mut ChildHandle, grace: Duration) {
	signal_group(handle.pid, nix::sys::signal::Signal::SIGTERM);

	let code = match tokio::time::timeout(grace, handle.child.wait()).await {
		Ok(Ok(status)) => status.code().unwrap_or(-1),
		Ok(Err(e)) => {
			tracing::debug!("wait after SIGTERM failed: {}", e);
			-1
		}
		Err(_) => {
			tracing::warn!(
				"pid {} did not exit within {:.1}s, sending SIGKILL",
				handle.pid,
				grace.as_secs_f64()
			);
			signal_group(handle.pid, nix::sys::signal::Signal::SIGKILL);
			match handle.child.wait().await {
				Ok(status) => status.code().unwrap_or(-1),
				Err(_) => -1,
			}
		}
	};

	handle.state = ChildState::Exited(code);
}

/// Substitute config placeholders into the server command line.
pub fn render_command(config: &LaunchConfig) -> String {
	config
		.command
		.replace("{host}", &config.host)
		.replace("{port}", &config.port.to_string())
		.replace("{log_level}", config.verbosity.as_str())
}

/// Shell-reserved exit codes: 127 means the command was not found, 126 that
/// it exists but cannot be executed. `sh -c` only reports these after the
/// fact, so a child dying with one of them before readiness is an unfixable
/// launch problem, not a crash worth retrying.
pub fn shell_exec_failure(config: &LaunchConfig, code: i32) -> Option<SpawnError> {
	match code {
		126 | 127 => Some(SpawnError::CommandNotRunnable {
			command: render_command(config),
			code,
		}),
		_ => None,
	}
}

async fn probe_port_free(host: &str, port: u16) -> Result<(), SpawnError> {
	match TcpListener::bind((host, port)).await {
		Ok(listener) => {
			drop(listener);
			Ok(())
		}
		Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => Err(SpawnError::PortInUse {
			host: host.to_string(),
			port,
		}),
		Err(e) => Err(SpawnError::Io(e)),
	}
}

fn signal_group(pid: u32, signal: nix::sys::signal::Signal) {
	use nix::sys::signal::killpg;
	use nix::unistd::Pid;
	if pid == 0 {
		return;
	}
	let _ = killpg(Pid::from_raw(pid as i32), signal);
}

#[cfg(test)]
mod tests {
	use super::*;
	use warden_core::config::Verbosity;

	#[test]
	fn render_substitutes_placeholders() {
		let config = LaunchConfig {
			host: "127.0.0.1".into(),
			port: 9100,
			command: "server --bind {host}:{port} --log {log_level}".into(),
			verbosity: Verbosity::Debug,
			..LaunchConfig::default()
		};
		assert_eq!(
			render_command(&config),
			"server --bind 127.0.0.1:9100 --log debug"
		);
	}

	#[test]
	fn render_leaves_plain_commands_alone() {
		let config = LaunchConfig {
			command: "exec my-server".into(),
			..LaunchConfig::default()
		};
		assert_eq!(render_command(&config), "exec my-server");
	}

	#[test]
	fn shell_exec_codes_map_to_spawn_error() {
		let config = LaunchConfig::default();
		assert!(matches!(
			shell_exec_failure(&config, 127),
			Some(SpawnError::CommandNotRunnable { code: 127, .. })
		));
		assert!(matches!(
			shell_exec_failure(&config, 126),
			Some(SpawnError::CommandNotRunnable { code: 126, .. })
		));
		assert!(shell_exec_failure(&config, 1).is_none());
		assert!(shell_exec_failure(&config, 0).is_none());
	}
}
