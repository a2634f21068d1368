use std::time::Instant;
use tokio::net::TcpStream;
use tokio::sync::watch;

use crate::launcher::ChildHandle;
use warden_core::config::LaunchConfig;
use warden_core::types::ChildState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyOutcome {
	Ready,
	/// Never became healthy within the startup window.
	TimedOut,
	/// The child exited while we were still polling.
	ChildDied(i32),
	/// A shutdown request arrived while polling.
	Interrupted,
}

/// Poll the server's readiness endpoint until it responds, the child dies,
/// the startup window closes, or a shutdown request arrives — whichever
/// happens first. Individual probe failures (refused, probe timeout,
/// non-2xx) are swallowed and retried.
pub async fn await_ready(
	handle: &mut ChildHandle,
	config: &LaunchConfig,
	shutdown: &mut watch::Receiver<bool>,
) -> ReadyOutcome {
	let deadline = Instant::now() + config.startup_timeout;
	let client = http_client(config);

	loop {
		if *shutdown.borrow() {
			return ReadyOutcome::Interrupted;
		}

		let probe_started = Instant::now();
		if probe(&client, config).await {
			handle.state = ChildState::Ready;
			return ReadyOutcome::Ready;
		}

		if Instant::now() >= deadline {
			return ReadyOutcome::TimedOut;
		}

		// A slow probe (e.g. a hung endpoint) already consumed part of the
		// interval; sleep only for what remains so the cadence holds.
		let pause = config.poll_interval.saturating_sub(probe_started.elapsed());
		tokio::select! {
			status = handle.child.wait() => {
				let code = status.ok().and_then(|s| s.code()).unwrap_or(-1);
				handle.state = ChildState::Failed;
				return ReadyOutcome::ChildDied(code);
			}
			_ = shutdown.changed() => return ReadyOutcome::Interrupted,
			_ = tokio::time::sleep(pause) => {}
		}
	}
}

fn http_client(config: &LaunchConfig) -> Option<reqwest::Client> {
	config.health_path.as_ref()?;
	reqwest::Client::builder()
		.connect_timeout(config.poll_interval)
		.timeout(config.poll_interval)
		.build()
		.ok()
}

async fn probe(client: &Option<reqwest::Client>, config: &LaunchConfig) -> bool {
	match (client, &config.health_path) {
		(Some(client), Some(path)) => {
			let url = format!("http://{}:{}{}", config.host, config.port, path);
			match client.get(&url).send().await {
				Ok(response) => response.status().is_success(),
				Err(_) => false,
			}
		}
		// No health path configured: a successful TCP connect counts as ready.
		_ => {
			let connect = TcpStream::connect((config.host.as_str(), config.port));
			matches!(
				tokio::time::timeout(config.poll_interval, connect).await,
				Ok(Ok(_))
			)
		}
	}
}
