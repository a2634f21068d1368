use std::time::Duration;

/// Lifecycle of a single launch attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildState {
	Starting,
	Ready,
	/// Ran to completion after reaching Ready (crash or operator stop).
	Exited(i32),
	/// The attempt ended before the server ever became ready.
	Failed,
}

impl ChildState {
	pub fn is_live(&self) -> bool {
		matches!(self, ChildState::Starting | ChildState::Ready)
	}
}

/// Why a launch attempt ended without the server staying up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
	/// Never became healthy within the startup window.
	TimedOut(Duration),
	/// Process exited (before or after readiness).
	ChildDied(i32),
}

impl std::fmt::Display for FailureReason {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			FailureReason::TimedOut(window) => {
				write!(f, "not ready after {:.1}s", window.as_secs_f64())
			}
			FailureReason::ChildDied(code) => write!(f, "server exited with code {}", code),
		}
	}
}

impl std::error::Error for FailureReason {}

/// Tracks consecutive failed attempts across restarts.
/// Reset whenever an attempt reaches Ready.
#[derive(Debug, Default)]
pub struct SupervisionState {
	pub consecutive_failures: u32,
	pub last_failure: Option<FailureReason>,
	pub total_backoff: Duration,
}

impl SupervisionState {
	pub fn reset(&mut self) {
		self.consecutive_failures = 0;
		self.last_failure = None;
		self.total_backoff = Duration::ZERO;
	}
}

/// What the restart policy decided after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
	Restart { after: Duration },
	GiveUp(FailureReason),
}
