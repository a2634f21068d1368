use std::time::Duration;

use warden_core::config::LaunchConfig;
use warden_core::types::{Decision, FailureReason, SupervisionState};

/// Decides whether a failed attempt gets another try. Delays double per
/// consecutive failure, capped, and the counter resets whenever an attempt
/// reaches Ready so transient blips don't exhaust the budget over a long
/// uptime.
pub struct RestartPolicy {
	max_attempts: u32,
	base: Duration,
	cap: Duration,
}

impl RestartPolicy {
	pub fn new(config: &LaunchConfig) -> Self {
		Self {
			max_attempts: config.max_restart_attempts,
			base: config.backoff_base,
			cap: config.backoff_cap,
		}
	}

	pub fn max_attempts(&self) -> u32 {
		self.max_attempts
	}

	pub fn on_exit(&self, state: &mut SupervisionState, reason: FailureReason) -> Decision {
		if state.consecutive_failures >= self.max_attempts {
			state.last_failure = Some(reason);
			return Decision::GiveUp(reason);
		}
		let after = backoff_delay(self.base, self.cap, state.consecutive_failures);
		state.consecutive_failures += 1;
		state.last_failure = Some(reason);
		state.total_backoff += after;
		Decision::Restart { after }
	}

	pub fn on_ready(&self, state: &mut SupervisionState) {
		state.reset();
	}
}

fn backoff_delay(base: Duration, cap: Duration, failures: u32) -> Duration {
	let mut delay = base;
	for _ in 0..failures {
		delay = delay.saturating_mul(2);
		if delay >= cap {
			return cap;
		}
	}
	delay.min(cap)
}

#[cfg(test)]
mod tests {
	use super::*;

	fn policy(max_attempts: u32, base_ms: u64, cap_ms: u64) -> RestartPolicy {
		RestartPolicy {
			max_attempts,
			base: Duration::from_millis(base_ms),
			cap: Duration::from_millis(cap_ms),
		}
	}

	fn died() -> FailureReason {
		FailureReason::ChildDied(1)
	}

	#[test]
	fn restarts_exactly_n_times_then_gives_up() {
		let policy = policy(3, 100, 10_000);
		let mut state = SupervisionState::default();

		for _ in 0..3 {
			assert!(matches!(
				policy.on_exit(&mut state, died()),
				Decision::Restart { .. }
			));
		}
		assert!(matches!(
			policy.on_exit(&mut state, died()),
			Decision::GiveUp(_)
		));
	}

	#[test]
	fn delays_double_and_are_capped() {
		let policy = policy(10, 1000, 5000);
		let mut state = SupervisionState::default();
		let mut delays = Vec::new();

		for _ in 0..6 {
			match policy.on_exit(&mut state, died()) {
				Decision::Restart { after } => delays.push(after),
				Decision::GiveUp(_) => panic!("budget not yet exhausted"),
			}
		}

		assert_eq!(
			delays,
			vec![
				Duration::from_secs(1),
				Duration::from_secs(2),
				Duration::from_secs(4),
				Duration::from_secs(5),
				Duration::from_secs(5),
				Duration::from_secs(5),
			]
		);
		// Non-decreasing by construction, but assert it anyway.
		assert!(delays.windows(2).all(|w| w[0] <= w[1]));
	}

	#[test]
	fn ready_resets_the_budget() {
		let policy = policy(3, 1000, 30_000);
		let mut state = SupervisionState::default();

		assert_eq!(
			policy.on_exit(&mut state, died()),
			Decision::Restart {
				after: Duration::from_secs(1)
			}
		);
		policy.on_ready(&mut state);

		// Second failure after recovery is failure #1 again.
		assert_eq!(
			policy.on_exit(&mut state, died()),
			Decision::Restart {
				after: Duration::from_secs(1)
			}
		);
		assert_eq!(state.consecutive_failures, 1);
	}

	#[test]
	fn crash_twice_then_succeed_delay_sequence() {
		// 1s base, two crashes, recovery on the third attempt.
		let policy = policy(2, 1000, 30_000);
		let mut state = SupervisionState::default();

		let first = policy.on_exit(&mut state, died());
		let second = policy.on_exit(&mut state, died());
		assert_eq!(
			first,
			Decision::Restart {
				after: Duration::from_secs(1)
			}
		);
		assert_eq!(
			second,
			Decision::Restart {
				after: Duration::from_secs(2)
			}
		);
		assert_eq!(state.total_backoff, Duration::from_secs(3));

		policy.on_ready(&mut state);
		assert_eq!(state.consecutive_failures, 0);
	}

	#[test]
	fn give_up_carries_last_reason() {
		let policy = policy(0, 1000, 30_000);
		let mut state = SupervisionState::default();
		let reason = FailureReason::TimedOut(Duration::from_secs(30));

		match policy.on_exit(&mut state, reason) {
			Decision::GiveUp(last) => assert_eq!(last, reason),
			other => panic!("expected GiveUp, got {:?}", other),
		}
	}

	#[test]
	fn zero_failures_uses_base_delay() {
		assert_eq!(
			backoff_delay(Duration::from_millis(200), Duration::from_secs(30), 0),
			Duration::from_millis(200)
		);
	}
}
