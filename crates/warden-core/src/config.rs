use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Log verbosity for warden itself and for the `{log_level}` placeholder
/// passed through to the server command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
	Quiet,
	Info,
	Debug,
}

impl Verbosity {
	pub fn parse(s: &str) -> Option<Self> {
		match s {
			"quiet" => Some(Verbosity::Quiet),
			"info" => Some(Verbosity::Info),
			"debug" => Some(Verbosity::Debug),
			_ => None,
		}
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			Verbosity::Quiet => "quiet",
			Verbosity::Info => "info",
			Verbosity::Debug => "debug",
		}
	}
}

/// Immutable launch configuration, built once at startup from defaults,
/// an optional `warden.toml`, and environment overrides.
#[derive(Debug, Clone)]
pub struct LaunchConfig {
	pub host: String,
	pub port: u16,
	/// Shell command for the server. `{host}`, `{port}` and `{log_level}`
	/// placeholders are substituted before spawning.
	pub command: String,
	pub verbosity: Verbosity,
	/// HTTP path probed for readiness. None means a raw TCP connect probe.
	pub health_path: Option<String>,
	pub startup_timeout: Duration,
	pub poll_interval: Duration,
	pub max_restart_attempts: u32,
	pub backoff_base: Duration,
	pub backoff_cap: Duration,
	pub stop_grace: Duration,
}

impl Default for LaunchConfig {
	fn default() -> Self {
		Self {
			host: "localhost".to_string(),
			port: 8000,
			command: "chroma run --host {host} --port {port}".to_string(),
			verbosity: Verbosity::Info,
			health_path: Some("/api/v1/heartbeat".to_string()),
			startup_timeout: Duration::from_secs(30),
			poll_interval: Duration::from_millis(200),
			max_restart_attempts: 3,
			backoff_base: Duration::from_secs(1),
			backoff_cap: Duration::from_secs(30),
			stop_grace: Duration::from_secs(5),
		}
	}
}

#[derive(Debug)]
pub enum ConfigError {
	Invalid { key: String, value: String },
	Toml { path: PathBuf, message: String },
}

impl std::fmt::Display for ConfigError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			ConfigError::Invalid { key, value } => {
				write!(f, "invalid value for {}: {}", key, value)
			}
			ConfigError::Toml { path, message } => {
				write!(f, "failed to parse {}: {}", path.display(), message)
			}
		}
	}
}

impl std::error::Error for ConfigError {}

/// Optional `warden.toml` overrides, everything defaulted.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ConfigFile {
	pub host: Option<String>,
	pub port: Option<u16>,
	pub command: Option<String>,
	pub log_level: Option<String>,
	pub health_path: Option<String>,
	pub startup_timeout_seconds: Option<u64>,
	pub poll_interval_ms: Option<u64>,
	pub max_restart_attempts: Option<u32>,
	pub backoff_base_ms: Option<u64>,
	pub backoff_cap_ms: Option<u64>,
	pub stop_grace_seconds: Option<u64>,
}

/// Load configuration: defaults, then `warden.toml` in the working
/// directory if present, then environment variables.
pub fn load() -> Result<LaunchConfig, ConfigError> {
	let mut config = LaunchConfig::default();
	apply_file_at(&mut config, Path::new("warden.toml"))?;
	apply_env(&mut config, |key| std::env::var(key).ok())?;
	Ok(config)
}

pub fn apply_file_at(config: &mut LaunchConfig, path: &Path) -> Result<(), ConfigError> {
	let content = match std::fs::read_to_string(path) {
		Ok(c) => c,
		Err(_) => return Ok(()),
	};
	let file: ConfigFile = toml::from_str(&content).map_err(|e| ConfigError::Toml {
		path: path.to_path_buf(),
		message: e.to_string(),
	})?;
	apply_file(config, file)
}

pub fn apply_file(config: &mut LaunchConfig, file: ConfigFile) -> Result<(), ConfigError> {
	if let Some(host) = file.host {
		config.host = host;
	}
	if let Some(port) = file.port {
		config.port = valid_port("port", port)?;
	}
	if let Some(command) = file.command {
		config.command = command;
	}
	if let Some(level) = file.log_level {
		config.verbosity = Verbosity::parse(&level).ok_or_else(|| ConfigError::Invalid {
			key: "log_level".into(),
			value: level,
		})?;
	}
	if let Some(path) = file.health_path {
		config.health_path = normalize_health_path(path);
	}
	if let Some(secs) = file.startup_timeout_seconds {
		config.startup_timeout = Duration::from_secs(secs);
	}
	if let Some(ms) = file.poll_interval_ms {
		config.poll_interval = nonzero_ms("poll_interval_ms", ms)?;
	}
	if let Some(n) = file.max_restart_attempts {
		config.max_restart_attempts = n;
	}
	if let Some(ms) = file.backoff_base_ms {
		config.backoff_base = nonzero_ms("backoff_base_ms", ms)?;
	}
	if let Some(ms) = file.backoff_cap_ms {
		config.backoff_cap = Duration::from_millis(ms);
	}
	if let Some(secs) = file.stop_grace_seconds {
		config.stop_grace = Duration::from_secs(secs);
	}
	Ok(())
}

/// Environment overrides. Takes a lookup function so tests don't have to
/// mutate the process environment.
pub fn apply_env(
	config: &mut LaunchConfig,
	lookup: impl Fn(&str) -> Option<String>,
) -> Result<(), ConfigError> {
	if let Some(host) = lookup("HOST") {
		config.host = host;
	}
	if let Some(port) = lookup("PORT") {
		let parsed = port.parse::<u16>().map_err(|_| invalid("PORT", &port))?;
		config.port = valid_port("PORT", parsed)?;
	}
	if let Some(command) = lookup("SERVER_COMMAND") {
		config.command = command;
	}
	if let Some(level) = lookup("LOG_LEVEL") {
		config.verbosity = Verbosity::parse(&level).ok_or_else(|| invalid("LOG_LEVEL", &level))?;
	}
	if let Some(path) = lookup("HEALTH_PATH") {
		config.health_path = normalize_health_path(path);
	}
	if let Some(secs) = lookup("STARTUP_TIMEOUT_SECONDS") {
		let parsed = secs
			.parse::<u64>()
			.map_err(|_| invalid("STARTUP_TIMEOUT_SECONDS", &secs))?;
		config.startup_timeout = Duration::from_secs(parsed);
	}
	if let Some(ms) = lookup("POLL_INTERVAL_MS") {
		let parsed = ms.parse::<u64>().map_err(|_| invalid("POLL_INTERVAL_MS", &ms))?;
		config.poll_interval = nonzero_ms("POLL_INTERVAL_MS", parsed)?;
	}
	if let Some(n) = lookup("MAX_RESTART_ATTEMPTS") {
		config.max_restart_attempts =
			n.parse::<u32>().map_err(|_| invalid("MAX_RESTART_ATTEMPTS", &n))?;
	}
	if let Some(ms) = lookup("BACKOFF_BASE_MS") {
		let parsed = ms.parse::<u64>().map_err(|_| invalid("BACKOFF_BASE_MS", &ms))?;
		config.backoff_base = nonzero_ms("BACKOFF_BASE_MS", parsed)?;
	}
	if let Some(ms) = lookup("BACKOFF_CAP_MS") {
		let parsed = ms.parse::<u64>().map_err(|_| invalid("BACKOFF_CAP_MS", &ms))?;
		config.backoff_cap = Duration::from_millis(parsed);
	}
	if let Some(secs) = lookup("STOP_GRACE_SECONDS") {
		let parsed = secs.parse::<u64>().map_err(|_| invalid("STOP_GRACE_SECONDS", &secs))?;
		config.stop_grace = Duration::from_secs(parsed);
	}
	Ok(())
}

/// An empty or "none" health path switches readiness to a raw TCP probe.
fn normalize_health_path(path: String) -> Option<String> {
	if path.is_empty() || path == "none" {
		None
	} else {
		Some(path)
	}
}

fn valid_port(key: &str, port: u16) -> Result<u16, ConfigError> {
	if port == 0 {
		return Err(invalid(key, "0"));
	}
	Ok(port)
}

fn nonzero_ms(key: &str, ms: u64) -> Result<Duration, ConfigError> {
	if ms == 0 {
		return Err(invalid(key, "0"));
	}
	Ok(Duration::from_millis(ms))
}

fn invalid(key: &str, value: &str) -> ConfigError {
	ConfigError::Invalid {
		key: key.to_string(),
		value: value.to_string(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> + '_ {
		move |key| {
			pairs
				.iter()
				.find(|(k, _)| *k == key)
				.map(|(_, v)| v.to_string())
		}
	}

	#[test]
	fn defaults_target_local_chroma() {
		let config = LaunchConfig::default();
		assert_eq!(config.host, "localhost");
		assert_eq!(config.port, 8000);
		assert_eq!(config.verbosity, Verbosity::Info);
		assert_eq!(config.health_path.as_deref(), Some("/api/v1/heartbeat"));
		assert_eq!(config.startup_timeout, Duration::from_secs(30));
		assert_eq!(config.max_restart_attempts, 3);
	}

	#[test]
	fn env_overrides_apply() {
		let mut config = LaunchConfig::default();
		apply_env(
			&mut config,
			env(&[
				("HOST", "0.0.0.0"),
				("PORT", "9001"),
				("LOG_LEVEL", "debug"),
				("STARTUP_TIMEOUT_SECONDS", "5"),
				("MAX_RESTART_ATTEMPTS", "7"),
				("BACKOFF_BASE_MS", "250"),
			]),
		)
		.unwrap();
		assert_eq!(config.host, "0.0.0.0");
		assert_eq!(config.port, 9001);
		assert_eq!(config.verbosity, Verbosity::Debug);
		assert_eq!(config.startup_timeout, Duration::from_secs(5));
		assert_eq!(config.max_restart_attempts, 7);
		assert_eq!(config.backoff_base, Duration::from_millis(250));
	}

	#[test]
	fn port_zero_rejected() {
		let mut config = LaunchConfig::default();
		let err = apply_env(&mut config, env(&[("PORT", "0")])).unwrap_err();
		assert!(matches!(err, ConfigError::Invalid { .. }));
	}

	#[test]
	fn garbage_port_rejected() {
		let mut config = LaunchConfig::default();
		assert!(apply_env(&mut config, env(&[("PORT", "eight thousand")])).is_err());
	}

	#[test]
	fn unknown_log_level_rejected() {
		let mut config = LaunchConfig::default();
		assert!(apply_env(&mut config, env(&[("LOG_LEVEL", "verbose")])).is_err());
	}

	#[test]
	fn empty_health_path_means_tcp_probe() {
		let mut config = LaunchConfig::default();
		apply_env(&mut config, env(&[("HEALTH_PATH", "")])).unwrap();
		assert_eq!(config.health_path, None);

		apply_env(&mut config, env(&[("HEALTH_PATH", "/healthz")])).unwrap();
		assert_eq!(config.health_path.as_deref(), Some("/healthz"));
	}

	#[test]
	fn toml_file_applies_and_env_wins() {
		let mut config = LaunchConfig::default();
		let file: ConfigFile = toml::from_str(
			r#"
			port = 9100
			command = "qdrant --config {port}"
			log_level = "quiet"
			backoff_cap_ms = 10000
			"#,
		)
		.unwrap();
		apply_file(&mut config, file).unwrap();
		assert_eq!(config.port, 9100);
		assert_eq!(config.verbosity, Verbosity::Quiet);
		assert_eq!(config.backoff_cap, Duration::from_secs(10));

		apply_env(&mut config, env(&[("PORT", "9200")])).unwrap();
		assert_eq!(config.port, 9200);
	}

	#[test]
	fn bad_toml_reports_path() {
		let mut config = LaunchConfig::default();
		let dir = std::env::temp_dir().join("warden-config-test");
		let _ = std::fs::create_dir_all(&dir);
		let path = dir.join("warden.toml");
		std::fs::write(&path, "port = \"not a port\"").unwrap();
		let err = apply_file_at(&mut config, &path).unwrap_err();
		assert!(matches!(err, ConfigError::Toml { .. }));
		let _ = std::fs::remove_file(&path);
	}
}
