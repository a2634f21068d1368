use std::process::ExitCode;
use owo_colors::OwoColorize;
use tracing::Level;

use warden::supervisor::{self, SuperviseError};
use warden_core::config::{self, Verbosity};
use warden_core::types::FailureReason;

const EXIT_SPAWN_FAILED: u8 = 2;
const EXIT_NEVER_READY: u8 = 3;
const EXIT_RESTARTS_EXHAUSTED: u8 = 4;

#[tokio::main]
async fn main() -> ExitCode {
	let args: Vec<String> = std::env::args().skip(1).collect();
	match args.first().map(|s| s.as_str()) {
		Some("help" | "--help" | "-h") => {
			print_usage();
			return ExitCode::SUCCESS;
		}
		Some("version" | "--version" | "-V") => {
			println!("warden {}", env!("CARGO_PKG_VERSION"));
			return ExitCode::SUCCESS;
		}
		Some(other) => {
			eprintln!("unknown argument: {}", other);
			eprintln!("run 'warden --help' for usage");
			return ExitCode::FAILURE;
		}
		None => {}
	}

	let config = match config::load() {
		Ok(c) => c,
		Err(e) => {
			eprintln!("error: {}", e);
			return ExitCode::FAILURE;
		}
	};

	let level = match config.verbosity {
		Verbosity::Quiet => Level::WARN,
		Verbosity::Info => Level::INFO,
		Verbosity::Debug => Level::DEBUG,
	};
	tracing_subscriber::fmt().with_max_level(level).init();

	tracing::info!(
		"warden {} supervising '{}'",
		env!("CARGO_PKG_VERSION"),
		config.command
	);

	let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
	tokio::spawn(async move {
		if tokio::signal::ctrl_c().await.is_ok() {
			tracing::info!("shutting down");
			let _ = shutdown_tx.send(true);
		}
	});

	match supervisor::run(&config, shutdown_rx).await {
		Ok(()) => {
			tracing::info!("shutdown complete");
			ExitCode::SUCCESS
		}
		Err(e) => {
			tracing::error!("{}", e);
			exit_code_for(&e)
		}
	}
}

fn exit_code_for(error: &SuperviseError) -> ExitCode {
	match error {
		SuperviseError::Spawn(_) => ExitCode::from(EXIT_SPAWN_FAILED),
		SuperviseError::GiveUp {
			last: FailureReason::TimedOut(_),
			..
		} => ExitCode::from(EXIT_NEVER_READY),
		SuperviseError::GiveUp {
			last: FailureReason::ChildDied(_),
			..
		} => ExitCode::from(EXIT_RESTARTS_EXHAUSTED),
	}
}

fn print_usage() {
	eprintln!(
		"{} {} — supervised launcher for a vector-database server",
		"warden".bold(),
		env!("CARGO_PKG_VERSION")
	);
	eprintln!();
	eprintln!("usage: {}", "warden".bold());
	eprintln!();
	eprintln!("Launches the configured server command, polls its health endpoint");
	eprintln!("until ready, and restarts it with exponential backoff if it dies.");
	eprintln!("Ctrl+C stops the server gracefully and exits 0.");
	eprintln!();

	eprintln!("{}", "environment".cyan().bold());
	eprintln!("  {}                      Bind host (default localhost)", "HOST".bold());
	eprintln!("  {}                      Bind port (default 8000)", "PORT".bold());
	eprintln!("  {}            Server command; {{host}}/{{port}}/{{log_level}}", "SERVER_COMMAND".bold());
	eprintln!("                            are substituted (default 'chroma run ...')");
	eprintln!("  {}                 quiet | info | debug (default info)", "LOG_LEVEL".bold());
	eprintln!("  {}               Readiness path (default /api/v1/heartbeat;", "HEALTH_PATH".bold());
	eprintln!("                            empty or 'none' for a raw TCP probe)");
	eprintln!("  {}   Startup window (default 30)", "STARTUP_TIMEOUT_SECONDS".bold());
	eprintln!("  {}      Restart budget (default 3)", "MAX_RESTART_ATTEMPTS".bold());
	eprintln!("  {} / {}  Backoff (default 1000 / 30000)", "BACKOFF_BASE_MS".bold(), "BACKOFF_CAP_MS".bold());
	eprintln!();

	eprintln!("{}", "exit codes".cyan().bold());
	eprintln!("  0  clean shutdown        2  spawn failed / port in use");
	eprintln!("  3  never became ready    4  restart budget exhausted");
	eprintln!();
	eprintln!("A {} in the working directory is read before the environment.", "warden.toml".bold());
}
