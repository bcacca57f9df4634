//! Coolguard Daemon (coolguardd)
//!
//! One binary, three policies:
//!
//! - **fan**: long-running loop mapping the hottest sensor to a fan duty
//! - **idle**: one-shot check that powers off a host nobody is using
//! - **thermal**: one-shot (or looping) check that powers off a host that has
//!   stayed too hot for too long
//!
//! The one-shot policies are meant to be started by a systemd timer. The
//! thermal policy keeps its streak onset under `/run/coolguard`, so each
//! invocation continues where the last one left off.
//!
//! # Exit Status
//! - `0`: finished normally (including "busy, nothing to do")
//! - `1`: configuration error, probe failure, or a power off request failed

mod cli;
mod runner;

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{debug, error, info, warn};

use cg_core::constants::paths;
use cg_core::ShutdownSignal;

use crate::cli::Cli;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Log filter environment variable
const LOG_ENV: &str = "COOLGUARD_LOG";

/// Set restrictive umask so records and lock files are private
fn set_secure_umask() {
    // SAFETY: umask is always safe to call - it simply sets the file creation mask for the process.
    unsafe { libc::umask(0o077) };
    debug!("Umask set to 0077");
}

/// Journald when available, stdout otherwise. Returns whether journald is used.
fn init_logging() -> bool {
    let log_level = std::env::var(LOG_ENV).unwrap_or_else(|_| "info".to_string());

    if Path::new(paths::JOURNALD_SOCKET).exists() {
        match tracing_journald::layer() {
            Ok(journald_layer) => {
                use tracing_subscriber::prelude::*;
                tracing_subscriber::registry()
                    .with(journald_layer)
                    .with(tracing_subscriber::EnvFilter::new(&log_level))
                    .init();
                return true;
            }
            Err(e) => {
                eprintln!("Failed to create journald layer: {}, falling back to stdout", e);
            }
        }
    }

    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_env_filter(&log_level)
        .init();
    false
}

fn install_signal_handler(shutdown: Arc<ShutdownSignal>) {
    if let Err(e) = ctrlc::set_handler(move || {
        info!("SIGNAL: Received SIGINT/SIGTERM - stopping");
        shutdown.trigger();
    }) {
        warn!("Failed to set signal handler: {}. Shutdown via signals may not work cleanly.", e);
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    set_secure_umask();
    let use_journald = init_logging();

    info!("STARTUP: coolguardd {} starting", VERSION);
    info!("STARTUP: Logging to {}", if use_journald { "systemd journal" } else { "stdout" });

    let shutdown = Arc::new(ShutdownSignal::new());
    install_signal_handler(Arc::clone(&shutdown));

    match runner::run(cli, shutdown).await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
