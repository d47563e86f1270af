//! Tracing configuration and log routing.
//!
//! Sync events go to stdout through a compact formatter and to a log file. When
//! `LLAMASYNC_LOG_FILE` is set, logs are appended to that path; otherwise they rotate daily under
//! `logs/` (or `LLAMASYNC_LOG_DIR`). Background downloads log from spawned tasks, so the file
//! writer is non-blocking.
use std::sync::OnceLock;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Configure tracing subscribers for stdout and file logging.
///
/// `RUST_LOG` controls filtering (defaults to `info`). Safe to call more than once; later calls
/// leave the first subscriber in place, which lets integration tests share a process.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout_layer = fmt::layer().with_target(false).compact();

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer);

    if let Some(writer) = configure_file_writer() {
        let file_layer = fmt::layer()
            .with_writer(writer)
            .with_target(true)
            .with_ansi(false)
            .compact();

        let _ = registry.with(file_layer).try_init();
    } else {
        let _ = registry.try_init();
    }
}

/// Pick the file sink: `LLAMASYNC_LOG_FILE` when set, otherwise a daily-rotated file under
/// `LLAMASYNC_LOG_DIR` (default `logs`). `None` disables file logging.
fn configure_file_writer() -> Option<NonBlocking> {
    let (non_blocking, guard) = match std::env::var("LLAMASYNC_LOG_FILE") {
        Ok(path) => tracing_appender::non_blocking(open_append(&path)?),
        Err(_) => {
            let dir = std::env::var("LLAMASYNC_LOG_DIR").unwrap_or_else(|_| "logs".to_string());
            if let Err(err) = std::fs::create_dir_all(&dir) {
                eprintln!("Failed to create log directory {dir}: {err}");
                return None;
            }
            tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, "llamasync.log"))
        }
    };
    let _ = LOG_GUARD.set(guard);
    Some(non_blocking)
}

fn open_append(path: &str) -> Option<std::fs::File> {
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|err| eprintln!("Failed to open log file {path}: {err}"))
        .ok()
}
