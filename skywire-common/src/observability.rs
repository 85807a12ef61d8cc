//! Process-wide `tracing` setup.
//!
//! Logs always go to a daily rolling file. Stdout carries JSON results, so a
//! terminal copy of the log is only ever written to stderr, on request.
//! [`init_logging`] installs the subscriber once; repeated calls hand back the
//! path chosen the first time.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::Context;
use chrono::Local;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();
static LOG_PATH: OnceLock<PathBuf> = OnceLock::new();

/// Overrides the log directory when [`LogConfig::log_dir`] is unset.
pub const LOG_DIR_ENV: &str = "SKYWIRE_LOG_DIR";

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Names the log directory and file prefix.
    pub app_name: &'static str,
    /// Explicit directory; otherwise `SKYWIRE_LOG_DIR`, then the user data dir.
    pub log_dir: Option<PathBuf>,
    pub emit_stderr: bool,
    pub format: LogFormat,
    /// Used when `RUST_LOG` is unset or unparsable.
    pub default_filter: &'static str,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            app_name: "skywire",
            log_dir: None,
            emit_stderr: false,
            format: LogFormat::Text,
            default_filter: "info",
        }
    }
}

/// Install the global subscriber and return today's log file path.
pub fn init_logging(config: LogConfig) -> anyhow::Result<PathBuf> {
    if let Some(path) = LOG_PATH.get() {
        return Ok(path.clone());
    }

    let dir = log_dir(config.app_name, config.log_dir.as_deref());
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create log directory {}", dir.display()))?;

    let file_prefix = format!("{}.log", config.app_name);
    let path = dir.join(format!(
        "{file_prefix}.{}",
        Local::now().format("%Y-%m-%d")
    ));

    let (writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::daily(&dir, &file_prefix));
    let _ = LOG_GUARD.set(guard);

    let mut layers = vec![file_layer(config.format, writer)];
    if config.emit_stderr {
        layers.push(stderr_layer(config.format));
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.default_filter));

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .map_err(|e| anyhow::anyhow!("tracing setup failed: {e}"))?;

    let _ = LOG_PATH.set(path.clone());
    Ok(path)
}

fn file_layer(format: LogFormat, writer: NonBlocking) -> BoxedLayer {
    match format {
        LogFormat::Text => fmt::layer().with_writer(writer).with_ansi(false).boxed(),
        LogFormat::Json => fmt::layer().json().with_writer(writer).boxed(),
    }
}

fn stderr_layer(format: LogFormat) -> BoxedLayer {
    match format {
        LogFormat::Text => fmt::layer().with_writer(std::io::stderr).boxed(),
        LogFormat::Json => fmt::layer().json().with_writer(std::io::stderr).boxed(),
    }
}

fn log_dir(app_name: &str, explicit: Option<&Path>) -> PathBuf {
    let from_env = std::env::var(LOG_DIR_ENV).ok().filter(|d| !d.is_empty());
    match (explicit, from_env) {
        (Some(dir), _) => expand_tilde(dir),
        (None, Some(dir)) => expand_tilde(Path::new(&dir)),
        (None, None) => dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(app_name),
    }
}

fn expand_tilde(path: &Path) -> PathBuf {
    match path.to_str() {
        Some(s) => PathBuf::from(shellexpand::tilde(s).into_owned()),
        None => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_dir_wins_over_env() {
        let tmp = tempfile::tempdir().unwrap();
        assert_eq!(log_dir("skywire", Some(tmp.path())), tmp.path());
    }

    #[test]
    fn fallback_dir_ends_with_app_name() {
        if std::env::var_os(LOG_DIR_ENV).is_none() {
            assert!(log_dir("skywire-test", None).ends_with("skywire-test"));
        }
    }

    #[test]
    fn tilde_is_expanded_and_relative_paths_kept() {
        assert_eq!(expand_tilde(Path::new("logs/here")), PathBuf::from("logs/here"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_tilde(Path::new("~/logs")), home.join("logs"));
        }
    }
}
