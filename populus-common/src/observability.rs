//! Tracing setup for the `populus` binary.
//!
//! Events always go to a daily rolling file. Stdout is never a log target
//! because the CLI prints its term listing there; `-v` adds a stderr copy.
//! [`init_logging`] installs the subscriber once per process and later calls
//! only return the resolved file path, which keeps tests that run the CLI
//! several times in one process working.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::Context;
use chrono::{Local, NaiveDate};
use serde::Deserialize;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();
static LOG_PATH: OnceLock<PathBuf> = OnceLock::new();

const LOG_DIR_ENV: &str = "POPULUS_LOG_DIR";

/// Encoding of each log line, `logging.format` in the config file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// File name stem and default directory name.
    pub app_name: &'static str,
    /// Wins over `POPULUS_LOG_DIR`, which wins over `~/.local/share/<app_name>`.
    pub log_dir: Option<PathBuf>,
    pub emit_stderr: bool,
    pub format: LogFormat,
    /// Used when `RUST_LOG` is unset or invalid.
    pub default_filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            app_name: "populus",
            log_dir: None,
            emit_stderr: false,
            format: LogFormat::Text,
            default_filter: "info".to_string(),
        }
    }
}

/// Install the global subscriber and return today's log file.
pub fn init_logging(config: LogConfig) -> anyhow::Result<PathBuf> {
    if let Some(path) = LOG_PATH.get() {
        return Ok(path.clone());
    }

    let env_dir = std::env::var(LOG_DIR_ENV).ok();
    let dir = resolve_log_dir(config.app_name, config.log_dir.as_deref(), env_dir.as_deref());
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create log directory: {}", dir.display()))?;

    let stem = format!("{}.log", config.app_name);
    let path = daily_log_path(&dir, &stem, Local::now().date_naive());
    let (writer, guard) = tracing_appender::non_blocking(rolling::daily(&dir, &stem));
    let _ = LOG_GUARD.set(guard);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_filter));
    let json = config.format == LogFormat::Json;

    // Exactly one file layer is Some; the stderr layers follow the same format.
    tracing_subscriber::registry()
        .with(filter)
        .with((!json).then(|| fmt::layer().with_writer(writer.clone()).with_ansi(false)))
        .with(json.then(|| fmt::layer().json().with_writer(writer)))
        .with((config.emit_stderr && !json).then(|| fmt::layer().with_writer(std::io::stderr)))
        .with((config.emit_stderr && json).then(|| fmt::layer().json().with_writer(std::io::stderr)))
        .try_init()
        .map_err(|e| anyhow::anyhow!("tracing setup failed: {e}"))?;

    tracing::debug!(target: "observability", path = %path.display(), "logging.ready");
    let _ = LOG_PATH.set(path.clone());
    Ok(path)
}

fn resolve_log_dir(app_name: &str, explicit: Option<&Path>, env_dir: Option<&str>) -> PathBuf {
    let home = std::env::var("HOME").ok();
    match (explicit, env_dir) {
        (Some(dir), _) => expand_home(dir, home.as_deref()),
        (None, Some(dir)) => expand_home(Path::new(dir), home.as_deref()),
        (None, None) => match home {
            Some(home) => Path::new(&home).join(".local/share").join(app_name),
            None => Path::new(".").join(app_name),
        },
    }
}

fn expand_home(path: &Path, home: Option<&str>) -> PathBuf {
    match (path.strip_prefix("~").ok(), home) {
        (Some(rest), Some(home)) => Path::new(home).join(rest),
        _ => path.to_path_buf(),
    }
}

/// Name `tracing_appender::rolling::daily` gives the file for `day`.
fn daily_log_path(dir: &Path, stem: &str, day: NaiveDate) -> PathBuf {
    dir.join(format!("{stem}.{}", day.format("%Y-%m-%d")))
}
