use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context};
use axum::http::HeaderValue;
use melody_core::naming::DEFAULT_SLUG_MAX_LEN;
use melody_engine::MagentaConfig;
use melody_worker::ManagerSettings;

/// Log output format selected by `LOG_FORMAT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => bail!("LOG_FORMAT must be 'text' or 'json' (got '{other}')"),
        }
    }
}

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for running on a single workstation.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8080`).
    pub port: u16,
    /// Allowed CORS origins from comma-separated `CORS_ORIGINS`; `*` allows any.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Where generated artifacts are written and served from.
    pub output_dir: PathBuf,
    pub max_queue_size: NonZeroUsize,
    pub slug_max_len: usize,
    pub worker_fault_backoff_secs: u64,
    /// Optional directory served for unmatched routes (the web UI).
    pub static_dir: Option<PathBuf>,
    pub log_format: LogFormat,
    /// Rolling log file written alongside stdout; `None` disables it.
    pub log_file: Option<PathBuf>,
    /// Rotated log files kept on disk.
    pub log_file_backup_count: usize,
    pub engine: MagentaConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                     | Default                        |
    /// |-----------------------------|--------------------------------|
    /// | `HOST`                      | `0.0.0.0`                      |
    /// | `PORT`                      | `8080`                         |
    /// | `CORS_ORIGINS`              | `*`                            |
    /// | `REQUEST_TIMEOUT_SECS`      | `30`                           |
    /// | `OUTPUT_DIR`                | `~/.melodyengine/outputs`      |
    /// | `MAX_QUEUE_SIZE`            | `10`                           |
    /// | `SLUG_MAX_LEN`              | `50`                           |
    /// | `WORKER_FAULT_BACKOFF_SECS` | `5`                            |
    /// | `STATIC_DIR`                | unset                          |
    /// | `LOG_FORMAT`                | `text`                         |
    /// | `LOG_FILE`                  | `~/.melodyengine/app.log`      |
    /// | `LOG_FILE_BACKUP_COUNT`     | `7`                            |
    ///
    /// An empty `LOG_FILE` disables file logging.
    /// Engine variables are documented on [`MagentaConfig::from_env`].
    pub fn from_env() -> anyhow::Result<Self> {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port: u16 = parse_env("PORT", 8080)?;

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "*".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        for origin in cors_origins.iter().filter(|o| o.as_str() != "*") {
            HeaderValue::from_str(origin)
                .with_context(|| format!("Invalid CORS origin '{origin}'"))?;
        }

        let request_timeout_secs: u64 = parse_env("REQUEST_TIMEOUT_SECS", 30)?;

        let output_dir = match std::env::var_os("OUTPUT_DIR").filter(|v| !v.is_empty()) {
            Some(dir) => PathBuf::from(dir),
            None => app_home()
                .map(|home| home.join("outputs"))
                .context("Cannot resolve the home directory; set OUTPUT_DIR")?,
        };

        let max_queue_size: usize = parse_env("MAX_QUEUE_SIZE", 10)?;
        let max_queue_size = NonZeroUsize::new(max_queue_size)
            .context("MAX_QUEUE_SIZE must be at least 1")?;

        let slug_max_len: usize = parse_env("SLUG_MAX_LEN", DEFAULT_SLUG_MAX_LEN)?;
        if slug_max_len == 0 {
            bail!("SLUG_MAX_LEN must be at least 1");
        }

        let worker_fault_backoff_secs: u64 = parse_env("WORKER_FAULT_BACKOFF_SECS", 5)?;

        let static_dir = std::env::var_os("STATIC_DIR")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);

        let log_format = match std::env::var("LOG_FORMAT") {
            Ok(raw) => raw.parse()?,
            Err(_) => LogFormat::default(),
        };

        let log_file = match std::env::var_os("LOG_FILE") {
            Some(raw) if raw.is_empty() => None,
            Some(raw) => Some(PathBuf::from(raw)),
            None => app_home().map(|home| home.join("app.log")),
        };
        let log_file_backup_count: usize = parse_env("LOG_FILE_BACKUP_COUNT", 7)?;
        if log_file_backup_count == 0 {
            bail!("LOG_FILE_BACKUP_COUNT must be at least 1");
        }

        let engine = MagentaConfig::from_env()?;

        Ok(Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            output_dir,
            max_queue_size,
            slug_max_len,
            worker_fault_backoff_secs,
            static_dir,
            log_format,
            log_file,
            log_file_backup_count,
            engine,
        })
    }

    /// Settings handed to the job manager.
    pub fn manager_settings(&self) -> ManagerSettings {
        ManagerSettings {
            output_dir: self.output_dir.clone(),
            queue_capacity: self.max_queue_size,
            slug_max_len: self.slug_max_len,
            fault_backoff: Duration::from_secs(self.worker_fault_backoff_secs),
        }
    }

    /// Whether `CORS_ORIGINS` allows any origin.
    pub fn cors_allows_any(&self) -> bool {
        self.cors_origins.iter().any(|o| o == "*")
    }
}

/// `~/.melodyengine`, home of the default output directory and log file.
fn app_home() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".melodyengine"))
}

/// Parse `key` if set, otherwise return `default`.
fn parse_env<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{key} must be a valid number (got '{raw}'): {e}")),
        Err(_) => Ok(default),
    }
}
