//! Telemetry and tracing utilities
//!
//! Subscriber initialization plus helpers that keep credentials out of logs.
//!
//! ## Example
//!
//! ```rust,ignore
//! use api_helper::telemetry::{init_subscriber, SubscriberConfig, OutputFormat};
//!
//! let config = SubscriberConfig::builder()
//!     .log_level(tracing::Level::DEBUG)
//!     .output_format(OutputFormat::Json)
//!     .build();
//! let _guard = init_subscriber(config)?;
//!
//! // or from API_HELPER_LOG_LEVEL / API_HELPER_LOG_FORMAT / API_HELPER_LOG_FILE
//! let _guard = api_helper::telemetry::init_from_env()?;
//! ```

use crate::error::{ApiError, Result};
use reqwest::header::HeaderMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::util::TryInitError;

pub const LOG_LEVEL_ENV: &str = "API_HELPER_LOG_LEVEL";
pub const LOG_FORMAT_ENV: &str = "API_HELPER_LOG_FORMAT";
pub const LOG_FILE_ENV: &str = "API_HELPER_LOG_FILE";

/// Output format for tracing logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    /// One JSON object per event, span fields nested
    Json,
    /// One JSON object per event, event fields flattened
    JsonCompact,
}

impl FromStr for OutputFormat {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            "json-compact" => Ok(Self::JsonCompact),
            _ => Err(ApiError::ConfigurationError(format!(
                "Invalid log format: {s}. Valid options: text, json, json-compact"
            ))),
        }
    }
}

/// Where and how the crate's `api_helper::*` events are written.
#[derive(Debug, Clone)]
pub struct SubscriberConfig {
    pub log_level: tracing::Level,
    pub output_format: OutputFormat,
    /// Write to stdout when no log file is set
    pub enable_console: bool,
    /// Takes precedence over console output
    pub log_file: Option<PathBuf>,
}

impl Default for SubscriberConfig {
    fn default() -> Self {
        Self {
            log_level: tracing::Level::INFO,
            output_format: OutputFormat::Text,
            enable_console: true,
            log_file: None,
        }
    }
}

impl SubscriberConfig {
    pub fn builder() -> SubscriberConfigBuilder {
        SubscriberConfigBuilder::default()
    }

    /// Warnings and errors only, as JSON, into `log_file`.
    pub fn production(log_file: PathBuf) -> Self {
        Self {
            log_level: tracing::Level::WARN,
            output_format: OutputFormat::Json,
            enable_console: false,
            log_file: Some(log_file),
        }
    }

    fn filter_directive(&self) -> String {
        format!("api_helper={}", self.log_level.as_str().to_ascii_lowercase())
    }
}

#[derive(Debug, Default)]
pub struct SubscriberConfigBuilder {
    config: SubscriberConfig,
}

impl SubscriberConfigBuilder {
    pub fn log_level(mut self, level: tracing::Level) -> Self {
        self.config.log_level = level;
        self
    }

    /// Parse a level name (`trace` .. `error`, case-insensitive).
    pub fn log_level_str(self, level: &str) -> Result<Self> {
        let level = level.parse::<tracing::Level>().map_err(|_| {
            ApiError::ConfigurationError(format!(
                "Invalid log level: {level}. Valid options: trace, debug, info, warn, error"
            ))
        })?;
        Ok(self.log_level(level))
    }

    pub fn output_format(mut self, format: OutputFormat) -> Self {
        self.config.output_format = format;
        self
    }

    pub fn output_format_str(self, format: &str) -> Result<Self> {
        Ok(self.output_format(format.parse()?))
    }

    pub fn enable_console(mut self, enable: bool) -> Self {
        self.config.enable_console = enable;
        self
    }

    pub fn log_file(mut self, path: PathBuf) -> Self {
        self.config.log_file = Some(path);
        self
    }

    pub fn build(self) -> SubscriberConfig {
        self.config
    }
}

fn make_writer(config: &SubscriberConfig) -> Result<(BoxMakeWriter, Option<WorkerGuard>)> {
    let Some(path) = &config.log_file else {
        let writer = if config.enable_console {
            BoxMakeWriter::new(std::io::stdout)
        } else {
            BoxMakeWriter::new(std::io::sink)
        };
        return Ok((writer, None));
    };

    let file_name = path.file_name().ok_or_else(|| {
        ApiError::ConfigurationError(format!("Invalid log file path: {}", path.display()))
    })?;
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(
        dir, file_name,
    ));
    Ok((BoxMakeWriter::new(writer), Some(guard)))
}

/// Install a global subscriber for the crate's events.
///
/// `RUST_LOG`, when set, replaces the level derived from `config`.
///
/// Returns the file writer's guard, which must outlive all logging. When a
/// global subscriber is already installed, nothing changes and `Ok(None)` is
/// returned.
pub fn init_subscriber(config: SubscriberConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.filter_directive()));
    let (writer, guard) = make_writer(&config)?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_target(true);
    let init_result = match config.output_format {
        OutputFormat::Text => builder.try_init(),
        OutputFormat::Json => builder.json().with_thread_ids(true).try_init(),
        OutputFormat::JsonCompact => builder.json().flatten_event(true).try_init(),
    };

    match init_result {
        Ok(()) => Ok(guard),
        Err(e) if e.is::<TryInitError>() => {
            tracing::debug!(target: "api_helper::telemetry", "global subscriber already installed");
            Ok(None)
        }
        Err(e) => Err(ApiError::ConfigurationError(format!(
            "Failed to initialize tracing: {e}"
        ))),
    }
}

/// Build the subscriber configuration from `API_HELPER_LOG_LEVEL`,
/// `API_HELPER_LOG_FORMAT` and `API_HELPER_LOG_FILE` as returned by `lookup`.
pub fn config_from_lookup<F>(lookup: F) -> Result<SubscriberConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let mut builder = SubscriberConfig::builder();
    if let Some(level) = lookup(LOG_LEVEL_ENV) {
        builder = builder.log_level_str(&level)?;
    }
    if let Some(format) = lookup(LOG_FORMAT_ENV) {
        builder = builder.output_format_str(&format)?;
    }
    if let Some(file) = lookup(LOG_FILE_ENV) {
        builder = builder.log_file(PathBuf::from(file));
    }
    Ok(builder.build())
}

/// [`init_subscriber`] configured from the process environment.
pub fn init_from_env() -> Result<Option<WorkerGuard>> {
    init_subscriber(config_from_lookup(|key| std::env::var(key).ok())?)
}

fn head_tail(value: &str, head: usize, tail: usize) -> Option<String> {
    let start = value.get(..head)?;
    let end = value.get(value.len().checked_sub(tail)?..)?;
    Some(format!("{start}...{end}"))
}

/// Shorten a credential so it can appear in logs.
pub fn mask_sensitive_value(value: &str) -> String {
    if let Some(token) = value.strip_prefix("Bearer ") {
        return match head_tail(token, 4, 4) {
            Some(masked) if token.len() > 8 => format!("Bearer {masked}"),
            _ => "Bearer ***".to_string(),
        };
    }
    match head_tail(value, 6, 4) {
        Some(masked) if value.len() > 16 => masked,
        _ => "***".to_string(),
    }
}

/// Render headers for a debug log line, masking credentials.
pub fn format_headers_for_logging(headers: &HeaderMap) -> String {
    let map: std::collections::BTreeMap<&str, String> = headers
        .iter()
        .map(|(k, v)| {
            let value = v.to_str().unwrap_or("<invalid>");
            let name = k.as_str();
            let masked = if v.is_sensitive()
                || name.contains("authorization")
                || name.contains("key")
                || name.contains("token")
                || name.contains("secret")
            {
                mask_sensitive_value(value)
            } else {
                value.to_string()
            };
            (name, masked)
        })
        .collect();
    serde_json::to_string(&map).unwrap_or_else(|_| format!("{map:?}"))
}
