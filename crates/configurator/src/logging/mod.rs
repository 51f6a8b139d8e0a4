//! Structured event logging and subscriber setup.
//!
//! Domain events (`updated_profile`, `no_update`, ...) go through an
//! [`EventLogger`] carried in memory. Diagnostic logging uses `tracing`, with
//! `log` records bridged in by `tracing-log`.

use std::str::FromStr;
use std::sync::Mutex;

use serde_json::{Map, Value};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::EnvFilter;

/// Environment variable selecting the minimum severity.
pub const LOG_LEVEL_ENV: &str = "CONFIGURATOR_LOG_LEVEL";
/// Environment variable selecting the output format (`json` or `text`).
pub const LOG_FORMAT_ENV: &str = "CONFIGURATOR_LOG_FORMAT";

/// Key/value payload of a structured event.
pub type EventData = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    Debug,
    Info,
    Notice,
    Warning,
    Error,
    Critical,
    Alert,
    Emergency,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Notice => "notice",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
            LogLevel::Critical => "critical",
            LogLevel::Alert => "alert",
            LogLevel::Emergency => "emergency",
        }
    }

    /// The tracing filter admitting this level and everything more severe.
    pub fn level_filter(&self) -> LevelFilter {
        match self {
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info | LogLevel::Notice => LevelFilter::INFO,
            LogLevel::Warning => LevelFilter::WARN,
            LogLevel::Error | LogLevel::Critical | LogLevel::Alert | LogLevel::Emergency => {
                LevelFilter::ERROR
            }
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "notice" => Ok(LogLevel::Notice),
            "warning" | "warn" => Ok(LogLevel::Warning),
            "error" => Ok(LogLevel::Error),
            "critical" => Ok(LogLevel::Critical),
            "alert" => Ok(LogLevel::Alert),
            "emergency" => Ok(LogLevel::Emergency),
            _ => Err(format!("Unknown log level: {}", s)),
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sink for structured domain events.
pub trait EventLogger: Send + Sync {
    fn log(&self, level: LogLevel, event_type: &str, data: EventData);
}

/// Builds event data from a JSON object literal. Non-object values yield an
/// empty map.
pub fn event_data(value: Value) -> EventData {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Forwards events to the global `tracing` subscriber.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl EventLogger for TracingLogger {
    fn log(&self, level: LogLevel, event_type: &str, data: EventData) {
        let data = Value::Object(data).to_string();
        match level.level_filter().into_level() {
            Some(tracing::Level::DEBUG) => {
                tracing::debug!(target: "configurator::events", event_type, %data, severity = level.as_str())
            }
            Some(tracing::Level::INFO) => {
                tracing::info!(target: "configurator::events", event_type, %data, severity = level.as_str())
            }
            Some(tracing::Level::WARN) => {
                tracing::warn!(target: "configurator::events", event_type, %data, severity = level.as_str())
            }
            _ => {
                tracing::error!(target: "configurator::events", event_type, %data, severity = level.as_str())
            }
        }
    }
}

/// One captured event.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub level: LogLevel,
    pub event_type: String,
    pub data: EventData,
}

/// Captures events in memory. Used by tests.
#[derive(Debug, Default)]
pub struct RecordingLogger {
    records: Mutex<Vec<LogRecord>>,
}

impl RecordingLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<LogRecord> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }

    /// Records of the given event type, in emission order.
    pub fn events(&self, event_type: &str) -> Vec<LogRecord> {
        self.records()
            .into_iter()
            .filter(|r| r.event_type == event_type)
            .collect()
    }
}

impl EventLogger for RecordingLogger {
    fn log(&self, level: LogLevel, event_type: &str, data: EventData) {
        if let Ok(mut records) = self.records.lock() {
            records.push(LogRecord {
                level,
                event_type: event_type.to_string(),
                data,
            });
        }
    }
}

/// Resolves the requested severity from the raw environment value.
///
/// Returns `Ok(None)` when nothing was requested and `Err` carrying the raw
/// value when it is not a recognized severity.
pub fn requested_level(raw: Option<&str>) -> Result<Option<LogLevel>, String> {
    match raw {
        None => Ok(None),
        Some(value) if value.trim().is_empty() => Ok(None),
        Some(value) => value.parse().map(Some).map_err(|_| value.to_string()),
    }
}

/// Severity requested through [`LOG_LEVEL_ENV`], falling back to `info`.
/// An unrecognized value is reported on stderr and otherwise ignored.
pub fn level_from_env() -> LogLevel {
    let raw = std::env::var(LOG_LEVEL_ENV).ok();
    match requested_level(raw.as_deref()) {
        Ok(level) => level.unwrap_or(LogLevel::Info),
        Err(value) => {
            eprintln!("Unknown log level requested in {}: {}", LOG_LEVEL_ENV, value);
            LogLevel::Info
        }
    }
}

/// Whether [`LOG_FORMAT_ENV`] asks for JSON output.
pub fn json_from_env() -> bool {
    std::env::var(LOG_FORMAT_ENV)
        .map(|v| v.trim().eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

/// Installs the global subscriber and bridges `log` records into it.
pub fn init(level: LogLevel, json: bool) -> Result<(), String> {
    let filter = EnvFilter::default().add_directive(level.level_filter().into());

    let result = if json {
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json());
        tracing::subscriber::set_global_default(subscriber)
    } else {
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer());
        tracing::subscriber::set_global_default(subscriber)
    };
    result.map_err(|e| format!("Failed to install tracing subscriber: {}", e))?;

    tracing_log::LogTracer::init().map_err(|e| format!("Failed to bridge log records: {}", e))
}
