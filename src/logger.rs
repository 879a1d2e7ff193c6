//! Structured logging for quill-tar
//!
//! Embedding applications normally install their own `log` backend; these
//! helpers exist for tools that want the quill house format. `QUILL_LOG_LEVEL`
//! selects the level ("debug", "trace", ...) and a `json:` prefix switches to
//! JSON lines; `QUILL_LOG_PATH` redirects JSON output to a file.

use std::env;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::sync::Mutex;

use chrono::{Local, Utc};
use log::{Level, LevelFilter, Log, Metadata, Record};
use serde_json::json;

/// Logger emitting one JSON object per record
#[derive(Debug)]
pub struct JsonLogger {
    level: Level,
    sink: Mutex<Option<std::fs::File>>,
}

impl JsonLogger {
    /// Create a JSON logger writing to `log_path`, or stderr when `None`.
    pub fn new(level: Level, log_path: Option<String>) -> Self {
        let sink = log_path
            .and_then(|path| OpenOptions::new().create(true).append(true).open(path).ok());
        JsonLogger {
            level,
            sink: Mutex::new(sink),
        }
    }

    fn emit(&self, line: &str) {
        if let Ok(mut guard) = self.sink.lock() {
            if let Some(file) = guard.as_mut() {
                let _ = writeln!(file, "{line}");
                let _ = file.flush();
                return;
            }
        }
        let _ = writeln!(io::stderr(), "{line}");
    }
}

impl Log for JsonLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let entry = json!({
            "timestamp": Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true),
            "level": record.level().to_string().to_lowercase(),
            "message": record.args().to_string(),
            "module": record.target(),
            "pid": std::process::id(),
        });
        self.emit(&serde_json::to_string(&entry).unwrap_or_default());
    }

    fn flush(&self) {
        if let Ok(mut guard) = self.sink.lock() {
            if let Some(file) = guard.as_mut() {
                let _ = file.flush();
            }
        }
        let _ = io::stderr().flush();
    }
}

fn parse_level(name: &str) -> Level {
    match name {
        "trace" => Level::Trace,
        "debug" => Level::Debug,
        "warn" => Level::Warn,
        "error" => Level::Error,
        _ => Level::Info,
    }
}

/// Initialize logging from an explicit level string.
///
/// A `json:` prefix (or the bare value `json`) selects the JSON logger;
/// anything else configures a plain-text `env_logger` backend at that
/// level. Double initialization is reported on stderr, never a panic.
pub fn init_with_level(level_str: &str) {
    let (use_json, name) = match level_str.strip_prefix("json:") {
        Some(stripped) => (true, stripped),
        None if level_str == "json" => (true, "info"),
        None => (false, level_str),
    };

    if use_json {
        let level = parse_level(name);
        let logger = Box::new(JsonLogger::new(level, env::var("QUILL_LOG_PATH").ok()));
        match log::set_boxed_logger(logger) {
            Ok(()) => log::set_max_level(level.to_level_filter()),
            Err(err) => eprintln!("failed to initialize quill-tar logger: {err}"),
        }
        return;
    }

    let filter = match name {
        "off" => LevelFilter::Off,
        other => parse_level(other).to_level_filter(),
    };
    env_logger::Builder::new()
        .filter_level(filter)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {} {}] {}",
                Local::now().format("%Y-%m-%dT%H:%M:%S%z"),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}

/// Initialize logging from `QUILL_LOG_LEVEL`, defaulting to `info`.
pub fn init() {
    let level = env::var("QUILL_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    init_with_level(&level);
}

/// Whether `QUILL_LOG_LEVEL` requests JSON output
pub fn is_json_logging() -> bool {
    env::var("QUILL_LOG_LEVEL")
        .map(|value| value.starts_with("json"))
        .unwrap_or(false)
}
