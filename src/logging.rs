/// Structured logging for the field visit import service
///
/// Provides context-rich logging with location identifiers, timestamps,
/// and severity levels. Supports both console output and file-based
/// logging for unattended batch imports.

use chrono::Utc;
use serde::Deserialize;
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::sync::Mutex;

// ---------------------------------------------------------------------------
// Log Levels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    #[serde(alias = "warn")]
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warning => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline Stages
// ---------------------------------------------------------------------------

/// Which stage of the import pipeline emitted a log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogScope {
    Import,
    Partition,
    Consolidate,
    Sink,
    System,
}

impl fmt::Display for LogScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogScope::Import => write!(f, "IMPORT"),
            LogScope::Partition => write!(f, "PARTITION"),
            LogScope::Consolidate => write!(f, "MERGE"),
            LogScope::Sink => write!(f, "SINK"),
            LogScope::System => write!(f, "SYS"),
        }
    }
}

// ---------------------------------------------------------------------------
// Logger Configuration
// ---------------------------------------------------------------------------

/// Global logger instance
static LOGGER: Mutex<Option<Logger>> = Mutex::new(None);

pub struct Logger {
    /// Minimum log level to display
    min_level: LogLevel,
    /// Optional file path for logging
    log_file: Option<String>,
    /// Whether to include timestamps in console output
    console_timestamps: bool,
}

impl Logger {
    /// Initialize the global logger
    pub fn init(min_level: LogLevel, log_file: Option<String>, console_timestamps: bool) {
        let logger = Logger {
            min_level,
            log_file,
            console_timestamps,
        };

        // A poisoned lock only means another thread panicked mid-log.
        let mut guard = LOGGER.lock().unwrap_or_else(|e| e.into_inner());
        *guard = Some(logger);
    }

    fn log(&self, level: LogLevel, scope: &LogScope, location: Option<&str>, message: &str) {
        if level < self.min_level {
            return;
        }

        let line = format_entry(level, scope, location, message);

        if self.console_timestamps {
            let stamped = format!("{} {}", Utc::now().format("%Y-%m-%d %H:%M:%S UTC"), line);
            match level {
                LogLevel::Error | LogLevel::Warning => eprintln!("{}", stamped),
                LogLevel::Info | LogLevel::Debug => println!("{}", stamped),
            }
        } else {
            let location_part = location.map(|s| format!(" [{}]", s)).unwrap_or_default();
            match level {
                LogLevel::Error => eprintln!("   ✗ {}{}: {}", scope, location_part, message),
                LogLevel::Warning => eprintln!("   ⚠ {}{}: {}", scope, location_part, message),
                LogLevel::Info => println!("   {}", message),
                LogLevel::Debug => {} // Skip debug in non-timestamp mode
            }
        }

        if let Some(ref path) = self.log_file {
            let entry = format!("{} {}", Utc::now().format("%Y-%m-%d %H:%M:%S UTC"), line);
            if let Err(e) = Self::append_to_file(path, &entry) {
                eprintln!("Failed to write to log file {}: {}", path, e);
            }
        }
    }

    fn append_to_file(path: &str, entry: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{}", entry)?;
        Ok(())
    }
}

/// Formats a log line without its timestamp, e.g.
/// `WARN MERGE [LOC1]: visit exceeds 36 hours`.
pub fn format_entry(level: LogLevel, scope: &LogScope, location: Option<&str>, message: &str) -> String {
    let location_part = location.map(|s| format!(" [{}]", s)).unwrap_or_default();
    format!("{} {}{}: {}", level, scope, location_part, message)
}

// ---------------------------------------------------------------------------
// Public Logging Functions
// ---------------------------------------------------------------------------

/// Initialize the global logger
pub fn init_logger(min_level: LogLevel, log_file: Option<&str>, console_timestamps: bool) {
    Logger::init(min_level, log_file.map(String::from), console_timestamps);
}

fn emit(level: LogLevel, scope: LogScope, location: Option<&str>, message: &str) {
    let guard = LOGGER.lock().unwrap_or_else(|e| e.into_inner());
    if let Some(logger) = guard.as_ref() {
        logger.log(level, &scope, location, message);
    }
}

/// Log a general informational message
pub fn info(scope: LogScope, location: Option<&str>, message: &str) {
    emit(LogLevel::Info, scope, location, message);
}

/// Log a warning message
pub fn warn(scope: LogScope, location: Option<&str>, message: &str) {
    emit(LogLevel::Warning, scope, location, message);
}

/// Log an error message
pub fn error(scope: LogScope, location: Option<&str>, message: &str) {
    emit(LogLevel::Error, scope, location, message);
}

/// Log a debug message
pub fn debug(scope: LogScope, location: Option<&str>, message: &str) {
    emit(LogLevel::Debug, scope, location, message);
}

// ---------------------------------------------------------------------------
// Batch Summary Logging
// ---------------------------------------------------------------------------

/// Log a summary of a completed import batch
pub fn log_batch_summary(locations: usize, visits: usize, warnings: usize) {
    let message = format!(
        "Import complete: {} visits across {} locations, {} warnings",
        visits, locations, warnings
    );

    if warnings == 0 {
        info(LogScope::Import, None, &message);
    } else {
        warn(LogScope::Import, None, &message);
    }
}
