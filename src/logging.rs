//! Logging setup for Parley.
//!
//! Log lines go to stdout and to the configured log file. `RUST_LOG`
//! overrides the configured level when set.

use std::fs::{self, File};
use std::path::Path;
use std::sync::Arc;

use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;
use crate::Result;

/// Parse log level string to tracing Level.
fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Build the default filter for the given level.
///
/// sqlx logs every executed statement at info under `sqlx::query`; chat
/// traffic would drown the log in SELECTs, so those are capped at warn.
/// `RUST_LOG` still overrides the default level.
fn default_filter(level: Level) -> EnvFilter {
    let mut filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();
    if let Ok(directive) = "sqlx::query=warn".parse() {
        filter = filter.add_directive(directive);
    }
    filter
}

/// Initialize logging from the given configuration.
///
/// Creates the log file's parent directory if missing and mirrors every
/// line to stdout and the file.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let filter = default_filter(parse_level(&config.level));

    if let Some(parent) = Path::new(&config.file).parent() {
        if !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }

    let log_file = Arc::new(File::create(&config.file)?);
    let writer = std::io::stdout.and(log_file);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true),
        )
        .with(filter)
        .init();

    Ok(())
}

/// Console-only logging, used when the log file cannot be opened and in
/// development.
pub fn init_console_only(level: &str) {
    let filter = default_filter(parse_level(level));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout)
                .with_ansi(true)
                .with_target(true),
        )
        .with(filter)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        let cases = [
            ("trace", Level::TRACE),
            ("DEBUG", Level::DEBUG),
            ("info", Level::INFO),
            ("warn", Level::WARN),
            ("warning", Level::WARN),
            ("ERROR", Level::ERROR),
            // Unknown and empty fall back to info
            ("verbose", Level::INFO),
            ("", Level::INFO),
        ];
        for (input, expected) in cases {
            assert_eq!(parse_level(input), expected, "input {input:?}");
        }
    }

    #[test]
    fn test_default_filter_quiets_statement_logging() {
        let filter = default_filter(Level::DEBUG);
        let rendered = filter.to_string();
        assert!(rendered.contains("sqlx::query=warn"), "got {rendered}");
    }
}
