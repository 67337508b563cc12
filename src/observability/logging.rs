//! Structured logging using the tracing crate
//!
//! Provides machine-readable logging plus span macros around link upkeep,
//! session upkeep and command application.
//!
//! ## Log Format Options
//!
//! The output format is controlled by the `LOG_FORMAT` environment variable:
//!
//! - `json` - Structured JSON format for log aggregation
//! - `pretty` - Human-readable format with colors for development
//! - `compact` - Terminal-friendly format with colors but minimal spacing
//!
//! ## Environment Variables
//!
//! - `LOG_LEVEL`: Log level (ERROR, WARN, INFO, DEBUG, TRACE) - defaults to INFO
//! - `LOG_FORMAT`: Output format (json, pretty, compact) - defaults to json
//! - `LOG_SPANS`: Include span events (true/false) - defaults to false
//! - `RUST_LOG`: Override log filtering (follows env_logger format)
//!
//! ## Examples
//!
//! ```bash
//! # Production JSON logging
//! LOG_FORMAT=json LOG_LEVEL=INFO ./nodeagent run
//!
//! # Watch every debounce decision on a terminal
//! LOG_FORMAT=compact LOG_LEVEL=TRACE ./nodeagent run
//! ```

use std::env;
use tracing::Level;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Dependencies that are too chatty at the node's own level
const NOISY_TARGETS: &[&str] = &["rumqttc=warn"];

/// Log output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// JSON format for structured logging (machine-readable)
    Json,
    /// Pretty format with colors and indentation (human-readable)
    Pretty,
    /// Compact format with colors but minimal spacing (terminal-friendly)
    Compact,
}

impl LogFormat {
    /// Parse log format from string
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => LogFormat::Json,
            "pretty" => LogFormat::Pretty,
            "compact" => LogFormat::Compact,
            _ => LogFormat::Json,
        }
    }
}

/// Parse a level name, falling back to INFO
pub fn parse_level(s: &str) -> Level {
    match s.to_uppercase().as_str() {
        "ERROR" => Level::ERROR,
        "WARN" => Level::WARN,
        "INFO" => Level::INFO,
        "DEBUG" => Level::DEBUG,
        "TRACE" => Level::TRACE,
        _ => Level::INFO,
    }
}

/// Build the filter for `level`, honouring `RUST_LOG` when set
pub fn build_filter(level: Level, rust_log: Option<&str>) -> EnvFilter {
    if let Some(rust_log) = rust_log {
        return EnvFilter::new(rust_log);
    }

    NOISY_TARGETS
        .iter()
        .filter_map(|d| d.parse::<Directive>().ok())
        .fold(EnvFilter::new(level.to_string()), |filter, directive| {
            filter.add_directive(directive)
        })
}

fn span_events(include_spans: bool) -> fmt::format::FmtSpan {
    if include_spans {
        fmt::format::FmtSpan::NEW | fmt::format::FmtSpan::CLOSE
    } else {
        fmt::format::FmtSpan::NONE
    }
}

/// Initialize logging with manual configuration
///
/// Does nothing if a global subscriber is already installed.
pub fn init_logging(level: Level, format: LogFormat, include_spans: bool) {
    let filter = build_filter(level, env::var("RUST_LOG").ok().as_deref());
    let subscriber = tracing_subscriber::registry().with(filter);

    let result = match format {
        LogFormat::Json => subscriber
            .with(fmt::layer().json().with_span_events(span_events(include_spans)))
            .try_init(),
        LogFormat::Pretty => subscriber
            .with(
                fmt::layer()
                    .pretty()
                    .with_ansi(true)
                    .with_span_events(span_events(include_spans)),
            )
            .try_init(),
        LogFormat::Compact => subscriber
            .with(
                fmt::layer()
                    .compact()
                    .with_ansi(true)
                    .with_target(false)
                    .with_span_events(span_events(include_spans)),
            )
            .try_init(),
    };

    if let Err(e) = result {
        eprintln!("logging already initialized: {e}");
    }
}

/// Initialize logging from environment variables
///
/// `level_override` (from `-v`) wins over `LOG_LEVEL`.
pub fn init_default_logging(level_override: Option<Level>) {
    let level = level_override.unwrap_or_else(|| {
        parse_level(&env::var("LOG_LEVEL").unwrap_or_else(|_| "INFO".to_string()))
    });

    let format = env::var("LOG_FORMAT").unwrap_or_else(|_| "json".to_string());
    let log_format = LogFormat::parse(&format);

    let include_spans = env::var("LOG_SPANS")
        .unwrap_or_else(|_| "false".to_string())
        .to_lowercase()
        == "true";

    init_logging(level, log_format, include_spans);
}

/// Create a network link span
#[macro_export]
macro_rules! link_span {
    ($($field:tt)*) => {
        tracing::info_span!("network_link", $($field)*)
    };
}

/// Create a broker session span
#[macro_export]
macro_rules! session_span {
    ($($field:tt)*) => {
        tracing::info_span!("broker_session", $($field)*)
    };
}

/// Create a command handling span
#[macro_export]
macro_rules! command_span {
    ($($field:tt)*) => {
        tracing::info_span!("command", $($field)*)
    };
}

// Re-export macros for convenience
pub use {command_span, link_span, session_span};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parse() {
        assert_eq!(LogFormat::parse("json"), LogFormat::Json);
        assert_eq!(LogFormat::parse("PRETTY"), LogFormat::Pretty);
        assert_eq!(LogFormat::parse("Compact"), LogFormat::Compact);
    }

    #[test]
    fn test_log_format_parse_invalid_defaults_to_json() {
        assert_eq!(LogFormat::parse("invalid"), LogFormat::Json);
        assert_eq!(LogFormat::parse(""), LogFormat::Json);
        assert_eq!(LogFormat::parse("yaml"), LogFormat::Json);
    }

    #[test]
    fn test_parse_level() {
        let test_cases = vec![
            ("ERROR", Level::ERROR),
            ("warn", Level::WARN),
            ("Info", Level::INFO),
            ("DEBUG", Level::DEBUG),
            ("trace", Level::TRACE),
            ("invalid", Level::INFO),
        ];

        for (input, expected) in test_cases {
            assert_eq!(parse_level(input), expected, "Failed for input: {input}");
        }
    }

    #[test]
    fn test_build_filter_quiets_rumqttc() {
        let filter = build_filter(Level::DEBUG, None).to_string();
        assert!(filter.contains("debug"));
        assert!(filter.contains("rumqttc=warn"));
    }

    #[test]
    fn test_build_filter_rust_log_overrides() {
        let filter = build_filter(Level::DEBUG, Some("nodeagent=trace")).to_string();
        assert!(filter.contains("nodeagent=trace"));
        assert!(!filter.contains("rumqttc"));
    }

    #[test]
    fn test_span_macros_build_spans() {
        let _link = link_span!(ssid = "test");
        let _session = session_span!(client_id = "esp32-client-1");
        let _command = command_span!(topic = "led/red");
    }
}
