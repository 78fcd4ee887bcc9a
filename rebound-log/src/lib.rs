//! Logging setup for rebound.
//!
//! The rebound crates emit structured events through [`tracing`]. This crate
//! installs a `tracing-subscriber` configured from the environment so binaries
//! and tests can see retry decisions without wiring a subscriber by hand.
//!
//! # Usage
//!
//! ```rust,no_run
//! rebound_log::init();
//!
//! tracing::info!("client ready");
//! ```
//!
//! # Environment Variables
//!
//! - `REBOUND_DEBUG=1` - Enable debug logging
//! - `REBOUND_LOG_LEVEL=trace|debug|info|warn|error|off` - Set log level
//! - `REBOUND_LOG_FORMAT=pretty|json|compact` - Set output format
//! - `REBOUND_LOG_COLOR=1|0` - Enable/disable colors
//! - `REBOUND_LOG_TIMESTAMPS=1|0` - Enable/disable timestamps
//!
//! `RUST_LOG`, when set, takes precedence over the level derived from the
//! variables above.

use std::env;
use tracing::Subscriber;
use tracing::subscriber::SetGlobalDefaultError;
use tracing_subscriber::layer::{Layered, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

// ============================================================================
// Log Levels
// ============================================================================

/// Minimum level of events that are emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    /// Trace level (most verbose)
    Trace,
    /// Debug level
    Debug,
    /// Info level
    Info,
    /// Warning level
    Warn,
    /// Error level (least verbose)
    Error,
    /// Off (no logging)
    Off,
}

impl Level {
    /// Parse a level name, case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "trace" => Some(Level::Trace),
            "debug" => Some(Level::Debug),
            "info" => Some(Level::Info),
            "warn" | "warning" => Some(Level::Warn),
            "error" => Some(Level::Error),
            "off" | "none" => Some(Level::Off),
            _ => None,
        }
    }

    /// The `EnvFilter` directive for this level.
    pub fn as_directive(&self) -> &'static str {
        match self {
            Level::Trace => "trace",
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
            Level::Off => "off",
        }
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_directive())
    }
}

// ============================================================================
// Log Format
// ============================================================================

/// Output format for log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Multi-line, human oriented
    Pretty,
    /// Single-line
    Compact,
    /// Newline-delimited JSON
    Json,
}

impl Format {
    /// Parse a format name, case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pretty" => Some(Format::Pretty),
            "compact" => Some(Format::Compact),
            "json" => Some(Format::Json),
            _ => None,
        }
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Whether debug mode is enabled
    pub debug: bool,
    /// Minimum log level
    pub level: Level,
    /// Output format
    pub format: Format,
    /// Whether colors are enabled
    pub color: bool,
    /// Whether to include timestamps
    pub timestamps: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            debug: false,
            level: Level::Info,
            format: Format::Json,
            color: false,
            timestamps: true,
        }
    }
}

fn flag(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}

impl LogConfig {
    /// Create config from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Create config from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let debug = lookup("REBOUND_DEBUG").is_some_and(|v| flag(&v));

        let level = lookup("REBOUND_LOG_LEVEL")
            .and_then(|s| Level::parse(&s))
            .unwrap_or(if debug { Level::Debug } else { Level::Info });

        let format = lookup("REBOUND_LOG_FORMAT")
            .and_then(|s| Format::parse(&s))
            .unwrap_or(Format::Json);

        let color = lookup("REBOUND_LOG_COLOR")
            .map(|v| flag(&v))
            .unwrap_or_else(|| lookup("NO_COLOR").is_none() && lookup("TERM").is_some());

        let timestamps = lookup("REBOUND_LOG_TIMESTAMPS")
            .map(|v| flag(&v))
            .unwrap_or(true);

        Self {
            debug,
            level,
            format,
            color,
            timestamps,
        }
    }

    /// The filter used by [`subscriber`](Self::subscriber).
    ///
    /// `RUST_LOG` wins when it is set and valid.
    pub fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.level.as_directive()))
    }

    fn fmt_layer<S>(&self) -> Box<dyn Layer<S> + Send + Sync>
    where
        S: Subscriber + for<'a> LookupSpan<'a>,
    {
        let layer = fmt::layer()
            .with_ansi(self.color)
            .with_writer(std::io::stderr);

        match (self.format, self.timestamps) {
            (Format::Json, true) => layer.json().boxed(),
            (Format::Json, false) => layer.json().without_time().boxed(),
            (Format::Pretty, true) => layer.pretty().boxed(),
            (Format::Pretty, false) => layer.pretty().without_time().boxed(),
            (Format::Compact, true) => layer.compact().boxed(),
            (Format::Compact, false) => layer.compact().without_time().boxed(),
        }
    }

    /// Build a subscriber for this configuration.
    pub fn subscriber(&self) -> impl Subscriber + Send + Sync + use<> {
        tracing_subscriber::registry()
            .with(self.filter())
            .with(self.fmt_layer::<Layered<EnvFilter, Registry>>())
    }

    /// Install the subscriber as the global default.
    pub fn try_init(&self) -> Result<(), SetGlobalDefaultError> {
        tracing::subscriber::set_global_default(self.subscriber())
    }
}

// ============================================================================
// Public API
// ============================================================================

/// Install a global subscriber configured from the environment.
///
/// Does nothing if a global subscriber is already installed.
pub fn init() {
    let _ = try_init();
}

/// Install a global subscriber configured from the environment.
pub fn try_init() -> Result<(), SetGlobalDefaultError> {
    LogConfig::from_env().try_init()
}
