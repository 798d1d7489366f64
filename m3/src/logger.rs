//! Leveled logging
//!
//! The daemon logs through the `Logger` trait so the matcher and the market
//! adaptor can be driven with a silent sink in tests. `StdLogger` forwards to
//! the `log` facade with `env_logger` as the backend.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Severity accepted on the command line, most to least severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Critical,
    Error,
    Warning,
    Notice,
    Info,
    Debug,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown log level: {0}")]
pub struct ParseLevelError(pub String);

impl FromStr for Level {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CRITICAL" => Ok(Level::Critical),
            "ERROR" => Ok(Level::Error),
            "WARNING" => Ok(Level::Warning),
            "NOTICE" => Ok(Level::Notice),
            "INFO" => Ok(Level::Info),
            "DEBUG" => Ok(Level::Debug),
            _ => Err(ParseLevelError(s.to_string())),
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Level::Critical => "CRITICAL",
            Level::Error => "ERROR",
            Level::Warning => "WARNING",
            Level::Notice => "NOTICE",
            Level::Info => "INFO",
            Level::Debug => "DEBUG",
        };
        f.write_str(name)
    }
}

impl Level {
    /// Maps onto the `log` filter; critical and notice have no direct
    /// counterpart and fold into error and info.
    pub fn filter(self) -> log::LevelFilter {
        match self {
            Level::Critical | Level::Error => log::LevelFilter::Error,
            Level::Warning => log::LevelFilter::Warn,
            Level::Notice | Level::Info => log::LevelFilter::Info,
            Level::Debug => log::LevelFilter::Debug,
        }
    }
}

/// Six-severity log sink. Implementations must never fail or panic.
///
/// Call sites build the message with `format_args!`:
///
/// ```ignore
/// log.info(format_args!("executed {} matches", n));
/// ```
pub trait Logger: Send + Sync {
    fn critical(&self, args: fmt::Arguments<'_>);
    fn error(&self, args: fmt::Arguments<'_>);
    fn warning(&self, args: fmt::Arguments<'_>);
    fn notice(&self, args: fmt::Arguments<'_>);
    fn info(&self, args: fmt::Arguments<'_>);
    fn debug(&self, args: fmt::Arguments<'_>);
}

/// Forwards to the `log` macros.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdLogger;

impl StdLogger {
    /// Installs `env_logger` at the given level. `RUST_LOG` still applies on
    /// top, so module filters keep working.
    pub fn init(level: Level) -> Self {
        let _ = env_logger::Builder::new()
            .filter_level(level.filter())
            .parse_default_env()
            .try_init();
        StdLogger
    }
}

impl Logger for StdLogger {
    fn critical(&self, args: fmt::Arguments<'_>) {
        log::error!("CRITICAL {}", args);
    }

    fn error(&self, args: fmt::Arguments<'_>) {
        log::error!("{}", args);
    }

    fn warning(&self, args: fmt::Arguments<'_>) {
        log::warn!("{}", args);
    }

    fn notice(&self, args: fmt::Arguments<'_>) {
        log::info!("NOTICE {}", args);
    }

    fn info(&self, args: fmt::Arguments<'_>) {
        log::info!("{}", args);
    }

    fn debug(&self, args: fmt::Arguments<'_>) {
        log::debug!("{}", args);
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NopLogger;

impl Logger for NopLogger {
    fn critical(&self, _args: fmt::Arguments<'_>) {}
    fn error(&self, _args: fmt::Arguments<'_>) {}
    fn warning(&self, _args: fmt::Arguments<'_>) {}
    fn notice(&self, _args: fmt::Arguments<'_>) {}
    fn info(&self, _args: fmt::Arguments<'_>) {}
    fn debug(&self, _args: fmt::Arguments<'_>) {}
}
