//! Daemon configuration
//!
//! Defaults, overridden by an optional TOML file, overridden by command line
//! flags.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use serde_derive::Deserialize;
use thiserror::Error;

pub const DEFAULT_LEVEL: &str = "INFO";
pub const DEFAULT_MAKER: &str = "0x5661e7bc2403c7cc08df539e4a8e2972ec256d11";
pub const DEFAULT_PROXY: &str = "0x5661e7bc2403c7cc08df539e4a8e2972ec256d12";
pub const DEFAULT_INTERVAL_MS: u64 = 14_000;
pub const DEFAULT_CALL_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("cannot resolve the home directory of the current user")]
    NoHome,
}

#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Maker market matcher daemon", long_about = None)]
pub struct Args {
    /// Log level (CRITICAL, ERROR, WARNING, NOTICE, INFO, DEBUG)
    #[arg(short, long)]
    pub level: Option<String>,

    /// IPC endpoint for the Ethereum node
    #[arg(short, long)]
    pub ipc: Option<PathBuf>,

    /// Maker market contract address
    #[arg(short, long)]
    pub maker: Option<String>,

    /// Trade proxy contract address
    #[arg(short, long)]
    pub proxy: Option<String>,

    /// Interval to poll the market for new orders (e.g. 14s, 500ms, 2m)
    #[arg(short = 't', long, value_parser = parse_duration)]
    pub interval: Option<Duration>,

    /// TOML config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Address to serve Prometheus metrics on
    #[arg(long)]
    pub metrics_addr: Option<SocketAddr>,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub level: String,
    /// `None` resolves to the node's testnet socket in the home directory
    pub ipc: Option<PathBuf>,
    pub maker: String,
    pub proxy: String,
    pub interval_ms: u64,
    pub call_timeout_ms: u64,
    pub metrics_addr: Option<SocketAddr>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            level: DEFAULT_LEVEL.to_string(),
            ipc: None,
            maker: DEFAULT_MAKER.to_string(),
            proxy: DEFAULT_PROXY.to_string(),
            interval_ms: DEFAULT_INTERVAL_MS,
            call_timeout_ms: DEFAULT_CALL_TIMEOUT_MS,
            metrics_addr: None,
        }
    }
}

impl Config {
    pub fn from_toml<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Config file named by `--config` (or defaults), then the other flags.
    pub fn load(args: &Args) -> Result<Self, ConfigError> {
        let mut config = match &args.config {
            Some(path) => Config::from_toml(path)?,
            None => Config::default(),
        };
        config.apply(args);
        Ok(config)
    }

    fn apply(&mut self, args: &Args) {
        if let Some(level) = &args.level {
            self.level.clone_from(level);
        }
        if let Some(ipc) = &args.ipc {
            self.ipc = Some(ipc.clone());
        }
        if let Some(maker) = &args.maker {
            self.maker.clone_from(maker);
        }
        if let Some(proxy) = &args.proxy {
            self.proxy.clone_from(proxy);
        }
        if let Some(interval) = args.interval {
            self.interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        }
        if args.metrics_addr.is_some() {
            self.metrics_addr = args.metrics_addr;
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    /// The configured socket, or the default one under `$HOME`.
    pub fn ipc_path(&self) -> Result<PathBuf, ConfigError> {
        if let Some(ipc) = &self.ipc {
            return Ok(ipc.clone());
        }
        let home = std::env::var_os("HOME")
            .filter(|h| !h.is_empty())
            .ok_or(ConfigError::NoHome)?;
        Ok(default_ipc(Path::new(&home)))
    }
}

pub fn default_ipc(home: &Path) -> PathBuf {
    home.join(".ethereum").join("testnet").join("geth.ipc")
}

/// Parses `500ms`, `14s`, `2m`, `1h` or a bare number of seconds.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let (value, unit) = s.split_at(split);
    let value: u64 = value
        .parse()
        .map_err(|_| format!("invalid duration: {:?}", s))?;
    let scale = match unit {
        "ms" => return Ok(Duration::from_millis(value)),
        "" | "s" => 1,
        "m" => 60,
        "h" => 3600,
        _ => return Err(format!("invalid duration unit in {:?}", s)),
    };
    value
        .checked_mul(scale)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("duration out of range: {:?}", s))
}
