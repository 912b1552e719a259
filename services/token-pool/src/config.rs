//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! Tokens are loaded from APIFY_TOKENS / APIFY_TOKEN or pool.tokens_file,
//! never stored in the TOML directly to avoid leaking secrets.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use common::Secret;
use credit_pool::PoolSettings;
use serde::Deserialize;

/// Config file looked up in the working directory when no path is given.
const DEFAULT_CONFIG_FILE: &str = "apify-token-pool.toml";

/// Environment variables holding the comma-separated token list, in lookup order.
const TOKEN_ENV_VARS: &[&str] = &["APIFY_TOKENS", "APIFY_TOKEN"];

/// Root configuration
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub pool: PoolConfig,
    #[serde(default)]
    pub apify: ApifyConfig,
    #[serde(default)]
    pub server: ServerConfig,
    /// Raw comma-separated token list, resolved from env or `tokens_file`
    #[serde(skip)]
    pub tokens: Option<Secret<String>>,
}

/// Refresh cadence and selection threshold
#[derive(Debug, Deserialize)]
pub struct PoolConfig {
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,
    #[serde(default = "default_min_remaining")]
    pub min_remaining_usd: f64,
    /// File containing the token list (alternative to the env vars)
    #[serde(default)]
    pub tokens_file: Option<PathBuf>,
}

/// Apify API settings
#[derive(Debug, Deserialize)]
pub struct ApifyConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

/// HTTP listener for health, metrics and admin endpoints
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

fn default_refresh_interval() -> u64 {
    credit_pool::DEFAULT_REFRESH_INTERVAL.as_secs()
}

fn default_probe_timeout() -> u64 {
    credit_pool::DEFAULT_PROBE_TIMEOUT.as_secs()
}

fn default_min_remaining() -> f64 {
    credit_pool::MIN_REMAINING_USD
}

fn default_api_base() -> String {
    budget_probe::DEFAULT_API_BASE.to_string()
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 9090))
}

fn default_max_connections() -> usize {
    64
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: default_refresh_interval(),
            probe_timeout_secs: default_probe_timeout(),
            min_remaining_usd: default_min_remaining(),
            tokens_file: None,
        }
    }
}

impl Default for ApifyConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            max_connections: default_max_connections(),
        }
    }
}

impl Config {
    /// Load configuration from an optional TOML file, then resolve tokens.
    ///
    /// Token resolution order:
    /// 1. APIFY_TOKENS env var
    /// 2. APIFY_TOKEN env var
    /// 3. pool.tokens_file path from config
    ///
    /// Finding no tokens at all is fatal.
    pub fn load(path: Option<&Path>) -> common::Result<Self> {
        let mut config: Config = match path {
            Some(path) => {
                let contents = std::fs::read_to_string(path)?;
                toml::from_str(&contents)?
            }
            None => Config::default(),
        };

        config.validate()?;
        config.tokens = Some(resolve_tokens(config.pool.tokens_file.as_deref())?);
        Ok(config)
    }

    fn validate(&self) -> common::Result<()> {
        if self.pool.refresh_interval_secs == 0 {
            return Err(common::Error::Config(
                "refresh_interval_secs must be greater than 0".into(),
            ));
        }

        if self.pool.probe_timeout_secs == 0 {
            return Err(common::Error::Config(
                "probe_timeout_secs must be greater than 0".into(),
            ));
        }

        let min = self.pool.min_remaining_usd;
        if !min.is_finite() || min < 0.0 {
            return Err(common::Error::Config(format!(
                "min_remaining_usd must be a non-negative amount, got: {min}"
            )));
        }

        if !self.apify.api_base.starts_with("http://")
            && !self.apify.api_base.starts_with("https://")
        {
            return Err(common::Error::Config(format!(
                "api_base must start with http:// or https://, got: {}",
                self.apify.api_base
            )));
        }

        if self.server.max_connections == 0 {
            return Err(common::Error::Config(
                "max_connections must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Pool tunables derived from the `[pool]` section.
    pub fn pool_settings(&self) -> PoolSettings {
        PoolSettings {
            refresh_interval: Duration::from_secs(self.pool.refresh_interval_secs),
            probe_timeout: Duration::from_secs(self.pool.probe_timeout_secs),
            min_remaining_usd: self.pool.min_remaining_usd,
        }
    }

    /// Resolve config file path from CLI arg, CONFIG_PATH env var, or the
    /// default file if present in the working directory.
    pub fn resolve_path(cli_path: Option<&str>) -> Option<PathBuf> {
        if let Some(p) = cli_path {
            return Some(PathBuf::from(p));
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return Some(PathBuf::from(p));
        }
        let default = PathBuf::from(DEFAULT_CONFIG_FILE);
        default.exists().then_some(default)
    }
}

fn resolve_tokens(tokens_file: Option<&Path>) -> common::Result<Secret<String>> {
    for var in TOKEN_ENV_VARS {
        if let Ok(value) = std::env::var(var) {
            if !value.trim().is_empty() {
                return Ok(Secret::new(value));
            }
        }
    }

    if let Some(path) = tokens_file {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            common::Error::Config(format!(
                "failed to read tokens_file {}: {e}",
                path.display()
            ))
        })?;
        let contents = contents.trim().to_owned();
        if !contents.is_empty() {
            return Ok(Secret::new(contents));
        }
    }

    Err(common::Error::NoCredentials)
}
