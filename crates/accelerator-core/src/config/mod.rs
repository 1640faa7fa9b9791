//! Application configuration with layered loading.
//!
//! # Configuration Hierarchy
//!
//! Configuration is loaded in this order (later overrides earlier):
//!
//! 1. **Compiled defaults**: the `Default` implementations below
//! 2. **Config file**: TOML file named by `ACCELERATOR_CONFIG` (default `config/config.toml`),
//!    optional
//! 3. **Environment variables**: `ACCELERATOR__SECTION__FIELD`, e.g. `ACCELERATOR__SERVER__PORT`
//!
//! The `server` binary applies its CLI flags on top of the loaded value.
//!
//! # Example
//!
//! ```toml
//! [server]
//! port = 5384
//!
//! [upstream]
//! url = "http://localhost:26657"
//! request_timeout_ms = 30000
//!
//! [cache]
//! height_check_interval_ms = 1000
//! ```

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::Path, time::Duration};
use url::Url;

use crate::upstream::{parse_upstream_url, HttpClientConfig};

pub const CONFIG_PATH_ENV: &str = "ACCELERATOR_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];
const LOG_FORMATS: &[&str] = &["pretty", "json"];

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// IP address to bind to. Defaults to `0.0.0.0`.
    pub bind_address: String,
    /// Port to listen on. Defaults to `5384`.
    pub port: u16,
    /// Largest request body accepted, in bytes. Defaults to 10 MiB.
    pub max_body_bytes: usize,
}

/// The Tendermint RPC node being fronted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base address. A missing scheme means `http://`.
    pub url: String,
    pub request_timeout_ms: u64,
    pub connect_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// When `false`, every request is forwarded and the height poller is not started.
    pub enabled: bool,
    /// How often `/blockchain` is polled for the latest height.
    pub height_check_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// One of `trace`, `debug`, `info`, `warn`, `error`.
    pub level: String,
    /// `pretty` or `json`.
    pub format: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub upstream: UpstreamConfig,
    pub cache: CacheConfig,
    pub logging: LoggingConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind_address: "0.0.0.0".to_string(), port: 5384, max_body_bytes: 10 * 1024 * 1024 }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:26657".to_string(),
            request_timeout_ms: 30_000,
            connect_timeout_ms: 5_000,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { enabled: true, height_check_interval_ms: 1_000 }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: "pretty".to_string() }
    }
}

impl AppConfig {
    /// Loads configuration from a TOML file with environment variable overrides.
    ///
    /// A missing file is not an error; defaults and environment still apply.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be parsed or a value has the wrong type.
    pub fn from_file<P: AsRef<Path>>(config_path: P) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let config_builder = Config::builder()
            .set_default("server.bind_address", defaults.server.bind_address)?
            .set_default("server.port", i64::from(defaults.server.port))?
            .set_default("server.max_body_bytes", defaults.server.max_body_bytes as u64)?
            .set_default("upstream.url", defaults.upstream.url)?
            .set_default("upstream.request_timeout_ms", defaults.upstream.request_timeout_ms)?
            .set_default("upstream.connect_timeout_ms", defaults.upstream.connect_timeout_ms)?
            .set_default("cache.enabled", defaults.cache.enabled)?
            .set_default(
                "cache.height_check_interval_ms",
                defaults.cache.height_check_interval_ms,
            )?
            .set_default("logging.level", defaults.logging.level)?
            .set_default("logging.format", defaults.logging.format)?
            .add_source(File::with_name(&config_path.as_ref().to_string_lossy()).required(false))
            .add_source(Environment::with_prefix("ACCELERATOR").separator("__").try_parsing(true))
            .build()?;

        config_builder.try_deserialize()
    }

    /// Loads from `ACCELERATOR_CONFIG`, falling back to `config/config.toml`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the configuration cannot be loaded or parsed.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path =
            std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::from_file(&config_path)
    }

    /// Checks the configuration for values that would fail at runtime.
    ///
    /// # Errors
    ///
    /// Returns a descriptive error string for the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        if self.server.port == 0 {
            return Err("Server port must be greater than 0".to_string());
        }

        if self.server.max_body_bytes == 0 {
            return Err("Max body size must be greater than 0".to_string());
        }

        self.socket_addr()?;
        self.upstream_url()?;

        if self.upstream.request_timeout_ms == 0 {
            return Err("Upstream request timeout must be greater than 0".to_string());
        }

        if self.upstream.connect_timeout_ms == 0 {
            return Err("Upstream connect timeout must be greater than 0".to_string());
        }

        if self.cache.height_check_interval_ms == 0 {
            return Err("Height check interval must be greater than 0".to_string());
        }

        if !LOG_LEVELS.contains(&self.logging.level.to_ascii_lowercase().as_str()) {
            return Err(format!(
                "Logging level must be one of {}, got '{}'",
                LOG_LEVELS.join(", "),
                self.logging.level
            ));
        }

        if !LOG_FORMATS.contains(&self.logging.format.as_str()) {
            return Err("Logging format must be 'json' or 'pretty'".to_string());
        }

        Ok(())
    }

    /// Combines `server.bind_address` and `server.port`.
    ///
    /// # Errors
    ///
    /// Returns an error string if the address is not a valid IP.
    pub fn socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.server.bind_address, self.server.port)
            .parse()
            .map_err(|_| {
                format!("Invalid socket address: {}:{}", self.server.bind_address, self.server.port)
            })
    }

    /// Parses `upstream.url`, defaulting the scheme to `http`.
    ///
    /// # Errors
    ///
    /// Returns an error string if the address is empty or not a valid http(s) URL.
    pub fn upstream_url(&self) -> Result<Url, String> {
        parse_upstream_url(&self.upstream.url).map_err(|e| e.to_string())
    }

    #[must_use]
    pub fn height_check_interval(&self) -> Duration {
        Duration::from_millis(self.cache.height_check_interval_ms)
    }

    #[must_use]
    pub fn http_client_config(&self) -> HttpClientConfig {
        HttpClientConfig {
            request_timeout: Duration::from_millis(self.upstream.request_timeout_ms),
            connect_timeout: Duration::from_millis(self.upstream.connect_timeout_ms),
        }
    }
}
