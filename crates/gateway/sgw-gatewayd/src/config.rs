//! Daemon configuration
//!
//! Values come from an optional `gateway.toml` file and environment
//! variables with the `SGW_` prefix (nested keys use `__`, e.g.
//! `SGW__SERVER__PORT=9000`). Environment variables win over the file.

use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use tracing::{debug, info};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub session: SessionConfig,
    pub logging: LoggingConfig,
}

/// Server network configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,

    #[serde(default = "default_port")]
    pub port: u16,
}

/// JWT verification configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,

    #[serde(default = "default_issuer")]
    pub issuer: String,

    #[serde(default = "default_audience")]
    pub audience: String,
}

/// Session loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Seconds of inbound silence before a connection is aborted
    #[serde(default = "default_idle_deadline_secs")]
    pub idle_deadline_secs: u64,

    /// JSON field carrying the protocol tag
    #[serde(default = "default_tag_field")]
    pub tag_field: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level or a full tracing filter string
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_host() -> IpAddr {
    "127.0.0.1".parse().unwrap()
}

fn default_port() -> u16 {
    3000
}

fn default_jwt_secret() -> String {
    "change-me-in-production".to_string()
}

fn default_issuer() -> String {
    "session-gateway".to_string()
}

fn default_audience() -> String {
    "session-gateway-clients".to_string()
}

fn default_idle_deadline_secs() -> u64 {
    25
}

fn default_tag_field() -> String {
    "action".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            auth: AuthConfig::default(),
            session: SessionConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: default_jwt_secret(),
            issuer: default_issuer(),
            audience: default_audience(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_deadline_secs: default_idle_deadline_secs(),
            tag_field: default_tag_field(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from the optional config file and environment
    pub fn load() -> Result<Self> {
        let mut builder = ConfigBuilder::builder();

        let config_path =
            std::env::var("SGW_CONFIG_FILE").unwrap_or_else(|_| "gateway.toml".to_string());

        if std::path::Path::new(&config_path).exists() {
            info!("loading configuration from {}", config_path);
            builder = builder.add_source(File::with_name(&config_path));
        } else {
            debug!("no config file at {}, using defaults", config_path);
        }

        builder = builder.add_source(
            Environment::with_prefix("SGW")
                .separator("__")
                .try_parsing(true),
        );

        let settings: Config = builder
            .build()
            .context("failed to build configuration")?
            .try_deserialize()
            .context("failed to deserialize configuration")?;

        settings.validate()?;

        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            anyhow::bail!("server port cannot be 0");
        }

        if self.auth.jwt_secret.is_empty() {
            anyhow::bail!("JWT secret cannot be empty");
        }

        if !cfg!(debug_assertions) && self.auth.jwt_secret == default_jwt_secret() {
            anyhow::bail!("JWT secret must be changed from default in production");
        }

        if self.session.idle_deadline_secs == 0 {
            anyhow::bail!("idle deadline must be positive");
        }

        if self.session.tag_field.is_empty() {
            anyhow::bail!("tag field cannot be empty");
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        let level = self.logging.level.to_lowercase();
        if !level.contains('=') && !level.contains(',') && !valid_levels.contains(&level.as_str()) {
            anyhow::bail!(
                "invalid log level '{}', must be one of {:?} or a filter string",
                self.logging.level,
                valid_levels
            );
        }

        Ok(())
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::from((self.server.host, self.server.port))
    }

    /// Filter string for tracing, widened to the gateway crates
    pub fn log_filter(&self) -> String {
        if self.logging.level.contains('=') || self.logging.level.contains(',') {
            self.logging.level.clone()
        } else {
            format!(
                "sgw_gatewayd={},sgw_gateway={},{}",
                self.logging.level, self.logging.level, self.logging.level
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.session.idle_deadline_secs, 25);
        assert_eq!(config.session.tag_field, "action");
    }

    #[test]
    fn zero_port_is_rejected() {
        let mut config = Config::default();
        config.server.port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_idle_deadline_is_rejected() {
        let mut config = Config::default();
        config.session.idle_deadline_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn empty_tag_field_is_rejected() {
        let mut config = Config::default();
        config.session.tag_field = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn filter_string_passes_through() {
        let mut config = Config::default();
        config.logging.level = "sgw_gateway=debug,info".to_string();
        assert!(config.validate().is_ok());
        assert_eq!(config.log_filter(), "sgw_gateway=debug,info");
    }

    #[test]
    fn plain_level_is_widened() {
        let config = Config::default();
        assert_eq!(config.log_filter(), "sgw_gatewayd=info,sgw_gateway=info,info");
    }
}
