//! Gateway configuration module.
//!
//! Configuration is layered: built-in defaults, then an optional TOML file,
//! then `CELL_`-prefixed environment variables.
//!
//! ## Example `gateway.toml`
//! ```toml
//! http_port = 8080
//! database_path = "cell-gateway.db"
//! redis_url = "redis://127.0.0.1:6379"
//! cache_ttl_secs = 3600
//! default_currency = "USD"
//!
//! [region_currencies]
//! NG = "NGN"
//! KE = "KES"
//! ```

use std::collections::HashMap;
use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use ::config::builder::{ConfigBuilder, DefaultState};
use ::config::{Config, Environment, File, FileFormat};
use rust_decimal::Decimal;
use serde::Deserialize;

use cell_core::FeeRule;
use cell_db::DbConfig;
use cell_gateway::{FallbackConstants, GatewaySettings};

/// Environment variable naming the TOML file.
pub const CONFIG_PATH_VAR: &str = "CELL_GATEWAY_CONFIG";

/// File read when `CELL_GATEWAY_CONFIG` is not set. Missing is fine.
pub const DEFAULT_CONFIG_FILE: &str = "gateway.toml";

const ENV_PREFIX: &str = "CELL";

/// Longest accepted cache lifetime: 30 days.
const MAX_CACHE_TTL_SECS: u64 = 30 * 24 * 60 * 60;

/// Gateway API configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// HTTP server port
    pub http_port: u16,

    /// Address to bind to
    pub bind_addr: String,

    /// SQLite database file (`:memory:` for a throwaway database)
    pub database_path: String,

    /// Redis connection string. The in-process cache is used when absent.
    #[serde(default)]
    pub redis_url: Option<String>,

    /// Lifetime of cached configuration values in seconds
    pub cache_ttl_secs: u64,

    /// Region multiplier when no configuration applies
    pub fallback_region_multiplier: Decimal,

    /// Item type multiplier when no configuration applies
    pub fallback_item_type_multiplier: Decimal,

    /// Flat fee when no fee tier applies
    pub fallback_flat_fee: Decimal,

    /// Currency for regions without their own entry
    pub default_currency: String,

    /// Region code to currency code
    #[serde(default)]
    pub region_currencies: HashMap<String, String>,
}

impl GatewayConfig {
    /// Load configuration from the TOML file and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        let path = env::var(CONFIG_PATH_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());

        let settings = Self::defaults()?
            .add_source(File::new(&path, FileFormat::Toml).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?;

        Self::from_settings(settings)
    }

    /// Load configuration from TOML text over the defaults. The environment
    /// is not consulted.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let settings = Self::defaults()?
            .add_source(File::from_str(text, FileFormat::Toml))
            .build()?;

        Self::from_settings(settings)
    }

    fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        Ok(Config::builder()
            .set_default("http_port", 8080_i64)?
            .set_default("bind_addr", "0.0.0.0")?
            .set_default("database_path", "cell-gateway.db")?
            .set_default("cache_ttl_secs", 3600_i64)?
            .set_default("fallback_region_multiplier", "1")?
            .set_default("fallback_item_type_multiplier", "1")?
            .set_default("fallback_flat_fee", "0")?
            .set_default("default_currency", "USD")?)
    }

    fn from_settings(settings: Config) -> Result<Self, ConfigError> {
        let config: GatewayConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.http_port == 0 {
            return Err(ConfigError::InvalidValue("http_port".to_string()));
        }
        if self.cache_ttl_secs == 0 || self.cache_ttl_secs > MAX_CACHE_TTL_SECS {
            return Err(ConfigError::InvalidValue("cache_ttl_secs".to_string()));
        }
        if self.database_path.trim().is_empty() {
            return Err(ConfigError::MissingRequired("database_path".to_string()));
        }

        for (name, value) in [
            ("fallback_region_multiplier", self.fallback_region_multiplier),
            ("fallback_item_type_multiplier", self.fallback_item_type_multiplier),
            ("fallback_flat_fee", self.fallback_flat_fee),
        ] {
            if value.is_sign_negative() {
                return Err(ConfigError::InvalidValue(name.to_string()));
            }
        }

        self.socket_addr()?;
        Ok(())
    }

    /// Address the HTTP server listens on.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.bind_addr, self.http_port)
            .parse()
            .map_err(|_| ConfigError::InvalidValue("bind_addr".to_string()))
    }

    pub fn db_config(&self) -> DbConfig {
        if self.database_path == ":memory:" {
            DbConfig::in_memory()
        } else {
            DbConfig::new(&self.database_path)
        }
    }

    /// Settings handed to the gateway context.
    ///
    /// Region and currency codes are upper-cased: configuration keys are
    /// case-insensitive and arrive lower-cased.
    pub fn to_settings(&self) -> GatewaySettings {
        GatewaySettings {
            fallback: FallbackConstants {
                region_multiplier: self.fallback_region_multiplier,
                item_type_multiplier: self.fallback_item_type_multiplier,
                fee_rule: FeeRule::flat(self.fallback_flat_fee),
            },
            cache_ttl: Duration::from_secs(self.cache_ttl_secs),
            default_currency: self.default_currency.trim().to_uppercase(),
            region_currencies: self
                .region_currencies
                .iter()
                .map(|(region, currency)| (region.trim().to_uppercase(), currency.trim().to_uppercase()))
                .collect(),
        }
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read configuration: {0}")]
    Source(#[from] ::config::ConfigError),

    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_defaults() {
        let config = GatewayConfig::from_toml("").unwrap();

        assert_eq!(config.http_port, 8080);
        assert_eq!(config.cache_ttl_secs, 3600);
        assert!(config.redis_url.is_none());
        assert_eq!(config.socket_addr().unwrap().port(), 8080);

        let settings = config.to_settings();
        assert_eq!(settings.fallback.region_multiplier, Decimal::ONE);
        assert_eq!(settings.fallback.fee_rule, FeeRule::flat(Decimal::ZERO));
        assert_eq!(settings.cache_ttl, Duration::from_secs(3600));
        assert_eq!(settings.currency_for("NG"), "USD");
    }

    #[test]
    fn test_toml_overrides() {
        let config = GatewayConfig::from_toml(
            r#"
            http_port = 9000
            database_path = ":memory:"
            cache_ttl_secs = 60
            fallback_region_multiplier = 1.1
            default_currency = "usd"

            [region_currencies]
            NG = "ngn"
            "#,
        )
        .unwrap();

        assert_eq!(config.http_port, 9000);
        assert!(config.db_config().is_in_memory());

        let settings = config.to_settings();
        assert_eq!(settings.fallback.region_multiplier, dec!(1.1));
        assert_eq!(settings.cache_ttl, Duration::from_secs(60));
        assert_eq!(settings.currency_for("NG"), "NGN");
        assert_eq!(settings.currency_for("GH"), "USD");
    }

    #[test]
    fn test_rejects_invalid_values() {
        let port = GatewayConfig::from_toml("http_port = 0").unwrap_err();
        assert!(matches!(port, ConfigError::InvalidValue(ref f) if f == "http_port"));

        let ttl = GatewayConfig::from_toml("cache_ttl_secs = 0").unwrap_err();
        assert!(matches!(ttl, ConfigError::InvalidValue(ref f) if f == "cache_ttl_secs"));

        let ttl = GatewayConfig::from_toml("cache_ttl_secs = 2592001").unwrap_err();
        assert!(matches!(ttl, ConfigError::InvalidValue(ref f) if f == "cache_ttl_secs"));
        assert!(GatewayConfig::from_toml("cache_ttl_secs = 2592000").is_ok());

        let negative = GatewayConfig::from_toml("fallback_flat_fee = -1.0").unwrap_err();
        assert!(matches!(negative, ConfigError::InvalidValue(ref f) if f == "fallback_flat_fee"));

        let addr = GatewayConfig::from_toml(r#"bind_addr = "not an address""#).unwrap_err();
        assert!(matches!(addr, ConfigError::InvalidValue(ref f) if f == "bind_addr"));
    }
}
