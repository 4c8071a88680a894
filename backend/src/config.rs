//! Configuration management for the Trade Fulfillment Engine
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (development.toml, production.toml)
//! 3. Environment variable overrides with TFE_ prefix

use config::{ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::Tolerances;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Server configuration
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Reconciliation tolerances used by the transition gates
    pub reconciliation: ReconciliationConfig,

    /// Order event notification configuration
    pub notifications: NotificationConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server port
    pub port: u16,

    /// Server host
    pub host: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReconciliationConfig {
    /// Allowed paid-vs-required gap when receiving a purchase order
    pub purchase_payment_tolerance: Decimal,

    /// Allowed collected-vs-total gap when delivering or completing a sales order
    pub sales_payment_tolerance: Decimal,

    /// Allowed shipped-vs-ordered quantity gap
    pub quantity_tolerance: Decimal,
}

impl ReconciliationConfig {
    pub fn tolerances(&self) -> Tolerances {
        Tolerances {
            purchase_payment: self.purchase_payment_tolerance,
            sales_payment: self.sales_payment_tolerance,
            quantity: self.quantity_tolerance,
        }
    }
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        let defaults = Tolerances::default();
        Self {
            purchase_payment_tolerance: defaults.purchase_payment,
            sales_payment_tolerance: defaults.sales_payment,
            quantity_tolerance: defaults.quantity,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct NotificationConfig {
    /// Webhook receiving order events; events are only logged when unset
    pub webhook_url: Option<String>,

    /// Webhook request timeout in seconds
    pub timeout_secs: u64,
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment = std::env::var("TFE_ENVIRONMENT").unwrap_or_else(|_| "development".into());
        let defaults = ReconciliationConfig::default();

        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("server.port", 3000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default(
                "reconciliation.purchase_payment_tolerance",
                defaults.purchase_payment_tolerance.to_string(),
            )?
            .set_default(
                "reconciliation.sales_payment_tolerance",
                defaults.sales_payment_tolerance.to_string(),
            )?
            .set_default(
                "reconciliation.quantity_tolerance",
                defaults.quantity_tolerance.to_string(),
            )?
            .set_default("notifications.timeout_secs", 10)?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (TFE_ prefix)
            .add_source(
                Environment::with_prefix("TFE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_tolerances_match_engine_defaults() {
        let config = ReconciliationConfig::default();
        assert_eq!(config.tolerances(), Tolerances::default());
    }
}
