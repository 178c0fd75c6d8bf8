// Application configuration
// Read once at startup from the environment (after `.env` is loaded)

use std::collections::HashSet;
use std::str::FromStr;
use thiserror::Error;

use crate::engine::EngineSettings;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set in environment")]
    Missing(&'static str),

    #[error("{key} has an invalid value: {value}")]
    Invalid { key: &'static str, value: String },
}

/// Runtime configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub database_pool_size: u32,
    pub host: String,
    pub port: u16,
    pub self_operated_channels: HashSet<String>,
    pub pricing_window_days: u64,
    pub currency: String,
    /// Absent means bookings are recorded as pay on site
    pub payment_gateway_url: Option<String>,
    pub payment_gateway_key: Option<String>,
}

impl AppConfig {
    /// Load configuration from process environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let database_url = get("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;

        Ok(Self {
            database_url,
            database_pool_size: parse_or(get("DATABASE_POOL_SIZE"), "DATABASE_POOL_SIZE", 5)?,
            host: get("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or(get("PORT"), "PORT", 8080)?,
            self_operated_channels: get("SELF_OPERATED_CHANNELS")
                .map(|list| {
                    list.split(',')
                        .map(str::trim)
                        .filter(|channel| !channel.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            pricing_window_days: parse_or(get("PRICING_WINDOW_DAYS"), "PRICING_WINDOW_DAYS", 180)?,
            currency: get("CURRENCY")
                .map(|currency| currency.to_uppercase())
                .unwrap_or_else(|| "USD".to_string()),
            payment_gateway_url: get("PAYMENT_GATEWAY_URL"),
            payment_gateway_key: get("PAYMENT_GATEWAY_KEY"),
        })
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            self_operated_channels: self.self_operated_channels.clone(),
            pricing_window_days: self.pricing_window_days,
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<T: FromStr>(value: Option<String>, key: &'static str, default: T) -> Result<T, ConfigError> {
    match value {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid { key, value: raw }),
    }
}
