//! Configuration management for the Snip Anchor server

use std::env;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use snip_anchor::anchoring::{
    AnchorOptions, DEFAULT_INITIAL_DELAY, DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_INTERVAL,
};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub anchor: AnchorConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Scheduler settings applied to every anchoring request
#[derive(Debug, Clone, Deserialize)]
pub struct AnchorConfig {
    pub initial_delay_ms: u64,
    pub retry_interval_ms: u64,
    pub max_attempts: u32,
    pub detect_native: bool,
}

/// A variable was set but could not be parsed
#[derive(Debug, Error)]
#[error("Invalid value for {name}: {value:?}")]
pub struct ConfigError {
    pub name: &'static str,
    pub value: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
            },
            anchor: AnchorConfig::default(),
        }
    }
}

impl Default for AnchorConfig {
    fn default() -> Self {
        AnchorConfig {
            initial_delay_ms: DEFAULT_INITIAL_DELAY.as_millis() as u64,
            retry_interval_ms: DEFAULT_RETRY_INTERVAL.as_millis() as u64,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            detect_native: true,
        }
    }
}

impl AnchorConfig {
    pub fn options(&self) -> AnchorOptions {
        AnchorOptions::default()
            .with_initial_delay(Duration::from_millis(self.initial_delay_ms))
            .with_retry_interval(Duration::from_millis(self.retry_interval_ms))
            .with_max_attempts(self.max_attempts)
            .with_native_detection(self.detect_native)
    }
}

impl Config {
    /// Read configuration from the environment; unset variables keep their defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Config::default();

        Ok(Config {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or(defaults.server.host),
                port: parse_var("SERVER_PORT", defaults.server.port)?,
            },
            anchor: AnchorConfig {
                initial_delay_ms: parse_var(
                    "ANCHOR_INITIAL_DELAY_MS",
                    defaults.anchor.initial_delay_ms,
                )?,
                retry_interval_ms: parse_var(
                    "ANCHOR_RETRY_INTERVAL_MS",
                    defaults.anchor.retry_interval_ms,
                )?,
                max_attempts: parse_var("ANCHOR_MAX_ATTEMPTS", defaults.anchor.max_attempts)?,
                detect_native: parse_var("ANCHOR_DETECT_NATIVE", defaults.anchor.detect_native)?,
            },
        })
    }
}

fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => parse_value(name, &value),
        Err(_) => Ok(default),
    }
}

fn parse_value<T: FromStr>(name: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError {
        name,
        value: value.to_string(),
    })
}
