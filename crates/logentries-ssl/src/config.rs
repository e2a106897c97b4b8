// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::constants::{
    DEFAULT_BACKOFF_BASE, DEFAULT_CHUNK_LIMIT_RECORDS, DEFAULT_CONNECT_TIMEOUT,
    DEFAULT_FLUSH_INTERVAL, DEFAULT_HOST, DEFAULT_MAX_RETRIES, DEFAULT_PORT,
    DEFAULT_WRITE_TIMEOUT, FRAME_OVERHEAD, MAX_SIZE,
};
use crate::error::ConfigError;
use crate::record::OutputMode;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Configuration for the Logentries output
#[derive(Debug, Clone)]
pub struct Config {
    /// Intake host
    pub le_host: String,
    /// Intake TLS port
    pub le_port: u16,
    /// Retries allowed per payload after the first attempt
    pub max_retries: u32,
    /// YAML file mapping tag names to tokens
    pub token_path: Option<PathBuf>,
    /// Token used when no tag entry matches
    pub default_token: Option<String>,
    pub output_mode: OutputMode,
    /// Verify the intake certificate against `le_host`
    pub verify_fqdn: bool,
    /// Largest payload written in one call, in bytes
    pub max_payload_size: usize,
    /// Backoff unit; retry n waits `backoff_base * 2^(n+1)`
    pub backoff_base: Duration,
    pub connect_timeout: Duration,
    pub write_timeout: Duration,
    /// Log level (e.g., trace, debug, info, warn, error)
    pub log_level: String,
    /// How often the forwarder flushes buffered records
    pub flush_interval: Duration,
    /// Flush as soon as this many records are buffered
    pub chunk_limit_records: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            le_host: DEFAULT_HOST.to_string(),
            le_port: DEFAULT_PORT,
            max_retries: DEFAULT_MAX_RETRIES,
            token_path: None,
            default_token: None,
            output_mode: OutputMode::Json,
            verify_fqdn: true,
            max_payload_size: MAX_SIZE,
            backoff_base: DEFAULT_BACKOFF_BASE,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            log_level: "info".to_string(),
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            chunk_limit_records: DEFAULT_CHUNK_LIMIT_RECORDS,
        }
    }
}

impl Config {
    /// Create configuration from `LE_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Create configuration from an arbitrary key lookup, falling back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).filter(|val| !val.trim().is_empty());

        let config = Self {
            le_host: get("LE_HOST").unwrap_or(defaults.le_host),
            le_port: parse_or(get("LE_PORT"), "LE_PORT", defaults.le_port)?,
            max_retries: parse_or(get("LE_MAX_RETRIES"), "LE_MAX_RETRIES", defaults.max_retries)?,
            token_path: get("LE_TOKEN_PATH").map(PathBuf::from),
            default_token: get("LE_DEFAULT_TOKEN"),
            output_mode: get("LE_JSON")
                .map(|val| parse_bool(&val, "LE_JSON"))
                .transpose()?
                .map_or(defaults.output_mode, OutputMode::from_json_flag),
            verify_fqdn: get("LE_VERIFY_FQDN")
                .map(|val| parse_bool(&val, "LE_VERIFY_FQDN"))
                .transpose()?
                .unwrap_or(defaults.verify_fqdn),
            max_payload_size: parse_or(
                get("LE_MAX_PAYLOAD_SIZE"),
                "LE_MAX_PAYLOAD_SIZE",
                defaults.max_payload_size,
            )?,
            backoff_base: get("LE_BACKOFF_BASE_MS")
                .map(|val| parse_value::<u64>(&val, "LE_BACKOFF_BASE_MS"))
                .transpose()?
                .map_or(defaults.backoff_base, Duration::from_millis),
            connect_timeout: get("LE_CONNECT_TIMEOUT_SECS")
                .map(|val| parse_value::<u64>(&val, "LE_CONNECT_TIMEOUT_SECS"))
                .transpose()?
                .map_or(defaults.connect_timeout, Duration::from_secs),
            write_timeout: get("LE_WRITE_TIMEOUT_SECS")
                .map(|val| parse_value::<u64>(&val, "LE_WRITE_TIMEOUT_SECS"))
                .transpose()?
                .map_or(defaults.write_timeout, Duration::from_secs),
            log_level: get("LE_LOG_LEVEL")
                .map(|val| val.to_lowercase())
                .unwrap_or(defaults.log_level),
            flush_interval: get("LE_FLUSH_INTERVAL_SECS")
                .map(|val| parse_value::<u64>(&val, "LE_FLUSH_INTERVAL_SECS"))
                .transpose()?
                .map_or(defaults.flush_interval, Duration::from_secs),
            chunk_limit_records: parse_or(
                get("LE_CHUNK_LIMIT_RECORDS"),
                "LE_CHUNK_LIMIT_RECORDS",
                defaults.chunk_limit_records,
            )?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.token_path.is_none() && self.default_token.is_none() {
            return Err(ConfigError::MissingTokenSource);
        }

        if self.le_host.trim().is_empty() {
            return Err(ConfigError::Invalid("LE_HOST cannot be empty".to_string()));
        }

        if self.le_port == 0 {
            return Err(ConfigError::Invalid(
                "LE_PORT must be greater than 0".to_string(),
            ));
        }

        if self.max_payload_size <= FRAME_OVERHEAD {
            return Err(ConfigError::Invalid(format!(
                "LE_MAX_PAYLOAD_SIZE must be greater than {FRAME_OVERHEAD}"
            )));
        }

        if self.chunk_limit_records == 0 {
            return Err(ConfigError::Invalid(
                "LE_CHUNK_LIMIT_RECORDS must be greater than 0".to_string(),
            ));
        }

        // sockets reject zero timeouts and tokio rejects a zero interval
        for (key, duration) in [
            ("LE_FLUSH_INTERVAL_SECS", self.flush_interval),
            ("LE_CONNECT_TIMEOUT_SECS", self.connect_timeout),
            ("LE_WRITE_TIMEOUT_SECS", self.write_timeout),
        ] {
            if duration.is_zero() {
                return Err(ConfigError::Invalid(format!(
                    "{key} must be greater than 0"
                )));
            }
        }

        if !VALID_LOG_LEVELS.contains(&self.log_level.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "Invalid log level '{}'. Must be one of: trace, debug, info, warn, error",
                self.log_level
            )));
        }

        Ok(())
    }
}

fn parse_value<T: FromStr>(val: &str, key: &str) -> Result<T, ConfigError> {
    val.trim()
        .parse::<T>()
        .map_err(|_| ConfigError::Invalid(format!("{key} has an invalid value '{val}'")))
}

fn parse_or<T: FromStr>(val: Option<String>, key: &str, default: T) -> Result<T, ConfigError> {
    val.map_or(Ok(default), |val| parse_value(&val, key))
}

fn parse_bool(val: &str, key: &str) -> Result<bool, ConfigError> {
    match val.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::Invalid(format!(
            "{key} must be true or false, got '{val}'"
        ))),
    }
}
