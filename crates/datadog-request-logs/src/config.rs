// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::PipelineError;

const DEFAULT_SAMPLE_RATE: f64 = 1.0;
const DEFAULT_BATCH_SIZE: usize = 100;
const DEFAULT_BATCH_INTERVAL: Duration = Duration::from_secs(5);
const DEFAULT_MAX_QUEUE_SIZE: usize = 10_000;
const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// Tunables for one client lifetime.
///
/// Read once when the client is built; build a new client to change them.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Fraction of events kept, in `[0, 1]`.
    pub sample_rate: f64,
    /// Maximum events per batch; reaching it triggers an immediate flush.
    pub batch_size: usize,
    /// Period of the background flush for partially filled batches.
    pub batch_interval: Duration,
    /// Queue capacity; the oldest event is dropped beyond it.
    pub max_queue_size: usize,
    /// Bound on a single delivery attempt.
    pub send_timeout: Duration,
    /// Emit debug notices for sampled-out events and delivery attempts.
    pub debug: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            batch_size: DEFAULT_BATCH_SIZE,
            batch_interval: DEFAULT_BATCH_INTERVAL,
            max_queue_size: DEFAULT_MAX_QUEUE_SIZE,
            send_timeout: DEFAULT_SEND_TIMEOUT,
            debug: false,
        }
    }
}

fn parse_env<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|val| val.trim().parse::<T>().ok())
}

impl PipelineConfig {
    /// Create configuration from environment variables
    ///
    /// Unset or unparsable variables keep their default; the result is then
    /// validated.
    pub fn from_env() -> Result<Self, PipelineError> {
        let defaults = Self::default();
        let config = Self {
            sample_rate: parse_env("DD_REQUEST_LOGS_SAMPLE_RATE").unwrap_or(defaults.sample_rate),
            batch_size: parse_env("DD_REQUEST_LOGS_BATCH_SIZE").unwrap_or(defaults.batch_size),
            batch_interval: parse_env("DD_REQUEST_LOGS_BATCH_INTERVAL_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.batch_interval),
            max_queue_size: parse_env("DD_REQUEST_LOGS_MAX_QUEUE_SIZE")
                .unwrap_or(defaults.max_queue_size),
            send_timeout: parse_env("DD_REQUEST_LOGS_SEND_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.send_timeout),
            debug: env::var("DD_REQUEST_LOGS_DEBUG")
                .map(|val| matches!(val.to_lowercase().as_str(), "true" | "1"))
                .unwrap_or(defaults.debug),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), PipelineError> {
        if !(0.0..=1.0).contains(&self.sample_rate) {
            return Err(PipelineError::Configuration(format!(
                "Sample rate must be between 0 and 1, got {}",
                self.sample_rate
            )));
        }
        if self.batch_size == 0 {
            return Err(PipelineError::Configuration(
                "Batch size must be greater than 0".to_string(),
            ));
        }
        if self.batch_interval.is_zero() {
            return Err(PipelineError::Configuration(
                "Batch interval must be greater than 0".to_string(),
            ));
        }
        if self.max_queue_size == 0 {
            return Err(PipelineError::Configuration(
                "Max queue size must be greater than 0".to_string(),
            ));
        }
        if self.send_timeout.is_zero() {
            return Err(PipelineError::Configuration(
                "Send timeout must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const ENV_VARS: [&str; 6] = [
        "DD_REQUEST_LOGS_SAMPLE_RATE",
        "DD_REQUEST_LOGS_BATCH_SIZE",
        "DD_REQUEST_LOGS_BATCH_INTERVAL_MS",
        "DD_REQUEST_LOGS_MAX_QUEUE_SIZE",
        "DD_REQUEST_LOGS_SEND_TIMEOUT_MS",
        "DD_REQUEST_LOGS_DEBUG",
    ];

    fn clear_env() {
        for name in ENV_VARS {
            env::remove_var(name);
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_sample_rate_bounds() {
        for rate in [0.0, 0.5, 1.0] {
            let config = PipelineConfig {
                sample_rate: rate,
                ..Default::default()
            };
            assert!(config.validate().is_ok(), "rate {rate} should be valid");
        }
        for rate in [-0.1, 1.01, f64::NAN] {
            let config = PipelineConfig {
                sample_rate: rate,
                ..Default::default()
            };
            assert!(config.validate().is_err(), "rate {rate} should be invalid");
        }
    }

    #[test]
    fn test_validate_zero_values() {
        let configs = [
            PipelineConfig {
                batch_size: 0,
                ..Default::default()
            },
            PipelineConfig {
                batch_interval: Duration::ZERO,
                ..Default::default()
            },
            PipelineConfig {
                max_queue_size: 0,
                ..Default::default()
            },
            PipelineConfig {
                send_timeout: Duration::ZERO,
                ..Default::default()
            },
        ];
        for config in configs {
            assert!(matches!(
                config.validate(),
                Err(PipelineError::Configuration(_))
            ));
        }
    }

    #[test]
    #[serial]
    fn test_from_env_defaults() {
        clear_env();
        let config = PipelineConfig::from_env().unwrap();
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    #[serial]
    fn test_from_env_reads_all_values() {
        clear_env();
        env::set_var("DD_REQUEST_LOGS_SAMPLE_RATE", "0.25");
        env::set_var("DD_REQUEST_LOGS_BATCH_SIZE", "10");
        env::set_var("DD_REQUEST_LOGS_BATCH_INTERVAL_MS", "250");
        env::set_var("DD_REQUEST_LOGS_MAX_QUEUE_SIZE", "50");
        env::set_var("DD_REQUEST_LOGS_SEND_TIMEOUT_MS", "1500");
        env::set_var("DD_REQUEST_LOGS_DEBUG", "TRUE");

        let config = PipelineConfig::from_env().unwrap();

        assert_eq!(
            config,
            PipelineConfig {
                sample_rate: 0.25,
                batch_size: 10,
                batch_interval: Duration::from_millis(250),
                max_queue_size: 50,
                send_timeout: Duration::from_millis(1500),
                debug: true,
            }
        );
        clear_env();
    }

    #[test]
    #[serial]
    fn test_from_env_unparsable_falls_back_to_default() {
        clear_env();
        env::set_var("DD_REQUEST_LOGS_BATCH_SIZE", "lots");

        let config = PipelineConfig::from_env().unwrap();

        assert_eq!(config.batch_size, DEFAULT_BATCH_SIZE);
        clear_env();
    }

    #[test]
    #[serial]
    fn test_from_env_rejects_invalid_values() {
        clear_env();
        env::set_var("DD_REQUEST_LOGS_SAMPLE_RATE", "2");

        assert!(PipelineConfig::from_env().is_err());
        clear_env();
    }
}
