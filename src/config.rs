use std::{env, num::NonZeroUsize, time::Duration};

use thiserror::Error;

#[cfg(test)]
use once_cell::sync::Lazy;
#[cfg(test)]
pub(crate) static ENV_MUTEX: Lazy<std::sync::Mutex<()>> = Lazy::new(|| std::sync::Mutex::new(()));

/// Runtime configuration for the batch driver, loaded once from the process
/// environment. Field names mirror the external configuration keys in
/// `README`/operational docs, not the environment variable spellings.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    min_hash_k: usize,
    lsh_num_bands: usize,
    lsh_band_width: usize,
    lsh_num_buckets: u64,
    time_window: Duration,
    duplicate_threshold: f64,
    redis_server: String,
    log_debug: bool,
    batch_worker_threads: NonZeroUsize,
}

impl Config {
    /// Load configuration from environment variables, applying defaults for
    /// everything but the adapter endpoint.
    ///
    /// # Errors
    /// Returns `ConfigError::Missing` if a required variable is absent, or
    /// `ConfigError::Invalid` if a value fails to parse or violates an
    /// invariant (e.g. `K != B * R`).
    pub fn from_env() -> Result<Self, ConfigError> {
        let min_hash_k = parse_non_zero_usize("MIN_HASH_K_VALUE", 128)?.get();
        let lsh_num_bands = parse_non_zero_usize("LSH_NUM_BANDS", 32)?.get();
        let lsh_band_width = parse_non_zero_usize("LSH_BAND_WIDTH", 4)?.get();
        let lsh_num_buckets = parse_u64("LSH_NUM_BUCKETS", u64::MAX)?;
        let time_window = parse_duration_secs("TIME_WINDOW", 86_400)?;
        let duplicate_threshold = parse_f64("DUP_QUESTION_MIN_HASH_THRESHOLD", 0.8)?;
        let redis_server = env_var("REDIS_SERVER")?;
        let log_debug = parse_bool("LOG_DEBUG", false)?;
        let batch_worker_threads =
            parse_non_zero_usize("BATCH_WORKER_THREADS", num_cpus::get().max(1))?;

        if lsh_num_bands * lsh_band_width != min_hash_k {
            return Err(ConfigError::Invalid {
                name: "LSH_NUM_BANDS",
                source: anyhow::anyhow!(
                    "LSH_NUM_BANDS * LSH_BAND_WIDTH ({lsh_num_bands} * {lsh_band_width}) must equal MIN_HASH_K_VALUE ({min_hash_k})"
                ),
            });
        }

        if !(0.0..=1.0).contains(&duplicate_threshold) {
            return Err(ConfigError::Invalid {
                name: "DUP_QUESTION_MIN_HASH_THRESHOLD",
                source: anyhow::anyhow!("threshold must be within [0, 1]"),
            });
        }

        Ok(Self {
            min_hash_k,
            lsh_num_bands,
            lsh_band_width,
            lsh_num_buckets,
            time_window,
            duplicate_threshold,
            redis_server,
            log_debug,
            batch_worker_threads,
        })
    }

    #[must_use]
    pub fn min_hash_k(&self) -> usize {
        self.min_hash_k
    }

    #[must_use]
    pub fn lsh_num_bands(&self) -> usize {
        self.lsh_num_bands
    }

    #[must_use]
    pub fn lsh_band_width(&self) -> usize {
        self.lsh_band_width
    }

    #[must_use]
    pub fn lsh_num_buckets(&self) -> u64 {
        self.lsh_num_buckets
    }

    #[must_use]
    pub fn time_window(&self) -> Duration {
        self.time_window
    }

    #[must_use]
    pub fn duplicate_threshold(&self) -> f64 {
        self.duplicate_threshold
    }

    #[must_use]
    pub fn redis_server(&self) -> &str {
        &self.redis_server
    }

    #[must_use]
    pub fn log_debug(&self) -> bool {
        self.log_debug
    }

    #[must_use]
    pub fn batch_worker_threads(&self) -> NonZeroUsize {
        self.batch_worker_threads
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing environment variable: {0}")]
    Missing(&'static str),
    #[error("invalid value for {name}: {source}")]
    Invalid {
        name: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

fn env_var(name: &'static str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::Missing(name))
}

fn parse_non_zero_usize(name: &'static str, default: usize) -> Result<NonZeroUsize, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    let parsed = raw.parse::<usize>().map_err(|error| ConfigError::Invalid {
        name,
        source: anyhow::Error::new(error),
    })?;
    NonZeroUsize::new(parsed).ok_or_else(|| ConfigError::Invalid {
        name,
        source: anyhow::anyhow!("must be greater than zero"),
    })
}

fn parse_duration_secs(name: &'static str, default_secs: u64) -> Result<Duration, ConfigError> {
    let value = parse_u64(name, default_secs)?;
    Ok(Duration::from_secs(value))
}

fn parse_u64(name: &'static str, default: u64) -> Result<u64, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    raw.parse::<u64>().map_err(|error| ConfigError::Invalid {
        name,
        source: anyhow::Error::new(error),
    })
}

fn parse_f64(name: &'static str, default: f64) -> Result<f64, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    raw.parse::<f64>().map_err(|error| ConfigError::Invalid {
        name,
        source: anyhow::Error::new(error),
    })
}

fn parse_bool(name: &'static str, default: bool) -> Result<bool, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    match raw.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            name,
            source: anyhow::anyhow!("invalid boolean value: {raw}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set_env(name: &str, value: &str) {
        // SAFETY: tests run sequentially and assign valid UTF-8 values.
        unsafe {
            env::set_var(name, value);
        }
    }

    fn remove_env(name: &str) {
        // SAFETY: tests run sequentially and clean up deterministic keys.
        unsafe {
            env::remove_var(name);
        }
    }

    fn reset_env() {
        remove_env("MIN_HASH_K_VALUE");
        remove_env("LSH_NUM_BANDS");
        remove_env("LSH_BAND_WIDTH");
        remove_env("LSH_NUM_BUCKETS");
        remove_env("TIME_WINDOW");
        remove_env("DUP_QUESTION_MIN_HASH_THRESHOLD");
        remove_env("REDIS_SERVER");
        remove_env("LOG_DEBUG");
        remove_env("BATCH_WORKER_THREADS");
    }

    #[test]
    fn from_env_uses_defaults_when_optional_missing() {
        let _lock = ENV_MUTEX.lock().expect("env mutex");
        reset_env();
        set_env("REDIS_SERVER", "redis://localhost:6379");

        let config = Config::from_env().expect("config should load");

        assert_eq!(config.min_hash_k(), 128);
        assert_eq!(config.lsh_num_bands(), 32);
        assert_eq!(config.lsh_band_width(), 4);
        assert_eq!(config.lsh_num_buckets(), u64::MAX);
        assert_eq!(config.time_window(), Duration::from_secs(86_400));
        assert!((config.duplicate_threshold() - 0.8).abs() < f64::EPSILON);
        assert_eq!(config.redis_server(), "redis://localhost:6379");
        assert!(!config.log_debug());
    }

    #[test]
    fn from_env_overrides_values() {
        let _lock = ENV_MUTEX.lock().expect("env mutex");
        reset_env();
        set_env("REDIS_SERVER", "redis://cache.internal:6379");
        set_env("MIN_HASH_K_VALUE", "256");
        set_env("LSH_NUM_BANDS", "64");
        set_env("LSH_BAND_WIDTH", "4");
        set_env("LSH_NUM_BUCKETS", "1048576");
        set_env("TIME_WINDOW", "3600");
        set_env("DUP_QUESTION_MIN_HASH_THRESHOLD", "0.9");
        set_env("LOG_DEBUG", "true");
        set_env("BATCH_WORKER_THREADS", "4");

        let config = Config::from_env().expect("config should load");

        assert_eq!(config.min_hash_k(), 256);
        assert_eq!(config.lsh_num_bands(), 64);
        assert_eq!(config.lsh_band_width(), 4);
        assert_eq!(config.lsh_num_buckets(), 1_048_576);
        assert_eq!(config.time_window(), Duration::from_secs(3600));
        assert!((config.duplicate_threshold() - 0.9).abs() < f64::EPSILON);
        assert!(config.log_debug());
        assert_eq!(config.batch_worker_threads().get(), 4);
    }

    #[test]
    fn from_env_errors_when_redis_server_missing() {
        let _lock = ENV_MUTEX.lock().expect("env mutex");
        reset_env();

        let error = Config::from_env().expect_err("missing REDIS_SERVER should fail");

        assert!(matches!(error, ConfigError::Missing("REDIS_SERVER")));
    }

    #[test]
    fn from_env_errors_when_bands_times_width_disagrees_with_k() {
        let _lock = ENV_MUTEX.lock().expect("env mutex");
        reset_env();
        set_env("REDIS_SERVER", "redis://localhost:6379");
        set_env("MIN_HASH_K_VALUE", "100");
        set_env("LSH_NUM_BANDS", "32");
        set_env("LSH_BAND_WIDTH", "4");

        let error = Config::from_env().expect_err("K != B*R should fail");

        assert!(matches!(
            error,
            ConfigError::Invalid {
                name: "LSH_NUM_BANDS",
                ..
            }
        ));
    }

    #[test]
    fn from_env_errors_when_threshold_out_of_range() {
        let _lock = ENV_MUTEX.lock().expect("env mutex");
        reset_env();
        set_env("REDIS_SERVER", "redis://localhost:6379");
        set_env("DUP_QUESTION_MIN_HASH_THRESHOLD", "1.5");

        let error = Config::from_env().expect_err("out-of-range threshold should fail");

        assert!(matches!(
            error,
            ConfigError::Invalid {
                name: "DUP_QUESTION_MIN_HASH_THRESHOLD",
                ..
            }
        ));
    }
}
