//! Configuration module for environment variable parsing.
//!
//! Both binaries read the same configuration so the publisher and the worker
//! always agree on the broker URL and the queue name.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

/// Default broker URL shared by the publisher and the worker.
pub const DEFAULT_AMQP_URL: &str = "amqp://localhost:5672/%2f";

/// Default name of the durable work queue.
pub const DEFAULT_QUEUE_NAME: &str = "test_queue";

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// RabbitMQ connection URL
    pub amqp_url: String,

    /// Name of the durable queue both roles declare
    pub queue_name: String,

    /// Number of messages the publisher sends per run
    pub message_count: u32,

    /// Pause between two consecutive publishes
    pub publish_interval: Duration,

    /// Wait after the last publish before the publisher closes its connection
    pub shutdown_grace: Duration,

    /// Simulated processing time per delivery in the worker
    pub processing_delay: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            amqp_url: DEFAULT_AMQP_URL.to_string(),
            queue_name: DEFAULT_QUEUE_NAME.to_string(),
            message_count: 10,
            publish_interval: Duration::from_millis(1000),
            shutdown_grace: Duration::from_millis(500),
            processing_delay: Duration::from_millis(2000),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = Config::default();

        Config {
            amqp_url: env::var("AMQP_URL").unwrap_or(defaults.amqp_url),

            queue_name: env::var("QUEUE_NAME")
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.queue_name),

            message_count: parse_var("MESSAGE_COUNT", defaults.message_count),

            publish_interval: parse_millis("PUBLISH_INTERVAL_MS", defaults.publish_interval),

            shutdown_grace: parse_millis("SHUTDOWN_GRACE_MS", defaults.shutdown_grace),

            processing_delay: parse_millis("PROCESSING_DELAY_MS", defaults.processing_delay),
        }
    }
}

/// Parse a variable into `T`, keeping the default when unset or malformed.
fn parse_var<T: FromStr>(name: &str, default: T) -> T {
    let raw = match env::var(name) {
        Ok(v) => v,
        Err(_) => return default,
    };

    match raw.trim().parse::<T>() {
        Ok(value) => value,
        Err(_) => {
            warn!(env_var = name, value = %raw, "Invalid value, using default");
            default
        }
    }
}

/// Parse a millisecond count into a `Duration`.
fn parse_millis(name: &str, default: Duration) -> Duration {
    let ms = parse_var(name, default.as_millis() as u64);
    Duration::from_millis(ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_queue_contract() {
        let config = Config::default();
        assert_eq!(config.queue_name, "test_queue");
        assert_eq!(config.message_count, 10);
        assert_eq!(config.publish_interval, Duration::from_secs(1));
        assert_eq!(config.shutdown_grace, Duration::from_millis(500));
        assert_eq!(config.processing_delay, Duration::from_secs(2));
    }

    #[test]
    fn test_from_env_uses_shared_default_url() {
        env::remove_var("AMQP_URL");
        let config = Config::from_env();
        assert_eq!(config.amqp_url, DEFAULT_AMQP_URL);
        assert!(!config.amqp_url.is_empty());
    }

    #[test]
    fn test_parse_var_valid() {
        env::set_var("TEST_DQ_COUNT", " 25 ");
        assert_eq!(parse_var("TEST_DQ_COUNT", 10u32), 25);
        env::remove_var("TEST_DQ_COUNT");
    }

    #[test]
    fn test_parse_var_invalid_uses_default() {
        env::set_var("TEST_DQ_BAD_COUNT", "ten");
        assert_eq!(parse_var("TEST_DQ_BAD_COUNT", 10u32), 10);
        env::remove_var("TEST_DQ_BAD_COUNT");
    }

    #[test]
    fn test_parse_millis_default() {
        let result = parse_millis("NONEXISTENT_DQ_VAR", Duration::from_millis(750));
        assert_eq!(result, Duration::from_millis(750));
    }

    #[test]
    fn test_parse_millis_valid() {
        env::set_var("TEST_DQ_DELAY", "1500");
        let result = parse_millis("TEST_DQ_DELAY", Duration::ZERO);
        assert_eq!(result, Duration::from_millis(1500));
        env::remove_var("TEST_DQ_DELAY");
    }
}
