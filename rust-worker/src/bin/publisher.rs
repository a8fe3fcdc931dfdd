//! dqueue Publisher - sends a paced run of persistent messages.
//!
//! This binary:
//! 1. Connects to RabbitMQ and declares the durable work queue
//! 2. Publishes the configured number of text messages, one per interval
//! 3. Waits a short grace period, closes the connection and exits

use anyhow::{Context, Result};
use tracing::{error, info};

use dqueue::{logging, run_publisher, AmqpSession, Config, QueueError};

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();

    info!("publisher_starting");

    // Load configuration
    let config = Config::from_env();
    info!(
        amqp_url_set = !config.amqp_url.is_empty(),
        queue = %config.queue_name,
        message_count = config.message_count,
        publish_interval_ms = config.publish_interval.as_millis() as u64,
        "config_loaded"
    );

    let sent = match publish(&config).await {
        Ok(sent) => sent,
        Err(e) => {
            error!(error = %e, "publisher_failed");
            return Err(e).context("Publish run failed");
        }
    };

    info!(count = sent.len(), "publisher_shutdown_complete");

    Ok(())
}

/// Connect, then hand the session to the publish run, which closes it.
async fn publish(config: &Config) -> Result<Vec<String>, QueueError> {
    let session = AmqpSession::connect(&config.amqp_url).await?;
    run_publisher(&session, config).await
}
