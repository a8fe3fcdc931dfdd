//! dqueue Worker - RabbitMQ consumer with a prefetch limit of one.
//!
//! This worker consumes messages from the durable work queue, simulates
//! processing for a fixed delay and acknowledges each message before the
//! broker hands it the next one.

use anyhow::{Context, Result};
use tracing::{error, info};

use dqueue::{consumer, logging, Config};

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();

    info!(worker_pid = std::process::id(), "worker_starting");

    // Load configuration from environment
    let config = Config::from_env();
    info!(
        amqp_url_set = !config.amqp_url.is_empty(),
        queue = %config.queue_name,
        processing_delay_ms = config.processing_delay.as_millis() as u64,
        "config_loaded"
    );

    let stats = match consumer::run(config).await {
        Ok(stats) => stats,
        Err(e) => {
            error!(error = %e, "worker_failed");
            return Err(e).context("Worker failed");
        }
    };

    info!(
        received = stats.received,
        acknowledged = stats.acknowledged,
        "worker_exited"
    );

    Ok(())
}
