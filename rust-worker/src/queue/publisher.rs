//! Paced publish loop.
//!
//! Declares the queue, then sends `message_count` persistent text messages
//! with `publish_interval` between consecutive sends. [`run`] wraps the loop
//! with the trailing grace period and always closes the sink.

use tokio::time::sleep;
use tracing::info;

use super::types::message_text;
use super::QueueSink;
use crate::config::Config;
use crate::error::QueueError;

/// Publish the configured sequence of messages through `sink`.
///
/// Returns the payloads in the order they were sent. The first failing
/// declare or publish aborts the run; nothing is retried.
pub async fn publish_messages<S>(sink: &S, config: &Config) -> Result<Vec<String>, QueueError>
where
    S: QueueSink + ?Sized,
{
    let queue = config.queue_name.as_str();

    sink.declare_queue(queue).await?;

    let mut sent = Vec::new();

    for seq in 1..=config.message_count {
        if seq > 1 {
            sleep(config.publish_interval).await;
        }

        let text = message_text(seq);
        sink.publish(queue, text.as_bytes()).await?;

        info!(
            queue = queue,
            seq = seq,
            payload = %text,
            "message_published"
        );

        sent.push(text);
    }

    info!(queue = queue, count = sent.len(), "publish_run_complete");

    Ok(sent)
}

/// Full publisher run: publish, wait `shutdown_grace` on success, then close.
///
/// `close` is called exactly once whether publishing succeeded or not. The
/// error, if any, is returned for the caller to log.
pub async fn run<S>(sink: &S, config: &Config) -> Result<Vec<String>, QueueError>
where
    S: QueueSink + ?Sized,
{
    let result = publish_messages(sink, config).await;

    if let Ok(sent) = &result {
        info!(
            count = sent.len(),
            grace_ms = config.shutdown_grace.as_millis() as u64,
            "publisher_draining"
        );
        sleep(config.shutdown_grace).await;
    }

    sink.close().await;

    result
}
