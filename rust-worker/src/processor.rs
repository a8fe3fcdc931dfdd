//! Delivery processing - the worker's per-message logic.
//!
//! Each delivery is logged on receipt, held for the configured processing
//! delay, logged again and then acknowledged. There is no content-based
//! rejection: every delivery that reaches this point is acked.

use tokio::time::sleep;
use tracing::info;

use crate::config::Config;
use crate::error::QueueError;
use crate::queue::{Acknowledger, Delivery, DeliveryState};

/// Process a single delivery and acknowledge it.
///
/// Returns the final state of the delivery, which is always
/// [`DeliveryState::Acknowledged`] on success. If the ack fails the delivery
/// stays pending on the broker and is requeued once the channel closes.
pub async fn process_delivery<A>(
    acker: &A,
    delivery: &Delivery,
    config: &Config,
) -> Result<DeliveryState, QueueError>
where
    A: Acknowledger + ?Sized,
{
    let worker_pid = std::process::id();
    let payload = delivery.text();

    info!(
        worker_pid = worker_pid,
        delivery_tag = delivery.delivery_tag,
        state = ?DeliveryState::Pending,
        payload = %payload,
        body_length = delivery.data.len(),
        "worker_message_received"
    );

    sleep(config.processing_delay).await;

    info!(
        worker_pid = worker_pid,
        delivery_tag = delivery.delivery_tag,
        payload = %payload,
        "worker_message_completed"
    );

    acker.ack(delivery.delivery_tag).await?;
    let state = DeliveryState::Acknowledged;

    info!(
        delivery_tag = delivery.delivery_tag,
        state = ?state,
        "rabbitmq_message_acked"
    );

    Ok(state)
}
