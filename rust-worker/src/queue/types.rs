//! Message and delivery types for the work queue.

use std::borrow::Cow;

/// AMQP delivery mode flag marking a message as persistent.
pub const PERSISTENT_DELIVERY_MODE: u8 = 2;

/// The worker never holds more than one unacknowledged delivery.
pub const PREFETCH_COUNT: u16 = 1;

/// Text payload of the `seq`-th message a publisher run sends (1-based).
pub fn message_text(seq: u32) -> String {
    format!("Test mesajı {seq}")
}

/// A message received from the queue, not yet acknowledged.
///
/// Only the broker's delivery tag and the raw payload are kept; the payload
/// has no envelope or schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Broker-assigned tag used to acknowledge this delivery
    pub delivery_tag: u64,
    /// Raw message body
    pub data: Vec<u8>,
}

impl Delivery {
    pub fn new(delivery_tag: u64, data: impl Into<Vec<u8>>) -> Self {
        Self {
            delivery_tag,
            data: data.into(),
        }
    }

    /// Payload decoded for logging. Invalid UTF-8 is replaced, not rejected.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.data)
    }
}

impl From<lapin::message::Delivery> for Delivery {
    fn from(delivery: lapin::message::Delivery) -> Self {
        Self {
            delivery_tag: delivery.delivery_tag,
            data: delivery.data,
        }
    }
}

/// Lifecycle of a single delivery inside the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryState {
    /// Received, not yet acknowledged
    Pending,
    /// Acknowledged; the broker has removed it from the queue
    Acknowledged,
}
