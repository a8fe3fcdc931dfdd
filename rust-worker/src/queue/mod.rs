//! Queue module for RabbitMQ operations.
//!
//! This module provides:
//! - Message and delivery types
//! - `AmqpSession`, the owned connection + channel pair
//! - The paced publish run used by `dqueue-publisher`
//!
//! ## Architecture
//!
//! ```text
//! dqueue-publisher → test_queue (durable) → dqueue-worker (prefetch 1)
//! ```
//!
//! The publish loop and the worker only see the broker through the
//! [`QueueSink`] and [`Acknowledger`] traits, which `AmqpSession` implements.

pub mod publisher;
pub mod session;
pub mod types;

use async_trait::async_trait;

use crate::error::QueueError;

pub use publisher::{publish_messages, run as run_publisher};
pub use session::AmqpSession;
pub use types::{message_text, Delivery, DeliveryState, PERSISTENT_DELIVERY_MODE, PREFETCH_COUNT};

/// Write side of the broker: declare a queue and publish into it.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QueueSink: Send + Sync {
    /// Declare `queue` as durable. Idempotent on the broker side.
    async fn declare_queue(&self, queue: &str) -> Result<(), QueueError>;

    /// Publish `payload` as a persistent message routed to `queue`.
    async fn publish(&self, queue: &str, payload: &[u8]) -> Result<(), QueueError>;

    /// Release the underlying connection. Never fails; problems are logged.
    async fn close(&self);
}

/// Acknowledges deliveries back to the broker.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Acknowledger: Send + Sync {
    /// Acknowledge a single delivery by tag.
    async fn ack(&self, delivery_tag: u64) -> Result<(), QueueError>;
}
