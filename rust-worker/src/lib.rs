//! dqueue - durable RabbitMQ work queue.
//!
//! This library provides shared modules for the two dqueue binaries:
//! - `dqueue-publisher`: Sends a paced run of persistent messages
//! - `dqueue-worker`: Consumes them one at a time with prefetch 1
//!
//! ## Architecture
//!
//! ```text
//! Publisher → test_queue (durable) → Worker (ack after processing)
//! ```

pub mod config;
pub mod consumer;
pub mod error;
pub mod logging;
pub mod processor;
pub mod queue;

// Re-export commonly used types
pub use config::Config;
pub use consumer::{consume_loop, ConsumeStats};
pub use error::QueueError;
pub use processor::process_delivery;
pub use queue::{
    message_text, publish_messages, run_publisher, Acknowledger, AmqpSession, Delivery,
    DeliveryState, QueueSink,
};
