//! Error types for broker operations.

use thiserror::Error;

/// Failures surfaced by the publisher and the worker.
///
/// Every variant wraps the `lapin` error that caused it. Nothing is retried:
/// callers log the error, release the session and stop.
#[derive(Debug, Error)]
pub enum QueueError {
    /// Opening the connection or the channel failed.
    #[error("failure to connect to the broker")]
    Connect(#[source] lapin::Error),

    /// Declaring the queue failed, e.g. it exists with different properties.
    #[error("failure to declare queue `{queue}`")]
    Declare {
        queue: String,
        #[source]
        source: lapin::Error,
    },

    /// Setting the prefetch limit failed.
    #[error("failure to configure qos prefetch {prefetch}")]
    Qos {
        prefetch: u16,
        #[source]
        source: lapin::Error,
    },

    /// Publishing a message failed.
    #[error("failure to publish to queue `{queue}`")]
    Publish {
        queue: String,
        #[source]
        source: lapin::Error,
    },

    /// Starting the consumer or receiving a delivery failed.
    #[error("failure to consume from queue `{queue}`")]
    Consume {
        queue: String,
        #[source]
        source: lapin::Error,
    },

    /// Acknowledging a delivery failed.
    #[error("failure to ack delivery {delivery_tag}")]
    Ack {
        delivery_tag: u64,
        #[source]
        source: lapin::Error,
    },
}
