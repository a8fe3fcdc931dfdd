//! Owned RabbitMQ connection and channel.
//!
//! An `AmqpSession` is opened once per process and closed explicitly by the
//! binaries on every exit path, success or failure.

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use lapin::{
    options::{
        BasicAckOptions, BasicConsumeOptions, BasicPublishOptions, BasicQosOptions,
        QueueDeclareOptions,
    },
    types::FieldTable,
    BasicProperties, Channel, Connection, ConnectionProperties,
};
use tracing::{info, warn};

use super::types::{Delivery, PERSISTENT_DELIVERY_MODE};
use super::{Acknowledger, QueueSink};
use crate::error::QueueError;

/// A connection to the broker together with its single channel.
pub struct AmqpSession {
    connection: Connection,
    channel: Channel,
}

impl AmqpSession {
    /// Connect to `url` and open a channel.
    pub async fn connect(url: &str) -> Result<Self, QueueError> {
        info!(url_length = url.len(), "rabbitmq_connecting");

        let connection = Connection::connect(url, ConnectionProperties::default())
            .await
            .map_err(QueueError::Connect)?;

        info!("rabbitmq_connected");

        let channel = match connection.create_channel().await {
            Ok(channel) => channel,
            Err(e) => {
                if let Err(close_err) = connection.close(200, "Channel open failed").await {
                    warn!(error = %close_err, "rabbitmq_connection_close_error");
                }
                return Err(QueueError::Connect(e));
            }
        };

        info!("rabbitmq_channel_created");

        Ok(Self {
            connection,
            channel,
        })
    }

    /// Limit unacknowledged deliveries to `prefetch` for this channel.
    pub async fn set_prefetch(&self, prefetch: u16) -> Result<(), QueueError> {
        self.channel
            .basic_qos(prefetch, BasicQosOptions::default())
            .await
            .map_err(|source| QueueError::Qos { prefetch, source })?;

        info!(prefetch_count = prefetch, "rabbitmq_qos_set");
        Ok(())
    }

    /// Start a manual-ack consumer on `queue`.
    ///
    /// The returned stream yields one item per delivery and ends when the
    /// broker cancels the consumer or the channel closes.
    pub async fn consume(
        &self,
        queue: &str,
        consumer_tag: &str,
    ) -> Result<impl Stream<Item = Result<Delivery, QueueError>> + Unpin, QueueError> {
        let consumer = self
            .channel
            .basic_consume(
                queue,
                consumer_tag,
                BasicConsumeOptions {
                    no_ack: false,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|source| QueueError::Consume {
                queue: queue.to_string(),
                source,
            })?;

        info!(queue = queue, consumer_tag = consumer_tag, "rabbitmq_consumer_started");

        let queue = queue.to_string();
        Ok(consumer.map(move |delivery| {
            delivery.map(Delivery::from).map_err(|source| QueueError::Consume {
                queue: queue.clone(),
                source,
            })
        }))
    }
}

/// Queue declaration used by both roles: durable, not exclusive, kept
/// when the last consumer goes away.
fn declare_options() -> QueueDeclareOptions {
    QueueDeclareOptions {
        durable: true,
        ..Default::default()
    }
}

/// Properties attached to every published message: persistent only.
fn publish_properties() -> BasicProperties {
    BasicProperties::default().with_delivery_mode(PERSISTENT_DELIVERY_MODE)
}

#[async_trait]
impl QueueSink for AmqpSession {
    async fn declare_queue(&self, queue: &str) -> Result<(), QueueError> {
        self.channel
            .queue_declare(queue, declare_options(), FieldTable::default())
            .await
            .map_err(|source| QueueError::Declare {
                queue: queue.to_string(),
                source,
            })?;

        info!(queue = queue, durable = true, "rabbitmq_queue_declared");
        Ok(())
    }

    async fn publish(&self, queue: &str, payload: &[u8]) -> Result<(), QueueError> {
        let publish_err = |source| QueueError::Publish {
            queue: queue.to_string(),
            source,
        };

        // Confirms are not enabled on this channel, so the second await
        // resolves immediately with `NotRequested`.
        self.channel
            .basic_publish(
                "",
                queue,
                BasicPublishOptions::default(),
                payload,
                publish_properties(),
            )
            .await
            .map_err(publish_err)?
            .await
            .map_err(publish_err)?;

        Ok(())
    }

    /// Close the channel and the connection.
    ///
    /// Errors are logged, not returned: there is nothing left to do with a
    /// session that fails to close.
    async fn close(&self) {
        if let Err(e) = self.channel.close(200, "Normal shutdown").await {
            warn!(error = %e, "rabbitmq_channel_close_error");
        }

        if let Err(e) = self.connection.close(200, "Normal shutdown").await {
            warn!(error = %e, "rabbitmq_connection_close_error");
        }

        info!("rabbitmq_session_closed");
    }
}

#[async_trait]
impl Acknowledger for AmqpSession {
    async fn ack(&self, delivery_tag: u64) -> Result<(), QueueError> {
        self.channel
            .basic_ack(delivery_tag, BasicAckOptions::default())
            .await
            .map_err(|source| QueueError::Ack {
                delivery_tag,
                source,
            })
    }
}
