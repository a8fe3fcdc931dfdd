//! RabbitMQ consumer module using lapin.
//!
//! This module handles connecting to RabbitMQ, consuming deliveries from the
//! work queue one at a time and handing each to the processor. The broker is
//! told to send at most one unacknowledged delivery, and the loop never pulls
//! the next delivery before the current one is acknowledged.

use std::future::Future;

use futures::{Stream, StreamExt};
use tokio::signal;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::QueueError;
use crate::processor::process_delivery;
use crate::queue::{Acknowledger, AmqpSession, Delivery, QueueSink, PREFETCH_COUNT};

/// Counters for one consumer run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ConsumeStats {
    /// Deliveries pulled from the broker
    pub received: u64,
    /// Deliveries acknowledged back to the broker
    pub acknowledged: u64,
}

/// Run the worker against the configured broker.
///
/// This function:
/// 1. Connects to RabbitMQ and opens a channel
/// 2. Declares the durable queue (idempotent operation)
/// 3. Sets QoS prefetch to one
/// 4. Consumes deliveries until SIGINT/SIGTERM or the consumer is cancelled
///
/// The session is closed on every path once it has been opened. Errors are
/// returned unlogged; the binary logs them once.
pub async fn run(config: Config) -> Result<ConsumeStats, QueueError> {
    let session = AmqpSession::connect(&config.amqp_url).await?;

    let result = serve(&session, &config).await;

    session.close().await;

    result
}

async fn serve(session: &AmqpSession, config: &Config) -> Result<ConsumeStats, QueueError> {
    session.declare_queue(&config.queue_name).await?;
    session.set_prefetch(PREFETCH_COUNT).await?;

    let consumer_tag = format!("dqueue-worker-{}", std::process::id());
    let deliveries = session.consume(&config.queue_name, &consumer_tag).await?;

    info!(
        queue = %config.queue_name,
        hint = "press CTRL+C to exit",
        "worker_waiting_for_messages"
    );

    consume_loop(deliveries, session, config, shutdown_signal()).await
}

/// Drive `deliveries` until `shutdown` resolves or the stream ends.
///
/// Each delivery is processed and acknowledged before the next one is
/// pulled, so at most one delivery is pending at any time. A delivery or ack
/// error stops the loop and is returned.
pub async fn consume_loop<S, A, F>(
    mut deliveries: S,
    acker: &A,
    config: &Config,
    shutdown: F,
) -> Result<ConsumeStats, QueueError>
where
    S: Stream<Item = Result<Delivery, QueueError>> + Unpin,
    A: Acknowledger + ?Sized,
    F: Future<Output = ()>,
{
    let mut stats = ConsumeStats::default();

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            biased;

            _ = &mut shutdown => {
                info!("worker_stopping");
                break;
            }
            delivery = deliveries.next() => {
                match delivery {
                    Some(Ok(delivery)) => {
                        stats.received += 1;
                        process_delivery(acker, &delivery, config).await?;
                        stats.acknowledged += 1;
                    }
                    Some(Err(e)) => return Err(e),
                    None => {
                        warn!("rabbitmq_consumer_closed");
                        break;
                    }
                }
            }
        }
    }

    info!(
        received = stats.received,
        acknowledged = stats.acknowledged,
        "worker_shutdown_complete"
    );

    Ok(stats)
}

/// Create a future that completes when a shutdown signal is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "ctrl_c_handler_failed");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "sigterm_handler_failed");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use futures::stream;
    use tokio::time::Instant;

    use super::*;
    use crate::queue::{message_text, MockAcknowledger};

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Event {
        Pulled(u64),
        Acked(u64),
    }

    /// Records pulls and acks on a shared timeline.
    #[derive(Clone, Default)]
    struct Timeline {
        events: Arc<Mutex<Vec<(Event, Instant)>>>,
    }

    impl Timeline {
        fn push(&self, event: Event) {
            self.events.lock().unwrap().push((event, Instant::now()));
        }

        fn events(&self) -> Vec<(Event, Instant)> {
            self.events.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Acknowledger for Timeline {
        async fn ack(&self, delivery_tag: u64) -> Result<(), QueueError> {
            self.push(Event::Acked(delivery_tag));
            Ok(())
        }
    }

    fn deliveries(
        count: u64,
        timeline: &Timeline,
    ) -> impl Stream<Item = Result<Delivery, QueueError>> + Unpin {
        let timeline = timeline.clone();
        stream::iter(1..=count).map(move |tag| {
            timeline.push(Event::Pulled(tag));
            Ok(Delivery::new(tag, message_text(tag as u32).into_bytes()))
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_processes_all_deliveries_in_order() {
        let timeline = Timeline::default();

        let stats = consume_loop(
            deliveries(10, &timeline),
            &timeline,
            &Config::default(),
            std::future::pending(),
        )
        .await
        .unwrap();

        assert_eq!(
            stats,
            ConsumeStats {
                received: 10,
                acknowledged: 10
            }
        );

        let order: Vec<Event> = timeline.events().into_iter().map(|(e, _)| e).collect();
        let expected: Vec<Event> = (1..=10)
            .flat_map(|tag| [Event::Pulled(tag), Event::Acked(tag)])
            .collect();
        assert_eq!(order, expected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_at_most_one_delivery_pending() {
        let timeline = Timeline::default();

        consume_loop(
            deliveries(5, &timeline),
            &timeline,
            &Config::default(),
            std::future::pending(),
        )
        .await
        .unwrap();

        let mut pending = 0i32;
        for (event, _) in timeline.events() {
            match event {
                Event::Pulled(_) => pending += 1,
                Event::Acked(_) => pending -= 1,
            }
            assert!((0..=1).contains(&pending));
        }
        assert_eq!(pending, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ack_waits_for_processing_delay() {
        let timeline = Timeline::default();
        let config = Config {
            processing_delay: Duration::from_millis(2000),
            ..Config::default()
        };

        consume_loop(deliveries(3, &timeline), &timeline, &config, std::future::pending())
            .await
            .unwrap();

        let events = timeline.events();
        for pair in events.chunks(2) {
            let (pulled_at, acked_at) = (pair[0].1, pair[1].1);
            assert!(acked_at.duration_since(pulled_at) >= Duration::from_secs(2));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_an_idle_worker() {
        let acker = MockAcknowledger::new();

        let stats = consume_loop(
            stream::pending::<Result<Delivery, QueueError>>(),
            &acker,
            &Config::default(),
            async {},
        )
        .await
        .unwrap();

        assert_eq!(stats, ConsumeStats::default());
    }

    #[tokio::test(start_paused = true)]
    async fn test_delivery_error_stops_the_loop() {
        let mut acker = MockAcknowledger::new();
        acker.expect_ack().times(1).returning(|_| Ok(()));

        let items = vec![
            Ok(Delivery::new(1, b"first".to_vec())),
            Err(QueueError::Consume {
                queue: "test_queue".to_string(),
                source: lapin::Error::InvalidChannel(1),
            }),
            Ok(Delivery::new(2, b"never".to_vec())),
        ];

        let err = consume_loop(
            stream::iter(items),
            &acker,
            &Config::default(),
            std::future::pending(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, QueueError::Consume { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ack_error_stops_the_loop() {
        let mut acker = MockAcknowledger::new();
        acker.expect_ack().times(1).returning(|tag| {
            Err(QueueError::Ack {
                delivery_tag: tag,
                source: lapin::Error::InvalidChannel(1),
            })
        });

        let items = vec![
            Ok(Delivery::new(1, b"first".to_vec())),
            Ok(Delivery::new(2, b"second".to_vec())),
        ];

        let err = consume_loop(
            stream::iter(items),
            &acker,
            &Config::default(),
            std::future::pending(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, QueueError::Ack { delivery_tag: 1, .. }));
    }
}
