//! A subscriber endpoint and its delivery worker.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use sitelink_core::messages::SubscriberRecord;
use tokio::runtime::Handle;
use tracing::{debug, warn};

use super::connector::{Connection, Connector};
use super::queue::{DeliveryQueue, EnqueueOutcome};
use super::EndpointKey;
use crate::config::DeliveryConfig;

/// One subscribed destination: its pending payloads, retry counter and stop
/// flag. The worker task holds the only connection.
#[derive(Debug)]
pub struct SubscriberEndpoint {
    key: EndpointKey,
    queue: DeliveryQueue,
    retry_count: AtomicU32,
    stopped: AtomicBool,
}

impl SubscriberEndpoint {
    fn new(key: EndpointKey, max_queue_size: usize) -> Self {
        Self {
            key,
            queue: DeliveryQueue::new(max_queue_size),
            retry_count: AtomicU32::new(0),
            stopped: AtomicBool::new(false),
        }
    }

    /// Creates the endpoint and spawns its delivery worker on `runtime`.
    /// The worker runs for the life of the runtime. Callable from any thread.
    #[must_use]
    pub fn spawn(
        key: EndpointKey,
        connector: Arc<dyn Connector>,
        config: &DeliveryConfig,
        runtime: &Handle,
    ) -> Arc<Self> {
        let endpoint = Arc::new(Self::new(key, config.max_queue_size));
        let worker = DeliveryWorker {
            endpoint: Arc::clone(&endpoint),
            connector,
            max_send_retry: config.max_send_retry,
            connection: None,
        };
        runtime.spawn(worker.run());
        endpoint
    }

    #[must_use]
    pub fn key(&self) -> &EndpointKey {
        &self.key
    }

    /// Queues a payload for delivery. Dropped without error while stopped.
    pub fn enqueue(&self, payload: impl Into<String>) -> EnqueueOutcome {
        if self.is_stopped() {
            return EnqueueOutcome::Stopped;
        }
        let outcome = self.queue.push(payload.into());
        if let EnqueueOutcome::Overflowed { discarded } = outcome {
            warn!(
                ip = %self.key.ip,
                port = self.key.port,
                discarded,
                "delivery queue overflowed, backlog dropped"
            );
        }
        outcome
    }

    /// Sets the stop flag and resets the retry counter.
    pub fn set_stop(&self, stop: bool) {
        self.retry_count.store(0, Ordering::SeqCst);
        self.stopped.store(stop, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn retry_count(&self) -> u32 {
        self.retry_count.load(Ordering::SeqCst)
    }

    /// Payloads waiting for the worker.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Current state in the persisted/debug record shape.
    #[must_use]
    pub fn record(&self) -> SubscriberRecord {
        SubscriberRecord {
            ip: self.key.ip.clone(),
            port: self.key.port,
            retry_count: self.retry_count(),
            is_stop: self.is_stopped(),
        }
    }

    fn record_failure(&self, max_send_retry: u32) {
        let count = self.retry_count.fetch_add(1, Ordering::SeqCst) + 1;
        if count >= max_send_retry {
            self.retry_count.store(0, Ordering::SeqCst);
            warn!(
                ip = %self.key.ip,
                port = self.key.port,
                max_send_retry,
                "retry limit reached, counter reset"
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

struct DeliveryWorker {
    endpoint: Arc<SubscriberEndpoint>,
    connector: Arc<dyn Connector>,
    max_send_retry: u32,
    connection: Option<Box<dyn Connection>>,
}

impl DeliveryWorker {
    async fn run(mut self) {
        loop {
            let Some(payload) = self.endpoint.queue.pop().await else {
                continue;
            };
            self.deliver(&payload).await;
        }
    }

    async fn deliver(&mut self, payload: &str) {
        let endpoint = &self.endpoint;

        if !self.connection.as_ref().is_some_and(|c| c.is_open()) {
            match self.connector.open(&endpoint.key) {
                Ok(conn) => self.connection = Some(conn),
                Err(e) => {
                    self.connection = None;
                    warn!(ip = %endpoint.key.ip, port = endpoint.key.port, error = %e, "open failed");
                    endpoint.record_failure(self.max_send_retry);
                    return;
                }
            }
        }
        let Some(conn) = self.connection.as_mut() else {
            return;
        };

        match conn.post(payload).await {
            Ok(()) => debug!(ip = %endpoint.key.ip, port = endpoint.key.port, "delivered"),
            Err(e) => {
                warn!(
                    ip = %endpoint.key.ip,
                    port = endpoint.key.port,
                    error = %e,
                    "delivery failed"
                );
                endpoint.record_failure(self.max_send_retry);
            }
        }
    }
}
