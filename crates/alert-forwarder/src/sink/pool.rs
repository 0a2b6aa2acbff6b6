//! Bounded delivery queue drained by a fixed set of workers.

use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use super::{Sink, SinkEvent};
use crate::config::CollectorSettings;
use crate::error::SinkError;

/// Default number of queued deliveries before senders wait.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Default number of concurrent deliveries.
pub const DEFAULT_WORKERS: usize = 4;

/// A queued event and the collector it was addressed to when enqueued.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub collector: CollectorSettings,
    pub event: SinkEvent,
}

/// Sending half of the delivery queue.
#[derive(Debug, Clone)]
pub struct DeliveryQueue {
    tx: mpsc::Sender<Delivery>,
}

impl DeliveryQueue {
    /// Queue a delivery, waiting for room when the queue is full.
    pub async fn enqueue(&self, delivery: Delivery) -> Result<(), SinkError> {
        self.tx
            .send(delivery)
            .await
            .map_err(|_| SinkError::QueueClosed)
    }
}

/// Worker tasks consuming the delivery queue.
pub struct DeliveryPool {
    workers: Vec<JoinHandle<()>>,
}

impl DeliveryPool {
    /// Start `workers` delivery tasks sharing a queue of `capacity` slots.
    pub fn spawn(sink: Arc<dyn Sink>, workers: usize, capacity: usize) -> (DeliveryQueue, Self) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let rx = Arc::new(Mutex::new(rx));

        let workers = (0..workers.max(1))
            .map(|id| {
                let sink = Arc::clone(&sink);
                let rx = Arc::clone(&rx);
                tokio::spawn(run_worker(id, sink, rx))
            })
            .collect();

        (DeliveryQueue { tx }, Self { workers })
    }

    /// Number of worker tasks.
    #[must_use]
    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Wait until the queue is drained. Returns once every [`DeliveryQueue`]
    /// handle has been dropped.
    pub async fn join(self) {
        for worker in self.workers {
            if let Err(e) = worker.await {
                error!(error = %e, "Delivery worker failed");
            }
        }
    }
}

async fn run_worker(id: usize, sink: Arc<dyn Sink>, rx: Arc<Mutex<mpsc::Receiver<Delivery>>>) {
    debug!(worker = id, "Delivery worker started");

    loop {
        let next = rx.lock().await.recv().await;
        let Some(delivery) = next else {
            break;
        };

        let alert = &delivery.event.event;
        match sink.deliver(&delivery.collector, &delivery.event).await {
            Ok(()) => info!(
                alert = alert.name(),
                severity = alert.severity(),
                sink = sink.name(),
                "Alert sent"
            ),
            Err(e) => error!(
                alert = alert.name(),
                severity = alert.severity(),
                sink = sink.name(),
                error = %e,
                "Failed to deliver alert"
            ),
        }
    }

    debug!(worker = id, "Delivery worker stopped");
}
