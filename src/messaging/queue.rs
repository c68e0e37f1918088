use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError, TrySendError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use super::CanonicalEvent;

pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Counters shared between the producer side and whoever reports on it
#[derive(Debug, Default)]
pub struct QueueStats {
    enqueued: AtomicU64,
    dropped: AtomicU64,
    malformed: AtomicU64,
    ignored: AtomicU64,
}

impl QueueStats {
    pub fn enqueued(&self) -> u64 {
        self.enqueued.load(Ordering::Relaxed)
    }

    /// Events lost because the queue was full
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Raw messages rejected for being too short
    pub fn malformed(&self) -> u64 {
        self.malformed.load(Ordering::Relaxed)
    }

    /// Raw messages of a kind we do not route
    pub fn ignored(&self) -> u64 {
        self.ignored.load(Ordering::Relaxed)
    }

    pub(crate) fn record_malformed(&self) {
        self.malformed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_ignored(&self) {
        self.ignored.fetch_add(1, Ordering::Relaxed);
    }
}

/// Create the bounded event queue and return both ends
pub fn event_queue(capacity: usize) -> (EventProducer, EventConsumer) {
    let (sender, receiver) = bounded(capacity.max(1));
    let stats = Arc::new(QueueStats::default());

    (
        EventProducer { sender, stats: Arc::clone(&stats) },
        EventConsumer { receiver, stats },
    )
}

/// Write end of the queue. Never blocks: a full queue drops the newest event.
#[derive(Clone)]
pub struct EventProducer {
    sender: Sender<CanonicalEvent>,
    stats: Arc<QueueStats>,
}

impl EventProducer {
    /// Push an event; returns false if it was dropped
    pub fn push(&self, event: CanonicalEvent) -> bool {
        match self.sender.try_send(event) {
            Ok(()) => {
                self.stats.enqueued.fetch_add(1, Ordering::Relaxed);
                true
            },
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                false
            },
        }
    }

    pub fn stats(&self) -> &QueueStats {
        &self.stats
    }
}

/// Read end of the queue, owned by the tick loop
pub struct EventConsumer {
    receiver: Receiver<CanonicalEvent>,
    stats: Arc<QueueStats>,
}

impl EventConsumer {
    /// Pop the oldest event, or None if nothing is waiting
    pub fn try_pop(&self) -> Option<CanonicalEvent> {
        match self.receiver.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    pub fn stats(&self) -> Arc<QueueStats> {
        Arc::clone(&self.stats)
    }
}
