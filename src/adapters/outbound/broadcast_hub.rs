use crate::common::{DomainError, DomainResult};
use crate::domains::path_optimization::{OptimizationEvent, ProgressSink};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::broadcast;

/// Fan-out of serialized events to every attached WebSocket connection.
///
/// Events are serialized once and shared as JSON text. Publishing with no
/// subscribers attached is not an error; the event is simply dropped.
#[derive(Debug)]
pub struct BroadcastHub {
    sender: broadcast::Sender<String>,
    subscribers: AtomicUsize,
}

impl BroadcastHub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            subscribers: AtomicUsize::new(0),
        }
    }

    /// Register a subscriber and hand back its event stream.
    pub fn attach(&self) -> broadcast::Receiver<String> {
        self.subscribers.fetch_add(1, Ordering::SeqCst);
        self.sender.subscribe()
    }

    /// Unregister a subscriber; returns how many remain.
    pub fn detach(&self) -> usize {
        let previous = self
            .subscribers
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| Some(n.saturating_sub(1)))
            .unwrap_or(0);
        previous.saturating_sub(1)
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.load(Ordering::SeqCst)
    }
}

impl ProgressSink for BroadcastHub {
    fn publish(&self, event: &OptimizationEvent) -> DomainResult<()> {
        let text = serde_json::to_string(event).map_err(|e| DomainError::Transport(e.to_string()))?;
        let _ = self.sender.send(text);
        Ok(())
    }
}
