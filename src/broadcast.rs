//! Fan-out of game events to connected viewers
//!
//! Publishing is fire-and-forget: the betting core never waits for delivery
//! and a send with no subscribers is not an error.

use crate::games::types::GameEvent;
use chrono::Utc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, trace};

const DEFAULT_CAPACITY: usize = 1024;

/// Consumer of events emitted by the betting service
pub trait EventSink: Send + Sync {
    fn publish(&self, event: GameEvent);
}

/// In-process hub backed by a tokio broadcast channel
#[derive(Clone)]
pub struct BroadcastHub {
    tx: broadcast::Sender<GameEvent>,
}

impl BroadcastHub {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Subscribers lagging by more than `capacity` events miss the oldest ones
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GameEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Emit a heartbeat every `every` to keep idle connections open
    pub fn start_heartbeat(&self, every: Duration) -> JoinHandle<()> {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let mut ticker = interval(every);
            // The first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let _ = tx.send(GameEvent::Heartbeat {
                    timestamp: Utc::now(),
                });
                trace!("Heartbeat sent");
            }
        })
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for BroadcastHub {
    fn publish(&self, event: GameEvent) {
        if let Err(e) = self.tx.send(event) {
            debug!("No subscribers for event: {}", e);
        }
    }
}
