//! Publishes `StateSnapshot`s to subscribers. A single `build_snapshot` function feeds
//! both the WebSocket push path and the `GET /_internal/state` pull path, mirroring the
//! original `broadcast_state()` in the Python source.

use std::sync::Arc;

use arc_swap::ArcSwap;
use tokio::sync::watch;

use crate::error::Result;
use crate::registry::Registry;
use crate::ring::Ring;
use crate::types::{RequestHistogramEntry, ServerSummary, StateSnapshot};

#[derive(Clone)]
pub struct StateBroadcaster {
    registry: Arc<dyn Registry>,
    ring: Arc<ArcSwap<Ring>>,
    tx: watch::Sender<StateSnapshot>,
}

impl StateBroadcaster {
    pub fn new(registry: Arc<dyn Registry>, ring: Arc<ArcSwap<Ring>>) -> Self {
        let initial = StateSnapshot {
            timestamp: chrono::Utc::now(),
            servers: Vec::new(),
            vnodes: Vec::new(),
            ring_size: 0,
            requests_histogram: Vec::new(),
        };
        let (tx, _rx) = watch::channel(initial);
        Self { registry, ring, tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<StateSnapshot> {
        self.tx.subscribe()
    }

    pub fn latest(&self) -> StateSnapshot {
        self.tx.borrow().clone()
    }

    /// Rebuilds the snapshot from current Registry + Ring state and pushes it to every
    /// subscriber. A `watch` channel naturally coalesces bursts and never blocks on a
    /// slow/closed subscriber, so delivery failure here can never propagate to the
    /// caller (there is nothing to fail: `send` only errors when every receiver has
    /// been dropped, which we ignore).
    pub async fn publish(&self) -> Result<StateSnapshot> {
        let backends = self.registry.snapshot().await?;
        let ring = self.ring.load();

        let servers: Vec<ServerSummary> = backends.iter().map(ServerSummary::from).collect();
        let requests_histogram: Vec<RequestHistogramEntry> = backends
            .iter()
            .map(|b| RequestHistogramEntry {
                name: b.name.clone(),
                load_count: b.load_count,
            })
            .collect();

        let snapshot = StateSnapshot {
            timestamp: chrono::Utc::now(),
            servers,
            vnodes: ring.snapshot(),
            ring_size: ring.len(),
            requests_histogram,
        };

        let _ = self.tx.send(snapshot.clone());
        Ok(snapshot)
    }
}
