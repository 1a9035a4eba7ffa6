//! Single-flight ring rebuild coordination.
//!
//! Mirrors the teacher's `AtomicRegistry::update()` discipline (increment a
//! generation marker, build the new value off the hot path, swap atomically) but adds
//! coalescing: a rebuild requested while one is already in flight is folded into "run
//! once more after this one finishes" rather than queued or dropped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use tracing::{info, warn};

use crate::error::Result;
use crate::registry::Registry;
use crate::ring::Ring;

pub struct RebuildCoordinator {
    ring: Arc<ArcSwap<Ring>>,
    registry: Arc<dyn Registry>,
    in_progress: AtomicBool,
    pending: AtomicBool,
}

impl RebuildCoordinator {
    pub fn new(ring: Arc<ArcSwap<Ring>>, registry: Arc<dyn Registry>) -> Self {
        Self {
            ring,
            registry,
            in_progress: AtomicBool::new(false),
            pending: AtomicBool::new(false),
        }
    }

    pub fn ring(&self) -> Arc<ArcSwap<Ring>> {
        self.ring.clone()
    }

    /// Triggers a rebuild. If one is already running, marks `pending` so the running
    /// rebuild loops once more before releasing the in-flight flag — callers never
    /// block waiting for a rebuild they didn't start.
    pub async fn rebuild_now(&self) -> Result<()> {
        if self
            .in_progress
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            self.pending.store(true, Ordering::Release);
            return Ok(());
        }

        loop {
            self.pending.store(false, Ordering::Release);
            match self.registry.find_healthy().await {
                Ok(healthy) => {
                    let new_ring = Ring::build(healthy);
                    info!(vnodes = new_ring.len(), "ring rebuilt");
                    crate::metrics::RING_SIZE.set(new_ring.len() as i64);
                    crate::metrics::REBUILDS_TOTAL.inc();
                    self.ring.store(Arc::new(new_ring));
                }
                Err(e) => {
                    warn!("rebuild failed, keeping previous ring: {e}");
                }
            }

            if !self.pending.load(Ordering::Acquire) {
                break;
            }
        }

        self.in_progress.store(false, Ordering::Release);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::StaticRegistry;
    use crate::types::{Backend, Metrics, Status};

    fn backend(name: &str) -> Backend {
        Backend {
            instance_id: name.to_string(),
            name: name.to_string(),
            address: "127.0.0.1".to_string(),
            port: 8080,
            status: Status::Healthy,
            weight: 1,
            metrics: Metrics::default(),
            load_count: 0,
            last_checked: None,
        }
    }

    #[tokio::test]
    async fn rebuild_populates_ring_from_registry() {
        let registry: Arc<dyn Registry> = Arc::new(StaticRegistry::seeded(vec![backend("b1")]));
        let ring = Arc::new(ArcSwap::from_pointee(Ring::build(vec![])));
        let coordinator = RebuildCoordinator::new(ring.clone(), registry);

        assert!(ring.load().is_empty());
        coordinator.rebuild_now().await.unwrap();
        assert!(!ring.load().is_empty());
    }

    #[tokio::test]
    async fn concurrent_rebuilds_coalesce() {
        let registry: Arc<dyn Registry> = Arc::new(StaticRegistry::seeded(vec![backend("b1")]));
        let ring = Arc::new(ArcSwap::from_pointee(Ring::build(vec![])));
        let coordinator = Arc::new(RebuildCoordinator::new(ring.clone(), registry));

        let a = coordinator.clone();
        let b = coordinator.clone();
        let (r1, r2) = tokio::join!(a.rebuild_now(), b.rebuild_now());
        r1.unwrap();
        r2.unwrap();
        assert!(!ring.load().is_empty());
    }
}
