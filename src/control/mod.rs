//! Periodic control-loop tasks: health probing, weight recalculation, and a safety-net
//! periodic rebuild, independent of each other per SPEC_FULL.md §4.4/§5.

pub mod coordinator;
pub mod discoverer;
pub mod metrics_source;
pub mod weight;

pub use coordinator::RebuildCoordinator;
pub use discoverer::{BackendDiscoverer, StaticDiscoverer};
pub use metrics_source::{MetricsSource, NullMetricsSource};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use reqwest::Client;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::registry::{BackendUpdate, Registry};
use crate::types::{Backend, Metrics, Status};

const HEALTH_PROBE_TIMEOUT: Duration = Duration::from_secs(3);
const METRICS_WINDOW_MINUTES: u32 = 10;

pub struct ControlLoop {
    registry: Arc<dyn Registry>,
    discoverer: Arc<dyn BackendDiscoverer>,
    metrics_source: Arc<dyn MetricsSource>,
    coordinator: Arc<RebuildCoordinator>,
    http: Client,
    period: Duration,
}

impl ControlLoop {
    pub fn new(
        registry: Arc<dyn Registry>,
        discoverer: Arc<dyn BackendDiscoverer>,
        metrics_source: Arc<dyn MetricsSource>,
        coordinator: Arc<RebuildCoordinator>,
        period: Duration,
    ) -> Self {
        Self {
            registry,
            discoverer,
            metrics_source,
            coordinator,
            http: Client::new(),
            period,
        }
    }

    /// Spawns the three independent periodic tasks and returns their handles so the
    /// caller can hold / abort them on shutdown.
    pub fn spawn(self: Arc<Self>) -> Vec<JoinHandle<()>> {
        vec![
            tokio::spawn(self.clone().run_single_flight("health-probe", Self::health_probe_tick)),
            tokio::spawn(self.clone().run_single_flight("weight-recalc", Self::weight_recalc_tick)),
            tokio::spawn(self.run_periodic_rebuild()),
        ]
    }

    async fn run_single_flight<F, Fut>(self: Arc<Self>, name: &'static str, tick: F)
    where
        F: Fn(Arc<Self>) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = ()> + Send,
    {
        let in_flight = AtomicBool::new(false);
        let mut interval = tokio::time::interval(jittered(self.period));
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            interval.tick().await;
            if in_flight.swap(true, Ordering::AcqRel) {
                debug!("{name} tick skipped, previous run still in flight");
                continue;
            }
            tick(self.clone()).await;
            in_flight.store(false, Ordering::Release);
        }
    }

    async fn run_periodic_rebuild(self: Arc<Self>) {
        let mut interval = tokio::time::interval(jittered(self.period));
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            if let Err(e) = self.coordinator.rebuild_now().await {
                warn!("periodic safety rebuild failed: {e}");
            }
        }
    }

    async fn health_probe_tick(self: Arc<Self>) {
        let backends = match self.registry.snapshot().await {
            Ok(b) => b,
            Err(e) => {
                warn!("health probe skipped, registry unavailable: {e}");
                return;
            }
        };

        let mut rebuild_needed = false;
        for backend in &backends {
            let new_status = self.probe_one(backend).await;
            crate::metrics::BACKEND_HEALTH_STATUS
                .with_label_values(&[&backend.name])
                .set(if new_status == Status::Healthy { 1.0 } else { 0.0 });
            if new_status != backend.status {
                if let Err(e) = self.registry.set_status(&backend.instance_id, new_status).await {
                    warn!("failed to persist health status for {}: {e}", backend.name);
                    continue;
                }
                rebuild_needed = true;
            }
        }

        if rebuild_needed {
            if let Err(e) = self.coordinator.rebuild_now().await {
                warn!("rebuild after health probe failed: {e}");
            }
        }
    }

    async fn probe_one(&self, backend: &Backend) -> Status {
        let url = format!("http://{}:{}/health", backend.address, backend.port);
        let status = match self.http.get(&url).timeout(HEALTH_PROBE_TIMEOUT).send().await {
            Ok(resp) if resp.status().is_success() => Status::Healthy,
            _ => Status::Unhealthy,
        };
        let result = if status == Status::Healthy { "healthy" } else { "unhealthy" };
        crate::metrics::HEALTH_CHECK_TOTAL
            .with_label_values(&[&backend.name, result])
            .inc();
        status
    }

    async fn weight_recalc_tick(self: Arc<Self>) {
        let backends = match self.registry.snapshot().await {
            Ok(b) => b,
            Err(e) => {
                warn!("weight recalc skipped, registry unavailable: {e}");
                return;
            }
        };

        let mut rebuild_needed = false;
        for backend in &backends {
            let instance_id = if backend.instance_id.is_empty() {
                match self.discoverer.by_address(&backend.address).await {
                    Ok(Some(id)) => id,
                    _ => {
                        warn!("no instance_id for {}, skipping weight recalc", backend.address);
                        continue;
                    }
                }
            } else {
                backend.instance_id.clone()
            };

            let metrics = self.fetch_metrics(&instance_id).await;
            let new_weight = weight::calculate_weight(&metrics);

            let update = BackendUpdate {
                weight: Some(new_weight),
                metrics: Some(metrics),
                last_checked: Some(chrono::Utc::now()),
                status: None,
            };
            if let Err(e) = self
                .registry
                .upsert(&instance_id, backend.clone(), update)
                .await
            {
                warn!("failed to persist weight for {instance_id}: {e}");
                continue;
            }
            crate::metrics::BACKEND_WEIGHT
                .with_label_values(&[&backend.name])
                .set(new_weight as f64);

            if new_weight != backend.weight {
                rebuild_needed = true;
            }
        }

        if rebuild_needed {
            if let Err(e) = self.coordinator.rebuild_now().await {
                warn!("rebuild after weight recalc failed: {e}");
            }
        }
    }

    async fn fetch_metrics(&self, instance_id: &str) -> Metrics {
        let id = instance_id.to_string();
        Metrics {
            cpu: self.avg(&id, "CPUUtilization").await,
            net_in: self.avg(&id, "NetworkIn").await,
            net_out: self.avg(&id, "NetworkOut").await,
            disk_read: self.avg(&id, "DiskReadOps").await,
            disk_write: self.avg(&id, "DiskWriteOps").await,
            status_failed: self.sum(&id, "StatusCheckFailed").await,
        }
    }

    async fn avg(&self, instance_id: &str, metric: &str) -> f64 {
        self.metrics_source
            .average(&instance_id.to_string(), metric, METRICS_WINDOW_MINUTES)
            .await
            .unwrap_or(0.0)
    }

    async fn sum(&self, instance_id: &str, metric: &str) -> f64 {
        self.metrics_source
            .sum(&instance_id.to_string(), metric, METRICS_WINDOW_MINUTES)
            .await
            .unwrap_or(0.0)
    }
}

fn jittered(period: Duration) -> Duration {
    let fraction = rand::thread_rng().gen_range(-0.10..=0.10);
    let delta = period.as_secs_f64() * fraction;
    Duration::from_secs_f64((period.as_secs_f64() + delta).max(1.0))
}
