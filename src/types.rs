//! Shared data types: backend records, discovery/metric DTOs, broadcast shapes.

use serde::{Deserialize, Serialize};

/// Stable backend identifier, assigned by the discoverer (e.g. an EC2 instance id).
pub type InstanceId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    Healthy,
    Unhealthy,
}

impl Default for Status {
    fn default() -> Self {
        Status::Unhealthy
    }
}

/// Most recent metric samples used by the weight-recalculation task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub cpu: f64,
    pub net_in: f64,
    pub net_out: f64,
    pub disk_read: f64,
    pub disk_write: f64,
    pub status_failed: f64,
}

/// A single backend in the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Backend {
    pub instance_id: InstanceId,
    pub name: String,
    pub address: String,
    pub port: u16,
    pub status: Status,
    pub weight: u32,
    #[serde(default)]
    pub metrics: Metrics,
    #[serde(default)]
    pub load_count: u64,
    pub last_checked: Option<chrono::DateTime<chrono::Utc>>,
}

impl Backend {
    pub fn is_eligible(&self) -> bool {
        self.status == Status::Healthy && self.weight > 0
    }
}

/// A backend as reported by a `BackendDiscoverer`, before it has a registry record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveredBackend {
    pub name: String,
    pub address: String,
    pub port: u16,
    pub instance_id: InstanceId,
}

/// One vnode position as reported in a state snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VnodeSnapshot {
    pub hash: String,
    pub server: String,
    pub angle: u32,
}

/// One entry of the `requests_histogram` field of a state snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestHistogramEntry {
    pub name: String,
    pub load_count: u64,
}

/// Backend summary as rendered into a state snapshot (mirrors `Backend` minus internal bookkeeping).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSummary {
    pub name: String,
    pub ip: String,
    pub port: u16,
    pub status: Status,
    pub weight: u32,
    pub vnodes: u32,
    pub load_count: u64,
    pub instance_id: InstanceId,
    pub cpu: f64,
}

impl From<&Backend> for ServerSummary {
    fn from(b: &Backend) -> Self {
        ServerSummary {
            name: b.name.clone(),
            ip: b.address.clone(),
            port: b.port,
            status: b.status,
            weight: b.weight,
            vnodes: b.weight.max(1) * crate::ring::DEFAULT_VNODES_PER_WEIGHT,
            load_count: b.load_count,
            instance_id: b.instance_id.clone(),
            cpu: b.metrics.cpu,
        }
    }
}

/// The full snapshot published by the state broadcaster, both over the WebSocket
/// and from `GET /_internal/state`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub servers: Vec<ServerSummary>,
    pub vnodes: Vec<VnodeSnapshot>,
    pub ring_size: usize,
    pub requests_histogram: Vec<RequestHistogramEntry>,
}

/// WebSocket envelope wrapping a `StateSnapshot` push.
#[derive(Debug, Clone, Serialize)]
pub struct StateUpdateEvent<'a> {
    #[serde(rename = "type")]
    pub event_type: &'static str,
    pub data: &'a StateSnapshot,
}

impl<'a> StateUpdateEvent<'a> {
    pub fn new(snapshot: &'a StateSnapshot) -> Self {
        Self {
            event_type: "state_update",
            data: snapshot,
        }
    }
}
