//! Authoritative, persistent table of backends.
//!
//! The `Registry` trait is the seam between the routing plane and whatever document
//! store backs it. `MongoRegistry` is the production implementation; `StaticRegistry`
//! is an in-memory stand-in for tests and the `--in-memory` CLI escape hatch.

pub mod mongo;
pub mod static_registry;

pub use mongo::MongoRegistry;
pub use static_registry::StaticRegistry;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{Backend, InstanceId, Metrics, Status};

/// Fields a control-loop task may update on an existing backend. `None` leaves the
/// field untouched.
#[derive(Debug, Clone, Default)]
pub struct BackendUpdate {
    pub status: Option<Status>,
    pub weight: Option<u32>,
    pub metrics: Option<Metrics>,
    pub last_checked: Option<chrono::DateTime<chrono::Utc>>,
}

#[async_trait]
pub trait Registry: Send + Sync {
    /// Point-in-time list of every backend.
    async fn snapshot(&self) -> Result<Vec<Backend>>;

    /// Subset of `snapshot()` eligible to receive traffic.
    async fn find_healthy(&self) -> Result<Vec<Backend>> {
        Ok(self
            .snapshot()
            .await?
            .into_iter()
            .filter(Backend::is_eligible)
            .collect())
    }

    /// Merge `update` into the record for `instance_id`, creating it with the given
    /// seed fields if absent. Used by bootstrap and the control loop.
    async fn upsert(&self, instance_id: &InstanceId, seed: Backend, update: BackendUpdate) -> Result<()>;

    /// Atomic: clear every existing record, then insert `records`. Used by bootstrap.
    async fn bulk_replace(&self, records: Vec<Backend>) -> Result<()>;

    /// Atomic +1 on `load_count`.
    async fn inc_load(&self, instance_id: &InstanceId) -> Result<()>;

    /// Atomic status write.
    async fn set_status(&self, instance_id: &InstanceId, status: Status) -> Result<()>;
}
