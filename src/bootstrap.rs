//! Registry bootstrap: wipe, discover, and repopulate. Mirrors `mongo_bootstrap.py`'s
//! `bootstrap()` — delete everything, then upsert each freshly discovered backend with
//! `status=HEALTHY`, `weight=1`, `load_count=0`.

use tracing::info;

use crate::control::BackendDiscoverer;
use crate::error::Result;
use crate::registry::Registry;
use crate::types::{Backend, Metrics, Status};

pub async fn bootstrap(registry: &dyn Registry, discoverer: &dyn BackendDiscoverer) -> Result<usize> {
    let discovered = discoverer.list_backends().await?;
    let now = chrono::Utc::now();

    let records: Vec<Backend> = discovered
        .into_iter()
        .map(|d| Backend {
            instance_id: d.instance_id,
            name: d.name,
            address: d.address,
            port: d.port,
            status: Status::Healthy,
            weight: 1,
            metrics: Metrics::default(),
            load_count: 0,
            last_checked: Some(now),
        })
        .collect();

    let count = records.len();
    registry.bulk_replace(records).await?;
    info!(backend_count = count, "registry bootstrapped");
    Ok(count)
}
