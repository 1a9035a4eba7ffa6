//! In-memory `Registry`, backed by `DashMap` the same way the teacher's
//! `AtomicRegistry` keeps its hot-path state — used for tests and the `--in-memory`
//! CLI mode.

use async_trait::async_trait;
use dashmap::DashMap;

use super::{BackendUpdate, Registry};
use crate::error::Result;
use crate::types::{Backend, InstanceId, Status};

#[derive(Debug, Default)]
pub struct StaticRegistry {
    backends: DashMap<InstanceId, Backend>,
}

impl StaticRegistry {
    pub fn new() -> Self {
        Self {
            backends: DashMap::new(),
        }
    }

    pub fn seeded(records: Vec<Backend>) -> Self {
        let registry = Self::new();
        for record in records {
            registry.backends.insert(record.instance_id.clone(), record);
        }
        registry
    }
}

#[async_trait]
impl Registry for StaticRegistry {
    async fn snapshot(&self) -> Result<Vec<Backend>> {
        Ok(self.backends.iter().map(|entry| entry.value().clone()).collect())
    }

    async fn upsert(&self, instance_id: &InstanceId, seed: Backend, update: BackendUpdate) -> Result<()> {
        let mut entry = self.backends.entry(instance_id.clone()).or_insert(seed);
        if let Some(status) = update.status {
            entry.status = status;
        }
        if let Some(weight) = update.weight {
            entry.weight = weight;
        }
        if let Some(metrics) = update.metrics {
            entry.metrics = metrics;
        }
        if let Some(last_checked) = update.last_checked {
            entry.last_checked = Some(last_checked);
        }
        Ok(())
    }

    async fn bulk_replace(&self, records: Vec<Backend>) -> Result<()> {
        self.backends.clear();
        for record in records {
            self.backends.insert(record.instance_id.clone(), record);
        }
        Ok(())
    }

    async fn inc_load(&self, instance_id: &InstanceId) -> Result<()> {
        if let Some(mut entry) = self.backends.get_mut(instance_id) {
            entry.load_count += 1;
        }
        Ok(())
    }

    async fn set_status(&self, instance_id: &InstanceId, status: Status) -> Result<()> {
        if let Some(mut entry) = self.backends.get_mut(instance_id) {
            entry.status = status;
        }
        Ok(())
    }
}
