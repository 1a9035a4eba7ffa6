//! Backend enumeration, abstracted away from any specific cloud provider.
//!
//! Real deployments plug in an EC2/CloudWatch-backed implementation; that integration
//! is explicitly out of scope here (see SPEC_FULL.md §1/§6). `StaticDiscoverer` is the
//! only implementation shipped, driven entirely by configuration.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{DiscoveredBackend, InstanceId};

#[async_trait]
pub trait BackendDiscoverer: Send + Sync {
    async fn list_backends(&self) -> Result<Vec<DiscoveredBackend>>;
    async fn by_address(&self, address: &str) -> Result<Option<InstanceId>>;
}

/// Enumerates a fixed, configuration-supplied list of backends.
pub struct StaticDiscoverer {
    backends: Vec<DiscoveredBackend>,
}

impl StaticDiscoverer {
    pub fn new(backends: Vec<DiscoveredBackend>) -> Self {
        Self { backends }
    }
}

#[async_trait]
impl BackendDiscoverer for StaticDiscoverer {
    async fn list_backends(&self) -> Result<Vec<DiscoveredBackend>> {
        Ok(self.backends.clone())
    }

    async fn by_address(&self, address: &str) -> Result<Option<InstanceId>> {
        Ok(self
            .backends
            .iter()
            .find(|b| b.address == address)
            .map(|b| b.instance_id.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn by_address_finds_known_backend() {
        let discoverer = StaticDiscoverer::new(vec![DiscoveredBackend {
            name: "b1".to_string(),
            address: "10.0.0.5".to_string(),
            port: 8080,
            instance_id: "i-b1".to_string(),
        }]);
        assert_eq!(
            discoverer.by_address("10.0.0.5").await.unwrap(),
            Some("i-b1".to_string())
        );
        assert_eq!(discoverer.by_address("10.0.0.9").await.unwrap(), None);
    }
}
