//! Common test utilities for integration tests.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use chlb::broadcaster::StateBroadcaster;
use chlb::control::RebuildCoordinator;
use chlb::registry::{Registry, StaticRegistry};
use chlb::ring::Ring;
use chlb::router::server::{AppState, LbServer};
use chlb::types::{Backend, Metrics, Status};
use tokio::sync::broadcast;

pub fn backend(name: &str, address: &str, port: u16, weight: u32, status: Status) -> Backend {
    Backend {
        instance_id: format!("i-{name}"),
        name: name.to_string(),
        address: address.to_string(),
        port,
        status,
        weight,
        metrics: Metrics::default(),
        load_count: 0,
        last_checked: None,
    }
}

pub struct TestLb {
    addr: SocketAddr,
    state: AppState,
    handle: tokio::task::JoinHandle<()>,
}

impl TestLb {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }
}

impl Drop for TestLb {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Starts a CHLB server backed by a `StaticRegistry` seeded with `backends`, on a free
/// local port.
pub async fn start_test_lb(backends: Vec<Backend>) -> TestLb {
    let registry: Arc<dyn Registry> = Arc::new(StaticRegistry::seeded(backends));
    let initial = registry.find_healthy().await.unwrap();
    let ring = Arc::new(ArcSwap::from_pointee(Ring::build(initial)));
    let coordinator = Arc::new(RebuildCoordinator::new(ring.clone(), registry.clone()));
    let broadcaster = Arc::new(StateBroadcaster::new(registry.clone(), ring.clone()));

    let state = AppState {
        registry,
        ring,
        coordinator,
        broadcaster,
        http: reqwest::Client::new(),
    };

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let (shutdown_tx, _rx) = broadcast::channel(1);
    let server = LbServer::new(state.clone(), addr, shutdown_tx);

    let handle = tokio::spawn(async move {
        server.run().await.expect("server failed");
    });

    tokio::time::sleep(Duration::from_millis(150)).await;

    TestLb { addr, state, handle }
}

pub fn test_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .expect("failed to build client")
}
