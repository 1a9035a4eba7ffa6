//! CHLB binary entry point: CLI, tracing setup, and command dispatch.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use clap::{Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use chlb::bootstrap::bootstrap;
use chlb::broadcaster::StateBroadcaster;
use chlb::config::Config;
use chlb::control::{ControlLoop, NullMetricsSource, RebuildCoordinator, StaticDiscoverer};
use chlb::registry::{MongoRegistry, Registry, StaticRegistry};
use chlb::ring::Ring;
use chlb::router::server::{AppState, LbServer};
use chlb::signals::setup_signal_handlers;
use chlb::types::DiscoveredBackend;

#[derive(Parser)]
#[command(name = "chlb", about = "Weighted consistent-hash HTTP load balancer", version)]
struct Cli {
    /// Run against an in-memory registry instead of MongoDB (also honors IN_MEMORY=true).
    #[arg(long, global = true)]
    in_memory: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the load balancer's HTTP front end and control loop. Default when no subcommand is given.
    Serve,
    /// Wipe the registry and reseed it from the configured backend discoverer.
    Bootstrap,
    /// Ask a running instance (via LB_IP) to rebuild its ring immediately.
    TriggerRebuild,
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer())
        .init();
}

fn static_discoverer(config: &Config) -> StaticDiscoverer {
    let backends: Vec<DiscoveredBackend> = config
        .static_backends
        .as_deref()
        .and_then(|raw| serde_json::from_str(raw).ok())
        .unwrap_or_default();
    StaticDiscoverer::new(backends)
}

async fn build_registry(config: &Config, in_memory: bool) -> chlb::Result<Arc<dyn Registry>> {
    if in_memory || config.in_memory {
        Ok(Arc::new(StaticRegistry::new()))
    } else {
        let uri = config
            .mongodb_uri
            .as_deref()
            .ok_or_else(|| chlb::Error::Config("MONGODB_URI is required".to_string()))?;
        Ok(Arc::new(MongoRegistry::connect(uri).await?))
    }
}

#[tokio::main]
async fn main() -> chlb::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Bootstrap => {
            let registry = build_registry(&config, cli.in_memory).await?;
            let discoverer = static_discoverer(&config);
            let count = bootstrap(registry.as_ref(), &discoverer).await?;
            println!("bootstrapped {count} backend(s)");
            Ok(())
        }
        Command::TriggerRebuild => {
            let lb_ip = config
                .lb_ip
                .clone()
                .ok_or_else(|| chlb::Error::Config("LB_IP is required for trigger-rebuild".to_string()))?;
            let client = reqwest::Client::new();
            let url = format!("http://{}:{}/trigger_rebuild", lb_ip, config.lb_port);
            let resp = client.post(&url).timeout(Duration::from_secs(3)).send().await?;
            println!("{}", resp.status());
            Ok(())
        }
        Command::Serve => serve(config, cli.in_memory).await,
    }
}

async fn serve(config: Config, in_memory: bool) -> chlb::Result<()> {
    let registry = build_registry(&config, in_memory).await?;
    let discoverer: Arc<dyn chlb::control::BackendDiscoverer> = Arc::new(static_discoverer(&config));
    let metrics_source: Arc<dyn chlb::control::MetricsSource> = Arc::new(NullMetricsSource);

    let initial_healthy = registry.find_healthy().await.unwrap_or_default();
    let ring = Arc::new(ArcSwap::from_pointee(Ring::build(initial_healthy)));
    let coordinator = Arc::new(RebuildCoordinator::new(ring.clone(), registry.clone()));
    let broadcaster = Arc::new(StateBroadcaster::new(registry.clone(), ring.clone()));

    let control_loop = Arc::new(ControlLoop::new(
        registry.clone(),
        discoverer,
        metrics_source,
        coordinator.clone(),
        Duration::from_secs(config.control_loop_period_secs),
    ));
    let _control_handles = control_loop.spawn();

    let state = AppState {
        registry,
        ring,
        coordinator,
        broadcaster,
        http: reqwest::Client::new(),
    };

    let (shutdown_tx, _shutdown_rx) = setup_signal_handlers();
    let addr = SocketAddr::from(([0, 0, 0, 0], config.lb_port));
    let server = LbServer::new(state, addr, shutdown_tx);
    server.run().await
}
