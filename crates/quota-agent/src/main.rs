//! Quota Agent - per-node CPU quota reconciler
//!
//! This binary runs as a DaemonSet on each Kubernetes node, enforcing
//! advisor-computed CPU quotas on container cgroups of the legacy hierarchy.

use anyhow::{Context, Result};
use quota_agent_lib::{
    advisor::FileTargetSource,
    cgroup::{detect_cgroup_version, CgroupV1Fs, CgroupVersion, KubepodsPaths},
    health::{components, HealthRegistry},
    inventory::{FilePodInventory, KubeletPodInventory, PodInventory},
    observability::{ReconcilerMetrics, StructuredLogger},
    reconcile::{ReconcileLoopBuilder, Reconciler},
};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod api;
mod config;

const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting quota-agent");

    let config = config::AgentConfig::load()?;
    info!(
        node_name = %config.node_name,
        cgroup_root = %config.cgroup_root.display(),
        cgroup_driver = ?config.cgroup_driver,
        "Agent configured"
    );

    let health_registry = HealthRegistry::new();
    health_registry.register(components::RECONCILER).await;
    health_registry.register(components::INVENTORY).await;
    health_registry.register(components::ADVISOR).await;

    let metrics = ReconcilerMetrics::new();

    let logger = StructuredLogger::new(&config.node_name);
    logger.log_startup(AGENT_VERSION, &format!("{:?}", config.cgroup_driver).to_lowercase());

    match detect_cgroup_version(&config.cgroup_root).await {
        CgroupVersion::V1 => {}
        CgroupVersion::V2 => info!("Unified cgroup hierarchy detected, passes will be no-ops"),
        CgroupVersion::Unknown => warn!(
            cgroup_root = %config.cgroup_root.display(),
            "Could not detect cgroup version"
        ),
    }

    let inventory: Arc<dyn PodInventory> = match &config.pod_list_file {
        Some(path) => {
            info!(path = %path.display(), "Reading pods from file");
            Arc::new(FilePodInventory::new(path))
        }
        None => Arc::new(
            KubeletPodInventory::new(&config.kubelet_url, config.collaborator_timeout())
                .context("Failed to create kubelet client")?,
        ),
    };

    let reconciler = Reconciler::builder()
        .inventory(inventory)
        .paths(Arc::new(KubepodsPaths::new(
            &config.cgroup_root,
            config.cgroup_driver,
        )))
        .cgroup(Arc::new(CgroupV1Fs::new(&config.cgroup_root)))
        .collaborator_timeout(config.collaborator_timeout())
        .build()?;

    let reconcile_loop = ReconcileLoopBuilder::new()
        .reconciler(Arc::new(reconciler))
        .targets(Arc::new(FileTargetSource::new(&config.targets_file)))
        .health(health_registry.clone())
        .node_name(&config.node_name)
        .interval(config.reconcile_interval())
        .jitter(config.reconcile_jitter())
        .build()?;

    let app_state = Arc::new(api::AppState::new(health_registry.clone(), metrics));

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let loop_handle = tokio::spawn(reconcile_loop.run(shutdown_rx));

    health_registry.set_ready(true).await;

    let api_handle = tokio::spawn(api::serve(config.api_port, app_state));

    tokio::signal::ctrl_c().await?;
    logger.log_shutdown("SIGINT received");

    let _ = shutdown_tx.send(());
    if let Err(e) = loop_handle.await {
        warn!(error = %e, "Reconciliation loop task failed");
    }
    api_handle.abort();

    info!("Shutdown complete");
    Ok(())
}
