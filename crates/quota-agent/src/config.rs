//! Agent configuration

use anyhow::{Context, Result};
use quota_agent_lib::cgroup::CgroupDriver;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

const CONFIG_PATH_ENV: &str = "QUOTA_AGENT_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "/etc/quota-agent/config";

/// Agent configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Node name from Kubernetes downward API
    #[serde(default = "default_node_name")]
    pub node_name: String,

    /// API server port for health/metrics
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Mount point of the cgroup v1 controllers
    #[serde(default = "default_cgroup_root")]
    pub cgroup_root: PathBuf,

    /// kubelet cgroup driver
    #[serde(default)]
    pub cgroup_driver: CgroupDriver,

    /// kubelet pods endpoint
    #[serde(default = "default_kubelet_url")]
    pub kubelet_url: String,

    /// Read pods from a JSON pod list instead of the kubelet
    #[serde(default)]
    pub pod_list_file: Option<PathBuf>,

    /// Advisor calculations
    #[serde(default = "default_targets_file")]
    pub targets_file: PathBuf,

    #[serde(default = "default_reconcile_interval")]
    pub reconcile_interval_secs: u64,

    #[serde(default = "default_reconcile_jitter")]
    pub reconcile_jitter_millis: u64,

    /// Deadline for kubelet and runtime calls
    #[serde(default = "default_collaborator_timeout")]
    pub collaborator_timeout_secs: u64,
}

fn default_node_name() -> String {
    std::env::var("NODE_NAME").unwrap_or_else(|_| "unknown".to_string())
}

fn default_api_port() -> u16 {
    8080
}

fn default_cgroup_root() -> PathBuf {
    PathBuf::from("/sys/fs/cgroup")
}

fn default_kubelet_url() -> String {
    "http://127.0.0.1:10255/pods".to_string()
}

fn default_targets_file() -> PathBuf {
    PathBuf::from("/etc/quota-agent/targets.json")
}

fn default_reconcile_interval() -> u64 {
    30
}

fn default_reconcile_jitter() -> u64 {
    1000
}

fn default_collaborator_timeout() -> u64 {
    5
}

impl AgentConfig {
    /// Load configuration from the config file and environment
    ///
    /// Environment variables (`QUOTA_AGENT_API_PORT`, ...) override the file.
    pub fn load() -> Result<Self> {
        let path =
            std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name(&path).required(false))
            .add_source(config::Environment::with_prefix("QUOTA_AGENT").try_parsing(true))
            .build()
            .with_context(|| format!("Failed to load configuration from {}", path))?;

        config
            .try_deserialize()
            .context("Invalid agent configuration")
    }

    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_secs(self.reconcile_interval_secs)
    }

    pub fn reconcile_jitter(&self) -> Duration {
        Duration::from_millis(self.reconcile_jitter_millis)
    }

    pub fn collaborator_timeout(&self) -> Duration {
        Duration::from_secs(self.collaborator_timeout_secs)
    }
}
