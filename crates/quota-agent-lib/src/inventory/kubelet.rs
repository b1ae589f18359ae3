//! Pod inventory backed by the kubelet pod list
//!
//! Understands the subset of the Kubernetes `PodList` JSON needed for quota
//! reconciliation, fetched either from the kubelet `/pods` endpoint or from
//! a snapshot file on disk.

use super::PodInventory;
use crate::models::{ContainerDescriptor, ContainerResources, PodDescriptor, QosClass};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;
use url::Url;

/// Kubernetes `PodList` as served by kubelet
#[derive(Debug, Clone, Deserialize)]
pub struct PodList {
    #[serde(default)]
    pub items: Vec<Pod>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Pod {
    pub metadata: ObjectMeta,
    pub spec: PodSpec,
    #[serde(default)]
    pub status: PodStatus,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ObjectMeta {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub uid: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PodSpec {
    #[serde(default)]
    pub containers: Vec<Container>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Container {
    pub name: String,
    #[serde(default)]
    pub resources: ResourceRequirements,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResourceRequirements {
    #[serde(default)]
    pub requests: HashMap<String, String>,
    #[serde(default)]
    pub limits: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodStatus {
    pub qos_class: Option<String>,
    #[serde(default)]
    pub container_statuses: Vec<ContainerStatus>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContainerStatus {
    pub name: String,
    #[serde(rename = "containerID")]
    pub container_id: Option<String>,
}

impl PodList {
    /// Convert to the descriptors the reconciler works with
    pub fn into_descriptors(self) -> Vec<PodDescriptor> {
        self.items.into_iter().map(Pod::into_descriptor).collect()
    }
}

impl Pod {
    fn into_descriptor(self) -> PodDescriptor {
        let qos_class = self.status.qos_class.as_deref().and_then(|qos| match qos {
            "Guaranteed" => Some(QosClass::Guaranteed),
            "Burstable" => Some(QosClass::Burstable),
            "BestEffort" => Some(QosClass::BestEffort),
            other => {
                warn!(pod = %self.metadata.name, qos_class = %other, "Unknown QoS class");
                None
            }
        });

        let containers = self
            .spec
            .containers
            .into_iter()
            .map(|container| ContainerDescriptor {
                resources: ContainerResources {
                    cpu_request_millis: cpu_millis(&container.resources.requests).unwrap_or(0),
                    cpu_limit_millis: cpu_millis(&container.resources.limits),
                },
                name: container.name,
            })
            .collect();

        let container_statuses = self
            .status
            .container_statuses
            .into_iter()
            .filter_map(|status| status.container_id.map(|id| (status.name, id)))
            .collect();

        PodDescriptor {
            uid: self.metadata.uid,
            name: self.metadata.name,
            namespace: self.metadata.namespace,
            qos_class,
            containers,
            container_statuses,
        }
    }
}

fn cpu_millis(resources: &HashMap<String, String>) -> Option<u64> {
    let raw = resources.get("cpu")?;
    let millis = parse_cpu_quantity(raw);
    if millis.is_none() {
        warn!(quantity = %raw, "Ignoring unparseable cpu quantity");
    }
    millis
}

/// Parse a Kubernetes CPU quantity ("2", "500m", "1.5") into millicores
pub fn parse_cpu_quantity(quantity: &str) -> Option<u64> {
    let quantity = quantity.trim();

    if let Some(millis) = quantity.strip_suffix('m') {
        return millis.parse().ok();
    }

    let cores: f64 = quantity.parse().ok()?;
    if !cores.is_finite() || cores < 0.0 {
        return None;
    }
    Some((cores * 1000.0).round() as u64)
}

/// Inventory that queries the kubelet `/pods` endpoint
pub struct KubeletPodInventory {
    client: Client,
    url: Url,
}

impl KubeletPodInventory {
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        let url = Url::parse(url).context("Invalid kubelet URL")?;

        Ok(Self { client, url })
    }
}

#[async_trait]
impl PodInventory for KubeletPodInventory {
    async fn list_pods(&self) -> Result<Vec<PodDescriptor>> {
        let response = self
            .client
            .get(self.url.clone())
            .send()
            .await
            .context("Failed to query kubelet pods")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("kubelet error ({}): {}", status, body);
        }

        let pods: PodList = response
            .json()
            .await
            .context("Failed to parse kubelet pod list")?;

        Ok(pods.into_descriptors())
    }
}

/// Inventory that reads a `PodList` snapshot from disk
pub struct FilePodInventory {
    path: PathBuf,
}

impl FilePodInventory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl PodInventory for FilePodInventory {
    async fn list_pods(&self) -> Result<Vec<PodDescriptor>> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read {}", self.path.display()))?;

        let pods: PodList = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse pod list {}", self.path.display()))?;

        Ok(pods.into_descriptors())
    }
}
