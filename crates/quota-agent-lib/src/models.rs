//! Core data models for the quota agent

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Kernel default for `cpu.cfs_period_us` (100ms)
pub const DEFAULT_CPU_PERIOD_US: u64 = 100_000;

/// Smallest quota the kernel accepts for `cpu.cfs_quota_us`
pub const MIN_CPU_QUOTA_US: i64 = 1_000;

/// Advisor result key holding a JSON-encoded [`CgroupResources`]
pub const CGROUP_CONFIG_KEY: &str = "cgroup_config";

/// Kubernetes QoS class of a pod, which decides its cgroup parent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QosClass {
    Guaranteed,
    Burstable,
    BestEffort,
}

/// A workload unit as reported by the pod inventory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PodDescriptor {
    pub uid: String,
    pub name: String,
    pub namespace: String,
    pub qos_class: Option<QosClass>,
    pub containers: Vec<ContainerDescriptor>,
    /// container name -> runtime container ID (e.g. `containerd://<hex>`)
    #[serde(default)]
    pub container_statuses: HashMap<String, String>,
}

impl PodDescriptor {
    /// `namespace/name`, used in logs and error reports
    pub fn key(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }
}

/// A container belonging to exactly one [`PodDescriptor`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerDescriptor {
    pub name: String,
    pub resources: ContainerResources,
}

/// Runtime identity of a started container
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContainerId {
    /// Runtime scheme, e.g. `containerd`, `cri-o`, `docker`
    pub runtime: String,
    pub id: String,
}

impl ContainerId {
    /// Parse a `<runtime>://<id>` URI as found in pod container statuses
    pub fn parse(uri: &str) -> Option<Self> {
        let (runtime, id) = uri.split_once("://")?;
        if runtime.is_empty() || id.is_empty() {
            return None;
        }
        Some(Self {
            runtime: runtime.to_string(),
            id: id.to_string(),
        })
    }
}

/// CPU resources declared by a container, in millicores
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerResources {
    pub cpu_request_millis: u64,
    pub cpu_limit_millis: Option<u64>,
}

/// Target CPU bandwidth handed over by the advisor
///
/// `cpu_quota` follows kernel conventions: `-1` is unlimited and `0` means
/// the advisor did not set a quota. A zero `cpu_period` stands for the
/// kernel default period.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CgroupResources {
    #[serde(default)]
    pub cpu_quota: i64,
    #[serde(default)]
    pub cpu_period: u64,
}

impl CgroupResources {
    /// Period the quota is expressed against
    pub fn effective_period(&self) -> u64 {
        if self.cpu_period == 0 {
            DEFAULT_CPU_PERIOD_US
        } else {
            self.cpu_period
        }
    }
}

/// CPU bandwidth currently configured on a cgroup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuStats {
    pub cpu_quota: i64,
    pub cpu_period: u64,
}

/// Advisor calculation for one cgroup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalculationInfo {
    pub cgroup_path: String,
    pub calculation_result: Option<CalculationResult>,
}

/// Control knob values computed by the advisor
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CalculationResult {
    #[serde(default)]
    pub values: HashMap<String, String>,
}

impl CalculationInfo {
    /// Decode the cgroup config knob, if the advisor sent one
    pub fn cgroup_resources(&self) -> serde_json::Result<Option<CgroupResources>> {
        let raw = self
            .calculation_result
            .as_ref()
            .and_then(|result| result.values.get(CGROUP_CONFIG_KEY));

        match raw {
            Some(raw) => serde_json::from_str(raw).map(Some),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calculation_info_decodes_cgroup_config() {
        let info: CalculationInfo = serde_json::from_str(
            r#"{
                "cgroup_path": "kubepods/burstable",
                "calculation_result": {
                    "values": {"cgroup_config": "{\"cpu_quota\":1000,\"cpu_period\":1000}"}
                }
            }"#,
        )
        .unwrap();

        let resources = info.cgroup_resources().unwrap().unwrap();
        assert_eq!(resources.cpu_quota, 1000);
        assert_eq!(resources.cpu_period, 1000);
    }

    #[test]
    fn test_calculation_info_without_cgroup_config() {
        let info = CalculationInfo {
            cgroup_path: "kubepods".to_string(),
            calculation_result: None,
        };
        assert!(info.cgroup_resources().unwrap().is_none());
    }

    #[test]
    fn test_calculation_info_rejects_garbage() {
        let mut values = HashMap::new();
        values.insert(CGROUP_CONFIG_KEY.to_string(), "not json".to_string());
        let info = CalculationInfo {
            cgroup_path: "kubepods".to_string(),
            calculation_result: Some(CalculationResult { values }),
        };
        assert!(info.cgroup_resources().is_err());
    }

    #[test]
    fn test_container_id_parse() {
        let id = ContainerId::parse("containerd://abc123").unwrap();
        assert_eq!(id.runtime, "containerd");
        assert_eq!(id.id, "abc123");

        assert!(ContainerId::parse("abc123").is_none());
        assert!(ContainerId::parse("containerd://").is_none());
    }

    #[test]
    fn test_effective_period_defaults() {
        let resources = CgroupResources {
            cpu_quota: 50_000,
            cpu_period: 0,
        };
        assert_eq!(resources.effective_period(), DEFAULT_CPU_PERIOD_US);
    }
}
