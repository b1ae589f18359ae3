//! Workload inventory and container runtime identity
//!
//! The reconciler learns which pods exist from a [`PodInventory`] and maps
//! each container to its runtime ID through a [`ContainerIdResolver`].

mod kubelet;

pub use kubelet::{parse_cpu_quantity, FilePodInventory, KubeletPodInventory, PodList};

use crate::models::{ContainerDescriptor, ContainerId, PodDescriptor};
use anyhow::{Context, Result};
use async_trait::async_trait;

/// Source of the pods currently assigned to this node
#[async_trait]
pub trait PodInventory: Send + Sync {
    async fn list_pods(&self) -> Result<Vec<PodDescriptor>>;
}

/// Resolves the runtime ID of a container
#[async_trait]
pub trait ContainerIdResolver: Send + Sync {
    /// Fails when the container has not been started yet
    async fn container_id(
        &self,
        pod: &PodDescriptor,
        container: &ContainerDescriptor,
    ) -> Result<ContainerId>;
}

/// Resolves container IDs from the pod's reported container statuses
#[derive(Debug, Clone, Default)]
pub struct PodStatusResolver;

#[async_trait]
impl ContainerIdResolver for PodStatusResolver {
    async fn container_id(
        &self,
        pod: &PodDescriptor,
        container: &ContainerDescriptor,
    ) -> Result<ContainerId> {
        let uri = pod
            .container_statuses
            .get(&container.name)
            .filter(|uri| !uri.is_empty())
            .with_context(|| {
                format!(
                    "container {} of pod {} has no runtime id yet",
                    container.name,
                    pod.key()
                )
            })?;

        ContainerId::parse(uri).with_context(|| format!("malformed container id {:?}", uri))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ContainerResources, QosClass};
    use std::collections::HashMap;

    fn pod_with_status(statuses: &[(&str, &str)]) -> PodDescriptor {
        PodDescriptor {
            uid: "uid-1".to_string(),
            name: "web".to_string(),
            namespace: "default".to_string(),
            qos_class: Some(QosClass::Burstable),
            containers: vec![ContainerDescriptor {
                name: "app".to_string(),
                resources: ContainerResources::default(),
            }],
            container_statuses: statuses
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<HashMap<_, _>>(),
        }
    }

    #[tokio::test]
    async fn test_pod_status_resolver_resolves_started_container() {
        let pod = pod_with_status(&[("app", "containerd://abc123")]);
        let id = PodStatusResolver
            .container_id(&pod, &pod.containers[0])
            .await
            .unwrap();

        assert_eq!(id.runtime, "containerd");
        assert_eq!(id.id, "abc123");
    }

    #[tokio::test]
    async fn test_pod_status_resolver_fails_for_pending_container() {
        let pod = pod_with_status(&[]);
        assert!(PodStatusResolver
            .container_id(&pod, &pod.containers[0])
            .await
            .is_err());

        let pod = pod_with_status(&[("app", "")]);
        assert!(PodStatusResolver
            .container_id(&pod, &pod.containers[0])
            .await
            .is_err());
    }
}
