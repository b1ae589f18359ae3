//! Container cgroup paths within a resolved pod

use crate::cgroup::CgroupPathConvention;
use crate::inventory::ContainerIdResolver;
use crate::models::{ContainerDescriptor, PodDescriptor};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

/// Containers of one pod keyed by their relative cgroup path
pub type ContainerPathMap<'a> = BTreeMap<String, &'a ContainerDescriptor>;

/// Map every started container of `pod` to its cgroup path
///
/// Containers that cannot be resolved yet (not started, runtime slow to
/// answer) are left out of the map.
pub async fn build_container_path_map<'a>(
    pod: &'a PodDescriptor,
    resolver: &dyn ContainerIdResolver,
    paths: &dyn CgroupPathConvention,
    timeout: Duration,
) -> ContainerPathMap<'a> {
    let mut map = ContainerPathMap::new();

    for container in &pod.containers {
        let container_id =
            match tokio::time::timeout(timeout, resolver.container_id(pod, container)).await {
                Ok(Ok(id)) => id,
                Ok(Err(e)) => {
                    debug!(pod = %pod.key(), container = %container.name, error = %e, "Container id not resolved");
                    continue;
                }
                Err(_) => {
                    debug!(pod = %pod.key(), container = %container.name, "Container id resolution timed out");
                    continue;
                }
            };

        match paths.container_relative_path(pod, &container_id) {
            Ok(path) => {
                map.insert(path, container);
            }
            Err(e) => {
                debug!(pod = %pod.key(), container = %container.name, error = %e, "Container cgroup path not resolved");
            }
        }
    }

    map
}
