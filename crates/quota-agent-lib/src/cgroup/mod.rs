//! Kernel-facing cgroup interface
//!
//! The reconciler only talks to cgroups through the two traits defined here:
//! [`CgroupCpu`] for reading and writing CPU bandwidth, and
//! [`CgroupPathConvention`] for mapping pods and containers onto the
//! directory tree. Production implementations live in the submodules.

mod fs;
mod paths;

pub use fs::{detect_cgroup_version, CgroupV1Fs, CgroupVersion};
pub use paths::{CgroupDriver, KubepodsPaths};

use crate::error::CgroupError;
use crate::models::{CgroupResources, ContainerId, CpuStats, PodDescriptor};
use anyhow::Result;
use async_trait::async_trait;
use std::path::PathBuf;

/// cgroup v1 subsystem a path refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Subsystem {
    Cpu,
}

impl Subsystem {
    /// Directory name of the subsystem under the cgroup mount
    pub fn dir_name(&self) -> &'static str {
        match self {
            Subsystem::Cpu => "cpu",
        }
    }
}

/// CPU bandwidth primitives of the cgroup kernel interface
///
/// Paths are relative to the CPU subsystem mount.
#[async_trait]
pub trait CgroupCpu: Send + Sync {
    /// Whether the node runs the unified (v2) hierarchy
    async fn is_unified(&self) -> bool;

    /// Read the quota/period pair of a cgroup
    async fn read_cpu(&self, relative_path: &str) -> Result<CpuStats, CgroupError>;

    /// Write a quota/period pair to a cgroup
    async fn write_cpu(
        &self,
        relative_path: &str,
        resources: &CgroupResources,
    ) -> Result<(), CgroupError>;
}

/// Naming rules tying pods and containers to cgroup directories
pub trait CgroupPathConvention: Send + Sync {
    /// Absolute filesystem path of a relative cgroup path in `subsystem`
    fn absolute_path(&self, subsystem: Subsystem, relative_path: &str) -> PathBuf;

    /// Pod cgroup path relative to the subsystem mount
    fn pod_relative_path(&self, pod: &PodDescriptor) -> Result<String>;

    /// Container cgroup path relative to the subsystem mount
    fn container_relative_path(
        &self,
        pod: &PodDescriptor,
        container_id: &ContainerId,
    ) -> Result<String>;

    fn pod_absolute_path(&self, subsystem: Subsystem, pod: &PodDescriptor) -> Result<PathBuf> {
        let relative = self.pod_relative_path(pod)?;
        Ok(self.absolute_path(subsystem, &relative))
    }
}

/// Join two relative cgroup path fragments with a single separator
pub fn join_relative(parent: &str, child: &str) -> String {
    let parent = parent.trim_matches('/');
    let child = child.trim_matches('/');

    match (parent.is_empty(), child.is_empty()) {
        (true, _) => child.to_string(),
        (_, true) => parent.to_string(),
        _ => format!("{}/{}", parent, child),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_relative() {
        assert_eq!(join_relative("kubepods", "pod1"), "kubepods/pod1");
        assert_eq!(join_relative("/kubepods/burstable/", "/pod1"), "kubepods/burstable/pod1");
        assert_eq!(join_relative("", "pod1"), "pod1");
        assert_eq!(join_relative("kubepods", ""), "kubepods");
    }
}
