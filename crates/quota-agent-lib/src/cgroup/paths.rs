//! kubelet cgroup naming for pods and containers
//!
//! Supports both kubelet cgroup drivers:
//! - cgroupfs: `kubepods/burstable/pod<uid>/<container-id>`
//! - systemd: `kubepods.slice/kubepods-burstable.slice/kubepods-burstable-pod<uid>.slice/cri-containerd-<id>.scope`

use super::{join_relative, CgroupPathConvention, Subsystem};
use crate::models::{ContainerId, PodDescriptor, QosClass};
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::PathBuf;

/// Naming scheme kubelet uses for pod cgroups
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CgroupDriver {
    #[default]
    Cgroupfs,
    Systemd,
}

/// Path convention for pods managed by kubelet
#[derive(Debug, Clone)]
pub struct KubepodsPaths {
    cgroup_root: PathBuf,
    driver: CgroupDriver,
}

impl KubepodsPaths {
    pub fn new(cgroup_root: impl Into<PathBuf>, driver: CgroupDriver) -> Self {
        Self {
            cgroup_root: cgroup_root.into(),
            driver,
        }
    }

    fn qos_segment(qos: QosClass) -> Option<&'static str> {
        match qos {
            QosClass::Guaranteed => None,
            QosClass::Burstable => Some("burstable"),
            QosClass::BestEffort => Some("besteffort"),
        }
    }

    fn systemd_scope_prefix(runtime: &str) -> &str {
        match runtime {
            "containerd" => "cri-containerd",
            "cri-o" => "crio",
            other => other,
        }
    }
}

impl CgroupPathConvention for KubepodsPaths {
    fn absolute_path(&self, subsystem: Subsystem, relative_path: &str) -> PathBuf {
        self.cgroup_root
            .join(subsystem.dir_name())
            .join(relative_path.trim_start_matches('/'))
    }

    fn pod_relative_path(&self, pod: &PodDescriptor) -> Result<String> {
        if pod.uid.is_empty() {
            bail!("pod {} has no uid", pod.key());
        }
        let qos = pod
            .qos_class
            .with_context(|| format!("pod {} has no qos class", pod.key()))?;

        let path = match (self.driver, Self::qos_segment(qos)) {
            (CgroupDriver::Cgroupfs, None) => format!("kubepods/pod{}", pod.uid),
            (CgroupDriver::Cgroupfs, Some(segment)) => {
                format!("kubepods/{}/pod{}", segment, pod.uid)
            }
            (CgroupDriver::Systemd, None) => {
                format!("kubepods.slice/kubepods-pod{}.slice", pod.uid.replace('-', "_"))
            }
            (CgroupDriver::Systemd, Some(segment)) => format!(
                "kubepods.slice/kubepods-{segment}.slice/kubepods-{segment}-pod{}.slice",
                pod.uid.replace('-', "_"),
            ),
        };

        Ok(path)
    }

    fn container_relative_path(
        &self,
        pod: &PodDescriptor,
        container_id: &ContainerId,
    ) -> Result<String> {
        let pod_path = self.pod_relative_path(pod)?;

        let leaf = match self.driver {
            CgroupDriver::Cgroupfs => container_id.id.clone(),
            CgroupDriver::Systemd => format!(
                "{}-{}.scope",
                Self::systemd_scope_prefix(&container_id.runtime),
                container_id.id
            ),
        };

        Ok(join_relative(&pod_path, &leaf))
    }
}
