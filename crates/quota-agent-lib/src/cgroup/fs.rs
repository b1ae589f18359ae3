//! cgroup v1 CPU bandwidth access through the mounted filesystem
//!
//! Reads and writes `cpu.cfs_quota_us` / `cpu.cfs_period_us` under the
//! legacy `cpu` controller hierarchy.

use super::{CgroupCpu, Subsystem};
use crate::error::CgroupError;
use crate::models::{CgroupResources, CpuStats};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

const CGROUP_CPU_QUOTA: &str = "cpu.cfs_quota_us";
const CGROUP_CPU_PERIOD: &str = "cpu.cfs_period_us";

/// Filesystem-backed CPU interface for the legacy hierarchy
pub struct CgroupV1Fs {
    /// Root of the cgroup mount (typically /sys/fs/cgroup)
    cgroup_root: PathBuf,
}

impl CgroupV1Fs {
    pub fn new(cgroup_root: impl Into<PathBuf>) -> Self {
        Self {
            cgroup_root: cgroup_root.into(),
        }
    }

    /// Directory of a cgroup inside the cpu controller
    pub fn cpu_path(&self, relative_path: &str) -> PathBuf {
        self.cgroup_root
            .join(Subsystem::Cpu.dir_name())
            .join(relative_path.trim_start_matches('/'))
    }

    async fn read_value(path: &Path) -> Result<String, CgroupError> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|source| CgroupError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(content.trim().to_string())
    }

    async fn write_value(path: &Path, value: impl ToString) -> Result<(), CgroupError> {
        fs::write(path, value.to_string())
            .await
            .map_err(|source| CgroupError::Io {
                path: path.to_path_buf(),
                source,
            })
    }
}

#[async_trait]
impl CgroupCpu for CgroupV1Fs {
    async fn is_unified(&self) -> bool {
        detect_cgroup_version(&self.cgroup_root).await == CgroupVersion::V2
    }

    async fn read_cpu(&self, relative_path: &str) -> Result<CpuStats, CgroupError> {
        let cgroup_path = self.cpu_path(relative_path);

        let quota_file = cgroup_path.join(CGROUP_CPU_QUOTA);
        let raw_quota = Self::read_value(&quota_file).await?;
        let cpu_quota = raw_quota.parse().map_err(|_| CgroupError::Parse {
            path: quota_file.clone(),
            value: raw_quota.clone(),
        })?;

        let period_file = cgroup_path.join(CGROUP_CPU_PERIOD);
        let raw_period = Self::read_value(&period_file).await?;
        let cpu_period = raw_period.parse().map_err(|_| CgroupError::Parse {
            path: period_file.clone(),
            value: raw_period.clone(),
        })?;

        Ok(CpuStats {
            cpu_quota,
            cpu_period,
        })
    }

    async fn write_cpu(
        &self,
        relative_path: &str,
        resources: &CgroupResources,
    ) -> Result<(), CgroupError> {
        let cgroup_path = self.cpu_path(relative_path);
        debug!(
            path = %cgroup_path.display(),
            cpu_quota = resources.cpu_quota,
            cpu_period = resources.cpu_period,
            "Writing cpu bandwidth"
        );

        // Zero means "leave unchanged" for both knobs.
        if resources.cpu_period != 0 {
            Self::write_value(&cgroup_path.join(CGROUP_CPU_PERIOD), resources.cpu_period).await?;
        }

        if resources.cpu_quota != 0 {
            Self::write_value(&cgroup_path.join(CGROUP_CPU_QUOTA), resources.cpu_quota).await?;
        }

        Ok(())
    }
}

/// Detect which cgroup version is mounted at `cgroup_root`
pub async fn detect_cgroup_version(cgroup_root: &Path) -> CgroupVersion {
    // cgroup.controllers only exists at the root of a unified hierarchy
    let v2_controllers = cgroup_root.join("cgroup.controllers");
    if fs::metadata(&v2_controllers).await.is_ok() {
        return CgroupVersion::V2;
    }

    let v1_cpu = cgroup_root.join(Subsystem::Cpu.dir_name());
    if fs::metadata(&v1_cpu).await.is_ok() {
        return CgroupVersion::V1;
    }

    CgroupVersion::Unknown
}

/// Cgroup version detected on the system
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CgroupVersion {
    V1,
    V2,
    Unknown,
}
