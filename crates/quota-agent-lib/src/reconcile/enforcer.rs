//! Per-container CPU quota enforcement
//!
//! CPU bandwidth is a quota/period pair and the period is configured per
//! cgroup, so every target is re-expressed against the period the container's
//! cgroup currently uses before it is written back.

use crate::cgroup::CgroupCpu;
use crate::error::CgroupError;
use crate::models::{
    CgroupResources, ContainerResources, CpuStats, DEFAULT_CPU_PERIOD_US, MIN_CPU_QUOTA_US,
};
use std::sync::Arc;
use tracing::debug;

/// Reads, recomputes and writes container CPU quotas
#[derive(Clone)]
pub struct QuotaEnforcer {
    cgroup: Arc<dyn CgroupCpu>,
}

impl QuotaEnforcer {
    pub fn new(cgroup: Arc<dyn CgroupCpu>) -> Self {
        Self { cgroup }
    }

    /// Bring the container cgroup at `relative_path` in line with `target`
    ///
    /// The write is issued even when the computed value matches what was
    /// read, since the read may race with the container runtime. Returns the
    /// values written.
    pub async fn enforce(
        &self,
        relative_path: &str,
        container: &ContainerResources,
        target: &CgroupResources,
    ) -> Result<CgroupResources, CgroupError> {
        let current = self.cgroup.read_cpu(relative_path).await?;
        let desired = Self::compute_quota(&current, container, target);

        debug!(
            relative_path = %relative_path,
            current_quota = current.cpu_quota,
            current_period = current.cpu_period,
            quota = desired.cpu_quota,
            period = desired.cpu_period,
            "Applying cpu quota"
        );

        self.cgroup.write_cpu(relative_path, &desired).await?;
        Ok(desired)
    }

    /// Quota/period pair to write for a container
    ///
    /// The advisor target is rescaled to the container's period and never
    /// cut below the container's CPU request. The container's own CPU limit
    /// caps the result. With neither a target nor a limit the container is
    /// left unlimited. Any bound is floored at the kernel minimum, so a
    /// bounded container never ends up with a zero quota.
    pub fn compute_quota(
        current: &CpuStats,
        container: &ContainerResources,
        target: &CgroupResources,
    ) -> CgroupResources {
        let period = if current.cpu_period > 0 {
            current.cpu_period
        } else {
            DEFAULT_CPU_PERIOD_US
        };

        let request_bound = millis_to_quota(container.cpu_request_millis, period);
        let target_bound = (target.cpu_quota > 0).then(|| {
            rescale(target.cpu_quota, target.effective_period(), period)
                .max(request_bound)
                .max(MIN_CPU_QUOTA_US)
        });
        let limit_bound = container
            .cpu_limit_millis
            .filter(|millis| *millis > 0)
            .map(|millis| millis_to_quota(millis, period).max(MIN_CPU_QUOTA_US));

        let quota = match (target_bound, limit_bound) {
            (Some(target), Some(limit)) => target.min(limit),
            (Some(bound), None) | (None, Some(bound)) => bound,
            (None, None) => -1,
        };

        CgroupResources {
            cpu_quota: quota,
            cpu_period: period,
        }
    }
}

/// Quota for `millis` millicores at `period`
fn millis_to_quota(millis: u64, period: u64) -> i64 {
    rescale(i64::try_from(millis).unwrap_or(i64::MAX), 1000, period)
}

/// Re-express `value` per `from` microseconds as a value per `to` microseconds
fn rescale(value: i64, from: u64, to: u64) -> i64 {
    let scaled = i128::from(value) * i128::from(to) / i128::from(from.max(1));
    i64::try_from(scaled).unwrap_or(i64::MAX)
}
