//! Matching scanned cgroup directories to pods

use super::PodPathIndex;
use crate::cgroup::{join_relative, CgroupPathConvention, Subsystem};
use crate::error::ReconcileError;
use crate::models::PodDescriptor;

/// A cgroup directory that belongs to a known pod
#[derive(Debug, Clone)]
pub struct PodMatch<'a> {
    pub pod: &'a PodDescriptor,
    /// Directory name, relative to the subtree root
    pub dir_name: String,
    subtree_root: String,
}

impl PodMatch<'_> {
    /// Pod cgroup path relative to the subsystem mount
    pub fn relative_path(&self) -> String {
        join_relative(&self.subtree_root, &self.dir_name)
    }
}

/// Find the pod owning `subtree_root/dir_name`
///
/// Returns [`ReconcileError::NotFound`] for directories without a pod,
/// which is routine for stale cgroups left behind by deleted pods.
pub fn resolve_pod_dir<'a>(
    subtree_root: &str,
    dir_name: &str,
    index: &'a PodPathIndex,
    paths: &dyn CgroupPathConvention,
) -> Result<PodMatch<'a>, ReconcileError> {
    let relative = join_relative(subtree_root, dir_name);
    let absolute = paths.absolute_path(Subsystem::Cpu, &relative);

    let pod = index
        .get(&absolute)
        .ok_or(ReconcileError::NotFound { path: absolute })?;

    Ok(PodMatch {
        pod,
        dir_name: dir_name.to_string(),
        subtree_root: subtree_root.to_string(),
    })
}
