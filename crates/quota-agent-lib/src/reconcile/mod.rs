//! CPU quota reconciliation against the legacy cgroup hierarchy
//!
//! A pass walks the pod subtree of the cpu controller, matches each
//! directory to a pod from the inventory, maps the pod's containers to their
//! cgroups and rewrites each container's quota. Every mapping is rebuilt from
//! scratch on each pass.

mod containers;
mod driver;
mod enforcer;
mod index;
mod r#loop;
mod resolver;
mod scanner;


pub use containers::{build_container_path_map, ContainerPathMap};
pub use driver::{PassSummary, Reconciler, ReconcilerBuilder, DEFAULT_COLLABORATOR_TIMEOUT};
pub use enforcer::QuotaEnforcer;
pub use index::{build_pod_path_index, PodPathIndex};
pub use r#loop::{ReconcileLoop, ReconcileLoopBuilder, ReconcileLoopConfig};
pub use resolver::{resolve_pod_dir, PodMatch};
pub use scanner::list_subdirectories;
