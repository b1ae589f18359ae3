//! CPU quota reconciliation for pods on the legacy cgroup hierarchy
//!
//! This crate provides the core functionality for:
//! - Reading and writing CFS bandwidth knobs on cgroup v1
//! - Mapping kubelet pod cgroup directories back to pods and containers
//! - Enforcing advisor-provided CPU quotas per container
//! - Health checks and observability

pub mod advisor;
pub mod cgroup;
pub mod error;
pub mod health;
pub mod inventory;
pub mod models;
pub mod observability;
pub mod reconcile;

pub use error::{CgroupError, EnforcementFailure, ReconcileError};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{ReconcilerMetrics, StructuredLogger};
pub use reconcile::{PassSummary, ReconcileLoop, ReconcileLoopBuilder, Reconciler};
