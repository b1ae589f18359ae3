//! Advisor-supplied quota targets
//!
//! The advisor publishes one [`CalculationInfo`] per cgroup subtree it wants
//! bounded. The agent re-reads the targets before every pass.

use crate::models::CalculationInfo;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;

/// Source of the current advisor targets
#[async_trait]
pub trait TargetSource: Send + Sync {
    async fn targets(&self) -> Result<Vec<CalculationInfo>>;
}

/// Reads a JSON array of calculations from disk
pub struct FileTargetSource {
    path: PathBuf,
}

impl FileTargetSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl TargetSource for FileTargetSource {
    async fn targets(&self) -> Result<Vec<CalculationInfo>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            // No file yet means the advisor has nothing to enforce.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", self.path.display()))
            }
        };

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse advisor targets {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_file_target_source() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("targets.json");
        tokio::fs::write(
            &path,
            r#"[{
                "cgroup_path": "kubepods/besteffort",
                "calculation_result": {"values": {"cgroup_config": "{\"cpu_quota\":200000}"}}
            }]"#,
        )
        .await
        .unwrap();

        let targets = FileTargetSource::new(&path).targets().await.unwrap();
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].cgroup_path, "kubepods/besteffort");

        let resources = targets[0].cgroup_resources().unwrap().unwrap();
        assert_eq!(resources.cpu_quota, 200_000);
        assert_eq!(resources.cpu_period, 0);
    }

    #[tokio::test]
    async fn test_missing_file_means_no_targets() {
        let temp_dir = TempDir::new().unwrap();
        let source = FileTargetSource::new(temp_dir.path().join("absent.json"));
        assert!(source.targets().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_file_is_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("targets.json");
        tokio::fs::write(&path, "{").await.unwrap();

        assert!(FileTargetSource::new(&path).targets().await.is_err());
    }
}
