//! Directory listing for the pod subtree

use crate::error::ReconcileError;
use std::path::Path;
use tokio::fs;

/// Names of the immediate subdirectories of `path`, in no particular order
///
/// Plain files (the cgroup control files) are skipped.
pub async fn list_subdirectories(path: &Path) -> Result<Vec<String>, ReconcileError> {
    let io_error = |source: std::io::Error| ReconcileError::Io {
        path: path.to_path_buf(),
        source,
    };

    let mut entries = fs::read_dir(path).await.map_err(io_error)?;
    let mut dirs = Vec::new();

    while let Some(entry) = entries.next_entry().await.map_err(io_error)? {
        // An entry can vanish between listing and stat; treat it as gone.
        if let Ok(file_type) = entry.file_type().await {
            if file_type.is_dir() {
                dirs.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
    }

    Ok(dirs)
}
