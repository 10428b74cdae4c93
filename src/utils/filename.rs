use std::path::{Path, PathBuf};

use crate::models::Frequency;

/// Aggregated table path: `{output_root}/{variable}/{variable}_{frequency}.parquet`
pub fn aggregate_filename(output_root: &Path, variable: &str, frequency: Frequency) -> PathBuf {
    output_root
        .join(variable)
        .join(format!("{}_{}.parquet", variable, frequency.suffix()))
}

/// Resolve a pipeline directory against the workspace files root.
///
/// Absolute paths are returned unchanged.
pub fn workspace_path(files_root: &Path, dir: &Path) -> PathBuf {
    if dir.is_absolute() {
        dir.to_path_buf()
    } else {
        files_root.join(dir)
    }
}

/// Lowercased extension of a file name, if any.
pub fn extension_of(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
}
