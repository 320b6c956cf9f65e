use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One tracked file, as produced by the repository scanner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    /// Absolute path used for reading and resolving
    pub path: PathBuf,
    /// Repository-relative path, forward-slash separated, unique within a scan
    pub relative_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_count: Option<usize>,
    /// Milliseconds since the UNIX epoch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<u64>,
}

impl FileRecord {
    pub fn new(path: impl Into<PathBuf>, relative_path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            relative_path: normalize_slashes(&relative_path.into()),
            size: None,
            line_count: None,
            last_modified: None,
        }
    }
}

/// Replace Windows separators so paths compare the same on every platform.
pub fn normalize_slashes(path: &str) -> String {
    path.replace('\\', "/")
}

/// Human-readable size, e.g. `"1.5 KB"`.
pub fn format_file_size(size: f64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = size;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}
