use anyhow::Result;
use ignore::WalkBuilder;
use log::{debug, trace, warn};
use std::{fs, path::Path, time::UNIX_EPOCH};

use crate::{
    config::Config,
    types::{FileRecord, normalize_slashes},
};

/// Walk `root` and return one record per tracked file.
///
/// Entries are visited in file-name order so repeated scans of an unchanged
/// tree produce the same record order (and therefore the same node ids).
pub fn scan_repository(root: &Path, cfg: &Config) -> Result<Vec<FileRecord>> {
    debug!("Scanning repository at: {}", root.display());
    let exclude_dirs = cfg.exclude_dirs.clone();
    let walker = WalkBuilder::new(root)
        .hidden(false)
        .ignore(true)
        .git_ignore(true)
        .sort_by_file_name(|a, b| a.cmp(b))
        .filter_entry(move |entry| {
            let is_dir = entry.file_type().is_some_and(|ft| ft.is_dir());
            if entry.depth() == 0 || !is_dir {
                return true;
            }
            let name = entry.file_name().to_string_lossy();
            !exclude_dirs.iter().any(|d| *d == name)
        })
        .build();

    let mut records = Vec::new();
    for res in walker {
        let dent = match res {
            Ok(dent) => dent,
            Err(e) => {
                warn!("Error scanning entry: {}", e);
                continue;
            }
        };
        let p = dent.path();
        if !p.is_file() {
            continue;
        }

        let Some(ext) = p.extension().and_then(|e| e.to_str()) else {
            continue;
        };
        if !cfg.tracks_extension(&format!(".{}", ext)) {
            continue;
        }

        let relative = p.strip_prefix(root).unwrap_or(p);
        let mut record =
            FileRecord::new(p.to_path_buf(), normalize_slashes(&relative.to_string_lossy()));
        trace!("Found tracked file: {}", record.relative_path);

        if cfg.metadata.show_file_size || cfg.metadata.show_last_modified {
            match fs::metadata(p) {
                Ok(meta) => {
                    if cfg.metadata.show_file_size {
                        record.size = Some(meta.len());
                    }
                    if cfg.metadata.show_last_modified {
                        record.last_modified = meta
                            .modified()
                            .ok()
                            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                            .map(|d| d.as_millis() as u64);
                    }
                }
                Err(e) => warn!("Failed to stat {}: {}", p.display(), e),
            }
        }

        if cfg.metadata.show_line_count {
            record.line_count = Some(match fs::read_to_string(p) {
                Ok(content) => content.split('\n').count(),
                Err(_) => 0,
            });
        }

        records.push(record);
    }

    debug!("Collected {} files", records.len());
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MetadataOptions;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn create_test_file(dir: &Path, path: &str, content: &str) -> PathBuf {
        let file_path = dir.join(path);
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        fs::write(&file_path, content).expect("Failed to write test file");
        file_path
    }

    #[test]
    fn test_scan_filters_by_extension_and_excluded_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        create_test_file(root, "src/a.js", "// a");
        create_test_file(root, "src/b.ts", "// b");
        create_test_file(root, "src/view.vue", "<template></template>");
        create_test_file(root, "src/readme.md", "# docs");
        create_test_file(root, "node_modules/pkg/index.js", "// dep");
        create_test_file(root, "dist/bundle.js", "// built");

        let records = scan_repository(root, &Config::default()).unwrap();
        let rel: Vec<_> = records.iter().map(|r| r.relative_path.as_str()).collect();
        assert_eq!(rel, vec!["src/a.js", "src/b.ts", "src/view.vue"]);
    }

    #[test]
    fn test_scan_order_is_stable() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        create_test_file(root, "z.js", "");
        create_test_file(root, "a.js", "");
        create_test_file(root, "m/index.js", "");

        let first = scan_repository(root, &Config::default()).unwrap();
        let second = scan_repository(root, &Config::default()).unwrap();
        assert_eq!(first, second);
        let rel: Vec<_> = first.iter().map(|r| r.relative_path.as_str()).collect();
        assert_eq!(rel, vec!["a.js", "m/index.js", "z.js"]);
    }

    #[test]
    fn test_scan_fills_metadata() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        create_test_file(root, "a.js", "one\ntwo\nthree");

        let records = scan_repository(root, &Config::default()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].size, Some(13));
        assert_eq!(records[0].line_count, Some(3));
        assert!(records[0].last_modified.is_some());
        assert!(records[0].path.is_absolute());
    }

    #[test]
    fn test_scan_respects_metadata_toggles() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        create_test_file(root, "a.js", "one\ntwo");

        let cfg = Config {
            metadata: MetadataOptions {
                show_line_count: false,
                show_file_size: false,
                show_last_modified: false,
            },
            ..Config::default()
        };
        let records = scan_repository(root, &cfg).unwrap();
        assert_eq!(records[0].size, None);
        assert_eq!(records[0].line_count, None);
        assert_eq!(records[0].last_modified, None);
    }
}
