use anyhow::{Context, Result, anyhow};
use log::{debug, error, info, trace};
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
};

/// Directory holding per-repository settings, relative to the repository root
pub const CONFIG_DIR: &str = ".vibegraph";

/// Settings file name inside [`CONFIG_DIR`]
pub const CONFIG_FILE: &str = "config.json";

/// Which import extractor the graph builder runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractorKind {
    /// Line-agnostic regular expressions over the raw text
    #[default]
    Pattern,
    /// oxc parser over the text (or over Vue script blocks)
    Ast,
}

/// Which optional metadata the scanner fills into each record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MetadataOptions {
    pub show_line_count: bool,
    pub show_file_size: bool,
    pub show_last_modified: bool,
}

impl Default for MetadataOptions {
    fn default() -> Self {
        Self { show_line_count: true, show_file_size: true, show_last_modified: true }
    }
}

/// Settings threaded through scanning, extraction and resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Directory names pruned from the scan wherever they appear
    pub exclude_dirs: Vec<String>,
    /// Tracked file extensions, with leading dot
    pub file_types: Vec<String>,
    pub debug_mode: bool,
    pub metadata: MetadataOptions,
    pub extractor: ExtractorKind,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            exclude_dirs: ["node_modules", ".git", CONFIG_DIR, "dist", "build"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            file_types: [".js", ".jsx", ".ts", ".tsx", ".vue"].iter().map(|s| s.to_string()).collect(),
            debug_mode: false,
            metadata: MetadataOptions::default(),
            extractor: ExtractorKind::default(),
        }
    }
}

impl Config {
    /// Load settings for `root`, falling back to defaults.
    ///
    /// A missing file and a malformed file both yield [`Config::default`];
    /// keys absent from the file keep their default values.
    pub fn load(root: &Path) -> Config {
        let path = config_path(root);
        trace!("Loading config from: {:?}", path);

        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(_) => {
                info!("No config file found at {}, using default settings", path.display());
                return Config::default();
            }
        };

        match serde_json::from_str::<Config>(&content) {
            Ok(cfg) => {
                debug!("Loaded config: {:?}", cfg);
                cfg
            }
            Err(e) => {
                error!("Failed to parse config {}: {}", path.display(), e);
                Config::default()
            }
        }
    }

    /// Write these settings to `root`, creating the settings directory if needed.
    pub fn save(&self, root: &Path) -> Result<PathBuf> {
        let dir = root.join(CONFIG_DIR);
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
        let path = dir.join(CONFIG_FILE);
        let json = serde_json::to_string_pretty(self)?;
        fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))?;
        debug!("Saved config to {}", path.display());
        Ok(path)
    }

    /// Whether `extension` (with leading dot) is one of the tracked file types
    pub fn tracks_extension(&self, extension: &str) -> bool {
        self.file_types.iter().any(|t| t == extension)
    }
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_DIR).join(CONFIG_FILE)
}

/// Write the default settings file under `root`, overwriting any existing one.
pub fn init_config(root: &Path) -> Result<PathBuf> {
    Config::default().save(root)
}

/// Flip `debugMode` in the settings file and return the new value.
pub fn toggle_debug(root: &Path) -> Result<bool> {
    let mut cfg = Config::load(root);
    cfg.debug_mode = !cfg.debug_mode;
    cfg.save(root)?;
    Ok(cfg.debug_mode)
}

pub fn find_git_root() -> Result<PathBuf> {
    debug!("Searching for git root");
    let mut current_dir = env::current_dir()?;
    trace!("Starting search from: {:?}", current_dir);

    loop {
        let git_dir = current_dir.join(".git");
        trace!("Checking for .git at: {:?}", git_dir);
        if git_dir.exists() {
            debug!("Found git root at: {:?}", current_dir);
            return Ok(current_dir);
        }

        // Try to move up to parent directory
        match current_dir.parent() {
            Some(parent) => current_dir = parent.to_path_buf(),
            None => {
                debug!("Could not find .git directory in any parent folder");
                return Err(anyhow!("Could not find .git directory in any parent folder"));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
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
    fn test_find_git_root() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        fs::create_dir_all(root.join(".git")).unwrap();
        let subdir = root.join("src").join("components");
        fs::create_dir_all(&subdir).unwrap();

        let original_dir = env::current_dir().unwrap();
        env::set_current_dir(&subdir).unwrap();

        let git_root = find_git_root().unwrap();
        // Normalize paths for comparison (canonicalize can add /private prefix on macOS)
        assert_eq!(git_root.canonicalize().unwrap(), root.canonicalize().unwrap());

        env::set_current_dir(original_dir).unwrap();
    }

    #[test]
    fn test_load_missing_config_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let cfg = Config::load(temp_dir.path());
        assert_eq!(cfg, Config::default());
        assert!(cfg.tracks_extension(".vue"));
        assert!(cfg.exclude_dirs.contains(&"node_modules".to_string()));
    }

    #[test]
    fn test_load_partial_config_keeps_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        create_test_file(
            root,
            ".vibegraph/config.json",
            r#"{ "debugMode": true, "metadata": { "showFileSize": false }, "extractor": "ast" }"#,
        );

        let cfg = Config::load(root);
        assert!(cfg.debug_mode);
        assert!(!cfg.metadata.show_file_size);
        assert!(cfg.metadata.show_line_count);
        assert_eq!(cfg.extractor, ExtractorKind::Ast);
        assert_eq!(cfg.file_types, Config::default().file_types);
    }

    #[test]
    fn test_load_malformed_config_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        create_test_file(root, ".vibegraph/config.json", "{ not json");

        assert_eq!(Config::load(root), Config::default());
    }

    #[test]
    fn test_init_and_toggle_debug() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        let path = init_config(root).unwrap();
        assert!(path.exists());
        assert_eq!(path, config_path(root));

        assert!(toggle_debug(root).unwrap());
        assert!(Config::load(root).debug_mode);
        assert!(!toggle_debug(root).unwrap());
        assert!(!Config::load(root).debug_mode);
    }

    #[test]
    fn test_config_round_trips_camel_case_keys() {
        let json = serde_json::to_value(Config::default()).unwrap();
        assert!(json.get("excludeDirs").is_some());
        assert!(json.get("fileTypes").is_some());
        assert_eq!(json["metadata"]["showLastModified"], true);
        assert_eq!(json["extractor"], "pattern");
    }
}
