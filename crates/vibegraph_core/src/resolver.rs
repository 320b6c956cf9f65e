use dashmap::DashMap;
use log::{debug, trace};
use path_clean::clean;
use std::path::{Path, PathBuf};

use crate::constants::RESOLVE_EXTENSIONS;

/// Maps raw import strings onto candidate files under one repository root.
///
/// Resolution is purely lexical plus existence probes; whether the candidate
/// is a tracked file is decided afterwards by [`crate::NodeIndex::lookup`].
/// Answers are memoized per `(importing directory, request)` and the memo is
/// safe to share across rayon workers.
pub struct Resolver {
    root: PathBuf,
    recognized_extensions: Vec<String>,
    cache: DashMap<(PathBuf, String), Option<PathBuf>>,
}

impl Resolver {
    /// `file_types` extends the built-in probe list with configured extensions
    /// that count as "already has an extension".
    pub fn new(root: impl Into<PathBuf>, file_types: &[String]) -> Self {
        let mut recognized_extensions: Vec<String> =
            RESOLVE_EXTENSIONS.iter().map(|e| e.to_string()).collect();
        for ext in file_types {
            if !recognized_extensions.contains(ext) {
                recognized_extensions.push(ext.clone());
            }
        }
        Self { root: root.into(), recognized_extensions, cache: DashMap::new() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of memoized answers
    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    /// Resolve `request` as written in `from_file`.
    ///
    /// Package specifiers (anything not starting with `.` or `/`) and requests
    /// that match no file on disk both yield `None`.
    pub fn resolve(&self, from_file: &Path, request: &str) -> Option<PathBuf> {
        if !request.starts_with('.') && !request.starts_with('/') {
            trace!("Skipping package specifier: '{}'", request);
            return None;
        }

        let from_dir = from_file.parent().unwrap_or(self.root.as_path());
        let key = (from_dir.to_path_buf(), request.to_string());
        if let Some(v) = self.cache.get(&key) {
            trace!("Cache hit for resolve: '{}' from {}", request, from_dir.display());
            return v.clone();
        }
        trace!("Resolving: '{}' from {}", request, from_file.display());

        let base = if request.starts_with('.') {
            from_dir.join(request)
        } else {
            // Root-anchored: '/src/a' means '<root>/src/a'
            self.root.join(request.trim_start_matches('/'))
        };
        let candidate = PathBuf::from(clean(&base));

        let resolved = if self.has_recognized_extension(&candidate) {
            trace!("Using '{}' as written: {}", request, candidate.display());
            Some(candidate)
        } else {
            self.probe(&candidate)
        };

        if resolved.is_none() {
            trace!("Failed to resolve '{}' from {}", request, from_file.display());
        }
        self.cache.insert(key, resolved.clone());
        resolved
    }

    fn has_recognized_extension(&self, p: &Path) -> bool {
        p.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| self.recognized_extensions.iter().any(|r| r.strip_prefix('.') == Some(e)))
    }

    fn probe(&self, p: &Path) -> Option<PathBuf> {
        // Try adding extensions
        for ext in RESOLVE_EXTENSIONS {
            let candidate = PathBuf::from(format!("{}{}", p.display(), ext));
            if candidate.is_file() {
                debug!("Resolved {} by extension probe", candidate.display());
                return Some(candidate);
            }
        }

        // Try index files
        for ext in RESOLVE_EXTENSIONS {
            let candidate = p.join(format!("index{}", ext));
            if candidate.is_file() {
                debug!("Resolved {} by index probe", candidate.display());
                return Some(candidate);
            }
        }

        None
    }
}
