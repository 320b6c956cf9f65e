use anyhow::{Context, Result, bail};
use log::{debug, info, warn};
use path_clean::clean;
use rayon::prelude::*;
use serde::Serialize;
use std::{
    fs,
    path::{Component, Path, PathBuf},
};

use crate::types::{Change, ChangeSet, Edit, FileChange};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplyFailure {
    pub file: String,
    pub message: String,
}

/// Outcome of one application batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApplyReport {
    /// Files rewritten successfully, in first-appearance order
    pub modified: Vec<String>,
    pub failed: Vec<ApplyFailure>,
}

impl ApplyReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Apply `changes` to the files they name, relative to `base_dir`.
///
/// Each file is read, edited bottom-up and written back by a single task;
/// a file that cannot be read or written, or whose name points outside
/// `base_dir`, is reported in `failed` and the other files are still
/// processed. Nothing is rolled back.
pub fn apply_changes(changes: &[FileChange], base_dir: &Path) -> ApplyReport {
    let set = ChangeSet::from_changes(changes);
    info!("Applying {} changes to {} files", changes.len(), set.len());

    let outcomes: Vec<(&str, Result<()>)> = set
        .entries()
        .par_iter()
        .map(|(file, file_changes)| (file.as_str(), apply_file(base_dir, file, file_changes)))
        .collect();

    let mut report = ApplyReport::default();
    for (file, outcome) in outcomes {
        match outcome {
            Ok(()) => {
                info!("Modified file: {}", file);
                report.modified.push(file.to_string());
            }
            Err(e) => {
                warn!("Error modifying file {}: {:#}", file, e);
                report.failed.push(ApplyFailure { file: file.to_string(), message: format!("{:#}", e) });
            }
        }
    }
    report
}

fn apply_file(base_dir: &Path, file: &str, changes: &[Change]) -> Result<()> {
    let full_path = target_path(base_dir, file)?;
    let content = fs::read_to_string(&full_path)
        .with_context(|| format!("Failed to read {}", full_path.display()))?;
    let updated = apply_to_text(&content, changes);
    fs::write(&full_path, updated)
        .with_context(|| format!("Failed to write {}", full_path.display()))?;
    debug!("Applied {} changes to {}", changes.len(), file);
    Ok(())
}

/// Location of `file` inside `base_dir`.
///
/// Leading separators are dropped, so `/src/a.js` names `<base_dir>/src/a.js`.
/// Names that still leave `base_dir` after `..` segments are cleaned are refused.
fn target_path(base_dir: &Path, file: &str) -> Result<PathBuf> {
    let relative = PathBuf::from(clean(file.trim_start_matches(['/', '\\'])));
    if matches!(
        relative.components().next(),
        Some(Component::ParentDir | Component::RootDir | Component::Prefix(_))
    ) {
        bail!("Refusing to modify {}: path leaves {}", file, base_dir.display());
    }
    Ok(base_dir.join(relative))
}

/// Apply `changes` to `content` and return the new text.
///
/// Lines are split and re-joined on `\n` only, so a trailing newline and
/// `\r` characters survive untouched. Changes run from the highest
/// `line_start` down, which keeps the numbering of pending changes valid;
/// changes sharing a `line_start` run in their given order.
pub fn apply_to_text(content: &str, changes: &[Change]) -> String {
    let mut lines: Vec<String> = content.split('\n').map(str::to_string).collect();

    let mut ordered: Vec<&Change> = changes.iter().collect();
    ordered.sort_by(|a, b| b.line_start.cmp(&a.line_start));
    for pair in ordered.windows(2) {
        if pair[0].line_start == pair[1].line_start {
            warn!(
                "Multiple changes start at line {}; applying them in input order",
                pair[0].line_start
            );
        }
    }

    for change in ordered {
        apply_one(&mut lines, change);
    }
    lines.join("\n")
}

fn apply_one(lines: &mut Vec<String>, change: &Change) {
    let len = lines.len();
    // Indices are clamped to the current line count; line 0 acts as line 1
    let start = (change.line_start.max(1) as usize - 1).min(len);
    let end = (change.effective_line_end() as usize).min(len).max(start);

    match &change.edit {
        Edit::Replace(suggested) => {
            lines.splice(start..end, suggested.split('\n').map(str::to_string));
        }
        Edit::Insert(suggested) => {
            lines.splice(start..start, suggested.split('\n').map(str::to_string));
        }
        Edit::Delete => {
            lines.drain(start..end);
        }
    }
}
