use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// What a [`Change`] does to its line span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Edit {
    /// Swap the inclusive span for these lines
    Replace(String),
    /// Put these lines before `line_start`
    Insert(String),
    /// Drop the inclusive span
    Delete,
}

/// One line-addressed edit.
///
/// Line numbers are 1-based, inclusive, and refer to the file as it was
/// before any change of the same batch was applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawChange", into = "RawChange")]
pub struct Change {
    pub line_start: u32,
    pub line_end: Option<u32>,
    /// Informational only
    pub original: String,
    /// Informational only
    pub reason: String,
    pub edit: Edit,
}

impl Change {
    pub fn replace(line_start: u32, line_end: u32, suggested: impl Into<String>) -> Self {
        Self::new(line_start, Some(line_end), Edit::Replace(suggested.into()))
    }

    pub fn insert(line_start: u32, suggested: impl Into<String>) -> Self {
        Self::new(line_start, None, Edit::Insert(suggested.into()))
    }

    pub fn delete(line_start: u32, line_end: u32) -> Self {
        Self::new(line_start, Some(line_end), Edit::Delete)
    }

    fn new(line_start: u32, line_end: Option<u32>, edit: Edit) -> Self {
        Self { line_start, line_end, original: String::new(), reason: String::new(), edit }
    }

    /// Last line of the span; an absent or zero `lineEnd` means `lineStart`.
    pub fn effective_line_end(&self) -> u32 {
        self.line_end.filter(|&end| end > 0).unwrap_or(self.line_start.max(1))
    }

    pub fn kind(&self) -> ChangeKind {
        match self.edit {
            Edit::Replace(_) => ChangeKind::Replace,
            Edit::Insert(_) => ChangeKind::Insert,
            Edit::Delete => ChangeKind::Delete,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Replace,
    Insert,
    Delete,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Replace => "replace",
            ChangeKind::Insert => "insert",
            ChangeKind::Delete => "delete",
        }
    }
}

/// Wire form `{type, lineStart, lineEnd, original, suggested, reason}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawChange {
    #[serde(rename = "type")]
    kind: ChangeKind,
    line_start: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    line_end: Option<u32>,
    #[serde(default)]
    original: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    suggested: Option<String>,
    #[serde(default)]
    reason: Option<String>,
}

impl TryFrom<RawChange> for Change {
    type Error = String;

    fn try_from(raw: RawChange) -> Result<Self, Self::Error> {
        let edit = match raw.kind {
            ChangeKind::Delete => Edit::Delete,
            kind => {
                let suggested = raw.suggested.ok_or_else(|| {
                    format!(
                        "{} change at line {} is missing \"suggested\"",
                        kind.as_str(),
                        raw.line_start
                    )
                })?;
                if kind == ChangeKind::Replace {
                    Edit::Replace(suggested)
                } else {
                    Edit::Insert(suggested)
                }
            }
        };
        Ok(Change {
            line_start: raw.line_start,
            line_end: raw.line_end,
            original: raw.original.unwrap_or_default(),
            reason: raw.reason.unwrap_or_default(),
            edit,
        })
    }
}

impl From<Change> for RawChange {
    fn from(change: Change) -> Self {
        let kind = change.kind();
        let suggested = match change.edit {
            Edit::Replace(s) | Edit::Insert(s) => Some(s),
            Edit::Delete => None,
        };
        RawChange {
            kind,
            line_start: change.line_start,
            line_end: change.line_end,
            original: Some(change.original),
            suggested,
            reason: Some(change.reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSuggestions {
    pub path: String,
    pub changes: Vec<Change>,
}

/// Validated edit proposals for a set of files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestions {
    pub files: Vec<FileSuggestions>,
    #[serde(default)]
    pub summary: String,
}

impl Suggestions {
    /// No files, with `summary` explaining why
    pub fn empty(summary: impl Into<String>) -> Self {
        Self { files: Vec::new(), summary: summary.into() }
    }

    pub fn change_count(&self) -> usize {
        self.files.iter().map(|f| f.changes.len()).sum()
    }

    /// Every change, paired with its file, in document order.
    pub fn flatten(&self) -> AppliedChanges {
        let changes = self
            .files
            .iter()
            .flat_map(|f| {
                f.changes.iter().map(|c| FileChange { file: f.path.clone(), change: c.clone() })
            })
            .collect();
        AppliedChanges { changes }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChange {
    pub file: String,
    pub change: Change,
}

/// Flattened, already-accepted edits as handed to the application engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedChanges {
    pub changes: Vec<FileChange>,
}

/// Changes grouped per file, files in first-appearance order.
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    files: Vec<(String, Vec<Change>)>,
}

impl ChangeSet {
    pub fn from_changes(changes: &[FileChange]) -> Self {
        let mut position: HashMap<&str, usize> = HashMap::new();
        let mut files: Vec<(String, Vec<Change>)> = Vec::new();
        for fc in changes {
            match position.get(fc.file.as_str()) {
                Some(&pos) => files[pos].1.push(fc.change.clone()),
                None => {
                    position.insert(fc.file.as_str(), files.len());
                    files.push((fc.file.clone(), vec![fc.change.clone()]));
                }
            }
        }
        Self { files }
    }

    pub fn entries(&self) -> &[(String, Vec<Change>)] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}
