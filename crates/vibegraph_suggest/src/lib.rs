//! Suggestion handling for vibegraph.
//!
//! - Typed, line-addressed [`Change`]s and their JSON wire form
//! - Parsing free-form generated text into validated [`Suggestions`]
//! - Applying accepted changes to files on disk
//! - Rendering selected graph nodes into a refactoring request

mod apply;
mod prompt;
mod suggestions;
mod types;

pub use apply::{ApplyFailure, ApplyReport, apply_changes, apply_to_text};
pub use prompt::{SelectedFile, Selection, export_prompt, load_selection, save_selection};
pub use suggestions::{UNPARSEABLE_SUMMARY, load_suggestions, parse_suggestions, save_suggestions};
pub use types::{
    AppliedChanges, Change, ChangeKind, ChangeSet, Edit, FileChange, FileSuggestions, Suggestions,
};
