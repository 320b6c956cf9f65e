//! Core utilities for vibegraph.
//!
//! This crate turns a JavaScript/TypeScript/Vue source tree into a file-level
//! dependency graph:
//! - Scanning the repository into ordered [`FileRecord`]s
//! - Extracting raw import strings from file contents (pattern or AST based)
//! - Resolving relative/root-absolute specifiers to tracked files
//! - Building the graph and its aggregate statistics
//! - Loading and persisting the per-repository configuration

mod collector;
mod config;
mod constants;
mod extractor;
mod graph;
mod parser;
mod resolver;
mod types;

// Re-export public API
pub use collector::scan_repository;
pub use config::{
    CONFIG_DIR, CONFIG_FILE, Config, ExtractorKind, MetadataOptions, config_path, find_git_root,
    init_config, toggle_debug,
};
pub use constants::{PATTERN_EXTENSIONS, RESOLVE_EXTENSIONS, TOP_NODE_LIMIT};
pub use extractor::{ImportExtractor, PatternExtractor, extractor_for, script_blocks};
pub use graph::{
    BuildResult, DependencyGraph, Diagnostic, EdgeKind, GraphEdge, GraphMetadata, GraphNode,
    NodeIndex, TopNode, build_dependency_graph,
};
pub use parser::AstExtractor;
pub use resolver::Resolver;
pub use types::{FileRecord, format_file_size, normalize_slashes};
