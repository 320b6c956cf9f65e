use log::{debug, info, trace, warn};
use path_clean::clean;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, HashMap},
    fs,
    path::{Path, PathBuf},
};

use crate::{
    config::Config,
    constants::TOP_NODE_LIMIT,
    extractor::{ImportExtractor, extractor_for},
    resolver::Resolver,
    types::{FileRecord, format_file_size, normalize_slashes},
};

/// One tracked file in the graph; `id` equals its position in `nodes`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphNode {
    pub id: usize,
    /// Repository-relative path
    pub name: String,
    pub path: PathBuf,
    pub basename: String,
    /// Containing directory, `"."` for files at the root
    pub directory: String,
    /// Depth of `directory`, used for presentation only
    pub group: usize,
    /// Extension with leading dot, empty when the file has none
    pub extension: String,
    pub language: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_formatted: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<u64>,
}

impl GraphNode {
    pub fn from_record(id: usize, record: &FileRecord) -> Self {
        let name = record.relative_path.clone();
        let (directory, basename) = match name.rsplit_once('/') {
            Some((dir, base)) => (dir.to_string(), base.to_string()),
            None => (".".to_string(), name.clone()),
        };
        let extension = extension_of(&basename).to_string();
        let language = extension.trim_start_matches('.').to_string();

        Self {
            id,
            group: directory.split('/').count(),
            name,
            path: record.path.clone(),
            basename,
            directory,
            extension,
            language,
            size: record.size.filter(|&s| s > 0),
            size_formatted: record.size.map(|s| format_file_size(s as f64)),
            line_count: record.line_count.filter(|&l| l > 0),
            last_modified: record.last_modified.filter(|&t| t > 0),
        }
    }
}

/// Extension of a file name including the dot; dotfiles like `.eslintrc` have none.
fn extension_of(basename: &str) -> &str {
    match basename.rfind('.') {
        Some(idx) if idx > 0 => &basename[idx..],
        _ => "",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKind {
    Import,
}

/// Directed edge from an importing file to the file it imports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub source: usize,
    pub target: usize,
    #[serde(rename = "type")]
    pub kind: EdgeKind,
    pub value: u32,
}

impl GraphEdge {
    pub fn import(source: usize, target: usize) -> Self {
        Self { source, target, kind: EdgeKind::Import, value: 1 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopNode {
    pub file: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphMetadata {
    pub total_files: usize,
    pub files_by_type: BTreeMap<String, usize>,
    pub files_by_directory: BTreeMap<String, usize>,
    pub average_file_size: f64,
    pub average_line_count: f64,
    pub total_imports: usize,
    pub average_imports_per_file: f64,
    pub most_imported: Vec<TopNode>,
    pub most_importing: Vec<TopNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyGraph {
    pub nodes: Vec<GraphNode>,
    pub links: Vec<GraphEdge>,
    pub metadata: GraphMetadata,
}

impl DependencyGraph {
    pub fn node(&self, id: usize) -> Option<&GraphNode> {
        self.nodes.get(id)
    }

    /// Targets of the edges leaving `id`, in edge order
    pub fn imports_of(&self, id: usize) -> Vec<usize> {
        self.links.iter().filter(|l| l.source == id).map(|l| l.target).collect()
    }

    /// Sources of the edges entering `id`, in edge order
    pub fn importers_of(&self, id: usize) -> Vec<usize> {
        self.links.iter().filter(|l| l.target == id).map(|l| l.source).collect()
    }
}

/// A file that could not be analyzed; the build continues without its edges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub path: String,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct BuildResult {
    pub graph: DependencyGraph,
    pub diagnostics: Vec<Diagnostic>,
}

/// Lookup table from file identity to node id.
///
/// Every record is reachable through two keys: its cleaned absolute path and
/// its repository-relative path, both with forward slashes.
#[derive(Debug, Default)]
pub struct NodeIndex {
    by_key: HashMap<String, usize>,
}

impl NodeIndex {
    pub fn from_records(records: &[FileRecord]) -> Self {
        let mut by_key = HashMap::with_capacity(records.len() * 2);
        for (id, record) in records.iter().enumerate() {
            by_key.insert(record.relative_path.clone(), id);
            by_key.insert(absolute_key(&record.path), id);
        }
        Self { by_key }
    }

    /// Absolute-path key first, then the path relative to `root`.
    pub fn lookup(&self, resolved: &Path, root: &Path) -> Option<usize> {
        if let Some(id) = self.by_key.get(&absolute_key(resolved)) {
            return Some(*id);
        }
        let relative = resolved.strip_prefix(root).ok()?;
        self.by_key.get(&normalize_slashes(&relative.to_string_lossy())).copied()
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }
}

fn absolute_key(path: &Path) -> String {
    normalize_slashes(&PathBuf::from(clean(path)).to_string_lossy())
}

/// Build the file-level dependency graph for `records`.
///
/// Node ids follow record order. Files are analyzed in parallel but their
/// edges are concatenated in record order, so the same records and contents
/// always produce the same graph. Unreadable files become diagnostics.
pub fn build_dependency_graph(records: &[FileRecord], root: &Path, cfg: &Config) -> BuildResult {
    info!("Building dependency graph for {} files", records.len());

    // Pass 1: nodes and lookup table, complete before any resolution
    let nodes: Vec<GraphNode> =
        records.iter().enumerate().map(|(id, r)| GraphNode::from_record(id, r)).collect();
    let index = NodeIndex::from_records(records);
    trace!("Node index holds {} keys", index.len());

    // Pass 2: per-file extraction and resolution
    let extractor = extractor_for(cfg.extractor);
    let resolver = Resolver::new(root, &cfg.file_types);
    let per_file: Vec<Result<Vec<GraphEdge>, Diagnostic>> = records
        .par_iter()
        .enumerate()
        .map(|(source, record)| link_file(source, record, extractor.as_ref(), &resolver, &index))
        .collect();

    let mut links = Vec::new();
    let mut diagnostics = Vec::new();
    for outcome in per_file {
        match outcome {
            Ok(edges) => links.extend(edges),
            Err(diag) => diagnostics.push(diag),
        }
    }
    debug!("Resolver memoized {} lookups", resolver.cache_len());

    let metadata = compute_metadata(records, &nodes, &links);
    info!(
        "Graph built: {} nodes, {} links, {} unreadable files",
        nodes.len(),
        links.len(),
        diagnostics.len()
    );

    BuildResult { graph: DependencyGraph { nodes, links, metadata }, diagnostics }
}

fn link_file(
    source: usize,
    record: &FileRecord,
    extractor: &dyn ImportExtractor,
    resolver: &Resolver,
    index: &NodeIndex,
) -> Result<Vec<GraphEdge>, Diagnostic> {
    let content = fs::read_to_string(&record.path).map_err(|e| {
        warn!("Error analyzing file {}: {}", record.path.display(), e);
        Diagnostic { path: record.relative_path.clone(), message: e.to_string() }
    })?;

    let extension = record
        .relative_path
        .rsplit('/')
        .next()
        .map(extension_of)
        .unwrap_or_default();
    let imports = extractor.extract(&content, extension);
    debug!("Found {} imports in {}", imports.len(), record.relative_path);

    let mut edges = Vec::new();
    for request in &imports {
        let Some(resolved) = resolver.resolve(&record.path, request) else {
            continue;
        };
        match index.lookup(&resolved, resolver.root()) {
            Some(target) => {
                trace!("Added link: {} -> {}", record.relative_path, resolved.display());
                edges.push(GraphEdge::import(source, target));
            }
            None => trace!("'{}' resolved to untracked file {}", request, resolved.display()),
        }
    }
    Ok(edges)
}

fn compute_metadata(records: &[FileRecord], nodes: &[GraphNode], links: &[GraphEdge]) -> GraphMetadata {
    let mut files_by_type = BTreeMap::new();
    let mut files_by_directory = BTreeMap::new();
    for node in nodes {
        *files_by_type.entry(node.extension.clone()).or_insert(0) += 1;
        *files_by_directory.entry(node.directory.clone()).or_insert(0) += 1;
    }

    // Zero sizes and line counts count as unknown
    let sizes: Vec<f64> =
        records.iter().filter_map(|r| r.size).filter(|&s| s > 0).map(|s| s as f64).collect();
    let lines: Vec<f64> =
        records.iter().filter_map(|r| r.line_count).filter(|&l| l > 0).map(|l| l as f64).collect();

    GraphMetadata {
        total_files: records.len(),
        files_by_type,
        files_by_directory,
        average_file_size: mean(&sizes),
        average_line_count: mean(&lines),
        total_imports: links.len(),
        average_imports_per_file: if records.is_empty() {
            0.0
        } else {
            links.len() as f64 / records.len() as f64
        },
        most_imported: top_nodes(links.iter().map(|l| l.target), nodes),
        most_importing: top_nodes(links.iter().map(|l| l.source), nodes),
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() { 0.0 } else { values.iter().sum::<f64>() / values.len() as f64 }
}

/// Highest counts first; equal counts keep ascending node-id order.
fn top_nodes(ids: impl Iterator<Item = usize>, nodes: &[GraphNode]) -> Vec<TopNode> {
    let mut counts = vec![0usize; nodes.len()];
    for id in ids {
        if let Some(count) = counts.get_mut(id) {
            *count += 1;
        }
    }

    let mut ranked: Vec<(usize, usize)> =
        counts.into_iter().enumerate().filter(|&(_, count)| count > 0).collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked
        .into_iter()
        .take(TOP_NODE_LIMIT)
        .map(|(id, count)| TopNode { file: nodes[id].name.clone(), count })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{collector::scan_repository, config::ExtractorKind};
    use tempfile::TempDir;

    fn create_test_file(dir: &Path, path: &str, content: &str) -> PathBuf {
        let file_path = dir.join(path);
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        fs::write(&file_path, content).expect("Failed to write test file");
        file_path
    }

    fn build(root: &Path) -> BuildResult {
        let cfg = Config::default();
        let records = scan_repository(root, &cfg).unwrap();
        build_dependency_graph(&records, root, &cfg)
    }

    fn id_of(graph: &DependencyGraph, name: &str) -> usize {
        graph.nodes.iter().find(|n| n.name == name).map(|n| n.id).unwrap()
    }

    #[test]
    fn test_two_file_graph() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        create_test_file(root, "a.js", "import b from './b';\n");
        create_test_file(root, "b.js", "export default 1;\n");

        let result = build(root);
        let graph = &result.graph;
        assert_eq!(graph.nodes.len(), 2);
        assert_eq!(graph.links, vec![GraphEdge::import(id_of(graph, "a.js"), id_of(graph, "b.js"))]);
        assert!(result.diagnostics.is_empty());

        let json = serde_json::to_value(&graph.links[0]).unwrap();
        assert_eq!(json, serde_json::json!({"source": 0, "target": 1, "type": "import", "value": 1}));
    }

    #[test]
    fn test_node_fields() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        create_test_file(root, "root.ts", "x");
        create_test_file(root, "src/components/Button.vue", "<template/>");

        let graph = build(root).graph;
        let root_node = &graph.nodes[id_of(&graph, "root.ts")];
        assert_eq!(root_node.directory, ".");
        assert_eq!(root_node.group, 1);
        assert_eq!(root_node.language, "ts");

        let button = &graph.nodes[id_of(&graph, "src/components/Button.vue")];
        assert_eq!(button.basename, "Button.vue");
        assert_eq!(button.directory, "src/components");
        assert_eq!(button.group, 2);
        assert_eq!(button.extension, ".vue");
        assert_eq!(button.language, "vue");
        assert_eq!(button.size_formatted.as_deref(), Some("11.0 B"));

        let json = serde_json::to_value(button).unwrap();
        assert!(json.get("lineCount").is_some());
        assert!(json.get("sizeFormatted").is_some());
    }

    #[test]
    fn test_optional_fields_omitted() {
        let record = FileRecord::new("/repo/a.js", "a.js");
        let json = serde_json::to_value(GraphNode::from_record(0, &record)).unwrap();
        assert!(json.get("size").is_none());
        assert!(json.get("lineCount").is_none());
        assert!(json.get("lastModified").is_none());
    }

    #[test]
    fn test_links_never_dangle() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        create_test_file(root, "src/index.js", "import a from './a';\nimport m from './missing';\nimport r from 'react';\n");
        create_test_file(root, "src/a.js", "const b = require('../lib/b');\n");
        create_test_file(root, "lib/b.ts", "import x from '/src/index';\n");
        create_test_file(root, "lib/readme.md", "import nope from './b';\n");

        let graph = build(root).graph;
        assert_eq!(graph.links.len(), 3);
        for link in &graph.links {
            assert!(link.source < graph.nodes.len());
            assert!(link.target < graph.nodes.len());
        }
    }

    #[test]
    fn test_import_to_untracked_extension_has_no_edge() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        create_test_file(root, "a.js", "import s from './style.css';\nimport d from './data.json';\n");
        create_test_file(root, "style.css", "body {}");

        let graph = build(root).graph;
        assert!(graph.links.is_empty());
    }

    #[test]
    fn test_unreadable_file_becomes_diagnostic() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        create_test_file(root, "a.js", "import b from './b';\n");
        create_test_file(root, "b.js", "");

        let cfg = Config::default();
        let mut records = scan_repository(root, &cfg).unwrap();
        records.push(FileRecord::new(root.join("gone.js"), "gone.js"));

        let result = build_dependency_graph(&records, root, &cfg);
        assert_eq!(result.graph.nodes.len(), 3);
        assert_eq!(result.graph.links.len(), 1);
        assert_eq!(result.diagnostics.len(), 1);
        assert_eq!(result.diagnostics[0].path, "gone.js");
    }

    #[test]
    fn test_build_is_deterministic() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        for i in 0..20 {
            let next = (i + 1) % 20;
            create_test_file(
                root,
                &format!("src/m{:02}.js", i),
                &format!("import n from './m{:02}';\nconst u = require('../util');\n", next),
            );
        }
        create_test_file(root, "util/index.js", "");

        let first = serde_json::to_string(&build(root).graph).unwrap();
        let second = serde_json::to_string(&build(root).graph).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_edges_follow_record_order() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        create_test_file(root, "a.js", "import c from './c';\nimport b from './b';\n");
        create_test_file(root, "b.js", "import c from './c';\n");
        create_test_file(root, "c.js", "");

        let graph = build(root).graph;
        let pairs: Vec<_> = graph.links.iter().map(|l| (l.source, l.target)).collect();
        assert_eq!(pairs, vec![(0, 2), (0, 1), (1, 2)]);
        assert_eq!(graph.imports_of(0), vec![2, 1]);
        assert_eq!(graph.importers_of(2), vec![0, 1]);
    }

    #[test]
    fn test_metadata() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        create_test_file(root, "a.js", "import b from './b';\nimport c from './c';\n");
        create_test_file(root, "b.js", "import c from './c';\n");
        create_test_file(root, "c.ts", "");
        create_test_file(root, "lib/d.js", "");

        let meta = build(root).graph.metadata;
        assert_eq!(meta.total_files, 4);
        assert_eq!(meta.files_by_type.get(".js"), Some(&3));
        assert_eq!(meta.files_by_type.get(".ts"), Some(&1));
        assert_eq!(meta.files_by_directory.get("."), Some(&3));
        assert_eq!(meta.files_by_directory.get("lib"), Some(&1));
        assert_eq!(meta.total_imports, 3);
        assert_eq!(meta.average_imports_per_file, 0.75);
        assert_eq!(meta.most_imported, vec![
            TopNode { file: "c.ts".into(), count: 2 },
            TopNode { file: "b.js".into(), count: 1 },
        ]);
        assert_eq!(meta.most_importing, vec![
            TopNode { file: "a.js".into(), count: 2 },
            TopNode { file: "b.js".into(), count: 1 },
        ]);
    }

    #[test]
    fn test_top_nodes_ties_use_node_id_order() {
        let nodes: Vec<GraphNode> = (0..8)
            .map(|i| GraphNode::from_record(i, &FileRecord::new(format!("/r/f{}.js", i), format!("f{}.js", i))))
            .collect();
        // Targets in edge order: 7, 3, 5, 3, 1, 0, 6
        let ids = [7, 3, 5, 3, 1, 0, 6].into_iter();
        let top = top_nodes(ids, &nodes);
        let files: Vec<_> = top.iter().map(|t| t.file.as_str()).collect();
        assert_eq!(files, vec!["f3.js", "f0.js", "f1.js", "f5.js", "f6.js"]);
    }

    #[test]
    fn test_most_imported_ties_follow_node_ids() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        create_test_file(root, "a.js", "import c from './c';\nimport b from './b';\n");
        create_test_file(root, "b.js", "");
        create_test_file(root, "c.js", "");

        let meta = build(root).graph.metadata;
        assert_eq!(meta.most_imported, vec![
            TopNode { file: "b.js".into(), count: 1 },
            TopNode { file: "c.js".into(), count: 1 },
        ]);
    }

    #[test]
    fn test_empty_files_skipped_in_averages() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        create_test_file(root, "a.js", "0123456789");
        create_test_file(root, "b.js", "");

        let graph = build(root).graph;
        assert_eq!(graph.metadata.average_file_size, 10.0);
        assert_eq!(graph.metadata.average_line_count, 1.0);

        let empty = &graph.nodes[id_of(&graph, "b.js")];
        assert_eq!(empty.size, None);
        assert_eq!(empty.size_formatted.as_deref(), Some("0.0 B"));
        let json = serde_json::to_value(empty).unwrap();
        assert!(json.get("size").is_none());
    }

    #[test]
    fn test_empty_graph_metadata() {
        let result = build_dependency_graph(&[], Path::new("/nowhere"), &Config::default());
        assert!(result.graph.nodes.is_empty());
        assert_eq!(result.graph.metadata.average_imports_per_file, 0.0);
        assert_eq!(result.graph.metadata.average_file_size, 0.0);
        assert!(result.graph.metadata.most_imported.is_empty());
    }

    #[test]
    fn test_ast_extractor_sees_side_effect_imports() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        create_test_file(root, "a.js", "import './b';\n");
        create_test_file(root, "b.js", "");

        let pattern = build(root).graph;
        assert!(pattern.links.is_empty());

        let cfg = Config { extractor: ExtractorKind::Ast, ..Config::default() };
        let records = scan_repository(root, &cfg).unwrap();
        let ast = build_dependency_graph(&records, root, &cfg).graph;
        assert_eq!(ast.links, vec![GraphEdge::import(0, 1)]);
    }

    #[test]
    fn test_node_index_lookup_by_both_keys() {
        let records = vec![FileRecord::new("/repo/src/a.js", "src/a.js")];
        let index = NodeIndex::from_records(&records);
        assert_eq!(index.lookup(Path::new("/repo/src/a.js"), Path::new("/repo")), Some(0));
        // Different absolute spelling, same relative path under another root
        assert_eq!(index.lookup(Path::new("/mnt/repo/src/a.js"), Path::new("/mnt/repo")), Some(0));
        assert_eq!(index.lookup(Path::new("/repo/src/b.js"), Path::new("/repo")), None);
    }
}
