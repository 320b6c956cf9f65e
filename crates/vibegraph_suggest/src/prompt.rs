use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

use vibegraph_core::{DependencyGraph, GraphNode, format_file_size};

/// Files picked for export, by node id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    pub files: Vec<SelectedFile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_name: Option<String>,
    /// RFC 3339 creation time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedFile {
    pub id: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl Selection {
    /// Selection of the given node ids; unknown ids are dropped.
    pub fn from_ids(graph: &DependencyGraph, ids: &[usize], repo_name: &str) -> Self {
        let files = ids
            .iter()
            .filter_map(|&id| graph.node(id))
            .map(|node| SelectedFile { id: node.id, path: Some(node.name.clone()) })
            .collect();
        Self {
            files,
            repo_name: Some(repo_name.to_string()),
            timestamp: Some(Utc::now().to_rfc3339()),
        }
    }

    pub fn ids(&self) -> Vec<usize> {
        self.files.iter().map(|f| f.id).collect()
    }
}

pub fn load_selection(path: &Path) -> Result<Selection> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read selection from {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid selection file {}", path.display()))
}

pub fn save_selection(selection: &Selection, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(selection)?;
    fs::write(path, json).with_context(|| format!("Failed to write selection to {}", path.display()))?;
    info!("Exported selection to {}", path.display());
    Ok(())
}

const RESPONSE_CONTRACT: &str = r#"```json
{
  "files": [
    {
      "path": "path/to/file.js",
      "changes": [
        {
          "type": "replace",  // replace, insert, or delete
          "lineStart": 42,    // line number where change begins
          "lineEnd": 42,      // line number where change ends (same as lineStart for single line)
          "original": "const oldCode = 'before';",  // original code
          "suggested": "const newCode = 'after';",  // suggested replacement code
          "reason": "Improved variable naming for clarity"  // brief explanation
        }
      ]
    }
  ],
  "summary": "Brief overview of suggestions and their rationale"
}
```
"#;

const GUIDELINES: &[&str] = &[
    "Make meaningful improvements (not just style changes)",
    "Provide a clear reason for each change",
    "Preserve the overall functionality of the code",
    "Consider dependencies between files",
    "Return strictly valid JSON in the format shown above",
];

/// Render the refactoring request for the selected nodes.
///
/// Unknown ids are skipped, as are files that cannot be read; an error is
/// returned only when none of `ids` names a node in `graph`.
pub fn export_prompt(
    graph: &DependencyGraph,
    ids: &[usize],
    base_dir: &Path,
    repo_name: &str,
) -> Result<String> {
    let nodes: Vec<&GraphNode> = ids.iter().filter_map(|&id| graph.node(id)).collect();
    if nodes.is_empty() {
        bail!("No valid files selected for export");
    }
    info!("Exporting {} files for LLM processing", nodes.len());

    let mut sections = Vec::with_capacity(nodes.len());
    for node in nodes {
        let path = base_dir.join(&node.name);
        match fs::read_to_string(&path) {
            Ok(content) => sections.push(render_file(graph, node, &content)),
            Err(e) => warn!("Error reading file {}: {}", node.name, e),
        }
    }
    debug!("Rendered {} file sections", sections.len());

    let mut prompt = String::new();
    prompt.push_str("# Code Refactoring Request\n\n");
    prompt.push_str(&format!(
        "You're analyzing {} files from the {} repository.\n\n",
        sections.len(),
        repo_name
    ));
    prompt.push_str("## Instructions\n\n");
    prompt.push_str(
        "Please analyze these files and suggest improvements. Return your suggestions in this JSON format:\n\n",
    );
    prompt.push_str(RESPONSE_CONTRACT);
    prompt.push('\n');
    prompt.push_str("Please follow these guidelines:\n");
    for (i, rule) in GUIDELINES.iter().enumerate() {
        prompt.push_str(&format!("{}. {}\n", i + 1, rule));
    }
    prompt.push_str("\n## Files for Analysis\n\n");
    for section in sections {
        prompt.push_str(&section);
    }
    Ok(prompt)
}

fn render_file(graph: &DependencyGraph, node: &GraphNode, content: &str) -> String {
    let mut out = String::new();
    out.push_str(&format!("### {}\n\n", node.name));

    let mut meta = Vec::new();
    if let Some(lines) = node.line_count {
        meta.push(format!("{} lines", lines));
    }
    if let Some(size) = node.size {
        meta.push(format_file_size(size as f64));
    }
    if let Some(ts) = node.last_modified.and_then(format_timestamp) {
        meta.push(format!("Last modified: {}", ts));
    }
    if !meta.is_empty() {
        out.push_str(&format!("*{}*\n\n", meta.join(" • ")));
    }

    let imports = names(graph, graph.imports_of(node.id));
    if !imports.is_empty() {
        out.push_str(&format!("**Imports:** {}\n\n", imports.join(", ")));
    }
    let importers = names(graph, graph.importers_of(node.id));
    if !importers.is_empty() {
        out.push_str(&format!("**Exports:** {}\n\n", importers.join(", ")));
    }

    out.push_str("```javascript\n");
    for (i, line) in content.split('\n').enumerate() {
        out.push_str(&format!("{:>4}| {}\n", i + 1, line));
    }
    out.push_str("```\n\n");
    out
}

fn names(graph: &DependencyGraph, ids: Vec<usize>) -> Vec<&str> {
    ids.into_iter().filter_map(|id| graph.node(id)).map(|n| n.name.as_str()).collect()
}

fn format_timestamp(millis: u64) -> Option<String> {
    let ts: DateTime<Utc> = DateTime::from_timestamp_millis(i64::try_from(millis).ok()?)?;
    Some(ts.format("%Y-%m-%d %H:%M:%S UTC").to_string())
}
