use std::{
    collections::BTreeMap,
    io::{self, Write},
    path::Path,
};

use colored::Colorize;
use log::debug;

use vibegraph_core::{DependencyGraph, Diagnostic, TopNode, format_file_size};
use vibegraph_suggest::{ApplyReport, Suggestions};

/// Rows shown per breakdown table before the rest is folded
const BREAKDOWN_LIMIT: usize = 10;

pub fn print_stats<W: Write>(
    writer: &mut W,
    graph: &DependencyGraph,
    repo_name: &str,
) -> io::Result<()> {
    let meta = &graph.metadata;
    debug!("Printing stats for {} nodes", graph.nodes.len());

    writeln!(writer, "{} Repository statistics for {}\n", "●".bright_blue(), repo_name.bold())?;
    writeln!(writer, "  Files:            {}", meta.total_files.to_string().cyan().bold())?;
    writeln!(
        writer,
        "  Imports:          {} ({} per file)",
        meta.total_imports.to_string().cyan().bold(),
        format!("{:.2}", meta.average_imports_per_file).cyan()
    )?;
    writeln!(writer, "  Average size:     {}", format_file_size(meta.average_file_size).cyan())?;
    writeln!(writer, "  Average lines:    {}", format!("{:.1}", meta.average_line_count).cyan())?;

    print_breakdown(writer, "Files by type", &meta.files_by_type)?;
    print_breakdown(writer, "Files by directory", &meta.files_by_directory)?;
    print_top(writer, "Most imported", &meta.most_imported)?;
    print_top(writer, "Most importing", &meta.most_importing)?;

    writer.flush()?;
    Ok(())
}

fn print_breakdown<W: Write>(
    writer: &mut W,
    title: &str,
    counts: &BTreeMap<String, usize>,
) -> io::Result<()> {
    writeln!(writer, "\n{}", title.bold())?;

    // Largest first; BTreeMap order settles ties
    let mut rows: Vec<_> = counts.iter().collect();
    rows.sort_by(|a, b| b.1.cmp(a.1));

    for (key, count) in rows.iter().take(BREAKDOWN_LIMIT) {
        let label = if key.is_empty() { "(none)" } else { key.as_str() };
        writeln!(writer, "  {:<32} {}", label, count.to_string().cyan())?;
    }
    if rows.len() > BREAKDOWN_LIMIT {
        writeln!(writer, "  {}", format!("… {} more", rows.len() - BREAKDOWN_LIMIT).dimmed())?;
    }
    Ok(())
}

fn print_top<W: Write>(writer: &mut W, title: &str, top: &[TopNode]) -> io::Result<()> {
    writeln!(writer, "\n{}", title.bold())?;
    if top.is_empty() {
        writeln!(writer, "  {}", "none".dimmed())?;
        return Ok(());
    }
    for (idx, entry) in top.iter().enumerate() {
        writeln!(writer, "    {}. {} ({})", idx + 1, entry.file.blue(), entry.count.to_string().yellow())?;
    }
    Ok(())
}

pub fn print_diagnostics<W: Write>(writer: &mut W, diagnostics: &[Diagnostic]) -> io::Result<()> {
    if diagnostics.is_empty() {
        return Ok(());
    }
    writeln!(
        writer,
        "{} {} files could not be analyzed",
        "⚠".yellow().bold(),
        diagnostics.len().to_string().yellow()
    )?;
    for (idx, diag) in diagnostics.iter().enumerate() {
        let prefix = if idx == diagnostics.len() - 1 { "└──" } else { "├──" };
        writeln!(writer, "{}  {}: {}", prefix.dimmed(), diag.path, diag.message.dimmed())?;
    }
    Ok(())
}

pub fn print_suggestions<W: Write>(
    writer: &mut W,
    suggestions: &Suggestions,
    output: &Path,
) -> io::Result<()> {
    if suggestions.files.is_empty() {
        writeln!(writer, "{} {}", "⚠".yellow().bold(), suggestions.summary.yellow())?;
    } else {
        writeln!(
            writer,
            "{} {} changes across {} files",
            "✓".green().bold(),
            suggestions.change_count().to_string().cyan(),
            suggestions.files.len().to_string().cyan()
        )?;
        for file in &suggestions.files {
            writeln!(writer, "  {} ({})", file.path.blue(), file.changes.len())?;
        }
        if !suggestions.summary.is_empty() {
            writeln!(writer, "\n{}", suggestions.summary.dimmed())?;
        }
    }
    writeln!(writer, "Saved suggestions to {}", output.display().to_string().cyan())?;
    writer.flush()?;
    Ok(())
}

pub fn print_apply_report<W: Write>(writer: &mut W, report: &ApplyReport) -> io::Result<()> {
    writeln!(
        writer,
        "{} Applied changes to {} files",
        "✓".green().bold(),
        report.modified.len().to_string().cyan()
    )?;
    for file in &report.modified {
        writeln!(writer, "  - {}", file)?;
    }

    if !report.failed.is_empty() {
        writeln!(
            writer,
            "{} {} files failed",
            "✗".red().bold(),
            report.failed.len().to_string().red()
        )?;
        for failure in &report.failed {
            writeln!(writer, "  - {}: {}", failure.file.red(), failure.message)?;
        }
    }
    writer.flush()?;
    Ok(())
}
