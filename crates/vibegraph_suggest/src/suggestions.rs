use anyhow::{Context, Result};
use lazy_static::lazy_static;
use log::{debug, error, info, warn};
use regex::Regex;
use serde_json::Value;
use std::{fs, path::Path};

use crate::types::{Change, Edit, FileSuggestions, Suggestions};

/// Summary used when no candidate JSON could be found at all
pub const UNPARSEABLE_SUMMARY: &str = "Could not parse LLM response";

lazy_static! {
    // ```json or bare ``` fence; the interior must start on its own line
    static ref JSON_FENCE_RE: Regex =
        Regex::new(r"(?s)```(?:json)?\s*\n(.*?)\n```").expect("valid json fence regex");
    static ref ANY_FENCE_RE: Regex =
        Regex::new(r"(?s)```[\w+.-]*\s*\n(.*?)\n```").expect("valid fence regex");
    static ref BRACE_SPAN_RE: Regex = Regex::new(r"(?s)\{.*\}").expect("valid brace span regex");
}

/// Turn free-form generated text into validated suggestions.
///
/// Never fails: text without a usable payload, invalid JSON and schema
/// violations all produce an empty value whose `summary` says what went wrong.
pub fn parse_suggestions(text: &str) -> Suggestions {
    info!("Parsing LLM response ({} bytes)", text.len());

    let Some(candidate) = extract_candidate(text) else {
        warn!("No JSON payload found in the response");
        return Suggestions::empty(UNPARSEABLE_SUMMARY);
    };

    match decode(&candidate) {
        Ok(suggestions) => {
            debug!(
                "Parsed {} changes across {} files",
                suggestions.change_count(),
                suggestions.files.len()
            );
            suggestions
        }
        Err(reason) => {
            error!("Error parsing suggestions: {}", reason);
            Suggestions::empty(format!("Error parsing LLM response: {}", reason))
        }
    }
}

/// Pick the text to decode: a json/untagged fence, else the widest brace
/// span, else every fenced block joined by newlines.
fn extract_candidate(text: &str) -> Option<String> {
    if let Some(cap) = JSON_FENCE_RE.captures(text) {
        let interior = cap[1].trim();
        if !interior.is_empty() {
            debug!("Using fenced JSON block");
            return Some(interior.to_string());
        }
    }

    if let Some(m) = BRACE_SPAN_RE.find(text) {
        debug!("Using brace-delimited span");
        return Some(m.as_str().to_string());
    }

    let blocks: Vec<&str> = ANY_FENCE_RE
        .captures_iter(text)
        .filter_map(|c| c.get(1).map(|m| m.as_str().trim()))
        .collect();
    if blocks.is_empty() {
        None
    } else {
        debug!("Joining {} fenced blocks", blocks.len());
        Some(blocks.join("\n"))
    }
}

fn decode(candidate: &str) -> Result<Suggestions, String> {
    let value: Value = serde_json::from_str(candidate).map_err(|e| e.to_string())?;
    validate(&value)?;
    Ok(collect(&value))
}

/// Build suggestions from a validated document.
///
/// A change that passed validation but still cannot be applied, such as an
/// insert without `suggested`, is dropped on its own; the rest of the
/// response is kept.
fn collect(value: &Value) -> Suggestions {
    let files = value["files"]
        .as_array()
        .into_iter()
        .flatten()
        .map(|file| {
            let path = file["path"].as_str().unwrap_or_default().to_string();
            let changes = file["changes"]
                .as_array()
                .into_iter()
                .flatten()
                .filter_map(|change| match to_change(change) {
                    Ok(change) => Some(change),
                    Err(reason) => {
                        warn!("Dropping change for {}: {}", path, reason);
                        None
                    }
                })
                .collect();
            FileSuggestions { path, changes }
        })
        .collect();

    Suggestions { files, summary: text(&value["summary"]).unwrap_or_default() }
}

fn to_change(value: &Value) -> Result<Change, String> {
    let kind = value["type"].as_str().unwrap_or_default();
    let line_start = line_number(&value["lineStart"])
        .ok_or_else(|| format!("unusable lineStart {}", value["lineStart"]))?;
    let line_end = match &value["lineEnd"] {
        Value::Null => None,
        end => line_number(end),
    };

    let edit = match kind {
        "delete" => Edit::Delete,
        _ => {
            let suggested = text(&value["suggested"])
                .ok_or_else(|| format!("{} change at line {} is missing \"suggested\"", kind, line_start))?;
            if kind == "replace" { Edit::Replace(suggested) } else { Edit::Insert(suggested) }
        }
    };

    Ok(Change {
        line_start,
        line_end,
        original: text(&value["original"]).unwrap_or_default(),
        reason: text(&value["reason"]).unwrap_or_default(),
        edit,
    })
}

/// Line numbers may arrive as integers, floats or numeric strings.
/// Null and negative values become 0, which applies as line 1.
fn line_number(value: &Value) -> Option<u32> {
    let n = match value {
        Value::Null => 0,
        Value::Number(n) => match n.as_u64() {
            Some(n) => n,
            None => n.as_f64().filter(|f| f.is_finite())?.max(0.0) as u64,
        },
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite())?.max(0.0) as u64,
        _ => return None,
    };
    Some(n.min(u64::from(u32::MAX)) as u32)
}

/// Strings as-is, other scalars in their JSON spelling; null is absent.
fn text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Structural checks, in order; the first failure wins.
fn validate(value: &Value) -> Result<(), String> {
    let files = value
        .get("files")
        .and_then(Value::as_array)
        .ok_or("Invalid suggestions format: missing or invalid \"files\" array")?;

    for file in files {
        let path = file
            .get("path")
            .and_then(Value::as_str)
            .filter(|p| !p.is_empty())
            .ok_or("Invalid file format: missing \"path\"")?;

        let changes = file.get("changes").and_then(Value::as_array).ok_or_else(|| {
            format!("Invalid file format for {}: missing or invalid \"changes\" array", path)
        })?;

        for change in changes {
            let kind = change.get("type").and_then(Value::as_str);
            if !matches!(kind, Some("replace" | "insert" | "delete")) {
                return Err(format!("Invalid change format for {}: missing or invalid \"type\"", path));
            }
            // 0 and null are accepted; only an absent lineStart is rejected
            if change.get("lineStart").is_none() {
                return Err(format!("Invalid change format for {}: missing \"lineStart\"", path));
            }
        }
    }
    Ok(())
}

/// Write suggestions as pretty JSON.
pub fn save_suggestions(suggestions: &Suggestions, output: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(suggestions)?;
    fs::write(output, json)
        .with_context(|| format!("Failed to write suggestions to {}", output.display()))?;
    info!("Saved suggestions to {}", output.display());
    Ok(())
}

pub fn load_suggestions(input: &Path) -> Result<Suggestions> {
    let content = fs::read_to_string(input)
        .with_context(|| format!("Failed to read suggestions from {}", input.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Invalid suggestions file {}", input.display()))
}
