mod reporter;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use log::{debug, info};
use std::{
    env, fs,
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
    time::Instant,
};

use vibegraph_core::{
    Config, build_dependency_graph, config_path, find_git_root, init_config, scan_repository,
    toggle_debug,
};
use vibegraph_suggest::{
    AppliedChanges, Selection, apply_changes, export_prompt, load_selection, load_suggestions,
    parse_suggestions, save_selection, save_suggestions,
};

#[derive(Parser)]
#[command(name = "vibegraph")]
#[command(about = "Dependency graphs and LLM-assisted refactoring for JavaScript/TypeScript/Vue repositories", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Args)]
struct RootArgs {
    /// Root directory of the repository (defaults to git root)
    #[arg(long)]
    root: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Write the default settings to .vibegraph/config.json
    Init(RootArgs),
    /// Toggle debugMode in the settings file
    Debug(RootArgs),
    /// Scan the repository and write the dependency graph as JSON
    Graph {
        #[command(flatten)]
        root: RootArgs,
        #[arg(long, default_value = "vibe-graph.json")]
        output: PathBuf,
    },
    /// Scan the repository and print statistics
    Stats(RootArgs),
    /// Render selected files into a refactoring request
    Export {
        #[command(flatten)]
        root: RootArgs,
        /// Node ids to export; written to --selection before exporting
        #[arg(long, value_delimiter = ',')]
        ids: Vec<usize>,
        #[arg(long, default_value = "vibe-selection.json")]
        selection: PathBuf,
        #[arg(long, default_value = "vibe-prompt.md")]
        output: PathBuf,
    },
    /// Turn a raw LLM response into a validated suggestions file
    Parse {
        #[command(flatten)]
        root: RootArgs,
        /// Response text, or "-" for stdin
        #[arg(long, default_value = "response.txt")]
        input: PathBuf,
        #[arg(long, default_value = "vibe-suggestions.json")]
        output: PathBuf,
    },
    /// Apply accepted changes to the working tree
    Apply {
        #[command(flatten)]
        root: RootArgs,
        /// Applied-changes file ({"changes": [{file, change}]}); defaults to vibe-applied-changes.json
        #[arg(long)]
        changes: Option<PathBuf>,
        /// Apply every change of a suggestions file instead
        #[arg(long, conflicts_with = "changes")]
        suggestions: Option<PathBuf>,
    },
}

impl Commands {
    fn root_args(&self) -> &RootArgs {
        match self {
            Commands::Init(r) | Commands::Debug(r) | Commands::Stats(r) => r,
            Commands::Graph { root, .. }
            | Commands::Export { root, .. }
            | Commands::Parse { root, .. }
            | Commands::Apply { root, .. } => root,
        }
    }
}

fn resolve_root(args: &RootArgs) -> Result<PathBuf> {
    match &args.root {
        Some(root) => Ok(root.clone()),
        None => match find_git_root() {
            Ok(root) => Ok(root),
            Err(_) => env::current_dir().context("Failed to determine the current directory"),
        },
    }
}

fn repo_name(root: &Path) -> String {
    root.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_else(|| "repository".into())
}

fn init_logging(cfg: &Config) {
    let default_filter = if cfg.debug_mode { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let root = resolve_root(cli.command.root_args())?;
    let cfg = Config::load(&root);
    init_logging(&cfg);
    debug!("Parsed CLI arguments: {:?}", cli.command);
    debug!("Config: root={:?}, {:?}", root, cfg);

    // stdio is blocked by LineWriter, use a BufWriter to reduce syscalls.
    // See https://github.com/rust-lang/rust/issues/60673
    let mut stdout = BufWriter::new(io::stdout());
    let start = Instant::now();

    match cli.command {
        Commands::Init(_) => {
            let path = init_config(&root)?;
            writeln!(stdout, "{} Wrote default settings to {}", "✓".green().bold(), path.display())?;
        }
        Commands::Debug(_) => {
            let enabled = toggle_debug(&root)?;
            let state = if enabled { "enabled".green() } else { "disabled".yellow() };
            writeln!(stdout, "{} Debug mode {} in {}", "●".bright_blue(), state, config_path(&root).display())?;
        }
        Commands::Graph { output, .. } => {
            let result = build_graph(&root, &cfg)?;
            let json = serde_json::to_string_pretty(&result.graph)?;
            fs::write(&output, json)
                .with_context(|| format!("Failed to write graph to {}", output.display()))?;
            reporter::print_diagnostics(&mut stdout, &result.diagnostics)?;
            writeln!(
                stdout,
                "{} Wrote {} nodes and {} links to {}",
                "✓".green().bold(),
                result.graph.nodes.len().to_string().cyan(),
                result.graph.links.len().to_string().cyan(),
                output.display()
            )?;
            print_finished(&mut stdout, start, result.graph.nodes.len())?;
        }
        Commands::Stats(_) => {
            let result = build_graph(&root, &cfg)?;
            reporter::print_diagnostics(&mut stdout, &result.diagnostics)?;
            reporter::print_stats(&mut stdout, &result.graph, &repo_name(&root))?;
            print_finished(&mut stdout, start, result.graph.nodes.len())?;
        }
        Commands::Export { ids, selection, output, .. } => {
            let result = build_graph(&root, &cfg)?;
            let name = repo_name(&root);
            let selected = if ids.is_empty() {
                load_selection(&selection)?
            } else {
                let selected = Selection::from_ids(&result.graph, &ids, &name);
                save_selection(&selected, &selection)?;
                selected
            };

            let prompt = export_prompt(&result.graph, &selected.ids(), &root, &name)?;
            fs::write(&output, prompt)
                .with_context(|| format!("Failed to write prompt to {}", output.display()))?;
            writeln!(stdout, "{} Exported prompt to {}", "✓".green().bold(), output.display())?;
        }
        Commands::Parse { input, output, .. } => {
            let text = if input.as_os_str() == "-" {
                io::read_to_string(io::stdin()).context("Failed to read response from stdin")?
            } else {
                fs::read_to_string(&input)
                    .with_context(|| format!("Failed to read response from {}", input.display()))?
            };
            let suggestions = parse_suggestions(&text);
            save_suggestions(&suggestions, &output)?;
            reporter::print_suggestions(&mut stdout, &suggestions, &output)?;
        }
        Commands::Apply { changes, suggestions, .. } => {
            let applied = match suggestions {
                Some(path) => load_suggestions(&path)?.flatten(),
                None => {
                    let path = changes.unwrap_or_else(|| PathBuf::from("vibe-applied-changes.json"));
                    load_applied_changes(&path)?
                }
            };
            info!("Loaded {} changes", applied.changes.len());

            let report = apply_changes(&applied.changes, &root);
            reporter::print_apply_report(&mut stdout, &report)?;
            if !report.is_success() {
                stdout.flush()?;
                // Non-zero exit so scripts notice partial application
                std::process::exit(1);
            }
        }
    }

    stdout.flush()?;
    Ok(())
}

fn build_graph(root: &Path, cfg: &Config) -> Result<vibegraph_core::BuildResult> {
    let num_threads = rayon::current_num_threads();
    info!("Scanning {} (using {} threads)", root.display(), num_threads);

    let records = scan_repository(root, cfg)?;
    if records.is_empty() {
        bail!("No tracked files found under {}", root.display());
    }
    Ok(build_dependency_graph(&records, root, cfg))
}

fn load_applied_changes(path: &Path) -> Result<AppliedChanges> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Changes file not found: {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid changes file {}", path.display()))
}

fn print_finished<W: Write>(writer: &mut W, start: Instant, files: usize) -> io::Result<()> {
    writeln!(
        writer,
        "\n{} Finished in {}ms on {} files (using {} threads).",
        "●".bright_blue(),
        start.elapsed().as_millis().to_string().cyan(),
        files.to_string().cyan(),
        rayon::current_num_threads().to_string().cyan()
    )
}
