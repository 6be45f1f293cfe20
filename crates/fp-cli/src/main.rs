//! `fp`: command-line checks and maintenance for saved flow documents.
//!
//! ```text
//! fp check flow.json            # lint without modifying
//! fp normalize flow.json -o out.json
//! fp versions --store flows.msgpack save flow.json --name "before review"
//! fp versions --store flows.msgpack list
//! ```

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Local};
use clap::{Parser, Subcommand};
use fp_core::codec::{decode_document, export_json, import_json};
use fp_core::{LintSeverity, lint_document};
use fp_editor::EditorConfig;
use fp_editor::grouping::heal;
use fp_editor::persist::VersionStore;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "fp", author, version, about, long_about = None)]
struct Args {
    /// Editor configuration (JSON, camelCase keys)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log healing and save details to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Report structural problems in a flow document
    Check {
        file: PathBuf,
        /// Fail when any warning is reported
        #[arg(long)]
        strict: bool,
        /// Print diagnostics as a JSON array
        #[arg(long)]
        json: bool,
    },
    /// Import, repair and re-export a flow document
    Normalize {
        file: PathBuf,
        /// Output path (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Manage a version store file
    Versions {
        /// Version store file (MessagePack)
        #[arg(short, long)]
        store: PathBuf,
        #[command(subcommand)]
        action: VersionAction,
    },
}

#[derive(Subcommand, Debug)]
enum VersionAction {
    /// List stored versions, newest first
    List,
    /// Store a document as a new version
    Save {
        file: PathBuf,
        #[arg(short, long)]
        name: Option<String>,
    },
    /// Write a stored version out as JSON
    Show {
        id: u64,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Remove a stored version
    Delete { id: u64 },
}

fn main() -> Result<()> {
    let args = Args::parse();
    let level = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let config = load_config(args.config.as_deref())?;
    match args.command {
        Command::Check { file, strict, json } => check(&file, strict, json),
        Command::Normalize { file, output } => {
            let source = read(&file)?;
            let normalized = normalize(&source)?;
            write_or_print(output.as_deref(), &normalized)
        }
        Command::Versions { store, action } => versions(&store, action, &config),
    }
}

fn load_config(path: Option<&Path>) -> Result<EditorConfig> {
    let Some(path) = path else {
        return Ok(EditorConfig::default());
    };
    let text = read(path)?;
    EditorConfig::from_json(&text).with_context(|| format!("invalid config {}", path.display()))
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))
}

fn write_or_print(output: Option<&Path>, text: &str) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, text).with_context(|| format!("cannot write {}", path.display()))?;
            log::info!("wrote {}", path.display());
        }
        None => println!("{text}"),
    }
    Ok(())
}

// ─── check ───────────────────────────────────────────────────────────────

/// Lint `source` into printable lines. Returns the lines and the number
/// of warnings.
fn check_source(source: &str) -> Result<(Vec<String>, usize)> {
    let doc = decode_document(source)?;
    let diags = lint_document(&doc);
    let warnings = diags
        .iter()
        .filter(|d| d.severity == LintSeverity::Warning)
        .count();
    let lines = diags
        .iter()
        .map(|d| {
            let level = match d.severity {
                LintSeverity::Warning => "warning",
                LintSeverity::Info => "info",
            };
            format!("{level}[{}] {}: {}", d.rule, d.node_id, d.message)
        })
        .collect();
    Ok((lines, warnings))
}

fn check(file: &Path, strict: bool, json: bool) -> Result<()> {
    let source = read(file)?;
    let (lines, warnings) = check_source(&source)
        .with_context(|| format!("{} is not a flow document", file.display()))?;
    if json {
        println!("{}", serde_json::to_string_pretty(&lines)?);
    } else if lines.is_empty() {
        println!("{}: ok", file.display());
    } else {
        for line in &lines {
            println!("{line}");
        }
    }
    if strict && warnings > 0 {
        bail!("{warnings} warning(s) in {}", file.display());
    }
    Ok(())
}

// ─── normalize ───────────────────────────────────────────────────────────

/// Import, heal and re-export. The output is what the editor would save
/// right after loading the file.
fn normalize(source: &str) -> Result<String> {
    let imported = import_json(source)?;
    if !imported.dropped_connectors.is_empty() {
        log::warn!("dropped connectors: {:?}", imported.dropped_connectors);
    }
    if !imported.duplicate_ids.is_empty() {
        log::warn!("duplicate ids (first kept): {:?}", imported.duplicate_ids);
    }
    let (healed, report) = heal(&imported.state);
    if !report.is_clean() {
        log::debug!("healed: {report:?}");
    }
    Ok(export_json(&healed, &imported.meta)?)
}

// ─── versions ────────────────────────────────────────────────────────────

fn versions(path: &Path, action: VersionAction, config: &EditorConfig) -> Result<()> {
    let mut store = VersionStore::open(path)
        .with_context(|| format!("cannot open version store {}", path.display()))?
        .with_max_versions(config.max_versions);
    match action {
        VersionAction::List => {
            for v in store.list() {
                let when = DateTime::from_timestamp_millis(v.timestamp)
                    .map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_default();
                println!("{:>4}  {when}  {}  ({} nodes)", v.id, v.name, v.data.nodes.len());
            }
        }
        VersionAction::Save { file, name } => {
            let doc = decode_document(&read(&file)?)?;
            let saved = store.save(doc, name.as_deref())?;
            println!(
                "saved version {} \"{}\" ({}/{})",
                saved.id, saved.name, saved.current_count, saved.max_versions
            );
        }
        VersionAction::Show { id, output } => {
            let Some(version) = store.get(id) else {
                bail!("no saved version with id {id}");
            };
            let json = fp_core::codec::encode_document(&version.data)?;
            write_or_print(output.as_deref(), &json)?;
        }
        VersionAction::Delete { id } => {
            store.delete(id)?;
            println!("deleted version {id}");
        }
    }
    Ok(())
}
