//! dissonance command-line tool
//!
//! Inspects a workspace snapshot: prints the relationship graph or the
//! history, exports reports and records resolutions.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tracing_subscriber::EnvFilter;

use dissonance::{
    Analyzer, AnalyzerError, CandidateConflict, ConflictStatus, DissonanceConfig, Document, ReportOptions,
    Severity, SortKey, Workspace,
};

enum Command {
    Graph,
    History { limit: Option<usize> },
    Report { options: ReportOptions, out: Option<PathBuf> },
    Resolve { conflict_id: String, resolution: String },
}

struct Args {
    snapshot: Option<PathBuf>,
    config: Option<PathBuf>,
    command: Command,
}

fn fail(message: &str) -> ! {
    eprintln!("error: {message}");
    std::process::exit(1);
}

fn print_help() {
    println!("dissonance - conflict lifecycle and relationship graph engine");
    println!();
    println!("USAGE:");
    println!("    dissonance [OPTIONS] <COMMAND>");
    println!();
    println!("COMMANDS:");
    println!("    graph                          Print nodes and edges of the relationship graph");
    println!("    history [--limit <N>]          Print the activity history, newest first");
    println!("    report [--status <S>] [--severity <S>] [--sort <K>] [--out <DIR>]");
    println!("                                   Export a plain-text conflict report");
    println!("    resolve <CONFLICT> <RESOLUTION>");
    println!("                                   accept_first | accept_second | ignore");
    println!();
    println!("OPTIONS:");
    println!("    -s, --snapshot <FILE>     Snapshot file [default: ./dissonance.snapshot]");
    println!("    -c, --config <FILE>       JSON configuration file");
    println!("    -h, --help                Print help information");
}

fn value(args: &[String], i: usize, flag: &str) -> String {
    args.get(i + 1)
        .cloned()
        .unwrap_or_else(|| fail(&format!("{flag} requires a value")))
}

fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().collect();
    let mut snapshot = None;
    let mut config = None;
    let mut command: Option<Command> = None;
    let mut positional: Vec<String> = Vec::new();
    let mut options = ReportOptions::default();
    let mut out = None;
    let mut limit = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--snapshot" | "-s" => {
                snapshot = Some(PathBuf::from(value(&args, i, "--snapshot")));
                i += 2;
            }
            "--config" | "-c" => {
                config = Some(PathBuf::from(value(&args, i, "--config")));
                i += 2;
            }
            "--status" => {
                let raw = value(&args, i, "--status");
                options.status = Some(raw.parse::<ConflictStatus>().unwrap_or_else(|e| fail(&e.to_string())));
                i += 2;
            }
            "--severity" => {
                let raw = value(&args, i, "--severity");
                options.severity = Some(raw.parse::<Severity>().unwrap_or_else(|e| fail(&e.to_string())));
                i += 2;
            }
            "--sort" => {
                let raw = value(&args, i, "--sort");
                options.sort = raw.parse::<SortKey>().unwrap_or_else(|e| fail(&e.to_string()));
                i += 2;
            }
            "--out" | "-o" => {
                out = Some(PathBuf::from(value(&args, i, "--out")));
                i += 2;
            }
            "--limit" | "-n" => {
                let raw = value(&args, i, "--limit");
                limit = Some(
                    raw.parse::<usize>()
                        .unwrap_or_else(|_| fail(&format!("invalid limit: {raw}"))),
                );
                i += 2;
            }
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            arg if arg.starts_with('-') => fail(&format!("unknown argument: {arg}")),
            arg => {
                positional.push(arg.to_string());
                i += 1;
            }
        }
    }

    let mut positional = positional.into_iter();
    match positional.next().as_deref() {
        Some("graph") => command = Some(Command::Graph),
        Some("history") => command = Some(Command::History { limit }),
        Some("report") => command = Some(Command::Report { options, out }),
        Some("resolve") => {
            let conflict_id = positional
                .next()
                .unwrap_or_else(|| fail("resolve requires a conflict id"));
            let resolution = positional
                .next()
                .unwrap_or_else(|| fail("resolve requires a resolution"));
            command = Some(Command::Resolve { conflict_id, resolution });
        }
        Some(other) => fail(&format!("unknown command: {other}")),
        None => {}
    }
    if let Some(extra) = positional.next() {
        fail(&format!("unexpected argument: {extra}"));
    }

    let Some(command) = command else {
        print_help();
        std::process::exit(1);
    };
    Args {
        snapshot,
        config,
        command,
    }
}

/// The command-line tool never analyzes; analysis needs a live analyzer.
struct OfflineAnalyzer;

#[async_trait]
impl Analyzer for OfflineAnalyzer {
    async fn analyze(&self, _first: &Document, _second: &Document) -> Result<Vec<CandidateConflict>, AnalyzerError> {
        Err(AnalyzerError::Unavailable {
            message: "no analyzer is configured for the command-line tool".to_string(),
        })
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = parse_args();

    let mut config = match &args.config {
        Some(path) => DissonanceConfig::from_json_file(path)?,
        None => DissonanceConfig::default(),
    };
    if let Some(snapshot) = args.snapshot {
        config.snapshot_path = snapshot;
    }
    tracing::debug!(snapshot = %config.snapshot_path.display(), "opening workspace");

    let workspace = Workspace::builder(Arc::new(OfflineAnalyzer)).config(config).open()?;

    match args.command {
        Command::Graph => {
            let graph = workspace.graph()?;
            println!("{} document(s), {} edge(s)", graph.nodes.len(), graph.edges.len());
            for node in &graph.nodes {
                println!(
                    "  node {:<24} {:<32} ({:>8.2}, {:>8.2})  conflicts: {}",
                    node.id.as_str(),
                    node.label,
                    node.position.x,
                    node.position.y,
                    graph.conflict_count(&node.id)
                );
            }
            for edge in &graph.edges {
                println!(
                    "  edge {} -> {}  unresolved: {}",
                    edge.source, edge.target, edge.unresolved_conflict_count
                );
            }
        }
        Command::History { limit } => {
            let history = workspace.history()?;
            let shown = limit.unwrap_or(history.len());
            for event in history.iter().take(shown) {
                println!(
                    "{}  {:<18} {}",
                    event.timestamp.to_rfc3339(),
                    event.event_type.to_string(),
                    event.details
                );
            }
        }
        Command::Report { options, out } => {
            let report = workspace.generate_report(&options)?;
            match out {
                Some(dir) => {
                    std::fs::create_dir_all(&dir)?;
                    let path = dir.join(&report.filename);
                    std::fs::write(&path, &report.body)?;
                    println!("Wrote {} ({} conflict(s))", path.display(), report.conflict_count);
                }
                None => print!("{}", report.body),
            }
        }
        Command::Resolve {
            conflict_id,
            resolution,
        } => {
            let outcome = workspace.resolve(&conflict_id, &resolution)?;
            println!("{conflict_id}: {outcome:?}");
        }
    }

    workspace.flush()?;
    Ok(())
}
