//! symgraph CLI - parse files, inspect chunking and scan repositories.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use symgraph::chunking::BoundaryPlan;
use symgraph::entities::default_detectors;
use symgraph::{build_graph, ChunkedParser, SymbolGraph, SymgraphConfig};

#[derive(Parser)]
#[command(name = "symgraph")]
#[command(about = "Symbol and dependency graphs for C# code", long_about = None)]
struct Cli {
    /// Path to a symgraph.toml (defaults apply when missing)
    #[arg(short, long, default_value = "symgraph.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse one file and print the result as JSON
    Parse {
        file: PathBuf,

        /// Pretty-print the JSON
        #[arg(long)]
        pretty: bool,
    },

    /// Show where a file would be cut into chunks
    Chunks { file: PathBuf },

    /// Scan directories and build the symbol graph
    Scan {
        #[arg(required = true)]
        roots: Vec<PathBuf>,

        /// Write a graph snapshot here
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print statistics for a saved graph snapshot
    Stats { snapshot: PathBuf },
}

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn load_config(path: &Path) -> Result<SymgraphConfig> {
    if !path.exists() {
        return Ok(SymgraphConfig::default());
    }
    let contents =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    SymgraphConfig::from_toml_str(&contents).with_context(|| format!("loading {}", path.display()))
}

fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli.config)?;
    let parser = ChunkedParser::new(config);

    match cli.command {
        Commands::Parse { file, pretty } => {
            let result = parser
                .parse_file(&file)
                .with_context(|| format!("parsing {}", file.display()))?;
            let json = if pretty {
                serde_json::to_string_pretty(&result)?
            } else {
                serde_json::to_string(&result)?
            };
            println!("{json}");
        }

        Commands::Chunks { file } => {
            let source =
                fs::read_to_string(&file).with_context(|| format!("reading {}", file.display()))?;
            let plan = parser.plan(&file, &source)?;
            match &plan.plan {
                BoundaryPlan::Split {
                    boundaries,
                    strategy,
                } => println!(
                    "{}: {} bytes, {} boundaries ({:?})",
                    file.display(),
                    source.len(),
                    boundaries.len(),
                    strategy
                ),
                BoundaryPlan::Unchunked { reason } => {
                    println!("{}: parsed whole ({reason})", file.display())
                }
            }
            for chunk in &plan.chunks {
                let context = chunk.context.qualified_path();
                println!(
                    "  #{:<3} lines {:>6}-{:<6} {:>7} bytes  {}",
                    chunk.index,
                    chunk.start_line,
                    chunk.end_line,
                    chunk.content.len(),
                    context
                );
            }
        }

        Commands::Scan { roots, output } => {
            let roots: Vec<&Path> = roots.iter().map(PathBuf::as_path).collect();
            let (graph, report) = build_graph(&roots, &parser, &default_detectors());
            println!("{}", serde_json::to_string_pretty(&report)?);
            println!("{}", serde_json::to_string_pretty(&graph.stats())?);
            if let Some(output) = output {
                graph
                    .save(&output)
                    .with_context(|| format!("saving {}", output.display()))?;
                println!("✓ Saved graph to {}", output.display());
            }
        }

        Commands::Stats { snapshot } => {
            let graph = SymbolGraph::load(&snapshot)
                .with_context(|| format!("loading {}", snapshot.display()))?;
            let stats = graph.stats();
            println!("Symbol Graph");
            println!("────────────");
            println!("Repositories:  {}", stats.repositories);
            println!("Files:         {}", stats.files);
            println!("Symbols:       {}", stats.symbols);
            println!("Dependencies:  {}", stats.dependency_edges);
            println!("Unresolved:    {}", stats.unresolved_dependencies);
            println!("Entities:      {}", stats.entities);
        }
    }

    Ok(())
}
