mod serve;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rand::SeedableRng;
use rand::rngs::SmallRng;
use serde::Serialize;
use tc_core::{Placement, Point, Side, import_json, place_node};
use tc_engine::{
    EngineConfig, LocalThoughtService, Script, ThoughtService, build_service, load_config,
    run_script,
};

#[derive(Parser)]
#[command(name = "tcanvas", about = "Thought canvas engine CLI")]
struct Cli {
    /// Config file (TOML); defaults to $TCANVAS_CONFIG
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose debug output
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a scripted session in virtual time
    Replay {
        /// Script file (JSON)
        script: PathBuf,

        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Write the final session snapshot here
        #[arg(long)]
        out: Option<PathBuf>,

        /// Print the full report as JSON
        #[arg(long)]
        json: bool,

        /// Use the offline generator even if a service URL is configured
        #[arg(long)]
        offline: bool,
    },

    /// Run a live session over stdio (JSON lines in, canvas frames out)
    Serve {
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Write the session snapshot here on exit
        #[arg(long)]
        out: Option<PathBuf>,

        /// Restore a snapshot before starting
        #[arg(long)]
        restore: Option<PathBuf>,
    },

    /// Place nodes on an empty canvas and print their positions
    Layout {
        #[arg(long)]
        count: usize,

        #[arg(long)]
        width: Option<f64>,

        #[arg(long)]
        height: Option<f64>,

        /// Preferred edge: left, right, top or bottom
        #[arg(long)]
        side: Option<Side>,

        #[arg(long, default_value_t = 42)]
        seed: u64,
    },

    /// Summarize a session snapshot
    Inspect {
        /// Snapshot file (JSON)
        path: PathBuf,
    },

    /// Print the effective configuration as TOML
    Config,
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

fn config(cli: &Cli) -> Result<EngineConfig> {
    load_config(cli.config.as_deref()).context("failed to load config")
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Commands::Replay {
            script,
            seed,
            out,
            json,
            offline,
        } => cmd_replay(&cli, script, *seed, out.as_deref(), *json, *offline).await,
        Commands::Serve { seed, out, restore } => {
            let config = config(&cli)?;
            serve::run(&config, *seed, out.as_deref(), restore.as_deref()).await
        }
        Commands::Layout {
            count,
            width,
            height,
            side,
            seed,
        } => cmd_layout(&cli, *count, *width, *height, *side, *seed),
        Commands::Inspect { path } => cmd_inspect(path),
        Commands::Config => cmd_config(&cli),
    }
}

async fn cmd_replay(
    cli: &Cli,
    path: &Path,
    seed: u64,
    out: Option<&Path>,
    json: bool,
    offline: bool,
) -> Result<()> {
    let config = config(cli)?;
    let script = Script::load(path).with_context(|| format!("failed to load {}", path.display()))?;
    let service: Arc<dyn ThoughtService> = if offline {
        Arc::new(LocalThoughtService::new())
    } else {
        build_service(&config.service).context("failed to build generation service")?
    };

    let (report, session) = run_script(&script, &config, service, seed)
        .await
        .context("replay failed")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for entry in &report.timeline {
            println!("[{:>7}ms] {}", entry.at, entry.event);
        }
        for reply in &report.articulations {
            println!("articulation: {reply}");
        }
        println!(
            "generations={} inserted={} merged={} evicted={} failed={}",
            report.generations, report.inserted, report.merged, report.evicted, report.failed
        );
        for t in &report.thoughts {
            let pin = if t.is_persistent() { " [pinned]" } else { "" };
            println!("  {:.2}  {}{pin}", t.score.weight, t.text());
        }
    }

    if let Some(out) = out {
        let snapshot = session.export_json().context("failed to serialize session")?;
        std::fs::write(out, snapshot)
            .with_context(|| format!("failed to write {}", out.display()))?;
        eprintln!("snapshot written to {}", out.display());
    }
    Ok(())
}

#[derive(Serialize)]
struct PlacedNode {
    index: usize,
    #[serde(flatten)]
    placement: Placement,
}

fn cmd_layout(
    cli: &Cli,
    count: usize,
    width: Option<f64>,
    height: Option<f64>,
    side: Option<Side>,
    seed: u64,
) -> Result<()> {
    let mut config = config(cli)?;
    if let Some(w) = width {
        config.canvas.width = w;
    }
    if let Some(h) = height {
        config.canvas.height = h;
    }
    config.canvas.validate().context("invalid canvas size")?;
    let layout = config.lifecycle.layout;
    layout.validate().context("invalid layout config")?;

    let bounds = config.canvas.bounds();
    let mut rng = SmallRng::seed_from_u64(seed);
    let mut existing: Vec<Point> = Vec::with_capacity(count);
    let mut placed = Vec::with_capacity(count);
    for index in 0..count {
        let placement = place_node(&bounds, &existing, side, &layout, &mut rng);
        existing.push(placement.position);
        placed.push(PlacedNode { index, placement });
    }
    println!("{}", serde_json::to_string_pretty(&placed)?);
    Ok(())
}

fn cmd_inspect(path: &Path) -> Result<()> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let snapshot = import_json(&text).context("failed to parse snapshot")?;

    let pinned = snapshot.thoughts.iter().filter(|t| t.is_persistent()).count();
    println!("version:    {}", snapshot.version);
    println!("timestamp:  {}", snapshot.timestamp);
    println!("thoughts:   {} ({pinned} pinned)", snapshot.thoughts.len());
    println!("inputs:     {}", snapshot.inputs.len());
    println!(
        "memory:     {} long-term, {} short-term",
        snapshot.memory.long_term.len(),
        snapshot.memory.short_term.len()
    );
    let mut thoughts = snapshot.thoughts;
    thoughts.sort_by(|a, b| b.score.priority().total_cmp(&a.score.priority()));
    for t in &thoughts {
        println!("  {:.2}  {}", t.score.weight, t.text());
    }
    Ok(())
}

fn cmd_config(cli: &Cli) -> Result<()> {
    let config = config(cli)?;
    print!("{}", tc_engine::to_toml(&config)?);
    Ok(())
}
