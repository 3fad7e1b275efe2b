//! Shaderloop - closed-loop shader optimization CLI
//!
//! ## Commands
//!
//! - `run`: optimize a fragment shader against a target image, streaming
//!   NDJSON events on stdout
//! - `score`: print the similarity scores of two images
//! - `contract`: print the shader interface contract and the baseline shader

mod metric;
mod renderer;
mod settings;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use image::RgbImage;
use shaderloop_core::{
    CancelFlag, FrameStore, Orchestrator, RankPolicy, RunContext, ScoreEngine, ScoreWeights,
    TimedEvent, BASELINE_FRAGMENT_SHADER, INTERFACE_CONTRACT,
};
use shaderloop_llm::{LlmConfig, OpenAiCritic, OpenAiProposer};
use tokio::sync::mpsc;
use tracing::{info, warn, Level};

use crate::metric::CommandMetric;
use crate::renderer::CommandRenderer;
use crate::settings::{DirectionChoice, FileSettings, RankChoice, RunPlan};

const EVENT_BUFFER: usize = 64;

#[derive(Parser)]
#[command(name = "shaderloop")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Closed-loop shader optimization against a target image", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the optimization loop
    Run(RunArgs),

    /// Score two images against each other
    Score {
        /// First image (PNG)
        a: PathBuf,

        /// Second image (PNG)
        b: PathBuf,

        /// Composite weights, e.g. frequency=0.4,edge=0.3,texture=0.3
        #[arg(short, long)]
        weights: Option<String>,
    },

    /// Print the shader interface contract and the baseline shader
    Contract,
}

#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Target image
    #[arg(short, long)]
    pub image: PathBuf,

    /// Number of iterations
    #[arg(short = 'n', long)]
    pub iterations: Option<u32>,

    /// Frames rendered per iteration (1-30)
    #[arg(short, long)]
    pub frames: Option<u32>,

    /// Composite weights, e.g. frequency=0.4,edge=0.3,texture=0.3
    #[arg(short, long)]
    pub weights: Option<String>,

    /// Render size as WIDTHxHEIGHT
    #[arg(long, value_parser = parse_size)]
    pub size: Option<(u32, u32)>,

    /// Reference notes file passed to the proposer
    #[arg(long)]
    pub reference: Option<PathBuf>,

    /// Textual description of the target; skips discovery
    #[arg(long)]
    pub description: Option<String>,

    /// Skip the upfront target analysis
    #[arg(long)]
    pub no_discovery: bool,

    /// Renderer command line
    #[arg(long, env = "SHADERLOOP_RENDERER")]
    pub renderer: Option<String>,

    /// Renderer timeout in seconds
    #[arg(long)]
    pub renderer_timeout: Option<u64>,

    /// Rank policy for the best result
    #[arg(long, value_enum)]
    pub rank: Option<RankChoice>,

    /// External metric command line (used with --rank external)
    #[arg(long, env = "SHADERLOOP_METRIC_CMD")]
    pub metric_cmd: Option<String>,

    /// Name reported for the external metric
    #[arg(long)]
    pub metric_name: Option<String>,

    /// Whether lower or higher external metric values are better
    #[arg(long, value_enum)]
    pub metric_direction: Option<DirectionChoice>,

    /// Directory for frames and the run summary
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// TOML settings file; flags override its values
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

fn parse_size(s: &str) -> std::result::Result<(u32, u32), String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got {s:?}"))?;
    let w = w.trim().parse().map_err(|e| format!("width: {e}"))?;
    let h = h.trim().parse().map_err(|e| format!("height: {e}"))?;
    Ok((w, h))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    shaderloop_core::init_tracing(cli.json, level);

    match cli.command {
        Commands::Run(args) => cmd_run(&args).await,
        Commands::Score { a, b, weights } => cmd_score(&a, &b, weights.as_deref()),
        Commands::Contract => {
            cmd_contract();
            Ok(())
        }
    }
}

fn load_image(path: &Path) -> Result<RgbImage> {
    Ok(image::open(path)
        .with_context(|| format!("Failed to open image {}", path.display()))?
        .to_rgb8())
}

async fn cmd_run(args: &RunArgs) -> Result<()> {
    let file = match &args.config {
        Some(path) => FileSettings::load(path)?,
        None => FileSettings::default(),
    };
    let plan: RunPlan = settings::resolve(file, args)?;

    let target = load_image(&args.image)?;
    let mut ctx = RunContext::new(target);
    if let Some(path) = &plan.reference {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read reference {}", path.display()))?;
        ctx = ctx.with_reference_context(text);
    }
    if let Some(description) = &plan.description {
        ctx = ctx.with_description(description.clone());
    }

    let llm = LlmConfig::from_env();
    let proposer = OpenAiProposer::new(&llm).context("Failed to build proposer")?;
    let critic = OpenAiCritic::new(&llm).context("Failed to build critic")?;
    let renderer =
        CommandRenderer::new(plan.renderer.clone()).with_timeout(plan.renderer_timeout);

    let mut orchestrator =
        Orchestrator::new(Arc::new(proposer), Arc::new(renderer), Arc::new(critic));
    if let Some(metric) = &plan.metric {
        orchestrator = orchestrator.with_rank_policy(RankPolicy::External(Arc::new(
            CommandMetric::new(metric.command.clone(), metric.name.clone(), metric.direction),
        )));
    }
    if let Some(out) = &plan.out {
        let store = FrameStore::open(out)
            .with_context(|| format!("Failed to create output directory {}", out.display()))?;
        orchestrator = orchestrator.with_frame_store(store);
    }

    let cancel = CancelFlag::new();
    let ctx = ctx.with_cancel_flag(cancel.clone());
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; finishing current iteration");
            cancel.cancel();
        }
    });

    let (tx, mut rx) = mpsc::channel::<TimedEvent>(EVENT_BUFFER);
    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match serde_json::to_string(&event) {
                Ok(line) => println!("{line}"),
                Err(e) => warn!(error = %e, "failed to serialize event"),
            }
        }
    });

    let outcome = orchestrator
        .run_streaming(&plan.config, ctx, tx)
        .await
        .context("Run failed")?;
    printer.await.context("Event printer failed")?;

    info!(
        run_id = %outcome.run_id,
        iterations = outcome.iterations(),
        best_iteration = outcome.best.iteration,
        rank_metric = %outcome.best.metric,
        rank_value = ?outcome.best.rank_value,
        cancelled = outcome.cancelled,
        "run complete"
    );
    Ok(())
}

fn cmd_score(a: &Path, b: &Path, weights: Option<&str>) -> Result<()> {
    let weights = match weights {
        Some(spec) => settings::parse_weights(spec)?,
        None => ScoreWeights::default(),
    };
    let a = load_image(a)?;
    let b = load_image(b)?;
    let scores = ScoreEngine::default()
        .score(&a, &b, &weights)
        .context("Scoring failed")?;
    println!("{}", serde_json::to_string_pretty(&scores)?);
    Ok(())
}

fn cmd_contract() {
    println!("{INTERFACE_CONTRACT}");
    println!();
    println!("{BASELINE_FRAGMENT_SHADER}");
}
