//! Run settings: optional TOML file overlaid by command-line flags.
//!
//! ```toml
//! renderer = "python3 render.py"
//! out = "runs/latest"
//!
//! [run]
//! iteration_count = 8
//! frame_count = 4
//! weights = { frequency = 0.5, edge = 0.5 }
//!
//! [metric]
//! command = "python3 lpips.py"
//! name = "lpips"
//! direction = "lower"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::ValueEnum;
use serde::Deserialize;
use shaderloop_core::{RankDirection, RunConfig, ScoreWeights};

use crate::RunArgs;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RankChoice {
    /// Weighted composite of the built-in similarities
    #[default]
    Composite,
    /// External metric command
    External,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DirectionChoice {
    Lower,
    Higher,
}

impl From<DirectionChoice> for RankDirection {
    fn from(choice: DirectionChoice) -> Self {
        match choice {
            DirectionChoice::Lower => RankDirection::LowerIsBetter,
            DirectionChoice::Higher => RankDirection::HigherIsBetter,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricSettings {
    pub command: Option<String>,
    pub name: Option<String>,
    pub direction: Option<DirectionChoice>,
}

/// Contents of a `--config` file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileSettings {
    pub run: RunConfig,
    pub renderer: Option<String>,
    pub renderer_timeout_secs: Option<u64>,
    pub rank: Option<RankChoice>,
    pub metric: MetricSettings,
    pub out: Option<PathBuf>,
    pub reference: Option<PathBuf>,
    pub description: Option<String>,
}

impl FileSettings {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("Invalid config {}", path.display()))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricPlan {
    pub command: Vec<String>,
    pub name: String,
    pub direction: RankDirection,
}

/// Fully resolved settings for one `run` invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct RunPlan {
    pub config: RunConfig,
    pub renderer: Vec<String>,
    pub renderer_timeout: Duration,
    pub metric: Option<MetricPlan>,
    pub out: Option<PathBuf>,
    pub reference: Option<PathBuf>,
    pub description: Option<String>,
}

/// Split a command line with POSIX shell quoting rules.
pub fn split_command(command: &str) -> Result<Vec<String>> {
    shell_words::split(command).with_context(|| format!("Invalid command line {command:?}"))
}

/// Parse `frequency=0.5,edge=0.5` into weights; omitted keys are zero.
pub fn parse_weights(spec: &str) -> Result<ScoreWeights> {
    let mut pairs = Vec::new();
    for item in spec.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let (key, value) = item
            .split_once('=')
            .with_context(|| format!("weight {item:?} is not key=value"))?;
        let value: f64 = value
            .trim()
            .parse()
            .with_context(|| format!("weight {key:?} has a non-numeric value"))?;
        pairs.push((key.trim(), value));
    }
    Ok(ScoreWeights::from_pairs(pairs)?)
}

/// Overlay `args` onto `file`. Flags always win.
pub fn resolve(file: FileSettings, args: &RunArgs) -> Result<RunPlan> {
    let mut config = file.run;
    if let Some(n) = args.iterations {
        config.iteration_count = n;
    }
    if let Some(n) = args.frames {
        config.frame_count = n;
    }
    if let Some(spec) = &args.weights {
        config.weights = parse_weights(spec)?;
    }
    if let Some((w, h)) = args.size {
        config.resolution = (w, h);
    }
    if args.no_discovery {
        config.discovery = false;
    }
    config.validate()?;

    let renderer = args
        .renderer
        .as_deref()
        .or(file.renderer.as_deref())
        .map(split_command)
        .transpose()?
        .unwrap_or_default();
    if renderer.is_empty() {
        bail!("No renderer configured; pass --renderer or set `renderer` in the config file");
    }
    let renderer_timeout = Duration::from_secs(
        args.renderer_timeout
            .or(file.renderer_timeout_secs)
            .unwrap_or(crate::renderer::DEFAULT_TIMEOUT.as_secs()),
    );

    let rank = args.rank.or(file.rank).unwrap_or_default();
    let metric = match rank {
        RankChoice::Composite => None,
        RankChoice::External => {
            let command = args
                .metric_cmd
                .as_deref()
                .or(file.metric.command.as_deref())
                .map(split_command)
                .transpose()?
                .unwrap_or_default();
            if command.is_empty() {
                bail!("--rank external requires --metric-cmd or [metric].command");
            }
            Some(MetricPlan {
                command,
                name: args
                    .metric_name
                    .clone()
                    .or(file.metric.name)
                    .unwrap_or_else(|| "external".to_string()),
                direction: args
                    .metric_direction
                    .or(file.metric.direction)
                    .unwrap_or(DirectionChoice::Lower)
                    .into(),
            })
        }
    };

    Ok(RunPlan {
        config,
        renderer,
        renderer_timeout,
        metric,
        out: args.out.clone().or(file.out),
        reference: args.reference.clone().or(file.reference),
        description: args.description.clone().or(file.description),
    })
}
