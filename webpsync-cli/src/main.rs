use anyhow::{anyhow, Context, Result};
use clap::{builder::BoolishValueParser, ArgAction, Parser};
use std::{fs, path::Path, path::PathBuf};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use webpsync_core::{
    scan_tree, spawn_task, ConversionConfig, MagickTranscoder, Reconciler, RunStatistics,
    TaskState,
};

const DEFAULT_LOG_FILTER: &str = "webpsync=info,webpsync_core=info";

#[derive(Parser, Debug)]
#[command(name = "webpsync", version, about = "webpsync – keep a WebP mirror of a JPEG tree")]
struct Cli {
    /// Path to a config file (YAML / JSON). Replaces the options below when given.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(long, env = "INPUT_DIR", default_value = "/data/input")]
    input_dir: PathBuf,

    #[arg(long, env = "OUTPUT_DIR", default_value = "/data/output")]
    output_dir: PathBuf,

    #[arg(long, env = "WEBP_QUALITY", default_value_t = 82,
          value_parser = clap::value_parser!(u8).range(0..=100))]
    quality: u8,

    #[arg(long, env = "WEBP_METHOD", default_value_t = 6,
          value_parser = clap::value_parser!(u8).range(0..=6))]
    method: u8,

    #[arg(long, env = "WEBP_LOSSLESS", default_value = "false",
          action = ArgAction::Set, value_parser = BoolishValueParser::new())]
    lossless: bool,

    /// Add auto-filter and photo image-hint defines to lossy encodes
    #[arg(long, env = "WEBP_AUTO_FILTER", default_value = "true",
          action = ArgAction::Set, value_parser = BoolishValueParser::new())]
    auto_filter: bool,

    /// Total attempts per file
    #[arg(long, env = "RETRY_ATTEMPTS", default_value_t = 3)]
    retry_attempts: u32,

    /// Seconds between attempts
    #[arg(long, env = "RETRY_DELAY", default_value_t = 2)]
    retry_delay: u64,

    #[arg(long, env = "DEBOUNCE_MS", default_value_t = 150)]
    debounce_ms: u64,

    /// Transcoding engine executable
    #[arg(long, env = "WEBP_ENGINE", default_value = "magick")]
    engine: String,

    /// Reconcile the tree once and exit instead of watching
    #[arg(long)]
    once: bool,

    /// Debug-level logging (overridden by RUST_LOG)
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn to_config(&self) -> ConversionConfig {
        ConversionConfig {
            input_dir: self.input_dir.clone(),
            output_dir: self.output_dir.clone(),
            quality: self.quality,
            method: self.method,
            lossless: self.lossless,
            auto_filter: self.auto_filter,
            retry_attempts: self.retry_attempts,
            retry_delay_secs: self.retry_delay,
            debounce_ms: self.debounce_ms,
            engine: self.engine.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let cfg = match &cli.config {
        Some(path) => load_config(path)?,
        None => cli.to_config(),
    };
    cfg.validate()?;

    info!(
        "Starting watcher on {}, output to {}",
        cfg.input_dir.display(),
        cfg.output_dir.display()
    );

    let engine = MagickTranscoder::new(cfg.engine.clone());
    match engine.probe().await {
        Ok(version) => info!("{} version: {version}", engine.program()),
        Err(e) => error!("{e:#}"),
    }

    if cli.once {
        run_once(&cfg, engine).await
    } else {
        run_watch(cfg, engine).await
    }
}

fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("webpsync=debug,webpsync_core=debug")
        } else {
            EnvFilter::new(DEFAULT_LOG_FILTER)
        }
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn load_config(path: &Path) -> Result<ConversionConfig> {
    let text = fs::read_to_string(path)
        .map_err(|e| anyhow!("read config {} failed: {e}", path.display()))?;

    // Detect format by extension
    let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("");
    let cfg = match ext {
        "json" => serde_json::from_str(&text)?,
        "yaml" | "yml" => serde_yaml::from_str(&text)?,
        _ => serde_yaml::from_str(&text)?, // default to yaml
    };
    Ok(cfg)
}

async fn run_once(cfg: &ConversionConfig, engine: MagickTranscoder) -> Result<()> {
    if !cfg.input_dir.is_dir() {
        return Err(anyhow!(
            "input directory {} does not exist",
            cfg.input_dir.display()
        ));
    }
    let reconciler = Reconciler::new(cfg, engine);
    let stats = RunStatistics::new();
    let summary = scan_tree(&reconciler, &stats, || true).await;
    info!("Scan complete: {summary}");
    Ok(())
}

async fn run_watch(cfg: ConversionConfig, engine: MagickTranscoder) -> Result<()> {
    let handle = spawn_task(cfg, engine);
    let mut state_rx = handle.subscribe();

    tokio::select! {
        res = tokio::signal::ctrl_c() => {
            res.context("failed to listen for Ctrl-C")?;
            info!("Interrupt received");
        }
        _ = async {
            while state_rx.changed().await.is_ok() {
                if matches!(*state_rx.borrow(), TaskState::Error(_) | TaskState::Stopped) {
                    break;
                }
            }
        } => {}
    }

    handle.stop();
    let stats = handle.stats();
    let final_state = handle.state().clone();
    let input_dir = handle.config().input_dir.clone();
    handle.join().await?;
    info!("Stopped watching {} ({stats})", input_dir.display());

    match final_state {
        TaskState::Error(e) => Err(anyhow!(e)),
        _ => Ok(()),
    }
}
