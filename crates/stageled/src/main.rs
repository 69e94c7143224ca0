//! StageLED - live LED installation controller
//!
//! Streams animated frames from a library of images to a remote LED
//! driver over UDP at 30 fps, mixed live from an APC mini mk2.

use anyhow::{Context, Result};
use clap::Parser;
use stageled_control::net::resolve_target;
use stageled_control::{BitmapSender, FeedbackReceiver, MidirBackend, SurfaceDriver, SurfaceMapper};
use stageled_core::{Selection, StageConfig, StageContext};
use stageled_media::{AssetKind, Loader, PngAssetDecoder};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{error, info, warn};

mod logging_setup;
mod orchestration;

use orchestration::{animation::AnimationEngine, dispatch::DispatchEngine, status};

#[derive(Parser, Debug)]
#[command(name = "stageled", version, about = "Live LED installation controller")]
struct Args {
    /// Configuration file (TOML); built-in defaults when omitted
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Override the log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Override the animation library directory
    #[arg(long)]
    assets: Option<PathBuf>,

    /// Remote driver host to send to before any telemetry arrives
    #[arg(long)]
    target: Option<String>,
}

fn load_config(args: &Args) -> Result<StageConfig> {
    let mut config = match &args.config {
        Some(path) => StageConfig::load(path)
            .with_context(|| format!("Failed to load configuration {:?}", path))?,
        None => StageConfig::default(),
    };

    if let Some(level) = &args.log_level {
        config.log.level = level.clone();
    }
    if let Some(dir) = &args.assets {
        config.assets.directory = dir.clone();
    }
    if let Some(target) = &args.target {
        config.network.static_target = Some(target.clone());
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Seed the shared state before any worker runs
fn prepare_context(config: &StageConfig) -> Result<StageContext> {
    let ctx = StageContext::new(config.layout);
    let mut state = ctx.lock();
    state.params = config.initial_params();

    if let Some(host) = &config.network.static_target {
        let addr = resolve_target(host, config.network.remote_port)
            .with_context(|| format!("Failed to resolve remote host '{}'", host))?;
        info!("Sending to {} until telemetry arrives", addr);
        state.remote_addr = Some(addr);
    }

    let slot = config.assets.initial_preset;
    state.preset = config.assets.preset(slot).map(|name| Selection {
        slot,
        name: name.to_string(),
    });

    drop(state);
    Ok(ctx)
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;

    let _log_guard = logging_setup::init(&config.log)?;

    info!("==========================================");
    info!("===      StageLED Session Started      ===");
    info!("==========================================");
    info!(
        "{} segments x {} LEDs, assets in {:?}",
        config.layout.segments, config.layout.per_segment, config.assets.directory
    );

    let ctx = Arc::new(prepare_context(&config)?);
    let led_count = config.layout.led_count();
    let decoder = || PngAssetDecoder::new(config.assets.clone(), led_count);

    let preset_loader = Loader::new(AssetKind::Preset, decoder());
    if !preset_loader.load_selected(&ctx) {
        warn!("Initial preset unavailable, output stays black until a preset loads");
    }

    let feedback = FeedbackReceiver::bind(
        config.network.feedback_port,
        config.network.feedback_timeout(),
        config.network.remote_port,
    )
    .with_context(|| {
        format!(
            "Failed to bind feedback port {}",
            config.network.feedback_port
        )
    })?;
    let sender = BitmapSender::new().context("Failed to open transmit socket")?;

    let mut workers: Vec<(&str, JoinHandle<()>)> = Vec::new();

    workers.push(("preset-loader", preset_loader.spawn(Arc::clone(&ctx))?));
    workers.push((
        "mask-loader",
        Loader::new(AssetKind::Mask, decoder()).spawn(Arc::clone(&ctx))?,
    ));
    workers.push((
        "animation",
        AnimationEngine::new(led_count).spawn(Arc::clone(&ctx))?,
    ));
    workers.push((
        "dispatch",
        DispatchEngine::new(
            &ctx,
            config.segment_groups.clone(),
            sender,
            config.network.frame_period(),
        )
        .spawn(Arc::clone(&ctx))?,
    ));
    workers.push(("feedback", feedback.spawn(Arc::clone(&ctx))?));
    workers.push((
        "surface-driver",
        SurfaceDriver::spawn(
            MidirBackend::new(Duration::from_millis(config.surface.liveness_check_ms)),
            SurfaceMapper::new(&config.surface, &config.assets),
            &config.surface,
            Arc::clone(&ctx),
        )?,
    ));
    if let Some(handle) = status::spawn(Arc::clone(&ctx), config.status_interval_secs)? {
        workers.push(("status", handle));
    }

    info!("--- Running, press Ctrl-C to stop ---");
    wait_for_interrupt()?;

    info!("Shutting down");
    ctx.shutdown();

    for (name, handle) in workers {
        if handle.join().is_err() {
            error!("Worker '{}' panicked", name);
        }
    }

    info!("StageLED stopped");
    Ok(())
}

fn wait_for_interrupt() -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build signal runtime")?;

    runtime
        .block_on(tokio::signal::ctrl_c())
        .context("Failed to listen for Ctrl-C")
}
