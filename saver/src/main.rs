//! Glow Up - terminal screen saver.
//!
//! Fills the terminal with a grid of blocks that a handful of simulated
//! workers "download", counts down and starts over whenever the grid is
//! full, and locks the session on the first key press, mouse event, focus
//! loss, or signal after a short startup grace period.

use anyhow::{Context, Result};
use clap::Parser;
use glowup_core::dashboard::TerminalDashboard;
use glowup_core::{GridLayout, LifecycleCoordinator, SaverConfig};
use glowup_env::{GlowContext, ScreenSource, SessionAction, TokioContext};
use std::fs::File;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod screen;
mod session;
mod signals;

use screen::{TerminalScreen, FALLBACK_SIZE};
use session::{DryRunSession, LockScreenSession};

#[derive(Parser, Debug)]
#[command(name = "glowup")]
#[command(about = "Simulated download screen saver that locks the session on exit")]
struct Args {
    /// JSON configuration file
    #[arg(short, long, env = "GLOWUP_CONFIG")]
    config: Option<PathBuf>,

    /// Window title
    #[arg(long, env = "GLOWUP_TITLE")]
    title: Option<String>,

    /// Worker counts to draw from on every restart (comma separated)
    #[arg(long, env = "GLOWUP_WORKERS", value_delimiter = ',')]
    workers: Vec<usize>,

    /// Simulation tick interval in milliseconds
    #[arg(long, env = "GLOWUP_TICK_MS")]
    tick_ms: Option<u64>,

    /// Render interval in milliseconds
    #[arg(long, env = "GLOWUP_RENDER_MS")]
    render_ms: Option<u64>,

    /// Seconds to count down before restarting
    #[arg(long, env = "GLOWUP_COUNTDOWN")]
    countdown: Option<u32>,

    /// Startup period during which input and focus loss are ignored (ms)
    #[arg(long, env = "GLOWUP_GRACE_MS")]
    grace_ms: Option<u64>,

    /// Do not lock the session on exit
    #[arg(long, env = "GLOWUP_NO_LOCK")]
    no_lock: bool,

    /// Write logs to this file (the terminal belongs to the saver)
    #[arg(long, env = "GLOWUP_LOG_FILE")]
    log_file: Option<PathBuf>,

    /// Print the resolved configuration as JSON and exit
    #[arg(long)]
    print_config: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

/// Layers CLI and environment overrides over the file (or default)
/// configuration and validates the result.
fn resolve_config(args: &Args) -> Result<SaverConfig> {
    let mut config = match &args.config {
        Some(path) => SaverConfig::from_json_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => SaverConfig::default(),
    };

    if let Some(title) = &args.title {
        config.title = title.clone();
    }
    if !args.workers.is_empty() {
        config.worker_options = args.workers.clone();
    }
    if let Some(ms) = args.tick_ms {
        config.tick_interval_ms = ms;
    }
    if let Some(ms) = args.render_ms {
        config.render_interval_ms = ms;
    }
    if let Some(secs) = args.countdown {
        config.countdown_secs = secs;
    }
    if let Some(ms) = args.grace_ms {
        config.grace_period_ms = ms;
    }

    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn init_tracing(args: &Args) -> Result<()> {
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_ansi(false);

    match &args.log_file {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("creating log file {}", path.display()))?;
            builder.with_writer(Mutex::new(file)).init();
        }
        None => builder.with_writer(std::io::sink).init(),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = resolve_config(&args)?;

    if args.print_config {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    init_tracing(&args)?;

    let screen = TerminalScreen.screen_size_or(FALLBACK_SIZE);
    let layout = GridLayout::calculate(screen, &config.layout);
    info!(
        %screen,
        rows = layout.rows,
        cols = layout.cols,
        blocks = layout.block_count(),
        "Computed grid layout"
    );

    let session: Arc<dyn SessionAction> = if args.no_lock {
        Arc::new(DryRunSession)
    } else {
        Arc::new(LockScreenSession)
    };

    let ctx = TokioContext::shared();
    let coordinator =
        LifecycleCoordinator::shared(ctx.clone(), config, layout.block_count(), session);

    ctx.spawn("lifecycle", {
        let coordinator = coordinator.clone();
        async move { coordinator.run().await }
    });
    ctx.spawn("signals", signals::listen(coordinator.clone()));

    let dashboard = tokio::task::spawn_blocking({
        let coordinator = coordinator.clone();
        move || TerminalDashboard::new(coordinator, layout).run()
    });

    coordinator.wait_terminated().await;

    match dashboard.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(error = %e, "Dashboard exited with an error"),
        Err(e) => warn!(error = %e, "Dashboard task failed"),
    }
    info!(generation = coordinator.generation(), "Exiting");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["glowup"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults_resolve() {
        let config = resolve_config(&args(&[])).unwrap();
        assert_eq!(config, SaverConfig::default());
    }

    #[test]
    fn test_cli_overrides() {
        let config = resolve_config(&args(&[
            "--workers",
            "2,4",
            "--tick-ms",
            "100",
            "--countdown",
            "1",
            "--title",
            "Nap",
        ]))
        .unwrap();

        assert_eq!(config.worker_options, vec![2, 4]);
        assert_eq!(config.tick_interval_ms, 100);
        assert_eq!(config.countdown_secs, 1);
        assert_eq!(config.title, "Nap");
        assert_eq!(config.grace_period_ms, SaverConfig::default().grace_period_ms);
    }

    #[test]
    fn test_invalid_override_rejected() {
        assert!(resolve_config(&args(&["--workers", "0"])).is_err());
        assert!(resolve_config(&args(&["--tick-ms", "0"])).is_err());
    }

    #[test]
    fn test_missing_config_file_rejected() {
        let err = resolve_config(&args(&["--config", "/nonexistent/glowup.json"])).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/glowup.json"));
    }
}
