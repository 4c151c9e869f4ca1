//! # wlpane demo
//!
//! Opens one window, fills it with a slowly cycling grey, swaps, drains
//! events and logs the frame rate once per second. Escape, a compositor
//! close request, Ctrl+C or `--frames` end the loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, error, info, warn};

use wlpane::backend::{Backend, HeadlessBackend, HeadlessOptions};
use wlpane::{EventKind, PaneConfig, Session, Window};

#[derive(Parser)]
#[command(name = "wlpane")]
#[command(about = "A pollable software-rendered Wayland window")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "~/.config/wlpane/wlpane.toml")]
    config: String,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Window width in pixels
    #[arg(long, default_value_t = 800)]
    width: u32,

    /// Window height in pixels
    #[arg(long, default_value_t = 600)]
    height: u32,

    /// Number of buffer slots (overrides the config file)
    #[arg(long)]
    slots: Option<u8>,

    /// Pacing policy: unpaced, blocking-round-trip, frame-callback-gated
    #[arg(long)]
    pacing: Option<String>,

    /// Swap without waiting for the compositor
    #[arg(long)]
    no_vsync: bool,

    /// Display to connect to (socket name or absolute path)
    #[arg(long)]
    display: Option<String>,

    /// Render against the in-process compositor instead of a real display
    #[arg(long, default_value_t = false)]
    headless: bool,

    /// Stop after this many frames
    #[arg(long)]
    frames: Option<u64>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();

    info!("🚀 Starting wlpane demo");
    info!(
        "📄 Version: {} ({}, built {})",
        wlpane::VERSION,
        env!("WLPANE_TARGET"),
        env!("WLPANE_BUILD_DATE")
    );
    debug!("commit {}", env!("WLPANE_GIT_COMMIT"));

    let config = load_config(&cli)?;

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = Arc::clone(&running);
        ctrlc::set_handler(move || running.store(false, Ordering::SeqCst))
            .context("failed to install Ctrl+C handler")?;
    }

    if cli.headless {
        info!("🖥️ Headless mode enabled - rendering against the in-process compositor");
        let (backend, _control) = HeadlessBackend::new(HeadlessOptions::default());
        let mut session = Session::with_backend(backend)?;
        let frames = run(&mut session, &config, &cli, &running)?;
        session.disconnect();
        info!("👋 Rendered {} frames headless", frames);
        return Ok(());
    }

    let mut session = match Session::connect(config.session.display.as_deref()) {
        Ok(session) => session,
        Err(e) => {
            error!("❌ Cannot connect to display server: {}", e);
            return Err(e.into());
        }
    };
    let frames = run(&mut session, &config, &cli, &running)?;
    session.disconnect();
    info!("👋 Rendered {} frames", frames);
    Ok(())
}

fn load_config(cli: &Cli) -> Result<PaneConfig> {
    let mut config = match PaneConfig::load(&cli.config) {
        Ok(config) => {
            info!("✅ Configuration loaded from: {}", cli.config);
            config
        }
        Err(e) => {
            warn!("⚠️ Failed to load configuration: {:#}", e);
            info!("📝 Using default configuration");
            PaneConfig::default()
        }
    };

    // Override config with CLI flags
    if let Some(slots) = cli.slots {
        config.window.slot_count = slots;
    }
    if let Some(pacing) = &cli.pacing {
        config.window.pacing = pacing.parse()?;
    }
    if let Some(display) = &cli.display {
        config.session.display = Some(display.clone());
    }
    config.validate().context("invalid configuration")?;
    Ok(config)
}

/// Grey level for the frame drawn `elapsed_ms` after start.
fn shade_at(elapsed_ms: u128) -> u32 {
    ((elapsed_ms / 10) % 0xFF) as u32
}

fn grey(shade: u32) -> u32 {
    0xFF00_0000 | shade << 16 | shade << 8 | shade
}

fn run<B: Backend>(
    session: &mut Session<B>,
    config: &PaneConfig,
    cli: &Cli,
    running: &AtomicBool,
) -> Result<u64> {
    let mut window = Window::create_with(session, config, 0, 0, cli.width, cli.height)
        .context("cannot create window")?;

    let start = Instant::now();
    let mut last_report = start;
    let mut frames_since_report = 0u32;
    let mut total = 0u64;

    while !window.should_close() && running.load(Ordering::SeqCst) {
        if cli.frames.is_some_and(|limit| total >= limit) {
            break;
        }

        let color = grey(shade_at(start.elapsed().as_millis()));
        window.get_active_buffer()?.fill(color);
        window.swap_buffers(!cli.no_vsync)?;
        total += 1;
        frames_since_report += 1;

        while let Some(event) = window.get_event() {
            match event.kind {
                EventKind::Close => {
                    info!("🚪 Close requested by the compositor");
                    window.request_close();
                }
                EventKind::ConnectionLost => warn!("⚠️ Compositor connection lost"),
                EventKind::Configure => debug!("configure {}x{}", event.a, event.b),
                _ => debug!("{:?}", event),
            }
        }

        let since = last_report.elapsed();
        if since.as_millis() >= 1000 {
            let fps = frames_since_report as f64 / since.as_secs_f64();
            info!("📊 FPS: {:.1}", fps);
            frames_since_report = 0;
            last_report = Instant::now();
        }
    }

    window.destroy();
    Ok(total)
}
