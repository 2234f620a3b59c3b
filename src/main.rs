#[cfg(feature = "window")]
mod app;

use std::{
    path::PathBuf,
    thread,
    time::{Duration, Instant},
};

use anyhow::{bail, Context, Result};
use clap::Parser;
use hourglass::{AssetSource, HourglassConfig, PixelSurface, Visual, VisualState};

const LOAD_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Parser, Debug)]
#[command(name = "hourglass")]
#[command(about = "Pixel-art hourglass that drains and refills forever", long_about = None)]
struct Args {
    /// Directory with frame.png, mask.png and optionally overlay.png.
    /// Uses the built-in glass when omitted.
    #[arg(long)]
    assets: Option<PathBuf>,

    /// JSON file overriding tuning constants
    #[arg(long)]
    config: Option<PathBuf>,

    /// Surface size in pixels (square)
    #[arg(long, default_value_t = 256)]
    size: u32,

    /// Window zoom factor
    #[arg(long, default_value_t = 2)]
    scale: u32,

    /// Seed for reproducible sand
    #[arg(long)]
    seed: Option<u64>,

    /// Draw one settled frame and stop animating
    #[arg(long, default_value_t = false)]
    reduced_motion: bool,

    /// Run without a window and write the last frame to --out
    #[arg(long, default_value_t = false)]
    headless: bool,

    /// Frames to run in headless mode
    #[arg(long, default_value_t = 600)]
    ticks: u64,

    /// PNG written in headless mode
    #[arg(long, default_value = "hourglass.png")]
    out: PathBuf,
}

fn mount(args: &Args, config: HourglassConfig) -> Visual {
    let source = match &args.assets {
        Some(dir) => AssetSource::Dir(dir.clone()),
        None => AssetSource::Procedural,
    };
    Visual::mount(
        [args.size, args.size].into(),
        source,
        config,
        args.reduced_motion,
        args.seed,
    )
}

fn run_headless(args: &Args, mut visual: Visual) -> Result<()> {
    let mut surface = PixelSurface::new(args.size, args.size);
    let started = Instant::now();
    while visual.state() == VisualState::Loading {
        if started.elapsed() > LOAD_TIMEOUT {
            bail!("assets did not load within {:?}", LOAD_TIMEOUT);
        }
        visual.frame(&mut surface);
        thread::sleep(Duration::from_millis(1));
    }
    if visual.state() == VisualState::Failed {
        bail!("hourglass failed to start, see log");
    }
    for _ in 1..args.ticks {
        visual.frame(&mut surface);
    }
    surface
        .buffer()
        .save(&args.out)
        .with_context(|| format!("could not write {}", args.out.display()))?;
    log::info!("wrote {}", args.out.display());
    visual.dispose();
    Ok(())
}

#[cfg(feature = "window")]
fn run_window(args: &Args, visual: Visual) -> Result<()> {
    let surface = PixelSurface::new(args.size, args.size);
    let mut app = app::App::new(visual, surface, args.scale)?;
    let texture_creator = app.texture_creator();
    let mut texture = app.frame_texture(&texture_creator)?;
    while app.is_running() {
        app.input();
        app.update();
        if let Err(e) = app.render(&mut texture) {
            log::error!("present failed: {:#}", e);
        }
    }
    app.shutdown();
    Ok(())
}

#[cfg(not(feature = "window"))]
fn run_window(_args: &Args, _visual: Visual) -> Result<()> {
    bail!("built without the `window` feature, use --headless")
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => HourglassConfig::load(path).context("loading config")?,
        None => HourglassConfig::default(),
    };

    let visual = mount(&args, config);
    if args.headless {
        run_headless(&args, visual)
    } else {
        run_window(&args, visual)
    }
}
