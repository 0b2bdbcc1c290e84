use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use image::Rgba;

use nbody_sim::viewer::{run_viewer, ViewerOptions};
use nbody_sim::{FrameCanvas, Simulation, SpriteSheet, Universe, Viewport};

/// Runs a planar gravitational N-body simulation.
#[derive(Parser, Debug)]
struct Args {
    /// Total simulated time
    total_time: f64,
    /// Length of one time step
    delta_time: f64,
    /// Initial conditions file
    universe: PathBuf,
    /// Write a PNG frame into this directory
    #[arg(long)]
    frames: Option<PathBuf>,
    /// Steps between frames (also steps per redraw in the window)
    #[arg(long, default_value_t = 1)]
    frame_every: u32,
    /// Directory holding the body sprites, looked up by name
    #[arg(long)]
    images: Option<PathBuf>,
    /// Frame edge length in pixels
    #[arg(long, default_value_t = 512)]
    size: u32,
    /// Animate in a window instead of running headless
    #[arg(long)]
    window: bool,
}

fn load_sprites(args: &Args, universe: &Universe) -> Result<SpriteSheet> {
    match &args.images {
        Some(dir) => SpriteSheet::load(dir, universe.bodies.iter().map(|b| b.name()))
            .with_context(|| format!("failed to load sprites from {}", dir.display())),
        None => Ok(SpriteSheet::new()),
    }
}

fn run_headless(
    args: &Args,
    mut simulation: Simulation,
    sprites: SpriteSheet,
) -> Result<Simulation> {
    let Some(dir) = &args.frames else {
        simulation.run(args.total_time, args.delta_time, |_, _| {})?;
        return Ok(simulation);
    };

    std::fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    let viewport = Viewport::new(simulation.radius, args.size, args.size);
    let mut canvas = FrameCanvas::new(viewport, sprites);
    let every = u64::from(args.frame_every.max(1));
    let mut written = 0u64;
    let mut failure = None;

    simulation.run(args.total_time, args.delta_time, |step, sim| {
        if failure.is_some() || step % every != 0 {
            return;
        }
        canvas.clear(Rgba([0, 0, 0, 255]));
        sim.draw(&mut canvas);
        let path = dir.join(format!("frame{written:06}.png"));
        match canvas.save(&path) {
            Ok(()) => written += 1,
            Err(e) => failure = Some(e),
        }
    })?;

    if let Some(e) = failure {
        return Err(e.into());
    }
    log::info!("wrote {written} frames to {}", dir.display());
    Ok(simulation)
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let universe = Universe::from_path(&args.universe)?;
    let sprites = load_sprites(&args, &universe)?;
    let simulation = Simulation::new(universe);
    let start_energy = simulation.total_energy();

    let simulation = if args.window {
        run_viewer(
            simulation,
            &sprites,
            ViewerOptions {
                total_time: args.total_time,
                delta_time: args.delta_time,
                steps_per_frame: args.frame_every.max(1),
                size: args.size,
            },
        )?
    } else {
        run_headless(&args, simulation, sprites)?
    };

    log::info!(
        "energy drift {:e} over t = {:e}",
        simulation.total_energy() - start_energy,
        simulation.elapsed
    );

    for line in simulation.header().into_iter().chain(simulation.summary()) {
        println!("{line}");
    }

    Ok(())
}
