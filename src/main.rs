//! Aberred FX demo executable.
//!
//! Opens a raylib window and presents a scene driven by a simulation thread
//! through the frame handshake:
//!
//! 1. Parse the command line and load `config.ini` (a malformed file is fatal)
//! 2. Start the raylib audio thread (falls back to silence without a device)
//! 3. Load the scene from `--scene` or generate the built-in one
//! 4. Spawn the simulation thread; it animates the scene and ends one frame
//!    per step
//! 5. Run the render loop on the main thread until the window closes
//!
//! # Running
//!
//! ```sh
//! cargo run --release --features raylib -- --scene demos/scene.json
//! ```

// Do not create console on Windows
#![cfg_attr(target_os = "windows", windows_subsystem = "windows")]

use aberredfx::components::color::LogicalColor;
use aberredfx::error::SyncError;
use aberredfx::resources::audio::AudioBridge;
use aberredfx::resources::gameconfig::BackendConfig;
use aberredfx::resources::input::InputCode;
use aberredfx::resources::store::ResourceStore;
use aberredfx::scene::{Scene, demo_scene, load_scene};
use aberredfx::systems::audio::RaylibAudioBackend;
use aberredfx::systems::framesync::{SimulationHandle, presenter};
use aberredfx::systems::window::run_window;
use clap::Parser;
use log::{debug, error, info, warn};
use std::path::PathBuf;
use std::process::ExitCode;

/// Raylib key code for the space bar.
const KEY_SPACE: u32 = 32;
const DEMO_SEED: u64 = 0xABE;
const DEMO_SHAPES: usize = 48;

/// Aberred FX presentation backend demo
#[derive(Parser)]
#[command(version, about = "Presents a 2D scene through the Aberred FX frame handshake.")]
struct Cli {
    /// Configuration file.
    #[arg(long, value_name = "PATH", default_value = "./config.ini")]
    config: PathBuf,

    /// JSON scene to present instead of the built-in one.
    #[arg(long, value_name = "PATH")]
    scene: Option<PathBuf>,

    /// Stop the simulation after this many steps and close the window.
    #[arg(long, value_name = "N")]
    frames: Option<u64>,
}

/// Simulation loop: spin every drawable a little per step. Space pauses.
fn simulate(mut sim: SimulationHandle, scene: Scene, frames: Option<u64>) -> Result<u64, SyncError> {
    let ids: Vec<_> = scene.drawables.iter().map(|d| d.id).collect();
    sim.begin_frame(scene.drawables);
    let mut step = 0u64;
    while frames.is_none_or(|limit| step < limit) {
        if !sim.is_pressed(InputCode::Key(KEY_SPACE)) {
            for (i, id) in ids.iter().enumerate() {
                let speed = 0.5 + (i % 5) as f32 * 0.25;
                sim.drawables().update(*id, |d| d.rotation += speed);
            }
        }
        sim.end_frame(scene.background)?;
        step += 1;
    }
    Ok(step)
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let mut config = BackendConfig::with_path(&cli.config);
    if config.config_path.exists() {
        if let Err(e) = config.load_from_file() {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    } else {
        warn!("{:?} not found, using default configuration", config.config_path);
    }

    let audio = match RaylibAudioBackend::start() {
        Ok(backend) => AudioBridge::new(Box::new(backend)),
        Err(e) => {
            warn!("audio disabled: {}", e);
            AudioBridge::silent()
        }
    };
    let resources = ResourceStore::new(audio).into_shared();

    let scene = match &cli.scene {
        Some(path) => match load_scene(path) {
            Ok(scene) => scene,
            Err(e) => {
                error!("{}", e);
                return ExitCode::FAILURE;
            }
        },
        None => {
            let mut scene = demo_scene(DEMO_SEED, config.render_width, config.render_height, DEMO_SHAPES);
            scene.background = LogicalColor::new(0.08, 0.08, 0.12, 1.0);
            scene
        }
    };
    if let Err(e) = scene.load_resources(&mut resources.lock()) {
        error!("failed to load scene resources: {}", e);
        return ExitCode::FAILURE;
    }

    let (sim, sync) = match presenter(&config, resources) {
        Ok(pair) => pair,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let frames = cli.frames;
    let simulation = match std::thread::Builder::new()
        .name("simulation".into())
        .spawn(move || simulate(sim, scene, frames))
    {
        Ok(handle) => handle,
        Err(e) => {
            error!("failed to spawn simulation thread: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let result = run_window(&config, sync, frames.is_some());

    match simulation.join() {
        Ok(Ok(steps)) => info!("simulation finished after {} steps", steps),
        Ok(Err(SyncError::Disconnected)) => debug!("simulation stopped with the window"),
        Ok(Err(e)) => warn!("simulation stopped: {}", e),
        Err(_) => error!("simulation thread panicked"),
    }

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
