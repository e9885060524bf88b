//! Frame synchronizer.
//!
//! Runs once per display refresh tick on the render unit. Each tick it
//! recomputes the logical-to-physical transform, then checks the handshake:
//! with no frame pending it returns [`TickOutcome::Idle`]; with one pending it
//! clears the target, fills the background with the frame's color, draws a
//! snapshot of the drawable collection and releases the simulation for its
//! next step. That is the only place a pending frame is consumed, so every
//! `end_frame` produces exactly one draw pass.
//!
//! [`presenter`] builds both halves: the [`FrameSynchronizer`] for the render
//! unit and the [`SimulationHandle`] the game logic talks to.

use log::{debug, info};
use rustc_hash::FxHashSet;
use std::time::{Duration, Instant};

use crate::components::color::LogicalColor;
use crate::components::drawable::Drawable;
use crate::components::transform::Affine;
use crate::error::{Result, SyncError};
use crate::events::frame::{FrameConsumer, FrameProducer, frame_channel};
use crate::resources::drawables::DrawableSet;
use crate::resources::gameconfig::BackendConfig;
use crate::resources::input::{InputCode, PressedInputs};
use crate::resources::rendertarget::RenderTarget;
use crate::resources::store::{ResourceStore, SharedResources};
use crate::resources::surface::{
    ScaleMode, SharedSurface, SurfaceSize, physical_to_logical, surface_transform,
};
use crate::systems::render::{DrawDispatcher, FrameReport};

const FPS_WINDOW: Duration = Duration::from_secs(1);

/// What a tick did.
#[derive(Debug)]
pub enum TickOutcome {
    /// No frame was pending.
    Idle,
    /// A frame was drawn and the simulation released.
    Presented(FrameReport),
    /// The simulation side is gone; nothing more will arrive.
    Disconnected,
}

/// Counters kept across ticks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub ticks: u64,
    pub idle_ticks: u64,
    pub frames_presented: u64,
    pub skipped_drawables: u64,
}

/// Render-unit half of the presenter.
pub struct FrameSynchronizer {
    consumer: FrameConsumer,
    drawables: DrawableSet,
    dispatcher: DrawDispatcher,
    resources: SharedResources,
    surface: SharedSurface,
    scale_mode: ScaleMode,
    input: PressedInputs,
    transform: Affine,
    stats: FrameStats,
    fps: u32,
    fps_frames: u32,
    fps_since: Instant,
    disconnected: bool,
}

impl FrameSynchronizer {
    /// Run one refresh tick against a target of the given physical size.
    pub fn tick(&mut self, target: &mut dyn RenderTarget, physical_w: u32, physical_h: u32) -> TickOutcome {
        self.stats.ticks += 1;
        let logical = self.surface.get();
        self.transform = surface_transform(physical_w, physical_h, logical.w, logical.h, self.scale_mode);
        self.resources.lock().audio.pump();

        let background = match self.consumer.poll() {
            Ok(Some(color)) => color,
            Ok(None) => {
                self.stats.idle_ticks += 1;
                return TickOutcome::Idle;
            }
            Err(_) => {
                if !self.disconnected {
                    info!("simulation disconnected after {} frames", self.stats.frames_presented);
                    self.disconnected = true;
                }
                return TickOutcome::Disconnected;
            }
        };

        if target.size() != (physical_w, physical_h) {
            debug!("render target resized to {}x{}", physical_w, physical_h);
            target.resize(physical_w, physical_h);
        }
        target.set_transform(Affine::IDENTITY);
        target.clear();
        target.fill_background(background);

        let snapshot = self.drawables.snapshot();
        let report = {
            let resources = self.resources.lock();
            self.dispatcher.draw_all(&snapshot, self.transform, target, &resources)
        };

        if self.consumer.advance().is_err() && !self.disconnected {
            info!("simulation disconnected while presenting");
            self.disconnected = true;
        }

        self.stats.frames_presented += 1;
        self.stats.skipped_drawables += report.skipped.len() as u64;
        self.count_fps();
        TickOutcome::Presented(report)
    }

    fn count_fps(&mut self) {
        self.fps_frames += 1;
        let elapsed = self.fps_since.elapsed();
        if elapsed >= FPS_WINDOW {
            self.fps = self.fps_frames;
            self.fps_frames = 0;
            self.fps_since = Instant::now();
        }
    }

    /// Store a pointer position given in physical coordinates.
    pub fn pointer_moved(&self, physical_x: f32, physical_y: f32) {
        let (x, y) = physical_to_logical(physical_x, physical_y, &self.transform, self.surface.get());
        self.input.pointer_moved(x, y);
    }

    pub fn input(&self) -> &PressedInputs {
        &self.input
    }

    /// Transform used by the most recent tick.
    pub fn transform(&self) -> Affine {
        self.transform
    }

    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    /// Frames presented during the last full second.
    pub fn fps(&self) -> u32 {
        self.fps
    }

    pub fn is_disconnected(&self) -> bool {
        self.disconnected
    }
}

/// Simulation-unit half of the presenter.
pub struct SimulationHandle {
    producer: FrameProducer,
    drawables: DrawableSet,
    resources: SharedResources,
    surface: SharedSurface,
    input: PressedInputs,
}

impl SimulationHandle {
    /// Install the drawables for the coming frame, replacing the previous set.
    pub fn begin_frame(&self, drawables: impl IntoIterator<Item = Drawable>) {
        self.drawables.replace(drawables);
    }

    /// Shared collection, for incremental edits between frames.
    pub fn drawables(&self) -> &DrawableSet {
        &self.drawables
    }

    /// Hand the frame to the render unit and block until it was presented.
    pub fn end_frame(&mut self, background: LogicalColor) -> std::result::Result<(), SyncError> {
        self.producer.end_frame(background.resolve())
    }

    /// First half of [`end_frame`](Self::end_frame): mark the frame ready
    /// without blocking.
    pub fn signal_frame(&mut self, background: LogicalColor) -> std::result::Result<(), SyncError> {
        self.producer.signal_frame(background.resolve())
    }

    /// Second half of [`end_frame`](Self::end_frame).
    pub fn wait_for_advance(&mut self) -> std::result::Result<(), SyncError> {
        self.producer.wait_for_advance()
    }

    /// Change the logical surface size.
    pub fn on_resize(&self, width: u32, height: u32) {
        info!("logical surface resized to {}x{}", width, height);
        self.surface.set(SurfaceSize::new(width, height));
    }

    pub fn logical_size(&self) -> SurfaceSize {
        self.surface.get()
    }

    pub fn resources(&self) -> &SharedResources {
        &self.resources
    }

    /// Run `f` with the resource store locked.
    pub fn with_resources<R>(&self, f: impl FnOnce(&mut ResourceStore) -> R) -> R {
        f(&mut self.resources.lock())
    }

    pub fn pressed_inputs(&self) -> FxHashSet<i32> {
        self.input.snapshot()
    }

    pub fn is_pressed(&self, code: InputCode) -> bool {
        self.input.is_pressed(code)
    }

    pub fn pointer_x(&self) -> i32 {
        self.input.pointer_x()
    }

    pub fn pointer_y(&self) -> i32 {
        self.input.pointer_y()
    }

    pub fn string_width(&self, text: &str, font_key: &str) -> Result<f32> {
        self.resources.lock().fonts.string_width(text, font_key)
    }

    pub fn string_height(&self, text: &str, font_key: &str) -> Result<f32> {
        self.resources.lock().fonts.string_height(text, font_key)
    }
}

/// Wire a presenter for `config` around `resources`.
pub fn presenter(
    config: &BackendConfig,
    resources: SharedResources,
) -> Result<(SimulationHandle, FrameSynchronizer)> {
    config.validate()?;
    let (producer, consumer) = frame_channel(config.frame_timeout);
    let drawables = DrawableSet::new();
    let surface = SharedSurface::new(SurfaceSize::new(config.render_width, config.render_height));
    let input = PressedInputs::new();

    let sync = FrameSynchronizer {
        consumer,
        drawables: drawables.clone(),
        dispatcher: DrawDispatcher::new(drawables.invalidations()),
        resources: resources.clone(),
        surface: surface.clone(),
        scale_mode: config.scale_mode,
        input: input.clone(),
        transform: Affine::IDENTITY,
        stats: FrameStats::default(),
        fps: 0,
        fps_frames: 0,
        fps_since: Instant::now(),
        disconnected: false,
    };
    let handle = SimulationHandle {
        producer,
        drawables,
        resources,
        surface,
        input,
    };
    Ok((handle, sync))
}
