//! Raylib window presentation.
//!
//! [`run_window`] owns the raylib window and acts as the render unit: once
//! per display refresh it feeds keyboard and mouse state into the shared
//! pressed-input set, ticks the [`FrameSynchronizer`] against a software
//! [`Canvas`] sized to the window, and uploads the canvas to a window-sized
//! texture whenever a new frame was presented.

use log::{debug, info};
use raylib::prelude::{Color as RaylibColor, Image, MouseButton, RaylibDraw, RaylibHandle, RaylibThread, Texture2D};

use crate::error::{RenderError, Result};
use crate::resources::gameconfig::BackendConfig;
use crate::resources::input::{InputCode, PointerButton, PressedInputs};
use crate::resources::rendertarget::Canvas;
use crate::systems::framesync::{FrameSynchronizer, TickOutcome};

const POINTER_BUTTONS: [(MouseButton, PointerButton); 5] = [
    (MouseButton::MOUSE_BUTTON_LEFT, PointerButton::Primary),
    (MouseButton::MOUSE_BUTTON_MIDDLE, PointerButton::Middle),
    (MouseButton::MOUSE_BUTTON_RIGHT, PointerButton::Secondary),
    (MouseButton::MOUSE_BUTTON_BACK, PointerButton::Back),
    (MouseButton::MOUSE_BUTTON_FORWARD, PointerButton::Forward),
];

fn open_window(config: &BackendConfig) -> (RaylibHandle, RaylibThread) {
    let mut builder = raylib::init();
    builder
        .size(config.window_width as i32, config.window_height as i32)
        .title(&config.title);
    if config.resizable {
        builder.resizable();
    }
    if config.undecorated {
        builder.undecorated();
    }
    if config.fullscreen {
        builder.fullscreen();
    }
    let (mut rl, thread) = builder.build();
    if config.always_on_top {
        let state = rl.get_window_state().set_window_topmost(true);
        rl.set_window_state(state);
    }
    rl.set_target_fps(config.target_fps);
    // ESC must reach the simulation like any other key.
    rl.set_exit_key(None);
    (rl, thread)
}

fn window_size(rl: &RaylibHandle) -> (u32, u32) {
    (rl.get_screen_width().max(1) as u32, rl.get_screen_height().max(1) as u32)
}

fn blank_texture(rl: &mut RaylibHandle, thread: &RaylibThread, width: u32, height: u32) -> Result<Texture2D> {
    let image = Image::gen_image_color(width as i32, height as i32, RaylibColor::BLANK);
    rl.load_texture_from_image(thread, &image)
        .map_err(|e| RenderError::Io(std::io::Error::other(e.to_string())))
}

/// Copy raylib's input state into `input`.
fn feed_input(rl: &mut RaylibHandle, sync: &FrameSynchronizer, input: &PressedInputs) {
    if !rl.is_window_focused() {
        input.release_all();
        return;
    }
    while let Some(code) = rl.get_key_pressed_number() {
        input.key_down(code);
    }
    for raw in input.snapshot() {
        if let Some(InputCode::Key(code)) = InputCode::from_raw(raw) {
            // SAFETY: IsKeyUp only reads raylib's keyboard state array and
            // bounds-checks the key code.
            let released = unsafe { raylib::ffi::IsKeyUp(code as i32) };
            if released {
                input.key_up(code);
            }
        }
    }
    for (native, button) in POINTER_BUTTONS {
        if rl.is_mouse_button_down(native) {
            input.button_down(button);
        } else {
            input.button_up(button);
        }
    }
    let pos = rl.get_mouse_position();
    sync.pointer_moved(pos.x, pos.y);
}

/// Run the render loop until the window closes, or until the simulation is
/// gone when `close_when_done` is set.
pub fn run_window(config: &BackendConfig, mut sync: FrameSynchronizer, close_when_done: bool) -> Result<()> {
    let (mut rl, thread) = open_window(config);
    let (mut width, mut height) = window_size(&rl);
    let mut canvas = Canvas::new(width, height);
    let mut texture = blank_texture(&mut rl, &thread, width, height)?;
    let input = sync.input().clone();
    info!("window open at {}x{}", width, height);

    while !rl.window_should_close() {
        let (w, h) = window_size(&rl);
        if (w, h) != (width, height) {
            debug!("window resized to {}x{}", w, h);
            (width, height) = (w, h);
            texture = blank_texture(&mut rl, &thread, width, height)?;
        }

        feed_input(&mut rl, &sync, &input);

        match sync.tick(&mut canvas, width, height) {
            TickOutcome::Presented(_) => {
                if let Err(e) = texture.update_texture(canvas.image().as_raw()) {
                    debug!("texture upload failed: {}", e);
                }
            }
            TickOutcome::Disconnected if close_when_done => break,
            TickOutcome::Disconnected | TickOutcome::Idle => {}
        }

        let mut d = rl.begin_drawing(&thread);
        d.clear_background(RaylibColor::BLACK);
        d.draw_texture(&texture, 0, 0, RaylibColor::WHITE);
    }

    let stats = sync.stats();
    info!(
        "window closed: {} frames presented over {} ticks ({} fps at close)",
        stats.frames_presented,
        stats.ticks,
        sync.fps()
    );
    Ok(())
}
