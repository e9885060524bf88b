//! Backend configuration.
//!
//! Window, logical surface and handshake settings loaded from an INI file.
//! Every key is optional and falls back to a safe default; a value that is
//! present but malformed is a [`RenderError::Configuration`], which the
//! binary treats as fatal before the frame loop starts.
//!
//! # Configuration File Format
//!
//! ```ini
//! [window]
//! title = Aberred FX
//! width = 1280
//! height = 720
//! resizable = true
//! undecorated = false
//! always_on_top = false
//! fullscreen = false
//! target_fps = 60
//!
//! [render]
//! width = 640
//! height = 360
//! scale_mode = letterbox
//!
//! [sync]
//! run_on_this_thread = false
//! frame_timeout_ms = 0
//! ```

use configparser::ini::Ini;
use log::info;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{RenderError, Result};
use crate::resources::surface::ScaleMode;

/// Default safe values for startup
const DEFAULT_TITLE: &str = "Aberred FX";
const DEFAULT_RENDER_WIDTH: u32 = 640;
const DEFAULT_RENDER_HEIGHT: u32 = 360;
const DEFAULT_WINDOW_WIDTH: u32 = 1280;
const DEFAULT_WINDOW_HEIGHT: u32 = 720;
const DEFAULT_TARGET_FPS: u32 = 60;
const DEFAULT_CONFIG_PATH: &str = "./config.ini";

#[derive(Debug, Clone, PartialEq)]
pub struct BackendConfig {
    pub title: String,
    /// Window width in pixels.
    pub window_width: u32,
    /// Window height in pixels.
    pub window_height: u32,
    pub resizable: bool,
    pub undecorated: bool,
    pub always_on_top: bool,
    /// Start in fullscreen mode.
    pub fullscreen: bool,
    /// Display refresh rate the render loop is paced at.
    pub target_fps: u32,
    /// Logical surface width in pixels.
    pub render_width: u32,
    /// Logical surface height in pixels.
    pub render_height: u32,
    pub scale_mode: ScaleMode,
    /// Whether the simulation would share the render thread. The backend
    /// always needs its own render unit, so `true` is rejected.
    pub run_on_this_thread: bool,
    /// How long the simulation waits for the next-step signal. `None`
    /// blocks forever.
    pub frame_timeout: Option<Duration>,
    /// Path to the configuration file.
    pub config_path: PathBuf,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl BackendConfig {
    /// Create a new configuration with safe default values.
    pub fn new() -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
            window_width: DEFAULT_WINDOW_WIDTH,
            window_height: DEFAULT_WINDOW_HEIGHT,
            resizable: true,
            undecorated: false,
            always_on_top: false,
            fullscreen: false,
            target_fps: DEFAULT_TARGET_FPS,
            render_width: DEFAULT_RENDER_WIDTH,
            render_height: DEFAULT_RENDER_HEIGHT,
            scale_mode: ScaleMode::default(),
            run_on_this_thread: false,
            frame_timeout: None,
            config_path: PathBuf::from(DEFAULT_CONFIG_PATH),
        }
    }

    /// Create a new configuration with a custom config file path.
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: path.into(),
            ..Self::new()
        }
    }

    /// Load configuration from the INI file at `config_path`.
    ///
    /// Missing values retain their current (default) values.
    pub fn load_from_file(&mut self) -> Result<()> {
        let mut config = Ini::new();
        config.load(&self.config_path).map_err(|e| {
            RenderError::Configuration(format!(
                "failed to load {}: {}",
                self.config_path.display(),
                e
            ))
        })?;
        self.apply(&config)?;
        info!(
            "Loaded config: {}x{} logical ({}), {}x{} window, fps={}, fullscreen={}",
            self.render_width,
            self.render_height,
            self.scale_mode.as_str(),
            self.window_width,
            self.window_height,
            self.target_fps,
            self.fullscreen
        );
        Ok(())
    }

    /// Parse configuration from INI text.
    pub fn load_from_str(&mut self, text: &str) -> Result<()> {
        let mut config = Ini::new();
        config
            .read(text.to_string())
            .map_err(|e| RenderError::Configuration(format!("failed to parse config: {e}")))?;
        self.apply(&config)
    }

    fn apply(&mut self, config: &Ini) -> Result<()> {
        // [window] section
        if let Some(title) = config.get("window", "title") {
            self.title = title;
        }
        set_uint(config, "window", "width", &mut self.window_width)?;
        set_uint(config, "window", "height", &mut self.window_height)?;
        set_bool(config, "window", "resizable", &mut self.resizable)?;
        set_bool(config, "window", "undecorated", &mut self.undecorated)?;
        set_bool(config, "window", "always_on_top", &mut self.always_on_top)?;
        set_bool(config, "window", "fullscreen", &mut self.fullscreen)?;
        set_uint(config, "window", "target_fps", &mut self.target_fps)?;

        // [render] section
        set_uint(config, "render", "width", &mut self.render_width)?;
        set_uint(config, "render", "height", &mut self.render_height)?;
        if let Some(mode) = config.get("render", "scale_mode") {
            self.scale_mode = mode.parse()?;
        }

        // [sync] section
        set_bool(config, "sync", "run_on_this_thread", &mut self.run_on_this_thread)?;
        let mut timeout_ms = timeout_millis(self.frame_timeout);
        set_uint(config, "sync", "frame_timeout_ms", &mut timeout_ms)?;
        self.frame_timeout = (timeout_ms > 0).then(|| Duration::from_millis(timeout_ms as u64));

        self.validate()
    }

    /// Reject settings the backend cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.run_on_this_thread {
            return Err(RenderError::Configuration(
                "run_on_this_thread must be false: the render loop needs its own unit".into(),
            ));
        }
        if self.render_width == 0 || self.render_height == 0 {
            return Err(RenderError::Configuration(format!(
                "logical surface must not be empty ({}x{})",
                self.render_width, self.render_height
            )));
        }
        if self.target_fps == 0 {
            return Err(RenderError::Configuration("target_fps must be positive".into()));
        }
        Ok(())
    }

    /// Save configuration to the INI file at `path`.
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut config = Ini::new();

        // [window] section
        config.set("window", "title", Some(self.title.clone()));
        config.set("window", "width", Some(self.window_width.to_string()));
        config.set("window", "height", Some(self.window_height.to_string()));
        config.set("window", "resizable", Some(self.resizable.to_string()));
        config.set("window", "undecorated", Some(self.undecorated.to_string()));
        config.set("window", "always_on_top", Some(self.always_on_top.to_string()));
        config.set("window", "fullscreen", Some(self.fullscreen.to_string()));
        config.set("window", "target_fps", Some(self.target_fps.to_string()));

        // [render] section
        config.set("render", "width", Some(self.render_width.to_string()));
        config.set("render", "height", Some(self.render_height.to_string()));
        config.set("render", "scale_mode", Some(self.scale_mode.as_str().to_string()));

        // [sync] section
        config.set("sync", "run_on_this_thread", Some(self.run_on_this_thread.to_string()));
        let timeout_ms = timeout_millis(self.frame_timeout);
        config.set("sync", "frame_timeout_ms", Some(timeout_ms.to_string()));

        config.write(path.as_ref())?;
        info!("Saved config to {:?}", path.as_ref());
        Ok(())
    }

    /// Logical surface size.
    pub fn render_size(&self) -> (u32, u32) {
        (self.render_width, self.render_height)
    }

    /// Get the window size.
    pub fn window_size(&self) -> (u32, u32) {
        (self.window_width, self.window_height)
    }
}

/// Timeout as stored in the file: 0 for none, saturating at `u32::MAX` ms.
fn timeout_millis(timeout: Option<Duration>) -> u32 {
    timeout
        .map(|d| u32::try_from(d.as_millis()).unwrap_or(u32::MAX))
        .unwrap_or(0)
}

fn set_uint(config: &Ini, section: &str, key: &str, target: &mut u32) -> Result<()> {
    match config.getuint(section, key) {
        Ok(Some(v)) => {
            *target = u32::try_from(v).map_err(|_| {
                RenderError::Configuration(format!("[{section}] {key} = {v} is out of range"))
            })?;
            Ok(())
        }
        Ok(None) => Ok(()),
        Err(e) => Err(RenderError::Configuration(format!("[{section}] {key}: {e}"))),
    }
}

fn set_bool(config: &Ini, section: &str, key: &str, target: &mut bool) -> Result<()> {
    match config.getbool(section, key) {
        Ok(Some(v)) => {
            *target = v;
            Ok(())
        }
        Ok(None) => Ok(()),
        Err(e) => Err(RenderError::Configuration(format!("[{section}] {key}: {e}"))),
    }
}
