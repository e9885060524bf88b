//! Logical surface size and the logical-to-physical transform.
//!
//! The game draws on a fixed-resolution *logical* surface. Each tick the
//! synchronizer maps it onto the current *physical* surface (the window's
//! drawable area), either stretching each axis independently or scaling
//! uniformly with letterbox/pillarbox bars. In both modes the content is
//! centered.

use parking_lot::Mutex;
use std::str::FromStr;
use std::sync::Arc;

use crate::components::transform::Affine;
use crate::error::RenderError;

/// How the logical surface is fitted to the physical one.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ScaleMode {
    /// Independent x/y scale: fills the physical surface, may distort.
    #[default]
    Stretch,
    /// Uniform scale preserving aspect ratio; bars fill the rest.
    Letterbox,
}

impl FromStr for ScaleMode {
    type Err = RenderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stretch" => Ok(ScaleMode::Stretch),
            "letterbox" => Ok(ScaleMode::Letterbox),
            other => Err(RenderError::Configuration(format!(
                "unknown scale mode '{other}' (expected 'stretch' or 'letterbox')"
            ))),
        }
    }
}

impl ScaleMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ScaleMode::Stretch => "stretch",
            ScaleMode::Letterbox => "letterbox",
        }
    }
}

/// Surface size in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SurfaceSize {
    pub w: u32,
    pub h: u32,
}

impl SurfaceSize {
    pub fn new(w: u32, h: u32) -> Self {
        Self { w, h }
    }
}

/// Transform from logical to physical coordinates.
///
/// Pure function of the four sizes and the mode. A zero-sized logical
/// surface yields the identity.
pub fn surface_transform(
    physical_w: u32,
    physical_h: u32,
    logical_w: u32,
    logical_h: u32,
    mode: ScaleMode,
) -> Affine {
    if logical_w == 0 || logical_h == 0 {
        return Affine::IDENTITY;
    }
    let (pw, ph) = (physical_w as f32, physical_h as f32);
    let (lw, lh) = (logical_w as f32, logical_h as f32);
    let (sx, sy) = match mode {
        ScaleMode::Stretch => (pw / lw, ph / lh),
        ScaleMode::Letterbox => {
            let s = (pw / lw).min(ph / lh);
            (s, s)
        }
    };
    Affine::translation(pw / 2.0, ph / 2.0)
        .append(Affine::scaling(sx, sy))
        .append(Affine::translation(-lw / 2.0, -lh / 2.0))
}

/// Map a physical position (e.g. the mouse) back to logical coordinates,
/// clamped to the logical surface. Positions over the bars snap to the edge.
pub fn physical_to_logical(x: f32, y: f32, transform: &Affine, logical: SurfaceSize) -> (i32, i32) {
    let Some(inverse) = transform.inverse() else {
        return (0, 0);
    };
    let (lx, ly) = inverse.apply(x, y);
    (
        lx.clamp(0.0, logical.w as f32) as i32,
        ly.clamp(0.0, logical.h as f32) as i32,
    )
}

/// Logical size shared between the simulation (which resizes it) and the
/// render unit (which reads it every tick).
#[derive(Clone)]
pub struct SharedSurface {
    inner: Arc<Mutex<SurfaceSize>>,
}

impl SharedSurface {
    pub fn new(size: SurfaceSize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(size)),
        }
    }

    pub fn get(&self) -> SurfaceSize {
        *self.inner.lock()
    }

    pub fn set(&self, size: SurfaceSize) {
        *self.inner.lock() = size;
    }
}
