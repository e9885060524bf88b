//! Texture resource.
//!
//! A [`Texture`] owns its decoded pixels plus three mirrored copies built at
//! load time, so flipped sprites are a lookup instead of a per-draw flip.
//! Unloading drops every pixel buffer but keeps the size and cached path so
//! the handle can still be inspected.

use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::components::color::Color;

/// Handle of a texture inside the [`TextureStore`](super::texturestore::TextureStore).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TextureId(pub u32);

impl std::fmt::Display for TextureId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Mirrored variant selector.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Flip {
    #[default]
    None,
    Horizontal,
    Vertical,
    Both,
}

impl Flip {
    pub fn flips_x(self) -> bool {
        matches!(self, Flip::Horizontal | Flip::Both)
    }

    pub fn flips_y(self) -> bool {
        matches!(self, Flip::Vertical | Flip::Both)
    }
}

/// Mirrored copies of a texture, all at the texture's size.
#[derive(Clone, Debug)]
pub struct MirrorVariants {
    pub horizontal: RgbaImage,
    pub vertical: RgbaImage,
    pub both: RgbaImage,
}

/// Options applied when a texture is created from a source.
#[derive(Clone, Debug, Default)]
pub struct TextureSource {
    /// Encoded image bytes (PNG).
    pub bytes: Vec<u8>,
    /// Where the bytes came from, kept for duplicates and diagnostics.
    pub cached_path: Option<PathBuf>,
    /// Drop `bytes` once pixels are decoded.
    pub flush_after_load: bool,
}

#[derive(Clone, Debug)]
pub struct Texture {
    pub id: TextureId,
    pub width: u32,
    pub height: u32,
    pub cached_path: Option<PathBuf>,
    pub flush_after_load: bool,
    /// Encoded source, `None` once flushed.
    pub(crate) source: Option<Vec<u8>>,
    pub(crate) pixels: Option<RgbaImage>,
    pub(crate) variants: Option<MirrorVariants>,
}

impl Texture {
    pub(crate) fn from_pixels(id: TextureId, pixels: RgbaImage, variants: MirrorVariants) -> Self {
        let (width, height) = pixels.dimensions();
        Self {
            id,
            width,
            height,
            cached_path: None,
            flush_after_load: false,
            source: None,
            pixels: Some(pixels),
            variants: Some(variants),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.pixels.is_some()
    }

    pub fn pixels(&self) -> Option<&RgbaImage> {
        self.pixels.as_ref()
    }

    /// Pixels for the requested orientation. Falls back to the unflipped
    /// image when no variants were built.
    pub fn variant(&self, flip: Flip) -> Option<&RgbaImage> {
        let base = self.pixels.as_ref()?;
        let Some(v) = self.variants.as_ref() else {
            return Some(base);
        };
        Some(match flip {
            Flip::None => base,
            Flip::Horizontal => &v.horizontal,
            Flip::Vertical => &v.vertical,
            Flip::Both => &v.both,
        })
    }

    /// Encoded bytes still held for this texture.
    pub fn source_bytes(&self) -> Option<&[u8]> {
        self.source.as_deref()
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Color> {
        let img = self.pixels.as_ref()?;
        if x >= img.width() || y >= img.height() {
            return None;
        }
        Some(Color::from_rgba8(*img.get_pixel(x, y)))
    }

    /// Release pixel memory. The handle stays valid but unusable for drawing.
    pub(crate) fn unload(&mut self) {
        self.pixels = None;
        self.variants = None;
        self.source = None;
    }
}
