//! Texture store resource.
//!
//! Owns every loaded [`Texture`] keyed by [`TextureId`]. Transform operations
//! (cut, overlay, scale, clear, duplicate) never touch their source: each one
//! registers and returns a brand new texture. Only [`unload_texture`],
//! [`set_pixel`] and [`set_texture_colors`] edit a texture in place.
//!
//! Any operation on an unknown handle fails with
//! [`RenderError::ResourceNotFound`]; on an unloaded one with
//! [`RenderError::ResourceUnavailable`].
//!
//! [`unload_texture`]: TextureStore::unload_texture
//! [`set_pixel`]: TextureStore::set_pixel
//! [`set_texture_colors`]: TextureStore::set_texture_colors

use image::RgbaImage;
use log::{debug, info};
use rustc_hash::FxHashMap;
use std::path::{Path, PathBuf};

use crate::components::color::Color;
use crate::error::{RenderError, ResourceKind, Result};
use crate::resources::texture::{Texture, TextureId, TextureSource};
use crate::systems::texture_transform;

#[derive(Default)]
pub struct TextureStore {
    map: FxHashMap<TextureId, Texture>,
    next_id: u32,
}

impl TextureStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate_id(&mut self) -> TextureId {
        let id = TextureId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Register decoded pixels as a new texture and derive its mirrored
    /// variants.
    pub fn load_from_image(&mut self, pixels: RgbaImage) -> TextureId {
        let id = self.allocate_id();
        let variants = texture_transform::mirror_variants(&pixels);
        let texture = Texture::from_pixels(id, pixels, variants);
        debug!("texture {} created ({}x{})", id, texture.width, texture.height);
        self.map.insert(id, texture);
        id
    }

    /// Decode `source` into a new texture at its natural size.
    pub fn load_texture(&mut self, source: TextureSource) -> Result<TextureId> {
        let pixels = texture_transform::decode(&source.bytes)?;
        let id = self.load_from_image(pixels);
        if let Some(texture) = self.map.get_mut(&id) {
            texture.cached_path = source.cached_path;
            texture.flush_after_load = source.flush_after_load;
            if !source.flush_after_load {
                texture.source = Some(source.bytes);
            }
            info!(
                "texture {} loaded from {} ({}x{})",
                id,
                texture
                    .cached_path
                    .as_deref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "memory".to_string()),
                texture.width,
                texture.height
            );
        }
        Ok(id)
    }

    /// Read and decode an image file.
    pub fn load_texture_file(&mut self, path: impl AsRef<Path>, flush_after_load: bool) -> Result<TextureId> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        self.load_texture(TextureSource {
            bytes,
            cached_path: Some(path.to_path_buf()),
            flush_after_load,
        })
    }

    pub fn get(&self, id: TextureId) -> Option<&Texture> {
        self.map.get(&id)
    }

    /// Look up a texture that still has pixel data.
    pub fn require(&self, id: TextureId) -> Result<&Texture> {
        let texture = self
            .map
            .get(&id)
            .ok_or_else(|| RenderError::not_found(ResourceKind::Texture, id))?;
        if !texture.is_loaded() {
            return Err(RenderError::unavailable(ResourceKind::Texture, id));
        }
        Ok(texture)
    }

    fn require_pixels(&self, id: TextureId) -> Result<&RgbaImage> {
        self.require(id)?
            .pixels()
            .ok_or_else(|| RenderError::unavailable(ResourceKind::Texture, id))
    }

    fn require_pixels_mut(&mut self, id: TextureId) -> Result<&mut RgbaImage> {
        let texture = self
            .map
            .get_mut(&id)
            .ok_or_else(|| RenderError::not_found(ResourceKind::Texture, id))?;
        texture
            .pixels
            .as_mut()
            .ok_or_else(|| RenderError::unavailable(ResourceKind::Texture, id))
    }

    /// Drop the pixel data of `id`. The handle stays registered.
    pub fn unload_texture(&mut self, id: TextureId) -> Result<()> {
        let texture = self
            .map
            .get_mut(&id)
            .ok_or_else(|| RenderError::not_found(ResourceKind::Texture, id))?;
        texture.unload();
        info!("texture {} unloaded", id);
        Ok(())
    }

    /// Drop every texture, handles included.
    pub fn unload_all_textures(&mut self) {
        info!("unloading all {} textures", self.map.len());
        self.map.clear();
    }

    /// New transparent texture with the size of `id`.
    pub fn clear_texture(&mut self, id: TextureId) -> Result<TextureId> {
        let texture = self.require(id)?;
        let blank = texture_transform::blank(texture.width, texture.height)?;
        Ok(self.load_from_image(blank))
    }

    /// New texture holding the `(width, height)` region at `(x, y)` of `id`.
    pub fn cut_texture(&mut self, id: TextureId, x: i32, y: i32, width: u32, height: u32) -> Result<TextureId> {
        let pixels = texture_transform::cut(self.require_pixels(id)?, x, y, width, height)?;
        Ok(self.load_from_image(pixels))
    }

    /// New texture: `top` composited over `bottom`, sized like `bottom`.
    pub fn overlay_texture(
        &mut self,
        bottom: TextureId,
        top: TextureId,
        bottom_at: (f32, f32),
        top_at: (f32, f32),
    ) -> Result<TextureId> {
        let pixels = texture_transform::overlay(
            self.require_pixels(bottom)?,
            bottom_at,
            self.require_pixels(top)?,
            top_at,
        );
        Ok(self.load_from_image(pixels))
    }

    /// New texture resampled by `(fx, fy)`.
    pub fn resample_texture(&mut self, id: TextureId, fx: f32, fy: f32) -> Result<TextureId> {
        let path = self.cached_path(id);
        let pixels = texture_transform::resample(self.require_pixels(id)?, fx, fy)?;
        let new_id = self.load_from_image(pixels);
        self.set_cached_path(new_id, path);
        Ok(new_id)
    }

    /// New texture resampled to `(width, height)` pixels.
    pub fn scale_texture(&mut self, id: TextureId, width: u32, height: u32) -> Result<TextureId> {
        let texture = self.require(id)?;
        if texture.width == 0 || texture.height == 0 {
            return Err(RenderError::Unsupported(format!("cannot scale empty texture {id}")));
        }
        let fx = width as f32 / texture.width as f32;
        let fy = height as f32 / texture.height as f32;
        self.resample_texture(id, fx, fy)
    }

    /// Deep copy with an independent lifetime.
    pub fn duplicate_texture(&mut self, id: TextureId) -> Result<TextureId> {
        self.resample_texture(id, 1.0, 1.0)
    }

    /// Write one pixel in place. Out-of-bounds writes are ignored.
    ///
    /// Mirrored variants are rebuilt so flipped draws stay consistent.
    pub fn set_pixel(&mut self, id: TextureId, x: u32, y: u32, color: Color) -> Result<()> {
        let pixels = self.require_pixels_mut(id)?;
        if x < pixels.width() && y < pixels.height() {
            pixels.put_pixel(x, y, color.to_rgba8());
        }
        self.refresh_variants(id);
        Ok(())
    }

    /// Column-major snapshot: `colors[x][y]`.
    pub fn texture_colors(&self, id: TextureId) -> Result<Vec<Vec<Color>>> {
        let pixels = self.require_pixels(id)?;
        Ok((0..pixels.width())
            .map(|x| {
                (0..pixels.height())
                    .map(|y| Color::from_rgba8(*pixels.get_pixel(x, y)))
                    .collect()
            })
            .collect())
    }

    /// Overwrite pixels from a column-major grid (`colors[x][y]`). Entries
    /// beyond the texture bounds are ignored.
    pub fn set_texture_colors(&mut self, id: TextureId, colors: &[Vec<Color>]) -> Result<()> {
        let pixels = self.require_pixels_mut(id)?;
        let (w, h) = pixels.dimensions();
        for (x, column) in colors.iter().enumerate().take(w as usize) {
            for (y, color) in column.iter().enumerate().take(h as usize) {
                pixels.put_pixel(x as u32, y as u32, color.to_rgba8());
            }
        }
        self.refresh_variants(id);
        Ok(())
    }

    fn refresh_variants(&mut self, id: TextureId) {
        if let Some(texture) = self.map.get_mut(&id) {
            texture.variants = texture.pixels.as_ref().map(texture_transform::mirror_variants);
        }
    }

    fn cached_path(&self, id: TextureId) -> Option<PathBuf> {
        self.map.get(&id).and_then(|t| t.cached_path.clone())
    }

    fn set_cached_path(&mut self, id: TextureId, path: Option<PathBuf>) {
        if let Some(texture) = self.map.get_mut(&id) {
            texture.cached_path = path;
        }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
