//! Pixel-level texture operations.
//!
//! Mirroring, sub-rectangle extraction and compositing are done the same way
//! a GPU canvas would: draw the source onto a fresh [`Canvas`] (with negated
//! extents or an offset) and capture the result. Resampling is plain block
//! replication of packed pixels; there is no filtering, which keeps pixel art
//! crisp and costs one write per output pixel.
//!
//! All functions are pure: they read their inputs and return new buffers.
//! Every output buffer is size-checked against [`MAX_TEXTURE_BYTES`] before
//! it is allocated.

use image::RgbaImage;

use crate::components::transform::Rect;
use crate::error::{RenderError, Result};
use crate::resources::rendertarget::{Canvas, RenderTarget};
use crate::resources::texture::{Flip, MirrorVariants};

/// Decode encoded image bytes into RGBA8 pixels at their natural size.
pub fn decode(bytes: &[u8]) -> Result<RgbaImage> {
    Ok(image::load_from_memory(bytes)?.to_rgba8())
}

/// Largest RGBA8 buffer a transform may allocate (256 MiB, 8192 x 8192).
pub const MAX_TEXTURE_BYTES: u64 = 256 * 1024 * 1024;

/// Transparent image of the given size. Sizes past [`MAX_TEXTURE_BYTES`] are
/// [`RenderError::Unsupported`].
pub fn blank(width: u32, height: u32) -> Result<RgbaImage> {
    let bytes = u64::from(width)
        .checked_mul(u64::from(height))
        .and_then(|pixels| pixels.checked_mul(4));
    match bytes {
        Some(bytes) if bytes <= MAX_TEXTURE_BYTES => Ok(RgbaImage::new(width, height)),
        _ => Err(RenderError::Unsupported(format!(
            "{width} x {height} texture exceeds the {MAX_TEXTURE_BYTES} byte limit"
        ))),
    }
}

/// `floor(extent * factor)` as a pixel count.
fn scaled_extent(extent: u32, factor: f32) -> Result<u32> {
    let scaled = (extent as f32 * factor).floor();
    if scaled >= u32::MAX as f32 {
        return Err(RenderError::Unsupported(format!(
            "resampling {extent} px by {factor} overflows"
        )));
    }
    Ok(scaled as u32)
}

/// Mirror `src` by drawing it with negated extents.
pub fn mirror(src: &RgbaImage, flip: Flip) -> RgbaImage {
    let (w, h) = (src.width() as f32, src.height() as f32);
    let dest = match flip {
        Flip::None => Rect::new(0.0, 0.0, w, h),
        Flip::Horizontal => Rect::new(w, 0.0, -w, h),
        Flip::Vertical => Rect::new(0.0, h, w, -h),
        Flip::Both => Rect::new(w, h, -w, -h),
    };
    let mut canvas = Canvas::new(src.width(), src.height());
    canvas.draw_image(src, dest);
    canvas.into_image()
}

/// Build the three mirrored variants of `src`.
pub fn mirror_variants(src: &RgbaImage) -> MirrorVariants {
    MirrorVariants {
        horizontal: mirror(src, Flip::Horizontal),
        vertical: mirror(src, Flip::Vertical),
        both: mirror(src, Flip::Both),
    }
}

/// Nearest-neighbour resample by independent factors.
///
/// The output is `floor(w * fx) x floor(h * fy)`. Source pixel `(x, y)` is
/// copied to every `(floor(x * fx + dx), floor(y * fy + dy))` with
/// `dx in [0, fx)` and `dy in [0, fy)`.
pub fn resample(src: &RgbaImage, fx: f32, fy: f32) -> Result<RgbaImage> {
    if !(fx.is_finite() && fy.is_finite() && fx > 0.0 && fy > 0.0) {
        return Err(RenderError::Unsupported(format!(
            "resample factors must be positive, got {fx} x {fy}"
        )));
    }
    let (w, h) = src.dimensions();
    let out_w = scaled_extent(w, fx)?;
    let out_h = scaled_extent(h, fy)?;
    let mut out = blank(out_w, out_h)?;
    if out_w == 0 || out_h == 0 {
        return Ok(out);
    }

    for y in 0..h {
        for x in 0..w {
            let px = *src.get_pixel(x, y);
            let mut dy = 0u32;
            while (dy as f32) < fy {
                let ty = (y as f32 * fy + dy as f32) as u32;
                if ty >= out_h {
                    break;
                }
                let mut dx = 0u32;
                while (dx as f32) < fx {
                    let tx = (x as f32 * fx + dx as f32) as u32;
                    if tx >= out_w {
                        break;
                    }
                    out.put_pixel(tx, ty, px);
                    dx += 1;
                }
                dy += 1;
            }
        }
    }
    Ok(out)
}

/// Extract the `(width, height)` region whose top-left is `(x, y)` in `src`.
/// Parts of the region outside `src` stay transparent.
pub fn cut(src: &RgbaImage, x: i32, y: i32, width: u32, height: u32) -> Result<RgbaImage> {
    let mut canvas = Canvas::from_image(blank(width, height)?);
    canvas.draw_image_at(src, -(x as f32), -(y as f32));
    Ok(canvas.into_image())
}

/// Composite `top` over `bottom` onto a surface the size of `bottom`.
/// Each layer is drawn at its own offset, back to front.
pub fn overlay(bottom: &RgbaImage, bottom_at: (f32, f32), top: &RgbaImage, top_at: (f32, f32)) -> RgbaImage {
    let mut canvas = Canvas::new(bottom.width(), bottom.height());
    canvas.draw_image_at(bottom, bottom_at.0, bottom_at.1);
    canvas.draw_image_at(top, top_at.0, top_at.1);
    canvas.into_image()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::color::Color;

    fn checker() -> RgbaImage {
        // R G
        // B W
        let mut img = RgbaImage::new(2, 2);
        img.put_pixel(0, 0, Color::RED.to_rgba8());
        img.put_pixel(1, 0, Color::GREEN.to_rgba8());
        img.put_pixel(0, 1, Color::BLUE.to_rgba8());
        img.put_pixel(1, 1, Color::WHITE.to_rgba8());
        img
    }

    fn at(img: &RgbaImage, x: u32, y: u32) -> Color {
        Color::from_rgba8(*img.get_pixel(x, y))
    }

    #[test]
    fn test_mirror_horizontal() {
        let m = mirror(&checker(), Flip::Horizontal);
        assert_eq!(at(&m, 0, 0), Color::GREEN);
        assert_eq!(at(&m, 1, 0), Color::RED);
        assert_eq!(at(&m, 0, 1), Color::WHITE);
    }

    #[test]
    fn test_mirror_vertical() {
        let m = mirror(&checker(), Flip::Vertical);
        assert_eq!(at(&m, 0, 0), Color::BLUE);
        assert_eq!(at(&m, 1, 1), Color::GREEN);
    }

    #[test]
    fn test_mirror_both() {
        let m = mirror(&checker(), Flip::Both);
        assert_eq!(at(&m, 0, 0), Color::WHITE);
        assert_eq!(at(&m, 1, 1), Color::RED);
    }

    #[test]
    fn test_mirror_variants_are_distinct() {
        let v = mirror_variants(&checker());
        assert_ne!(v.horizontal, v.vertical);
        assert_ne!(v.vertical, v.both);
        assert_eq!(at(&v.both, 0, 0), Color::WHITE);
    }

    #[test]
    fn test_resample_doubles_into_blocks() {
        let out = resample(&checker(), 2.0, 2.0).unwrap();
        assert_eq!(out.dimensions(), (4, 4));
        for (bx, by, color) in [
            (0, 0, Color::RED),
            (1, 0, Color::GREEN),
            (0, 1, Color::BLUE),
            (1, 1, Color::WHITE),
        ] {
            for dy in 0..2 {
                for dx in 0..2 {
                    assert_eq!(at(&out, bx * 2 + dx, by * 2 + dy), color);
                }
            }
        }
    }

    #[test]
    fn test_resample_independent_axes() {
        let out = resample(&checker(), 3.0, 1.0).unwrap();
        assert_eq!(out.dimensions(), (6, 2));
        assert_eq!(at(&out, 2, 0), Color::RED);
        assert_eq!(at(&out, 3, 0), Color::GREEN);
        assert_eq!(at(&out, 5, 1), Color::WHITE);
    }

    #[test]
    fn test_resample_minifies() {
        let big = resample(&checker(), 4.0, 4.0).unwrap();
        let small = resample(&big, 0.25, 0.25).unwrap();
        assert_eq!(small.dimensions(), (2, 2));
        assert_eq!(at(&small, 1, 0), Color::GREEN);
    }

    #[test]
    fn test_resample_rejects_bad_factors() {
        assert!(matches!(
            resample(&checker(), 0.0, 1.0),
            Err(RenderError::Unsupported(_))
        ));
        assert!(resample(&checker(), f32::NAN, 1.0).is_err());
    }

    #[test]
    fn test_cut_inside_and_partially_outside() {
        let inside = cut(&checker(), 1, 0, 1, 2).unwrap();
        assert_eq!(at(&inside, 0, 0), Color::GREEN);
        assert_eq!(at(&inside, 0, 1), Color::WHITE);

        let partial = cut(&checker(), 1, 1, 2, 2).unwrap();
        assert_eq!(at(&partial, 0, 0), Color::WHITE);
        assert_eq!(at(&partial, 1, 0), Color::TRANSPARENT);
        assert_eq!(at(&partial, 0, 1), Color::TRANSPARENT);
        assert_eq!(at(&partial, 1, 1), Color::TRANSPARENT);
    }

    #[test]
    fn test_oversized_outputs_are_refused() {
        assert!(matches!(blank(u32::MAX, u32::MAX), Err(RenderError::Unsupported(_))));
        assert!(matches!(blank(8193, 8192), Err(RenderError::Unsupported(_))));
        assert!(blank(16, 16).is_ok());
        assert!(matches!(
            cut(&checker(), 0, 0, u32::MAX, u32::MAX),
            Err(RenderError::Unsupported(_))
        ));
        assert!(matches!(
            resample(&checker(), 1e12, 1e12),
            Err(RenderError::Unsupported(_))
        ));
        assert!(matches!(
            resample(&checker(), 3e9, 3e9),
            Err(RenderError::Unsupported(_))
        ));
    }

    #[test]
    fn test_resample_to_empty_axis_skips_work() {
        // One axis collapses to zero: nothing to write however wide the other is.
        let out = resample(&checker(), 1e6, 0.1).unwrap();
        assert_eq!(out.dimensions(), (2_000_000, 0));
    }

    #[test]
    fn test_overlay_later_layer_occludes() {
        let mut dot = RgbaImage::new(1, 1);
        dot.put_pixel(0, 0, Color::BLACK.to_rgba8());
        let out = overlay(&checker(), (0.0, 0.0), &dot, (1.0, 1.0));
        assert_eq!(out.dimensions(), (2, 2));
        assert_eq!(at(&out, 1, 1), Color::BLACK);
        assert_eq!(at(&out, 0, 0), Color::RED);
    }

    #[test]
    fn test_overlay_blends_translucent_top() {
        let mut veil = RgbaImage::new(2, 2);
        for p in veil.pixels_mut() {
            *p = Color::new(0, 0, 0, 0).to_rgba8();
        }
        let out = overlay(&checker(), (0.0, 0.0), &veil, (0.0, 0.0));
        assert_eq!(out, checker());
    }
}
