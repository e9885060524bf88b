//! Render targets.
//!
//! [`RenderTarget`] is the immediate-mode drawing surface the dispatcher talks
//! to. Every primitive is issued in *local* coordinates and mapped through the
//! target's current [`Affine`]; `clear` and `fill_background` ignore the
//! transform and always cover the whole surface.
//!
//! [`Canvas`] is the software implementation backed by an `RgbaImage`. It
//! rasterizes by coverage: for each device pixel inside the transformed
//! bounding box, the pixel center is mapped back to local space and tested
//! against the shape. Images use nearest-neighbour sampling (smoothing is
//! always off, which is what pixel-art content wants) and every write is
//! source-over alpha compositing. Text is drawn from `fontdue` coverage
//! bitmaps rasterized at device resolution.

use arrayvec::ArrayVec;
use image::{Rgba, RgbaImage};

use crate::components::color::Color;
use crate::components::transform::{Affine, Rect};
use crate::resources::fontstore::FontEntry;

/// Thickness used when a stroke asks for zero or less.
pub const HAIRLINE: f32 = 1.0;
/// Largest pixel size glyphs are rasterized at.
const MAX_GLYPH_PX: f32 = 512.0;

/// Immediate-mode 2D drawing surface.
pub trait RenderTarget {
    fn size(&self) -> (u32, u32);

    /// Reallocate the surface. Contents are discarded.
    fn resize(&mut self, width: u32, height: u32);

    fn transform(&self) -> Affine;

    fn set_transform(&mut self, transform: Affine);

    /// Reset every pixel to transparent.
    fn clear(&mut self);

    /// Paint the whole surface with `color`.
    fn fill_background(&mut self, color: Color);

    fn stroke_line(&mut self, from: (f32, f32), to: (f32, f32), thickness: f32, color: Color);

    fn fill_rect(&mut self, rect: Rect, color: Color);

    fn stroke_rect(&mut self, rect: Rect, thickness: f32, color: Color);

    fn fill_oval(&mut self, rect: Rect, color: Color);

    fn stroke_oval(&mut self, rect: Rect, thickness: f32, color: Color);

    fn fill_round_rect(&mut self, rect: Rect, arc_width: f32, arc_height: f32, color: Color);

    fn stroke_round_rect(
        &mut self,
        rect: Rect,
        arc_width: f32,
        arc_height: f32,
        thickness: f32,
        color: Color,
    );

    /// Draw `image` scaled into `dest`. Negative extents mirror the image
    /// along that axis.
    fn draw_image(&mut self, image: &RgbaImage, dest: Rect);

    /// Draw `text` with its first baseline starting at `(x, y)`.
    fn fill_text(&mut self, text: &str, font: &FontEntry, x: f32, y: f32, color: Color);
}

/// Software render target.
#[derive(Clone, Debug)]
pub struct Canvas {
    pixels: RgbaImage,
    transform: Affine,
}

impl Canvas {
    /// Create a transparent canvas.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            pixels: RgbaImage::new(width, height),
            transform: Affine::IDENTITY,
        }
    }

    pub fn from_image(pixels: RgbaImage) -> Self {
        Self {
            pixels,
            transform: Affine::IDENTITY,
        }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn image(&self) -> &RgbaImage {
        &self.pixels
    }

    /// Capture the current contents.
    pub fn snapshot(&self) -> RgbaImage {
        self.pixels.clone()
    }

    pub fn into_image(self) -> RgbaImage {
        self.pixels
    }

    /// Color at `(x, y)`; transparent outside the surface.
    pub fn pixel(&self, x: u32, y: u32) -> Color {
        if x >= self.width() || y >= self.height() {
            return Color::TRANSPARENT;
        }
        Color::from_rgba8(*self.pixels.get_pixel(x, y))
    }

    /// Draw `image` at its natural size with its top-left at `(x, y)`.
    pub fn draw_image_at(&mut self, image: &RgbaImage, x: f32, y: f32) {
        let dest = Rect::new(x, y, image.width() as f32, image.height() as f32);
        self.draw_image(image, dest);
    }

    fn blend(&mut self, x: u32, y: u32, color: Color) {
        let dst = Color::from_rgba8(*self.pixels.get_pixel(x, y));
        self.pixels.put_pixel(x, y, color.over(dst).to_rgba8());
    }

    /// Device-space pixel range covered by `local` under the current
    /// transform, clipped to the surface. `None` when nothing is visible.
    fn device_span(&self, local: Rect) -> Option<(u32, u32, u32, u32)> {
        let pts: ArrayVec<(f32, f32), 4> = local
            .corners()
            .iter()
            .map(|&(x, y)| self.transform.apply(x, y))
            .collect();
        let (mut min_x, mut min_y) = (f32::MAX, f32::MAX);
        let (mut max_x, mut max_y) = (f32::MIN, f32::MIN);
        for (x, y) in pts {
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
        if !(min_x.is_finite() && min_y.is_finite() && max_x.is_finite() && max_y.is_finite()) {
            return None;
        }
        let x0 = min_x.floor().max(0.0) as u32;
        let y0 = min_y.floor().max(0.0) as u32;
        let x1 = (max_x.ceil().min(self.width() as f32)).max(0.0) as u32;
        let y1 = (max_y.ceil().min(self.height() as f32)).max(0.0) as u32;
        if x0 >= x1 || y0 >= y1 {
            return None;
        }
        Some((x0, y0, x1, y1))
    }

    /// Core coverage loop shared by all primitives. `shade` receives the
    /// local coordinates of a pixel center and returns the color to
    /// composite there, if any.
    fn cover<F>(&mut self, local: Rect, mut shade: F)
    where
        F: FnMut(f32, f32) -> Option<Color>,
    {
        let Some(inverse) = self.transform.inverse() else {
            return;
        };
        let Some((x0, y0, x1, y1)) = self.device_span(local.normalized()) else {
            return;
        };
        for py in y0..y1 {
            for px in x0..x1 {
                let (lx, ly) = inverse.apply(px as f32 + 0.5, py as f32 + 0.5);
                if let Some(color) = shade(lx, ly) {
                    self.blend(px, py, color);
                }
            }
        }
    }

    fn cover_solid<F>(&mut self, local: Rect, color: Color, inside: F)
    where
        F: Fn(f32, f32) -> bool,
    {
        self.cover(local, |x, y| inside(x, y).then_some(color));
    }
}

/// Effective stroke width: non-positive thickness draws a hairline.
pub fn stroke_width(thickness: f32) -> f32 {
    if thickness > 0.0 { thickness } else { HAIRLINE }
}

fn in_oval(r: Rect, x: f32, y: f32) -> bool {
    let r = r.normalized();
    let (rx, ry) = (r.w / 2.0, r.h / 2.0);
    if rx <= 0.0 || ry <= 0.0 {
        return false;
    }
    let (cx, cy) = r.center();
    let dx = (x - cx) / rx;
    let dy = (y - cy) / ry;
    dx * dx + dy * dy <= 1.0
}

fn in_round_rect(r: Rect, arc_width: f32, arc_height: f32, x: f32, y: f32) -> bool {
    let r = r.normalized();
    if !r.contains(x, y) {
        return false;
    }
    let rx = (arc_width / 2.0).min(r.w / 2.0);
    let ry = (arc_height / 2.0).min(r.h / 2.0);
    if rx <= 0.0 || ry <= 0.0 {
        return true;
    }
    // Nearest corner-ellipse center; zero offset on the straight edges.
    let cx = x.clamp(r.x + rx, r.x + r.w - rx);
    let cy = y.clamp(r.y + ry, r.y + r.h - ry);
    let dx = (x - cx) / rx;
    let dy = (y - cy) / ry;
    dx * dx + dy * dy <= 1.0
}

fn has_area(r: Rect) -> bool {
    r.w > 0.0 && r.h > 0.0
}

fn segment_distance_sq(p: (f32, f32), a: (f32, f32), b: (f32, f32)) -> f32 {
    let (abx, aby) = (b.0 - a.0, b.1 - a.1);
    let (apx, apy) = (p.0 - a.0, p.1 - a.1);
    let len_sq = abx * abx + aby * aby;
    let t = if len_sq > 0.0 {
        ((apx * abx + apy * aby) / len_sq).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let (dx, dy) = (apx - t * abx, apy - t * aby);
    dx * dx + dy * dy
}

impl RenderTarget for Canvas {
    fn size(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.pixels = RgbaImage::new(width, height);
    }

    fn transform(&self) -> Affine {
        self.transform
    }

    fn set_transform(&mut self, transform: Affine) {
        self.transform = transform;
    }

    fn clear(&mut self) {
        for px in self.pixels.pixels_mut() {
            *px = Rgba([0, 0, 0, 0]);
        }
    }

    fn fill_background(&mut self, color: Color) {
        for px in self.pixels.pixels_mut() {
            *px = color.over(Color::from_rgba8(*px)).to_rgba8();
        }
    }

    fn stroke_line(&mut self, from: (f32, f32), to: (f32, f32), thickness: f32, color: Color) {
        let half = stroke_width(thickness) / 2.0;
        let bounds = Rect::new(from.0, from.1, to.0 - from.0, to.1 - from.1)
            .normalized()
            .inflate(half);
        let limit = half * half;
        self.cover_solid(bounds, color, |x, y| {
            segment_distance_sq((x, y), from, to) <= limit
        });
    }

    fn fill_rect(&mut self, rect: Rect, color: Color) {
        let rect = rect.normalized();
        self.cover_solid(rect, color, |x, y| rect.contains(x, y));
    }

    fn stroke_rect(&mut self, rect: Rect, thickness: f32, color: Color) {
        let half = stroke_width(thickness) / 2.0;
        let rect = rect.normalized();
        let outer = rect.inflate(half);
        let inner = rect.inflate(-half);
        self.cover_solid(outer, color, |x, y| {
            outer.contains(x, y) && !(has_area(inner) && inner.contains(x, y))
        });
    }

    fn fill_oval(&mut self, rect: Rect, color: Color) {
        self.cover_solid(rect, color, |x, y| in_oval(rect, x, y));
    }

    fn stroke_oval(&mut self, rect: Rect, thickness: f32, color: Color) {
        let half = stroke_width(thickness) / 2.0;
        let rect = rect.normalized();
        let outer = rect.inflate(half);
        let inner = rect.inflate(-half);
        self.cover_solid(outer, color, |x, y| {
            in_oval(outer, x, y) && !(has_area(inner) && in_oval(inner, x, y))
        });
    }

    fn fill_round_rect(&mut self, rect: Rect, arc_width: f32, arc_height: f32, color: Color) {
        self.cover_solid(rect, color, |x, y| {
            in_round_rect(rect, arc_width, arc_height, x, y)
        });
    }

    fn stroke_round_rect(
        &mut self,
        rect: Rect,
        arc_width: f32,
        arc_height: f32,
        thickness: f32,
        color: Color,
    ) {
        let t = stroke_width(thickness);
        let rect = rect.normalized();
        let outer = rect.inflate(t / 2.0);
        let inner = rect.inflate(-t / 2.0);
        self.cover_solid(outer, color, |x, y| {
            in_round_rect(outer, arc_width + t, arc_height + t, x, y)
                && !(has_area(inner) && in_round_rect(inner, arc_width - t, arc_height - t, x, y))
        });
    }

    fn draw_image(&mut self, image: &RgbaImage, dest: Rect) {
        let (src_w, src_h) = image.dimensions();
        if src_w == 0 || src_h == 0 || dest.w == 0.0 || dest.h == 0.0 {
            return;
        }
        let area = dest.normalized();
        self.cover(area, |x, y| {
            if !area.contains(x, y) {
                return None;
            }
            // Signed extents: u runs from 0 at dest.x towards dest.x + dest.w.
            let u = (x - dest.x) / dest.w;
            let v = (y - dest.y) / dest.h;
            let sx = ((u * src_w as f32).floor() as i64).clamp(0, src_w as i64 - 1) as u32;
            let sy = ((v * src_h as f32).floor() as i64).clamp(0, src_h as i64 - 1) as u32;
            Some(Color::from_rgba8(*image.get_pixel(sx, sy)))
        });
    }

    fn fill_text(&mut self, text: &str, font: &FontEntry, x: f32, y: f32, color: Color) {
        if font.size <= 0.0 || !font.size.is_finite() {
            return;
        }
        // Rasterize at device resolution so scaled text stays sharp.
        let px = (font.size * self.transform.max_scale()).clamp(1.0, MAX_GLYPH_PX);
        let scale = px / font.size;
        let line_height = font.line_height();
        for (row, line) in text.lines().enumerate() {
            let baseline = y + row as f32 * line_height;
            let mut pen = x;
            let mut prev = None;
            for ch in line.chars() {
                if let Some(p) = prev {
                    pen += font.kern(p, ch);
                }
                prev = Some(ch);
                let glyph = font.glyph(ch, px);
                let m = glyph.metrics;
                if m.width > 0 && m.height > 0 {
                    // fontdue's ymin is the bitmap's bottom edge, up from the baseline.
                    let left = pen + m.xmin as f32 / scale;
                    let top = baseline - (m.ymin as f32 + m.height as f32) / scale;
                    let cell = Rect::new(left, top, m.width as f32 / scale, m.height as f32 / scale);
                    self.cover(cell, |lx, ly| {
                        let gx = ((lx - left) * scale).floor();
                        let gy = ((ly - top) * scale).floor();
                        if gx < 0.0 || gy < 0.0 || gx >= m.width as f32 || gy >= m.height as f32 {
                            return None;
                        }
                        let coverage = glyph.coverage[gy as usize * m.width + gx as usize];
                        (coverage > 0).then(|| Color {
                            a: ((color.a as u32 * coverage as u32 + 127) / 255) as u8,
                            ..color
                        })
                    });
                }
                pen += font.advance(ch);
            }
        }
    }
}
