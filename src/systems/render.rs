//! Immediate-mode draw dispatch.
//!
//! [`DrawDispatcher::draw_all`] walks one snapshot of the drawable collection
//! and issues one primitive per drawable on a [`RenderTarget`]. For every
//! drawable the shared logical transform is composed with a rotation about
//! the drawable's own center, then the shape decides which primitive runs.
//!
//! A drawable that cannot be drawn (unknown font, unloaded texture,
//! non-finite geometry) is skipped and recorded in the [`FrameReport`]; the
//! rest of the pass always runs.
//!
//! Native colors are memoized in a [`ColorCache`] keyed by drawable id.
//! Mutators push invalidations through the channel returned by
//! [`DrawableSet::invalidations`](crate::resources::drawables::DrawableSet::invalidations);
//! the cache drains it at the start of every pass.

use crossbeam_channel::Receiver;
use log::{trace, warn};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::sync::Arc;

use crate::components::color::Color;
use crate::components::drawable::{Drawable, DrawableId, Paint, Shape};
use crate::components::transform::Affine;
use crate::error::{RenderError, ResourceKind, Result};
use crate::resources::rendertarget::{RenderTarget, stroke_width};
use crate::resources::store::ResourceStore;

/// Memo table of resolved native colors.
#[derive(Default)]
pub struct ColorCache {
    colors: FxHashMap<DrawableId, Color>,
    invalidations: Option<Receiver<DrawableId>>,
}

impl ColorCache {
    pub fn new(invalidations: Receiver<DrawableId>) -> Self {
        Self {
            colors: FxHashMap::default(),
            invalidations: Some(invalidations),
        }
    }

    /// Apply every invalidation pushed since the last call.
    pub fn sync(&mut self) {
        if let Some(rx) = &self.invalidations {
            for id in rx.try_iter() {
                self.colors.remove(&id);
            }
        }
    }

    pub fn invalidate(&mut self, id: DrawableId) {
        self.colors.remove(&id);
    }

    /// Cached native color of `drawable`, resolving it on first use.
    pub fn resolve(&mut self, drawable: &Drawable) -> Color {
        *self.colors.entry(drawable.id).or_insert_with(|| {
            drawable.color.unwrap_or_default().resolve()
        })
    }

    pub fn get(&self, id: DrawableId) -> Option<Color> {
        self.colors.get(&id).copied()
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }
}

/// Outcome of one draw pass.
#[derive(Debug, Default)]
pub struct FrameReport {
    /// Drawables that reached the target.
    pub drawn: usize,
    /// Drawables that were skipped, with the reason.
    pub skipped: SmallVec<[(DrawableId, RenderError); 4]>,
}

impl FrameReport {
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty()
    }
}

#[derive(Default)]
pub struct DrawDispatcher {
    colors: ColorCache,
}

impl DrawDispatcher {
    pub fn new(invalidations: Receiver<DrawableId>) -> Self {
        Self {
            colors: ColorCache::new(invalidations),
        }
    }

    pub fn colors(&self) -> &ColorCache {
        &self.colors
    }

    /// Draw `drawables` in order on `target`, on top of what is already there.
    pub fn draw_all(
        &mut self,
        drawables: &[Arc<Drawable>],
        base: Affine,
        target: &mut dyn RenderTarget,
        resources: &ResourceStore,
    ) -> FrameReport {
        self.colors.sync();
        let mut report = FrameReport::default();
        for drawable in drawables {
            match self.draw_one(drawable, base, target, resources) {
                Ok(()) => report.drawn += 1,
                Err(e) => {
                    warn!("skipping {} {}: {}", drawable.shape.name(), drawable.id, e);
                    report.skipped.push((drawable.id, e));
                }
            }
        }
        target.set_transform(base);
        trace!("draw pass: {} drawn, {} skipped", report.drawn, report.skipped.len());
        report
    }

    /// Draw a single drawable.
    pub fn draw_one(
        &mut self,
        drawable: &Drawable,
        base: Affine,
        target: &mut dyn RenderTarget,
        resources: &ResourceStore,
    ) -> Result<()> {
        if !drawable.has_finite_geometry() {
            return Err(RenderError::Unsupported(format!(
                "{} has non-finite geometry",
                drawable.shape.name()
            )));
        }
        let (cx, cy) = (drawable.x, drawable.y);
        let (w, h) = (drawable.width, drawable.height);
        let rotation = Affine::rotation_about((-drawable.rotation).to_radians(), cx, cy);
        target.set_transform(base.append(rotation));

        let bounds = drawable.bounds();
        match &drawable.shape {
            Shape::Image { texture, flip } => {
                let pixels = resources
                    .textures
                    .require(*texture)?
                    .variant(*flip)
                    .ok_or_else(|| RenderError::unavailable(ResourceKind::Texture, texture))?;
                target.draw_image(pixels, bounds);
            }
            Shape::Line { thickness } => {
                let color = self.colors.resolve(drawable);
                target.stroke_line(
                    (cx - w / 2.0, cy - h / 2.0),
                    (cx + w / 2.0, cy + h / 2.0),
                    stroke_width(*thickness),
                    color,
                );
            }
            Shape::Rectangle { paint } => {
                let color = self.colors.resolve(drawable);
                match paint {
                    Paint::Fill => target.fill_rect(bounds, color),
                    Paint::Stroke { thickness } => {
                        target.stroke_rect(bounds, stroke_width(*thickness), color)
                    }
                }
            }
            Shape::Oval { paint } => {
                let color = self.colors.resolve(drawable);
                match paint {
                    Paint::Fill => target.fill_oval(bounds, color),
                    Paint::Stroke { thickness } => {
                        target.stroke_oval(bounds, stroke_width(*thickness), color)
                    }
                }
            }
            Shape::RoundedRectangle {
                paint,
                arc_width,
                arc_height,
            } => {
                let color = self.colors.resolve(drawable);
                match paint {
                    Paint::Fill => target.fill_round_rect(bounds, *arc_width, *arc_height, color),
                    Paint::Stroke { thickness } => target.stroke_round_rect(
                        bounds,
                        *arc_width,
                        *arc_height,
                        stroke_width(*thickness),
                        color,
                    ),
                }
            }
            Shape::Text { content, font_key } => {
                let font = resources.fonts.require(font_key)?;
                let color = self.colors.resolve(drawable);
                let (tw, th) = font.measure(content);
                // Horizontally centered; baseline a quarter height below center.
                target.fill_text(content, font, cx - tw / 2.0, cy + th / 4.0, color);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::color::LogicalColor;
    use crate::resources::drawables::DrawableSet;
    use crate::resources::rendertarget::Canvas;
    use crate::resources::texture::Flip;
    use image::{Rgba, RgbaImage};

    fn red() -> LogicalColor {
        LogicalColor {
            r: 1.0,
            g: 0.0,
            b: 0.0,
            a: 1.0,
        }
    }

    #[test]
    fn test_missing_font_skips_only_that_drawable() {
        let store = ResourceStore::default();
        let mut canvas = Canvas::new(16, 16);
        let mut dispatcher = DrawDispatcher::default();
        let drawables = vec![
            Arc::new(Drawable::text(1, "hi", "nope", 8.0, 8.0)),
            Arc::new(Drawable::rectangle(2, 8.0, 8.0, 4.0, 4.0)),
        ];
        let report = dispatcher.draw_all(&drawables, Affine::IDENTITY, &mut canvas, &store);
        assert_eq!(report.drawn, 1);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].0, DrawableId(1));
        assert!(matches!(
            report.skipped[0].1,
            RenderError::ResourceNotFound {
                kind: ResourceKind::Font,
                ..
            }
        ));
        assert_eq!(canvas.pixel(8, 8), Color::WHITE);
    }

    #[test]
    fn test_non_finite_geometry_is_unsupported() {
        let store = ResourceStore::default();
        let mut canvas = Canvas::new(4, 4);
        let mut dispatcher = DrawDispatcher::default();
        let bad = Arc::new(Drawable::oval(1, f32::NAN, 0.0, 1.0, 1.0));
        let report = dispatcher.draw_all(&[bad], Affine::IDENTITY, &mut canvas, &store);
        assert!(matches!(report.skipped[0].1, RenderError::Unsupported(_)));
    }

    #[test]
    fn test_color_is_cached_until_invalidated() {
        let set = DrawableSet::new();
        set.insert(Drawable::rectangle(1, 2.0, 2.0, 4.0, 4.0).with_color(red()));
        let store = ResourceStore::default();
        let mut canvas = Canvas::new(4, 4);
        let mut dispatcher = DrawDispatcher::new(set.invalidations());

        dispatcher.draw_all(&set.snapshot(), Affine::IDENTITY, &mut canvas, &store);
        assert_eq!(dispatcher.colors().get(DrawableId(1)), Some(Color::RED));

        // A silent edit keeps the memoized color.
        set.update(DrawableId(1), |d| d.color = Some(LogicalColor::BLACK));
        dispatcher.draw_all(&set.snapshot(), Affine::IDENTITY, &mut canvas, &store);
        assert_eq!(canvas.pixel(1, 1), Color::RED);

        set.set_color(DrawableId(1), Some(LogicalColor::BLACK));
        dispatcher.draw_all(&set.snapshot(), Affine::IDENTITY, &mut canvas, &store);
        assert_eq!(canvas.pixel(1, 1), Color::BLACK);
    }

    #[test]
    fn test_cached_color_survives_same_color_replace() {
        let set = DrawableSet::from_drawables([
            Drawable::rectangle(1, 2.0, 2.0, 4.0, 4.0).with_color(red()),
            Drawable::rectangle(2, 2.0, 2.0, 4.0, 4.0).with_color(red()),
        ]);
        let store = ResourceStore::default();
        let mut canvas = Canvas::new(4, 4);
        let mut dispatcher = DrawDispatcher::new(set.invalidations());
        dispatcher.draw_all(&set.snapshot(), Affine::IDENTITY, &mut canvas, &store);
        assert_eq!(dispatcher.colors().len(), 2);

        // Next frame: 1 is re-submitted unchanged, 2 is gone.
        set.replace([Drawable::rectangle(1, 2.0, 2.0, 4.0, 4.0).with_color(red())]);
        dispatcher.draw_all(&[], Affine::IDENTITY, &mut canvas, &store);
        assert_eq!(dispatcher.colors().get(DrawableId(1)), Some(Color::RED));
        assert_eq!(dispatcher.colors().get(DrawableId(2)), None);
    }

    #[test]
    fn test_removed_drawable_is_evicted() {
        let set = DrawableSet::new();
        set.insert(Drawable::rectangle(1, 2.0, 2.0, 4.0, 4.0));
        let store = ResourceStore::default();
        let mut canvas = Canvas::new(4, 4);
        let mut dispatcher = DrawDispatcher::new(set.invalidations());
        dispatcher.draw_all(&set.snapshot(), Affine::IDENTITY, &mut canvas, &store);
        assert_eq!(dispatcher.colors().len(), 1);
        set.remove(DrawableId(1));
        dispatcher.draw_all(&set.snapshot(), Affine::IDENTITY, &mut canvas, &store);
        assert!(dispatcher.colors().is_empty());
    }

    #[test]
    fn test_image_uses_requested_mirror_variant() {
        let mut store = ResourceStore::default();
        let mut img = RgbaImage::new(2, 1);
        img.put_pixel(0, 0, Rgba([255, 0, 0, 255]));
        img.put_pixel(1, 0, Rgba([0, 0, 255, 255]));
        let tex = store.textures.load_from_image(img);

        let mut canvas = Canvas::new(2, 1);
        let mut dispatcher = DrawDispatcher::default();
        let plain = Arc::new(Drawable::image(1, tex, 1.0, 0.5, 2.0, 1.0));
        dispatcher.draw_all(&[plain], Affine::IDENTITY, &mut canvas, &store);
        assert_eq!(canvas.pixel(0, 0), Color::RED);

        let mirrored = Arc::new(Drawable::image(2, tex, 1.0, 0.5, 2.0, 1.0).flipped(Flip::Horizontal));
        dispatcher.draw_all(&[mirrored], Affine::IDENTITY, &mut canvas, &store);
        assert_eq!(canvas.pixel(0, 0), Color::BLUE);
        assert_eq!(canvas.pixel(1, 0), Color::RED);
    }

    #[test]
    fn test_unloaded_texture_is_unavailable() {
        let mut store = ResourceStore::default();
        let tex = store.textures.load_from_image(RgbaImage::new(1, 1));
        store.textures.unload_texture(tex).unwrap();
        let mut canvas = Canvas::new(2, 2);
        let mut dispatcher = DrawDispatcher::default();
        let report = dispatcher.draw_all(
            &[Arc::new(Drawable::image(1, tex, 1.0, 1.0, 2.0, 2.0))],
            Affine::IDENTITY,
            &mut canvas,
            &store,
        );
        assert!(matches!(
            report.skipped[0].1,
            RenderError::ResourceUnavailable { .. }
        ));
    }

    #[test]
    fn test_text_is_centered_on_position() {
        let mut store = ResourceStore::default();
        store.fonts.load_font("ui", "Mono", 10.0, 0).unwrap();
        let (tw, th) = store.fonts.measure("AB", "ui").unwrap();
        let mut canvas = Canvas::new(40, 40);
        let mut dispatcher = DrawDispatcher::default();
        let text = Arc::new(Drawable::text(1, "AB", "ui", 20.0, 20.0));
        let report = dispatcher.draw_all(&[text], Affine::IDENTITY, &mut canvas, &store);
        assert!(report.is_clean());

        let inked: Vec<(u32, u32)> = canvas
            .image()
            .enumerate_pixels()
            .filter(|(_, _, p)| p.0[3] > 0)
            .map(|(x, y, _)| (x, y))
            .collect();
        assert!(!inked.is_empty());
        let left = inked.iter().map(|p| p.0).min().unwrap() as f32;
        let right = inked.iter().map(|p| p.0 + 1).max().unwrap() as f32;
        let bottom = inked.iter().map(|p| p.1 + 1).max().unwrap() as f32;
        assert!(left >= 20.0 - tw / 2.0 - 1.0);
        assert!(right <= 20.0 + tw / 2.0 + 1.0);
        assert!(((left + right) / 2.0 - 20.0).abs() <= 1.5);
        // Capitals rest on the baseline a quarter height below the center.
        assert!((bottom - (20.0 + th / 4.0)).abs() <= 1.5);
    }

    #[test]
    fn test_thin_stroke_falls_back_to_hairline() {
        let store = ResourceStore::default();
        let mut canvas = Canvas::new(8, 8);
        let mut dispatcher = DrawDispatcher::default();
        let outline = Arc::new(Drawable::rectangle(1, 4.0, 4.0, 6.0, 6.0).stroked(0.0));
        dispatcher.draw_all(&[outline], Affine::IDENTITY, &mut canvas, &store);
        assert_eq!(canvas.pixel(0, 4), Color::WHITE);
        assert_eq!(canvas.pixel(6, 4), Color::WHITE);
        assert_eq!(canvas.pixel(4, 4), Color::TRANSPARENT);
    }
}
