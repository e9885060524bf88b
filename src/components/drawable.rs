//! Drawable descriptors.
//!
//! A [`Drawable`] describes one visible thing for the current frame. The
//! simulation owns and mutates them through
//! [`DrawableSet`](crate::resources::drawables::DrawableSet); the render side
//! only reads snapshots.
//!
//! Geometry is center-based: `(x, y)` is the center and `(width, height)`
//! the extent. `rotation` is in degrees, and positive values turn the shape
//! counter-clockwise on screen (the dispatcher rotates by `-rotation`).

use serde::{Deserialize, Serialize};

use crate::components::color::LogicalColor;
use crate::components::transform::Rect;
use crate::resources::texture::{Flip, TextureId};

/// Stable identity of a drawable, used to key per-drawable render caches.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DrawableId(pub u64);

impl std::fmt::Display for DrawableId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Whether a closed shape is filled or outlined.
#[derive(Clone, Copy, Debug, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Paint {
    #[default]
    Fill,
    Stroke { thickness: f32 },
}

/// What to draw, with exactly the fields each kind needs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Shape {
    /// Segment from the top-left to the bottom-right of the bounds.
    Line { thickness: f32 },
    Rectangle {
        #[serde(default)]
        paint: Paint,
    },
    Oval {
        #[serde(default)]
        paint: Paint,
    },
    /// `arc_width`/`arc_height` are the corner ellipse diameters.
    RoundedRectangle {
        #[serde(default)]
        paint: Paint,
        arc_width: f32,
        arc_height: f32,
    },
    Image {
        texture: TextureId,
        #[serde(default)]
        flip: Flip,
    },
    Text { content: String, font_key: String },
}

impl Shape {
    pub fn name(&self) -> &'static str {
        match self {
            Shape::Line { .. } => "line",
            Shape::Rectangle { .. } => "rectangle",
            Shape::Oval { .. } => "oval",
            Shape::RoundedRectangle { .. } => "rounded_rectangle",
            Shape::Image { .. } => "image",
            Shape::Text { .. } => "text",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Drawable {
    pub id: DrawableId,
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub width: f32,
    #[serde(default)]
    pub height: f32,
    #[serde(default)]
    pub rotation: f32,
    /// Ignored for images. `None` draws white.
    #[serde(default)]
    pub color: Option<LogicalColor>,
    #[serde(flatten)]
    pub shape: Shape,
}

impl Drawable {
    pub fn new(id: u64, shape: Shape, x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            id: DrawableId(id),
            x,
            y,
            width,
            height,
            rotation: 0.0,
            color: None,
            shape,
        }
    }

    pub fn line(id: u64, x: f32, y: f32, width: f32, height: f32, thickness: f32) -> Self {
        Self::new(id, Shape::Line { thickness }, x, y, width, height)
    }

    pub fn rectangle(id: u64, x: f32, y: f32, width: f32, height: f32) -> Self {
        Self::new(id, Shape::Rectangle { paint: Paint::Fill }, x, y, width, height)
    }

    pub fn oval(id: u64, x: f32, y: f32, width: f32, height: f32) -> Self {
        Self::new(id, Shape::Oval { paint: Paint::Fill }, x, y, width, height)
    }

    pub fn rounded_rectangle(
        id: u64,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        arc_width: f32,
        arc_height: f32,
    ) -> Self {
        Self::new(
            id,
            Shape::RoundedRectangle {
                paint: Paint::Fill,
                arc_width,
                arc_height,
            },
            x,
            y,
            width,
            height,
        )
    }

    pub fn image(id: u64, texture: TextureId, x: f32, y: f32, width: f32, height: f32) -> Self {
        Self::new(
            id,
            Shape::Image {
                texture,
                flip: Flip::None,
            },
            x,
            y,
            width,
            height,
        )
    }

    /// Text is centered on `(x, y)`; its extent comes from the font metrics.
    pub fn text(id: u64, content: impl Into<String>, font_key: impl Into<String>, x: f32, y: f32) -> Self {
        Self::new(
            id,
            Shape::Text {
                content: content.into(),
                font_key: font_key.into(),
            },
            x,
            y,
            0.0,
            0.0,
        )
    }

    pub fn with_rotation(mut self, degrees: f32) -> Self {
        self.rotation = degrees;
        self
    }

    pub fn with_color(mut self, color: LogicalColor) -> Self {
        self.color = Some(color);
        self
    }

    /// Switch a closed shape to outline mode. No effect on other kinds.
    pub fn stroked(mut self, thickness: f32) -> Self {
        match &mut self.shape {
            Shape::Rectangle { paint } | Shape::Oval { paint } | Shape::RoundedRectangle { paint, .. } => {
                *paint = Paint::Stroke { thickness };
            }
            _ => {}
        }
        self
    }

    pub fn flipped(mut self, to: Flip) -> Self {
        if let Shape::Image { flip, .. } = &mut self.shape {
            *flip = to;
        }
        self
    }

    pub fn bounds(&self) -> Rect {
        Rect::centered(self.x, self.y, self.width, self.height)
    }

    pub fn is_image(&self) -> bool {
        matches!(self.shape, Shape::Image { .. })
    }

    /// True when every numeric field can be rasterized.
    pub fn has_finite_geometry(&self) -> bool {
        let shape_ok = match self.shape {
            Shape::Line { thickness } => thickness.is_finite(),
            Shape::Rectangle { paint } | Shape::Oval { paint } => paint_is_finite(paint),
            Shape::RoundedRectangle {
                paint,
                arc_width,
                arc_height,
            } => paint_is_finite(paint) && arc_width.is_finite() && arc_height.is_finite(),
            Shape::Image { .. } | Shape::Text { .. } => true,
        };
        shape_ok && self.bounds().is_finite() && self.rotation.is_finite()
    }
}

fn paint_is_finite(paint: Paint) -> bool {
    match paint {
        Paint::Fill => true,
        Paint::Stroke { thickness } => thickness.is_finite(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stroked_only_touches_closed_shapes() {
        let r = Drawable::rectangle(1, 0.0, 0.0, 4.0, 4.0).stroked(2.0);
        assert_eq!(r.shape, Shape::Rectangle { paint: Paint::Stroke { thickness: 2.0 } });
        let l = Drawable::line(2, 0.0, 0.0, 4.0, 4.0, 1.0).stroked(3.0);
        assert_eq!(l.shape, Shape::Line { thickness: 1.0 });
    }

    #[test]
    fn test_bounds_are_center_based() {
        let d = Drawable::oval(1, 10.0, 10.0, 6.0, 2.0);
        assert_eq!(d.bounds(), Rect::new(7.0, 9.0, 6.0, 2.0));
    }

    #[test]
    fn test_nan_geometry_is_rejected() {
        let d = Drawable::rectangle(1, f32::NAN, 0.0, 1.0, 1.0);
        assert!(!d.has_finite_geometry());
        let d = Drawable::rectangle(1, 0.0, 0.0, 1.0, 1.0).stroked(f32::INFINITY);
        assert!(!d.has_finite_geometry());
    }

    #[test]
    fn test_deserialize_text_from_json() {
        let json = r#"{"id": 7, "x": 5, "y": 6, "kind": "text", "content": "hi", "font_key": "ui"}"#;
        let d: Drawable = serde_json::from_str(json).unwrap();
        assert_eq!(d.id, DrawableId(7));
        assert_eq!(
            d.shape,
            Shape::Text {
                content: "hi".into(),
                font_key: "ui".into()
            }
        );
        assert_eq!(d.color, None);
    }

    #[test]
    fn test_deserialize_stroked_rectangle() {
        let json = r#"{"id": 1, "x": 0, "y": 0, "width": 3, "height": 3, "rotation": -45,
            "color": {"r": 1, "g": 0, "b": 0},
            "kind": "rectangle", "paint": {"mode": "stroke", "thickness": 2}}"#;
        let d: Drawable = serde_json::from_str(json).unwrap();
        assert_eq!(d.rotation, -45.0);
        assert_eq!(d.color, Some(LogicalColor::new(1.0, 0.0, 0.0, 1.0)));
        assert_eq!(d.shape, Shape::Rectangle { paint: Paint::Stroke { thickness: 2.0 } });
    }
}
