//! Scene descriptions loaded from JSON.
//!
//! A scene file is either a bare list of drawables or an object that also
//! names the textures and fonts those drawables reference:
//!
//! ```json
//! {
//!   "background": { "r": 0.1, "g": 0.1, "b": 0.2 },
//!   "textures": ["assets/ship.png"],
//!   "fonts": [{ "key": "ui", "family": "Mono", "size": 16 }],
//!   "drawables": [
//!     { "id": 1, "kind": "rectangle", "x": 40, "y": 30, "width": 20, "height": 10 },
//!     { "id": 2, "kind": "image", "texture": 0, "x": 80, "y": 60, "width": 32, "height": 32 },
//!     { "id": 3, "kind": "text", "content": "hello", "font_key": "ui", "x": 160, "y": 20 }
//!   ]
//! }
//! ```
//!
//! Textures get their ids in list order, starting from the next free id of
//! the store they are loaded into (0 for a fresh store).

use fastrand::Rng;
use log::info;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::components::color::LogicalColor;
use crate::components::drawable::{Drawable, Paint, Shape};
use crate::error::Result;
use crate::resources::store::ResourceStore;

/// Font to register before the scene is drawn.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FontSpec {
    pub key: String,
    pub family: String,
    pub size: f32,
    /// 0 normal, 1 bold, 2 italic.
    #[serde(default)]
    pub style: i32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    #[serde(default = "default_background")]
    pub background: LogicalColor,
    #[serde(default)]
    pub textures: Vec<PathBuf>,
    #[serde(default)]
    pub fonts: Vec<FontSpec>,
    pub drawables: Vec<Drawable>,
}

fn default_background() -> LogicalColor {
    LogicalColor::BLACK
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SceneFile {
    Bare(Vec<Drawable>),
    Full(Scene),
}

impl Scene {
    pub fn new(drawables: Vec<Drawable>) -> Self {
        Self {
            background: default_background(),
            textures: Vec::new(),
            fonts: Vec::new(),
            drawables,
        }
    }

    /// Load the textures and fonts the scene refers to.
    pub fn load_resources(&self, store: &mut ResourceStore) -> Result<()> {
        for path in &self.textures {
            store.textures.load_texture_file(path, true)?;
        }
        for font in &self.fonts {
            store
                .fonts
                .load_font(font.key.clone(), font.family.clone(), font.size, font.style)?;
        }
        Ok(())
    }
}

/// Parse a scene from JSON text.
pub fn parse_scene(text: &str) -> Result<Scene> {
    Ok(match serde_json::from_str::<SceneFile>(text)? {
        SceneFile::Bare(drawables) => Scene::new(drawables),
        SceneFile::Full(scene) => scene,
    })
}

/// Read and parse a scene file.
pub fn load_scene(path: impl AsRef<Path>) -> Result<Scene> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)?;
    let scene = parse_scene(&text)?;
    info!("Loaded scene {:?}: {} drawables", path, scene.drawables.len());
    Ok(scene)
}

fn random_f32_range(rng: &mut Rng, min: f32, max: f32) -> f32 {
    min + rng.f32() * (max - min)
}

/// Built-in scene of random shapes covering a `width` x `height` surface.
/// The same seed always produces the same scene.
pub fn demo_scene(seed: u64, width: u32, height: u32, count: usize) -> Scene {
    let mut rng = Rng::with_seed(seed);
    let (w, h) = (width as f32, height as f32);
    let drawables = (0..count)
        .map(|i| {
            let size = random_f32_range(&mut rng, 8.0, 48.0);
            let paint = if rng.bool() {
                Paint::Fill
            } else {
                Paint::Stroke {
                    thickness: random_f32_range(&mut rng, 1.0, 4.0),
                }
            };
            let shape = match rng.u8(0..4) {
                0 => Shape::Line {
                    thickness: random_f32_range(&mut rng, 1.0, 3.0),
                },
                1 => Shape::Oval { paint },
                2 => Shape::RoundedRectangle {
                    paint,
                    arc_width: size / 3.0,
                    arc_height: size / 3.0,
                },
                _ => Shape::Rectangle { paint },
            };
            let color = LogicalColor::new(rng.f32(), rng.f32(), rng.f32(), 1.0);
            Drawable::new(
                i as u64 + 1,
                shape,
                random_f32_range(&mut rng, 0.0, w),
                random_f32_range(&mut rng, 0.0, h),
                size,
                random_f32_range(&mut rng, size / 2.0, size),
            )
            .with_rotation(random_f32_range(&mut rng, -180.0, 180.0))
            .with_color(color)
        })
        .collect();
    Scene::new(drawables)
}
