//! Font store resource.
//!
//! Stores parsed fonts keyed by string IDs. Text drawables reference fonts by
//! key; a later load with the same key replaces the earlier entry.
//!
//! Faces are parsed with `fontdue`. System fonts are looked up by family name
//! in the platform font directories; a family that cannot be found falls back
//! to the bundled DejaVu Sans Mono face so text always renders. Measurement
//! uses the face's own advances, kerning and line metrics.

use fontdue::{Font, FontSettings, Metrics};
use log::{debug, info, warn};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{RenderError, ResourceKind, Result};

/// Face used when a requested family is not installed.
const FALLBACK_FACE: &[u8] = include_bytes!("../../assets/fonts/DejaVuSansMono.ttf");
pub const FALLBACK_FAMILY: &str = "DejaVu Sans Mono";

/// Rasterized glyphs kept per font before the cache is reset.
const GLYPH_CACHE_LIMIT: usize = 4096;
/// How deep the font directories are searched.
const MAX_SCAN_DEPTH: usize = 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum FontWeight {
    #[default]
    Normal,
    Bold,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum FontSlant {
    #[default]
    Regular,
    Italic,
}

/// Style selector used by the loading API: 0 normal, 1 bold, 2 italic.
pub fn style_from_code(code: i32) -> (FontWeight, FontSlant) {
    match code {
        1 => (FontWeight::Bold, FontSlant::Regular),
        2 => (FontWeight::Normal, FontSlant::Italic),
        _ => (FontWeight::Normal, FontSlant::Regular),
    }
}

/// Where a loaded face came from.
#[derive(Clone, Debug, PartialEq)]
pub enum FontSource {
    /// A font file found in the system font directories.
    System(PathBuf),
    /// Font file contents handed to the store directly.
    Embedded(Arc<[u8]>),
    /// The bundled face, used when the family was not found.
    Fallback,
}

/// A rasterized glyph: coverage bitmap plus placement metrics.
#[derive(Debug)]
pub struct Glyph {
    pub metrics: Metrics,
    /// One coverage byte per pixel, row-major, `metrics.width` wide.
    pub coverage: Vec<u8>,
}

type GlyphCache = FxHashMap<(char, u32), Arc<Glyph>>;

/// A loaded font.
#[derive(Clone)]
pub struct FontEntry {
    pub family: String,
    pub weight: FontWeight,
    pub slant: FontSlant,
    pub size: f32,
    pub source: FontSource,
    face: Arc<Font>,
    glyphs: Arc<Mutex<GlyphCache>>,
}

impl fmt::Debug for FontEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FontEntry")
            .field("family", &self.family)
            .field("weight", &self.weight)
            .field("slant", &self.slant)
            .field("size", &self.size)
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

impl FontEntry {
    /// Parse font file contents into an entry of the given size.
    pub fn from_bytes(family: impl Into<String>, size: f32, data: &[u8], source: FontSource) -> Result<Self> {
        let face = Font::from_bytes(data, FontSettings::default()).map_err(|e| RenderError::Font(e.to_string()))?;
        Ok(Self::with_face(family, size, Arc::new(face), source))
    }

    fn with_face(family: impl Into<String>, size: f32, face: Arc<Font>, source: FontSource) -> Self {
        Self {
            family: family.into(),
            weight: FontWeight::Normal,
            slant: FontSlant::Regular,
            size,
            source,
            face,
            glyphs: Arc::default(),
        }
    }

    pub fn face(&self) -> &Font {
        &self.face
    }

    /// Distance from the baseline to the top of the tallest glyphs.
    pub fn ascent(&self) -> f32 {
        match self.face.horizontal_line_metrics(self.size) {
            Some(m) => m.ascent,
            None => self.size * 0.8,
        }
    }

    /// Baseline-to-baseline distance.
    pub fn line_height(&self) -> f32 {
        match self.face.horizontal_line_metrics(self.size) {
            Some(m) => m.new_line_size,
            None => self.size * 1.2,
        }
    }

    /// Horizontal pen advance after `ch`.
    pub fn advance(&self, ch: char) -> f32 {
        self.face.metrics(ch, self.size).advance_width
    }

    /// Kerning adjustment between `left` and `right`.
    pub fn kern(&self, left: char, right: char) -> f32 {
        self.face.horizontal_kern(left, right, self.size).unwrap_or(0.0)
    }

    /// Advance width of a single line.
    pub fn line_width(&self, line: &str) -> f32 {
        let mut width = 0.0;
        let mut prev = None;
        for ch in line.chars() {
            if let Some(p) = prev {
                width += self.kern(p, ch);
            }
            width += self.advance(ch);
            prev = Some(ch);
        }
        width
    }

    /// Width of the widest line and total height of all lines.
    pub fn measure(&self, text: &str) -> (f32, f32) {
        let mut lines = 0usize;
        let mut widest = 0.0f32;
        for line in text.lines() {
            lines += 1;
            widest = widest.max(self.line_width(line));
        }
        let lines = lines.max(1);
        (widest, lines as f32 * self.line_height())
    }

    /// Rasterize `ch` at `px` pixels, reusing earlier results.
    pub fn glyph(&self, ch: char, px: f32) -> Arc<Glyph> {
        let key = (ch, px.to_bits());
        let mut cache = self.glyphs.lock();
        if let Some(glyph) = cache.get(&key) {
            return glyph.clone();
        }
        if cache.len() >= GLYPH_CACHE_LIMIT {
            cache.clear();
        }
        let (metrics, coverage) = self.face.rasterize(ch, px);
        let glyph = Arc::new(Glyph { metrics, coverage });
        cache.insert(key, glyph.clone());
        glyph
    }
}

/// Platform font directories, most specific first.
fn default_font_dirs() -> Vec<PathBuf> {
    let mut found = Vec::new();
    if let Some(user) = dirs::font_dir() {
        found.push(user);
    }
    if let Some(home) = dirs::home_dir() {
        found.push(home.join(".fonts"));
    }
    if cfg!(target_os = "windows") {
        let windir = std::env::var_os("WINDIR").unwrap_or_else(|| "C:\\Windows".into());
        found.push(PathBuf::from(windir).join("Fonts"));
    } else if cfg!(target_os = "macos") {
        found.push("/System/Library/Fonts".into());
        found.push("/Library/Fonts".into());
    } else {
        found.push("/usr/local/share/fonts".into());
        found.push("/usr/share/fonts".into());
    }
    found
}

/// Lowercase alphanumerics only, so "DejaVu Sans-Bold" matches "dejavusansbold".
fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Concrete families tried for the generic names scenes tend to use.
fn family_candidates(family: &str) -> Vec<String> {
    let generic: &[&str] = match normalize(family).as_str() {
        "mono" | "monospace" | "monospaced" => &["DejaVu Sans Mono", "Liberation Mono", "Consolas", "Menlo", "Courier New"],
        "serif" => &["DejaVu Serif", "Liberation Serif", "Times New Roman", "Times"],
        "sans" | "sansserif" | "dialog" => &["DejaVu Sans", "Liberation Sans", "Arial", "Helvetica"],
        _ => &[],
    };
    if generic.is_empty() {
        vec![normalize(family)]
    } else {
        generic.iter().map(|f| normalize(f)).collect()
    }
}

fn style_suffixes(weight: FontWeight, slant: FontSlant) -> &'static [&'static str] {
    match (weight, slant) {
        (FontWeight::Normal, FontSlant::Regular) => &["", "regular", "book", "roman"],
        (FontWeight::Bold, FontSlant::Regular) => &["bold", "bd"],
        (FontWeight::Normal, FontSlant::Italic) => &["italic", "oblique", "it"],
        (FontWeight::Bold, FontSlant::Italic) => &["bolditalic", "boldoblique", "bi"],
    }
}

fn scan_dir(dir: &Path, depth: usize, index: &mut FxHashMap<String, PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            if depth < MAX_SCAN_DEPTH {
                scan_dir(&path, depth + 1, index);
            }
            continue;
        }
        let is_font = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("ttf") || e.eq_ignore_ascii_case("otf"));
        if !is_font {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()).map(normalize) {
            // First directory wins.
            index.entry(stem).or_insert(path);
        }
    }
}

/// Map of font keys to loaded fonts.
pub struct FontStore {
    fonts: FxHashMap<String, FontEntry>,
    font_dirs: Vec<PathBuf>,
    /// Normalized file stem to path, built on first system lookup.
    system: Option<FxHashMap<String, PathBuf>>,
    fallback: Option<Arc<Font>>,
}

impl Default for FontStore {
    fn default() -> Self {
        Self::with_font_dirs(default_font_dirs())
    }
}

impl FontStore {
    /// Create an empty font store searching the platform font directories.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty font store searching only `dirs` for system fonts.
    pub fn with_font_dirs(dirs: Vec<PathBuf>) -> Self {
        Self {
            fonts: FxHashMap::default(),
            font_dirs: dirs,
            system: None,
            fallback: None,
        }
    }

    fn system_index(&mut self) -> &FxHashMap<String, PathBuf> {
        let dirs = &self.font_dirs;
        self.system.get_or_insert_with(|| {
            let mut index = FxHashMap::default();
            for dir in dirs {
                scan_dir(dir, 0, &mut index);
            }
            debug!("indexed {} system font files", index.len());
            index
        })
    }

    /// Font file for `family` in the requested style, falling back to the
    /// family's regular face.
    fn find_system_font(&mut self, family: &str, weight: FontWeight, slant: FontSlant) -> Option<PathBuf> {
        let candidates = family_candidates(family);
        let index = self.system_index();
        let styled = style_suffixes(weight, slant);
        let regular = style_suffixes(FontWeight::Normal, FontSlant::Regular);
        for suffixes in [styled, regular] {
            for base in &candidates {
                for suffix in suffixes {
                    if let Some(path) = index.get(&format!("{base}{suffix}")) {
                        return Some(path.clone());
                    }
                }
            }
        }
        None
    }

    fn fallback_face(&mut self) -> Result<Arc<Font>> {
        if let Some(face) = &self.fallback {
            return Ok(face.clone());
        }
        let face = Font::from_bytes(FALLBACK_FACE, FontSettings::default())
            .map_err(|e| RenderError::Font(e.to_string()))?;
        let face = Arc::new(face);
        self.fallback = Some(face.clone());
        Ok(face)
    }

    /// Register a system font by family name. `style` is 0 normal, 1 bold,
    /// 2 italic. Unknown families use the bundled face.
    pub fn load_font(&mut self, key: impl Into<String>, family: impl Into<String>, size: f32, style: i32) -> Result<()> {
        let family = family.into();
        let (weight, slant) = style_from_code(style);
        let loaded = match self.find_system_font(&family, weight, slant) {
            Some(path) => match std::fs::read(&path) {
                Ok(bytes) => match FontEntry::from_bytes(family.clone(), size, &bytes, FontSource::System(path.clone())) {
                    Ok(entry) => Some(entry),
                    Err(e) => {
                        warn!("font file {} unusable: {}", path.display(), e);
                        None
                    }
                },
                Err(e) => {
                    warn!("font file {} unreadable: {}", path.display(), e);
                    None
                }
            },
            None => None,
        };
        let entry = match loaded {
            Some(entry) => entry,
            None => {
                warn!("font family '{}' not found, using {}", family, FALLBACK_FAMILY);
                FontEntry::with_face(family, size, self.fallback_face()?, FontSource::Fallback)
            }
        };
        self.add(
            key,
            FontEntry {
                weight,
                slant,
                ..entry
            },
        );
        Ok(())
    }

    /// Register a font from file contents. The key doubles as the family
    /// name.
    pub fn load_embedded_font(&mut self, key: impl Into<String>, size: f32, data: impl Into<Arc<[u8]>>) -> Result<()> {
        let key = key.into();
        let data: Arc<[u8]> = data.into();
        let entry = FontEntry::from_bytes(key.clone(), size, &data, FontSource::Embedded(data.clone()))?;
        self.add(key, entry);
        Ok(())
    }

    /// Add a font with the given key, replacing any previous entry.
    pub fn add(&mut self, key: impl Into<String>, font: FontEntry) {
        let key = key.into();
        info!("font '{}' loaded ({} {}px)", key, font.family, font.size);
        if self.fonts.insert(key.clone(), font).is_some() {
            debug!("font '{}' replaced an existing entry", key);
        }
    }

    /// Remove a font. Unknown keys are ignored.
    pub fn unload_font(&mut self, key: &str) {
        if self.fonts.remove(key).is_some() {
            info!("font '{}' unloaded", key);
        }
    }

    /// Get a font by its key.
    pub fn get(&self, key: impl AsRef<str>) -> Option<&FontEntry> {
        self.fonts.get(key.as_ref())
    }

    /// Like [`get`](Self::get) but a miss is a [`RenderError::ResourceNotFound`].
    pub fn require(&self, key: &str) -> Result<&FontEntry> {
        self.get(key)
            .ok_or_else(|| RenderError::not_found(ResourceKind::Font, key))
    }

    /// Rendered `(width, height)` of `text` in font `key`.
    pub fn measure(&self, text: &str, key: &str) -> Result<(f32, f32)> {
        Ok(self.require(key)?.measure(text))
    }

    pub fn string_width(&self, text: &str, key: &str) -> Result<f32> {
        self.measure(text, key).map(|(w, _)| w)
    }

    pub fn string_height(&self, text: &str, key: &str) -> Result<f32> {
        self.measure(text, key).map(|(_, h)| h)
    }

    /// Remove all loaded fonts.
    pub fn clear(&mut self) {
        self.fonts.clear();
    }

    /// Get the number of loaded fonts.
    pub fn len(&self) -> usize {
        self.fonts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fonts.is_empty()
    }
}
