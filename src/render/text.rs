//! Text shaping into coverage bitmaps
//!
//! [`FontLibrary`] rasterizes real faces with `ab_glyph`. [`BlockGlyphs`] is a
//! font-free source that draws every visible character as a solid cell, used
//! when no face can be found and in headless tests.

use super::surface::{Bounds, Coverage};
use crate::config::FontConfig;
use crate::error::{OverlayError, Result};
use crate::overlay::FontWeight;
use ab_glyph::{point, Font, FontArc, Glyph, OutlinedGlyph, PxScale, ScaleFont};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use walkdir::WalkDir;

/// Face and size requested for one run of text
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FontRequest<'a> {
    pub family: &'a str,
    pub weight: FontWeight,
    /// Em size in pixels
    pub size: f32,
    /// Extra advance after every glyph, pixels
    pub letter_spacing: f32,
    /// Pen-space region worth rasterizing; `None` rasterizes everything
    pub clip: Option<Bounds>,
}

/// Horizontal advance and vertical extent of a run, without coverage
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextMetrics {
    pub advance: f32,
    pub ascent: f32,
    pub descent: f32,
}

impl TextMetrics {
    /// Baseline shift that vertically centers the em box on the anchor
    #[must_use]
    pub fn middle_baseline(&self) -> f32 {
        (self.ascent + self.descent) / 2.0
    }
}

/// Shaped text in pen space: pen starts at x = 0 on the baseline y = 0
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub coverage: Coverage,
    /// Total advance width including letter spacing
    pub advance: f32,
    /// Distance above the baseline (positive)
    pub ascent: f32,
    /// Distance below the baseline (negative)
    pub descent: f32,
}

impl TextRun {
    #[must_use]
    pub fn metrics(&self) -> TextMetrics {
        TextMetrics {
            advance: self.advance,
            ascent: self.ascent,
            descent: self.descent,
        }
    }

    /// Baseline shift that vertically centers the em box on the anchor
    #[must_use]
    pub fn middle_baseline(&self) -> f32 {
        self.metrics().middle_baseline()
    }
}

/// Source of shaped glyph coverage
pub trait GlyphSource: Send + Sync {
    /// Lay out `text` without rasterizing it
    fn metrics(&self, text: &str, font: &FontRequest<'_>) -> TextMetrics;

    /// Shape and rasterize `text`, producing coverage only inside `font.clip`
    fn shape(&self, text: &str, font: &FontRequest<'_>) -> TextRun;

    /// Advance width of `text`
    fn measure(&self, text: &str, font: &FontRequest<'_>) -> f32 {
        self.metrics(text, font).advance
    }

    fn name(&self) -> &'static str;
}

/// Deterministic font-free glyph source
#[derive(Debug, Clone, Copy, Default)]
pub struct BlockGlyphs;

impl BlockGlyphs {
    const ADVANCE: f32 = 0.6;
    const CELL_LEFT: f32 = 0.1;
    const CELL_RIGHT: f32 = 0.5;
    const CELL_HEIGHT: f32 = 0.7;
    const ASCENT: f32 = 0.8;
    const DESCENT: f32 = -0.2;

    fn pen_advance(font: &FontRequest<'_>) -> f32 {
        Self::ADVANCE * font.size + font.letter_spacing
    }
}

impl GlyphSource for BlockGlyphs {
    fn metrics(&self, text: &str, font: &FontRequest<'_>) -> TextMetrics {
        TextMetrics {
            advance: text.chars().count() as f32 * Self::pen_advance(font),
            ascent: Self::ASCENT * font.size,
            descent: Self::DESCENT * font.size,
        }
    }

    fn shape(&self, text: &str, font: &FontRequest<'_>) -> TextRun {
        let size = font.size;
        let step = Self::pen_advance(font);
        let cells: Vec<_> = text
            .chars()
            .enumerate()
            .filter(|(_, ch)| !ch.is_whitespace())
            .map(|(i, _)| {
                (
                    i as f32 * step + Self::CELL_LEFT * size,
                    -Self::CELL_HEIGHT * size,
                    (Self::CELL_RIGHT - Self::CELL_LEFT) * size,
                    Self::CELL_HEIGHT * size,
                )
            })
            .collect();
        let metrics = self.metrics(text, font);

        TextRun {
            coverage: Coverage::from_rects_within(&cells, font.clip),
            advance: metrics.advance,
            ascent: metrics.ascent,
            descent: metrics.descent,
        }
    }

    fn name(&self) -> &'static str {
        "block"
    }
}

/// Alternative file-name prefixes tried for the built-in family names
const FAMILY_ALIASES: &[(&str, &[&str])] = &[
    ("arial", &["arial", "liberationsans", "arimo", "helvetica"]),
    ("helvetica", &["helvetica", "arial", "liberationsans", "nimbussans"]),
    ("timesnewroman", &["timesnewroman", "times", "liberationserif", "tinos", "nimbusroman"]),
    ("georgia", &["georgia", "gelasio", "dejavuserif"]),
    ("verdana", &["verdana", "dejavusans"]),
    ("couriernew", &["couriernew", "cour", "liberationmono", "cousine", "nimbusmono"]),
    ("impact", &["impact", "anton"]),
    ("comicsansms", &["comicsansms", "comic", "comicneue"]),
];

/// Faces tried when the requested family has no match
const FALLBACK_PREFIXES: &[&str] = &["arial", "liberationsans", "dejavusans", "notosans", "roboto"];

/// Weight tokens found in font file names, longest first
const WEIGHT_TOKENS: &[(&str, Option<u16>)] = &[
    ("extralight", Some(200)),
    ("ultralight", Some(200)),
    ("extrabold", Some(800)),
    ("ultrabold", Some(800)),
    ("semibold", Some(600)),
    ("demibold", Some(600)),
    ("regular", Some(400)),
    ("normal", Some(400)),
    ("medium", Some(500)),
    ("black", Some(900)),
    ("heavy", Some(900)),
    ("light", Some(300)),
    ("bold", Some(700)),
    ("thin", Some(100)),
    ("book", Some(400)),
    ("psmt", None),
    ("bd", Some(700)),
    ("mt", None),
];

/// Lowercase alphanumerics only, e.g. "Times New Roman" -> "timesnewroman"
fn squash(name: &str) -> String {
    name.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Weight encoded in a file-name suffix and whether every token was known
///
/// Italic and oblique faces yield `None`.
fn classify_suffix(suffix: &str) -> Option<(u16, bool)> {
    if suffix.contains("italic") || suffix.contains("oblique") || matches!(suffix, "i" | "bi" | "z")
    {
        return None;
    }
    if suffix == "b" {
        return Some((700, true));
    }

    let mut rest = suffix.to_string();
    let mut weight = None;
    for (token, token_weight) in WEIGHT_TOKENS {
        if let Some(at) = rest.find(token) {
            rest.replace_range(at..at + token.len(), "");
            if weight.is_none() {
                weight = *token_weight;
            }
        }
    }
    Some((weight.unwrap_or(400), rest.is_empty()))
}

struct FaceEntry {
    /// Squashed file stem
    key: String,
    path: Option<PathBuf>,
    font: OnceLock<Option<FontArc>>,
}

impl std::fmt::Debug for FaceEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FaceEntry")
            .field("key", &self.key)
            .field("path", &self.path)
            .field("loaded", &self.font.get().map(Option::is_some))
            .finish()
    }
}

impl FaceEntry {
    fn font(&self) -> Option<&FontArc> {
        self.font
            .get_or_init(|| {
                let path = self.path.as_ref()?;
                match std::fs::read(path).map(FontArc::try_from_vec) {
                    Ok(Ok(font)) => Some(font),
                    Ok(Err(e)) => {
                        log::warn!("Skipping unreadable font {}: {}", path.display(), e);
                        None
                    },
                    Err(e) => {
                        log::warn!("Failed to read font {}: {}", path.display(), e);
                        None
                    },
                }
            })
            .as_ref()
    }
}

/// Font faces discovered from files and directories
///
/// Directory entries are indexed by file name and only parsed the first time
/// a request selects them.
#[derive(Debug, Default)]
pub struct FontLibrary {
    faces: Vec<FaceEntry>,
}

impl FontLibrary {
    /// Library with no faces; every request renders with [`BlockGlyphs`]
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a library from configuration
    ///
    /// Unreadable files are logged and skipped so a bad entry never blocks
    /// rendering.
    #[must_use]
    pub fn from_config(config: &FontConfig) -> Self {
        let mut library = Self::empty();
        for file in &config.font_files {
            if let Err(e) = library.add_font_file(file) {
                tracing::warn!(path = %file.display(), error = %e, "Font file not loaded");
            }
        }
        for dir in &config.font_dirs {
            library.scan_dir(dir);
        }
        if config.system_fonts {
            if let Some(dir) = dirs::font_dir() {
                library.scan_dir(dir);
            }
            for dir in ["/usr/share/fonts", "/usr/local/share/fonts"] {
                let dir = Path::new(dir);
                if dir.is_dir() {
                    library.scan_dir(dir);
                }
            }
        }
        tracing::debug!(faces = library.len(), "Font library ready");
        library
    }

    /// Parse and register one font file immediately
    pub fn add_font_file<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();
        let bytes =
            std::fs::read(path).map_err(|e| OverlayError::file_io_error("read font", path, &e))?;
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();
        self.add_font_bytes(&name, bytes)
    }

    /// Register an in-memory font under a file-style name such as `Arial-Bold`
    pub fn add_font_bytes(&mut self, name: &str, bytes: Vec<u8>) -> Result<()> {
        let font = FontArc::try_from_vec(bytes)
            .map_err(|e| OverlayError::invalid_config(format!("Invalid font '{}': {}", name, e)))?;
        self.faces.push(FaceEntry {
            key: squash(name),
            path: None,
            font: OnceLock::from(Some(font)),
        });
        Ok(())
    }

    /// Index every `.ttf`/`.otf` under `dir`, returning how many were found
    pub fn scan_dir<P: AsRef<Path>>(&mut self, dir: P) -> usize {
        let before = self.faces.len();
        for entry in WalkDir::new(dir.as_ref()).follow_links(true).into_iter().flatten() {
            let path = entry.path();
            let is_font = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("ttf") || e.eq_ignore_ascii_case("otf"));
            if !entry.file_type().is_file() || !is_font {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                self.faces.push(FaceEntry {
                    key: squash(stem),
                    path: Some(path.to_path_buf()),
                    font: OnceLock::new(),
                });
            }
        }
        let found = self.faces.len() - before;
        log::debug!("Indexed {} font files in {}", found, dir.as_ref().display());
        found
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.faces.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    /// Best face for a family and weight
    fn resolve(&self, family: &str, weight: FontWeight) -> Option<&FontArc> {
        let key = squash(family);
        let aliases: Vec<&str> = FAMILY_ALIASES
            .iter()
            .find(|(name, _)| *name == key)
            .map_or_else(|| vec![key.as_str()], |(_, list)| list.to_vec());

        self.best_match(&aliases, weight.numeric())
            .or_else(|| self.best_match(FALLBACK_PREFIXES, 400))
            .or_else(|| self.faces.iter().find_map(FaceEntry::font))
    }

    fn best_match(&self, prefixes: &[&str], wanted: u16) -> Option<&FontArc> {
        let mut candidates: Vec<(u32, &FaceEntry)> = Vec::new();
        for (rank, prefix) in prefixes.iter().enumerate() {
            if prefix.is_empty() {
                continue;
            }
            for face in &self.faces {
                let Some(suffix) = face.key.strip_prefix(prefix) else {
                    continue;
                };
                let Some((weight, exact)) = classify_suffix(suffix) else {
                    continue;
                };
                let score = rank as u32 * 10_000
                    + if exact { 0 } else { 1_000 }
                    + u32::from(weight.abs_diff(wanted));
                candidates.push((score, face));
            }
        }
        candidates.sort_by_key(|(score, _)| *score);
        candidates.into_iter().find_map(|(_, face)| face.font())
    }
}

/// Largest em size outlined with a real face
///
/// `ab_glyph` rasterizes each outline into a buffer the size of its bounds,
/// so larger requests render with [`BlockGlyphs`].
pub const MAX_OUTLINE_SIZE: f32 = 2048.0;

impl FontLibrary {
    fn face_for(&self, font: &FontRequest<'_>) -> Option<&FontArc> {
        if font.size > MAX_OUTLINE_SIZE {
            tracing::debug!(size = font.size, "Font size above outline limit, using block glyphs");
            return None;
        }
        self.resolve(font.family, font.weight)
    }
}

impl GlyphSource for FontLibrary {
    fn metrics(&self, text: &str, font: &FontRequest<'_>) -> TextMetrics {
        match self.face_for(font) {
            Some(face) => layout(face, text, font).1,
            None => BlockGlyphs.metrics(text, font),
        }
    }

    fn shape(&self, text: &str, font: &FontRequest<'_>) -> TextRun {
        match self.face_for(font) {
            Some(face) => shape_with_face(face, text, font),
            None => BlockGlyphs.shape(text, font),
        }
    }

    fn name(&self) -> &'static str {
        "ab_glyph"
    }
}

/// Scale at which one em equals `size` pixels
fn em_scale(face: &FontArc, size: f32) -> PxScale {
    let units_per_em = face.units_per_em().unwrap_or(1000.0);
    PxScale::from(size * face.height_unscaled() / units_per_em)
}

/// Positioned glyphs with kerning and letter spacing applied
fn layout(face: &FontArc, text: &str, request: &FontRequest<'_>) -> (Vec<Glyph>, TextMetrics) {
    let scale = em_scale(face, request.size);
    let scaled = face.as_scaled(scale);

    let mut pen = 0.0f32;
    let mut previous = None;
    let mut glyphs = Vec::new();
    for ch in text.chars() {
        let id = face.glyph_id(ch);
        if let Some(prev) = previous {
            pen += scaled.kern(prev, id);
        }
        glyphs.push(id.with_scale_and_position(scale, point(pen, 0.0)));
        pen += scaled.h_advance(id) + request.letter_spacing;
        previous = Some(id);
    }

    let metrics = TextMetrics {
        advance: pen,
        ascent: scaled.ascent(),
        descent: scaled.descent(),
    };
    (glyphs, metrics)
}

fn shape_with_face(face: &FontArc, text: &str, request: &FontRequest<'_>) -> TextRun {
    let (glyphs, metrics) = layout(face, text, request);
    let outlines: Vec<OutlinedGlyph> = glyphs
        .into_iter()
        .filter_map(|glyph| face.outline_glyph(glyph))
        .filter(|outlined| {
            let b = outlined.px_bounds();
            request
                .clip
                .map_or(true, |c| b.min.x < c.2 && c.0 < b.max.x && b.min.y < c.3 && c.1 < b.max.y)
        })
        .collect();

    TextRun {
        coverage: rasterize(&outlines, request.clip),
        advance: metrics.advance,
        ascent: metrics.ascent,
        descent: metrics.descent,
    }
}

fn rasterize(outlines: &[OutlinedGlyph], clip: Option<Bounds>) -> Coverage {
    let Some(first) = outlines.first() else {
        return Coverage::empty();
    };
    let mut bounds = first.px_bounds();
    for outlined in outlines {
        let b = outlined.px_bounds();
        bounds.min.x = bounds.min.x.min(b.min.x);
        bounds.min.y = bounds.min.y.min(b.min.y);
        bounds.max.x = bounds.max.x.max(b.max.x);
        bounds.max.y = bounds.max.y.max(b.max.y);
    }
    if let Some(clip) = clip {
        bounds.min.x = bounds.min.x.max(clip.0.floor());
        bounds.min.y = bounds.min.y.max(clip.1.floor());
        bounds.max.x = bounds.max.x.min(clip.2.ceil());
        bounds.max.y = bounds.max.y.min(clip.3.ceil());
    }

    let width = (bounds.max.x - bounds.min.x).ceil().max(0.0) as u32;
    let height = (bounds.max.y - bounds.min.y).ceil().max(0.0) as u32;
    let mut image = image::GrayImage::new(width, height);
    for outlined in outlines {
        let b = outlined.px_bounds();
        let offset_x = (b.min.x - bounds.min.x) as i64;
        let offset_y = (b.min.y - bounds.min.y) as i64;
        outlined.draw(|x, y, coverage| {
            let (tx, ty) = (i64::from(x) + offset_x, i64::from(y) + offset_y);
            if tx < 0 || ty < 0 {
                return;
            }
            if let Some(pixel) = image.get_pixel_mut_checked(tx as u32, ty as u32) {
                let value = f32::from(pixel[0]) + coverage * 255.0;
                pixel[0] = value.round().min(255.0) as u8;
            }
        });
    }

    Coverage {
        image,
        origin: (bounds.min.x, bounds.min.y),
    }
}
