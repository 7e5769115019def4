//! Frame compositing: base image, watermark, overlays and segmentation mask
//!
//! Overlays are always drawn into a separate transparent layer which is then
//! laid over the canvas. The mask only ever removes pixels from that layer,
//! so the base image and the watermark are never touched by it.

use crate::color::{ColorParser, FALLBACK_COLOR};
use crate::config::{EditorConfig, WatermarkConfig};
use crate::overlay::{CanvasAlign, FontWeight, TextOverlay};
use crate::render::{
    Affine, BlockGlyphs, Bounds, Coverage, DrawingSurface, FontLibrary, FontRequest, GlyphSource,
    Paint, RasterSurface,
};
use crate::types::SegmentationMask;
use image::{Rgba, RgbaImage};
use instant::Instant;
use std::sync::Arc;

const WATERMARK_FAMILY: &str = "Arial";
const WATERMARK_FALLBACK_COLOR: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Largest stroke half-width drawn, pixels
pub const MAX_STROKE_RADIUS: f32 = 256.0;
/// Largest shadow blur sigma drawn, pixels
pub const MAX_SHADOW_SIGMA: f32 = 64.0;

/// Pure compositor for editor frames
#[derive(Clone)]
pub struct Compositor {
    watermark: WatermarkConfig,
    glyphs: Arc<dyn GlyphSource>,
}

impl std::fmt::Debug for Compositor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compositor")
            .field("watermark", &self.watermark)
            .field("glyphs", &self.glyphs.name())
            .finish()
    }
}

impl Compositor {
    #[must_use]
    pub fn new(watermark: WatermarkConfig, glyphs: Arc<dyn GlyphSource>) -> Self {
        Self { watermark, glyphs }
    }

    /// Compositor using fonts discovered from the configuration
    #[must_use]
    pub fn from_config(config: &EditorConfig) -> Self {
        Self::new(
            config.watermark.clone(),
            Arc::new(FontLibrary::from_config(&config.fonts)),
        )
    }

    /// Compositor that renders without any font files
    #[must_use]
    pub fn with_block_glyphs(watermark: WatermarkConfig) -> Self {
        Self::new(watermark, Arc::new(BlockGlyphs))
    }

    #[must_use]
    pub fn watermark(&self) -> &WatermarkConfig {
        &self.watermark
    }

    pub fn set_watermark(&mut self, watermark: WatermarkConfig) {
        self.watermark = watermark;
    }

    #[must_use]
    pub fn glyphs(&self) -> &Arc<dyn GlyphSource> {
        &self.glyphs
    }

    /// Composite one frame at the base image's native size
    ///
    /// `overlays` is in insertion order; drawing follows ascending z-index
    /// with ties kept in insertion order. A mask whose dimensions differ from
    /// the base is ignored.
    #[tracing::instrument(skip_all, fields(width = base.width(), height = base.height(), overlays = overlays.len()))]
    pub fn composite(
        &self,
        base: &RgbaImage,
        overlays: &[TextOverlay],
        mask: Option<&SegmentationMask>,
    ) -> RgbaImage {
        let start = Instant::now();
        let (width, height) = base.dimensions();
        let mut canvas = RasterSurface::new(width, height);
        canvas.draw_image(base, 0, 0);

        if self.watermark.enabled {
            self.draw_watermark(&mut canvas);
        }

        let mut ordered: Vec<&TextOverlay> = overlays.iter().collect();
        ordered.sort_by_key(|overlay| overlay.z_index);

        let mut layer = RasterSurface::new(width, height);
        for overlay in ordered {
            self.draw_overlay(&mut layer, overlay);
        }

        match mask {
            Some(mask) if mask.matches(width, height) => apply_mask(&mut layer, mask),
            Some(mask) => tracing::warn!(
                mask_width = mask.dimensions.0,
                mask_height = mask.dimensions.1,
                width,
                height,
                "Mask dimensions do not match the image, compositing unmasked"
            ),
            None => {},
        }

        canvas.draw_image(layer.as_image(), 0, 0);
        tracing::debug!(elapsed_ms = start.elapsed().as_secs_f64() * 1000.0, "Frame composited");
        canvas.into_image()
    }

    /// Draw the brand text centered and rotated over the whole canvas
    fn draw_watermark<S: DrawingSurface>(&self, surface: &mut S) {
        let config = &self.watermark;
        let (width, height) = surface.dimensions();
        let size = width.min(height) as f32 / config.size_divisor;
        if config.text.is_empty() || !(size.is_finite() && size > 0.0) {
            return;
        }

        let mut request = FontRequest {
            family: WATERMARK_FAMILY,
            weight: FontWeight::Bold,
            size,
            letter_spacing: 0.0,
            clip: None,
        };
        let metrics = self.glyphs.metrics(&config.text, &request);
        let transform = Affine::translate(width as f32 / 2.0, height as f32 / 2.0)
            .then(&Affine::rotate_degrees(config.angle_degrees))
            .then(&Affine::translate(-metrics.advance / 2.0, metrics.middle_baseline()));
        request.clip = visible_region(&transform, (width, height), 1.0);
        let run = self.glyphs.shape(&config.text, &request);
        let color = ColorParser::parse_or(&config.color, WATERMARK_FALLBACK_COLOR);
        surface.fill_text(&run.coverage, Paint::new(color, config.opacity), &transform);
    }

    /// Draw one overlay: background box, shadow, stroke, then fill
    ///
    /// Glyph coverage is only produced for the part of the overlay that can
    /// reach the surface.
    pub fn draw_overlay<S: DrawingSurface>(&self, surface: &mut S, overlay: &TextOverlay) {
        let style = &overlay.style;
        let opacity = style.opacity.clamp(0.0, 1.0);
        if opacity <= 0.0 {
            return;
        }
        let dimensions = surface.dimensions();

        let request = FontRequest {
            family: &style.font_family,
            weight: style.font_weight,
            size: style.font_size,
            letter_spacing: style.letter_spacing.unwrap_or(0.0),
            clip: None,
        };
        let metrics = self.glyphs.metrics(&overlay.text, &request);

        let align_offset = match style.text_align.canvas_align() {
            CanvasAlign::Left => 0.0,
            CanvasAlign::Center => -metrics.advance / 2.0,
            CanvasAlign::Right => -metrics.advance,
        };
        let anchor = Affine::translate(overlay.position.x, overlay.position.y)
            .then(&Affine::rotate_degrees(style.normalized_rotation()));
        let transform = anchor.then(&Affine::translate(align_offset, metrics.middle_baseline()));

        if let Some(background) = style.background_color.as_deref() {
            match ColorParser::parse(background) {
                Ok(color) => {
                    let size = style.font_size;
                    let text_box = Coverage::from_rects_within(
                        &[(align_offset, -size / 2.0, metrics.advance, size)],
                        visible_region(&anchor, dimensions, 1.0),
                    );
                    surface.fill_text(&text_box, Paint::new(color, opacity), &anchor);
                },
                Err(e) => tracing::debug!(error = %e, "Skipping unparseable background color"),
            }
        }

        let stroke = style.stroke.as_ref().filter(|stroke| stroke.width > 0.0).map(|stroke| {
            (
                (stroke.width / 2.0).min(MAX_STROKE_RADIUS),
                ColorParser::parse_or(&stroke.color, FALLBACK_COLOR),
            )
        });
        let stroke_radius = stroke.map_or(0.0, |(radius, _)| radius);
        // Fill and stroke coverage limited to what `clip` can show
        let shape_within = |clip: Option<Bounds>| {
            let run = self.glyphs.shape(&overlay.text, &FontRequest { clip, ..request });
            let stroked = stroke.map(|(radius, _)| run.coverage.dilated(radius));
            (run, stroked)
        };

        let shadow = style.shadow.as_ref().and_then(|shadow| {
            let color = ColorParser::parse_or(&shadow.color, FALLBACK_COLOR);
            let casts = color[3] > 0
                && (shadow.blur > 0.0 || shadow.offset_x != 0.0 || shadow.offset_y != 0.0);
            casts.then(|| {
                let sigma = (shadow.blur.max(0.0) / 2.0).min(MAX_SHADOW_SIGMA);
                let offset = Affine::translate(shadow.offset_x, shadow.offset_y).then(&transform);
                (color, sigma, offset, shadow.offset_x.hypot(shadow.offset_y))
            })
        });
        let blur_reach = shadow.as_ref().map_or(0.0, |(_, sigma, _, _)| sigma * 3.0);
        // Short shadow offsets share the fill's coverage; long ones are shaped
        // for their own visible region
        let shift = shadow.as_ref().map_or(0.0, |(_, _, _, shift)| *shift);
        let shared = shift <= MAX_SHADOW_SIGMA;

        let reach = stroke_radius + blur_reach + 2.0;
        let shared_reach = if shared { shift + 1.0 } else { 0.0 };
        let (run, stroked) = shape_within(visible_region(&transform, dimensions, reach + shared_reach));

        if let Some((color, sigma, offset, _)) = &shadow {
            let separate = (!shared).then(|| shape_within(visible_region(offset, dimensions, reach)));
            let (shadow_run, shadow_stroked) =
                separate.as_ref().map_or((&run, &stroked), |(run, stroked)| (run, stroked));
            let source = shadow_stroked.as_ref().unwrap_or(&shadow_run.coverage);
            let blurred = source.blurred(*sigma);
            surface.fill_text(&blurred, Paint::new(*color, opacity), offset);
        }

        if let (Some((_, color)), Some(outline)) = (stroke, &stroked) {
            surface.fill_text(outline, Paint::new(color, opacity), &transform);
        }

        let fill = ColorParser::parse_or(&style.color, FALLBACK_COLOR);
        surface.fill_text(&run.coverage, Paint::new(fill, opacity), &transform);
    }
}

/// Local-space box of everything `transform` can place on a surface of
/// `dimensions`, grown by `margin` local pixels
fn visible_region(transform: &Affine, dimensions: (u32, u32), margin: f32) -> Option<Bounds> {
    let inverse = transform.inverse()?;
    let (width, height) = (dimensions.0 as f32, dimensions.1 as f32);
    let corners = [
        inverse.apply(0.0, 0.0),
        inverse.apply(width, 0.0),
        inverse.apply(0.0, height),
        inverse.apply(width, height),
    ];
    let left = corners.iter().map(|c| c.0).fold(f32::INFINITY, f32::min);
    let top = corners.iter().map(|c| c.1).fold(f32::INFINITY, f32::min);
    let right = corners.iter().map(|c| c.0).fold(f32::NEG_INFINITY, f32::max);
    let bottom = corners.iter().map(|c| c.1).fold(f32::NEG_INFINITY, f32::max);
    Some((left - margin, top - margin, right + margin, bottom + margin))
}

/// Clear layer pixels wherever the mask marks foreground
fn apply_mask<S: DrawingSurface>(layer: &mut S, mask: &SegmentationMask) {
    let (width, height) = layer.dimensions();
    for y in 0..height {
        for x in 0..width {
            if mask.alpha_at(x, y) > 0 && layer.pixel_alpha(x, y) > 0 {
                layer.set_pixel_alpha(x, y, 0);
            }
        }
    }
}
