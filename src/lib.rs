#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::unused_async)]

//! # Text Overlay Library
//!
//! Compositing and editing engine for styled, draggable text overlays on
//! raster images, with optional person segmentation so text can sit
//! "behind" the subject of a photo.
//!
//! ## Features
//!
//! - **Overlay Model**: positioned, styled text with pure grouped style updates
//! - **Compositor**: base image, watermark, z-ordered overlays and mask into one RGBA frame
//! - **Segmentation**: async, cancellable mask requests with a fingerprint cache
//! - **Interaction**: hit-testing, drag state machine, zoom and display fitting
//! - **Edit History**: linear undo/redo with per-overlay snapshots
//! - **CLI Integration**: optional command-line interface (enable with `cli` feature)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use textoverlay::{EditorConfig, EditorSession, ImageIoService, ImageRecord};
//!
//! # fn example() -> textoverlay::Result<()> {
//! let bytes = ImageIoService::read_bytes("photo.jpg")?;
//! let record = ImageRecord::from_upload("user_1", "photo.jpg", "photo.jpg", &bytes)?;
//!
//! let mut session = EditorSession::new(record, EditorConfig::default())?;
//! session.load_preview_bytes(&bytes)?;
//! session.add_text("Hello", None);
//!
//! let png = session.export()?;
//! ImageIoService::save_bytes(&png, "photo_overlay.png")?;
//! # Ok(())
//! # }
//! ```
//!
//! ### Feature Flags
//!
//! - `cli` (default): command-line interface and tracing subscriber setup
//! - `webp-support` (default): WebP decoding
//! - `tract`: ONNX person segmentation through tract (pure Rust)
//! - `tracing-json`: JSON log output for the CLI
//!
//! ### Library-Only Usage
//!
//! ```toml
//! [dependencies]
//! textoverlay = { version = "0.1", default-features = false }
//! ```

#[cfg(feature = "cli")]
pub mod cli;
pub mod color;
pub mod compositor;
pub mod config;
pub mod editor;
pub mod error;
pub mod history;
pub mod interaction;
pub mod overlay;
pub mod render;
pub mod segmentation;
pub mod services;
#[cfg(feature = "cli")]
pub mod tracing_config;
pub mod types;

// Public API exports
pub use color::ColorParser;
pub use compositor::Compositor;
pub use config::{
    DisplayLimits, EditorConfig, EditorConfigBuilder, ExportConfig, ExportFormat, FontConfig,
    HistoryConfig, SegmentationConfig, WatermarkConfig,
};
pub use editor::{EditorCommand, EditorSession, MaskState, PreviewState};
pub use error::{OverlayError, Result};
pub use history::{ActionKind, EditHistory, EditorAction};
pub use interaction::{fit_display, hit_test, CanvasRect, DoubleClick, DragState, InteractionController};
pub use overlay::{
    OverlayCollection, OverlayId, StyleUpdate, TextAlign, TextOverlay, TextStyle, FONT_FAMILIES,
};
pub use render::{BlockGlyphs, DrawingSurface, FontLibrary, GlyphSource, RasterSurface};
#[cfg(feature = "tract")]
pub use segmentation::TractSegmenter;
pub use segmentation::{
    MaskFileSegmenter, ResolutionHint, SegmentationAdapter, SegmentationOutcome, Segmenter,
};
pub use services::{ExportFormatHandler, ImageIoService};
pub use types::{ImageRecord, MaskStatistics, PixelFormat, Position, SegmentationMask};

/// Composite overlays onto a decoded image in one call
///
/// Fonts are discovered per `config.fonts`. For repeated renders keep a
/// [`Compositor`] or an [`EditorSession`] instead.
///
/// # Examples
///
/// ```rust
/// use textoverlay::{composite_image, EditorConfig, ImageRecord, TextOverlay};
/// use image::{DynamicImage, RgbaImage};
///
/// let base = DynamicImage::ImageRgba8(RgbaImage::new(64, 32));
/// let record = ImageRecord::with_dimensions("img", 64, 32);
/// let overlay = TextOverlay::new(&record, "Hi");
///
/// let config = EditorConfig::builder().system_fonts(false).watermark(false).build()?;
/// let frame = composite_image(&base, &[overlay], None, &config);
/// assert_eq!(frame.dimensions(), (64, 32));
/// # Ok::<(), textoverlay::OverlayError>(())
/// ```
#[must_use]
pub fn composite_image(
    base: &image::DynamicImage,
    overlays: &[TextOverlay],
    mask: Option<&SegmentationMask>,
    config: &EditorConfig,
) -> image::RgbaImage {
    Compositor::from_config(config).composite(&base.to_rgba8(), overlays, mask)
}
