//! Raster drawing primitives used by the compositor

pub mod surface;
pub mod text;
pub mod transform;

pub use surface::{Bounds, Coverage, DrawingSurface, Paint, RasterSurface};
pub use text::{
    BlockGlyphs, FontLibrary, FontRequest, GlyphSource, TextMetrics, TextRun, MAX_OUTLINE_SIZE,
};
pub use transform::Affine;
