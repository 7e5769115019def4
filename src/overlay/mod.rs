//! Overlay data model
//!
//! Overlays are plain values. Every update returns a new overlay so the edit
//! history can keep before and after snapshots without sharing state.

pub mod collection;
pub mod model;
pub mod style;

pub use collection::OverlayCollection;
pub use model::{default_position, OverlayId, TextOverlay};
pub use style::{
    CanvasAlign, FillUpdate, FontUpdate, FontWeight, Shadow, ShadowUpdate, Stroke, StrokeUpdate,
    StyleUpdate, TextAlign, TextStyle, TransformUpdate, DEFAULT_OVERLAY_TEXT, FONT_FAMILIES,
};
