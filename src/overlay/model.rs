//! Text overlay records and pure updates

use super::style::{StyleUpdate, TextStyle};
use crate::types::{ImageRecord, Position};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fallback native extent used when an image reports a zero dimension
const ZERO_DIMENSION_CENTER: f32 = 400.0;

/// Stable overlay identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OverlayId(String);

impl OverlayId {
    /// Generate a fresh random identifier
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("text_{}", uuid::Uuid::new_v4().simple()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for OverlayId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for OverlayId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for OverlayId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A positioned, styled run of text attached to one image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextOverlay {
    pub id: OverlayId,
    pub image_id: String,
    pub text: String,
    /// Anchor point in native image pixels
    pub position: Position,
    pub style: TextStyle,
    #[serde(default)]
    pub z_index: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TextOverlay {
    /// Create an overlay with the default style at the image center
    ///
    /// The z-index is the number of overlays the image already carries.
    #[must_use]
    pub fn new(image: &ImageRecord, text: impl Into<String>) -> Self {
        Self::at(image, text, default_position(image.width, image.height))
    }

    /// Create an overlay with the default style at an explicit position
    #[must_use]
    pub fn at(image: &ImageRecord, text: impl Into<String>, position: Position) -> Self {
        let now = Utc::now();
        Self {
            id: OverlayId::generate(),
            image_id: image.id.clone(),
            text: text.into(),
            position,
            style: TextStyle::default(),
            z_index: image.text_overlays.len() as i64,
            created_at: now,
            updated_at: now,
        }
    }

    #[must_use]
    pub fn with_z_index(mut self, z_index: i64) -> Self {
        self.z_index = z_index;
        self
    }

    #[must_use]
    pub fn with_text(&self, text: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.text = text.into();
        next.touch();
        next
    }

    #[must_use]
    pub fn with_position(&self, position: Position) -> Self {
        let mut next = self.clone();
        next.position = position;
        next.touch();
        next
    }

    /// Apply a grouped style update, keeping every other field
    #[must_use]
    pub fn with_style(&self, update: &StyleUpdate) -> Self {
        let mut next = self.clone();
        next.style = self.style.apply(update);
        next.touch();
        next
    }

    /// Number of Unicode scalar values in the text
    #[must_use]
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now().max(self.updated_at);
    }
}

/// Image center rounded to whole pixels
#[must_use]
pub fn default_position(width: u32, height: u32) -> Position {
    let center = |extent: u32| {
        if extent == 0 {
            ZERO_DIMENSION_CENTER
        } else {
            (extent as f32 / 2.0).round()
        }
    };
    Position::new(center(width), center(height))
}
