//! Person/background segmentation boundary
//!
//! A [`Segmenter`] turns an image into a same-size alpha mask. The
//! [`SegmentationAdapter`] runs segmenters off the editing path on tokio
//! tasks, discards results that arrive for a superseded request, and caches
//! masks per image fingerprint.

pub mod adapter;
pub mod cache;
pub mod mask_file;

#[cfg(feature = "tract")]
pub mod tract;

#[cfg(test)]
pub mod test_utils;

pub use adapter::{SegmentationAdapter, SegmentationOutcome, SegmentationResult, SegmentationTicket};
pub use cache::MaskCache;
pub use mask_file::MaskFileSegmenter;

#[cfg(feature = "tract")]
pub use self::tract::TractSegmenter;

use crate::error::{OverlayError, Result};
use crate::types::SegmentationMask;
use async_trait::async_trait;
use image::RgbaImage;
use serde::{Deserialize, Serialize};

/// Internal resolution the segmenter should work at
///
/// Lower resolutions trade mask edge quality for latency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionHint {
    Low,
    #[default]
    Medium,
    High,
    Full,
}

impl ResolutionHint {
    /// Fraction of native resolution
    #[must_use]
    pub fn scale(self) -> f32 {
        match self {
            Self::Low => 0.25,
            Self::Medium => 0.5,
            Self::High => 0.75,
            Self::Full => 1.0,
        }
    }

    /// Square model input edge used by model-based segmenters
    #[must_use]
    pub fn input_size(self) -> u32 {
        match self {
            Self::Low => 256,
            Self::Medium => 512,
            Self::High => 768,
            Self::Full => 1024,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Full => "full",
        }
    }
}

impl std::fmt::Display for ResolutionHint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ResolutionHint {
    type Err = OverlayError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "full" => Ok(Self::Full),
            other => Err(OverlayError::invalid_config(format!(
                "Unknown resolution '{}' (expected low, medium, high or full)",
                other
            ))),
        }
    }
}

/// Produces a segmentation mask for an image
///
/// Implementations must return a mask with exactly the image's dimensions.
#[async_trait]
pub trait Segmenter: Send + Sync {
    async fn segment(&self, image: &RgbaImage, hint: ResolutionHint) -> Result<SegmentationMask>;

    /// Short name used in logs and errors
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_hint_parsing() {
        assert_eq!("Medium".parse::<ResolutionHint>().unwrap(), ResolutionHint::Medium);
        assert_eq!("full".parse::<ResolutionHint>().unwrap(), ResolutionHint::Full);
        assert!("ultra".parse::<ResolutionHint>().is_err());
        assert_eq!(ResolutionHint::default(), ResolutionHint::Medium);
    }

    #[test]
    fn test_resolution_hint_serde() {
        let json = serde_json::to_string(&ResolutionHint::High).unwrap();
        assert_eq!(json, "\"high\"");
        assert!(ResolutionHint::Low.input_size() < ResolutionHint::Full.input_size());
    }
}
