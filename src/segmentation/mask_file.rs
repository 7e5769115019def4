//! Segmenter backed by a precomputed mask image on disk

use super::{ResolutionHint, Segmenter};
use crate::error::{OverlayError, Result};
use crate::types::SegmentationMask;
use async_trait::async_trait;
use image::RgbaImage;
use std::path::{Path, PathBuf};

/// Reads a mask from an image file (alpha channel, or luma when opaque)
#[derive(Debug, Clone)]
pub struct MaskFileSegmenter {
    path: PathBuf,
}

impl MaskFileSegmenter {
    #[must_use]
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Segmenter for MaskFileSegmenter {
    async fn segment(&self, image: &RgbaImage, _hint: ResolutionHint) -> Result<SegmentationMask> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|e| OverlayError::file_io_error("read mask", &self.path, &e))?;
        let decoded = image::load_from_memory(&bytes).map_err(|e| {
            OverlayError::segmentation_stage_error("mask-file", "decode", &e.to_string())
        })?;
        let mask = SegmentationMask::from_dynamic(&decoded);

        if !mask.matches_image(image) {
            return Err(OverlayError::segmentation_stage_error(
                "mask-file",
                "validate",
                &format!(
                    "mask is {}x{} but image is {}x{}",
                    mask.dimensions.0,
                    mask.dimensions.1,
                    image.width(),
                    image.height()
                ),
            ));
        }
        log::debug!("Loaded mask from {}", self.path.display());
        Ok(mask)
    }

    fn name(&self) -> &str {
        "mask-file"
    }
}
