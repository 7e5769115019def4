//! Mock segmenters for exercising the adapter without a model
//!
//! The default mock marks a centered ellipse as foreground, sized to the
//! input image, so masking behavior can be checked on any frame.

use super::{ResolutionHint, Segmenter};
use crate::error::{OverlayError, Result};
use crate::types::SegmentationMask;
use async_trait::async_trait;
use image::RgbaImage;
use instant::Duration;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Mock segmenter with call recording
#[derive(Debug, Clone, Default)]
pub struct MockSegmenter {
    /// Returned verbatim instead of the generated ellipse
    fixed_mask: Option<SegmentationMask>,
    /// Simulated inference latency
    delay: Option<Duration>,
    calls: Arc<AtomicUsize>,
    hints: Arc<Mutex<Vec<ResolutionHint>>>,
}

impl MockSegmenter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mock that always returns `mask`, whatever the image size
    #[must_use]
    pub fn with_fixed_mask(mask: SegmentationMask) -> Self {
        Self {
            fixed_mask: Some(mask),
            ..Self::default()
        }
    }

    /// Mock that sleeps before answering
    #[must_use]
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    /// Number of times `segment` was entered
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn hints_seen(&self) -> Vec<ResolutionHint> {
        self.hints.lock().map(|h| h.clone()).unwrap_or_default()
    }

    fn ellipse_mask(width: u32, height: u32) -> SegmentationMask {
        let mut mask = SegmentationMask::filled(width, height, 0);
        let (cx, cy) = (width as f32 / 2.0, height as f32 / 2.0);
        let (rx, ry) = ((width as f32 / 4.0).max(1.0), (height as f32 / 4.0).max(1.0));
        for y in 0..height {
            for x in 0..width {
                let dx = (x as f32 + 0.5 - cx) / rx;
                let dy = (y as f32 + 0.5 - cy) / ry;
                if dx * dx + dy * dy <= 1.0 {
                    mask.data[y as usize * width as usize + x as usize] = 255;
                }
            }
        }
        mask
    }
}

#[async_trait]
impl Segmenter for MockSegmenter {
    async fn segment(&self, image: &RgbaImage, hint: ResolutionHint) -> Result<SegmentationMask> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut hints) = self.hints.lock() {
            hints.push(hint);
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self
            .fixed_mask
            .clone()
            .unwrap_or_else(|| Self::ellipse_mask(image.width(), image.height())))
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Segmenter that always reports an inference failure
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingSegmenter;

#[async_trait]
impl Segmenter for FailingSegmenter {
    async fn segment(&self, _image: &RgbaImage, _hint: ResolutionHint) -> Result<SegmentationMask> {
        Err(OverlayError::segmentation_stage_error(
            "failing",
            "inference",
            "mock inference failed",
        ))
    }

    fn name(&self) -> &str {
        "failing"
    }
}

/// Segmenter whose task panics
#[derive(Debug, Clone, Copy, Default)]
pub struct PanickingSegmenter;

#[async_trait]
impl Segmenter for PanickingSegmenter {
    async fn segment(&self, _image: &RgbaImage, _hint: ResolutionHint) -> Result<SegmentationMask> {
        panic!("mock segmenter panicked");
    }

    fn name(&self) -> &str {
        "panicking"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_mask_matches_image() {
        let segmenter = MockSegmenter::new();
        let image = RgbaImage::new(40, 20);
        let mask = segmenter.segment(&image, ResolutionHint::Low).await.unwrap();
        assert!(mask.matches_image(&image));
        assert_eq!(mask.alpha_at(20, 10), 255);
        assert_eq!(mask.alpha_at(0, 0), 0);
        assert_eq!(segmenter.call_count(), 1);
        assert_eq!(segmenter.hints_seen(), vec![ResolutionHint::Low]);
    }

    #[tokio::test]
    async fn test_failing_segmenter() {
        let result = FailingSegmenter.segment(&RgbaImage::new(2, 2), ResolutionHint::Medium).await;
        assert!(matches!(result, Err(OverlayError::Segmentation(_))));
    }
}
