//! Shared fixtures for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use textoverlay::{
    Compositor, EditorConfig, EditorSession, ImageRecord, ResolutionHint, SegmentationMask,
    Segmenter, WatermarkConfig,
};

pub const BASE_COLOR: Rgba<u8> = Rgba([20, 40, 60, 255]);

/// Flat opaque base image
pub fn base_image(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_pixel(width, height, BASE_COLOR)
}

/// PNG bytes of a gradient image
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut image = RgbaImage::new(width, height);
    for (x, y, pixel) in image.enumerate_pixels_mut() {
        let intensity = ((x + y) % 100) as u8;
        *pixel = Rgba([intensity, 128, 255 - intensity, 255]);
    }
    let mut buffer = Vec::new();
    DynamicImage::ImageRgba8(image)
        .write_to(&mut std::io::Cursor::new(&mut buffer), ImageFormat::Png)
        .unwrap();
    buffer
}

/// Compositor with font-free glyphs and no watermark
pub fn compositor() -> Compositor {
    Compositor::with_block_glyphs(WatermarkConfig {
        enabled: false,
        ..WatermarkConfig::default()
    })
}

/// Directory holding the DejaVu Sans Mono regular and bold faces
pub const FIXTURE_FONTS: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/fonts");

/// Compositor rendering real glyphs from the fixture faces only
pub fn font_compositor() -> Compositor {
    let config = EditorConfig::builder()
        .watermark(false)
        .system_fonts(false)
        .font_dir(FIXTURE_FONTS)
        .build()
        .unwrap();
    Compositor::from_config(&config)
}

pub fn config() -> EditorConfig {
    EditorConfig::builder()
        .watermark(false)
        .system_fonts(false)
        .build()
        .unwrap()
}

/// Session over a flat base image with its preview already loaded
pub fn session(width: u32, height: u32) -> EditorSession {
    let record = ImageRecord::with_dimensions("img_test", width, height);
    let mut session = EditorSession::with_compositor(record, config(), compositor());
    session.set_preview(&DynamicImage::ImageRgba8(base_image(width, height)));
    session
}

/// Mask covering the left half of the image
pub fn left_half_mask(width: u32, height: u32) -> SegmentationMask {
    let data = (0..height)
        .flat_map(|_| (0..width).map(move |x| if x < width / 2 { 255 } else { 0 }))
        .collect();
    SegmentationMask::new(data, (width, height)).unwrap()
}

/// Segmenter returning the left-half mask, optionally after a delay
#[derive(Debug, Default)]
pub struct HalfMaskSegmenter {
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl HalfMaskSegmenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Segmenter for HalfMaskSegmenter {
    async fn segment(&self, image: &RgbaImage, _hint: ResolutionHint) -> textoverlay::Result<SegmentationMask> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(left_half_mask(image.width(), image.height()))
    }

    fn name(&self) -> &str {
        "half-mask"
    }
}

/// Segmenter that always fails
#[derive(Debug, Default)]
pub struct BrokenSegmenter;

#[async_trait]
impl Segmenter for BrokenSegmenter {
    async fn segment(&self, _image: &RgbaImage, _hint: ResolutionHint) -> textoverlay::Result<SegmentationMask> {
        Err(textoverlay::OverlayError::segmentation("model unavailable"))
    }

    fn name(&self) -> &str {
        "broken"
    }
}

pub fn shared<S: Segmenter + 'static>(segmenter: S) -> Arc<S> {
    Arc::new(segmenter)
}
