//! ONNX person segmentation through tract (pure Rust)
//!
//! The model is expected to take a `[1, 3, S, S]` normalized RGB tensor and
//! return a foreground probability map whose last two axes are the mask
//! height and width. One optimized plan is built per input edge `S` on first
//! use. Inference runs on tokio's blocking pool.

use super::{ResolutionHint, Segmenter};
use crate::config::SegmentationConfig;
use crate::error::{OverlayError, Result};
use crate::types::SegmentationMask;
use async_trait::async_trait;
use image::{ImageBuffer, Rgb, RgbaImage};
use instant::Instant;
use ndarray::Array4;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tract_onnx::prelude::*;

/// Type alias for the complex Tract model type to reduce complexity warnings
type TractModel = RunnableModel<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

const SEGMENTER_NAME: &str = "tract";
const PADDING: [u8; 3] = [255, 255, 255];

/// Where the model input sits inside the square letterbox
#[derive(Debug, Clone, Copy)]
struct Letterbox {
    size: u32,
    scale: f32,
    offset_x: u32,
    offset_y: u32,
}

#[derive(Debug, Clone, Copy)]
struct Normalization {
    mean: [f32; 3],
    std: [f32; 3],
    threshold: f32,
}

/// Tract-backed [`Segmenter`]
#[derive(Clone)]
pub struct TractSegmenter {
    model_data: Arc<[u8]>,
    normalization: Normalization,
    plans: Arc<Mutex<HashMap<u32, Arc<TractModel>>>>,
}

impl std::fmt::Debug for TractSegmenter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TractSegmenter")
            .field("model_bytes", &self.model_data.len())
            .field("normalization", &self.normalization)
            .finish_non_exhaustive()
    }
}

impl TractSegmenter {
    /// Segmenter for the model named by `config.model_path`
    pub fn from_config(config: &SegmentationConfig) -> Result<Self> {
        let path = config.model_path.as_ref().ok_or_else(|| {
            OverlayError::invalid_config("segmentation.model_path is required for the tract segmenter")
        })?;
        Self::from_file(path, config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P, config: &SegmentationConfig) -> Result<Self> {
        let path = path.as_ref();
        let bytes =
            std::fs::read(path).map_err(|e| OverlayError::file_io_error("read model", path, &e))?;
        log::info!("📦 Loaded segmentation model {} ({} bytes)", path.display(), bytes.len());
        Ok(Self::from_bytes(bytes, config))
    }

    #[must_use]
    pub fn from_bytes(bytes: Vec<u8>, config: &SegmentationConfig) -> Self {
        Self {
            model_data: Arc::from(bytes),
            normalization: Normalization {
                mean: config.normalization_mean,
                std: config.normalization_std,
                threshold: config.threshold,
            },
            plans: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn plan_for(model_data: &[u8], plans: &Mutex<HashMap<u32, Arc<TractModel>>>, size: u32) -> Result<Arc<TractModel>> {
        if let Some(plan) = plans.lock().ok().and_then(|p| p.get(&size).cloned()) {
            return Ok(plan);
        }

        let start = Instant::now();
        log::info!("🚀 Initializing Tract segmenter");
        log::info!("📐 Input: 1x3x{size}x{size}");

        let edge = size as usize;
        let stage = |stage: &str, e: &dyn std::fmt::Display| {
            OverlayError::segmentation_stage_error(SEGMENTER_NAME, stage, &e.to_string())
        };
        let plan = onnx()
            .model_for_read(&mut std::io::Cursor::new(model_data))
            .map_err(|e| stage("load", &e))?
            .with_input_fact(0, f32::fact([1, 3, edge, edge]).into())
            .map_err(|e| stage("input fact", &e))?
            .into_optimized()
            .map_err(|e| stage("optimize", &e))?
            .into_runnable()
            .map_err(|e| stage("plan", &e))?;
        let plan = Arc::new(plan);

        if let Ok(mut plans) = plans.lock() {
            plans.insert(size, Arc::clone(&plan));
        }
        log::info!("✅ Tract segmenter ready in {}ms", start.elapsed().as_millis());
        Ok(plan)
    }

    /// Letterbox into a white `size`x`size` square and normalize to NCHW
    fn preprocess(image: &RgbaImage, size: u32, norm: &Normalization) -> (Array4<f32>, Letterbox) {
        let (width, height) = image.dimensions();
        let scale = (size as f32 / width as f32).min(size as f32 / height as f32);
        let new_width = ((width as f32 * scale).round() as u32).clamp(1, size);
        let new_height = ((height as f32 * scale).round() as u32).clamp(1, size);

        let rgb = image::DynamicImage::ImageRgba8(image.clone()).to_rgb8();
        let resized = image::imageops::resize(
            &rgb,
            new_width,
            new_height,
            image::imageops::FilterType::Triangle,
        );

        let offset_x = (size - new_width) / 2;
        let offset_y = (size - new_height) / 2;
        let mut canvas: ImageBuffer<Rgb<u8>, Vec<u8>> = ImageBuffer::from_pixel(size, size, Rgb(PADDING));
        image::imageops::replace(&mut canvas, &resized, i64::from(offset_x), i64::from(offset_y));

        let edge = size as usize;
        let mut tensor = Array4::<f32>::zeros((1, 3, edge, edge));
        for (x, y, pixel) in canvas.enumerate_pixels() {
            for channel in 0..3 {
                let value = (f32::from(pixel[channel]) / 255.0 - norm.mean[channel]) / norm.std[channel];
                tensor[[0, channel, y as usize, x as usize]] = value;
            }
        }

        (
            tensor,
            Letterbox {
                size,
                scale,
                offset_x,
                offset_y,
            },
        )
    }

    /// Sample the probability map back at native resolution and threshold it
    fn postprocess(
        probabilities: &[f32],
        map_size: (usize, usize),
        letterbox: Letterbox,
        native: (u32, u32),
        threshold: f32,
    ) -> SegmentationMask {
        let (map_width, map_height) = map_size;
        let to_map_x = map_width as f32 / letterbox.size as f32;
        let to_map_y = map_height as f32 / letterbox.size as f32;
        let mut mask = SegmentationMask::filled(native.0, native.1, 0);

        for y in 0..native.1 {
            let model_y = (y as f32 + 0.5) * letterbox.scale + letterbox.offset_y as f32;
            let map_y = ((model_y * to_map_y) as usize).min(map_height.saturating_sub(1));
            for x in 0..native.0 {
                let model_x = (x as f32 + 0.5) * letterbox.scale + letterbox.offset_x as f32;
                let map_x = ((model_x * to_map_x) as usize).min(map_width.saturating_sub(1));
                let probability = probabilities
                    .get(map_y * map_width + map_x)
                    .copied()
                    .unwrap_or(0.0);
                if probability > threshold {
                    if let Some(alpha) = mask.data.get_mut(y as usize * native.0 as usize + x as usize) {
                        *alpha = 255;
                    }
                }
            }
        }
        mask
    }

    fn run(
        model_data: &[u8],
        plans: &Mutex<HashMap<u32, Arc<TractModel>>>,
        norm: Normalization,
        image: &RgbaImage,
        hint: ResolutionHint,
    ) -> Result<SegmentationMask> {
        let size = hint.input_size();
        let plan = Self::plan_for(model_data, plans, size)?;
        let (tensor, letterbox) = Self::preprocess(image, size, &norm);

        log::debug!("🔮 Running Tract segmentation");
        log::debug!("  - Input tensor: {:?}", tensor.shape());
        let start = Instant::now();

        let outputs = plan.run(tvec![Tensor::from(tensor).into()]).map_err(|e| {
            OverlayError::segmentation_stage_error(SEGMENTER_NAME, "inference", &e.to_string())
        })?;
        let output = outputs.into_iter().next().ok_or_else(|| {
            OverlayError::segmentation_stage_error(SEGMENTER_NAME, "inference", "no output tensor")
        })?;
        let view = output.to_array_view::<f32>().map_err(|e| {
            OverlayError::segmentation_stage_error(SEGMENTER_NAME, "output", &e.to_string())
        })?;

        let shape = view.shape();
        let (map_height, map_width) = match shape {
            [.., h, w] if *h > 0 && *w > 0 => (*h, *w),
            _ => {
                return Err(OverlayError::segmentation_stage_error(
                    SEGMENTER_NAME,
                    "output",
                    &format!("unexpected output shape {:?}", shape),
                ))
            },
        };
        let probabilities: Vec<f32> = view.iter().take(map_width * map_height).copied().collect();

        log::debug!("✅ Tract segmentation completed in {}ms", start.elapsed().as_millis());
        Ok(Self::postprocess(
            &probabilities,
            (map_width, map_height),
            letterbox,
            image.dimensions(),
            norm.threshold,
        ))
    }
}

#[async_trait]
impl Segmenter for TractSegmenter {
    async fn segment(&self, image: &RgbaImage, hint: ResolutionHint) -> Result<SegmentationMask> {
        if image.width() == 0 || image.height() == 0 {
            return Ok(SegmentationMask::filled(image.width(), image.height(), 0));
        }

        let model_data = Arc::clone(&self.model_data);
        let plans = Arc::clone(&self.plans);
        let norm = self.normalization;
        let image = image.clone();
        tokio::task::spawn_blocking(move || Self::run(&model_data, &plans, norm, &image, hint))
            .await
            .map_err(|e| {
                OverlayError::segmentation_stage_error(SEGMENTER_NAME, "worker", &e.to_string())
            })?
    }

    fn name(&self) -> &str {
        SEGMENTER_NAME
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn norm() -> Normalization {
        Normalization {
            mean: [0.5; 3],
            std: [1.0; 3],
            threshold: 0.5,
        }
    }

    #[test]
    fn test_preprocess_letterboxes_wide_image() {
        let image = RgbaImage::from_pixel(200, 100, Rgba([0, 0, 0, 255]));
        let (tensor, letterbox) = TractSegmenter::preprocess(&image, 64, &norm());
        assert_eq!(tensor.shape(), &[1, 3, 64, 64]);
        assert_eq!(letterbox.offset_x, 0);
        assert_eq!(letterbox.offset_y, 16);
        // Padding is white, content is black
        assert!((tensor[[0, 0, 0, 0]] - 0.5).abs() < 1e-6);
        assert!((tensor[[0, 0, 32, 32]] + 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_postprocess_maps_back_through_letterbox() {
        // Right half of the map is foreground
        let size = 8usize;
        let probabilities: Vec<f32> = (0..size * size)
            .map(|i| if i % size >= size / 2 { 0.9 } else { 0.1 })
            .collect();
        let letterbox = Letterbox {
            size: 8,
            scale: 0.5,
            offset_x: 0,
            offset_y: 2,
        };
        let mask = TractSegmenter::postprocess(&probabilities, (size, size), letterbox, (16, 8), 0.5);
        assert!(mask.matches(16, 8));
        assert_eq!(mask.alpha_at(15, 4), 255);
        assert_eq!(mask.alpha_at(0, 4), 0);
    }

    #[tokio::test]
    async fn test_invalid_model_bytes_fail() {
        let segmenter = TractSegmenter::from_bytes(b"not onnx".to_vec(), &SegmentationConfig::default());
        let result = segmenter
            .segment(&RgbaImage::new(4, 4), ResolutionHint::Low)
            .await;
        assert!(matches!(result, Err(OverlayError::Segmentation(_))));
    }

    #[test]
    fn test_from_config_requires_model_path() {
        let result = TractSegmenter::from_config(&SegmentationConfig::default());
        assert!(matches!(result, Err(OverlayError::InvalidConfig(_))));
    }
}
