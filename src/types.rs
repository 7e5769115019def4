//! Core types shared by the editor, compositor and segmentation adapter

use crate::error::{OverlayError, Result};
use crate::overlay::TextOverlay;
use chrono::{DateTime, Utc};
use image::{GenericImageView, GrayImage, ImageBuffer, Luma, RgbaImage};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A point in image-native pixel space
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    #[must_use]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Pixel encoding of an uploaded image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    Jpeg,
    Png,
    Webp,
    Gif,
}

impl PixelFormat {
    /// Map an `image` crate format onto the supported upload formats
    #[must_use]
    pub fn from_image_format(format: image::ImageFormat) -> Option<Self> {
        match format {
            image::ImageFormat::Jpeg => Some(Self::Jpeg),
            image::ImageFormat::Png => Some(Self::Png),
            image::ImageFormat::WebP => Some(Self::Webp),
            image::ImageFormat::Gif => Some(Self::Gif),
            _ => None,
        }
    }
}

impl std::fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Jpeg => write!(f, "jpeg"),
            Self::Png => write!(f, "png"),
            Self::Webp => write!(f, "webp"),
            Self::Gif => write!(f, "gif"),
        }
    }
}

/// One uploaded raster asset and its overlays
///
/// Matches the record shape exchanged with the image listing and upload
/// endpoints, hence the camelCase field names on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRecord {
    pub id: String,
    pub user_id: String,
    pub name: String,
    /// Handle the pixel source is fetched from (URL, path, blob key)
    pub original_url: String,
    pub thumbnail_url: String,
    pub file_size: u64,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    #[serde(default)]
    pub text_overlays: Vec<TextOverlay>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ImageRecord {
    /// Build a record for freshly uploaded bytes
    ///
    /// Decodes only the header to obtain native dimensions and sniffs the
    /// pixel format from the content.
    pub fn from_upload(
        user_id: impl Into<String>,
        name: impl Into<String>,
        source_handle: impl Into<String>,
        bytes: &[u8],
    ) -> Result<Self> {
        let format = image::guess_format(bytes)
            .map_err(|e| OverlayError::decode(format!("Unrecognized image data: {}", e)))?;
        let pixel_format = PixelFormat::from_image_format(format).ok_or_else(|| {
            OverlayError::decode(format!("Unsupported upload format: {:?}", format))
        })?;
        let (width, height) = image::ImageReader::with_format(std::io::Cursor::new(bytes), format)
            .into_dimensions()
            .map_err(|e| OverlayError::decode(format!("Failed to read image header: {}", e)))?;

        let source_handle = source_handle.into();
        let now = Utc::now();
        Ok(Self {
            id: format!("img_{}", uuid::Uuid::new_v4().simple()),
            user_id: user_id.into(),
            name: name.into(),
            thumbnail_url: source_handle.clone(),
            original_url: source_handle,
            file_size: bytes.len() as u64,
            width,
            height,
            format: pixel_format,
            text_overlays: Vec::new(),
            created_at: now,
            updated_at: now,
        })
    }

    /// Bare record for an image whose pixels are already in hand
    #[must_use]
    pub fn with_dimensions(id: impl Into<String>, width: u32, height: u32) -> Self {
        let now = Utc::now();
        let id = id.into();
        Self {
            user_id: String::new(),
            name: id.clone(),
            original_url: String::new(),
            thumbnail_url: String::new(),
            id,
            file_size: 0,
            width,
            height,
            format: PixelFormat::Png,
            text_overlays: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Native dimensions as (width, height)
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Binary segmentation mask
///
/// One alpha byte per pixel, row-major. Zero marks background, anything
/// above zero marks the foreground subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentationMask {
    /// Mask alpha values (0-255)
    pub data: Vec<u8>,

    /// Mask dimensions (width, height)
    pub dimensions: (u32, u32),
}

impl SegmentationMask {
    /// Create a new segmentation mask
    ///
    /// # Errors
    /// - `data` length does not equal `width * height`
    pub fn new(data: Vec<u8>, dimensions: (u32, u32)) -> Result<Self> {
        let expected = dimensions.0 as usize * dimensions.1 as usize;
        if data.len() != expected {
            return Err(OverlayError::segmentation(format!(
                "Mask data has {} values, expected {} for {}x{}",
                data.len(),
                expected,
                dimensions.0,
                dimensions.1
            )));
        }
        Ok(Self { data, dimensions })
    }

    /// Mask with every pixel set to the same alpha
    #[must_use]
    pub fn filled(width: u32, height: u32, alpha: u8) -> Self {
        Self {
            data: vec![alpha; width as usize * height as usize],
            dimensions: (width, height),
        }
    }

    /// Create mask from a grayscale image (luma is taken as alpha)
    #[must_use]
    pub fn from_luma(image: &GrayImage) -> Self {
        Self {
            data: image.as_raw().clone(),
            dimensions: image.dimensions(),
        }
    }

    /// Create mask from the alpha channel of an RGBA image
    #[must_use]
    pub fn from_rgba_alpha(image: &RgbaImage) -> Self {
        Self {
            data: image.pixels().map(|p| p[3]).collect(),
            dimensions: image.dimensions(),
        }
    }

    /// Create mask from any decoded image
    ///
    /// Images with an alpha channel contribute their alpha; opaque images
    /// contribute luma.
    #[must_use]
    pub fn from_dynamic(image: &image::DynamicImage) -> Self {
        if image.color().has_alpha() {
            Self::from_rgba_alpha(&image.to_rgba8())
        } else {
            Self::from_luma(&image.to_luma8())
        }
    }

    /// Load a mask from an image file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let image = image::open(path.as_ref())?;
        Ok(Self::from_dynamic(&image))
    }

    /// Convert mask to a grayscale image
    pub fn to_image(&self) -> Result<ImageBuffer<Luma<u8>, Vec<u8>>> {
        let (width, height) = self.dimensions;
        ImageBuffer::from_raw(width, height, self.data.clone())
            .ok_or_else(|| OverlayError::internal("Failed to create image from mask data"))
    }

    /// Save mask as PNG
    pub fn save_png<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.to_image()?
            .save_with_format(path, image::ImageFormat::Png)?;
        Ok(())
    }

    /// Alpha at a pixel, zero outside the mask
    #[must_use]
    pub fn alpha_at(&self, x: u32, y: u32) -> u8 {
        if x >= self.dimensions.0 || y >= self.dimensions.1 {
            return 0;
        }
        let index = y as usize * self.dimensions.0 as usize + x as usize;
        self.data.get(index).copied().unwrap_or(0)
    }

    /// Whether the mask covers exactly the given native dimensions
    #[must_use]
    pub fn matches(&self, width: u32, height: u32) -> bool {
        self.dimensions == (width, height)
    }

    /// Whether the mask matches a decoded image's dimensions
    #[must_use]
    pub fn matches_image<I: GenericImageView>(&self, image: &I) -> bool {
        self.dimensions == image.dimensions()
    }

    /// True when no pixel is marked foreground
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.iter().all(|&alpha| alpha == 0)
    }

    /// Get mask statistics
    #[must_use]
    pub fn statistics(&self) -> MaskStatistics {
        let total_pixels = self.data.len();
        let foreground_pixels = self.data.iter().filter(|&&alpha| alpha > 0).count();
        let background_pixels = total_pixels - foreground_pixels;
        let ratio = |count: usize| {
            if total_pixels == 0 {
                0.0
            } else {
                count as f32 / total_pixels as f32
            }
        };

        MaskStatistics {
            total_pixels,
            foreground_pixels,
            background_pixels,
            foreground_ratio: ratio(foreground_pixels),
            background_ratio: ratio(background_pixels),
        }
    }
}

/// Statistics about a segmentation mask
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaskStatistics {
    pub total_pixels: usize,
    pub foreground_pixels: usize,
    pub background_pixels: usize,
    pub foreground_ratio: f32,
    pub background_ratio: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let image = image::DynamicImage::ImageRgba8(RgbaImage::new(width, height));
        let mut buffer = Vec::new();
        image
            .write_to(&mut std::io::Cursor::new(&mut buffer), image::ImageFormat::Png)
            .unwrap();
        buffer
    }

    #[test]
    fn test_record_from_upload() {
        let bytes = png_bytes(64, 32);
        let record = ImageRecord::from_upload("user_1", "photo.png", "blob://1", &bytes).unwrap();
        assert_eq!(record.dimensions(), (64, 32));
        assert_eq!(record.format, PixelFormat::Png);
        assert_eq!(record.file_size, bytes.len() as u64);
        assert!(record.text_overlays.is_empty());
        assert!(record.id.starts_with("img_"));
    }

    #[test]
    fn test_record_from_garbage_upload() {
        let result = ImageRecord::from_upload("u", "x", "blob://x", b"definitely not an image");
        assert!(matches!(result, Err(OverlayError::Decode(_))));
    }

    #[test]
    fn test_record_serializes_camel_case() {
        let record = ImageRecord::from_upload("u", "n", "blob://n", &png_bytes(2, 2)).unwrap();
        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("originalUrl").is_some());
        assert!(json.get("textOverlays").is_some());
        assert_eq!(json["format"], "png");
    }

    #[test]
    fn test_mask_length_validation() {
        assert!(SegmentationMask::new(vec![0; 6], (3, 2)).is_ok());
        assert!(SegmentationMask::new(vec![0; 5], (3, 2)).is_err());
    }

    #[test]
    fn test_mask_from_rgba_alpha() {
        let mut image = RgbaImage::new(2, 1);
        image.put_pixel(1, 0, image::Rgba([0, 0, 0, 200]));
        let mask = SegmentationMask::from_rgba_alpha(&image);
        assert_eq!(mask.alpha_at(0, 0), 0);
        assert_eq!(mask.alpha_at(1, 0), 200);
        assert_eq!(mask.alpha_at(5, 5), 0);
    }

    #[test]
    fn test_mask_statistics() {
        let mask = SegmentationMask::new(vec![0, 0, 255, 1], (2, 2)).unwrap();
        let stats = mask.statistics();
        assert_eq!(stats.foreground_pixels, 2);
        assert_eq!(stats.background_pixels, 2);
        assert!((stats.foreground_ratio - 0.5).abs() < f32::EPSILON);
        assert!(!mask.is_empty());
        assert!(SegmentationMask::filled(4, 4, 0).is_empty());
    }
}
