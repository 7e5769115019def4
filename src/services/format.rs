//! Export format encoding service
//!
//! Keeps raster encoding out of the editor session so it can be tested on
//! plain buffers.

use crate::config::ExportFormat;
use crate::error::{OverlayError, Result};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageBuffer, RgbaImage};
use instant::Instant;

/// Service for turning composited frames into encoded bytes
pub struct ExportFormatHandler;

impl ExportFormatHandler {
    /// Convert an RGBA frame to the pixel layout the format stores
    ///
    /// JPEG has no alpha channel, so alpha is dropped.
    #[must_use]
    pub fn convert_format(rgba_image: RgbaImage, format: ExportFormat) -> DynamicImage {
        match format {
            ExportFormat::Png => DynamicImage::ImageRgba8(rgba_image),
            ExportFormat::Jpeg => {
                let (width, height) = rgba_image.dimensions();
                let mut rgb_image = ImageBuffer::new(width, height);

                for (x, y, pixel) in rgba_image.enumerate_pixels() {
                    rgb_image.put_pixel(x, y, image::Rgb([pixel[0], pixel[1], pixel[2]]));
                }

                DynamicImage::ImageRgb8(rgb_image)
            },
        }
    }

    /// Encode a frame
    ///
    /// # Arguments
    /// * `frame` - Composited frame at native resolution
    /// * `format` - Target format
    /// * `jpeg_quality` - JPEG quality (1-100), ignored for PNG
    ///
    /// # Examples
    /// ```rust
    /// use textoverlay::{config::ExportFormat, services::ExportFormatHandler};
    /// use image::RgbaImage;
    ///
    /// let bytes = ExportFormatHandler::encode(&RgbaImage::new(4, 4), ExportFormat::Png, 90)?;
    /// assert_eq!(&bytes[1..4], b"PNG");
    /// # Ok::<(), textoverlay::OverlayError>(())
    /// ```
    pub fn encode(frame: &RgbaImage, format: ExportFormat, jpeg_quality: u8) -> Result<Vec<u8>> {
        let start = Instant::now();
        let converted = Self::convert_format(frame.clone(), format);
        let mut buffer = Vec::new();

        match format {
            ExportFormat::Png => converted
                .write_to(&mut std::io::Cursor::new(&mut buffer), image::ImageFormat::Png)
                .map_err(|e| OverlayError::export(format!("PNG encoding failed: {}", e)))?,
            ExportFormat::Jpeg => {
                let quality = jpeg_quality.clamp(1, 100);
                let encoder = JpegEncoder::new_with_quality(&mut buffer, quality);
                converted
                    .write_with_encoder(encoder)
                    .map_err(|e| OverlayError::export(format!("JPEG encoding failed: {}", e)))?;
            },
        }

        tracing::debug!(
            format = %format,
            bytes = buffer.len(),
            elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Frame encoded"
        );
        Ok(buffer)
    }

    /// Whether the format keeps the alpha channel
    #[must_use]
    pub fn supports_transparency(format: ExportFormat) -> bool {
        matches!(format, ExportFormat::Png)
    }
}
