//! Image I/O operations service

use crate::error::{OverlayError, Result};
use image::DynamicImage;
use std::path::Path;

/// Service for reading base images and writing exports
pub struct ImageIoService;

impl ImageIoService {
    /// Decode image bytes, sniffing the format from content
    pub fn decode(bytes: &[u8]) -> Result<DynamicImage> {
        image::load_from_memory(bytes)
            .map_err(|e| OverlayError::decode(format!("Failed to decode image ({} bytes): {}", bytes.len(), e)))
    }

    /// Load an image from a file path
    ///
    /// Extension-based detection is tried first, then content sniffing.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<DynamicImage> {
        let path_ref = path.as_ref();

        if !path_ref.exists() {
            return Err(OverlayError::file_io_error(
                "read image file",
                path_ref,
                &std::io::Error::new(std::io::ErrorKind::NotFound, "file does not exist"),
            ));
        }

        match image::open(path_ref) {
            Ok(img) => Ok(img),
            Err(e) => {
                log::debug!(
                    "Extension-based loading failed for {}: {}. Attempting content-based detection.",
                    path_ref.display(),
                    e
                );
                let data = Self::read_bytes(path_ref)?;
                Self::decode(&data)
            },
        }
    }

    pub fn read_bytes<P: AsRef<Path>>(path: P) -> Result<Vec<u8>> {
        let path_ref = path.as_ref();
        std::fs::read(path_ref).map_err(|e| OverlayError::file_io_error("read image data", path_ref, &e))
    }

    /// Write encoded bytes, creating the parent directory when missing
    pub fn save_bytes<P: AsRef<Path>>(bytes: &[u8], path: P) -> Result<()> {
        let path_ref = path.as_ref();

        if let Some(parent) = path_ref.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| OverlayError::file_io_error("create output directory", parent, &e))?;
        }

        std::fs::write(path_ref, bytes)
            .map_err(|e| OverlayError::file_io_error("write output file", path_ref, &e))?;
        log::debug!("Wrote {} bytes to {}", bytes.len(), path_ref.display());
        Ok(())
    }
}
