//! Configuration types for editing, compositing and segmentation

use crate::error::{OverlayError, Result};
use crate::segmentation::ResolutionHint;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Encoded output format for exported frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// PNG, lossless with alpha
    Png,
    /// JPEG, alpha flattened
    Jpeg,
}

impl Default for ExportFormat {
    fn default() -> Self {
        Self::Png
    }
}

impl ExportFormat {
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
        }
    }

    #[must_use]
    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
        }
    }
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Png => write!(f, "png"),
            Self::Jpeg => write!(f, "jpeg"),
        }
    }
}

/// Brand watermark drawn between the base image and the overlays
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatermarkConfig {
    pub enabled: bool,
    pub text: String,
    /// 0.0-1.0
    pub opacity: f32,
    pub color: String,
    /// Rotation about the canvas center, degrees
    pub angle_degrees: f32,
    /// Font size is `min(width, height) / size_divisor`
    pub size_divisor: f32,
}

impl Default for WatermarkConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            text: "TextOverlayed".to_string(),
            opacity: 0.14,
            color: "#ffffff".to_string(),
            angle_degrees: -30.0,
            size_divisor: 4.0,
        }
    }
}

/// Maximum preview size on screen
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayLimits {
    pub max_width: u32,
    pub max_height: u32,
}

impl Default for DisplayLimits {
    fn default() -> Self {
        Self {
            max_width: 700,
            max_height: 500,
        }
    }
}

/// Segmentation adapter settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    /// Request a mask whenever a preview becomes ready
    pub enabled: bool,
    pub resolution: ResolutionHint,
    /// Probability above which a pixel counts as foreground
    pub threshold: f32,
    /// Number of masks kept per fingerprint (0 disables caching)
    pub cache_capacity: usize,
    /// ONNX model used by the tract segmenter
    pub model_path: Option<PathBuf>,
    /// Per-channel normalization applied before inference
    pub normalization_mean: [f32; 3],
    pub normalization_std: [f32; 3],
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            resolution: ResolutionHint::Medium,
            threshold: 0.5,
            cache_capacity: 8,
            model_path: None,
            normalization_mean: [0.5, 0.5, 0.5],
            normalization_std: [1.0, 1.0, 1.0],
        }
    }
}

/// Font discovery settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FontConfig {
    /// Individual font files, loaded first
    pub font_files: Vec<PathBuf>,
    /// Directories scanned recursively for `.ttf` and `.otf` files
    pub font_dirs: Vec<PathBuf>,
    /// Also scan the platform font directory
    pub system_fonts: bool,
}

impl Default for FontConfig {
    fn default() -> Self {
        Self {
            font_files: Vec::new(),
            font_dirs: Vec::new(),
            system_fonts: true,
        }
    }
}

/// Export encoding settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub format: ExportFormat,
    /// JPEG quality (1-100, only used for JPEG output)
    pub jpeg_quality: u8,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            format: ExportFormat::Png,
            jpeg_quality: 90,
        }
    }
}

/// Edit history settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Oldest actions are dropped beyond this count (0 = unbounded)
    pub max_actions: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { max_actions: 0 }
    }
}

/// Complete editor configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    pub watermark: WatermarkConfig,
    pub display: DisplayLimits,
    pub segmentation: SegmentationConfig,
    pub fonts: FontConfig,
    pub export: ExportConfig,
    pub history: HistoryConfig,
}

impl EditorConfig {
    /// Create a new configuration builder
    ///
    /// # Examples
    /// ```rust
    /// use textoverlay::{EditorConfig, ExportFormat};
    ///
    /// let config = EditorConfig::builder()
    ///     .watermark(false)
    ///     .export_format(ExportFormat::Jpeg)
    ///     .jpeg_quality(85)
    ///     .build()
    ///     .unwrap();
    /// assert!(!config.watermark.enabled);
    /// ```
    #[must_use]
    pub fn builder() -> EditorConfigBuilder {
        EditorConfigBuilder::default()
    }

    /// Load and validate a JSON configuration file
    ///
    /// Missing sections and fields take their defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| OverlayError::file_io_error("read config file", path, &e))?;
        Self::from_json_str(&contents)
    }

    /// Parse and validate a JSON configuration document
    pub fn from_json_str(contents: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate all configuration parameters
    ///
    /// # Errors
    /// - Watermark opacity outside 0.0-1.0 or non-positive size divisor
    /// - Display limits of zero
    /// - Segmentation threshold outside 0.0-1.0 or zero normalization std
    /// - JPEG quality outside 1-100
    pub fn validate(&self) -> Result<()> {
        let watermark = &self.watermark;
        if !(0.0..=1.0).contains(&watermark.opacity) {
            return Err(OverlayError::config_value_error(
                "watermark opacity",
                watermark.opacity,
                "0.0-1.0",
                Some(0.14),
            ));
        }
        if !(watermark.size_divisor.is_finite() && watermark.size_divisor > 0.0) {
            return Err(OverlayError::config_value_error(
                "watermark size divisor",
                watermark.size_divisor,
                "> 0.0",
                Some(4.0),
            ));
        }
        if !watermark.angle_degrees.is_finite() {
            return Err(OverlayError::invalid_config("Watermark angle must be finite"));
        }

        if self.display.max_width == 0 || self.display.max_height == 0 {
            return Err(OverlayError::invalid_config(format!(
                "Display limits must be positive, got {}x{}",
                self.display.max_width, self.display.max_height
            )));
        }

        let segmentation = &self.segmentation;
        if !(0.0..=1.0).contains(&segmentation.threshold) {
            return Err(OverlayError::config_value_error(
                "segmentation threshold",
                segmentation.threshold,
                "0.0-1.0",
                Some(0.5),
            ));
        }
        if segmentation.normalization_std.iter().any(|&s| s == 0.0 || !s.is_finite()) {
            return Err(OverlayError::invalid_config(
                "Normalization std values must be finite and non-zero",
            ));
        }

        if !(1..=100).contains(&self.export.jpeg_quality) {
            return Err(OverlayError::config_value_error(
                "JPEG quality",
                self.export.jpeg_quality,
                "1-100",
                Some(90),
            ));
        }

        Ok(())
    }
}

/// Builder for `EditorConfig`
#[derive(Debug, Default)]
pub struct EditorConfigBuilder {
    config: EditorConfig,
}

impl EditorConfigBuilder {
    /// Enable or disable the watermark
    #[must_use]
    pub fn watermark(mut self, enabled: bool) -> Self {
        self.config.watermark.enabled = enabled;
        self
    }

    #[must_use]
    pub fn watermark_text(mut self, text: impl Into<String>) -> Self {
        self.config.watermark.text = text.into();
        self
    }

    #[must_use]
    pub fn watermark_opacity(mut self, opacity: f32) -> Self {
        self.config.watermark.opacity = opacity;
        self
    }

    #[must_use]
    pub fn display_limits(mut self, max_width: u32, max_height: u32) -> Self {
        self.config.display = DisplayLimits {
            max_width,
            max_height,
        };
        self
    }

    /// Enable or disable automatic segmentation requests
    #[must_use]
    pub fn segmentation(mut self, enabled: bool) -> Self {
        self.config.segmentation.enabled = enabled;
        self
    }

    #[must_use]
    pub fn resolution(mut self, hint: ResolutionHint) -> Self {
        self.config.segmentation.resolution = hint;
        self
    }

    #[must_use]
    pub fn mask_threshold(mut self, threshold: f32) -> Self {
        self.config.segmentation.threshold = threshold;
        self
    }

    #[must_use]
    pub fn mask_cache_capacity(mut self, capacity: usize) -> Self {
        self.config.segmentation.cache_capacity = capacity;
        self
    }

    #[must_use]
    pub fn model_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.config.segmentation.model_path = Some(path.into());
        self
    }

    /// Add a directory to scan for fonts
    #[must_use]
    pub fn font_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.config.fonts.font_dirs.push(dir.into());
        self
    }

    #[must_use]
    pub fn font_file<P: Into<PathBuf>>(mut self, file: P) -> Self {
        self.config.fonts.font_files.push(file.into());
        self
    }

    #[must_use]
    pub fn system_fonts(mut self, enabled: bool) -> Self {
        self.config.fonts.system_fonts = enabled;
        self
    }

    #[must_use]
    pub fn export_format(mut self, format: ExportFormat) -> Self {
        self.config.export.format = format;
        self
    }

    #[must_use]
    pub fn jpeg_quality(mut self, quality: u8) -> Self {
        self.config.export.jpeg_quality = quality.min(100);
        self
    }

    #[must_use]
    pub fn max_history(mut self, max_actions: usize) -> Self {
        self.config.history.max_actions = max_actions;
        self
    }

    /// Build and validate the configuration
    ///
    /// # Errors
    /// Any rule checked by [`EditorConfig::validate`]
    pub fn build(self) -> Result<EditorConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
