//! Configuration conversion utilities for CLI arguments

use crate::cli::main_impl::Cli;
use crate::overlay::{StyleUpdate, TextOverlay};
use crate::types::{ImageRecord, Position};
use crate::{EditorConfig, ExportFormat};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// Convert CLI arguments to an [`EditorConfig`]
pub(crate) struct CliConfigBuilder;

impl CliConfigBuilder {
    /// Config file (or defaults) with command-line overrides applied
    pub(crate) fn from_cli(cli: &Cli) -> Result<EditorConfig> {
        let mut config = match &cli.config {
            Some(path) => EditorConfig::from_json_file(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => EditorConfig::default(),
        };

        if cli.no_watermark {
            config.watermark.enabled = false;
        }
        if let Some(format) = cli.format {
            config.export.format = format.into();
        } else if let Some(format) = cli.output.as_deref().and_then(format_from_extension) {
            config.export.format = format;
        }
        if let Some(quality) = cli.jpeg_quality {
            config.export.jpeg_quality = quality;
        }
        if let Some(resolution) = cli.resolution {
            config.segmentation.resolution = resolution.into();
        }
        if let Some(model) = &cli.model {
            config.segmentation.model_path = Some(model.clone());
        }
        if cli.mask.is_some() || cli.model.is_some() {
            config.segmentation.enabled = true;
        }
        config.fonts.font_dirs.extend(cli.font_dirs.iter().cloned());

        config.validate().context("Invalid configuration")?;
        Ok(config)
    }

    /// Validate CLI arguments for consistency
    pub(crate) fn validate_cli(cli: &Cli) -> Result<()> {
        if let Some(quality) = cli.jpeg_quality {
            if !(1..=100).contains(&quality) {
                anyhow::bail!("JPEG quality must be between 1 and 100, got {}", quality);
            }
        }
        if !cli.input.exists() {
            anyhow::bail!("Input file does not exist: {}", cli.input.display());
        }
        for dir in &cli.font_dirs {
            if !dir.is_dir() {
                anyhow::bail!("Font directory does not exist: {}", dir.display());
            }
        }
        Ok(())
    }
}

fn format_from_extension(path: &Path) -> Option<ExportFormat> {
    let extension = path.extension()?.to_str()?.to_ascii_lowercase();
    match extension.as_str() {
        "png" => Some(ExportFormat::Png),
        "jpg" | "jpeg" => Some(ExportFormat::Jpeg),
        _ => None,
    }
}

/// Overlay project file
///
/// ```json
/// { "overlays": [
///     { "text": "Hello", "position": { "x": 120, "y": 80 },
///       "style": [ { "group": "fill", "color": "#ffffff" } ] }
/// ] }
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct ProjectFile {
    #[serde(default)]
    pub(crate) overlays: Vec<OverlaySpec>,
}

/// One overlay in a project file; style updates apply over the defaults
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct OverlaySpec {
    pub(crate) text: String,
    #[serde(default)]
    pub(crate) position: Option<Position>,
    #[serde(default)]
    pub(crate) style: Vec<StyleUpdate>,
}

impl ProjectFile {
    pub(crate) fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read overlay file {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse overlay file {}", path.display()))
    }

    /// Materialize overlays for `image`, z-ordered as listed
    pub(crate) fn into_overlays(self, image: &ImageRecord) -> Vec<TextOverlay> {
        self.overlays
            .into_iter()
            .enumerate()
            .map(|(index, spec)| {
                let base = match spec.position {
                    Some(position) => TextOverlay::at(image, spec.text, position),
                    None => TextOverlay::new(image, spec.text),
                };
                spec.style
                    .iter()
                    .fold(base, |overlay, update| overlay.with_style(update))
                    .with_z_index(index as i64)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn cli(args: &[&str]) -> Cli {
        let mut full = vec!["textoverlay", "Cargo.toml"];
        full.extend_from_slice(args);
        Cli::parse_from(full)
    }

    #[test]
    fn test_cli_overrides() {
        let config = CliConfigBuilder::from_cli(&cli(&[
            "--no-watermark",
            "--jpeg-quality",
            "70",
            "--resolution",
            "high",
            "-o",
            "out.JPG",
        ]))
        .unwrap();
        assert!(!config.watermark.enabled);
        assert_eq!(config.export.format, ExportFormat::Jpeg);
        assert_eq!(config.export.jpeg_quality, 70);
        assert_eq!(config.segmentation.resolution, crate::segmentation::ResolutionHint::High);
    }

    #[test]
    fn test_explicit_format_wins_over_extension() {
        let config = CliConfigBuilder::from_cli(&cli(&["-o", "out.jpg", "--format", "png"])).unwrap();
        assert_eq!(config.export.format, ExportFormat::Png);
    }

    #[test]
    fn test_cli_validation() {
        assert!(CliConfigBuilder::validate_cli(&cli(&[])).is_ok());
        assert!(CliConfigBuilder::validate_cli(&cli(&["--jpeg-quality", "0"])).is_err());
        assert!(CliConfigBuilder::validate_cli(&cli(&["--font-dir", "/nonexistent/fonts"])).is_err());

        let missing = Cli::parse_from(["textoverlay", "/nonexistent/input.png"]);
        assert!(CliConfigBuilder::validate_cli(&missing).is_err());
    }

    #[test]
    fn test_project_file_overlays() {
        let json = r##"{ "overlays": [
            { "text": "Centered" },
            { "text": "Placed", "position": { "x": 5, "y": 6 },
              "style": [ { "group": "fill", "color": "#ffffff" }, { "group": "clear_stroke" } ] }
        ] }"##;
        let project: ProjectFile = serde_json::from_str(json).unwrap();
        let image = ImageRecord::with_dimensions("img", 100, 50);
        let overlays = project.into_overlays(&image);

        assert_eq!(overlays.len(), 2);
        assert_eq!(overlays[0].position, Position::new(50.0, 25.0));
        assert_eq!(overlays[1].position, Position::new(5.0, 6.0));
        assert_eq!(overlays[1].style.color, "#ffffff");
        assert_eq!(overlays[1].z_index, 1);
        assert!(overlays.iter().all(|o| o.image_id == "img"));
    }
}
