//! Text overlay CLI tool
//!
//! Composites text overlays onto one image and writes the result.

use super::config::{CliConfigBuilder, ProjectFile};
use crate::{
    editor::{EditorSession, MaskState},
    segmentation::{MaskFileSegmenter, ResolutionHint},
    services::ImageIoService,
    tracing_config::{init_cli_tracing, spans},
    types::ImageRecord,
    EditorConfig, ExportFormat,
};
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use instant::Instant;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn, Instrument};

/// Vertical gap between overlays given with repeated --text flags
const STACKED_TEXT_SPACING: f32 = 1.25;

/// Composite text overlays onto an image
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "textoverlay")]
pub struct Cli {
    /// Base image
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Output file [default: <INPUT stem>_overlay.<ext>]
    #[arg(short, long, value_name = "OUTPUT")]
    pub output: Option<PathBuf>,

    /// Overlay project file (JSON)
    #[arg(long, value_name = "FILE")]
    pub overlays: Option<PathBuf>,

    /// Add a default-styled overlay (repeatable)
    #[arg(long = "text", value_name = "TEXT")]
    pub texts: Vec<String>,

    /// Precomputed segmentation mask; overlays are hidden behind its foreground
    #[arg(long, value_name = "MASK", conflicts_with = "model")]
    pub mask: Option<PathBuf>,

    /// ONNX segmentation model (requires the `tract` feature)
    #[arg(long, value_name = "MODEL")]
    pub model: Option<PathBuf>,

    /// Segmentation resolution
    #[arg(long, value_enum)]
    pub resolution: Option<CliResolution>,

    /// Output format [default: from extension, else png]
    #[arg(short, long, value_enum)]
    pub format: Option<CliExportFormat>,

    /// JPEG quality (1-100)
    #[arg(long)]
    pub jpeg_quality: Option<u8>,

    /// Do not draw the watermark
    #[arg(long)]
    pub no_watermark: bool,

    /// Editor configuration file (JSON)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Extra font directory (repeatable)
    #[arg(long = "font-dir", value_name = "DIR")]
    pub font_dirs: Vec<PathBuf>,

    /// Enable verbose logging (-v: DEBUG, -vv: TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum CliExportFormat {
    Png,
    #[value(alias = "jpg")]
    Jpeg,
}

impl From<CliExportFormat> for ExportFormat {
    fn from(format: CliExportFormat) -> Self {
        match format {
            CliExportFormat::Png => Self::Png,
            CliExportFormat::Jpeg => Self::Jpeg,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum CliResolution {
    Low,
    Medium,
    High,
    Full,
}

impl From<CliResolution> for ResolutionHint {
    fn from(resolution: CliResolution) -> Self {
        match resolution {
            CliResolution::Low => Self::Low,
            CliResolution::Medium => Self::Medium,
            CliResolution::High => Self::High,
            CliResolution::Full => Self::Full,
        }
    }
}

pub async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_cli_tracing(cli.verbose).context("Failed to initialize tracing")?;

    CliConfigBuilder::validate_cli(&cli).context("Invalid CLI arguments")?;
    let config = CliConfigBuilder::from_cli(&cli).context("Failed to build configuration")?;

    let output = run(&cli, config).await?;
    println!("{}", output.display());
    Ok(())
}

/// Composite and write one image, returning the output path
pub async fn run(cli: &Cli, config: EditorConfig) -> Result<PathBuf> {
    let span = spans::session(&cli.input.display().to_string(), cli.texts.len());
    composite_file(cli, config).instrument(span).await
}

async fn composite_file(cli: &Cli, config: EditorConfig) -> Result<PathBuf> {
    let start = Instant::now();
    let bytes = ImageIoService::read_bytes(&cli.input)
        .with_context(|| format!("Failed to read {}", cli.input.display()))?;

    let name = cli
        .input
        .file_name()
        .map_or_else(|| "image".to_string(), |n| n.to_string_lossy().into_owned());
    let mut record = ImageRecord::from_upload("cli", name, cli.input.display().to_string(), &bytes)
        .with_context(|| format!("Failed to decode base image {}", cli.input.display()))?;

    if let Some(path) = &cli.overlays {
        let project = ProjectFile::load(path)?;
        record.text_overlays = project.into_overlays(&record);
    }

    let mut session = EditorSession::new(record, config).context("Invalid editor configuration")?;
    session
        .load_preview_bytes(&bytes)
        .with_context(|| format!("Failed to decode base image {}", cli.input.display()))?;

    add_stacked_texts(&mut session, &cli.texts);
    attach_segmenter(&mut session, cli)?;

    if session.wait_for_segmentation().await {
        match session.mask_state() {
            MaskState::Ready(mask) => info!(
                foreground = mask.statistics().foreground_ratio,
                "Segmentation mask applied"
            ),
            MaskState::Failed(reason) => warn!(%reason, "Segmentation failed, rendering without mask"),
            _ => {},
        }
    }

    let format = session.config().export.format;
    let output = cli
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(&cli.input, format));
    let _export_span = spans::export(&output.display().to_string(), &format.to_string()).entered();

    let encoded = session.export().context("Failed to export composited image")?;
    ImageIoService::save_bytes(&encoded, &output)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    info!(
        overlays = session.overlays().len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "✅ Wrote {}",
        output.display()
    );
    Ok(output)
}

/// Center the first text and stack the rest below it
fn add_stacked_texts(session: &mut EditorSession, texts: &[String]) {
    let (width, height) = session.image().dimensions();
    let center = crate::overlay::default_position(width, height);
    let spacing = crate::overlay::TextStyle::default().font_size * STACKED_TEXT_SPACING;
    for (index, text) in texts.iter().enumerate() {
        let position = crate::types::Position::new(center.x, center.y + index as f32 * spacing);
        session.add_text(text.clone(), Some(position));
    }
}

fn attach_segmenter(session: &mut EditorSession, cli: &Cli) -> Result<()> {
    if let Some(mask) = &cli.mask {
        session.set_segmenter(Arc::new(MaskFileSegmenter::new(mask)));
        return Ok(());
    }

    if cli.model.is_some() {
        #[cfg(feature = "tract")]
        {
            let segmenter = crate::segmentation::TractSegmenter::from_config(&session.config().segmentation)
                .context("Failed to load segmentation model")?;
            session.set_segmenter(Arc::new(segmenter));
        }
        #[cfg(not(feature = "tract"))]
        {
            warn!("--model needs the `tract` feature; rendering without mask");
        }
    }
    Ok(())
}

fn default_output_path(input: &Path, format: ExportFormat) -> PathBuf {
    let stem = input
        .file_stem()
        .map_or_else(|| "image".to_string(), |s| s.to_string_lossy().into_owned());
    input.with_file_name(format!("{}_overlay.{}", stem, format.extension()))
}
