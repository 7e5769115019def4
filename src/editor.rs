//! Editor session: the single owner of all editing state
//!
//! Every mutation goes through `&mut self` methods here (or
//! [`EditorSession::apply`] for serialized commands). Each mutation records
//! one history action and bumps the revision that invalidates the cached
//! frame. Segmentation results arrive out of band and are applied by
//! [`EditorSession::poll_segmentation`].

use crate::compositor::Compositor;
use crate::config::EditorConfig;
use crate::error::{OverlayError, Result};
use crate::history::{EditHistory, EditorAction};
use crate::interaction::{fit_display, CanvasRect, DoubleClick, InteractionController};
use crate::overlay::{OverlayCollection, OverlayId, StyleUpdate, TextOverlay, DEFAULT_OVERLAY_TEXT};
use crate::segmentation::{
    SegmentationAdapter, SegmentationOutcome, SegmentationResult, SegmentationTicket, Segmenter,
};
use crate::services::{ExportFormatHandler, ImageIoService};
use crate::types::{ImageRecord, Position, SegmentationMask};
use image::{DynamicImage, RgbaImage};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Decoded base image availability
#[derive(Debug, Clone, PartialEq)]
pub enum PreviewState {
    /// Source not decoded yet
    Loading,
    Ready(Arc<RgbaImage>),
    /// Source could not be decoded; rendering is unavailable
    Failed(String),
}

/// Segmentation mask availability
#[derive(Debug, Clone, PartialEq)]
pub enum MaskState {
    /// No segmenter attached or masking switched off
    Disabled,
    /// Waiting for a preview to segment
    Idle,
    Pending { generation: u64 },
    Ready(SegmentationMask),
    /// Segmentation failed; overlays render unmasked
    Failed(String),
}

impl MaskState {
    #[must_use]
    pub fn mask(&self) -> Option<&SegmentationMask> {
        match self {
            Self::Ready(mask) => Some(mask),
            _ => None,
        }
    }
}

/// Serializable editing command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum EditorCommand {
    AddText {
        text: String,
        #[serde(default)]
        position: Option<Position>,
    },
    DeleteText { id: OverlayId },
    EditText { id: OverlayId, text: String },
    MoveText { id: OverlayId, position: Position },
    StyleText { id: OverlayId, update: StyleUpdate },
    ResetStyle { id: OverlayId },
    Select { id: Option<OverlayId> },
    Undo,
    Redo,
    ClearHistory,
}

/// Editing session over one image
#[derive(Debug)]
pub struct EditorSession {
    config: EditorConfig,
    image: ImageRecord,
    overlays: OverlayCollection,
    interaction: InteractionController,
    history: EditHistory,
    compositor: Compositor,
    segmentation: Option<SegmentationAdapter>,
    preview: PreviewState,
    mask: MaskState,
    revision: u64,
    dirty: bool,
    frame: Option<(u64, RgbaImage)>,
}

impl EditorSession {
    /// Start a session for `image`, keeping any overlays it already carries
    ///
    /// Fonts are discovered according to `config.fonts`.
    pub fn new(image: ImageRecord, config: EditorConfig) -> Result<Self> {
        config.validate()?;
        let compositor = Compositor::from_config(&config);
        Ok(Self::with_compositor(image, config, compositor))
    }

    /// Start a session with an explicit compositor
    #[must_use]
    pub fn with_compositor(mut image: ImageRecord, config: EditorConfig, compositor: Compositor) -> Self {
        let overlays = OverlayCollection::from(std::mem::take(&mut image.text_overlays));
        let history = EditHistory::with_config(config.history.clone());
        tracing::debug!(image_id = %image.id, overlays = overlays.len(), "Editor session created");
        Self {
            config,
            image,
            overlays,
            interaction: InteractionController::new(),
            history,
            compositor,
            segmentation: None,
            preview: PreviewState::Loading,
            mask: MaskState::Disabled,
            revision: 0,
            dirty: false,
            frame: None,
        }
    }

    /// Attach a segmenter; masks are requested whenever a preview loads
    pub fn set_segmenter(&mut self, segmenter: Arc<dyn Segmenter>) {
        let adapter = SegmentationAdapter::new(segmenter, self.config.segmentation.cache_capacity);
        self.segmentation = Some(adapter);
        self.mask = if self.config.segmentation.enabled {
            MaskState::Idle
        } else {
            MaskState::Disabled
        };
        if matches!(self.preview, PreviewState::Ready(_)) {
            self.request_segmentation();
        }
    }

    #[must_use]
    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    #[must_use]
    pub fn image(&self) -> &ImageRecord {
        &self.image
    }

    #[must_use]
    pub fn overlays(&self) -> &OverlayCollection {
        &self.overlays
    }

    #[must_use]
    pub fn overlay(&self, id: &OverlayId) -> Option<&TextOverlay> {
        self.overlays.get(id)
    }

    #[must_use]
    pub fn history(&self) -> &EditHistory {
        &self.history
    }

    #[must_use]
    pub fn interaction(&self) -> &InteractionController {
        &self.interaction
    }

    #[must_use]
    pub fn compositor(&self) -> &Compositor {
        &self.compositor
    }

    #[must_use]
    pub fn selected(&self) -> Option<&OverlayId> {
        self.interaction.selected()
    }

    #[must_use]
    pub fn preview_state(&self) -> &PreviewState {
        &self.preview
    }

    #[must_use]
    pub fn mask_state(&self) -> &MaskState {
        &self.mask
    }

    /// Counter bumped by every change that affects the rendered frame
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Whether overlays changed since the last [`mark_saved`](Self::mark_saved)
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_saved(&mut self) {
        self.dirty = false;
    }

    /// Key identifying the current preview for segmentation relevance
    #[must_use]
    pub fn preview_key(&self) -> String {
        format!("{}@{}x{}", self.image.id, self.image.width, self.image.height)
    }

    /// Preview size fitting the configured display limits
    #[must_use]
    pub fn display_size(&self) -> (u32, u32) {
        fit_display(self.image.dimensions(), self.config.display)
    }

    // Preview

    /// Decode source bytes into the preview
    ///
    /// On failure the preview enters [`PreviewState::Failed`] and the decode
    /// error is returned.
    pub fn load_preview_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        match ImageIoService::decode(bytes) {
            Ok(image) => {
                self.set_preview(&image);
                Ok(())
            },
            Err(e) => {
                self.fail_preview(e.to_string());
                Err(e)
            },
        }
    }

    /// Use an already-decoded image as the preview
    ///
    /// The record's native dimensions follow the decoded image.
    pub fn set_preview(&mut self, image: &DynamicImage) {
        let rgba = image.to_rgba8();
        let dimensions = rgba.dimensions();
        if dimensions != self.image.dimensions() {
            tracing::debug!(
                record_width = self.image.width,
                record_height = self.image.height,
                width = dimensions.0,
                height = dimensions.1,
                "Decoded dimensions differ from record, using decoded"
            );
            self.image.width = dimensions.0;
            self.image.height = dimensions.1;
        }
        self.preview = PreviewState::Ready(Arc::new(rgba));
        if let Some(adapter) = self.segmentation.as_mut() {
            adapter.cancel();
        }
        if !matches!(self.mask, MaskState::Disabled) {
            self.mask = MaskState::Idle;
        }
        self.bump_revision();
        self.request_segmentation();
    }

    /// Mark the preview as undecodable
    pub fn fail_preview(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        tracing::warn!(image_id = %self.image.id, %reason, "Preview failed to load");
        if let Some(adapter) = self.segmentation.as_mut() {
            adapter.cancel();
        }
        self.preview = PreviewState::Failed(reason);
        self.bump_revision();
    }

    // Segmentation

    /// Request a mask for the current preview
    ///
    /// Returns `None` when no segmenter is attached, masking is disabled or
    /// the preview is not ready.
    pub fn request_segmentation(&mut self) -> Option<SegmentationTicket> {
        if !self.config.segmentation.enabled {
            return None;
        }
        let PreviewState::Ready(preview) = &self.preview else {
            return None;
        };
        let preview = Arc::clone(preview);
        let key = self.preview_key();
        let hint = self.config.segmentation.resolution;
        let adapter = self.segmentation.as_mut()?;
        let ticket = adapter.request(key, preview, hint);
        self.mask = MaskState::Pending {
            generation: ticket.generation,
        };
        Some(ticket)
    }

    /// Apply every relevant segmentation result that has arrived
    ///
    /// Returns whether the mask state changed.
    pub fn poll_segmentation(&mut self) -> bool {
        let mut changed = false;
        while let Some(result) = self.segmentation.as_mut().and_then(SegmentationAdapter::try_next) {
            self.apply_segmentation(result);
            changed = true;
        }
        changed
    }

    /// Wait for the pending segmentation and apply it
    ///
    /// Returns immediately with `false` when nothing is pending.
    pub async fn wait_for_segmentation(&mut self) -> bool {
        if self.poll_segmentation() {
            return true;
        }
        if !matches!(self.mask, MaskState::Pending { .. }) {
            return false;
        }
        let Some(adapter) = self.segmentation.as_mut() else {
            return false;
        };
        let next = adapter.next().await;
        match next {
            Some(result) => {
                self.apply_segmentation(result);
                true
            },
            None => false,
        }
    }

    fn apply_segmentation(&mut self, result: SegmentationResult) {
        self.mask = match result.outcome {
            SegmentationOutcome::Ready(mask) => {
                tracing::debug!(
                    generation = result.generation,
                    cached = result.cached,
                    foreground = mask.statistics().foreground_ratio,
                    "Mask applied"
                );
                MaskState::Ready(mask)
            },
            SegmentationOutcome::Failed(reason) => MaskState::Failed(reason),
        };
        self.bump_revision();
    }

    /// Drop the mask and stop any running segmentation
    pub fn clear_mask(&mut self) {
        if let Some(adapter) = self.segmentation.as_mut() {
            adapter.cancel();
        }
        if !matches!(self.mask, MaskState::Disabled) {
            self.mask = MaskState::Idle;
            self.bump_revision();
        }
    }

    // Overlay commands

    /// Add a default-styled overlay, at the image center unless placed
    pub fn add_text(&mut self, text: impl Into<String>, position: Option<Position>) -> OverlayId {
        let overlay = match position {
            Some(position) => TextOverlay::at(&self.image, text, position),
            None => TextOverlay::new(&self.image, text),
        }
        .with_z_index(self.overlays.len() as i64);
        let id = overlay.id.clone();
        let index = self.overlays.len();

        self.overlays.push(overlay.clone());
        self.interaction.select(Some(id.clone()));
        self.commit(EditorAction::add(overlay, index));
        id
    }

    pub fn delete_text(&mut self, id: &OverlayId) -> Result<TextOverlay> {
        let (index, overlay) = self
            .overlays
            .remove(id)
            .ok_or_else(|| OverlayError::unknown_overlay(id.as_str()))?;
        self.interaction.forget(id);
        self.commit(EditorAction::delete(overlay.clone(), index));
        Ok(overlay)
    }

    /// Delete the selected overlay, if any
    pub fn delete_selected(&mut self) -> Option<TextOverlay> {
        let id = self.interaction.selected()?.clone();
        self.delete_text(&id).ok()
    }

    pub fn edit_text(&mut self, id: &OverlayId, text: impl Into<String>) -> Result<()> {
        let before = self.existing(id)?.clone();
        let after = before.with_text(text);
        self.overlays.replace(after.clone());
        self.commit(EditorAction::edit(&before, &after));
        Ok(())
    }

    pub fn move_text(&mut self, id: &OverlayId, position: Position) -> Result<()> {
        let before = self.existing(id)?.clone();
        let after = before.with_position(position);
        self.overlays.replace(after.clone());
        self.commit(EditorAction::move_text(&before, &after));
        Ok(())
    }

    pub fn style_text(&mut self, id: &OverlayId, update: &StyleUpdate) -> Result<()> {
        let before = self.existing(id)?.clone();
        let after = before.with_style(update);
        self.overlays.replace(after.clone());
        self.commit(EditorAction::style(&before, &after));
        Ok(())
    }

    /// Restore the default style on one overlay
    pub fn reset_style(&mut self, id: &OverlayId) -> Result<()> {
        self.style_text(id, &StyleUpdate::Reset)
    }

    pub fn select(&mut self, id: Option<OverlayId>) -> Result<()> {
        if let Some(id) = &id {
            self.existing(id)?;
        }
        self.interaction.select(id);
        Ok(())
    }

    /// Run a serialized command
    ///
    /// Returns the id of a newly added overlay.
    pub fn apply(&mut self, command: EditorCommand) -> Result<Option<OverlayId>> {
        match command {
            EditorCommand::AddText { text, position } => return Ok(Some(self.add_text(text, position))),
            EditorCommand::DeleteText { id } => {
                self.delete_text(&id)?;
            },
            EditorCommand::EditText { id, text } => self.edit_text(&id, text)?,
            EditorCommand::MoveText { id, position } => self.move_text(&id, position)?,
            EditorCommand::StyleText { id, update } => self.style_text(&id, &update)?,
            EditorCommand::ResetStyle { id } => self.reset_style(&id)?,
            EditorCommand::Select { id } => self.select(id)?,
            EditorCommand::Undo => {
                self.undo();
            },
            EditorCommand::Redo => {
                self.redo();
            },
            EditorCommand::ClearHistory => self.clear_history(),
        }
        Ok(None)
    }

    // Pointer input

    /// Returns the overlay grabbed, if the pointer landed on one
    pub fn pointer_down(&mut self, rect: &CanvasRect, client: Position) -> Option<OverlayId> {
        let point = rect.to_native(client, self.image.dimensions())?;
        self.interaction.pointer_down(&self.overlays, point)
    }

    /// Returns whether an overlay moved
    pub fn pointer_move(&mut self, rect: &CanvasRect, client: Position) -> bool {
        let Some(point) = rect.to_native(client, self.image.dimensions()) else {
            return false;
        };
        let moved = self.interaction.pointer_move(&mut self.overlays, point);
        if moved {
            self.bump_revision();
        }
        moved
    }

    /// End a drag, recording it as a single move
    pub fn pointer_up(&mut self) {
        if let Some(action) = self.interaction.pointer_up(&self.overlays) {
            self.history.record(action);
            self.dirty = true;
        }
    }

    /// Select the overlay under the pointer, or add a new one there
    pub fn double_click(&mut self, rect: &CanvasRect, client: Position) -> Option<OverlayId> {
        let point = rect.to_native(client, self.image.dimensions())?;
        match self.interaction.double_click(&self.overlays, point) {
            DoubleClick::Selected(id) => Some(id),
            DoubleClick::Create(position) => Some(self.add_text(DEFAULT_OVERLAY_TEXT, Some(position))),
        }
    }

    pub fn wheel(&mut self, delta_y: f32) {
        self.interaction.wheel(delta_y);
    }

    pub fn set_zoom(&mut self, zoom: f32) {
        self.interaction.set_zoom(zoom);
    }

    pub fn pan_by(&mut self, dx: f32, dy: f32) {
        self.interaction.pan_by(dx, dy);
    }

    // History

    /// Returns whether anything was undone
    pub fn undo(&mut self) -> bool {
        let Some(action) = self.history.undo() else {
            return false;
        };
        action.revert(&mut self.overlays);
        self.after_history_step(&action);
        true
    }

    /// Returns whether anything was redone
    pub fn redo(&mut self) -> bool {
        let Some(action) = self.history.redo() else {
            return false;
        };
        action.reapply(&mut self.overlays);
        self.after_history_step(&action);
        true
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    /// Remove every overlay and forget all history
    pub fn reset(&mut self) {
        self.overlays = OverlayCollection::new();
        self.history.clear();
        self.interaction.reset();
        self.dirty = true;
        self.bump_revision();
    }

    // Output

    /// Composite the current frame at native resolution
    pub fn render(&mut self) -> Result<RgbaImage> {
        if let Some((revision, frame)) = &self.frame {
            if *revision == self.revision {
                return Ok(frame.clone());
            }
        }
        let frame = self.render_uncached()?;
        self.frame = Some((self.revision, frame.clone()));
        Ok(frame)
    }

    fn render_uncached(&self) -> Result<RgbaImage> {
        let base = match &self.preview {
            PreviewState::Ready(base) => base,
            PreviewState::Loading => return Err(OverlayError::preview_unavailable("preview is still loading")),
            PreviewState::Failed(reason) => return Err(OverlayError::preview_unavailable(reason.clone())),
        };
        Ok(self
            .compositor
            .composite(base, self.overlays.as_slice(), self.mask.mask()))
    }

    /// Render and encode with the configured export settings
    #[tracing::instrument(skip(self), fields(image_id = %self.image.id, format = %self.config.export.format))]
    pub fn export(&mut self) -> Result<Vec<u8>> {
        let frame = self.render()?;
        let export = &self.config.export;
        let bytes = ExportFormatHandler::encode(&frame, export.format, export.jpeg_quality)?;
        tracing::info!(bytes = bytes.len(), "Frame exported");
        Ok(bytes)
    }

    /// Image record carrying the current overlays
    #[must_use]
    pub fn to_record(&self) -> ImageRecord {
        let mut record = self.image.clone();
        record.text_overlays = self.overlays.as_slice().to_vec();
        record
    }

    fn existing(&self, id: &OverlayId) -> Result<&TextOverlay> {
        self.overlays
            .get(id)
            .ok_or_else(|| OverlayError::unknown_overlay(id.as_str()))
    }

    fn commit(&mut self, action: EditorAction) {
        self.history.record(action);
        self.dirty = true;
        self.bump_revision();
    }

    fn after_history_step(&mut self, action: &EditorAction) {
        if !self.overlays.contains(&action.overlay_id) {
            self.interaction.forget(&action.overlay_id);
        }
        self.dirty = true;
        self.bump_revision();
    }

    fn bump_revision(&mut self) {
        self.revision += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WatermarkConfig;
    use crate::segmentation::test_utils::{FailingSegmenter, MockSegmenter};
    use image::Rgba;

    fn session(width: u32, height: u32) -> EditorSession {
        let config = EditorConfig::default();
        let compositor = Compositor::with_block_glyphs(WatermarkConfig {
            enabled: false,
            ..WatermarkConfig::default()
        });
        let mut session =
            EditorSession::with_compositor(ImageRecord::with_dimensions("img_1", width, height), config, compositor);
        session.set_preview(&DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 255]))));
        session
    }

    #[test]
    fn test_add_text_defaults() {
        let mut session = session(1920, 1080);
        let id = session.add_text("Hello", None);
        let overlay = session.overlay(&id).unwrap();
        assert_eq!(overlay.position, Position::new(960.0, 540.0));
        assert_eq!(overlay.z_index, 0);
        assert_eq!(session.selected(), Some(&id));
        assert_eq!(session.history().index(), 0);
        assert!(session.is_dirty());
    }

    #[test]
    fn test_z_index_follows_count() {
        let mut session = session(100, 100);
        session.add_text("a", None);
        let second = session.add_text("b", None);
        assert_eq!(session.overlay(&second).unwrap().z_index, 1);
    }

    #[test]
    fn test_unknown_overlay_changes_nothing() {
        let mut session = session(100, 100);
        session.add_text("a", None);
        let revision = session.revision();
        let missing = OverlayId::from("text_missing");

        assert!(matches!(session.edit_text(&missing, "x"), Err(OverlayError::UnknownOverlay(_))));
        assert!(matches!(session.delete_text(&missing), Err(OverlayError::UnknownOverlay(_))));
        assert!(session.select(Some(missing)).is_err());
        assert_eq!(session.revision(), revision);
        assert_eq!(session.history().len(), 1);
    }

    #[test]
    fn test_undo_redo_delete() {
        let mut session = session(100, 100);
        let first = session.add_text("first", None);
        session.add_text("second", None);
        session.delete_text(&first).unwrap();
        assert_eq!(session.overlays().len(), 1);

        assert!(session.undo());
        assert_eq!(session.overlays().as_slice()[0].id, first);
        assert!(session.redo());
        assert!(!session.overlays().contains(&first));
        assert!(!session.redo());
    }

    #[test]
    fn test_undo_add_clears_selection() {
        let mut session = session(100, 100);
        session.add_text("a", None);
        assert!(session.undo());
        assert!(session.selected().is_none());
        assert!(!session.undo());
    }

    #[test]
    fn test_commands_dispatch() {
        let mut session = session(200, 200);
        let id = session
            .apply(EditorCommand::AddText {
                text: "cmd".into(),
                position: Some(Position::new(10.0, 20.0)),
            })
            .unwrap()
            .unwrap();
        session
            .apply(EditorCommand::StyleText {
                id: id.clone(),
                update: StyleUpdate::opacity(0.5),
            })
            .unwrap();
        assert!((session.overlay(&id).unwrap().style.opacity - 0.5).abs() < f32::EPSILON);
        session.apply(EditorCommand::ResetStyle { id: id.clone() }).unwrap();
        assert!((session.overlay(&id).unwrap().style.opacity - 1.0).abs() < f32::EPSILON);
        session.apply(EditorCommand::Undo).unwrap();
        assert!((session.overlay(&id).unwrap().style.opacity - 0.5).abs() < f32::EPSILON);

        let json = r#"{"command":"move_text","id":"ID","position":{"x":1.0,"y":2.0}}"#.replace("ID", id.as_str());
        let command: EditorCommand = serde_json::from_str(&json).unwrap();
        session.apply(command).unwrap();
        assert_eq!(session.overlay(&id).unwrap().position, Position::new(1.0, 2.0));
    }

    #[test]
    fn test_drag_is_one_history_step() {
        let mut session = session(400, 400);
        let id = session.add_text("Drag me", Some(Position::new(100.0, 100.0)));
        // Displayed at half size
        let rect = CanvasRect::new(0.0, 0.0, 200.0, 200.0);

        assert_eq!(session.pointer_down(&rect, Position::new(50.0, 50.0)), Some(id.clone()));
        assert!(session.pointer_move(&rect, Position::new(60.0, 50.0)));
        assert!(session.pointer_move(&rect, Position::new(70.0, 55.0)));
        session.pointer_up();

        assert_eq!(session.overlay(&id).unwrap().position, Position::new(140.0, 110.0));
        assert_eq!(session.history().len(), 2);
        session.undo();
        assert_eq!(session.overlay(&id).unwrap().position, Position::new(100.0, 100.0));
    }

    #[test]
    fn test_double_click_empty_canvas_adds_overlay() {
        let mut session = session(400, 400);
        let rect = CanvasRect::new(0.0, 0.0, 400.0, 400.0);
        let id = session.double_click(&rect, Position::new(30.0, 40.0)).unwrap();
        assert_eq!(session.overlay(&id).unwrap().position, Position::new(30.0, 40.0));
        assert_eq!(session.double_click(&rect, Position::new(30.0, 40.0)), Some(id));
        assert_eq!(session.overlays().len(), 1);
    }

    #[test]
    fn test_render_requires_preview() {
        let compositor = Compositor::with_block_glyphs(WatermarkConfig::default());
        let mut session =
            EditorSession::with_compositor(ImageRecord::with_dimensions("img", 10, 10), EditorConfig::default(), compositor);
        assert!(matches!(session.render(), Err(OverlayError::PreviewUnavailable(_))));

        assert!(session.load_preview_bytes(b"not an image").is_err());
        assert!(matches!(session.preview_state(), PreviewState::Failed(_)));
        assert!(matches!(session.export(), Err(OverlayError::PreviewUnavailable(_))));
    }

    #[test]
    fn test_render_cache_tracks_revision() {
        let mut session = session(100, 100);
        let empty = session.render().unwrap();
        let id = session.add_text("I", Some(Position::new(50.0, 50.0)));
        let with_text = session.render().unwrap();
        assert_ne!(empty, with_text);
        session.style_text(&id, &StyleUpdate::opacity(0.0)).unwrap();
        assert_eq!(session.render().unwrap(), empty);
    }

    #[test]
    fn test_export_png() {
        let mut session = session(32, 16);
        let bytes = session.export().unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (32, 16));
    }

    #[test]
    fn test_to_record_carries_overlays() {
        let mut session = session(100, 100);
        session.add_text("kept", None);
        let record = session.to_record();
        assert_eq!(record.text_overlays.len(), 1);
        assert_eq!(record.text_overlays[0].image_id, record.id);
    }

    #[tokio::test]
    async fn test_mask_arrives_and_bumps_revision() {
        let mut session = session(64, 64);
        session.set_segmenter(Arc::new(MockSegmenter::new()));
        assert!(matches!(session.mask_state(), MaskState::Pending { .. }));
        let revision = session.revision();

        assert!(session.wait_for_segmentation().await);
        assert!(matches!(session.mask_state(), MaskState::Ready(_)));
        assert!(session.revision() > revision);
    }

    #[tokio::test]
    async fn test_segmentation_failure_degrades() {
        let mut session = session(64, 64);
        session.set_segmenter(Arc::new(FailingSegmenter));
        assert!(session.wait_for_segmentation().await);
        assert!(matches!(session.mask_state(), MaskState::Failed(_)));
        assert!(session.render().is_ok());
    }

    #[tokio::test]
    async fn test_new_preview_discards_old_mask_request() {
        let mut session = session(64, 64);
        session.set_segmenter(Arc::new(MockSegmenter::new()));
        session.set_preview(&DynamicImage::ImageRgba8(RgbaImage::new(32, 32)));

        assert!(session.wait_for_segmentation().await);
        let mask = session.mask_state().mask().unwrap();
        assert_eq!(mask.dimensions, (32, 32));
    }
}
