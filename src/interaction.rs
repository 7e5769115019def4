//! Pointer interaction: hit-testing, dragging, zoom and display fitting
//!
//! All overlay geometry lives in native image pixels. Pointer events arrive
//! in client (screen) coordinates and are converted through the on-screen
//! [`CanvasRect`] before anything else happens.

use crate::config::DisplayLimits;
use crate::history::EditorAction;
use crate::overlay::{OverlayCollection, OverlayId, TextOverlay};
use crate::types::Position;
use serde::{Deserialize, Serialize};

/// Width of one character in the hit box, as a fraction of the font size
pub const HIT_BOX_CHAR_WIDTH: f32 = 0.6;
pub const MIN_ZOOM: f32 = 0.1;
pub const MAX_ZOOM: f32 = 5.0;
const WHEEL_ZOOM_IN: f32 = 1.1;
const WHEEL_ZOOM_OUT: f32 = 0.9;

/// On-screen box the preview is displayed in
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CanvasRect {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl CanvasRect {
    #[must_use]
    pub const fn new(left: f32, top: f32, width: f32, height: f32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// Map a client point to native image pixels
    ///
    /// Returns `None` while the canvas has no usable display size.
    #[must_use]
    pub fn to_native(&self, client: Position, native: (u32, u32)) -> Option<Position> {
        let usable = |extent: f32| extent.is_finite() && extent > 0.0;
        if !usable(self.width) || !usable(self.height) {
            return None;
        }
        let scale_x = native.0 as f32 / self.width;
        let scale_y = native.1 as f32 / self.height;
        Some(Position::new(
            (client.x - self.left) * scale_x,
            (client.y - self.top) * scale_y,
        ))
    }
}

/// Approximate text box used for hit-testing, centered on the anchor
///
/// Returns `(left, top, right, bottom)` in native pixels.
#[must_use]
pub fn hit_box(overlay: &TextOverlay) -> (f32, f32, f32, f32) {
    let size = overlay.style.font_size;
    let width = size * overlay.char_count() as f32 * HIT_BOX_CHAR_WIDTH;
    let Position { x, y } = overlay.position;
    (x - width / 2.0, y - size / 2.0, x + width / 2.0, y + size / 2.0)
}

/// Topmost overlay whose hit box contains `point`
#[must_use]
pub fn hit_test(overlays: &OverlayCollection, point: Position) -> Option<&TextOverlay> {
    overlays.render_order().into_iter().rev().find(|overlay| {
        let (left, top, right, bottom) = hit_box(overlay);
        (left..=right).contains(&point.x) && (top..=bottom).contains(&point.y)
    })
}

/// Drag state machine
#[derive(Debug, Clone, PartialEq, Default)]
pub enum DragState {
    #[default]
    Idle,
    Dragging {
        id: OverlayId,
        /// Pointer minus overlay position at pointer down
        offset: Position,
        /// Overlay as it was when the drag started
        origin: TextOverlay,
    },
}

/// Result of a double-click
#[derive(Debug, Clone, PartialEq)]
pub enum DoubleClick {
    /// Landed on an existing overlay, which is now selected
    Selected(OverlayId),
    /// Landed on empty canvas; a new overlay belongs here
    Create(Position),
}

/// Selection, drag, zoom and pan for one editor session
#[derive(Debug, Clone, PartialEq)]
pub struct InteractionController {
    drag: DragState,
    selected: Option<OverlayId>,
    zoom: f32,
    pan: Position,
}

impl Default for InteractionController {
    fn default() -> Self {
        Self {
            drag: DragState::Idle,
            selected: None,
            zoom: 1.0,
            pan: Position::default(),
        }
    }
}

impl InteractionController {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn drag_state(&self) -> &DragState {
        &self.drag
    }

    #[must_use]
    pub fn is_dragging(&self) -> bool {
        matches!(self.drag, DragState::Dragging { .. })
    }

    #[must_use]
    pub fn selected(&self) -> Option<&OverlayId> {
        self.selected.as_ref()
    }

    /// Select exactly one overlay, or none
    pub fn select(&mut self, id: Option<OverlayId>) {
        self.selected = id;
    }

    /// Forget selection and drag state for an overlay that went away
    pub fn forget(&mut self, id: &OverlayId) {
        if self.selected.as_ref() == Some(id) {
            self.selected = None;
        }
        if matches!(&self.drag, DragState::Dragging { id: dragged, .. } if dragged == id) {
            self.drag = DragState::Idle;
        }
    }

    /// Start dragging the topmost overlay under `point`
    ///
    /// A miss changes nothing. Returns the selected overlay on a hit.
    pub fn pointer_down(&mut self, overlays: &OverlayCollection, point: Position) -> Option<OverlayId> {
        let hit = hit_test(overlays, point)?;
        let id = hit.id.clone();
        self.drag = DragState::Dragging {
            id: id.clone(),
            offset: Position::new(point.x - hit.position.x, point.y - hit.position.y),
            origin: hit.clone(),
        };
        self.selected = Some(id.clone());
        Some(id)
    }

    /// Move the dragged overlay so it keeps its grab offset
    ///
    /// Returns whether an overlay moved.
    pub fn pointer_move(&mut self, overlays: &mut OverlayCollection, point: Position) -> bool {
        let DragState::Dragging { id, offset, .. } = &self.drag else {
            return false;
        };
        let Some(current) = overlays.get(id) else {
            return false;
        };
        let target = Position::new(point.x - offset.x, point.y - offset.y);
        if current.position == target {
            return false;
        }
        let moved = current.with_position(target);
        overlays.replace(moved).is_some()
    }

    /// End any drag; a drag that moved its overlay becomes one history action
    pub fn pointer_up(&mut self, overlays: &OverlayCollection) -> Option<EditorAction> {
        let DragState::Dragging { id, origin, .. } = std::mem::take(&mut self.drag) else {
            return None;
        };
        let current = overlays.get(&id)?;
        (current.position != origin.position).then(|| EditorAction::move_text(&origin, current))
    }

    /// Select the overlay under `point`, or report where to create one
    pub fn double_click(&mut self, overlays: &OverlayCollection, point: Position) -> DoubleClick {
        match hit_test(overlays, point) {
            Some(hit) => {
                self.selected = Some(hit.id.clone());
                DoubleClick::Selected(hit.id.clone())
            },
            None => DoubleClick::Create(point),
        }
    }

    #[must_use]
    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    /// Set zoom, clamped to the supported range; non-finite values are ignored
    pub fn set_zoom(&mut self, zoom: f32) {
        if zoom.is_finite() {
            self.zoom = zoom.clamp(MIN_ZOOM, MAX_ZOOM);
        }
    }

    /// Wheel zoom: negative delta (scroll up) zooms in, positive zooms out
    pub fn wheel(&mut self, delta_y: f32) {
        if delta_y < 0.0 {
            self.set_zoom(self.zoom * WHEEL_ZOOM_IN);
        } else if delta_y > 0.0 {
            self.set_zoom(self.zoom * WHEEL_ZOOM_OUT);
        }
    }

    #[must_use]
    pub fn pan(&self) -> Position {
        self.pan
    }

    pub fn set_pan(&mut self, pan: Position) {
        self.pan = pan;
    }

    pub fn pan_by(&mut self, dx: f32, dy: f32) {
        self.pan = Position::new(self.pan.x + dx, self.pan.y + dy);
    }

    /// Back to the initial state
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Largest display size within `limits` keeping aspect ratio, never upscaled
#[must_use]
pub fn fit_display(native: (u32, u32), limits: DisplayLimits) -> (u32, u32) {
    let (width, height) = native;
    if width == 0 || height == 0 {
        return native;
    }
    let ratio = (limits.max_width as f32 / width as f32)
        .min(limits.max_height as f32 / height as f32)
        .min(1.0);
    (
        (width as f32 * ratio).round() as u32,
        (height as f32 * ratio).round() as u32,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ImageRecord;

    fn overlays(entries: &[(&str, f32, f32)]) -> OverlayCollection {
        let image = ImageRecord::with_dimensions("img", 1000, 1000);
        let mut collection = OverlayCollection::new();
        for (index, (text, x, y)) in entries.iter().enumerate() {
            collection.push(TextOverlay::at(&image, *text, Position::new(*x, *y)).with_z_index(index as i64));
        }
        collection
    }

    #[test]
    fn test_to_native_scales_by_display() {
        let rect = CanvasRect::new(10.0, 20.0, 500.0, 250.0);
        let native = rect.to_native(Position::new(260.0, 145.0), (1000, 500)).unwrap();
        assert_eq!(native, Position::new(500.0, 250.0));
        assert!(CanvasRect::new(0.0, 0.0, 0.0, 100.0)
            .to_native(Position::new(1.0, 1.0), (10, 10))
            .is_none());
    }

    #[test]
    fn test_hit_box_dimensions() {
        let collection = overlays(&[("Hello", 100.0, 100.0)]);
        let (left, top, right, bottom) = hit_box(collection.iter().next().unwrap());
        // 48 * 5 * 0.6 = 144 wide, 48 tall
        assert_eq!((left, right), (28.0, 172.0));
        assert_eq!((top, bottom), (76.0, 124.0));
    }

    #[test]
    fn test_hit_test_prefers_topmost() {
        let collection = overlays(&[("Bottom", 100.0, 100.0), ("Top", 100.0, 100.0)]);
        let hit = hit_test(&collection, Position::new(100.0, 100.0)).unwrap();
        assert_eq!(hit.text, "Top");
        assert!(hit_test(&collection, Position::new(900.0, 900.0)).is_none());
    }

    #[test]
    fn test_equal_z_index_goes_to_later_insertion() {
        let image = ImageRecord::with_dimensions("img", 1000, 1000);
        let mut collection = OverlayCollection::new();
        for text in ["Earlier", "Later"] {
            collection.push(TextOverlay::at(&image, text, Position::new(100.0, 100.0)).with_z_index(5));
        }
        let hit = hit_test(&collection, Position::new(100.0, 100.0)).unwrap();
        assert_eq!(hit.text, "Later");

        // A higher z-index still beats insertion order
        let earlier = collection.as_slice()[0].clone().with_z_index(6);
        collection.replace(earlier);
        assert_eq!(hit_test(&collection, Position::new(100.0, 100.0)).unwrap().text, "Earlier");
    }

    #[test]
    fn test_empty_text_has_zero_width_box() {
        let collection = overlays(&[("", 100.0, 100.0)]);
        assert!(hit_test(&collection, Position::new(100.0, 100.0)).is_some());
        assert!(hit_test(&collection, Position::new(101.0, 100.0)).is_none());
    }

    #[test]
    fn test_drag_moves_by_offset_and_records_once() {
        let mut collection = overlays(&[("Drag", 100.0, 100.0)]);
        let mut controller = InteractionController::new();
        let id = controller.pointer_down(&collection, Position::new(110.0, 105.0)).unwrap();
        assert!(controller.is_dragging());
        assert_eq!(controller.selected(), Some(&id));

        assert!(controller.pointer_move(&mut collection, Position::new(210.0, 305.0)));
        assert!(controller.pointer_move(&mut collection, Position::new(310.0, 405.0)));
        assert_eq!(collection.get(&id).unwrap().position, Position::new(300.0, 400.0));

        let action = controller.pointer_up(&collection).unwrap();
        assert!(!controller.is_dragging());
        assert_eq!(action.description(), "Move text");
    }

    #[test]
    fn test_click_without_move_records_nothing() {
        let collection = overlays(&[("Still", 100.0, 100.0)]);
        let mut controller = InteractionController::new();
        controller.pointer_down(&collection, Position::new(100.0, 100.0));
        assert!(controller.pointer_up(&collection).is_none());
    }

    #[test]
    fn test_miss_keeps_selection() {
        let collection = overlays(&[("A", 100.0, 100.0)]);
        let mut controller = InteractionController::new();
        let id = controller.pointer_down(&collection, Position::new(100.0, 100.0)).unwrap();
        controller.pointer_up(&collection);
        assert!(controller.pointer_down(&collection, Position::new(900.0, 900.0)).is_none());
        assert_eq!(controller.selected(), Some(&id));
        assert!(!controller.is_dragging());
    }

    #[test]
    fn test_pointer_up_when_idle_is_noop() {
        let mut controller = InteractionController::new();
        assert!(controller.pointer_up(&OverlayCollection::new()).is_none());
        assert_eq!(controller.drag_state(), &DragState::Idle);
    }

    #[test]
    fn test_double_click() {
        let collection = overlays(&[("A", 100.0, 100.0)]);
        let mut controller = InteractionController::new();
        assert!(matches!(
            controller.double_click(&collection, Position::new(100.0, 100.0)),
            DoubleClick::Selected(_)
        ));
        assert_eq!(
            controller.double_click(&collection, Position::new(600.0, 700.0)),
            DoubleClick::Create(Position::new(600.0, 700.0))
        );
    }

    #[test]
    fn test_zoom_clamps() {
        let mut controller = InteractionController::new();
        controller.wheel(-1.0);
        assert!((controller.zoom() - 1.1).abs() < 1e-6);
        controller.wheel(1.0);
        assert!((controller.zoom() - 0.99).abs() < 1e-6);
        controller.set_zoom(50.0);
        assert_eq!(controller.zoom(), MAX_ZOOM);
        for _ in 0..100 {
            controller.wheel(1.0);
        }
        assert_eq!(controller.zoom(), MIN_ZOOM);
        controller.set_zoom(f32::NAN);
        assert_eq!(controller.zoom(), MIN_ZOOM);
    }

    #[test]
    fn test_fit_display() {
        let limits = DisplayLimits::default();
        assert_eq!(fit_display((1920, 1080), limits), (700, 394));
        assert_eq!(fit_display((400, 300), limits), (400, 300));
        assert_eq!(fit_display((1000, 2000), limits), (250, 500));
    }
}
