//! Linear undo/redo log of overlay edits
//!
//! Add and delete carry a snapshot of the whole overlay. Edit, move and style
//! carry only the field they changed, so undoing one never rolls back another
//! edit that landed on the same overlay in between.

use crate::config::HistoryConfig;
use crate::overlay::{OverlayCollection, OverlayId, TextOverlay, TextStyle};
use crate::types::Position;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One overlay field before and after an edit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldChange<T> {
    pub before: T,
    pub after: T,
    pub updated_before: DateTime<Utc>,
    pub updated_after: DateTime<Utc>,
}

impl<T: Clone> FieldChange<T> {
    fn between(before: &TextOverlay, after: &TextOverlay, field: impl Fn(&TextOverlay) -> &T) -> Self {
        Self {
            before: field(before).clone(),
            after: field(after).clone(),
            updated_before: before.updated_at,
            updated_after: after.updated_at,
        }
    }

    fn restore(
        &self,
        overlays: &mut OverlayCollection,
        id: &OverlayId,
        forward: bool,
        field: impl Fn(&mut TextOverlay) -> &mut T,
    ) {
        let (value, updated_at) = if forward {
            (&self.after, self.updated_after)
        } else {
            (&self.before, self.updated_before)
        };
        overlays.update(id, |overlay| {
            *field(overlay) = value.clone();
            overlay.updated_at = updated_at;
        });
    }
}

/// Kind-specific payload of an edit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionKind {
    /// Overlay inserted at `index`
    AddText { overlay: TextOverlay, index: usize },
    /// Overlay removed from `index`
    DeleteText { overlay: TextOverlay, index: usize },
    EditText { change: FieldChange<String> },
    MoveText { change: FieldChange<Position> },
    StyleText { change: FieldChange<TextStyle> },
}

/// One recorded mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditorAction {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub overlay_id: OverlayId,
    pub kind: ActionKind,
}

impl EditorAction {
    fn from_kind(overlay_id: OverlayId, kind: ActionKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            overlay_id,
            kind,
        }
    }

    #[must_use]
    pub fn add(overlay: TextOverlay, index: usize) -> Self {
        Self::from_kind(overlay.id.clone(), ActionKind::AddText { overlay, index })
    }

    #[must_use]
    pub fn delete(overlay: TextOverlay, index: usize) -> Self {
        Self::from_kind(overlay.id.clone(), ActionKind::DeleteText { overlay, index })
    }

    #[must_use]
    pub fn edit(before: &TextOverlay, after: &TextOverlay) -> Self {
        let change = FieldChange::between(before, after, |overlay| &overlay.text);
        Self::from_kind(after.id.clone(), ActionKind::EditText { change })
    }

    #[must_use]
    pub fn move_text(before: &TextOverlay, after: &TextOverlay) -> Self {
        let change = FieldChange::between(before, after, |overlay| &overlay.position);
        Self::from_kind(after.id.clone(), ActionKind::MoveText { change })
    }

    #[must_use]
    pub fn style(before: &TextOverlay, after: &TextOverlay) -> Self {
        let change = FieldChange::between(before, after, |overlay| &overlay.style);
        Self::from_kind(after.id.clone(), ActionKind::StyleText { change })
    }

    /// Human-readable label for menus and logs
    #[must_use]
    pub fn description(&self) -> String {
        match &self.kind {
            ActionKind::AddText { overlay, .. } => format!("Add text \"{}\"", overlay.text),
            ActionKind::DeleteText { overlay, .. } => format!("Delete text \"{}\"", overlay.text),
            ActionKind::EditText { change } => format!("Edit text \"{}\"", change.after),
            ActionKind::MoveText { .. } => "Move text".to_string(),
            ActionKind::StyleText { .. } => "Change text style".to_string(),
        }
    }

    /// Reverse this action against the overlay list
    pub fn revert(&self, overlays: &mut OverlayCollection) {
        match &self.kind {
            ActionKind::AddText { overlay, .. } => {
                overlays.remove(&overlay.id);
            },
            ActionKind::DeleteText { overlay, index } => {
                if !overlays.contains(&overlay.id) {
                    overlays.insert(*index, overlay.clone());
                }
            },
            ActionKind::EditText { change } => {
                change.restore(overlays, &self.overlay_id, false, |o| &mut o.text);
            },
            ActionKind::MoveText { change } => {
                change.restore(overlays, &self.overlay_id, false, |o| &mut o.position);
            },
            ActionKind::StyleText { change } => {
                change.restore(overlays, &self.overlay_id, false, |o| &mut o.style);
            },
        }
    }

    /// Re-apply this action against the overlay list
    pub fn reapply(&self, overlays: &mut OverlayCollection) {
        match &self.kind {
            ActionKind::AddText { overlay, index } => {
                if !overlays.contains(&overlay.id) {
                    overlays.insert(*index, overlay.clone());
                }
            },
            ActionKind::DeleteText { overlay, .. } => {
                overlays.remove(&overlay.id);
            },
            ActionKind::EditText { change } => {
                change.restore(overlays, &self.overlay_id, true, |o| &mut o.text);
            },
            ActionKind::MoveText { change } => {
                change.restore(overlays, &self.overlay_id, true, |o| &mut o.position);
            },
            ActionKind::StyleText { change } => {
                change.restore(overlays, &self.overlay_id, true, |o| &mut o.style);
            },
        }
    }
}

/// Linear history with a cursor at the current action
#[derive(Debug, Clone, Default)]
pub struct EditHistory {
    actions: Vec<EditorAction>,
    /// Number of applied actions; the current action is `cursor - 1`
    cursor: usize,
    config: HistoryConfig,
}

impl EditHistory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_config(config: HistoryConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Append after the current action, discarding any redo tail
    pub fn record(&mut self, action: EditorAction) {
        tracing::debug!(action = %action.description(), "Recording edit");
        self.actions.truncate(self.cursor);
        self.actions.push(action);
        self.cursor = self.actions.len();

        let max = self.config.max_actions;
        if max > 0 && self.actions.len() > max {
            let overflow = self.actions.len() - max;
            self.actions.drain(..overflow);
            self.cursor -= overflow;
        }
    }

    /// Step back, returning the action to reverse
    pub fn undo(&mut self) -> Option<EditorAction> {
        if self.cursor == 0 {
            return None;
        }
        self.cursor -= 1;
        let action = self.actions.get(self.cursor).cloned();
        if let Some(action) = &action {
            tracing::debug!(action = %action.description(), "Undo");
        }
        action
    }

    /// Step forward, returning the action to re-apply
    pub fn redo(&mut self) -> Option<EditorAction> {
        let action = self.actions.get(self.cursor).cloned()?;
        self.cursor += 1;
        tracing::debug!(action = %action.description(), "Redo");
        Some(action)
    }

    pub fn clear(&mut self) {
        self.actions.clear();
        self.cursor = 0;
    }

    /// Index of the current action, -1 before the first
    #[must_use]
    pub fn index(&self) -> isize {
        self.cursor as isize - 1
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    #[must_use]
    pub fn can_redo(&self) -> bool {
        self.cursor < self.actions.len()
    }

    #[must_use]
    pub fn actions(&self) -> &[EditorAction] {
        &self.actions
    }

    /// Description of the action `undo` would reverse
    #[must_use]
    pub fn undo_description(&self) -> Option<String> {
        self.cursor
            .checked_sub(1)
            .and_then(|i| self.actions.get(i))
            .map(EditorAction::description)
    }

    #[must_use]
    pub fn redo_description(&self) -> Option<String> {
        self.actions.get(self.cursor).map(EditorAction::description)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ImageRecord, Position};

    fn overlay(text: &str) -> TextOverlay {
        TextOverlay::new(&ImageRecord::with_dimensions("img", 200, 100), text)
    }

    #[test]
    fn test_empty_history_bounds() {
        let mut history = EditHistory::new();
        assert_eq!(history.index(), -1);
        assert!(history.undo().is_none());
        assert!(history.redo().is_none());
        assert_eq!(history.index(), -1);
    }

    #[test]
    fn test_record_undo_redo_cursor() {
        let mut history = EditHistory::new();
        history.record(EditorAction::add(overlay("a"), 0));
        history.record(EditorAction::add(overlay("b"), 1));
        assert_eq!(history.index(), 1);

        assert!(history.undo().is_some());
        assert_eq!(history.index(), 0);
        assert!(history.can_redo());

        assert!(history.redo().is_some());
        assert_eq!(history.index(), 1);
        assert!(history.redo().is_none());
        assert_eq!(history.index(), 1);
    }

    #[test]
    fn test_record_truncates_redo_tail() {
        let mut history = EditHistory::new();
        history.record(EditorAction::add(overlay("a"), 0));
        history.record(EditorAction::add(overlay("b"), 1));
        history.undo();
        history.record(EditorAction::add(overlay("c"), 1));

        assert_eq!(history.len(), 2);
        assert!(!history.can_redo());
        assert_eq!(history.undo_description().unwrap(), "Add text \"c\"");
    }

    #[test]
    fn test_max_actions_drops_oldest() {
        let mut history = EditHistory::with_config(HistoryConfig { max_actions: 2 });
        for text in ["a", "b", "c"] {
            history.record(EditorAction::add(overlay(text), 0));
        }
        assert_eq!(history.len(), 2);
        assert_eq!(history.index(), 1);
        history.undo();
        history.undo();
        assert!(history.undo().is_none());
    }

    #[test]
    fn test_revert_and_reapply_restore_collection() {
        let first = overlay("first");
        let second = overlay("second");
        let mut overlays = OverlayCollection::from(vec![first.clone(), second.clone()]);
        let initial = overlays.clone();

        let moved = first.with_position(Position::new(5.0, 5.0));
        overlays.replace(moved.clone());
        let move_action = EditorAction::move_text(&first, &moved);

        let (index, removed) = overlays.remove(&second.id).unwrap();
        let delete_action = EditorAction::delete(removed, index);
        let after = overlays.clone();

        delete_action.revert(&mut overlays);
        move_action.revert(&mut overlays);
        assert_eq!(overlays, initial);

        move_action.reapply(&mut overlays);
        delete_action.reapply(&mut overlays);
        assert_eq!(overlays, after);
    }

    #[test]
    fn test_descriptions() {
        let o = overlay("hi");
        assert_eq!(EditorAction::add(o.clone(), 0).description(), "Add text \"hi\"");
        assert_eq!(EditorAction::style(&o, &o).description(), "Change text style");
        assert_eq!(EditorAction::move_text(&o, &o).description(), "Move text");
    }

    #[test]
    fn test_field_actions_leave_other_fields_alone() {
        let original = overlay("hi");
        let mut overlays = OverlayCollection::from(vec![original.clone()]);

        let moved = original.with_position(Position::new(30.0, 40.0));
        let styled = moved.with_style(&crate::overlay::StyleUpdate::color("#ff0000"));
        let move_action = EditorAction::move_text(&original, &moved);
        let style_action = EditorAction::style(&moved, &styled);
        overlays.replace(styled.clone());

        // Undo the older move while the newer style stays applied
        move_action.revert(&mut overlays);
        let current = overlays.get(&original.id).unwrap();
        assert_eq!(current.position, original.position);
        assert_eq!(current.style, styled.style);

        style_action.revert(&mut overlays);
        move_action.reapply(&mut overlays);
        let current = overlays.get(&original.id).unwrap();
        assert_eq!(current.position, Position::new(30.0, 40.0));
        assert_eq!(current.style, original.style);
    }

    #[test]
    fn test_clear() {
        let mut history = EditHistory::new();
        history.record(EditorAction::add(overlay("a"), 0));
        history.clear();
        assert!(history.is_empty());
        assert!(!history.can_undo());
        assert_eq!(history.index(), -1);
    }
}
