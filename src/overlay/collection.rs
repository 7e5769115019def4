//! Insertion-ordered overlay list

use super::model::{OverlayId, TextOverlay};
use serde::{Deserialize, Serialize};

/// Ordered overlays of one image
///
/// Vector order is insertion order and breaks z-index ties. Replacement never
/// reorders, so an overlay keeps its tie-break precedence through edits.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OverlayCollection {
    overlays: Vec<TextOverlay>,
}

impl OverlayCollection {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.overlays.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.overlays.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TextOverlay> {
        self.overlays.iter()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[TextOverlay] {
        &self.overlays
    }

    #[must_use]
    pub fn get(&self, id: &OverlayId) -> Option<&TextOverlay> {
        self.overlays.iter().find(|overlay| &overlay.id == id)
    }

    #[must_use]
    pub fn contains(&self, id: &OverlayId) -> bool {
        self.get(id).is_some()
    }

    #[must_use]
    pub fn index_of(&self, id: &OverlayId) -> Option<usize> {
        self.overlays.iter().position(|overlay| &overlay.id == id)
    }

    pub fn push(&mut self, overlay: TextOverlay) {
        self.overlays.push(overlay);
    }

    /// Insert at `index`, clamped to the current length
    pub fn insert(&mut self, index: usize, overlay: TextOverlay) {
        let index = index.min(self.overlays.len());
        self.overlays.insert(index, overlay);
    }

    /// Remove by id, returning the former index and the overlay
    pub fn remove(&mut self, id: &OverlayId) -> Option<(usize, TextOverlay)> {
        let index = self.index_of(id)?;
        Some((index, self.overlays.remove(index)))
    }

    /// Replace the overlay carrying the same id, returning the previous value
    pub fn replace(&mut self, overlay: TextOverlay) -> Option<TextOverlay> {
        let slot = self.overlays.iter_mut().find(|existing| existing.id == overlay.id)?;
        Some(std::mem::replace(slot, overlay))
    }

    /// Mutate the overlay carrying `id` in place; returns whether it exists
    pub fn update(&mut self, id: &OverlayId, apply: impl FnOnce(&mut TextOverlay)) -> bool {
        match self.overlays.iter_mut().find(|overlay| &overlay.id == id) {
            Some(overlay) => {
                apply(overlay);
                true
            },
            None => false,
        }
    }

    /// Overlays in draw order: ascending z-index, ties by insertion order
    #[must_use]
    pub fn render_order(&self) -> Vec<&TextOverlay> {
        let mut ordered: Vec<&TextOverlay> = self.overlays.iter().collect();
        ordered.sort_by_key(|overlay| overlay.z_index);
        ordered
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<TextOverlay> {
        self.overlays
    }
}

impl From<Vec<TextOverlay>> for OverlayCollection {
    fn from(overlays: Vec<TextOverlay>) -> Self {
        Self { overlays }
    }
}

impl<'a> IntoIterator for &'a OverlayCollection {
    type Item = &'a TextOverlay;
    type IntoIter = std::slice::Iter<'a, TextOverlay>;

    fn into_iter(self) -> Self::IntoIter {
        self.overlays.iter()
    }
}
