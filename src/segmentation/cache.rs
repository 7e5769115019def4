//! Fingerprint-keyed mask cache

use super::ResolutionHint;
use crate::types::SegmentationMask;
use image::RgbaImage;
use sha2::{Digest, Sha256};
use std::collections::VecDeque;

/// Bounded mask cache, oldest entry evicted first
#[derive(Debug, Clone, Default)]
pub struct MaskCache {
    capacity: usize,
    entries: VecDeque<(String, SegmentationMask)>,
}

impl MaskCache {
    /// Cache holding at most `capacity` masks (0 disables caching)
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    /// SHA-256 over dimensions, RGBA pixels and the resolution hint
    #[must_use]
    pub fn fingerprint(image: &RgbaImage, hint: ResolutionHint) -> String {
        let mut hasher = Sha256::new();
        hasher.update(image.width().to_le_bytes());
        hasher.update(image.height().to_le_bytes());
        hasher.update(image.as_raw());
        hasher.update(hint.as_str().as_bytes());
        format!("{:x}", hasher.finalize())
    }

    #[must_use]
    pub fn get(&self, fingerprint: &str) -> Option<SegmentationMask> {
        self.entries
            .iter()
            .find(|(key, _)| key == fingerprint)
            .map(|(_, mask)| mask.clone())
    }

    pub fn insert(&mut self, fingerprint: String, mask: SegmentationMask) {
        if self.capacity == 0 {
            return;
        }
        if let Some(slot) = self.entries.iter_mut().find(|(key, _)| *key == fingerprint) {
            slot.1 = mask;
            return;
        }
        while self.entries.len() >= self.capacity {
            if let Some((evicted, _)) = self.entries.pop_front() {
                tracing::debug!(fingerprint = %evicted, "Evicting cached mask");
            }
        }
        self.entries.push_back((fingerprint, mask));
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
