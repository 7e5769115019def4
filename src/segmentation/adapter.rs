//! Cancellable background segmentation with stale-result discard

use super::{MaskCache, ResolutionHint, Segmenter};
use crate::types::SegmentationMask;
use image::RgbaImage;
use instant::{Duration, Instant};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::AbortHandle;

/// What a finished segmentation produced
#[derive(Debug, Clone, PartialEq)]
pub enum SegmentationOutcome {
    Ready(SegmentationMask),
    /// Segmentation failed; editing continues without a mask
    Failed(String),
}

/// A delivered result, tagged with the request it answers
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentationResult {
    pub generation: u64,
    pub preview_key: String,
    pub outcome: SegmentationOutcome,
    pub elapsed: Duration,
    /// Served from the mask cache without running the segmenter
    pub cached: bool,
}

/// Handle describing an issued request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentationTicket {
    pub generation: u64,
    pub preview_key: String,
    pub fingerprint: String,
    pub cached: bool,
}

#[derive(Debug)]
struct InFlight {
    work: AbortHandle,
    relay: AbortHandle,
}

impl InFlight {
    fn abort(&self) {
        self.work.abort();
        self.relay.abort();
    }

    fn is_finished(&self) -> bool {
        self.relay.is_finished()
    }
}

/// Runs a [`Segmenter`] on tokio tasks and delivers results over a channel
///
/// Only the latest request is live. Issuing a new request or calling
/// [`cancel`](Self::cancel) aborts the previous task, and any result still
/// queued for an older generation or another preview is dropped on receipt.
pub struct SegmentationAdapter {
    segmenter: Arc<dyn Segmenter>,
    cache: Arc<Mutex<MaskCache>>,
    sender: mpsc::UnboundedSender<SegmentationResult>,
    receiver: mpsc::UnboundedReceiver<SegmentationResult>,
    generation: u64,
    active_key: Option<String>,
    in_flight: Option<InFlight>,
}

impl std::fmt::Debug for SegmentationAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SegmentationAdapter")
            .field("segmenter", &self.segmenter.name())
            .field("generation", &self.generation)
            .field("active_key", &self.active_key)
            .field("pending", &self.is_pending())
            .finish_non_exhaustive()
    }
}

impl SegmentationAdapter {
    #[must_use]
    pub fn new(segmenter: Arc<dyn Segmenter>, cache_capacity: usize) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            segmenter,
            cache: Arc::new(Mutex::new(MaskCache::new(cache_capacity))),
            sender,
            receiver,
            generation: 0,
            active_key: None,
            in_flight: None,
        }
    }

    #[must_use]
    pub fn segmenter_name(&self) -> &str {
        self.segmenter.name()
    }

    /// Generation of the latest request
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[must_use]
    pub fn active_preview(&self) -> Option<&str> {
        self.active_key.as_deref()
    }

    /// Whether a spawned segmentation is still running
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.in_flight.as_ref().is_some_and(|task| !task.is_finished())
    }

    #[must_use]
    pub fn cached_masks(&self) -> usize {
        self.cache.lock().map_or(0, |cache| cache.len())
    }

    /// Request a mask for `image`, superseding any earlier request
    ///
    /// A cached mask is delivered immediately. Otherwise the segmenter runs on
    /// a tokio task; without a runtime the request fails as a delivered
    /// `Failed` outcome.
    #[tracing::instrument(
        skip(self, preview_key, image),
        fields(segmenter = self.segmenter.name(), preview = tracing::field::Empty, generation = tracing::field::Empty)
    )]
    pub fn request(
        &mut self,
        preview_key: impl Into<String>,
        image: Arc<RgbaImage>,
        hint: ResolutionHint,
    ) -> SegmentationTicket {
        self.abort_in_flight();
        self.generation += 1;
        let generation = self.generation;
        let preview_key = preview_key.into();
        self.active_key = Some(preview_key.clone());
        let span = tracing::Span::current();
        span.record("preview", preview_key.as_str());
        span.record("generation", generation);

        let fingerprint = MaskCache::fingerprint(&image, hint);
        let cached = self
            .cache
            .lock()
            .ok()
            .and_then(|cache| cache.get(&fingerprint));
        if let Some(mask) = cached {
            tracing::debug!(%preview_key, "Serving mask from cache");
            self.deliver(SegmentationResult {
                generation,
                preview_key: preview_key.clone(),
                outcome: SegmentationOutcome::Ready(mask),
                elapsed: Duration::ZERO,
                cached: true,
            });
            return SegmentationTicket {
                generation,
                preview_key,
                fingerprint,
                cached: true,
            };
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("No async runtime available, segmentation skipped");
            self.deliver(SegmentationResult {
                generation,
                preview_key: preview_key.clone(),
                outcome: SegmentationOutcome::Failed("no async runtime available".to_string()),
                elapsed: Duration::ZERO,
                cached: false,
            });
            return SegmentationTicket {
                generation,
                preview_key,
                fingerprint,
                cached: false,
            };
        };

        let segmenter = Arc::clone(&self.segmenter);
        let started = Instant::now();
        let input = Arc::clone(&image);
        let work = runtime.spawn(async move { segmenter.segment(&input, hint).await });
        let work_abort = work.abort_handle();

        let sender = self.sender.clone();
        let cache = Arc::clone(&self.cache);
        let name = self.segmenter.name().to_string();
        let key = preview_key.clone();
        let cache_key = fingerprint.clone();
        let relay = runtime.spawn(async move {
            let outcome = match work.await {
                Ok(Ok(mask)) if mask.matches_image(&*image) => {
                    if let Ok(mut cache) = cache.lock() {
                        cache.insert(cache_key, mask.clone());
                    }
                    SegmentationOutcome::Ready(mask)
                },
                Ok(Ok(mask)) => SegmentationOutcome::Failed(format!(
                    "mask is {}x{} but image is {}x{}",
                    mask.dimensions.0,
                    mask.dimensions.1,
                    image.width(),
                    image.height()
                )),
                Ok(Err(e)) => SegmentationOutcome::Failed(e.to_string()),
                Err(e) if e.is_cancelled() => return,
                Err(e) => SegmentationOutcome::Failed(format!("segmentation task panicked: {}", e)),
            };

            let elapsed = started.elapsed();
            match &outcome {
                SegmentationOutcome::Ready(_) => tracing::info!(
                    segmenter = %name,
                    generation,
                    elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                    "Segmentation finished"
                ),
                SegmentationOutcome::Failed(reason) => tracing::warn!(
                    segmenter = %name,
                    generation,
                    %reason,
                    "Segmentation failed, continuing without mask"
                ),
            }

            // The receiver lives as long as the adapter
            let _ = sender.send(SegmentationResult {
                generation,
                preview_key: key,
                outcome,
                elapsed,
                cached: false,
            });
        });

        self.in_flight = Some(InFlight {
            work: work_abort,
            relay: relay.abort_handle(),
        });

        SegmentationTicket {
            generation,
            preview_key,
            fingerprint,
            cached: false,
        }
    }

    /// Abort any running request and invalidate queued results
    pub fn cancel(&mut self) {
        self.abort_in_flight();
        self.generation += 1;
        self.active_key = None;
    }

    /// Whether a result answers the latest request for the active preview
    #[must_use]
    pub fn is_relevant(&self, result: &SegmentationResult) -> bool {
        result.generation == self.generation
            && self.active_key.as_deref() == Some(result.preview_key.as_str())
    }

    /// Next relevant result without waiting
    pub fn try_next(&mut self) -> Option<SegmentationResult> {
        while let Ok(result) = self.receiver.try_recv() {
            if self.is_relevant(&result) {
                return Some(result);
            }
            self.log_discard(&result);
        }
        None
    }

    /// Wait for the next relevant result
    ///
    /// Pending forever when nothing is in flight; select against other
    /// events or check [`is_pending`](Self::is_pending) first.
    pub async fn next(&mut self) -> Option<SegmentationResult> {
        loop {
            let result = self.receiver.recv().await?;
            if self.is_relevant(&result) {
                return Some(result);
            }
            self.log_discard(&result);
        }
    }

    fn deliver(&self, result: SegmentationResult) {
        // The receiver lives as long as the adapter
        let _ = self.sender.send(result);
    }

    fn abort_in_flight(&mut self) {
        if let Some(task) = self.in_flight.take() {
            if !task.is_finished() {
                tracing::debug!(generation = self.generation, "Aborting superseded segmentation");
            }
            task.abort();
        }
    }

    fn log_discard(&self, result: &SegmentationResult) {
        tracing::debug!(
            result_generation = result.generation,
            current_generation = self.generation,
            preview_key = %result.preview_key,
            "Discarding stale segmentation result"
        );
    }
}

impl Drop for SegmentationAdapter {
    fn drop(&mut self) {
        self.abort_in_flight();
    }
}
