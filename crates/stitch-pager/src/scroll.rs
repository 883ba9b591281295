//! Scroll-triggered page advancement.
//!
//! The host environment delivers proximity signals (an intersection-observer
//! style sentinel event, or raw scroll offsets when no observer primitive
//! exists) and this module decides whether to drive the pager. Duplicate
//! suppression lives in the pager itself; what is owned here is the one-shot
//! initial load and the stale-binding guard for replaced sentinels.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use stitch_core::PageItem;

use crate::pager::{CursorPager, LoadOutcome};

/// Tuning for a [`ScrollLoader`].
#[derive(Debug, Clone, Copy)]
pub struct ScrollOptions {
    /// Distance (in host units, typically px) from the list end at which the
    /// next page starts loading.
    pub threshold: f64,
    /// Fire one `load_more` as soon as the list mounts.
    pub initial_load: bool,
}

impl Default for ScrollOptions {
    fn default() -> Self {
        ScrollOptions {
            threshold: 240.0,
            initial_load: true,
        }
    }
}

/// Binds a [`CursorPager`] to viewport-proximity signals.
pub struct ScrollLoader<T: PageItem> {
    pager: Arc<CursorPager<T>>,
    options: ScrollOptions,
    /// One-shot latch for the initial load, separate from the pager's own
    /// guards: mount effects can fire twice under strict rendering modes
    /// before the first fetch even starts.
    initial_fired: AtomicBool,
}

impl<T: PageItem> ScrollLoader<T> {
    pub fn new(pager: Arc<CursorPager<T>>, options: ScrollOptions) -> Self {
        ScrollLoader {
            pager,
            options,
            initial_fired: AtomicBool::new(false),
        }
    }

    pub fn pager(&self) -> &Arc<CursorPager<T>> {
        &self.pager
    }

    /// Trigger the initial load exactly once, if configured.
    ///
    /// Returns `None` when initial load is disabled or already fired.
    pub async fn ensure_initial_load(&self) -> Option<LoadOutcome> {
        if !self.options.initial_load {
            return None;
        }
        if self.initial_fired.swap(true, Ordering::SeqCst) {
            return None;
        }
        Some(self.pager.load_more().await)
    }

    /// Sentinel became visible within the configured margin.
    pub async fn on_sentinel_visible(&self) -> Option<LoadOutcome> {
        if !self.pager.has_more() || self.pager.is_loading() {
            return None;
        }
        Some(self.pager.load_more().await)
    }

    /// Fallback proximity check for hosts without a visibility observer:
    /// compares the scroll offset against the content height.
    pub async fn on_scroll(
        &self,
        scroll_offset: f64,
        viewport_height: f64,
        content_height: f64,
    ) -> Option<LoadOutcome> {
        if scroll_offset + viewport_height < content_height - self.options.threshold {
            return None;
        }
        self.on_sentinel_visible().await
    }

    /// Attach an observer binding for the current sentinel element.
    ///
    /// The binding captures the pager generation; events delivered through it
    /// after a `reset()` (or after the binding is detached when the sentinel
    /// is replaced) are ignored rather than hitting a stale pager.
    pub fn bind(self: &Arc<Self>) -> ObserverBinding<T> {
        ObserverBinding {
            loader: Arc::clone(self),
            bound_generation: self.pager.generation(),
            detached: AtomicBool::new(false),
        }
    }
}

/// Handle representing one registered sentinel observer.
pub struct ObserverBinding<T: PageItem> {
    loader: Arc<ScrollLoader<T>>,
    bound_generation: u64,
    detached: AtomicBool,
}

impl<T: PageItem> ObserverBinding<T> {
    /// Deliver a visibility event from the host observer.
    pub async fn notify_visible(&self) -> Option<LoadOutcome> {
        if self.detached.load(Ordering::SeqCst) {
            return None;
        }
        if self.loader.pager.generation() != self.bound_generation {
            // The pager was reset since this sentinel was registered.
            return None;
        }
        self.loader.on_sentinel_visible().await
    }

    /// Stop delivering events through this binding. Idempotent; also implied
    /// by drop.
    pub fn detach(&self) {
        self.detached.store(true, Ordering::SeqCst);
    }

    pub fn is_detached(&self) -> bool {
        self.detached.load(Ordering::SeqCst)
    }
}

impl<T: PageItem> Drop for ObserverBinding<T> {
    fn drop(&mut self) {
        self.detach();
    }
}
