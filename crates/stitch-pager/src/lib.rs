//! Cursor-based incremental data loading.
//!
//! [`CursorPager`] fetches pages from an opaque [`PageSource`], accumulates
//! items deduplicated by identity, and guards against the double-fire races
//! that plague naive infinite-scroll implementations. [`ScrollLoader`] binds
//! a pager to host-delivered proximity signals (sentinel visibility or raw
//! scroll offsets) and owns the one-shot initial-load latch.

use std::future::Future;
use std::pin::Pin;

use stitch_core::{Cursor, Page};

mod pager;
mod scroll;

pub use pager::{CursorPager, LoadOutcome, PagerSnapshot, SkipReason};
pub use scroll::{ObserverBinding, ScrollLoader, ScrollOptions};

/// Boxed future returned by a page source.
pub type SourceFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<Page<T>, String>> + Send + 'a>>;

/// An abstract paginated data source keyed by an opaque cursor.
///
/// `None` means "first page". The HTTP calls live behind this trait; the
/// pager never sees a URL.
pub trait PageSource<T>: Send + Sync {
    /// Resource name, used only for tracing.
    fn name(&self) -> &str;

    /// Fetch the page at `cursor`.
    fn fetch_page<'a>(&'a self, cursor: Option<&'a Cursor>) -> SourceFuture<'a, T>;
}
