use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use stitch_core::{Cursor, PageItem};

use crate::PageSource;

/// Result of one [`CursorPager::load_more`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// A page was fetched and merged; `appended` counts newly inserted items
    /// (duplicates overwritten in place are not counted).
    Loaded { appended: usize },
    /// The call was a guarded no-op.
    Skipped(SkipReason),
    /// The fetch failed; the message is in [`CursorPager::error`] and the
    /// pager position is unchanged so a retry resumes from the same cursor.
    Failed,
}

/// Why a `load_more` call did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Another fetch on this pager is still in flight.
    InFlight,
    /// The source reported exhaustion; there is nothing left to load.
    Exhausted,
    /// This cursor was already requested in the current session.
    DuplicateCursor,
    /// The pager was reset while the fetch was in flight; the response was
    /// discarded.
    Stale,
}

/// Read-only view of the pager state, cheap enough to hand to a render layer.
#[derive(Debug, Clone)]
pub struct PagerSnapshot<T> {
    pub items: Vec<T>,
    pub is_loading: bool,
    pub has_more: bool,
    pub error: Option<String>,
}

struct PagerState<T: PageItem> {
    items: Vec<T>,
    index: HashMap<T::Id, usize>,
    cursor: Option<Cursor>,
    has_more: bool,
    is_loading: bool,
    error: Option<String>,
    /// Cursor tokens already sent this session (`None` = first page).
    /// Independent of `is_loading`: closes the race where two triggers issue
    /// back-to-back fetches for the same cursor (e.g. a doubled mount
    /// effect). Cleared by `reset`.
    requested: HashSet<Option<String>>,
    /// Bumped by `reset`; an in-flight response from an older generation is
    /// discarded instead of being merged into the fresh state.
    generation: u64,
}

impl<T: PageItem> PagerState<T> {
    fn fresh(generation: u64) -> Self {
        PagerState {
            items: Vec::new(),
            index: HashMap::new(),
            cursor: None,
            has_more: true,
            is_loading: false,
            error: None,
            requested: HashSet::new(),
            generation,
        }
    }
}

/// Generic cursor pager: accumulates pages from a [`PageSource`], one fetch
/// in flight at most, each cursor requested at most once per session.
///
/// Every paginated list in the client (feed home, closet, comments, replies,
/// likes, search history) is an instance of this over a different source.
pub struct CursorPager<T: PageItem> {
    source: Arc<dyn PageSource<T>>,
    state: Mutex<PagerState<T>>,
}

impl<T: PageItem> CursorPager<T> {
    pub fn new(source: Arc<dyn PageSource<T>>) -> Self {
        CursorPager {
            source,
            state: Mutex::new(PagerState::fresh(0)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PagerState<T>> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Fetch and merge the next page.
    ///
    /// Guarded no-op while a fetch is in flight, after exhaustion, or when
    /// the current cursor was already requested this session. On failure the
    /// cursor and `has_more` are left untouched and the cursor is
    /// un-recorded, so a caller-initiated retry resumes from the same point.
    /// There is no automatic retry.
    pub async fn load_more(&self) -> LoadOutcome {
        let (generation, cursor) = {
            let mut st = self.lock();
            if st.is_loading {
                return LoadOutcome::Skipped(SkipReason::InFlight);
            }
            if !st.has_more {
                return LoadOutcome::Skipped(SkipReason::Exhausted);
            }
            let key = st.cursor.as_ref().map(|c| c.as_str().to_string());
            if !st.requested.insert(key) {
                return LoadOutcome::Skipped(SkipReason::DuplicateCursor);
            }
            st.is_loading = true;
            st.error = None;
            (st.generation, st.cursor.clone())
        };

        let result = self.source.fetch_page(cursor.as_ref()).await;

        let mut st = self.lock();
        if st.generation != generation {
            // Reset happened while the fetch was out; drop the response.
            tracing::debug!(source = self.source.name(), "discarding stale page response");
            return LoadOutcome::Skipped(SkipReason::Stale);
        }
        st.is_loading = false;

        match result {
            Ok(page) => {
                let mut appended = 0usize;
                let exhausted = page.exhausted();
                for item in page.items {
                    let id = item.identity();
                    match st.index.get(&id) {
                        // Adjacent pages can overlap under concurrent server
                        // writes; the newest version wins but keeps the
                        // position of its first occurrence.
                        Some(&pos) => st.items[pos] = item,
                        None => {
                            let pos = st.items.len();
                            st.index.insert(id, pos);
                            st.items.push(item);
                            appended += 1;
                        }
                    }
                }
                st.has_more = !exhausted;
                st.cursor = page.next_cursor;
                tracing::debug!(
                    source = self.source.name(),
                    appended,
                    total = st.items.len(),
                    has_more = st.has_more,
                    "merged page"
                );
                LoadOutcome::Loaded { appended }
            }
            Err(message) => {
                // Allow the same cursor to be retried.
                let key = cursor.as_ref().map(|c| c.as_str().to_string());
                st.requested.remove(&key);
                tracing::warn!(source = self.source.name(), error = %message, "page fetch failed");
                st.error = Some(message);
                LoadOutcome::Failed
            }
        }
    }

    /// Clear accumulation and session memory; the next `load_more` starts
    /// from the first page. An in-flight fetch is not aborted, but its
    /// response will be discarded.
    pub fn reset(&self) {
        let mut st = self.lock();
        let next_gen = st.generation + 1;
        *st = PagerState::fresh(next_gen);
    }

    /// Reset, then load the first page.
    pub async fn refresh(&self) -> LoadOutcome {
        self.reset();
        self.load_more().await
    }

    pub fn is_loading(&self) -> bool {
        self.lock().is_loading
    }

    pub fn has_more(&self) -> bool {
        self.lock().has_more
    }

    pub fn error(&self) -> Option<String> {
        self.lock().error.clone()
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().items.is_empty()
    }

    pub(crate) fn generation(&self) -> u64 {
        self.lock().generation
    }
}

impl<T: PageItem + Clone> CursorPager<T> {
    /// Accumulated items in server order.
    pub fn items(&self) -> Vec<T> {
        self.lock().items.clone()
    }

    pub fn snapshot(&self) -> PagerSnapshot<T> {
        let st = self.lock();
        PagerSnapshot {
            items: st.items.clone(),
            is_loading: st.is_loading,
            has_more: st.has_more,
            error: st.error.clone(),
        }
    }
}
