//! Integration tests for [`CursorPager`] and [`ScrollLoader`].
//!
//! All tests run against a hand-rolled mock page source with call counting
//! and per-call response sequences; no HTTP is involved.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use stitch_core::{Cursor, Page, PageItem};
use stitch_pager::{
    CursorPager, LoadOutcome, PageSource, ScrollLoader, ScrollOptions, SkipReason, SourceFuture,
};

#[derive(Debug, Clone, PartialEq, Eq)]
struct TestItem {
    id: u64,
    rev: u32,
}

impl TestItem {
    fn new(id: u64) -> Self {
        TestItem { id, rev: 1 }
    }
}

impl PageItem for TestItem {
    type Id = u64;

    fn identity(&self) -> u64 {
        self.id
    }
}

fn page(ids: &[(u64, u32)], next: Option<&str>, has_more: bool) -> Page<TestItem> {
    Page {
        items: ids.iter().map(|&(id, rev)| TestItem { id, rev }).collect(),
        next_cursor: next.map(Cursor::from),
        has_more,
    }
}

/// Mock page source: returns responses in order (repeating the last one),
/// counts calls, records the cursor of each call, optional per-call latency.
struct MockSource {
    /// Reversed so we can pop() from the back cheaply.
    responses: Mutex<Vec<Result<Page<TestItem>, String>>>,
    fallback: Result<Page<TestItem>, String>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    cursors_seen: Mutex<Vec<Option<String>>>,
}

impl MockSource {
    fn with_sequence(mut responses: Vec<Result<Page<TestItem>, String>>) -> Self {
        assert!(!responses.is_empty(), "sequence must have at least one response");
        responses.reverse();
        let fallback = responses.first().cloned().expect("non-empty");
        MockSource {
            responses: Mutex::new(responses),
            fallback,
            delay: None,
            calls: AtomicUsize::new(0),
            cursors_seen: Mutex::new(Vec::new()),
        }
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn cursors_seen(&self) -> Vec<Option<String>> {
        self.cursors_seen.lock().unwrap().clone()
    }
}

impl PageSource<TestItem> for MockSource {
    fn name(&self) -> &str {
        "mock"
    }

    fn fetch_page<'a>(&'a self, cursor: Option<&'a Cursor>) -> SourceFuture<'a, TestItem> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.cursors_seen
                .lock()
                .unwrap()
                .push(cursor.map(|c| c.as_str().to_string()));
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            let next = self.responses.lock().unwrap().pop();
            next.unwrap_or_else(|| self.fallback.clone())
        })
    }
}

#[tokio::test]
async fn two_pages_accumulate_with_boundary_dedup() {
    // Page boundary overlap: B appears on both pages; the later version
    // overwrites in place and the position of first occurrence is kept.
    let source = Arc::new(MockSource::with_sequence(vec![
        Ok(page(&[(1, 1), (2, 1)], Some("c1"), true)),
        Ok(page(&[(2, 2), (3, 1)], None, false)),
    ]));
    let pager = CursorPager::new(source.clone() as Arc<dyn PageSource<TestItem>>);

    assert_eq!(pager.load_more().await, LoadOutcome::Loaded { appended: 2 });
    assert_eq!(pager.load_more().await, LoadOutcome::Loaded { appended: 1 });

    let items = pager.items();
    assert_eq!(
        items,
        vec![
            TestItem::new(1),
            TestItem { id: 2, rev: 2 },
            TestItem::new(3)
        ]
    );
    assert!(!pager.has_more());
    assert_eq!(source.cursors_seen(), vec![None, Some("c1".to_string())]);

    // Exhausted: further calls never reach the source.
    assert_eq!(
        pager.load_more().await,
        LoadOutcome::Skipped(SkipReason::Exhausted)
    );
    assert_eq!(source.call_count(), 2);
}

#[tokio::test]
async fn concurrent_load_more_issues_one_fetch() {
    let source = Arc::new(
        MockSource::with_sequence(vec![Ok(page(&[(1, 1)], None, false))])
            .with_delay(Duration::from_millis(30)),
    );
    let pager = Arc::new(CursorPager::new(
        source.clone() as Arc<dyn PageSource<TestItem>>
    ));

    let (a, b) = tokio::join!(pager.load_more(), pager.load_more());

    assert_eq!(source.call_count(), 1);
    let outcomes = [a, b];
    assert!(outcomes.contains(&LoadOutcome::Loaded { appended: 1 }));
    assert!(outcomes.contains(&LoadOutcome::Skipped(SkipReason::InFlight)));
    assert_eq!(pager.len(), 1);
}

#[tokio::test]
async fn same_cursor_suppressed_within_session() {
    // The server echoes the same next cursor back; without the
    // requested-cursor record the pager would re-insert the page forever.
    let source = Arc::new(MockSource::with_sequence(vec![
        Ok(page(&[(1, 1)], Some("c1"), true)),
        Ok(page(&[(2, 1)], Some("c1"), true)),
    ]));
    let pager = CursorPager::new(source.clone() as Arc<dyn PageSource<TestItem>>);

    assert_eq!(pager.load_more().await, LoadOutcome::Loaded { appended: 1 });
    assert_eq!(pager.load_more().await, LoadOutcome::Loaded { appended: 1 });
    assert_eq!(
        pager.load_more().await,
        LoadOutcome::Skipped(SkipReason::DuplicateCursor)
    );
    assert_eq!(source.call_count(), 2);
}

#[tokio::test]
async fn reset_clears_dedup_memory() {
    let source = Arc::new(MockSource::with_sequence(vec![
        Ok(page(&[(1, 1)], None, false)),
        Ok(page(&[(9, 1)], None, false)),
    ]));
    let pager = CursorPager::new(source.clone() as Arc<dyn PageSource<TestItem>>);

    assert_eq!(pager.load_more().await, LoadOutcome::Loaded { appended: 1 });
    pager.reset();
    assert!(pager.is_empty());
    assert!(pager.has_more());

    // First-page cursor (None) is requestable again after reset.
    assert_eq!(pager.load_more().await, LoadOutcome::Loaded { appended: 1 });
    assert_eq!(source.call_count(), 2);
    assert_eq!(source.cursors_seen(), vec![None, None]);
    assert_eq!(pager.items(), vec![TestItem::new(9)]);
}

#[tokio::test]
async fn snapshot_captures_items_progress_and_error() {
    let source = Arc::new(MockSource::with_sequence(vec![
        Ok(page(&[(1, 1), (2, 1)], Some("c1"), true)),
        Err("connection reset".to_string()),
    ]));
    let pager = CursorPager::new(source.clone() as Arc<dyn PageSource<TestItem>>);

    pager.load_more().await;
    let snap = pager.snapshot();
    assert_eq!(snap.items, vec![TestItem::new(1), TestItem::new(2)]);
    assert!(snap.has_more);
    assert!(!snap.is_loading);
    assert!(snap.error.is_none());

    // A failed load keeps the accumulated items but surfaces the error.
    pager.load_more().await;
    let snap = pager.snapshot();
    assert_eq!(snap.items.len(), 2);
    assert!(snap.has_more);
    assert_eq!(snap.error.as_deref(), Some("connection reset"));
}

#[tokio::test]
async fn fetch_failure_is_retryable_from_same_cursor() {
    let source = Arc::new(MockSource::with_sequence(vec![
        Err("connection reset".to_string()),
        Ok(page(&[(1, 1)], None, false)),
    ]));
    let pager = CursorPager::new(source.clone() as Arc<dyn PageSource<TestItem>>);

    assert_eq!(pager.load_more().await, LoadOutcome::Failed);
    assert_eq!(pager.error().as_deref(), Some("connection reset"));
    assert!(pager.has_more());
    assert!(pager.is_empty());

    // Caller-initiated retry hits the same (first-page) cursor.
    assert_eq!(pager.load_more().await, LoadOutcome::Loaded { appended: 1 });
    assert!(pager.error().is_none());
    assert_eq!(source.cursors_seen(), vec![None, None]);
}

#[tokio::test]
async fn response_after_reset_is_discarded() {
    let source = Arc::new(
        MockSource::with_sequence(vec![Ok(page(&[(1, 1)], Some("c1"), true))])
            .with_delay(Duration::from_millis(40)),
    );
    let pager = Arc::new(CursorPager::new(
        source.clone() as Arc<dyn PageSource<TestItem>>
    ));

    let in_flight = {
        let pager = Arc::clone(&pager);
        tokio::spawn(async move { pager.load_more().await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    pager.reset();

    let outcome = in_flight.await.expect("task panicked");
    assert_eq!(outcome, LoadOutcome::Skipped(SkipReason::Stale));
    assert!(pager.is_empty());
    assert!(!pager.is_loading());
}

#[tokio::test]
async fn initial_load_latch_fires_once() {
    let source = Arc::new(MockSource::with_sequence(vec![Ok(page(
        &[(1, 1)],
        None,
        false,
    ))]));
    let pager = Arc::new(CursorPager::new(
        source.clone() as Arc<dyn PageSource<TestItem>>
    ));
    let loader = ScrollLoader::new(Arc::clone(&pager), ScrollOptions::default());

    // A strict-mode style doubled mount effect.
    let first = loader.ensure_initial_load().await;
    let second = loader.ensure_initial_load().await;

    assert_eq!(first, Some(LoadOutcome::Loaded { appended: 1 }));
    assert_eq!(second, None);
    assert_eq!(source.call_count(), 1);
}

#[tokio::test]
async fn initial_load_disabled_by_option() {
    let source = Arc::new(MockSource::with_sequence(vec![Ok(page(
        &[(1, 1)],
        None,
        false,
    ))]));
    let pager = Arc::new(CursorPager::new(
        source.clone() as Arc<dyn PageSource<TestItem>>
    ));
    let loader = ScrollLoader::new(
        pager,
        ScrollOptions {
            initial_load: false,
            ..ScrollOptions::default()
        },
    );

    assert_eq!(loader.ensure_initial_load().await, None);
    assert_eq!(source.call_count(), 0);
}

#[tokio::test]
async fn scroll_fallback_respects_threshold() {
    let source = Arc::new(MockSource::with_sequence(vec![Ok(page(
        &[(1, 1)],
        Some("c1"),
        true,
    ))]));
    let pager = Arc::new(CursorPager::new(
        source.clone() as Arc<dyn PageSource<TestItem>>
    ));
    let loader = ScrollLoader::new(
        pager,
        ScrollOptions {
            threshold: 200.0,
            initial_load: false,
        },
    );

    // 2000px of content, viewport 800: offset 900 is 300px from the bottom.
    assert_eq!(loader.on_scroll(900.0, 800.0, 2000.0).await, None);
    assert_eq!(source.call_count(), 0);

    // Offset 1050 brings the bottom within the 200px margin.
    assert_eq!(
        loader.on_scroll(1050.0, 800.0, 2000.0).await,
        Some(LoadOutcome::Loaded { appended: 1 })
    );
    assert_eq!(source.call_count(), 1);
}

#[tokio::test]
async fn stale_observer_binding_is_ignored() {
    let source = Arc::new(MockSource::with_sequence(vec![Ok(page(
        &[(1, 1)],
        Some("c1"),
        true,
    ))]));
    let pager = Arc::new(CursorPager::new(
        source.clone() as Arc<dyn PageSource<TestItem>>
    ));
    let loader = Arc::new(ScrollLoader::new(
        Arc::clone(&pager),
        ScrollOptions {
            initial_load: false,
            ..ScrollOptions::default()
        },
    ));

    let binding = loader.bind();
    pager.reset();

    // The binding predates the reset; its events must not reach the pager.
    assert_eq!(binding.notify_visible().await, None);
    assert_eq!(source.call_count(), 0);

    // A fresh binding for the new generation works.
    let rebound = loader.bind();
    assert_eq!(
        rebound.notify_visible().await,
        Some(LoadOutcome::Loaded { appended: 1 })
    );
    assert_eq!(source.call_count(), 1);

    rebound.detach();
    assert_eq!(rebound.notify_visible().await, None);
    assert_eq!(source.call_count(), 1);
}

#[tokio::test]
async fn sentinel_event_during_load_is_dropped_not_queued() {
    let source = Arc::new(
        MockSource::with_sequence(vec![Ok(page(&[(1, 1)], Some("c1"), true))])
            .with_delay(Duration::from_millis(30)),
    );
    let pager = Arc::new(CursorPager::new(
        source.clone() as Arc<dyn PageSource<TestItem>>
    ));
    let loader = Arc::new(ScrollLoader::new(
        Arc::clone(&pager),
        ScrollOptions {
            initial_load: false,
            ..ScrollOptions::default()
        },
    ));

    let slow = {
        let loader = Arc::clone(&loader);
        tokio::spawn(async move { loader.on_sentinel_visible().await })
    };
    tokio::time::sleep(Duration::from_millis(5)).await;
    // Second intersection event while the first fetch is still out.
    assert_eq!(loader.on_sentinel_visible().await, None);

    assert_eq!(
        slow.await.expect("task panicked"),
        Some(LoadOutcome::Loaded { appended: 1 })
    );
    assert_eq!(source.call_count(), 1);
}
