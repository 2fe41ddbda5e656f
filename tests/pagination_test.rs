//! Paginator adapter and paged view behaviour against a fake cursor source

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chain_explorer::domain::QueryIdentity;
use chain_explorer::pagination::{
    Direction, FetchOutcome, InitOutcome, PaginatedData, PaginatorAdapter,
};
use chain_explorer::ExplorerError;

use common::{items, FakeSource};

const PAGE_SIZE: usize = 10;

fn identity(account: &str) -> QueryIdentity {
    QueryIdentity::new("tokens").with("aa11").with(account)
}

async fn loaded(source: &Arc<FakeSource>, id: &QueryIdentity) -> PaginatorAdapter<u32> {
    let adapter = PaginatorAdapter::new(PAGE_SIZE);
    let outcome = adapter
        .initialize(id, || Arc::clone(source).fetch(0))
        .await
        .expect("first page loads");
    assert_eq!(outcome, InitOutcome::Loaded);
    adapter
}

#[tokio::test]
async fn test_page_size_ten_scenario() {
    let source = FakeSource::new(vec![items(0, 10), items(10, 4)]);
    let adapter = loaded(&source, &identity("alice")).await;

    // 1. First page: full, so there may be more
    let view = adapter.view().await;
    assert_eq!(view.items.len(), 10);
    assert_eq!(view.page, Some(1));
    assert!(view.has_more);
    assert!(!view.has_previous);

    // 2. Second page: short, so it is the last one
    assert_eq!(adapter.fetch_next().await.unwrap(), FetchOutcome::Fetched);
    let view = adapter.view().await;
    assert_eq!(view.items, items(10, 4));
    assert_eq!(view.page, Some(2));
    assert!(!view.has_more);
    assert!(view.has_previous);

    // 3. Back to the cached first page without a fetch
    assert_eq!(adapter.fetch_previous().await, FetchOutcome::Cached);
    let view = adapter.view().await;
    assert_eq!(view.items, items(0, 10));
    assert_eq!(view.page, Some(1));
    assert_eq!(source.calls(), 2);
}

#[tokio::test]
async fn test_forward_then_back_returns_to_first_page() {
    let source = FakeSource::new(vec![items(0, 10), items(10, 10), items(20, 10), items(30, 3)]);
    let adapter = loaded(&source, &identity("alice")).await;
    let initial = adapter.view().await;

    for steps in 1..=3 {
        for _ in 0..steps {
            adapter.fetch_next().await.unwrap();
        }
        for _ in 0..steps {
            adapter.fetch_previous().await;
        }
        assert_eq!(adapter.view().await, initial, "after {} steps", steps);
    }

    // every page was fetched exactly once
    assert_eq!(source.calls(), 4);
    assert_eq!(adapter.page_count().await, 4);
}

#[tokio::test]
async fn test_previous_on_first_page_is_noop() {
    let source = FakeSource::new(vec![items(0, 10), items(10, 10)]);
    let adapter = loaded(&source, &identity("alice")).await;

    assert_eq!(adapter.fetch_previous().await, FetchOutcome::Skipped);
    assert_eq!(adapter.page_index().await, Some(1));
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_next_fetches_once() {
    let source = FakeSource::slow(vec![items(0, 10), items(10, 10), items(20, 10)], Duration::from_millis(50));
    let adapter = loaded(&source, &identity("alice")).await;

    let (first, second) = tokio::join!(adapter.fetch_next(), adapter.fetch_next());
    let mut outcomes = vec![first.unwrap(), second.unwrap()];
    outcomes.sort_by_key(|outcome| *outcome == FetchOutcome::Fetched);

    assert_eq!(outcomes, vec![FetchOutcome::Skipped, FetchOutcome::Fetched]);
    assert_eq!(source.calls(), 2);
    assert_eq!(adapter.page_index().await, Some(2));
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_initialize_is_busy() {
    let source = FakeSource::slow(vec![items(0, 10)], Duration::from_millis(50));
    let adapter = PaginatorAdapter::new(PAGE_SIZE);
    let id = identity("alice");

    let (first, second) = tokio::join!(
        adapter.initialize(&id, || Arc::clone(&source).fetch(0)),
        adapter.initialize(&id, || Arc::clone(&source).fetch(0)),
    );

    assert_eq!(first.unwrap(), InitOutcome::Loaded);
    assert_eq!(second.unwrap(), InitOutcome::Busy);
    assert_eq!(source.calls(), 1);
}

#[tokio::test]
async fn test_initialize_loaded_identity_is_cached() {
    let source = FakeSource::new(vec![items(0, 10), items(10, 10)]);
    let id = identity("alice");
    let adapter = loaded(&source, &id).await;
    adapter.fetch_next().await.unwrap();

    let outcome = adapter
        .initialize(&id, || Arc::clone(&source).fetch(0))
        .await
        .unwrap();
    assert_eq!(outcome, InitOutcome::Cached);
    assert_eq!(adapter.page_index().await, Some(2));
    assert_eq!(adapter.page_count().await, 2);
    assert_eq!(source.calls(), 2);

    // an explicit reset reloads from page 1
    adapter.reset().await;
    let outcome = adapter
        .initialize(&id, || Arc::clone(&source).fetch(0))
        .await
        .unwrap();
    assert_eq!(outcome, InitOutcome::Loaded);
    assert_eq!(adapter.page_index().await, Some(1));
    assert_eq!(source.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_fetch_next_can_be_retried() {
    let source = FakeSource::slow(vec![items(0, 10), items(10, 10)], Duration::from_millis(100));
    let adapter = loaded(&source, &identity("alice")).await;

    let cancelled = tokio::time::timeout(Duration::from_millis(10), adapter.fetch_next()).await;
    assert!(cancelled.is_err());
    assert!(!adapter.is_loading().await);
    assert_eq!(adapter.page_index().await, Some(1));

    assert_eq!(adapter.fetch_next().await.unwrap(), FetchOutcome::Fetched);
    assert_eq!(adapter.view().await.items, items(10, 10));
    assert_eq!(source.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_initialize_can_be_retried() {
    let source = FakeSource::slow(vec![items(0, 10)], Duration::from_millis(100));
    let adapter = PaginatorAdapter::new(PAGE_SIZE);
    let id = identity("alice");

    let cancelled = tokio::time::timeout(
        Duration::from_millis(10),
        adapter.initialize(&id, || Arc::clone(&source).fetch(0)),
    )
    .await;
    assert!(cancelled.is_err());
    assert!(!adapter.is_loading().await);

    let outcome = adapter
        .initialize(&id, || Arc::clone(&source).fetch(0))
        .await
        .unwrap();
    assert_eq!(outcome, InitOutcome::Loaded);
    assert_eq!(adapter.page_index().await, Some(1));
    assert_eq!(source.calls(), 2);
}

#[tokio::test]
async fn test_identity_change_resets() {
    let source = FakeSource::new(vec![items(0, 10), items(10, 10), items(20, 10), items(30, 10)]);
    let adapter = loaded(&source, &identity("alice")).await;
    adapter.fetch_next().await.unwrap();
    adapter.fetch_next().await.unwrap();
    assert_eq!(adapter.page_index().await, Some(3));
    let before = adapter.generation().await;

    // 1. New identity drops everything
    assert!(adapter.set_identity(&identity("bob")).await);
    assert_eq!(adapter.page_count().await, 0);
    assert_eq!(adapter.page_index().await, None);
    assert!(!adapter.is_last_page().await);
    assert!(!adapter.has_more().await);
    assert!(adapter.generation().await > before);

    // 2. Same identity again is not a change
    assert!(!adapter.set_identity(&identity("bob")).await);

    // 3. Fresh start at page 1
    let other = FakeSource::new(vec![items(100, 5)]);
    let outcome = adapter
        .initialize(&identity("bob"), || Arc::clone(&other).fetch(0))
        .await
        .unwrap();
    assert_eq!(outcome, InitOutcome::Loaded);
    assert_eq!(adapter.page_index().await, Some(1));
    assert_eq!(adapter.view().await.items, items(100, 5));
}

#[tokio::test]
async fn test_last_page_detection() {
    // exactly page_size: not last
    let source = FakeSource::new(vec![items(0, 10), items(10, 9)]);
    let adapter = loaded(&source, &identity("alice")).await;
    assert!(!adapter.is_last_page().await);

    // fewer than page_size: last, and further fetches never happen
    adapter.fetch_next().await.unwrap();
    assert!(adapter.is_last_page().await);
    for _ in 0..3 {
        assert_eq!(adapter.fetch_next().await.unwrap(), FetchOutcome::Skipped);
    }
    assert_eq!(source.calls(), 2);
    assert_eq!(adapter.page_index().await, Some(2));
}

#[tokio::test]
async fn test_empty_first_page_is_last() {
    let source = FakeSource::new(vec![Vec::new(), items(0, 10)]);
    let adapter = loaded(&source, &identity("alice")).await;

    assert!(adapter.is_last_page().await);
    assert!(!adapter.has_more().await);
    assert_eq!(adapter.fetch_next().await.unwrap(), FetchOutcome::Skipped);
    assert_eq!(source.calls(), 1);
}

#[tokio::test]
async fn test_full_last_page_costs_one_extra_fetch() {
    // source holds exactly two full pages, then an empty one
    let source = FakeSource::new(vec![items(0, 10), items(10, 10), Vec::new()]);
    let adapter = loaded(&source, &identity("alice")).await;

    adapter.fetch_next().await.unwrap();
    assert!(adapter.has_more().await);

    assert_eq!(adapter.fetch_next().await.unwrap(), FetchOutcome::Fetched);
    assert!(adapter.is_last_page().await);
    assert!(adapter.view().await.items.is_empty());
    assert_eq!(source.calls(), 3);
}

#[tokio::test]
async fn test_exhausted_cursor_marks_last_page() {
    // a full page with no continuation
    let source = FakeSource::new(vec![items(0, 10)]);
    let adapter = loaded(&source, &identity("alice")).await;
    assert!(adapter.has_more().await);

    assert_eq!(adapter.fetch_next().await.unwrap(), FetchOutcome::Skipped);
    assert!(adapter.is_last_page().await);
    assert_eq!(adapter.page_index().await, Some(1));
    assert_eq!(source.calls(), 1);
}

#[tokio::test]
async fn test_not_ready_identity_skips_fetch() {
    let source = FakeSource::new(vec![items(0, 10)]);
    let adapter = PaginatorAdapter::new(PAGE_SIZE);
    let pending = QueryIdentity::new("tokens").with("aa11").with_opt(None::<String>);

    let outcome = adapter
        .initialize(&pending, || Arc::clone(&source).fetch(0))
        .await
        .unwrap();

    assert_eq!(outcome, InitOutcome::NotReady);
    assert_eq!(source.calls(), 0);
    let view = adapter.view().await;
    assert!(view.items.is_empty());
    assert!(view.error.is_none());
    assert_eq!(view.page, None);
}

#[tokio::test(start_paused = true)]
async fn test_stale_first_page_is_discarded() {
    let slow = FakeSource::slow(vec![items(0, 10)], Duration::from_millis(100));
    let adapter = PaginatorAdapter::new(PAGE_SIZE);
    let x = identity("alice");
    let y = identity("bob");

    let (outcome, _) = tokio::join!(adapter.initialize(&x, || Arc::clone(&slow).fetch(0)), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        adapter.set_identity(&y).await
    });

    assert_eq!(outcome.unwrap(), InitOutcome::Stale);
    let view = adapter.view().await;
    assert_eq!(view.identity, Some(y));
    assert!(view.items.is_empty());
    assert_eq!(view.page, None);
}

#[tokio::test(start_paused = true)]
async fn test_stale_next_page_is_discarded() {
    let slow = FakeSource::slow(vec![items(0, 10), items(10, 10)], Duration::from_millis(100));
    let adapter = loaded(&slow, &identity("alice")).await;
    let fresh = FakeSource::new(vec![items(500, 3)]);
    let y = identity("bob");

    let (outcome, _) = tokio::join!(adapter.fetch_next(), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        adapter.set_identity(&y).await;
        adapter
            .initialize(&y, || Arc::clone(&fresh).fetch(0))
            .await
            .unwrap()
    });

    assert_eq!(outcome.unwrap(), FetchOutcome::Stale);
    let view = adapter.view().await;
    assert_eq!(view.items, items(500, 3));
    assert_eq!(view.page, Some(1));
    assert_eq!(adapter.page_count().await, 1);
}

#[tokio::test]
async fn test_fetch_failure_keeps_state() {
    let source = FakeSource::failing_at(vec![items(0, 10), items(10, 10)], 1);
    let adapter = loaded(&source, &identity("alice")).await;

    let err = adapter.fetch_next().await.unwrap_err();
    assert!(matches!(err, ExplorerError::Fetch(_)));

    let view = adapter.view().await;
    assert_eq!(view.items, items(0, 10));
    assert_eq!(view.page, Some(1));
    assert!(!view.has_more);
    assert!(view.error.unwrap().contains("node unavailable"));

    // forward navigation stays disabled
    assert_eq!(adapter.fetch_next().await.unwrap(), FetchOutcome::Skipped);
    assert_eq!(source.calls(), 2);
}

#[tokio::test]
async fn test_first_page_failure_is_returned() {
    let source = FakeSource::failing_at(vec![items(0, 10)], 0);
    let adapter = PaginatorAdapter::<u32>::new(PAGE_SIZE);

    let err = adapter
        .initialize(&identity("alice"), || Arc::clone(&source).fetch(0))
        .await
        .unwrap_err();

    assert!(matches!(err, ExplorerError::Fetch(_)));
    assert!(adapter.is_last_page().await);
    assert!(adapter.error().await.is_some());
    assert_eq!(adapter.page_index().await, None);
}

// ---- paged view ----

fn doubled_view(source: Arc<FakeSource>, transforms: Arc<AtomicUsize>) -> PaginatedData<u32, u64> {
    PaginatedData::new(
        identity("alice"),
        PAGE_SIZE,
        move |_page_size| Arc::clone(&source).fetch(0),
        move |item| {
            let transforms = Arc::clone(&transforms);
            async move {
                transforms.fetch_add(1, Ordering::SeqCst);
                u64::from(item) * 2
            }
        },
    )
}

#[tokio::test]
async fn test_paged_view_transforms_each_page_once() {
    let source = FakeSource::new(vec![items(0, 10), items(10, 4)]);
    let transforms = Arc::new(AtomicUsize::new(0));
    let view = doubled_view(Arc::clone(&source), Arc::clone(&transforms));

    assert_eq!(view.page().await, 1);
    assert!(view.items().await.is_empty());

    view.load_initial_page().await.unwrap();
    assert_eq!(view.items().await[..3], [0, 2, 4]);
    assert!(view.has_more().await);

    view.load_page(Direction::Next).await.unwrap();
    assert_eq!(view.items().await, vec![20, 22, 24, 26]);
    assert_eq!(view.page().await, 2);
    assert!(!view.has_more().await);

    view.load_page(Direction::Previous).await.unwrap();
    view.load_page(Direction::Next).await.unwrap();
    view.load_page(Direction::Previous).await.unwrap();

    assert_eq!(view.page().await, 1);
    assert_eq!(view.items().await.len(), 10);
    assert_eq!(transforms.load(Ordering::SeqCst), 14);
    assert_eq!(source.calls(), 2);
    assert!(!view.is_loading());
}

#[tokio::test]
async fn test_paged_view_identity_change_clears_items() {
    let source = FakeSource::new(vec![items(0, 10), items(10, 10)]);
    let view = doubled_view(Arc::clone(&source), Arc::new(AtomicUsize::new(0)));
    view.load_initial_page().await.unwrap();
    view.load_page(Direction::Next).await.unwrap();

    assert!(view.set_identity(identity("bob")).await);
    assert!(view.items().await.is_empty());
    assert_eq!(view.page().await, 1);
    assert!(view.error().await.is_none());

    view.load_initial_page().await.unwrap();
    assert_eq!(view.items().await[0], 0);
    assert_eq!(view.adapter().page_count().await, 1);
}

#[tokio::test(start_paused = true)]
async fn test_paged_view_identity_change_during_first_load() {
    let source = FakeSource::slow(vec![items(0, 10)], Duration::from_millis(100));
    let view = doubled_view(Arc::clone(&source), Arc::new(AtomicUsize::new(0)));

    let (first, second) = tokio::join!(view.load_initial_page(), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        view.set_identity(identity("bob")).await;
        view.load_initial_page().await
    });
    first.unwrap();
    second.unwrap();

    // bob's load was not swallowed by alice's outstanding one
    assert_eq!(source.calls(), 2);
    assert_eq!(view.page().await, 1);
    assert_eq!(view.items().await.len(), 10);
    assert_eq!(view.adapter().view().await.identity, Some(identity("bob")));
    assert!(!view.is_loading());
}

#[tokio::test(start_paused = true)]
async fn test_paged_view_cancelled_load_can_be_retried() {
    let source = FakeSource::slow(vec![items(0, 10), items(10, 10)], Duration::from_millis(100));
    let view = doubled_view(Arc::clone(&source), Arc::new(AtomicUsize::new(0)));
    view.load_initial_page().await.unwrap();

    let cancelled =
        tokio::time::timeout(Duration::from_millis(10), view.load_page(Direction::Next)).await;
    assert!(cancelled.is_err());
    assert!(!view.is_loading());
    assert_eq!(view.page().await, 1);

    view.load_page(Direction::Next).await.unwrap();
    assert_eq!(view.page().await, 2);
    assert_eq!(view.items().await[0], 20);
    assert_eq!(source.calls(), 3);
}

#[tokio::test]
async fn test_paged_view_failed_next_keeps_items() {
    let source = FakeSource::failing_at(vec![items(0, 10), items(10, 10)], 1);
    let view = doubled_view(Arc::clone(&source), Arc::new(AtomicUsize::new(0)));
    view.load_initial_page().await.unwrap();
    let before = view.items().await;

    let err = view.load_page(Direction::Next).await.unwrap_err();
    assert!(matches!(err, ExplorerError::Fetch(_)));

    assert_eq!(view.items().await, before);
    assert_eq!(view.page().await, 1);
    assert!(!view.has_more().await);
    assert!(view.error().await.unwrap().contains("node unavailable"));
    assert!(!view.is_loading());
}

#[tokio::test]
async fn test_paged_view_reload_is_cached() {
    let source = FakeSource::new(vec![items(0, 10), items(10, 10)]);
    let transforms = Arc::new(AtomicUsize::new(0));
    let view = doubled_view(Arc::clone(&source), Arc::clone(&transforms));

    view.load_initial_page().await.unwrap();
    view.load_initial_page().await.unwrap();

    assert_eq!(source.calls(), 1);
    assert_eq!(transforms.load(Ordering::SeqCst), 10);
    assert_eq!(view.items().await.len(), 10);
}
