
use encore_cache::{CacheControl, CacheRequest, CacheResponse, PrefetchScheduler};
use encore_core::{EncoreError, TrackId};
use encore_network::{BackoffCategory, BackoffController, NetworkMonitor};
use std::sync::Arc;
use std::time::Duration;
use test_helpers::*;

async fn spawn_control(
    db: &TestDb,
) -> (
    Arc<encore_cache::BlobStore>,
    encore_cache::CacheControlHandle,
    tokio::task::JoinHandle<()>,
) {
    let store = open_store(db, small_config(1_000, 10), test_clock()).await;
    let prefetcher = Arc::new(PrefetchScheduler::new(
        Arc::clone(&store),
        Arc::new(FakeMediaSource::new(8)),
        Arc::new(NetworkMonitor::default()),
        Arc::new(BackoffController::for_category(BackoffCategory::Prefetch)),
    ));
    let (handle, task) = CacheControl::spawn(Arc::clone(&store), prefetcher);
    (store, handle, task)
}

#[tokio::test]
async fn test_actor_answers_requests() {
    let db = TestDb::new().await;
    let (store, handle, _task) = spawn_control(&db).await;
    store.put(&TrackId::new("a"), vec![0; 10], None).await.unwrap();

    let cached = handle
        .request(CacheRequest::IsCached {
            ids: vec![TrackId::new("a"), TrackId::new("b")],
        })
        .await;
    assert_eq!(cached, CacheResponse::Cached { ids: vec![TrackId::new("a")] });

    match handle.request(CacheRequest::Stats).await {
        CacheResponse::Stats { stats } => {
            assert_eq!(stats.count, 1);
            assert_eq!(stats.total_bytes, 10);
        }
        other => panic!("unexpected response {other:?}"),
    }

    match handle.request(CacheRequest::ListCached).await {
        CacheResponse::Listing { entries } => assert_eq!(entries.len(), 1),
        other => panic!("unexpected response {other:?}"),
    }

    assert_eq!(
        handle.request(CacheRequest::Remove { id: TrackId::new("a") }).await,
        CacheResponse::Removed { removed: true }
    );
    assert_eq!(
        handle.request(CacheRequest::Clear).await,
        CacheResponse::Cleared { count: 0 }
    );
}

#[tokio::test]
async fn test_json_requests_are_validated() {
    let db = TestDb::new().await;
    let (_store, handle, _task) = spawn_control(&db).await;

    let response = handle.request_json(r#"{"type":"stats"}"#).await.unwrap();
    assert!(matches!(response, CacheResponse::Stats { .. }));

    let err = handle.request_json(r#"{"type":"is_cached","ids":"a"}"#).await.unwrap_err();
    assert!(matches!(err, EncoreError::InvalidMessage(_)));
}

#[tokio::test]
async fn test_prefetch_request_schedules_fetches() {
    let db = TestDb::new().await;
    let (_store, handle, _task) = spawn_control(&db).await;

    let response = handle
        .request(CacheRequest::Prefetch {
            queue: vec![TrackId::new("a"), TrackId::new("b"), TrackId::new("c")],
            current_index: 0,
            shuffle: false,
        })
        .await;

    assert_eq!(
        response,
        CacheResponse::PrefetchScheduled {
            started: vec![TrackId::new("b"), TrackId::new("c")]
        }
    );
}

#[tokio::test]
async fn test_stopped_actor_yields_fallback() {
    let db = TestDb::new().await;
    let (_store, handle, task) = spawn_control(&db).await;

    task.abort();
    let _ = task.await;

    let response = handle
        .request(CacheRequest::IsCached {
            ids: vec![TrackId::new("a")],
        })
        .await;
    assert_eq!(response, CacheResponse::Cached { ids: Vec::new() });
}

#[tokio::test]
async fn test_slow_actor_times_out_to_fallback() {
    let db = TestDb::new().await;
    let (_store, handle, _task) = spawn_control(&db).await;
    let handle = handle.with_timeout(Duration::ZERO);

    let response = handle.request(CacheRequest::Clear).await;
    assert_eq!(response, CacheResponse::Cleared { count: 0 });
}
