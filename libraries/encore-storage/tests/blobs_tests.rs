
use encore_core::TrackId;
use encore_storage::blobs;
use test_helpers::*;

#[tokio::test]
async fn test_put_then_get_returns_payload_and_records_access() {
    let db = TestDb::new().await;
    insert_blob(db.pool(), "a", 128, base_time()).await;

    let blob = blobs::get(db.pool(), &TrackId::new("a"), minutes_after_base(5))
        .await
        .unwrap()
        .expect("blob should exist");

    assert_eq!(blob.payload.len(), 128);
    assert_eq!(blob.size_bytes, 128);
    assert_eq!(blob.access_count, 1);
    assert_eq!(blob.cached_at, base_time());
    assert_eq!(blob.last_accessed_at, minutes_after_base(5));

    let again = blobs::get(db.pool(), &TrackId::new("a"), minutes_after_base(6))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(again.access_count, 2);
}

#[tokio::test]
async fn test_get_missing_returns_none() {
    let db = TestDb::new().await;

    let blob = blobs::get(db.pool(), &TrackId::new("nope"), base_time())
        .await
        .unwrap();

    assert!(blob.is_none());
    assert!(!blobs::exists(db.pool(), &TrackId::new("nope")).await.unwrap());
}

#[tokio::test]
async fn test_put_replaces_existing_entry() {
    let db = TestDb::new().await;
    insert_blob(db.pool(), "a", 10, base_time()).await;
    insert_blob(db.pool(), "a", 25, minutes_after_base(1)).await;

    let stats = blobs::stats(db.pool()).await.unwrap();
    assert_eq!(stats.count, 1);
    assert_eq!(stats.total_bytes, 25);

    let metadata = blobs::list_metadata(db.pool()).await.unwrap();
    assert_eq!(metadata.len(), 1);
    assert_eq!(metadata[0].size_bytes, 25);
}

#[tokio::test]
async fn test_delete_removes_blob_and_metadata() {
    let db = TestDb::new().await;
    insert_blob(db.pool(), "a", 10, base_time()).await;

    assert!(blobs::delete(db.pool(), &TrackId::new("a")).await.unwrap());
    assert!(!blobs::delete(db.pool(), &TrackId::new("a")).await.unwrap());

    assert!(blobs::list_metadata(db.pool()).await.unwrap().is_empty());
    assert_eq!(blobs::stats(db.pool()).await.unwrap().count, 0);
}

#[tokio::test]
async fn test_list_by_recency_orders_least_recent_first() {
    let db = TestDb::new().await;
    insert_blob(db.pool(), "a", 10, base_time()).await;
    insert_blob(db.pool(), "b", 10, minutes_after_base(1)).await;
    insert_blob(db.pool(), "c", 10, minutes_after_base(2)).await;

    // Reading "a" makes it the most recent
    blobs::get(db.pool(), &TrackId::new("a"), minutes_after_base(10))
        .await
        .unwrap();

    let order: Vec<String> = blobs::list_by_recency(db.pool())
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.id.as_str().to_string())
        .collect();

    assert_eq!(order, vec!["b", "c", "a"]);
}

#[tokio::test]
async fn test_access_keeps_cached_at() {
    let db = TestDb::new().await;
    insert_blob(db.pool(), "old", 10, base_time()).await;

    // Access does not refresh staleness
    blobs::get(db.pool(), &TrackId::new("old"), minutes_after_base(120))
        .await
        .unwrap();

    let entries = blobs::list_by_recency(db.pool()).await.unwrap();
    assert_eq!(entries[0].cached_at, base_time());
    assert_eq!(entries[0].last_accessed_at, minutes_after_base(120));
}

#[tokio::test]
async fn test_stats_reports_oldest_entry() {
    let db = TestDb::new().await;

    let empty = blobs::stats(db.pool()).await.unwrap();
    assert_eq!(empty.count, 0);
    assert_eq!(empty.total_bytes, 0);
    assert!(empty.oldest_cached_at.is_none());

    insert_blob(db.pool(), "a", 30, minutes_after_base(5)).await;
    insert_blob(db.pool(), "b", 70, base_time()).await;

    let stats = blobs::stats(db.pool()).await.unwrap();
    assert_eq!(stats.count, 2);
    assert_eq!(stats.total_bytes, 100);
    assert_eq!(stats.oldest_cached_at, Some(base_time()));
}

#[tokio::test]
async fn test_clear_removes_everything() {
    let db = TestDb::new().await;
    insert_blob(db.pool(), "a", 10, base_time()).await;
    insert_blob(db.pool(), "b", 10, base_time()).await;

    assert_eq!(blobs::clear(db.pool()).await.unwrap(), 2);
    assert!(blobs::all_ids(db.pool()).await.unwrap().is_empty());
    assert!(blobs::list_metadata(db.pool()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_list_metadata_newest_first() {
    let db = TestDb::new().await;
    insert_blob(db.pool(), "a", 10, base_time()).await;
    insert_blob(db.pool(), "b", 10, minutes_after_base(1)).await;

    let metadata = blobs::list_metadata(db.pool()).await.unwrap();
    assert_eq!(metadata[0].id, TrackId::new("b"));
    assert_eq!(metadata[0].title, "Track b");
    assert_eq!(metadata[1].id, TrackId::new("a"));
}
