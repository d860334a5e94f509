
use encore_cache::{CacheEvent, EvictionReason};
use encore_core::{Clock, TrackDetails, TrackId};
use std::sync::Arc;
use test_helpers::*;

#[tokio::test]
async fn test_put_get_round_trip_updates_recency() {
    let db = TestDb::new().await;
    let clock = test_clock();
    let store = open_store(&db, small_config(1_000, 10), clock.clone()).await;
    let id = TrackId::new("a");
    let payload: Vec<u8> = (0..=255).collect();

    assert!(store.put(&id, payload.clone(), None).await.unwrap());
    assert!(store.contains(&id));
    assert!(store.has(&id).await.unwrap());

    clock.advance(chrono::Duration::minutes(3));
    let blob = store.get(&id).await.unwrap().unwrap();

    assert_eq!(blob.payload, payload);
    assert_eq!(blob.access_count, 1);
    assert_eq!(blob.last_accessed_at, clock.now());
    assert!(blob.last_accessed_at > blob.cached_at);
}

#[tokio::test]
async fn test_title_falls_back_to_track_id() {
    let db = TestDb::new().await;
    let store = open_store(&db, small_config(1_000, 10), test_clock()).await;

    store.put(&TrackId::new("plain"), vec![1; 10], None).await.unwrap();
    store
        .put(
            &TrackId::new("named"),
            vec![1; 10],
            Some(TrackDetails {
                title: "Song".to_string(),
                artist: Some("Band".to_string()),
                duration_seconds: Some(61.0),
            }),
        )
        .await
        .unwrap();

    let listing = store.list_metadata().await.unwrap();
    let plain = listing.iter().find(|m| m.id == TrackId::new("plain")).unwrap();
    let named = listing.iter().find(|m| m.id == TrackId::new("named")).unwrap();
    assert_eq!(plain.title, "plain");
    assert_eq!(named.title, "Song");
    assert_eq!(named.artist.as_deref(), Some("Band"));
}

#[tokio::test]
async fn test_insert_evicts_until_enough_room() {
    // max 100 bytes, A=30 then B=60 (LRU order), inserting 40 evicts both
    let db = TestDb::new().await;
    let clock = test_clock();
    let store = open_store(&db, small_config(100, 50), clock.clone()).await;

    store.put(&TrackId::new("A"), vec![0; 30], None).await.unwrap();
    clock.advance(chrono::Duration::seconds(1));
    store.put(&TrackId::new("B"), vec![0; 60], None).await.unwrap();
    clock.advance(chrono::Duration::seconds(1));

    assert!(store.put(&TrackId::new("N"), vec![0; 40], None).await.unwrap());

    assert_eq!(cached_ids(&store), vec!["N"]);
    let stats = store.stats().await.unwrap();
    assert_eq!(stats.count, 1);
    assert_eq!(stats.total_bytes, 40);
}

#[tokio::test]
async fn test_least_recently_used_is_evicted_first() {
    let db = TestDb::new().await;
    let clock = test_clock();
    let store = open_store(&db, small_config(90, 50), clock.clone()).await;

    for id in ["A", "B", "C"] {
        store.put(&TrackId::new(id), vec![0; 30], None).await.unwrap();
        clock.advance(chrono::Duration::seconds(1));
    }

    assert!(store.put(&TrackId::new("D"), vec![0; 30], None).await.unwrap());
    assert_eq!(cached_ids(&store), vec!["B", "C", "D"]);
}

#[tokio::test]
async fn test_reading_an_entry_protects_it() {
    let db = TestDb::new().await;
    let clock = test_clock();
    let store = open_store(&db, small_config(90, 50), clock.clone()).await;

    for id in ["A", "B", "C"] {
        store.put(&TrackId::new(id), vec![0; 30], None).await.unwrap();
        clock.advance(chrono::Duration::seconds(1));
    }
    store.get(&TrackId::new("A")).await.unwrap();
    clock.advance(chrono::Duration::seconds(1));

    store.put(&TrackId::new("D"), vec![0; 30], None).await.unwrap();
    assert_eq!(cached_ids(&store), vec!["A", "C", "D"]);
}

#[tokio::test]
async fn test_entry_count_quota() {
    let db = TestDb::new().await;
    let clock = test_clock();
    let store = open_store(&db, small_config(10_000, 2), clock.clone()).await;

    for id in ["A", "B", "C"] {
        assert!(store.put(&TrackId::new(id), vec![0; 5], None).await.unwrap());
        clock.advance(chrono::Duration::seconds(1));
    }

    assert_eq!(cached_ids(&store), vec!["B", "C"]);
}

#[tokio::test]
async fn test_oversized_payload_rejected_without_eviction() {
    let db = TestDb::new().await;
    let store = open_store(&db, small_config(100, 50), test_clock()).await;
    store.put(&TrackId::new("A"), vec![0; 50], None).await.unwrap();

    assert!(!store.put(&TrackId::new("huge"), vec![0; 101], None).await.unwrap());

    assert_eq!(cached_ids(&store), vec!["A"]);
    assert!(!store.has(&TrackId::new("huge")).await.unwrap());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_puts_share_the_freed_budget() {
    let db = TestDb::new().await;
    let store = open_store(&db, small_config(100, 3), test_clock()).await;
    store.put(&TrackId::new("seed"), vec![0; 50], None).await.unwrap();

    let writers: Vec<_> = (0..6u8)
        .map(|n| {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                store
                    .put(&TrackId::new(format!("t{n}")), vec![n; 40], None)
                    .await
                    .unwrap()
            })
        })
        .collect();
    for writer in writers {
        assert!(writer.await.unwrap());
    }

    let stats = store.stats().await.unwrap();
    assert!(stats.total_bytes <= 100, "cache holds {} bytes", stats.total_bytes);
    assert!(stats.count <= 3, "cache holds {} entries", stats.count);
    assert_eq!(store.ids().len() as u64, stats.count);
}

#[tokio::test]
async fn test_replacing_an_entry_does_not_count_it_twice() {
    let db = TestDb::new().await;
    let clock = test_clock();
    let store = open_store(&db, small_config(100, 1), clock.clone()).await;

    store.put(&TrackId::new("A"), vec![0; 60], None).await.unwrap();
    clock.advance(chrono::Duration::seconds(1));

    assert!(store.put(&TrackId::new("A"), vec![1; 70], None).await.unwrap());
    let stats = store.stats().await.unwrap();
    assert_eq!(stats.count, 1);
    assert_eq!(stats.total_bytes, 70);
}

#[tokio::test]
async fn test_stale_sweep_removes_old_entries_regardless_of_pressure() {
    let db = TestDb::new().await;
    let clock = test_clock();
    let store = open_store(&db, small_config(1_000_000, 50), clock.clone()).await;

    store.put(&TrackId::new("old"), vec![0; 10], None).await.unwrap();
    clock.advance(chrono::Duration::days(6));
    store.put(&TrackId::new("young"), vec![0; 10], None).await.unwrap();
    clock.advance(chrono::Duration::days(1) + chrono::Duration::seconds(1));

    // Reads do not refresh staleness
    store.get(&TrackId::new("old")).await.unwrap();

    let report = store.cleanup_stale().await;

    assert_eq!(report.evicted, vec![TrackId::new("old")]);
    assert_eq!(report.freed_bytes, 10);
    assert_eq!(cached_ids(&store), vec!["young"]);
}

#[tokio::test]
async fn test_pressure_pass_also_drops_stale_entries() {
    let db = TestDb::new().await;
    let clock = test_clock();
    let store = open_store(&db, small_config(100, 50), clock.clone()).await;

    store.put(&TrackId::new("fresh"), vec![0; 40], None).await.unwrap();
    store.get(&TrackId::new("fresh")).await.unwrap();
    clock.advance(chrono::Duration::seconds(1));
    store.put(&TrackId::new("ancient"), vec![0; 40], None).await.unwrap();
    clock.advance(chrono::Duration::days(8));
    store.get(&TrackId::new("ancient")).await.unwrap();
    store.put(&TrackId::new("keep"), vec![0; 10], None).await.unwrap();

    // "fresh" is also old by now; everything cached 8 days ago is stale
    store.put(&TrackId::new("new"), vec![0; 20], None).await.unwrap();

    assert_eq!(cached_ids(&store), vec!["keep", "new"]);
}

#[tokio::test]
async fn test_index_rebuilt_on_open() {
    let db = TestDb::new().await;
    let clock = test_clock();
    {
        let store = open_store(&db, small_config(1_000, 10), clock.clone()).await;
        store.put(&TrackId::new("a"), vec![0; 10], None).await.unwrap();
        store.put(&TrackId::new("b"), vec![0; 10], None).await.unwrap();
    }

    let reopened = open_store(&db, small_config(1_000, 10), clock).await;
    assert_eq!(cached_ids(&reopened), vec!["a", "b"]);
}

#[tokio::test]
async fn test_remove_and_clear_keep_index_consistent() {
    let db = TestDb::new().await;
    let store = open_store(&db, small_config(1_000, 10), test_clock()).await;
    for id in ["a", "b", "c"] {
        store.put(&TrackId::new(id), vec![0; 10], None).await.unwrap();
    }

    assert!(store.remove(&TrackId::new("a")).await.unwrap());
    assert!(!store.remove(&TrackId::new("a")).await.unwrap());
    assert!(!store.contains(&TrackId::new("a")));

    assert_eq!(store.clear().await.unwrap(), 2);
    assert!(store.ids().is_empty());
    assert_eq!(store.stats().await.unwrap().count, 0);
}

#[tokio::test]
async fn test_events_are_published() {
    let db = TestDb::new().await;
    let clock = test_clock();
    let store = open_store(&db, small_config(50, 10), clock.clone()).await;
    let mut events = store.subscribe();

    store.put(&TrackId::new("a"), vec![0; 30], None).await.unwrap();
    clock.advance(chrono::Duration::seconds(1));
    store.put(&TrackId::new("b"), vec![0; 30], None).await.unwrap();
    store.remove(&TrackId::new("b")).await.unwrap();

    assert_eq!(
        events.recv().await.unwrap(),
        CacheEvent::Stored { id: TrackId::new("a"), size_bytes: 30 }
    );
    assert_eq!(
        events.recv().await.unwrap(),
        CacheEvent::Evicted { id: TrackId::new("a"), reason: EvictionReason::Pressure }
    );
    assert_eq!(
        events.recv().await.unwrap(),
        CacheEvent::Stored { id: TrackId::new("b"), size_bytes: 30 }
    );
    assert_eq!(
        events.recv().await.unwrap(),
        CacheEvent::Removed { id: TrackId::new("b") }
    );
}
