//! Property-based tests for cache capacity
//!
//! Random put sequences must never leave the store over its byte or entry
//! budget, and the in-memory index must always match durable storage.


use encore_core::TrackId;
use proptest::prelude::*;
use test_helpers::*;

const MAX_BYTES: u64 = 100;
const MAX_ENTRIES: usize = 4;

fn arbitrary_puts() -> impl Strategy<Value = Vec<(u8, usize)>> {
    prop::collection::vec((0u8..8, 1usize..=120), 1..25)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// Property: after every put, totals stay within budget
    #[test]
    fn puts_never_exceed_budget(puts in arbitrary_puts()) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        runtime.block_on(async {
            let db = TestDb::new().await;
            let clock = test_clock();
            let store = open_store(&db, small_config(MAX_BYTES, MAX_ENTRIES), clock.clone()).await;

            for (key, size) in puts {
                let id = TrackId::new(format!("t{key}"));
                let stored = store.put(&id, vec![0; size], None).await.unwrap();
                clock.advance(chrono::Duration::seconds(1));

                let stats = store.stats().await.unwrap();
                assert!(stats.total_bytes <= MAX_BYTES, "over byte budget: {stats:?}");
                assert!(stats.count <= MAX_ENTRIES as u64, "over entry budget: {stats:?}");
                assert_eq!(store.ids().len() as u64, stats.count);

                if size as u64 > MAX_BYTES {
                    assert!(!stored);
                } else {
                    assert!(stored, "fitting payload of {size} bytes rejected");
                    assert!(store.contains(&id));
                }
            }
        });
    }
}
