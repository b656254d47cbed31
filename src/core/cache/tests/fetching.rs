use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use super::{counting_query, failing_query};
use crate::core::api::{ApiError, ApiResult};
use crate::core::cache::{Query, QueryKey, QueryPolicy};

async fn settle(query: &Query<u32>) {
    let mut rx = query.subscribe();
    rx.wait_for(|s| !s.is_fetching)
        .await
        .expect("query sender alive");
}

#[tokio::test(start_paused = true)]
async fn fresh_reads_are_served_from_cache() {
    let (query, calls) = counting_query(QueryPolicy::TASKS);

    let state = query.get().await;
    assert_eq!(state.data, Some(1));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    for _ in 0..5 {
        let state = query.read();
        assert_eq!(state.data, Some(1));
    }
    tokio::task::yield_now().await;
    assert_eq!(
        calls.load(Ordering::SeqCst),
        1,
        "reads within the stale time must not hit the network"
    );
}

#[tokio::test(start_paused = true)]
async fn stale_read_serves_old_value_and_refetches_once() {
    let (query, calls) = counting_query(QueryPolicy::TASKS);
    query.get().await;

    tokio::time::advance(Duration::from_secs(5)).await;

    let first = query.read();
    assert_eq!(first.data, Some(1), "stale value is served immediately");
    let second = query.read();
    assert_eq!(second.data, Some(1));

    settle(&query).await;
    assert_eq!(calls.load(Ordering::SeqCst), 2, "one background refetch");
    assert_eq!(query.state().data, Some(2));
}

#[tokio::test(start_paused = true)]
async fn zero_stale_time_always_refetches_on_get() {
    let (query, calls) = counting_query(QueryPolicy::SESSIONS);
    query.get().await;
    query.get().await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn retries_are_flat_and_bounded() {
    let (query, calls) = failing_query(QueryPolicy::TASKS);

    let ok = query.refetch().await;
    assert!(!ok);
    assert_eq!(calls.load(Ordering::SeqCst), 4, "first attempt plus three retries");

    let state = query.state();
    assert_eq!(state.failure_count, 4);
    assert!(!state.is_loading());
    assert_eq!(
        state.error,
        Some(ApiError::Network("connection refused".into()))
    );
}

#[tokio::test(start_paused = true)]
async fn search_policy_does_not_retry() {
    let (query, calls) = failing_query(QueryPolicy::SEARCH);
    query.refetch().await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn failure_keeps_last_known_good_value() {
    let healthy = Arc::new(AtomicBool::new(true));
    let flag = healthy.clone();
    let query = Query::new(QueryKey::new(["flaky"]), QueryPolicy::CONNECTION, move || {
        let up = flag.load(Ordering::SeqCst);
        async move {
            if up {
                ApiResult::Ok(7u32)
            } else {
                Err(ApiError::Network("down".into()))
            }
        }
    });

    assert!(query.refetch().await);
    healthy.store(false, Ordering::SeqCst);
    assert!(!query.refetch().await);

    let state = query.state();
    assert_eq!(state.data, Some(7));
    assert!(state.error.is_some());

    healthy.store(true, Ordering::SeqCst);
    assert!(query.refetch().await);
    let state = query.state();
    assert!(state.error.is_none());
    assert_eq!(state.failure_count, 0);
}

#[tokio::test(start_paused = true)]
async fn invalidation_forces_next_read_to_refetch() {
    let (query, calls) = counting_query(QueryPolicy::TASKS);
    query.get().await;
    assert!(query.is_fresh());

    query.invalidate();
    assert!(!query.is_fresh());

    let state = query.get().await;
    assert_eq!(state.data, Some(2));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(query.is_fresh());
}

#[tokio::test(start_paused = true)]
async fn concurrent_refetches_share_one_request() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    let query = Query::new(QueryKey::new(["slow"]), QueryPolicy::SEARCH, move || {
        let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
        async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            ApiResult::Ok(n)
        }
    });

    let (a, b) = tokio::join!(query.refetch(), query.refetch());
    assert!(a && b);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn loading_until_first_result() {
    let (query, _) = counting_query(QueryPolicy::DASHBOARD);
    assert!(query.state().is_loading());
    query.refetch().await;
    assert!(!query.state().is_loading());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn fetching_flag_tracks_in_flight_under_contention() {
    let query = Query::new(QueryKey::new(["busy"]), QueryPolicy::SEARCH, || async {
        tokio::task::yield_now().await;
        ApiResult::Ok(0u32)
    });

    let workers: Vec<_> = (0..4)
        .map(|_| {
            let query = Arc::clone(&query);
            tokio::spawn(async move {
                for _ in 0..200 {
                    query.refetch().await;
                }
            })
        })
        .collect();

    let done = Arc::new(AtomicBool::new(false));
    let checker = {
        let query = Arc::clone(&query);
        let done = done.clone();
        tokio::spawn(async move {
            let mut mismatches = 0;
            while !done.load(Ordering::SeqCst) {
                {
                    let meta = query.lock_meta();
                    if meta.in_flight != query.state.borrow().is_fetching {
                        mismatches += 1;
                    }
                }
                tokio::task::yield_now().await;
            }
            mismatches
        })
    };

    for worker in workers {
        worker.await.unwrap();
    }
    done.store(true, Ordering::SeqCst);
    assert_eq!(checker.await.unwrap(), 0);
    assert!(!query.state().is_fetching);
}
