use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::counting_query;
use crate::core::api::ApiResult;
use crate::core::cache::{QueryClient, QueryKey, QueryPolicy, spawn_poller};

#[tokio::test]
async fn same_key_returns_shared_query() {
    let client = QueryClient::new();
    let a = client.query(QueryKey::tasks(), QueryPolicy::TASKS, || async {
        ApiResult::Ok(1u32)
    });
    let b = client.query(QueryKey::tasks(), QueryPolicy::TASKS, || async {
        ApiResult::Ok(2u32)
    });
    assert!(Arc::ptr_eq(&a, &b));

    a.refetch().await;
    let found = client
        .get::<u32>(&QueryKey::tasks())
        .expect("registered query");
    assert_eq!(found.state().data, Some(1));
    assert!(client.get::<String>(&QueryKey::tasks()).is_none());
}

#[tokio::test]
async fn invalidation_matches_by_prefix() {
    let client = QueryClient::new();
    let history_a = client.query(QueryKey::session_history("a"), QueryPolicy::TASKS, || async {
        ApiResult::Ok(0u32)
    });
    let history_b = client.query(QueryKey::session_history("b"), QueryPolicy::TASKS, || async {
        ApiResult::Ok(0u32)
    });
    let notes = client.query(QueryKey::notes(), QueryPolicy::TASKS, || async {
        ApiResult::Ok(0u32)
    });
    for q in [&history_a, &history_b, &notes] {
        q.refetch().await;
        assert!(q.is_fresh());
    }

    let hit = client.invalidate(&QueryKey::new(["sessionHistory"]));
    assert_eq!(hit, 2);
    assert!(!history_a.is_fresh());
    assert!(!history_b.is_fresh());
    assert!(notes.is_fresh());

    assert_eq!(client.invalidate(&QueryKey::session_history("a")), 1);
}

#[tokio::test(start_paused = true)]
async fn poller_refetches_on_interval_until_cancelled() {
    let (query, calls) = counting_query(QueryPolicy::CRON_JOBS);
    let cancel = CancellationToken::new();
    let handle = spawn_poller(query.clone(), cancel.clone());

    tokio::time::sleep(Duration::from_millis(1)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1, "first poll is immediate");

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    tokio::time::sleep(Duration::from_secs(20)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 4);

    cancel.cancel();
    handle.await.expect("poller exits cleanly");
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 4);
}

#[tokio::test(start_paused = true)]
async fn on_demand_poller_fetches_once() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    let client = QueryClient::new();
    let query = client.query(QueryKey::notes(), QueryPolicy::NOTES, move || {
        counter.fetch_add(1, Ordering::SeqCst);
        async { ApiResult::Ok(()) }
    });
    let cancel = CancellationToken::new();
    let handle = spawn_poller(query, cancel.clone());

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    cancel.cancel();
    handle.await.expect("poller exits cleanly");
}
