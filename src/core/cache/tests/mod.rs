mod connection_status;
mod fetching;
mod registry;

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::core::api::{ApiError, ApiResult};
use crate::core::cache::{Query, QueryKey, QueryPolicy};

/// Query whose fetcher returns the 1-based call number.
fn counting_query(policy: QueryPolicy) -> (Arc<Query<u32>>, Arc<AtomicU32>) {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    let query = Query::new(QueryKey::new(["counter"]), policy, move || {
        let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
        async move { ApiResult::Ok(n) }
    });
    (query, calls)
}

fn failing_query(policy: QueryPolicy) -> (Arc<Query<u32>>, Arc<AtomicU32>) {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    let query = Query::new(QueryKey::new(["broken"]), policy, move || {
        counter.fetch_add(1, Ordering::SeqCst);
        async move { ApiResult::<u32>::Err(ApiError::Network("connection refused".into())) }
    });
    (query, calls)
}
