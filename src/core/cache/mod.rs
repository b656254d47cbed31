//! Keyed stale-while-revalidate cache over gateway reads.
//!
//! Each [`Query`] owns the last-known-good value for one resource, its error
//! state and a `watch` channel that views subscribe to. Retries are flat and
//! immediate, bounded by the resource's [`QueryPolicy`].

mod connection;
mod poller;

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::debug;

use crate::core::api::{AgentId, ApiError, ApiResult};

pub use connection::{ConnectionMonitor, ConnectionStatus};
pub use poller::spawn_poller;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey(Vec<String>);

impl QueryKey {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        self.0.starts_with(&prefix.0)
    }

    pub fn connection() -> Self {
        Self::new(["connection-status"])
    }

    pub fn dashboard() -> Self {
        Self::new(["dashboard-status"])
    }

    pub fn tasks() -> Self {
        Self::new(["tasks"])
    }

    pub fn notes() -> Self {
        Self::new(["notes"])
    }

    pub fn notes_search(search: &str) -> Self {
        Self::new(["notes", search])
    }

    pub fn sessions() -> Self {
        Self::new(["sessions"])
    }

    pub fn session_history(id: &str) -> Self {
        Self::new(["sessionHistory", id])
    }

    pub fn cron_jobs() -> Self {
        Self::new(["cron-jobs"])
    }

    pub fn cron_runs(id: &str) -> Self {
        Self::new(["cron-runs", id])
    }

    pub fn agent_analytics(agent: AgentId) -> Self {
        Self::new(["agent-analytics", agent.as_str()])
    }

    pub fn search(query: &str, sources: &[String]) -> Self {
        let mut segments = vec!["search".to_string(), query.to_string()];
        segments.extend(sources.iter().cloned());
        Self(segments)
    }
}

impl std::fmt::Display for QueryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.0.join(", "))
    }
}

/// Refetch cadence, freshness window and retry bound for one resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryPolicy {
    /// `None` means refetch on demand only.
    pub refetch_interval: Option<Duration>,
    pub stale_time: Duration,
    /// Extra attempts after the first failure.
    pub retry: u32,
}

const fn policy(interval_secs: Option<u64>, stale_secs: u64, retry: u32) -> QueryPolicy {
    QueryPolicy {
        refetch_interval: match interval_secs {
            Some(secs) => Some(Duration::from_secs(secs)),
            None => None,
        },
        stale_time: Duration::from_secs(stale_secs),
        retry,
    }
}

impl QueryPolicy {
    pub const CONNECTION: QueryPolicy = policy(Some(10), 8, 1);
    pub const DASHBOARD: QueryPolicy = policy(Some(5), 4, 3);
    pub const TASKS: QueryPolicy = policy(Some(5), 4, 3);
    pub const SESSIONS: QueryPolicy = policy(Some(5), 0, 3);
    pub const SESSION_HISTORY: QueryPolicy = policy(Some(5), 0, 3);
    pub const AGENT_ANALYTICS: QueryPolicy = policy(Some(10), 0, 3);
    pub const CRON_JOBS: QueryPolicy = policy(Some(10), 0, 3);
    pub const CRON_RUNS: QueryPolicy = policy(None, 0, 3);
    pub const NOTES: QueryPolicy = policy(None, 0, 3);
    pub const SEARCH: QueryPolicy = policy(None, 0, 0);
}

#[derive(Debug, Clone)]
pub struct QueryState<T> {
    /// Last successfully fetched value; survives later failures.
    pub data: Option<T>,
    pub error: Option<ApiError>,
    pub is_fetching: bool,
    pub updated_at: Option<Instant>,
    pub failure_count: u32,
}

impl<T> Default for QueryState<T> {
    fn default() -> Self {
        Self {
            data: None,
            error: None,
            is_fetching: false,
            updated_at: None,
            failure_count: 0,
        }
    }
}

impl<T> QueryState<T> {
    /// Nothing has resolved yet, successfully or not.
    pub fn is_loading(&self) -> bool {
        self.data.is_none() && self.error.is_none()
    }
}

type Fetcher<T> = Arc<dyn Fn() -> BoxFuture<'static, ApiResult<T>> + Send + Sync>;

#[derive(Default)]
struct FetchMeta {
    invalidated: bool,
    in_flight: bool,
}

pub struct Query<T> {
    key: QueryKey,
    policy: QueryPolicy,
    fetcher: Fetcher<T>,
    state: watch::Sender<QueryState<T>>,
    meta: Mutex<FetchMeta>,
}

impl<T> Query<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new<F, Fut>(key: QueryKey, policy: QueryPolicy, fetch: F) -> Arc<Self>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ApiResult<T>> + Send + 'static,
    {
        Arc::new(Self {
            key,
            policy,
            fetcher: Arc::new(move || fetch().boxed()),
            state: watch::Sender::new(QueryState::default()),
            meta: Mutex::new(FetchMeta::default()),
        })
    }

    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    pub fn policy(&self) -> QueryPolicy {
        self.policy
    }

    pub fn state(&self) -> QueryState<T> {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<QueryState<T>> {
        self.state.subscribe()
    }

    /// Fresh means: fetched successfully, not invalidated since, and younger
    /// than the stale time.
    pub fn is_fresh(&self) -> bool {
        let invalidated = self.lock_meta().invalidated;
        let state = self.state.borrow();
        !invalidated
            && state.data.is_some()
            && state
                .updated_at
                .is_some_and(|at| at.elapsed() < self.policy.stale_time)
    }

    pub fn invalidate(&self) {
        self.lock_meta().invalidated = true;
        debug!(key = %self.key, "query invalidated");
    }

    /// Serve the cached state immediately; when stale, start at most one
    /// background refetch.
    pub fn read(self: &Arc<Self>) -> QueryState<T> {
        if !self.is_fresh() && self.begin_fetch() {
            let query = Arc::clone(self);
            tokio::spawn(async move {
                query.run_fetch().await;
            });
        }
        self.state()
    }

    /// Like [`read`](Self::read) but waits for the refetch when stale.
    pub async fn get(&self) -> QueryState<T> {
        if !self.is_fresh() {
            self.refetch().await;
        }
        self.state()
    }

    /// Fetch now, or join the fetch already in flight. Returns whether the
    /// resource ended up without an error.
    pub async fn refetch(&self) -> bool {
        if self.begin_fetch() {
            return self.run_fetch().await;
        }
        let mut rx = self.state.subscribe();
        match rx.wait_for(|s| !s.is_fetching).await {
            Ok(state) => state.error.is_none(),
            Err(_) => false,
        }
    }

    fn lock_meta(&self) -> std::sync::MutexGuard<'_, FetchMeta> {
        self.meta.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn begin_fetch(&self) -> bool {
        let mut meta = self.lock_meta();
        if meta.in_flight {
            return false;
        }
        meta.in_flight = true;
        self.state.send_modify(|s| s.is_fetching = true);
        true
    }

    async fn run_fetch(&self) -> bool {
        let was_invalidated = std::mem::take(&mut self.lock_meta().invalidated);
        let attempts = self.policy.retry + 1;
        let mut outcome = Err(ApiError::Network("no attempt made".to_string()));

        for attempt in 1..=attempts {
            outcome = (self.fetcher)().await;
            match &outcome {
                Ok(_) => break,
                Err(e) => {
                    self.state.send_modify(|s| s.failure_count += 1);
                    debug!(key = %self.key, attempt, attempts, "fetch failed: {}", e);
                }
            }
        }

        let ok = outcome.is_ok();
        // `in_flight` and `is_fetching` only change together, under the meta lock.
        let mut meta = self.lock_meta();
        meta.in_flight = false;
        if !ok && was_invalidated {
            meta.invalidated = true;
        }
        self.state.send_modify(|s| {
            s.is_fetching = false;
            match outcome {
                Ok(data) => {
                    s.data = Some(data);
                    s.error = None;
                    s.updated_at = Some(Instant::now());
                    s.failure_count = 0;
                }
                Err(e) => {
                    debug!(key = %self.key, "query failed after {} attempt(s): {}", attempts, e);
                    s.error = Some(e);
                }
            }
        });
        drop(meta);
        ok
    }
}

trait Invalidate: Send + Sync {
    fn invalidate(&self);
}

impl<T: Clone + Send + Sync + 'static> Invalidate for Query<T> {
    fn invalidate(&self) {
        Query::invalidate(self);
    }
}

struct Entry {
    invalidate: Arc<dyn Invalidate>,
    any: Arc<dyn Any + Send + Sync>,
}

/// Registry of queries by key. Passed to whoever needs it; there is no
/// global instance.
#[derive(Clone, Default)]
pub struct QueryClient {
    entries: Arc<Mutex<HashMap<QueryKey, Entry>>>,
}

impl QueryClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<QueryKey, Entry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Shared query for `key`, created with `fetch` on first use.
    pub fn query<T, F, Fut>(&self, key: QueryKey, policy: QueryPolicy, fetch: F) -> Arc<Query<T>>
    where
        T: Clone + Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ApiResult<T>> + Send + 'static,
    {
        let mut entries = self.lock();
        if let Some(entry) = entries.get(&key)
            && let Ok(existing) = Arc::clone(&entry.any).downcast::<Query<T>>()
        {
            return existing;
        }
        let query = Query::new(key.clone(), policy, fetch);
        entries.insert(
            key,
            Entry {
                invalidate: query.clone(),
                any: query.clone(),
            },
        );
        query
    }

    pub fn get<T: Clone + Send + Sync + 'static>(&self, key: &QueryKey) -> Option<Arc<Query<T>>> {
        let entries = self.lock();
        let entry = entries.get(key)?;
        Arc::clone(&entry.any).downcast::<Query<T>>().ok()
    }

    /// Mark every query under `prefix` stale. Returns how many matched.
    pub fn invalidate(&self, prefix: &QueryKey) -> usize {
        let entries = self.lock();
        let mut count = 0;
        for (key, entry) in entries.iter() {
            if key.starts_with(prefix) {
                entry.invalidate.invalidate();
                count += 1;
            }
        }
        count
    }
}

#[cfg(test)]
mod tests;
