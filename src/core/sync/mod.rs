//! Optimistic mirrors of gateway state.
//!
//! Every intent updates the local mirror synchronously and then fires its
//! write in the background. Failed writes are logged and otherwise ignored;
//! the next successful poll brings the mirror back in line with the server.

mod cron;
mod notes;
mod sessions;
mod tasks;

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::core::api::ApiResult;
use crate::core::cache::{Query, QueryClient, QueryKey};

pub use cron::CronBoard;
pub use notes::{NoteBook, NoteSearch, sort_notes};
pub use sessions::SessionDesk;
pub use tasks::TaskBoard;

/// Why an intent was refused before touching the mirror.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntentError {
    #[error("{0} is required")]
    Required(&'static str),

    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },

    #[error("nothing is selected")]
    NoSelection,
}

/// A server snapshot and the moment it arrived.
#[derive(Debug, Clone)]
pub struct Snapshot<T> {
    pub items: Vec<T>,
    pub received_at: Instant,
}

impl<T> Snapshot<T> {
    pub fn now(items: Vec<T>) -> Self {
        Self {
            items,
            received_at: Instant::now(),
        }
    }
}

/// Local optimistic state wins until a snapshot arrives strictly after the
/// most recent local intent.
pub fn merge<T: Clone>(local: &[T], remote: &Snapshot<T>, last_intent_at: Option<Instant>) -> Vec<T> {
    if remote_wins(remote, last_intent_at) {
        remote.items.clone()
    } else {
        local.to_vec()
    }
}

fn remote_wins<T>(remote: &Snapshot<T>, last_intent_at: Option<Instant>) -> bool {
    last_intent_at.is_none_or(|intent| remote.received_at > intent)
}

#[derive(Debug, Clone)]
pub struct Mirror<T> {
    items: Vec<T>,
    last_intent_at: Option<Instant>,
    last_synced_at: Option<Instant>,
}

impl<T> Default for Mirror<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            last_intent_at: None,
            last_synced_at: None,
        }
    }
}

impl<T: Clone> Mirror<T> {
    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn last_intent_at(&self) -> Option<Instant> {
        self.last_intent_at
    }

    pub fn last_synced_at(&self) -> Option<Instant> {
        self.last_synced_at
    }

    /// Server-confirmed adjustment; does not count as a local intent.
    pub fn items_mut(&mut self) -> &mut Vec<T> {
        &mut self.items
    }

    /// Apply a local intent and stamp it.
    pub fn apply<R>(&mut self, f: impl FnOnce(&mut Vec<T>) -> R) -> R {
        self.last_intent_at = Some(Instant::now());
        f(&mut self.items)
    }

    /// Take the snapshot if it postdates the last intent. Returns whether it
    /// was taken.
    pub fn reconcile(&mut self, snapshot: Snapshot<T>) -> bool {
        if !remote_wins(&snapshot, self.last_intent_at) {
            debug!("snapshot predates local intent, keeping optimistic state");
            return false;
        }
        self.last_synced_at = Some(snapshot.received_at);
        self.items = snapshot.items;
        true
    }
}

/// Shared single-owner mirror. Stores hold one of these and expose the only
/// operations allowed to mutate it.
pub(crate) type SharedMirror<T> = Arc<Mutex<Mirror<T>>>;

pub(crate) fn lock<T>(mirror: &SharedMirror<T>) -> MutexGuard<'_, Mirror<T>> {
    mirror.lock().unwrap_or_else(|e| e.into_inner())
}

/// Background write started by an intent. Dropping it leaves the write
/// running.
#[derive(Debug)]
pub struct WriteHandle(JoinHandle<()>);

impl WriteHandle {
    /// Wait for the write to finish. The outcome is deliberately not exposed.
    pub async fn settled(self) {
        let _ = self.0.await;
    }

    pub fn is_finished(&self) -> bool {
        self.0.is_finished()
    }
}

/// Spawn a write whose failure is only logged. On success the given cache
/// entry, if any, is marked stale.
pub(crate) fn fire_and_forget<F>(
    label: &'static str,
    invalidate: Option<(QueryClient, QueryKey)>,
    write: F,
) -> WriteHandle
where
    F: Future<Output = ApiResult<()>> + Send + 'static,
{
    WriteHandle(tokio::spawn(async move {
        match write.await {
            Ok(()) => {
                debug!(write = label, "optimistic write accepted");
                if let Some((client, key)) = invalidate {
                    client.invalidate(&key);
                }
            }
            Err(e) => warn!(write = label, "optimistic write failed: {}", e),
        }
    }))
}

/// A store that accepts server snapshots.
pub trait Reconcile: Send + Sync + 'static {
    type Item: Clone + Send + Sync + 'static;

    fn reconcile(&self, snapshot: Snapshot<Self::Item>) -> bool;
}

/// Feed every successful fetch of `query` into `store` until cancelled.
pub fn spawn_reconciler<S: Reconcile>(
    store: S,
    query: Arc<Query<Vec<S::Item>>>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut rx = query.subscribe();
        let mut seen: Option<Instant> = None;
        loop {
            let snapshot = {
                let state = rx.borrow_and_update();
                match (&state.data, state.updated_at) {
                    (Some(items), Some(at)) if seen != Some(at) => {
                        seen = Some(at);
                        Some(Snapshot {
                            items: items.clone(),
                            received_at: at,
                        })
                    }
                    _ => None,
                }
            };
            if let Some(snapshot) = snapshot {
                store.reconcile(snapshot);
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                changed = rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests;
