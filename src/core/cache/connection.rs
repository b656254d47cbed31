use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::{Query, QueryClient, QueryKey, QueryPolicy, QueryState, spawn_poller};
use crate::core::api::Gateway;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Checking,
    Connected,
    Disconnected,
}

impl ConnectionStatus {
    /// Pure view of the probe entry; recomputed on every change.
    pub fn from_probe(state: &QueryState<bool>) -> Self {
        if state.is_loading() {
            ConnectionStatus::Checking
        } else if state.error.is_some() || state.data != Some(true) {
            ConnectionStatus::Disconnected
        } else {
            ConnectionStatus::Connected
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ConnectionStatus::Checking => "checking",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Disconnected => "disconnected",
        }
    }
}

/// Owns the health probe and its poller. Dropping the monitor stops probing.
pub struct ConnectionMonitor {
    query: Arc<Query<bool>>,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl ConnectionMonitor {
    pub fn start(client: &QueryClient, gateway: Gateway) -> Self {
        let query = client.query(QueryKey::connection(), QueryPolicy::CONNECTION, move || {
            let gateway = gateway.clone();
            async move { gateway.probe().await }
        });
        let cancel = CancellationToken::new();
        let handle = spawn_poller(Arc::clone(&query), cancel.clone());
        Self {
            query,
            cancel,
            handle,
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        ConnectionStatus::from_probe(&self.query.state())
    }

    pub fn subscribe(&self) -> watch::Receiver<QueryState<bool>> {
        self.query.subscribe()
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for ConnectionMonitor {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
