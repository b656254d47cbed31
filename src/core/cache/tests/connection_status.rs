use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::core::api::{ApiError, ApiRequest, ApiResult, Gateway, Payload, Transport};
use crate::core::cache::{ConnectionMonitor, ConnectionStatus, QueryClient, QueryState};

struct Switch(AtomicBool);

#[async_trait]
impl Transport for Switch {
    async fn send(&self, _request: ApiRequest) -> ApiResult<Payload> {
        if self.0.load(Ordering::SeqCst) {
            Ok(Payload::new())
        } else {
            Err(ApiError::Network("connection refused".into()))
        }
    }
}

#[test]
fn status_is_a_view_of_the_probe_state() {
    let mut state = QueryState::<bool>::default();
    assert_eq!(ConnectionStatus::from_probe(&state), ConnectionStatus::Checking);

    state.data = Some(true);
    assert_eq!(ConnectionStatus::from_probe(&state), ConnectionStatus::Connected);

    state.data = Some(false);
    assert_eq!(ConnectionStatus::from_probe(&state), ConnectionStatus::Disconnected);

    state.data = Some(true);
    state.error = Some(ApiError::Network("down".into()));
    assert_eq!(
        ConnectionStatus::from_probe(&state),
        ConnectionStatus::Disconnected,
        "an error wins over a stale success"
    );
}

#[tokio::test(start_paused = true)]
async fn monitor_recovers_without_restart() {
    let transport = Arc::new(Switch(AtomicBool::new(false)));
    let client = QueryClient::new();
    let monitor = ConnectionMonitor::start(&client, Gateway::new(transport.clone()));
    assert_eq!(monitor.status(), ConnectionStatus::Checking);

    tokio::time::sleep(Duration::from_millis(1)).await;
    assert_eq!(monitor.status(), ConnectionStatus::Disconnected);

    transport.0.store(true, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(monitor.status(), ConnectionStatus::Connected);
    assert!(monitor.is_running());
}

#[tokio::test(start_paused = true)]
async fn dropping_monitor_stops_probing() {
    let transport = Arc::new(Switch(AtomicBool::new(true)));
    let client = QueryClient::new();
    let monitor = ConnectionMonitor::start(&client, Gateway::new(transport));
    let mut rx = monitor.subscribe();
    tokio::time::sleep(Duration::from_millis(1)).await;
    drop(monitor);

    rx.mark_unchanged();
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert!(
        !rx.has_changed().unwrap_or(false),
        "no probe may run after the monitor is dropped"
    );
}
