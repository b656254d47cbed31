mod merging;
mod properties;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::core::api::{ApiError, ApiRequest, ApiResult, Gateway, Method, Payload, Transport};
use crate::core::cache::QueryClient;

/// Records every request and answers with a fixed payload, or fails while
/// `offline` is set.
#[derive(Default)]
struct Recorder {
    requests: Mutex<Vec<ApiRequest>>,
    reply: Mutex<Payload>,
    offline: AtomicBool,
}

impl Recorder {
    fn replying(value: Value) -> Arc<Self> {
        let recorder = Self::default();
        if let Value::Object(map) = value {
            *recorder.reply.lock().unwrap() = map;
        }
        Arc::new(recorder)
    }

    fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn writes(&self) -> Vec<ApiRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.method != Method::Get)
            .collect()
    }
}

#[async_trait]
impl Transport for Recorder {
    async fn send(&self, request: ApiRequest) -> ApiResult<Payload> {
        self.requests.lock().unwrap().push(request);
        if self.offline.load(Ordering::SeqCst) {
            return Err(ApiError::Network("connection refused".into()));
        }
        Ok(self.reply.lock().unwrap().clone())
    }
}

fn harness(reply: Value) -> (Arc<Recorder>, Gateway, QueryClient) {
    let recorder = Recorder::replying(reply);
    let gateway = Gateway::new(recorder.clone());
    (recorder, gateway, QueryClient::new())
}

fn ok() -> Value {
    json!({})
}
