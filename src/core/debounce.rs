use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Runs an action after a quiet period. Scheduling again before the period
/// ends replaces the pending action; dropping the debouncer cancels it.
#[derive(Debug)]
pub struct Debouncer {
    delay: Duration,
    pending: Option<JoinHandle<()>>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn schedule<F>(&mut self, action: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.cancel();
        let delay = self.delay;
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            action.await;
        }));
    }

    /// Returns whether an unfinished action was cancelled.
    pub fn cancel(&mut self) -> bool {
        match self.pending.take() {
            Some(handle) if !handle.is_finished() => {
                handle.abort();
                true
            }
            _ => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Text input whose settled value trails the raw value by a quiet period.
pub struct DebouncedInput {
    raw: String,
    settled: Arc<watch::Sender<String>>,
    debouncer: Debouncer,
}

impl DebouncedInput {
    pub fn new(delay: Duration) -> Self {
        Self {
            raw: String::new(),
            settled: Arc::new(watch::Sender::new(String::new())),
            debouncer: Debouncer::new(delay),
        }
    }

    /// Settles on the trimmed text.
    pub fn set(&mut self, text: &str) {
        self.raw = text.to_string();
        let value = text.trim().to_string();
        let settled = Arc::clone(&self.settled);
        self.debouncer.schedule(async move {
            settled.send_if_modified(|current| {
                if *current == value {
                    return false;
                }
                *current = value;
                true
            });
        });
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn settled(&self) -> String {
        self.settled.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<String> {
        self.settled.subscribe()
    }
}
