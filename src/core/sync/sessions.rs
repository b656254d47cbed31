use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::{
    IntentError, Mirror, Reconcile, SharedMirror, Snapshot, WriteHandle, fire_and_forget, lock,
};
use crate::core::api::{Gateway, Message, MessageRole, Session, now_iso};
use crate::core::cache::{Query, QueryClient, QueryKey, QueryPolicy};

/// Session list, the current selection and one history mirror per session.
#[derive(Clone)]
pub struct SessionDesk {
    sessions: SharedMirror<Session>,
    histories: Arc<Mutex<HashMap<String, Mirror<Message>>>>,
    selected: Arc<Mutex<Option<String>>>,
    gateway: Gateway,
    client: QueryClient,
}

impl SessionDesk {
    pub fn new(gateway: Gateway, client: QueryClient) -> Self {
        Self {
            sessions: Arc::new(Mutex::new(Mirror::default())),
            histories: Arc::new(Mutex::new(HashMap::new())),
            selected: Arc::new(Mutex::new(None)),
            gateway,
            client,
        }
    }

    pub fn query(&self) -> Arc<Query<Vec<Session>>> {
        let gateway = self.gateway.clone();
        self.client
            .query(QueryKey::sessions(), QueryPolicy::SESSIONS, move || {
                let gateway = gateway.clone();
                async move { gateway.sessions(None).await }
            })
    }

    pub fn history_query(&self, id: &str) -> Arc<Query<Vec<Message>>> {
        let gateway = self.gateway.clone();
        let id = id.to_string();
        self.client.query(
            QueryKey::session_history(&id),
            QueryPolicy::SESSION_HISTORY,
            move || {
                let gateway = gateway.clone();
                let id = id.clone();
                async move { gateway.session_history(&id).await }
            },
        )
    }

    pub fn sessions(&self) -> Vec<Session> {
        lock(&self.sessions).items().to_vec()
    }

    /// Sessions whose display name contains `filter`, ignoring case.
    pub fn filtered(&self, filter: &str) -> Vec<Session> {
        let needle = filter.to_lowercase();
        self.sessions()
            .into_iter()
            .filter(|s| needle.is_empty() || s.display_name().to_lowercase().contains(&needle))
            .collect()
    }

    pub fn select(&self, id: &str) {
        *self.selected.lock().unwrap_or_else(|e| e.into_inner()) = Some(id.to_string());
    }

    pub fn selected(&self) -> Option<String> {
        self.selected
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn selected_session(&self) -> Option<Session> {
        let id = self.selected()?;
        self.sessions()
            .into_iter()
            .find(|s| s.session_id() == Some(id.as_str()))
    }

    pub fn messages(&self, id: &str) -> Vec<Message> {
        self.histories
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(id)
            .map(|m| m.items().to_vec())
            .unwrap_or_default()
    }

    pub fn reconcile_history(&self, id: &str, snapshot: Snapshot<Message>) -> bool {
        self.histories
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(id.to_string())
            .or_default()
            .reconcile(snapshot)
    }

    /// Append the message locally and send it to the selected session.
    pub fn send(&self, text: &str) -> Result<WriteHandle, IntentError> {
        let id = self.selected().ok_or(IntentError::NoSelection)?;
        let text = text.trim().to_string();
        if text.is_empty() {
            return Err(IntentError::Required("message"));
        }

        self.histories
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(id.clone())
            .or_default()
            .apply(|items| {
                items.push(Message {
                    id: None,
                    role: MessageRole::User,
                    content: text.clone(),
                    timestamp: Some(now_iso()),
                })
            });

        let gateway = self.gateway.clone();
        let invalidate = Some((self.client.clone(), QueryKey::session_history(&id)));
        Ok(fire_and_forget("send message", invalidate, async move {
            gateway.send_to_session(&id, &text).await
        }))
    }
}

impl Reconcile for SessionDesk {
    type Item = Session;

    fn reconcile(&self, snapshot: Snapshot<Session>) -> bool {
        lock(&self.sessions).reconcile(snapshot)
    }
}
