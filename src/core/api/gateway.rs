use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::warn;

use super::envelope::Payload;
use super::error::{ApiError, ApiResult};
use super::transport::{ApiRequest, HttpTransport, Transport};
use super::types::*;
use crate::core::config::DashboardConfig;

/// Typed façade over the gateway's REST surface. Cloning is cheap; every
/// clone shares one transport.
#[derive(Clone)]
pub struct Gateway {
    transport: Arc<dyn Transport>,
}

fn seg(s: &str) -> String {
    urlencoding::encode(s).into_owned()
}

fn to_body<T: Serialize>(value: &T) -> ApiResult<Value> {
    serde_json::to_value(value).map_err(|e| ApiError::Malformed(e.to_string()))
}

/// Read a list from the first present alias. Missing lists are empty and
/// elements that fail to parse are dropped.
pub fn list_field<T: DeserializeOwned>(payload: &Payload, keys: &[&str]) -> Vec<T> {
    let Some((key, value)) = keys
        .iter()
        .find_map(|k| payload.get(*k).filter(|v| !v.is_null()).map(|v| (*k, v)))
    else {
        return Vec::new();
    };
    let Value::Array(items) = value else {
        warn!(field = key, "expected a list, treating as empty");
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| match serde_json::from_value::<T>(item.clone()) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                warn!(field = key, "skipping malformed element: {}", e);
                None
            }
        })
        .collect()
}

/// Read an object field, falling back to its default when missing or
/// mistyped.
pub fn object_field<T: DeserializeOwned + Default>(payload: &Payload, key: &str) -> T {
    match payload.get(key) {
        None | Some(Value::Null) => T::default(),
        Some(value) => serde_json::from_value(value.clone()).unwrap_or_else(|e| {
            warn!(field = key, "unreadable field, using defaults: {}", e);
            T::default()
        }),
    }
}

impl Gateway {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    pub fn http(config: &DashboardConfig) -> Self {
        Self::new(Arc::new(HttpTransport::new(config)))
    }

    pub async fn raw(&self, request: ApiRequest) -> ApiResult<Payload> {
        self.transport.send(request).await
    }

    async fn write(&self, request: ApiRequest) -> ApiResult<()> {
        self.raw(request).await.map(|_| ())
    }

    // ── Dashboard ──

    pub async fn dashboard(&self) -> ApiResult<DashboardData> {
        let payload = self.raw(ApiRequest::get("/api/dashboard")).await?;
        Ok(DashboardData {
            status: object_field(&payload, "status"),
            tasks: object_field(&payload, "tasks"),
            notes: object_field(&payload, "notes"),
            activity: list_field(&payload, &["activity"]),
        })
    }

    /// Health probe: `true` when the dashboard endpoint answers `ok`.
    pub async fn probe(&self) -> ApiResult<bool> {
        self.raw(ApiRequest::get("/api/dashboard")).await.map(|_| true)
    }

    pub async fn activity(&self, limit: Option<u32>) -> ApiResult<Vec<ActivityEntry>> {
        let mut req = ApiRequest::get("/api/activity");
        if let Some(limit) = limit {
            req = req.param("limit", limit.to_string());
        }
        let payload = self.raw(req).await?;
        Ok(list_field(&payload, &["activity", "data"]))
    }

    // ── Tasks ──

    pub async fn tasks(&self, filter: &TaskFilter) -> ApiResult<Vec<Task>> {
        let mut req = ApiRequest::get("/api/tasks");
        if let Some(column) = filter.column {
            req = req.param("column", column.as_str());
        }
        if let Some(agent) = filter.assigned_to {
            req = req.param("assignedTo", agent.as_str());
        }
        let payload = self.raw(req).await?;
        Ok(list_field(&payload, &["tasks", "data"]))
    }

    pub async fn create_task(&self, task: &Task) -> ApiResult<()> {
        let body = json!({
            "id": task.id,
            "title": task.title,
            "description": task.description,
            "column": task.column,
            "priority": task.priority,
            "assignedTo": task.assigned_to,
        });
        self.write(ApiRequest::post("/api/tasks", body)).await
    }

    pub async fn update_task(&self, id: &str, update: &TaskUpdate) -> ApiResult<()> {
        let path = format!("/api/tasks/{}", seg(id));
        self.write(ApiRequest::patch(path, to_body(update)?)).await
    }

    pub async fn assign_task(
        &self,
        id: &str,
        agent: AgentId,
        instructions: Option<&str>,
    ) -> ApiResult<()> {
        let path = format!("/api/tasks/{}/assign", seg(id));
        let body = json!({ "agentId": agent, "instructions": instructions });
        self.write(ApiRequest::post(path, body)).await
    }

    pub async fn add_task_comment(&self, id: &str, text: &str) -> ApiResult<()> {
        let path = format!("/api/tasks/{}/comments", seg(id));
        self.write(ApiRequest::post(path, json!({ "text": text })))
            .await
    }

    // ── Notes ──

    pub async fn notes(&self, search: Option<&str>) -> ApiResult<Vec<Note>> {
        let mut req = ApiRequest::get("/api/notes");
        if let Some(search) = search.filter(|s| !s.is_empty()) {
            req = req.param("search", search);
        }
        let payload = self.raw(req).await?;
        Ok(list_field(&payload, &["notes", "data"]))
    }

    /// Returns the server-assigned id when the response carries one.
    pub async fn create_note(&self, draft: &NoteDraft) -> ApiResult<Option<String>> {
        let payload = self
            .raw(ApiRequest::post("/api/notes", to_body(draft)?))
            .await?;
        let id = payload
            .get("note")
            .and_then(|n| n.get("id"))
            .or_else(|| payload.get("id"))
            .and_then(Value::as_str)
            .map(str::to_string);
        Ok(id)
    }

    pub async fn update_note(&self, id: &str, update: &NoteUpdate) -> ApiResult<()> {
        let path = format!("/api/notes/{}", seg(id));
        self.write(ApiRequest::patch(path, to_body(update)?)).await
    }

    pub async fn delete_note(&self, id: &str) -> ApiResult<()> {
        self.write(ApiRequest::delete(format!("/api/notes/{}", seg(id))))
            .await
    }

    // ── Search ──

    pub async fn search(
        &self,
        query: &str,
        sources: &[SearchSource],
        limit: Option<u32>,
    ) -> ApiResult<Vec<SearchResult>> {
        let mut req = ApiRequest::get("/api/search").param("query", query);
        for source in sources {
            req = req.param("sources", source.as_str());
        }
        if let Some(limit) = limit {
            req = req.param("limit", limit.to_string());
        }
        let payload = self.raw(req).await?;
        Ok(list_field(&payload, &["results", "data"]))
    }

    // ── Agents ──

    pub async fn agent_analytics(&self, agent: AgentId) -> ApiResult<AgentAnalytics> {
        let path = format!("/api/agents/{}/analytics", agent.as_str());
        let payload = self.raw(ApiRequest::get(path)).await?;
        serde_json::from_value(Value::Object(payload))
            .map_err(|e| ApiError::Malformed(format!("agent analytics: {}", e)))
    }

    pub async fn record_agent_task(&self, agent: AgentId, record: &AgentTaskRecord) -> ApiResult<()> {
        let path = format!("/api/agents/{}/tasks", agent.as_str());
        self.write(ApiRequest::post(path, to_body(record)?)).await
    }

    // ── Sessions ──

    pub async fn sessions(&self, limit: Option<u32>) -> ApiResult<Vec<Session>> {
        let mut req = ApiRequest::get("/api/sessions");
        if let Some(limit) = limit {
            req = req.param("limit", limit.to_string());
        }
        let payload = self.raw(req).await?;
        Ok(list_field(&payload, &["sessions", "data"]))
    }

    pub async fn session_history(&self, id: &str) -> ApiResult<Vec<Message>> {
        let path = format!("/api/sessions/{}/history", seg(id));
        let payload = self.raw(ApiRequest::get(path)).await?;
        Ok(list_field(&payload, &["messages", "data"]))
    }

    pub async fn send_to_session(&self, id: &str, message: &str) -> ApiResult<()> {
        let path = format!("/api/sessions/{}/send", seg(id));
        self.write(ApiRequest::post(path, json!({ "message": message })))
            .await
    }

    // ── Cron ──

    pub async fn cron_jobs(&self) -> ApiResult<Vec<CronJob>> {
        let payload = self.raw(ApiRequest::get("/api/cron/jobs")).await?;
        Ok(list_field(&payload, &["jobs", "data"]))
    }

    pub async fn create_cron_job(&self, data: &CronJobData) -> ApiResult<Option<String>> {
        let payload = self
            .raw(ApiRequest::post("/api/cron/jobs", to_body(data)?))
            .await?;
        Ok(payload
            .get("job")
            .and_then(|j| j.get("id"))
            .or_else(|| payload.get("id"))
            .and_then(Value::as_str)
            .map(str::to_string))
    }

    pub async fn update_cron_job(&self, id: &str, patch: &CronJobPatch) -> ApiResult<()> {
        let path = format!("/api/cron/jobs/{}", seg(id));
        self.write(ApiRequest::patch(path, to_body(patch)?)).await
    }

    pub async fn delete_cron_job(&self, id: &str) -> ApiResult<()> {
        self.write(ApiRequest::delete(format!("/api/cron/jobs/{}", seg(id))))
            .await
    }

    pub async fn run_cron_job(&self, id: &str) -> ApiResult<()> {
        let path = format!("/api/cron/jobs/{}/run", seg(id));
        self.write(ApiRequest::post(path, json!({}))).await
    }

    pub async fn cron_runs(&self, id: &str) -> ApiResult<Vec<CronRun>> {
        let path = format!("/api/cron/jobs/{}/runs", seg(id));
        let payload = self.raw(ApiRequest::get(path)).await?;
        Ok(list_field(&payload, &["runs", "data"]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(value: Value) -> Payload {
        match value {
            Value::Object(map) => map,
            _ => panic!("test payload must be an object"),
        }
    }

    #[test]
    fn list_field_uses_first_present_alias() {
        let p = payload(json!({"data": [{"id": "n1"}]}));
        let notes: Vec<Note> = list_field(&p, &["notes", "data"]);
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].id, "n1");
    }

    #[test]
    fn list_field_missing_or_mistyped_is_empty() {
        let p = payload(json!({"notes": "oops"}));
        assert!(list_field::<Note>(&p, &["notes"]).is_empty());
        assert!(list_field::<Note>(&p, &["data"]).is_empty());
    }

    #[test]
    fn list_field_skips_bad_elements() {
        let p = payload(json!({"jobs": [{"id": "c1", "name": "nightly"}, {"name": "no id"}, 7]}));
        let jobs: Vec<CronJob> = list_field(&p, &["jobs"]);
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].name, "nightly");
        assert!(jobs[0].enabled, "enabled defaults to true");
    }

    #[test]
    fn object_field_defaults_on_mismatch() {
        let p = payload(json!({"notes": {"total": "many"}}));
        let summary: NoteSummary = object_field(&p, "notes");
        assert_eq!(summary, NoteSummary::default());
    }
}
