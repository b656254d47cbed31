use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// ISO-8601 timestamp with millisecond precision, as the gateway emits them.
pub fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Milliseconds since the epoch, or 0 for missing/unparseable timestamps.
pub fn timestamp_millis(ts: Option<&str>) -> i64 {
    ts.and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.timestamp_millis())
        .unwrap_or(0)
}

// ── Tasks ──

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum Column {
    #[default]
    Todo,
    InProgress,
    Complete,
    Blocked,
}

impl Column {
    pub const ALL: [Column; 4] = [
        Column::Todo,
        Column::InProgress,
        Column::Complete,
        Column::Blocked,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Column::Todo => "todo",
            Column::InProgress => "in-progress",
            Column::Complete => "complete",
            Column::Blocked => "blocked",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Column::Todo => "To Do",
            Column::InProgress => "In Progress",
            Column::Complete => "Complete",
            Column::Blocked => "Blocked",
        }
    }
}

impl std::fmt::Display for Column {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Column {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Column::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("unknown column '{}' (todo, in-progress, complete, blocked)", s))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            other => Err(format!("unknown priority '{}' (low, medium, high)", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentId {
    Milo,
    Analyst,
    Author,
    Comms,
    Docs,
    Researcher,
}

impl AgentId {
    pub const ALL: [AgentId; 6] = [
        AgentId::Milo,
        AgentId::Analyst,
        AgentId::Author,
        AgentId::Comms,
        AgentId::Docs,
        AgentId::Researcher,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentId::Milo => "milo",
            AgentId::Analyst => "analyst",
            AgentId::Author => "author",
            AgentId::Comms => "comms",
            AgentId::Docs => "docs",
            AgentId::Researcher => "researcher",
        }
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AgentId::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| format!("unknown agent '{}'", s))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskComment {
    #[serde(default)]
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub column: Column,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<AgentId>,
    #[serde(default)]
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub comments: Vec<TaskComment>,
    /// Lifecycle marker set by the gateway; `"deleted"` hides the task.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

pub const DELETED_STATUS: &str = "deleted";

impl Task {
    pub fn is_deleted(&self) -> bool {
        self.status.as_deref() == Some(DELETED_STATUS)
    }
}

/// User input for a new task; the board fills in id and timestamps.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskDraft {
    pub title: String,
    pub description: Option<String>,
    pub priority: Priority,
    pub column: Column,
    pub assigned_to: Option<AgentId>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<Column>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskFilter {
    pub column: Option<Column>,
    pub assigned_to: Option<AgentId>,
}

// ── Notes ──

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub pinned: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl Note {
    pub fn updated_millis(&self) -> i64 {
        timestamp_millis(self.updated_at.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteDraft {
    pub title: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl Default for NoteDraft {
    fn default() -> Self {
        Self {
            title: "Untitled Note".to_string(),
            content: String::new(),
            tags: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NoteUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pinned: Option<bool>,
}

impl NoteUpdate {
    pub fn apply_to(&self, note: &mut Note) {
        if let Some(title) = &self.title {
            note.title = title.clone();
        }
        if let Some(content) = &self.content {
            note.content = content.clone();
        }
        if let Some(tags) = &self.tags {
            note.tags = tags.clone();
        }
        if let Some(pinned) = self.pinned {
            note.pinned = pinned;
        }
    }
}

// ── Cron ──

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleType {
    #[default]
    Cron,
    At,
    Every,
}

impl ScheduleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleType::Cron => "cron",
            ScheduleType::At => "at",
            ScheduleType::Every => "every",
        }
    }

    /// Example expression shown next to the schedule input.
    pub fn help(&self) -> &'static str {
        match self {
            ScheduleType::Cron => "e.g. */5 * * * * (every 5 minutes)",
            ScheduleType::At => "e.g. 2025-03-01T09:00:00Z (ISO date)",
            ScheduleType::Every => "e.g. 30m, 2h, 1d",
        }
    }
}

impl FromStr for ScheduleType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cron" => Ok(ScheduleType::Cron),
            "at" => Ok(ScheduleType::At),
            "every" => Ok(ScheduleType::Every),
            other => Err(format!("unknown schedule type '{}' (cron, at, every)", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PayloadType {
    #[default]
    AgentTurn,
    SystemEvent,
}

impl FromStr for PayloadType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "agentTurn" => Ok(PayloadType::AgentTurn),
            "systemEvent" => Ok(PayloadType::SystemEvent),
            other => Err(format!(
                "unknown payload type '{}' (agentTurn, systemEvent)",
                other
            )),
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CronJob {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub schedule_type: ScheduleType,
    #[serde(default)]
    pub expression: String,
    #[serde(default)]
    pub payload_type: PayloadType,
    #[serde(default)]
    pub payload: Value,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_run: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run: Option<String>,
}

/// Form contents for creating a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CronJobData {
    pub name: String,
    pub schedule_type: ScheduleType,
    pub expression: String,
    pub payload_type: PayloadType,
    pub payload: String,
    pub enabled: bool,
}

impl Default for CronJobData {
    fn default() -> Self {
        Self {
            name: String::new(),
            schedule_type: ScheduleType::Cron,
            expression: String::new(),
            payload_type: PayloadType::AgentTurn,
            payload: String::new(),
            enabled: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CronJobPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule_type: Option<ScheduleType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload_type: Option<PayloadType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

impl CronJobPatch {
    pub fn apply_to(&self, job: &mut CronJob) {
        if let Some(name) = &self.name {
            job.name = name.clone();
        }
        if let Some(schedule_type) = self.schedule_type {
            job.schedule_type = schedule_type;
        }
        if let Some(expression) = &self.expression {
            job.expression = expression.clone();
        }
        if let Some(payload_type) = self.payload_type {
            job.payload_type = payload_type;
        }
        if let Some(payload) = &self.payload {
            job.payload = Value::String(payload.clone());
        }
        if let Some(enabled) = self.enabled {
            job.enabled = enabled;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CronRun {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub triggered_at: Option<String>,
    #[serde(default)]
    pub completed_at: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default)]
    pub duration: Option<Value>,
}

impl CronRun {
    pub fn status_label(&self) -> &str {
        self.status.as_deref().unwrap_or("unknown")
    }

    /// Explicit duration when the gateway reports one, else derived from
    /// the trigger/completion timestamps.
    pub fn duration_label(&self) -> String {
        match &self.duration {
            Some(Value::String(s)) if !s.is_empty() => return s.clone(),
            Some(Value::Number(n)) => return n.to_string(),
            _ => {}
        }
        let (Some(start), Some(end)) = (&self.triggered_at, &self.completed_at) else {
            return "—".to_string();
        };
        let (Ok(start), Ok(end)) = (
            DateTime::parse_from_rfc3339(start),
            DateTime::parse_from_rfc3339(end),
        ) else {
            return "—".to_string();
        };
        let ms = (end - start).num_milliseconds();
        if ms < 1000 {
            format!("{}ms", ms)
        } else {
            format!("{:.1}s", ms as f64 / 1000.0)
        }
    }
}

// ── Sessions ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Ended,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub status: Option<SessionStatus>,
    #[serde(default, alias = "unread")]
    pub unread_count: Option<u32>,
}

impl Session {
    /// Identifier used in per-session endpoints: `id`, falling back to `key`.
    pub fn session_id(&self) -> Option<&str> {
        self.id.as_deref().or(self.key.as_deref())
    }

    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.key.as_deref())
            .or(self.id.as_deref())
            .unwrap_or("")
    }

    pub fn is_active(&self) -> bool {
        self.status == Some(SessionStatus::Active)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    #[default]
    #[serde(other)]
    Agent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(default)]
    pub role: MessageRole,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub timestamp: Option<String>,
}

// ── Agents ──

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TaskHistoryPoint {
    pub date: String,
    pub successes: u64,
    pub failures: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AgentTaskRun {
    pub task_id: String,
    pub status: String,
    pub duration: f64,
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AgentAnalytics {
    pub status: String,
    pub success_rate: f64,
    pub tasks_completed: u64,
    pub failures: u64,
    /// Milliseconds.
    pub avg_duration: f64,
    pub last_task_time: Option<String>,
    pub error_patterns: BTreeMap<String, u64>,
    pub task_history: Vec<TaskHistoryPoint>,
    pub recent_tasks: Vec<AgentTaskRun>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentTaskRecord {
    pub task_id: String,
    pub status: String,
    pub duration: u64,
}

// ── Search ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchSource {
    Notes,
    Tasks,
    Sessions,
}

impl SearchSource {
    pub const ALL: [SearchSource; 3] = [
        SearchSource::Notes,
        SearchSource::Tasks,
        SearchSource::Sessions,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SearchSource::Notes => "notes",
            SearchSource::Tasks => "tasks",
            SearchSource::Sessions => "sessions",
        }
    }

    /// Page a result from this source navigates to.
    pub fn page(&self) -> &'static str {
        match self {
            SearchSource::Notes => "/notes",
            SearchSource::Tasks => "/tasks",
            SearchSource::Sessions => "/sessions",
        }
    }
}

impl FromStr for SearchSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SearchSource::ALL
            .into_iter()
            .find(|src| src.as_str() == s)
            .ok_or_else(|| format!("unknown source '{}' (notes, tasks, sessions)", s))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: String,
    pub source: SearchSource,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub snippet: Option<String>,
    #[serde(default)]
    pub score: Option<f64>,
}

impl SearchResult {
    pub fn page(&self) -> &'static str {
        self.source.page()
    }
}

// ── Dashboard ──

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayStatus {
    pub gateway: String,
    pub uptime_seconds: Option<u64>,
    pub cpu: Option<Value>,
    pub mem: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskSummary {
    pub total: u64,
    pub by_column: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoteSummary {
    pub total: u64,
    pub pinned: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivityEntry {
    pub ts: String,
    pub level: String,
    pub summary: String,
    pub details: Option<String>,
    pub source: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardData {
    pub status: GatewayStatus,
    pub tasks: TaskSummary,
    pub notes: NoteSummary,
    pub activity: Vec<ActivityEntry>,
}

/// `"--"` placeholder for missing gauge values, matching the status cards.
pub fn gauge_label(value: &Option<Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => "--".to_string(),
    }
}

pub fn format_uptime(seconds: u64) -> String {
    let days = seconds / 86_400;
    let hours = (seconds % 86_400) / 3_600;
    let minutes = (seconds % 3_600) / 60;
    if days > 0 {
        format!("{}d {}h {}m", days, hours, minutes)
    } else if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else {
        format!("{}m", minutes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn task_uses_gateway_casing() {
        let task: Task = serde_json::from_value(json!({
            "id": "t1",
            "title": "Write docs",
            "column": "in-progress",
            "priority": "high",
            "assignedTo": "docs",
            "createdAt": "2025-01-01T00:00:00.000Z"
        }))
        .expect("task parses");
        assert_eq!(task.column, Column::InProgress);
        assert_eq!(task.assigned_to, Some(AgentId::Docs));
        assert!(!task.is_deleted());
    }

    #[test]
    fn session_falls_back_to_key_and_unread_alias() {
        let session: Session =
            serde_json::from_value(json!({"key": "agent:main", "status": "active", "unread": 2}))
                .expect("session parses");
        assert_eq!(session.session_id(), Some("agent:main"));
        assert_eq!(session.display_name(), "agent:main");
        assert_eq!(session.unread_count, Some(2));
        assert!(session.is_active());
    }

    #[test]
    fn unknown_message_role_reads_as_agent() {
        let msg: Message =
            serde_json::from_value(json!({"role": "assistant", "content": "hi"})).expect("parses");
        assert_eq!(msg.role, MessageRole::Agent);
    }

    #[test]
    fn cron_run_duration_prefers_explicit_value() {
        let mut run = CronRun {
            id: "r1".into(),
            triggered_at: Some("2025-01-01T00:00:00Z".into()),
            completed_at: Some("2025-01-01T00:00:02.500Z".into()),
            status: None,
            output: None,
            duration: None,
        };
        assert_eq!(run.duration_label(), "2.5s");
        run.completed_at = Some("2025-01-01T00:00:00.250Z".into());
        assert_eq!(run.duration_label(), "250ms");
        run.duration = Some(json!("4s"));
        assert_eq!(run.duration_label(), "4s");
        assert_eq!(run.status_label(), "unknown");
    }

    #[test]
    fn uptime_formats_largest_units() {
        assert_eq!(format_uptime(59), "0m");
        assert_eq!(format_uptime(3_660), "1h 1m");
        assert_eq!(format_uptime(90_061), "1d 1h 1m");
    }
}
