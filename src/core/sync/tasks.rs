use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use uuid::Uuid;

use super::{
    IntentError, Mirror, Reconcile, SharedMirror, Snapshot, WriteHandle, fire_and_forget, lock,
};
use crate::core::api::{
    AgentId, Column, DELETED_STATUS, Gateway, Task, TaskComment, TaskDraft, TaskFilter,
    TaskUpdate, now_iso,
};
use crate::core::cache::{Query, QueryClient, QueryKey, QueryPolicy};
use crate::core::kanban::MoveIntent;

/// Kanban mirror. Clones share the same board.
#[derive(Clone)]
pub struct TaskBoard {
    mirror: SharedMirror<Task>,
    gateway: Gateway,
    client: QueryClient,
}

fn require(value: &str, field: &'static str) -> Result<String, IntentError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(IntentError::Required(field));
    }
    Ok(trimmed.to_string())
}

fn not_found(id: &str) -> IntentError {
    IntentError::NotFound {
        kind: "task",
        id: id.to_string(),
    }
}

impl TaskBoard {
    pub fn new(gateway: Gateway, client: QueryClient) -> Self {
        Self {
            mirror: Arc::new(Mutex::new(Mirror::default())),
            gateway,
            client,
        }
    }

    /// The polled task list this board reconciles against.
    pub fn query(&self) -> Arc<Query<Vec<Task>>> {
        let gateway = self.gateway.clone();
        self.client
            .query(QueryKey::tasks(), QueryPolicy::TASKS, move || {
                let gateway = gateway.clone();
                async move { gateway.tasks(&TaskFilter::default()).await }
            })
    }

    /// Visible tasks in mirror order.
    pub fn tasks(&self) -> Vec<Task> {
        lock(&self.mirror)
            .items()
            .iter()
            .filter(|t| !t.is_deleted())
            .cloned()
            .collect()
    }

    pub fn get(&self, id: &str) -> Option<Task> {
        self.tasks().into_iter().find(|t| t.id == id)
    }

    pub fn column(&self, column: Column) -> Vec<Task> {
        self.tasks()
            .into_iter()
            .filter(|t| t.column == column)
            .collect()
    }

    /// Visible task count per column, every column present.
    pub fn counts(&self) -> BTreeMap<Column, usize> {
        let mut counts: BTreeMap<Column, usize> = Column::ALL.iter().map(|c| (*c, 0)).collect();
        for task in self.tasks() {
            *counts.entry(task.column).or_default() += 1;
        }
        counts
    }

    pub fn create(&self, draft: TaskDraft) -> Result<(Task, WriteHandle), IntentError> {
        let title = require(&draft.title, "title")?;
        let task = Task {
            id: Uuid::new_v4().to_string(),
            title,
            description: draft
                .description
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty()),
            column: draft.column,
            priority: draft.priority,
            assigned_to: draft.assigned_to,
            created_at: now_iso(),
            updated_at: None,
            comments: Vec::new(),
            status: None,
        };

        lock(&self.mirror).apply(|items| items.push(task.clone()));

        let gateway = self.gateway.clone();
        let payload = task.clone();
        let handle = fire_and_forget("create task", None, async move {
            gateway.create_task(&payload).await
        });
        Ok((task, handle))
    }

    pub fn update(&self, id: &str, update: TaskUpdate) -> Result<WriteHandle, IntentError> {
        if let Some(title) = &update.title {
            require(title, "title")?;
        }
        {
            let mut mirror = lock(&self.mirror);
            let found = mirror.apply(|items| {
                let Some(task) = items.iter_mut().find(|t| t.id == id && !t.is_deleted()) else {
                    return false;
                };
                if let Some(title) = &update.title {
                    task.title = title.trim().to_string();
                }
                if let Some(description) = &update.description {
                    task.description = Some(description.clone());
                }
                if let Some(column) = update.column {
                    task.column = column;
                }
                if let Some(priority) = update.priority {
                    task.priority = priority;
                }
                if let Some(status) = &update.status {
                    task.status = Some(status.clone());
                }
                task.updated_at = Some(now_iso());
                true
            });
            if !found {
                return Err(not_found(id));
            }
        }
        Ok(self.persist_update("update task", id, update))
    }

    /// Pure column reassignment; the task is never duplicated or dropped.
    pub fn move_task(&self, id: &str, column: Column) -> Result<WriteHandle, IntentError> {
        self.update(
            id,
            TaskUpdate {
                column: Some(column),
                ..TaskUpdate::default()
            },
        )
    }

    pub fn apply_move(&self, intent: MoveIntent) -> Result<WriteHandle, IntentError> {
        self.move_task(&intent.task_id, intent.column)
    }

    /// Hide the task immediately; the server only sees a status change.
    pub fn delete(&self, id: &str) -> Result<WriteHandle, IntentError> {
        let removed = lock(&self.mirror).apply(|items| {
            let before = items.len();
            items.retain(|t| t.id != id);
            items.len() != before
        });
        if !removed {
            return Err(not_found(id));
        }
        let update = TaskUpdate {
            status: Some(DELETED_STATUS.to_string()),
            ..TaskUpdate::default()
        };
        Ok(self.persist_update("delete task", id, update))
    }

    pub fn comment(&self, id: &str, text: &str) -> Result<WriteHandle, IntentError> {
        let text = require(text, "comment")?;
        let comment = TaskComment {
            id: Uuid::new_v4().to_string(),
            text: text.clone(),
            created_at: now_iso(),
        };
        let found = lock(&self.mirror).apply(|items| {
            items
                .iter_mut()
                .find(|t| t.id == id && !t.is_deleted())
                .map(|task| task.comments.push(comment))
                .is_some()
        });
        if !found {
            return Err(not_found(id));
        }
        let gateway = self.gateway.clone();
        let id = id.to_string();
        Ok(fire_and_forget("comment on task", None, async move {
            gateway.add_task_comment(&id, &text).await
        }))
    }

    pub fn assign(
        &self,
        id: &str,
        agent: AgentId,
        instructions: Option<String>,
    ) -> Result<WriteHandle, IntentError> {
        let found = lock(&self.mirror).apply(|items| {
            items
                .iter_mut()
                .find(|t| t.id == id && !t.is_deleted())
                .map(|task| {
                    task.assigned_to = Some(agent);
                    task.updated_at = Some(now_iso());
                })
                .is_some()
        });
        if !found {
            return Err(not_found(id));
        }
        let gateway = self.gateway.clone();
        let id = id.to_string();
        Ok(fire_and_forget("assign task", None, async move {
            gateway
                .assign_task(&id, agent, instructions.as_deref())
                .await
        }))
    }

    fn persist_update(&self, label: &'static str, id: &str, update: TaskUpdate) -> WriteHandle {
        let gateway = self.gateway.clone();
        let id = id.to_string();
        fire_and_forget(label, None, async move {
            gateway.update_task(&id, &update).await
        })
    }
}

impl Reconcile for TaskBoard {
    type Item = Task;

    fn reconcile(&self, snapshot: Snapshot<Task>) -> bool {
        lock(&self.mirror).reconcile(snapshot)
    }
}
