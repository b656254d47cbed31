use std::sync::{Arc, Mutex};

use serde_json::Value;
use uuid::Uuid;

use super::{
    IntentError, Mirror, Reconcile, SharedMirror, Snapshot, WriteHandle, fire_and_forget, lock,
};
use crate::core::api::{CronJob, CronJobData, CronJobPatch, CronRun, Gateway, now_iso};
use crate::core::cache::{Query, QueryClient, QueryKey, QueryPolicy};

#[derive(Clone)]
pub struct CronBoard {
    mirror: SharedMirror<CronJob>,
    gateway: Gateway,
    client: QueryClient,
}

fn not_found(id: &str) -> IntentError {
    IntentError::NotFound {
        kind: "cron job",
        id: id.to_string(),
    }
}

fn check_required(name: Option<&str>, expression: Option<&str>) -> Result<(), IntentError> {
    if name.is_some_and(|n| n.trim().is_empty()) {
        return Err(IntentError::Required("name"));
    }
    if expression.is_some_and(|e| e.trim().is_empty()) {
        return Err(IntentError::Required("expression"));
    }
    Ok(())
}

impl CronBoard {
    pub fn new(gateway: Gateway, client: QueryClient) -> Self {
        Self {
            mirror: Arc::new(Mutex::new(Mirror::default())),
            gateway,
            client,
        }
    }

    pub fn query(&self) -> Arc<Query<Vec<CronJob>>> {
        let gateway = self.gateway.clone();
        self.client
            .query(QueryKey::cron_jobs(), QueryPolicy::CRON_JOBS, move || {
                let gateway = gateway.clone();
                async move { gateway.cron_jobs().await }
            })
    }

    /// Run history for one job, fetched on demand.
    pub fn runs_query(&self, id: &str) -> Arc<Query<Vec<CronRun>>> {
        let gateway = self.gateway.clone();
        let id = id.to_string();
        self.client
            .query(QueryKey::cron_runs(&id), QueryPolicy::CRON_RUNS, move || {
                let gateway = gateway.clone();
                let id = id.clone();
                async move { gateway.cron_runs(&id).await }
            })
    }

    pub fn jobs(&self) -> Vec<CronJob> {
        lock(&self.mirror).items().to_vec()
    }

    pub fn get(&self, id: &str) -> Option<CronJob> {
        lock(&self.mirror).items().iter().find(|j| j.id == id).cloned()
    }

    fn invalidation(&self) -> Option<(QueryClient, QueryKey)> {
        Some((self.client.clone(), QueryKey::cron_jobs()))
    }

    pub fn create(&self, data: CronJobData) -> Result<(String, WriteHandle), IntentError> {
        check_required(Some(&data.name), Some(&data.expression))?;
        let data = CronJobData {
            name: data.name.trim().to_string(),
            expression: data.expression.trim().to_string(),
            ..data
        };
        let local_id = format!("local-{}", Uuid::new_v4());
        let job = CronJob {
            id: local_id.clone(),
            name: data.name.clone(),
            schedule_type: data.schedule_type,
            expression: data.expression.clone(),
            payload_type: data.payload_type,
            payload: Value::String(data.payload.clone()),
            enabled: data.enabled,
            next_run: None,
            last_run: None,
        };
        lock(&self.mirror).apply(|items| items.push(job));

        let gateway = self.gateway.clone();
        let mirror = self.mirror.clone();
        let placeholder = local_id.clone();
        let handle = fire_and_forget("create cron job", self.invalidation(), async move {
            if let Some(server_id) = gateway.create_cron_job(&data).await? {
                let mut guard = lock(&mirror);
                if let Some(job) = guard.items_mut().iter_mut().find(|j| j.id == placeholder) {
                    job.id = server_id;
                }
            }
            Ok(())
        });
        Ok((local_id, handle))
    }

    pub fn update(&self, id: &str, patch: CronJobPatch) -> Result<WriteHandle, IntentError> {
        check_required(patch.name.as_deref(), patch.expression.as_deref())?;
        let found = lock(&self.mirror).apply(|items| {
            items
                .iter_mut()
                .find(|j| j.id == id)
                .map(|job| patch.apply_to(job))
                .is_some()
        });
        if !found {
            return Err(not_found(id));
        }
        let gateway = self.gateway.clone();
        let id = id.to_string();
        Ok(fire_and_forget("update cron job", self.invalidation(), async move {
            gateway.update_cron_job(&id, &patch).await
        }))
    }

    pub fn set_enabled(&self, id: &str, enabled: bool) -> Result<WriteHandle, IntentError> {
        self.update(
            id,
            CronJobPatch {
                enabled: Some(enabled),
                ..CronJobPatch::default()
            },
        )
    }

    pub fn delete(&self, id: &str) -> Result<WriteHandle, IntentError> {
        let removed = lock(&self.mirror).apply(|items| {
            let before = items.len();
            items.retain(|j| j.id != id);
            items.len() != before
        });
        if !removed {
            return Err(not_found(id));
        }
        let gateway = self.gateway.clone();
        let id = id.to_string();
        Ok(fire_and_forget("delete cron job", self.invalidation(), async move {
            gateway.delete_cron_job(&id).await
        }))
    }

    /// Trigger a run now. Only `lastRun` moves locally; the run list is
    /// fetched separately.
    pub fn run(&self, id: &str) -> Result<WriteHandle, IntentError> {
        let found = lock(&self.mirror).apply(|items| {
            items
                .iter_mut()
                .find(|j| j.id == id)
                .map(|job| job.last_run = Some(now_iso()))
                .is_some()
        });
        if !found {
            return Err(not_found(id));
        }
        let gateway = self.gateway.clone();
        let id = id.to_string();
        Ok(fire_and_forget("run cron job", None, async move {
            gateway.run_cron_job(&id).await
        }))
    }
}

impl Reconcile for CronBoard {
    type Item = CronJob;

    fn reconcile(&self, snapshot: Snapshot<CronJob>) -> bool {
        lock(&self.mirror).reconcile(snapshot)
    }
}
