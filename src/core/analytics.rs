use futures_util::future::join_all;

use crate::core::api::{AgentAnalytics, AgentId, AgentTaskRecord, ApiError, Gateway};
use crate::core::cache::{QueryClient, QueryKey, QueryPolicy};
use crate::core::sync::{WriteHandle, fire_and_forget};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateBand {
    Good,
    Fair,
    Poor,
}

impl RateBand {
    pub fn from_rate(rate: f64) -> Self {
        if rate > 90.0 {
            RateBand::Good
        } else if rate > 70.0 {
            RateBand::Fair
        } else {
            RateBand::Poor
        }
    }
}

/// `Xm Ys`, truncating sub-second remainders.
pub fn format_duration(ms: f64) -> String {
    let total_seconds = (ms.max(0.0) / 1000.0).floor() as u64;
    format!("{}m {}s", total_seconds / 60, total_seconds % 60)
}

#[derive(Debug, Clone)]
pub struct AgentReport {
    pub agent: AgentId,
    pub analytics: Option<AgentAnalytics>,
    pub error: Option<ApiError>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FleetStats {
    pub total_tasks: u64,
    /// Percentage; 0 when no agent has run anything.
    pub success_rate: f64,
}

pub fn fleet_stats(reports: &[AgentReport]) -> FleetStats {
    let (completed, all) = reports
        .iter()
        .filter_map(|r| r.analytics.as_ref())
        .fold((0u64, 0u64), |(completed, all), a| {
            (completed + a.tasks_completed, all + a.tasks_completed + a.failures)
        });
    FleetStats {
        total_tasks: all,
        success_rate: if all > 0 {
            completed as f64 / all as f64 * 100.0
        } else {
            0.0
        },
    }
}

/// Fetch analytics for every agent through the shared cache.
pub async fn load_fleet(client: &QueryClient, gateway: &Gateway) -> Vec<AgentReport> {
    let queries = AgentId::ALL.map(|agent| {
        let gateway = gateway.clone();
        let query = client.query(
            QueryKey::agent_analytics(agent),
            QueryPolicy::AGENT_ANALYTICS,
            move || {
                let gateway = gateway.clone();
                async move { gateway.agent_analytics(agent).await }
            },
        );
        async move {
            let state = query.get().await;
            AgentReport {
                agent,
                analytics: state.data,
                error: state.error,
            }
        }
    });
    join_all(queries).await
}

/// Report a finished agent task run. Fire-and-forget like every other write.
pub fn record_task(
    client: &QueryClient,
    gateway: &Gateway,
    agent: AgentId,
    record: AgentTaskRecord,
) -> WriteHandle {
    let gateway = gateway.clone();
    let invalidate = Some((client.clone(), QueryKey::agent_analytics(agent)));
    fire_and_forget("record agent task", invalidate, async move {
        gateway.record_agent_task(agent, &record).await
    })
}
