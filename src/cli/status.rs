use std::sync::Arc;

use anyhow::Result;
use console::style;
use tokio_util::sync::CancellationToken;

use super::{Dashboard, parse_command_args};
use crate::core::api::{ActivityEntry, DashboardData, format_uptime, gauge_label};
use crate::core::cache::{
    ConnectionMonitor, ConnectionStatus, Query, QueryKey, QueryPolicy, QueryState, spawn_poller,
};
use crate::core::terminal::{GuideSection, print_info, truncate};

const DEFAULT_ACTIVITY_LIMIT: u32 = 20;

fn dashboard_query(app: &Dashboard) -> Arc<Query<DashboardData>> {
    let gateway = app.gateway.clone();
    app.client
        .query(QueryKey::dashboard(), QueryPolicy::DASHBOARD, move || {
            let gateway = gateway.clone();
            async move { gateway.dashboard().await }
        })
}

fn styled_status(status: ConnectionStatus) -> String {
    match status {
        ConnectionStatus::Connected => style(status.label()).green().bold().to_string(),
        ConnectionStatus::Disconnected => style(status.label()).red().bold().to_string(),
        ConnectionStatus::Checking => style(status.label()).yellow().to_string(),
    }
}

fn activity_line(entry: &ActivityEntry) -> String {
    let level = match entry.level.as_str() {
        "error" => style(&entry.level).red().to_string(),
        "warn" | "warning" => style(&entry.level).yellow().to_string(),
        _ => style(&entry.level).dim().to_string(),
    };
    format!(
        "{} [{}] {} {}",
        style(&entry.ts).dim(),
        level,
        truncate(&entry.summary, 80),
        style(format!("({})", entry.source)).dim()
    )
}

/// One-line summary printed by `watch` whenever something changes.
pub(crate) fn watch_line(status: ConnectionStatus, dashboard: &QueryState<DashboardData>) -> String {
    let mut parts = vec![format!("connection: {}", status.label())];
    if let Some(data) = &dashboard.data {
        if !data.status.gateway.is_empty() {
            parts.push(format!("gateway: {}", data.status.gateway));
        }
        if let Some(uptime) = data.status.uptime_seconds {
            parts.push(format!("uptime {}", format_uptime(uptime)));
        }
        parts.push(format!("tasks {}", data.tasks.total));
        parts.push(format!("notes {}", data.notes.total));
    }
    if let Some(e) = &dashboard.error {
        parts.push(format!("error: {}", e));
    }
    parts.join(" · ")
}

pub async fn run_status(app: &Dashboard) -> Result<()> {
    let monitor = ConnectionMonitor::start(&app.client, app.gateway.clone());
    let mut probe = monitor.subscribe();
    let _ = probe
        .wait_for(|state| ConnectionStatus::from_probe(state) != ConnectionStatus::Checking)
        .await;
    let connection = monitor.status();

    let state = dashboard_query(app).get().await;
    let mut gateway = GuideSection::new("Gateway").status("Connection", &styled_status(connection));

    let Some(data) = state.data else {
        if let Some(e) = state.error {
            gateway = gateway.blank().info(&format!("Dashboard unavailable: {}", e));
        }
        gateway.print();
        println!();
        return Ok(());
    };

    let uptime = data
        .status
        .uptime_seconds
        .map(format_uptime)
        .unwrap_or_else(|| "--".to_string());
    let gateway_state = if data.status.gateway.is_empty() {
        "--".to_string()
    } else {
        data.status.gateway.clone()
    };
    gateway
        .status("Gateway", &gateway_state)
        .status("Uptime", &uptime)
        .status("CPU", &gauge_label(&data.status.cpu))
        .status("Memory", &gauge_label(&data.status.mem))
        .print();

    let mut tasks = GuideSection::new("Tasks").status("Total", &data.tasks.total.to_string());
    for (column, count) in &data.tasks.by_column {
        tasks = tasks.status(column, &gauge_label(&Some(count.clone())));
    }
    tasks.print();

    GuideSection::new("Notes")
        .status("Total", &data.notes.total.to_string())
        .status("Pinned", &data.notes.pinned.to_string())
        .print();

    if !data.activity.is_empty() {
        let mut recent = GuideSection::new("Recent activity");
        for entry in data.activity.iter().take(5) {
            recent = recent.bullet(&activity_line(entry));
        }
        recent.print();
    }
    println!();
    Ok(())
}

/// Emit a summary line whenever the connection or dashboard changes, until
/// `stop` resolves. Unchanged lines are not repeated.
pub(crate) async fn watch_changes<F>(
    monitor: &ConnectionMonitor,
    dashboard: &Query<DashboardData>,
    stop: F,
    mut emit: impl FnMut(String),
) where
    F: Future<Output = ()>,
{
    let mut connection_rx = monitor.subscribe();
    let mut dashboard_rx = dashboard.subscribe();
    tokio::pin!(stop);

    let mut last_line = String::new();
    loop {
        tokio::select! {
            _ = &mut stop => break,
            changed = connection_rx.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            changed = dashboard_rx.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }

        let status = monitor.status();
        if status == ConnectionStatus::Checking {
            continue;
        }
        let line = watch_line(status, &dashboard.state());
        if line != last_line {
            last_line = line.clone();
            emit(line);
        }
    }
}

pub async fn run_watch(app: &Dashboard) -> Result<()> {
    let monitor = ConnectionMonitor::start(&app.client, app.gateway.clone());
    let dashboard = dashboard_query(app);
    let cancel = CancellationToken::new();
    let poller = spawn_poller(Arc::clone(&dashboard), cancel.clone());

    print_info("Watching the gateway. Press Ctrl+C to stop.");
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    watch_changes(&monitor, &dashboard, ctrl_c, |line| {
        println!(
            "{} {}",
            style(chrono::Local::now().format("%H:%M:%S")).dim(),
            line
        );
    })
    .await;

    cancel.cancel();
    let _ = poller.await;
    Ok(())
}

pub async fn run_activity(app: &Dashboard, args: &[String]) -> Result<()> {
    let parsed = parse_command_args(args, 2, &[]);
    let limit = parsed
        .value("--limit")
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_ACTIVITY_LIMIT);

    let entries = app.gateway.activity(Some(limit)).await?;
    let mut section = GuideSection::new("Activity");
    if entries.is_empty() {
        section = section.text("No activity recorded yet.");
    }
    for entry in &entries {
        section = section.bullet(&activity_line(entry));
        if let Some(details) = entry.details.as_deref().filter(|d| !d.is_empty()) {
            section = section.hint(&format!("  {}", truncate(details, 100)));
        }
    }
    section.print();
    println!();
    Ok(())
}
