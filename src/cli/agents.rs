use anyhow::{Result, anyhow, bail};
use console::style;
use serde::Serialize;

use super::{Dashboard, parse_command_args};
use crate::core::analytics::{
    AgentReport, FleetStats, RateBand, fleet_stats, format_duration, load_fleet, record_task,
};
use crate::core::api::{AgentAnalytics, AgentId, AgentTaskRecord};
use crate::core::terminal::{GuideSection, print_success, print_warn};

fn print_agent_help() {
    GuideSection::new("Agents")
        .command("list", "Analytics for every agent [--json]")
        .command("show <agent>", "Error patterns, recent runs and daily history")
        .command("record <agent> <task-id>", "--status <s> --duration <ms>")
        .print();
    println!();
}

fn styled_rate(rate: f64) -> String {
    let text = format!("{:.1}%", rate);
    match RateBand::from_rate(rate) {
        RateBand::Good => style(text).green().bold().to_string(),
        RateBand::Fair => style(text).yellow().to_string(),
        RateBand::Poor => style(text).red().to_string(),
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FleetExport<'a> {
    exported_at: String,
    total_tasks: u64,
    success_rate: f64,
    agents: Vec<AgentExport<'a>>,
}

#[derive(Serialize)]
struct AgentExport<'a> {
    agent: AgentId,
    #[serde(skip_serializing_if = "Option::is_none")]
    analytics: Option<&'a AgentAnalytics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

pub(crate) fn export_json(reports: &[AgentReport], stats: FleetStats) -> Result<String> {
    let export = FleetExport {
        exported_at: crate::core::api::now_iso(),
        total_tasks: stats.total_tasks,
        success_rate: stats.success_rate,
        agents: reports
            .iter()
            .map(|r| AgentExport {
                agent: r.agent,
                analytics: r.analytics.as_ref(),
                error: r.error.as_ref().map(|e| e.to_string()),
            })
            .collect(),
    };
    Ok(serde_json::to_string_pretty(&export)?)
}

async fn list(app: &Dashboard, json: bool) -> Result<()> {
    let reports = load_fleet(&app.client, &app.gateway).await;
    let stats = fleet_stats(&reports);

    if json {
        println!("{}", export_json(&reports, stats)?);
        return Ok(());
    }

    GuideSection::new("Fleet")
        .status("Tasks", &stats.total_tasks.to_string())
        .status("Success rate", &styled_rate(stats.success_rate))
        .print();

    let mut section = GuideSection::new("Agents");
    for report in &reports {
        let line = match (&report.analytics, &report.error) {
            (Some(a), _) => format!(
                "{} [{}] {} done · {} failed · avg {} · {}",
                style(report.agent.as_str()).bold(),
                if a.status.is_empty() { "unknown" } else { a.status.as_str() },
                a.tasks_completed,
                a.failures,
                format_duration(a.avg_duration),
                styled_rate(a.success_rate)
            ),
            (None, Some(e)) => format!(
                "{} {}",
                style(report.agent.as_str()).bold(),
                style(format!("unavailable: {}", e)).red()
            ),
            (None, None) => format!("{} {}", style(report.agent.as_str()).bold(), style("no data").dim()),
        };
        section = section.bullet(&line);
    }
    section.print();
    println!();
    Ok(())
}

async fn show(app: &Dashboard, agent: AgentId) -> Result<()> {
    let analytics = app.gateway.agent_analytics(agent).await?;
    let mut section = GuideSection::new(&format!("Agent · {}", agent))
        .status("Status", &analytics.status)
        .status("Success rate", &styled_rate(analytics.success_rate))
        .status("Completed", &analytics.tasks_completed.to_string())
        .status("Failures", &analytics.failures.to_string())
        .status("Avg duration", &format_duration(analytics.avg_duration))
        .status(
            "Last task",
            analytics.last_task_time.as_deref().unwrap_or("—"),
        );

    if !analytics.error_patterns.is_empty() {
        section = section.blank().text(&style("Error patterns").bold().to_string());
        let mut patterns: Vec<_> = analytics.error_patterns.iter().collect();
        patterns.sort_by(|a, b| b.1.cmp(a.1));
        for (pattern, count) in patterns {
            section = section.bullet(&format!("{} ×{}", pattern, count));
        }
    }
    if !analytics.recent_tasks.is_empty() {
        section = section.blank().text(&style("Recent tasks").bold().to_string());
        for run in &analytics.recent_tasks {
            section = section.bullet(&format!(
                "{} [{}] {}",
                run.task_id,
                run.status,
                format_duration(run.duration)
            ));
        }
    }
    if !analytics.task_history.is_empty() {
        section = section.blank().text(&style("History").bold().to_string());
        for day in &analytics.task_history {
            section = section.bullet(&format!(
                "{} {} ok · {} failed",
                day.date, day.successes, day.failures
            ));
        }
    }
    section.print();
    println!();
    Ok(())
}

pub async fn run_agents_command(app: &Dashboard, args: &[String]) -> Result<()> {
    // `agents --json` lists without naming the subcommand.
    let (sub_cmd, start) = match args.get(2).map(String::as_str) {
        Some(s) if !s.starts_with('-') => (s, 3),
        _ => ("list", 2),
    };
    let parsed = parse_command_args(args, start, &["--json"]);
    let agent = || -> Result<AgentId> {
        parsed
            .arg(0)
            .ok_or_else(|| anyhow!("agent is required"))?
            .parse()
            .map_err(|e: String| anyhow!(e))
    };

    match sub_cmd {
        "list" | "ls" => list(app, parsed.has("--json")).await,
        "show" => show(app, agent()?).await,
        "record" => {
            let agent = agent()?;
            let task_id = parsed
                .arg(1)
                .ok_or_else(|| anyhow!("task id is required"))?
                .to_string();
            let status = parsed
                .value("--status")
                .ok_or_else(|| anyhow!("--status is required"))?
                .to_string();
            let duration = match parsed.value("--duration") {
                Some(ms) => ms
                    .parse()
                    .map_err(|_| anyhow!("--duration must be whole milliseconds"))?,
                None => {
                    print_warn("No --duration given, recording 0ms.");
                    0
                }
            };
            record_task(
                &app.client,
                &app.gateway,
                agent,
                AgentTaskRecord {
                    task_id: task_id.clone(),
                    status,
                    duration,
                },
            )
            .settled()
            .await;
            print_success(&format!("Recorded {} for {}", task_id, agent));
            Ok(())
        }
        "help" => {
            print_agent_help();
            Ok(())
        }
        other => {
            print_agent_help();
            bail!("unknown agents subcommand '{}'", other)
        }
    }
}
