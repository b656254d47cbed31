use anyhow::{Context, Result, anyhow, bail};
use console::style;
use serde_json::Value;

use super::{CommandArgs, Dashboard, parse_command_args, sync_store};
use crate::core::api::{CronJob, CronJobData, CronJobPatch, PayloadType, ScheduleType};
use crate::core::sync::CronBoard;
use crate::core::terminal::{GuideSection, print_success, truncate};

fn print_cron_help() {
    GuideSection::new("Cron")
        .command("list", "Scheduled jobs")
        .command("add", "--name <n> --expr <e> [--schedule cron|at|every] [--payload-type agentTurn|systemEvent] [--payload <text>] [--disabled]")
        .command("edit <id>", "[--name] [--expr] [--schedule] [--payload-type] [--payload]")
        .command("enable <id>", "Resume a job")
        .command("disable <id>", "Pause a job")
        .command("run <id>", "Trigger a run now")
        .command("runs <id>", "Run history")
        .command("delete <id>", "Delete a job")
        .blank()
        .hint(ScheduleType::Cron.help())
        .hint(ScheduleType::At.help())
        .hint(ScheduleType::Every.help())
        .print();
    println!();
}

async fn loaded_board(app: &Dashboard) -> Result<CronBoard> {
    let board = CronBoard::new(app.gateway.clone(), app.client.clone());
    sync_store(&board, board.query())
        .await
        .context("could not load cron jobs")?;
    Ok(board)
}

fn parse_schedule(value: &str) -> Result<ScheduleType> {
    value.parse().map_err(|e: String| anyhow!(e))
}

fn parse_payload_type(value: &str) -> Result<PayloadType> {
    value.parse().map_err(|e: String| anyhow!(e))
}

fn payload_text(payload: &Value) -> String {
    match payload {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn job_line(job: &CronJob) -> String {
    let state = if job.enabled {
        style("enabled").green().to_string()
    } else {
        style("paused").dim().to_string()
    };
    format!(
        "{} {} [{}] {} {}",
        style(&job.id).dim(),
        style(&job.name).bold(),
        state,
        style(format!("{} {}", job.schedule_type.as_str(), job.expression)).cyan(),
        style(format!(
            "next: {} · last: {}",
            job.next_run.as_deref().unwrap_or("—"),
            job.last_run.as_deref().unwrap_or("never")
        ))
        .dim()
    )
}

pub(crate) fn job_data(parsed: &CommandArgs) -> Result<CronJobData> {
    let mut data = CronJobData {
        name: parsed.value("--name").unwrap_or("").to_string(),
        expression: parsed.value("--expr").unwrap_or("").to_string(),
        payload: parsed.value("--payload").unwrap_or("").to_string(),
        enabled: !parsed.has("--disabled"),
        ..CronJobData::default()
    };
    if let Some(schedule) = parsed.value("--schedule") {
        data.schedule_type = parse_schedule(schedule)?;
    }
    if let Some(payload_type) = parsed.value("--payload-type") {
        data.payload_type = parse_payload_type(payload_type)?;
    }
    Ok(data)
}

pub(crate) fn job_patch(parsed: &CommandArgs) -> Result<CronJobPatch> {
    Ok(CronJobPatch {
        name: parsed.value("--name").map(str::to_string),
        schedule_type: parsed.value("--schedule").map(parse_schedule).transpose()?,
        expression: parsed.value("--expr").map(str::to_string),
        payload_type: parsed
            .value("--payload-type")
            .map(parse_payload_type)
            .transpose()?,
        payload: parsed.value("--payload").map(str::to_string),
        enabled: None,
    })
}

async fn list(app: &Dashboard) -> Result<()> {
    let board = loaded_board(app).await?;
    let jobs = board.jobs();
    let mut section = GuideSection::new(&format!("Cron jobs ({})", jobs.len()));
    if jobs.is_empty() {
        section = section.text("No scheduled jobs.");
    }
    for job in &jobs {
        section = section.bullet(&job_line(job));
        let payload = payload_text(&job.payload);
        if !payload.is_empty() {
            section = section.hint(&format!("  {}", truncate(&payload, 80)));
        }
    }
    section.print();
    println!();
    Ok(())
}

async fn runs(app: &Dashboard, id: &str) -> Result<()> {
    let board = CronBoard::new(app.gateway.clone(), app.client.clone());
    let state = board.runs_query(id).get().await;
    if let Some(e) = state.error {
        return Err(e).context("could not load runs");
    }
    let runs = state.data.unwrap_or_default();
    let mut section = GuideSection::new(&format!("Runs · {}", id));
    if runs.is_empty() {
        section = section.text("This job has not run yet.");
    }
    for run in &runs {
        let status = match run.status_label() {
            "success" | "completed" | "ok" => style(run.status_label()).green().to_string(),
            "failed" | "error" => style(run.status_label()).red().to_string(),
            other => style(other).yellow().to_string(),
        };
        section = section.bullet(&format!(
            "{} [{}] {}",
            run.triggered_at.as_deref().unwrap_or("—"),
            status,
            style(run.duration_label()).dim()
        ));
        if let Some(output) = run.output.as_deref().filter(|o| !o.is_empty()) {
            section = section.hint(&format!("  {}", truncate(output, 100)));
        }
    }
    section.print();
    println!();
    Ok(())
}

pub async fn run_cron_command(app: &Dashboard, args: &[String]) -> Result<()> {
    let sub_cmd = if args.len() > 2 { args[2].as_str() } else { "list" };
    let parsed = parse_command_args(args, 3, &["--disabled"]);
    let id = || {
        parsed
            .arg(0)
            .ok_or_else(|| anyhow!("job id is required"))
    };

    match sub_cmd {
        "list" | "ls" => list(app).await,
        "add" | "new" => {
            let data = job_data(&parsed)?;
            let board = CronBoard::new(app.gateway.clone(), app.client.clone());
            let (_, write) = board.create(data)?;
            write.settled().await;
            match board.jobs().first() {
                Some(job) => print_success(&format!("Scheduled '{}' ({})", job.name, job.id)),
                None => print_success("Scheduled job"),
            }
            Ok(())
        }
        "edit" => {
            let id = id()?;
            let patch = job_patch(&parsed)?;
            if patch == CronJobPatch::default() {
                bail!("nothing to change");
            }
            let board = loaded_board(app).await?;
            board.update(id, patch)?.settled().await;
            print_success(&format!("Updated {}", id));
            Ok(())
        }
        "enable" | "disable" => {
            let id = id()?;
            let enabled = sub_cmd == "enable";
            let board = loaded_board(app).await?;
            board.set_enabled(id, enabled)?.settled().await;
            print_success(&format!(
                "{} {}",
                if enabled { "Enabled" } else { "Paused" },
                id
            ));
            Ok(())
        }
        "run" => {
            let id = id()?;
            let board = loaded_board(app).await?;
            board.run(id)?.settled().await;
            print_success(&format!("Triggered {}", id));
            Ok(())
        }
        "runs" | "history" => runs(app, id()?).await,
        "delete" | "rm" => {
            let id = id()?;
            let board = loaded_board(app).await?;
            board.delete(id)?.settled().await;
            print_success(&format!("Deleted {}", id));
            Ok(())
        }
        "help" => {
            print_cron_help();
            Ok(())
        }
        other => {
            print_cron_help();
            bail!("unknown cron subcommand '{}'", other)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::parse_command_args;

    fn argv(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn add_flags_build_job_data() {
        let args = argv(&[
            "milo-dashboard", "cron", "add", "--name", "digest", "--expr", "30m",
            "--schedule", "every", "--payload-type", "systemEvent", "--disabled",
        ]);
        let data = job_data(&parse_command_args(&args, 3, &["--disabled"])).unwrap();
        assert_eq!(data.name, "digest");
        assert_eq!(data.schedule_type, ScheduleType::Every);
        assert_eq!(data.payload_type, PayloadType::SystemEvent);
        assert!(!data.enabled);
    }

    #[test]
    fn edit_flags_only_touch_given_fields() {
        let args = argv(&["milo-dashboard", "cron", "edit", "c1", "--expr", "0 9 * * 1"]);
        let patch = job_patch(&parse_command_args(&args, 3, &[])).unwrap();
        assert_eq!(
            patch,
            CronJobPatch {
                expression: Some("0 9 * * 1".into()),
                ..CronJobPatch::default()
            }
        );
        let bad = argv(&["milo-dashboard", "cron", "edit", "c1", "--schedule", "weekly"]);
        assert!(job_patch(&parse_command_args(&bad, 3, &[])).is_err());
    }
}
