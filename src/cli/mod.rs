mod agents;
mod cron;
mod notes;
mod search;
mod sessions;
mod status;
mod tasks;

use std::sync::Arc;

use anyhow::Result;
use console::style;
use tokio::time::Instant;
use tracing::debug;

use crate::core::api::Gateway;
use crate::core::cache::{Query, QueryClient};
use crate::core::config::{ConfigOverrides, DashboardConfig, default_config_path};
use crate::core::sync::{Reconcile, Snapshot};
use crate::core::terminal::{self, GuideSection, print_error};

fn print_help() {
    terminal::print_banner();

    GuideSection::new("Overview")
        .command("status", "Gateway health, task and note totals, recent activity")
        .command("watch", "Follow connection status and totals until Ctrl+C")
        .command("activity", "Recent gateway activity")
        .print();

    GuideSection::new("Work")
        .command("tasks", "Kanban board: list, add, move, edit, delete, comment, assign")
        .command("notes", "Notes: list, show, add, edit, pin, delete")
        .command("cron", "Scheduled jobs: list, add, edit, enable, disable, run, runs, delete")
        .command("sessions", "Agent sessions: list, history, send")
        .command("agents", "Per-agent analytics and task recording")
        .command("search", "Search notes, tasks and sessions")
        .print();

    GuideSection::new("Setup")
        .command("config", "Show the resolved gateway configuration")
        .print();

    GuideSection::new("Global flags")
        .status("--api-url <url>", "Gateway base URL")
        .status("--token <token>", "Bearer token")
        .status("-v, --verbose", "Debug logging on stderr")
        .print();

    println!(
        "\n {} {} [flags] <command> [subcommand]\n",
        style("Usage:").bold(),
        style("milo-dashboard").green()
    );
}

/// Flags accepted before or after the command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct GlobalFlags {
    pub overrides: ConfigOverrides,
    pub verbose: bool,
    /// Everything else, program name first.
    pub rest: Vec<String>,
}

pub(crate) fn parse_global_flags(args: &[String]) -> GlobalFlags {
    let mut flags = GlobalFlags::default();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--api-url" => {
                if i + 1 < args.len() {
                    flags.overrides.api_url = Some(args[i + 1].clone());
                    i += 2;
                } else {
                    i += 1;
                }
            }
            "--token" => {
                if i + 1 < args.len() {
                    flags.overrides.token = Some(args[i + 1].clone());
                    i += 2;
                } else {
                    i += 1;
                }
            }
            "-v" | "--verbose" => {
                flags.verbose = true;
                i += 1;
            }
            other => {
                flags.rest.push(other.to_string());
                i += 1;
            }
        }
    }
    flags
}

/// Positional words plus `--flag value` pairs of one subcommand.
/// Names listed in `switches` take no value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct CommandArgs {
    pub positional: Vec<String>,
    pub flags: Vec<(String, String)>,
    pub switches: Vec<String>,
}

impl CommandArgs {
    pub fn value(&self, name: &str) -> Option<&str> {
        self.flags
            .iter()
            .rev()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn values(&self, name: &str) -> Vec<&str> {
        self.flags
            .iter()
            .filter(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    pub fn has(&self, name: &str) -> bool {
        self.switches.iter().any(|s| s == name)
    }

    pub fn arg(&self, index: usize) -> Option<&str> {
        self.positional.get(index).map(String::as_str)
    }

    /// Positional words from `index` on, joined by spaces.
    pub fn rest_from(&self, index: usize) -> String {
        self.positional
            .get(index..)
            .map(|words| words.join(" "))
            .unwrap_or_default()
    }
}

pub(crate) fn parse_command_args(args: &[String], start: usize, switches: &[&str]) -> CommandArgs {
    let mut parsed = CommandArgs::default();
    let mut i = start;
    while i < args.len() {
        let arg = args[i].as_str();
        if switches.contains(&arg) {
            parsed.switches.push(arg.to_string());
            i += 1;
        } else if arg.starts_with("--") && arg.len() > 2 {
            if i + 1 < args.len() {
                parsed.flags.push((arg.to_string(), args[i + 1].clone()));
                i += 2;
            } else {
                i += 1;
            }
        } else {
            parsed.positional.push(arg.to_string());
            i += 1;
        }
    }
    parsed
}

/// Everything a command needs to talk to the gateway.
pub(crate) struct Dashboard {
    pub gateway: Gateway,
    pub client: QueryClient,
}

impl Dashboard {
    pub fn new(config: &DashboardConfig) -> Self {
        Self {
            gateway: Gateway::http(config),
            client: QueryClient::new(),
        }
    }
}

/// Load `query` and hand the result to `store` as a server snapshot.
pub(crate) async fn sync_store<S: Reconcile>(
    store: &S,
    query: Arc<Query<Vec<S::Item>>>,
) -> Result<()> {
    let state = query.get().await;
    if let Some(e) = state.error {
        return Err(e.into());
    }
    store.reconcile(Snapshot {
        items: state.data.unwrap_or_default(),
        received_at: state.updated_at.unwrap_or_else(Instant::now),
    });
    Ok(())
}

fn show_config(config: &DashboardConfig) {
    let file = default_config_path()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "(no config directory)".to_string());
    let token = if config.token.is_some() {
        style("set").green().to_string()
    } else {
        style("not set").dim().to_string()
    };
    GuideSection::new("Configuration")
        .status("API URL", &config.api_url)
        .status("Token", &token)
        .status("Config file", &file)
        .print();
    println!();
}

pub async fn run_main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let global = parse_global_flags(&args);
    crate::logging::init_logging(global.verbose);
    let args = global.rest;

    if args.len() < 2 {
        print_help();
        return Ok(());
    }
    let cmd = args[1].as_str();
    if matches!(cmd, "help" | "--help" | "-h") {
        print_help();
        return Ok(());
    }

    let config = DashboardConfig::load(&global.overrides)?;
    debug!(api_url = %config.api_url, "configuration resolved");
    let app = Dashboard::new(&config);

    match cmd {
        "status" => status::run_status(&app).await,
        "watch" => status::run_watch(&app).await,
        "activity" => status::run_activity(&app, &args).await,
        "tasks" | "task" => tasks::run_tasks_command(&app, &args).await,
        "notes" | "note" => notes::run_notes_command(&app, &args).await,
        "cron" => cron::run_cron_command(&app, &args).await,
        "sessions" | "session" => sessions::run_sessions_command(&app, &args).await,
        "agents" | "agent" => agents::run_agents_command(&app, &args).await,
        "search" => search::run_search_command(&app, &args).await,
        "config" => {
            show_config(&config);
            Ok(())
        }
        other => {
            print_error(&format!("Unknown command '{}'", other));
            print_help();
            anyhow::bail!("unknown command '{}'", other)
        }
    }
}
