use anyhow::{Context, Result, anyhow, bail};
use console::style;

use super::{Dashboard, parse_command_args, sync_store};
use crate::core::api::{Message, MessageRole, Session};
use crate::core::sync::{SessionDesk, Snapshot};
use crate::core::terminal::{GuideSection, print_success};

fn print_session_help() {
    GuideSection::new("Sessions")
        .command("list", "Agent sessions [--filter <text>]")
        .command("history <id>", "Conversation history")
        .command("send <id> <message>", "Send a message into a session")
        .print();
    println!();
}

fn session_line(session: &Session) -> String {
    let status = if session.is_active() {
        style("active").green().to_string()
    } else {
        style("ended").dim().to_string()
    };
    let unread = match session.unread_count {
        Some(n) if n > 0 => format!(" {}", style(format!("{} unread", n)).yellow().bold()),
        _ => String::new(),
    };
    format!(
        "{} {} [{}]{}",
        style(session.session_id().unwrap_or("?")).dim(),
        style(session.display_name()).bold(),
        status,
        unread
    )
}

fn message_line(message: &Message) -> String {
    let who = match message.role {
        MessageRole::User => style("you").cyan().bold().to_string(),
        MessageRole::Agent => style("agent").magenta().bold().to_string(),
    };
    let when = message
        .timestamp
        .as_deref()
        .map(|t| format!("{} ", style(t).dim()))
        .unwrap_or_default();
    format!("{}{}: {}", when, who, message.content)
}

async fn history(desk: &SessionDesk, id: &str) -> Result<()> {
    let state = desk.history_query(id).get().await;
    if let Some(e) = state.error {
        return Err(e).context("could not load session history");
    }
    desk.reconcile_history(
        id,
        Snapshot {
            items: state.data.unwrap_or_default(),
            received_at: state.updated_at.unwrap_or_else(tokio::time::Instant::now),
        },
    );

    let messages = desk.messages(id);
    let mut section = GuideSection::new(&format!("Session · {}", id));
    if messages.is_empty() {
        section = section.text("No messages yet.");
    }
    for message in &messages {
        section = section.text(&message_line(message));
    }
    section.print();
    println!();
    Ok(())
}

pub async fn run_sessions_command(app: &Dashboard, args: &[String]) -> Result<()> {
    let sub_cmd = if args.len() > 2 { args[2].as_str() } else { "list" };
    let parsed = parse_command_args(args, 3, &[]);
    let desk = SessionDesk::new(app.gateway.clone(), app.client.clone());

    match sub_cmd {
        "list" | "ls" => {
            sync_store(&desk, desk.query())
                .await
                .context("could not load sessions")?;
            let filter = parsed.value("--filter").unwrap_or("");
            let sessions = desk.filtered(filter);
            let mut section = GuideSection::new(&format!("Sessions ({})", sessions.len()));
            if sessions.is_empty() {
                section = section.text("No sessions match.");
            }
            for session in &sessions {
                section = section.bullet(&session_line(session));
            }
            section.print();
            println!();
            Ok(())
        }
        "history" | "show" => {
            let id = parsed
                .arg(0)
                .ok_or_else(|| anyhow!("session id is required"))?;
            history(&desk, id).await
        }
        "send" => {
            let id = parsed
                .arg(0)
                .ok_or_else(|| anyhow!("session id is required"))?;
            desk.select(id);
            desk.send(&parsed.rest_from(1))?.settled().await;
            print_success(&format!("Sent to {}", id));
            Ok(())
        }
        "help" => {
            print_session_help();
            Ok(())
        }
        other => {
            print_session_help();
            bail!("unknown sessions subcommand '{}'", other)
        }
    }
}
