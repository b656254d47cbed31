use anyhow::{Context, Result, anyhow, bail};
use console::style;

use super::{CommandArgs, Dashboard, parse_command_args, sync_store};
use crate::core::api::{AgentId, Column, Priority, Task, TaskDraft, TaskUpdate};
use crate::core::kanban::{DragEvent, DragState, MoveIntent};
use crate::core::sync::TaskBoard;
use crate::core::terminal::{GuideSection, print_success, truncate};

fn print_task_help() {
    GuideSection::new("Tasks")
        .command("list", "Board by column [--column <c>] [--agent <a>]")
        .command("add <title>", "[--description <d>] [--priority low|medium|high] [--column <c>] [--assign <agent>]")
        .command("move <id> <column>", "Move a card to another column")
        .command("edit <id>", "[--title <t>] [--description <d>] [--priority <p>]")
        .command("delete <id>", "Remove a task from the board")
        .command("comment <id> <text>", "Add a comment")
        .command("assign <id> <agent>", "[--instructions <text>]")
        .blank()
        .hint(&format!("Columns: {}", column_names()))
        .hint(&format!("Agents: {}", agent_names()))
        .print();
    println!();
}

fn column_names() -> String {
    Column::ALL.map(|c| c.as_str()).join(", ")
}

fn agent_names() -> String {
    AgentId::ALL.map(|a| a.as_str()).join(", ")
}

fn parse_column(value: &str) -> Result<Column> {
    value.parse().map_err(|e: String| anyhow!(e))
}

fn parse_agent(value: &str) -> Result<AgentId> {
    value.parse().map_err(|e: String| anyhow!(e))
}

fn parse_priority(value: &str) -> Result<Priority> {
    value.parse().map_err(|e: String| anyhow!(e))
}

fn priority_badge(priority: Priority) -> String {
    match priority {
        Priority::High => style("high").red().bold().to_string(),
        Priority::Medium => style("medium").yellow().to_string(),
        Priority::Low => style("low").dim().to_string(),
    }
}

fn card_line(task: &Task) -> String {
    let mut line = format!(
        "{} {} [{}]",
        style(&task.id).dim(),
        style(truncate(&task.title, 60)).bold(),
        priority_badge(task.priority)
    );
    if let Some(agent) = task.assigned_to {
        line.push_str(&format!(" @{}", style(agent.as_str()).cyan()));
    }
    if !task.comments.is_empty() {
        line.push_str(&format!(" {}", style(format!("💬{}", task.comments.len())).dim()));
    }
    line
}

/// Build the move the way the board's card menu does.
pub(crate) fn menu_move(task_id: &str, column: Column) -> Option<MoveIntent> {
    let mut drag = DragState::new();
    drag.reduce(DragEvent::MenuMove {
        task_id: task_id.to_string(),
        column,
    })
}

async fn loaded_board(app: &Dashboard) -> Result<TaskBoard> {
    let board = TaskBoard::new(app.gateway.clone(), app.client.clone());
    sync_store(&board, board.query())
        .await
        .context("could not load tasks")?;
    Ok(board)
}

fn required<'a>(parsed: &'a CommandArgs, index: usize, what: &str) -> Result<&'a str> {
    parsed
        .arg(index)
        .ok_or_else(|| anyhow!("{} is required", what))
}

async fn list(app: &Dashboard, parsed: &CommandArgs) -> Result<()> {
    let only_column = parsed.value("--column").map(parse_column).transpose()?;
    let only_agent = parsed.value("--agent").map(parse_agent).transpose()?;
    let board = loaded_board(app).await?;
    let counts = board.counts();

    for column in Column::ALL {
        if only_column.is_some_and(|c| c != column) {
            continue;
        }
        let title = format!("{} ({})", column.title(), counts.get(&column).copied().unwrap_or(0));
        let mut section = GuideSection::new(&title);
        let cards: Vec<Task> = board
            .column(column)
            .into_iter()
            .filter(|t| only_agent.is_none_or(|a| t.assigned_to == Some(a)))
            .collect();
        if cards.is_empty() {
            section = section.hint("empty");
        }
        for task in &cards {
            section = section.bullet(&card_line(task));
        }
        section.print();
    }
    println!();
    Ok(())
}

async fn add(app: &Dashboard, parsed: &CommandArgs) -> Result<()> {
    let draft = TaskDraft {
        title: parsed.rest_from(0),
        description: parsed.value("--description").map(str::to_string),
        priority: parsed
            .value("--priority")
            .map(parse_priority)
            .transpose()?
            .unwrap_or_default(),
        column: parsed
            .value("--column")
            .map(parse_column)
            .transpose()?
            .unwrap_or_default(),
        assigned_to: parsed.value("--assign").map(parse_agent).transpose()?,
    };
    let board = TaskBoard::new(app.gateway.clone(), app.client.clone());
    let (task, write) = board.create(draft)?;
    write.settled().await;
    print_success(&format!(
        "Added '{}' to {} ({})",
        task.title,
        task.column.title(),
        task.id
    ));
    Ok(())
}

pub async fn run_tasks_command(app: &Dashboard, args: &[String]) -> Result<()> {
    let sub_cmd = if args.len() > 2 { args[2].as_str() } else { "list" };
    let parsed = parse_command_args(args, 3, &[]);

    match sub_cmd {
        "list" | "ls" => list(app, &parsed).await,
        "add" | "new" => add(app, &parsed).await,
        "move" | "mv" => {
            let id = required(&parsed, 0, "task id")?;
            let column = parse_column(required(&parsed, 1, "column")?)?;
            let board = loaded_board(app).await?;
            let intent = menu_move(id, column).ok_or_else(|| anyhow!("nothing to move"))?;
            board.apply_move(intent)?.settled().await;
            print_success(&format!("Moved {} to {}", id, column.title()));
            Ok(())
        }
        "edit" => {
            let id = required(&parsed, 0, "task id")?;
            let update = TaskUpdate {
                title: parsed.value("--title").map(str::to_string),
                description: parsed.value("--description").map(str::to_string),
                priority: parsed.value("--priority").map(parse_priority).transpose()?,
                ..TaskUpdate::default()
            };
            if update == TaskUpdate::default() {
                bail!("nothing to change: pass --title, --description or --priority");
            }
            let board = loaded_board(app).await?;
            board.update(id, update)?.settled().await;
            print_success(&format!("Updated {}", id));
            Ok(())
        }
        "delete" | "rm" => {
            let id = required(&parsed, 0, "task id")?;
            let board = loaded_board(app).await?;
            board.delete(id)?.settled().await;
            print_success(&format!("Deleted {}", id));
            Ok(())
        }
        "comment" => {
            let id = required(&parsed, 0, "task id")?;
            let text = parsed.rest_from(1);
            let board = loaded_board(app).await?;
            board.comment(id, &text)?.settled().await;
            print_success(&format!("Commented on {}", id));
            Ok(())
        }
        "assign" => {
            let id = required(&parsed, 0, "task id")?;
            let agent = parse_agent(required(&parsed, 1, "agent")?)?;
            let instructions = parsed.value("--instructions").map(str::to_string);
            let board = loaded_board(app).await?;
            board.assign(id, agent, instructions)?.settled().await;
            print_success(&format!("Assigned {} to {}", id, agent));
            Ok(())
        }
        "help" => {
            print_task_help();
            Ok(())
        }
        other => {
            print_task_help();
            bail!("unknown tasks subcommand '{}'", other)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn menu_move_targets_requested_column() {
        assert_eq!(
            menu_move("t1", Column::Blocked),
            Some(MoveIntent {
                task_id: "t1".into(),
                column: Column::Blocked
            })
        );
    }

    #[test]
    fn parsers_reject_unknown_values() {
        assert!(parse_column("done").is_err());
        assert_eq!(parse_column("in-progress").unwrap(), Column::InProgress);
        assert!(parse_agent("nobody").is_err());
        assert_eq!(parse_priority("high").unwrap(), Priority::High);
    }
}
