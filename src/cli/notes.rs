use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use console::style;

use super::{CommandArgs, Dashboard, parse_command_args, sync_store};
use crate::core::api::{Note, NoteDraft};
use crate::core::autosave::{NoteEditor, SETTLE_DELAY, SaveState};
use crate::core::sync::NoteBook;
use crate::core::terminal::{GuideSection, PIN, print_info, print_success, truncate};

const SAVE_POLL: Duration = Duration::from_millis(50);

fn print_note_help() {
    GuideSection::new("Notes")
        .command("list", "Pinned first, newest first [--search <text>]")
        .command("show <id>", "Print a note")
        .command("add <title>", "[--content <text>] [--tag <tag>]...")
        .command("edit <id>", "[--title <t>] [--content <text>] [--tag <tag>]... [--untag <tag>]...")
        .command("pin <id>", "Toggle the pin")
        .command("delete <id>", "Delete a note")
        .print();
    println!();
}

async fn loaded_book(app: &Dashboard, search: &str) -> Result<NoteBook> {
    let book = NoteBook::new(app.gateway.clone(), app.client.clone());
    sync_store(&book, book.query(search))
        .await
        .context("could not load notes")?;
    Ok(book)
}

fn note_line(note: &Note) -> String {
    let pin = if note.pinned { PIN.to_string() } else { String::new() };
    let tags = if note.tags.is_empty() {
        String::new()
    } else {
        format!(" {}", style(format!("#{}", note.tags.join(" #"))).cyan())
    };
    format!(
        "{}{} {}{}",
        pin,
        style(&note.id).dim(),
        style(if note.title.is_empty() { "(untitled)" } else { note.title.as_str() }).bold(),
        tags
    )
}

fn preview(content: &str) -> String {
    truncate(content.lines().next().unwrap_or(""), 70)
}

async fn list(app: &Dashboard, parsed: &CommandArgs) -> Result<()> {
    let search = parsed.value("--search").unwrap_or("").trim().to_string();
    let book = loaded_book(app, &search).await?;
    let notes = book.notes();

    let title = if search.is_empty() {
        format!("Notes ({})", notes.len())
    } else {
        format!("Notes matching '{}' ({})", search, notes.len())
    };
    let mut section = GuideSection::new(&title);
    if notes.is_empty() {
        section = section.text("No notes yet.");
    }
    for note in &notes {
        section = section.bullet(&note_line(note));
        if !note.content.is_empty() {
            section = section.hint(&format!("  {}", preview(&note.content)));
        }
    }
    section.print();
    println!();
    Ok(())
}

async fn show(app: &Dashboard, id: &str) -> Result<()> {
    let book = loaded_book(app, "").await?;
    let note = book.get(id).ok_or_else(|| anyhow!("note '{}' not found", id))?;
    let mut section = GuideSection::new(&note.title)
        .status("Id", &note.id)
        .status("Pinned", if note.pinned { "yes" } else { "no" });
    if !note.tags.is_empty() {
        section = section.status("Tags", &note.tags.join(", "));
    }
    if let Some(updated) = &note.updated_at {
        section = section.status("Updated", updated);
    }
    section = section.blank();
    for line in note.content.lines() {
        section = section.text(line);
    }
    section.print();
    println!();
    Ok(())
}

/// Drive the autosaving editor: load, apply edits, wait for the save.
async fn edit(app: &Dashboard, id: &str, parsed: &CommandArgs) -> Result<()> {
    let book = loaded_book(app, "").await?;
    let note = book.get(id).ok_or_else(|| anyhow!("note '{}' not found", id))?;

    let mut editor = NoteEditor::new(Arc::new(book));
    editor.select(&note);
    tokio::time::sleep(SETTLE_DELAY + SAVE_POLL).await;

    if let Some(title) = parsed.value("--title") {
        editor.set_title(title);
    }
    if let Some(content) = parsed.value("--content") {
        editor.set_content(content);
    }
    for tag in parsed.values("--tag") {
        editor.set_tag_input(tag);
        editor.add_tag();
    }
    for tag in parsed.values("--untag") {
        editor.remove_tag(tag);
    }

    if editor.state() == SaveState::Idle {
        print_info("Nothing changed.");
        return Ok(());
    }
    print_info("Saving…");
    while editor.state() != SaveState::Idle {
        tokio::time::sleep(SAVE_POLL).await;
    }
    print_success(&format!("Saved '{}'", editor.fields().title));
    Ok(())
}

pub async fn run_notes_command(app: &Dashboard, args: &[String]) -> Result<()> {
    let sub_cmd = if args.len() > 2 { args[2].as_str() } else { "list" };
    let parsed = parse_command_args(args, 3, &[]);
    let id = || {
        parsed
            .arg(0)
            .ok_or_else(|| anyhow!("note id is required"))
    };

    match sub_cmd {
        "list" | "ls" => list(app, &parsed).await,
        "show" => show(app, id()?).await,
        "add" | "new" => {
            let title = parsed.rest_from(0);
            let draft = NoteDraft {
                title: if title.is_empty() {
                    NoteDraft::default().title
                } else {
                    title
                },
                content: parsed.value("--content").unwrap_or("").to_string(),
                tags: parsed.values("--tag").into_iter().map(str::to_string).collect(),
            };
            let book = NoteBook::new(app.gateway.clone(), app.client.clone());
            let (_, write) = book.create(draft)?;
            write.settled().await;
            // The book was not loaded, so the new note is its only entry.
            match book.notes().first() {
                Some(note) => print_success(&format!("Created '{}' ({})", note.title, note.id)),
                None => print_success("Created note"),
            }
            Ok(())
        }
        "edit" => edit(app, id()?, &parsed).await,
        "pin" | "unpin" => {
            let id = id()?;
            let book = loaded_book(app, "").await?;
            book.toggle_pin(id)?.settled().await;
            let pinned = book.get(id).is_some_and(|n| n.pinned);
            print_success(&format!(
                "{} {}",
                if pinned { "Pinned" } else { "Unpinned" },
                id
            ));
            Ok(())
        }
        "delete" | "rm" => {
            let id = id()?;
            let book = loaded_book(app, "").await?;
            book.delete(id)?.settled().await;
            print_success(&format!("Deleted {}", id));
            Ok(())
        }
        "help" => {
            print_note_help();
            Ok(())
        }
        other => {
            print_note_help();
            bail!("unknown notes subcommand '{}'", other)
        }
    }
}
