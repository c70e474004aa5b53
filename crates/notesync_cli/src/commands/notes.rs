//! Note commands: list, show, add, edit, delete.

use crate::commands::sync::after_change;
use crate::context::Context;
use crate::error::{CliError, CliResult};
use chrono::Utc;
use notesync_core::{Note, NoteStore};
use serde::Serialize;
use uuid::Uuid;

/// A note as printed by `list --format json`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteView<'a> {
    /// Note id.
    pub id: String,
    /// Title.
    pub title: &'a str,
    /// Body.
    pub content: &'a str,
    /// Last update, RFC 3339.
    pub updated_at_utc: String,
    /// Not yet pushed.
    pub pending: bool,
}

impl<'a> From<&'a Note> for NoteView<'a> {
    fn from(note: &'a Note) -> Self {
        Self {
            id: note.id.to_string(),
            title: &note.title,
            content: &note.content,
            updated_at_utc: note.updated_at_utc.to_rfc3339(),
            pending: note.dirty,
        }
    }
}

/// Runs the list command.
pub fn list(ctx: &Context, format: &str) -> CliResult<()> {
    let notes = ctx.store()?.get_all()?;
    match format {
        "text" => print!("{}", render_table(&notes)),
        "json" => {
            let views: Vec<NoteView<'_>> = notes.iter().map(NoteView::from).collect();
            let json = serde_json::to_string_pretty(&views)
                .map_err(|e| CliError::Output(e.to_string()))?;
            println!("{json}");
        }
        other => return Err(CliError::UnknownFormat(other.to_string())),
    }
    Ok(())
}

/// Runs the show command.
pub fn show(ctx: &Context, id: &str) -> CliResult<()> {
    let note = resolve(&ctx.store()?, id)?;
    println!("{}", note.title);
    println!("id:      {}", note.id);
    println!("created: {}", note.created_at_utc.format("%Y-%m-%d %H:%M:%S"));
    println!("updated: {}", note.updated_at_utc.format("%Y-%m-%d %H:%M:%S"));
    if note.dirty {
        println!("pending: not yet synced");
    }
    println!();
    println!("{}", note.content);
    Ok(())
}

/// Runs the add command.
pub fn add(ctx: &Context, title: &str, content: &str, sync_after: bool) -> CliResult<()> {
    let engine = ctx.engine()?;
    let note = Note::draft(title, content, Utc::now());
    engine.store().upsert(&note)?;
    println!("added {}", short_id(&note.id));

    if sync_after {
        after_change(&engine);
    }
    Ok(())
}

/// Runs the edit command.
pub fn edit(
    ctx: &Context,
    id: &str,
    title: Option<String>,
    content: Option<String>,
    sync_after: bool,
) -> CliResult<()> {
    let engine = ctx.engine()?;
    let mut note = resolve(engine.store(), id)?;
    let title = title.unwrap_or_else(|| note.title.clone());
    let content = content.unwrap_or_else(|| note.content.clone());
    note.edit(title, content, Utc::now());
    engine.store().upsert(&note)?;
    println!("edited {}", short_id(&note.id));

    if sync_after {
        after_change(&engine);
    }
    Ok(())
}

/// Runs the delete command.
pub fn delete(ctx: &Context, id: &str, sync_after: bool) -> CliResult<()> {
    let engine = ctx.engine()?;
    let mut note = resolve(engine.store(), id)?;
    note.mark_deleted();
    engine.store().upsert(&note)?;
    println!("deleted {}", short_id(&note.id));

    if sync_after {
        after_change(&engine);
    }
    Ok(())
}

/// Finds a visible note by full id or unique id prefix.
pub fn resolve(store: &impl NoteStore, id: &str) -> CliResult<Note> {
    if let Ok(full) = Uuid::parse_str(id) {
        return match store.get(&full)? {
            Some(note) if !note.deleted => Ok(note),
            _ => Err(CliError::NoteNotFound(id.to_string())),
        };
    }

    let prefix = id.to_ascii_lowercase();
    let mut matches: Vec<Note> = store
        .get_all()?
        .into_iter()
        .filter(|n| !prefix.is_empty() && n.id.to_string().starts_with(&prefix))
        .collect();
    match matches.len() {
        0 => Err(CliError::NoteNotFound(id.to_string())),
        1 => Ok(matches.remove(0)),
        count => Err(CliError::AmbiguousId {
            prefix: id.to_string(),
            count,
        }),
    }
}

fn short_id(id: &Uuid) -> String {
    id.to_string()[..8].to_string()
}

/// Renders notes as an aligned table, newest first as given.
pub fn render_table(notes: &[Note]) -> String {
    if notes.is_empty() {
        return "no notes\n".to_string();
    }

    let mut out = String::new();
    for note in notes {
        let marker = if note.dirty { "*" } else { " " };
        let first_line = note.content.lines().next().unwrap_or("");
        out.push_str(&format!(
            "{} {}  {}  {:<24}  {}\n",
            marker,
            short_id(&note.id),
            note.updated_at_utc.format("%Y-%m-%d %H:%M"),
            truncate(&note.title, 24),
            truncate(first_line, 40),
        ));
    }
    out
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max.saturating_sub(1)).collect();
    cut.push('…');
    cut
}
