// UI layer: everything the user sees. Results are printed either as short
// human-readable lines or, with `--json`, as one JSON document on stdout.
// Spinners and progress bars draw on stderr and disappear when it is not a
// terminal.

use std::io::IsTerminal;
use std::time::Duration;

use anyhow::Result;
use crossterm::style::{Color, Stylize};
use dialoguer::Input;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::{json, Value};

use crate::attachments::{CreatedAttachment, DeletedAttachments, DownloadedAttachment};
use crate::model::{Attachment, Task, TodoList};

fn paint(text: &str, color: Color) -> String {
    if std::io::stdout().is_terminal() {
        text.with(color).to_string()
    } else {
        text.to_string()
    }
}

fn success(message: &str) {
    println!("{} {message}", paint("✓", Color::Green));
}

fn print_json(value: &Value) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{text}"),
        Err(_) => println!("{value}"),
    }
}

/// `1.5 KB`-style size for listings.
pub fn human_size(bytes: u64) -> String {
    const KIB: f64 = 1024.0;
    let b = bytes as f64;
    if b < KIB {
        format!("{bytes} B")
    } else if b < KIB * KIB {
        format!("{:.1} KB", b / KIB)
    } else {
        format!("{:.1} MB", b / (KIB * KIB))
    }
}

/// Spinner shown while a request is in flight.
pub fn spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

/// Byte progress bar for attachment uploads.
pub fn upload_bar(file_name: &str, total: u64) -> ProgressBar {
    let bar = ProgressBar::new(total);
    bar.set_style(
        ProgressStyle::with_template("{spinner} {msg} [{bar:30}] {bytes}/{total_bytes}")
            .map(|style| style.progress_chars("=> "))
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    bar.set_message(format!("Uploading {file_name}"));
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

pub fn print_lists(lists: &[TodoList], json: bool) {
    if json {
        print_json(&json!(lists));
        return;
    }
    for list in lists {
        let marker = if list.is_default() { " (default)" } else { "" };
        println!("{}{marker}", list.display_name);
    }
}

pub fn print_tasks(list: &TodoList, tasks: &[Task], json: bool) {
    if json {
        print_json(&json!({"list_id": list.id, "list": list.display_name, "tasks": tasks}));
        return;
    }
    for (index, task) in tasks.iter().enumerate() {
        let done = task.status.as_deref() == Some("completed");
        let check = if done { paint("[x]", Color::Green) } else { "[ ]".to_string() };
        println!("{index:>3} {check} {}", task.title);
    }
}

pub fn print_task_created(task: &Task, attachment: Option<&CreatedAttachment>, json: bool) {
    if json {
        print_json(&json!({
            "action": "created",
            "task_id": task.id,
            "title": task.title,
            "attachment_id": attachment.map(|a| a.attachment_id.as_str()),
            "file_name": attachment.map(|a| a.file_name.as_str()),
        }));
        return;
    }
    success(&format!("Created task '{}'", task.title));
    if let Some(a) = attachment {
        success(&format!("Attached '{}'", a.file_name));
    }
}

pub fn print_attachments(attachments: &[Attachment], json: bool) {
    if json {
        let items: Vec<Value> = attachments
            .iter()
            .enumerate()
            .map(|(index, a)| {
                json!({
                    "index": index,
                    "id": a.id,
                    "name": a.name,
                    "content_type": a.content_type,
                    "size": a.size,
                })
            })
            .collect();
        print_json(&Value::Array(items));
        return;
    }
    if attachments.is_empty() {
        println!("No attachments.");
        return;
    }
    for (index, a) in attachments.iter().enumerate() {
        println!("{index:>3}  {}  ({})", a.name, human_size(a.size));
    }
}

pub fn print_attached(created: &CreatedAttachment, json: bool) {
    if json {
        print_json(&json!({
            "action": "attached",
            "attachment_id": created.attachment_id,
            "file_name": created.file_name,
            "task_id": created.task_id,
            "task_title": created.task_title,
        }));
        return;
    }
    success(&format!(
        "Attached '{}' to task '{}'",
        created.file_name, created.task_title
    ));
}

pub fn print_detached(deleted: &DeletedAttachments, json: bool) {
    if json {
        print_json(&json!({
            "action": "detached",
            "task_id": deleted.task_id,
            "task_title": deleted.task_title,
            "count": deleted.count,
        }));
        return;
    }
    let noun = if deleted.count == 1 { "attachment" } else { "attachments" };
    success(&format!(
        "Removed {} {noun} from task '{}'",
        deleted.count, deleted.task_title
    ));
}

pub fn print_downloaded(downloaded: &[DownloadedAttachment], json: bool) {
    if json {
        let items: Vec<Value> = downloaded
            .iter()
            .map(|d| json!({"name": d.name, "path": d.path, "size": d.size}))
            .collect();
        print_json(&json!({"action": "downloaded", "files": items}));
        return;
    }
    if downloaded.is_empty() {
        println!("No attachments.");
    }
    for d in downloaded {
        success(&format!("Saved {} ({})", d.path.display(), human_size(d.size)));
    }
}

pub fn print_note_updated(task: &Task, cleared: bool, json: bool) {
    let action = if cleared { "note_cleared" } else { "note_updated" };
    if json {
        print_json(&json!({"action": action, "task_id": task.id, "task_title": task.title}));
        return;
    }
    if cleared {
        success(&format!("Cleared note on task '{}'", task.title));
    } else {
        success(&format!("Updated note on task '{}'", task.title));
    }
}

pub fn print_note(task: &Task, json: bool) {
    if json {
        print_json(&json!({"task_id": task.id, "task_title": task.title, "note": task.note()}));
        return;
    }
    if task.note().is_empty() {
        println!("Task '{}' has no note.", task.title);
    } else {
        println!("{}", task.note());
    }
}

pub fn print_error(err: &anyhow::Error, json: bool) {
    if json {
        print_json(&json!({"error": err.to_string()}));
    }
    eprintln!("{} {err}", paint("error:", Color::Red));
}

pub fn print_update_notice(notice: &str) {
    eprintln!("{}", paint(notice, Color::Yellow));
}

/// Shows the sign-in URL and asks for the URL the browser ended up on.
pub fn prompt_redirect_url(authorization_url: &str) -> Result<String> {
    println!("Open this URL in a browser and sign in:\n\n{authorization_url}\n");
    println!("After signing in you will land on a page that fails to load; copy its address.");
    let redirect: String = Input::new()
        .with_prompt("Paste the full redirect URL")
        .interact_text()?;
    Ok(redirect)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn human_size_picks_unit() {
        assert_eq!(human_size(512), "512 B");
        assert_eq!(human_size(1536), "1.5 KB");
        assert_eq!(human_size(5 * 1024 * 1024), "5.0 MB");
    }
}
