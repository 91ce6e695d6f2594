use std::io::{self, Write};
use std::sync::Mutex;

use chrono::{DateTime, Local};
use console_core::{
    extract_media, format_size, payload_summary, NoticeLevel, SelectAllState, Task,
    TaskListView, TaskRowView,
};
use console_engine::{CachePage, CacheStats, EngineEvent, EventSink, OnlineCacheStats};

/// Local time for an epoch-seconds timestamp, `-` when unknown.
pub fn format_timestamp(secs: i64) -> String {
    if secs <= 0 {
        return "-".to_string();
    }
    match DateTime::from_timestamp(secs, 0) {
        Some(utc) => utc
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string(),
        None => "-".to_string(),
    }
}

fn checkbox(selected: bool) -> &'static str {
    if selected {
        "[x]"
    } else {
        "[ ]"
    }
}

fn select_all_marker(state: SelectAllState) -> &'static str {
    match state {
        SelectAllState::None => "[ ]",
        SelectAllState::Some => "[-]",
        SelectAllState::All => "[x]",
    }
}

fn render_row(row: &TaskRowView) -> String {
    let outcome = match (&row.media, &row.error) {
        (Some(media), _) if !media.is_empty() => {
            media.media_url.as_deref().map(shorten_url).unwrap_or_default()
        }
        (_, Some(error)) => format!("error: {error}"),
        _ => String::new(),
    };
    format!(
        "{} {:<36} {:<5} {:<10} {:>3}% {:<19} {:<33} {}",
        checkbox(row.selected),
        row.id,
        row.kind.as_str(),
        row.status.as_str(),
        row.progress,
        format_timestamp(row.created_at),
        row.summary,
        outcome
    )
    .trim_end()
    .to_string()
}

/// Inline data URLs are megabytes long; show their header only.
fn shorten_url(url: &str) -> String {
    match url.split_once(',') {
        Some((header, _)) if url.starts_with("data:") => format!("{header},..."),
        _ => url.to_string(),
    }
}

pub fn render_list(view: &TaskListView) -> String {
    let mut out = String::new();
    let mut filters = Vec::new();
    if let Some(status) = &view.status_filter {
        filters.push(format!("status={status}"));
    }
    if let Some(kind) = view.type_filter {
        filters.push(format!("type={kind}"));
    }
    out.push_str(&format!(
        "Page {}/{}  ({} tasks{}{})",
        view.cursor.page,
        view.cursor.total_pages(),
        view.cursor.total,
        if filters.is_empty() {
            String::new()
        } else {
            format!(", {}", filters.join(" "))
        },
        if view.polling { ", refreshing" } else { "" },
    ));
    out.push('\n');
    if view.auth_invalid {
        out.push_str("Credential rejected; set a new one with `task-console token`.\n");
    }
    if view.is_empty() {
        out.push_str("No tasks.\n");
        return out;
    }
    out.push_str(&format!(
        "{} {:<36} {:<5} {:<10} {:>4} {:<19} {:<33} {}\n",
        select_all_marker(view.select_all),
        "ID",
        "TYPE",
        "STATUS",
        "PROG",
        "CREATED",
        "PROMPT",
        "RESULT"
    ));
    for row in &view.rows {
        out.push_str(&render_row(row));
        out.push('\n');
    }
    if view.selected_count > 0 {
        out.push_str(&format!("{} selected\n", view.selected_count));
    }
    out
}

pub fn render_task(task: &Task) -> String {
    let mut out = format!(
        "Task     {}\nType     {}\nStatus   {} ({}%)\nCreated  {}\nPrompt   {}\n",
        task.id,
        task.kind,
        task.status,
        task.progress,
        format_timestamp(task.created_at),
        payload_summary(&task.payload),
    );
    if let Some(error) = &task.error {
        out.push_str(&format!("Error    {error}\n"));
    }
    if task.status.is_success() {
        let media = extract_media(task.kind, task.result.as_ref());
        match &media.media_url {
            Some(url) => out.push_str(&format!("Media    {}\n", shorten_url(url))),
            None => out.push_str("Media    (none found in result)\n"),
        }
        if let Some(thumbnail) = &media.thumbnail_url {
            out.push_str(&format!("Thumb    {}\n", shorten_url(thumbnail)));
        }
    }
    out
}

pub fn render_cache_stats(stats: &CacheStats) -> String {
    format!(
        "Images  {}\nVideos  {}\nSize    {}\n",
        stats.image_count,
        stats.video_count,
        format_size(stats.total_size)
    )
}

pub fn render_online_stats(stats: &OnlineCacheStats) -> String {
    format!(
        "Images  {}\nVideos  {}\nTotal   {}\n",
        stats.image_count, stats.video_count, stats.total_count
    )
}

pub fn render_cache_page(page: &CachePage) -> String {
    let mut out = format!("{} cached file(s)\n", page.total);
    for item in &page.items {
        out.push_str(&format!("{:>10}  {}\n", format_size(item.size), item.name));
    }
    out
}

fn notice_prefix(level: NoticeLevel) -> &'static str {
    match level {
        NoticeLevel::Info => "info",
        NoticeLevel::Success => "ok",
        NoticeLevel::Error => "error",
    }
}

/// Prints engine events to the terminal.
///
/// List redraws are only printed when `show_lists` is set, so one-shot
/// commands print the final view once instead of every intermediate one.
pub struct ConsolePrinter {
    show_lists: bool,
    last_list: Mutex<Option<String>>,
}

impl ConsolePrinter {
    pub fn new(show_lists: bool) -> Self {
        Self {
            show_lists,
            last_list: Mutex::new(None),
        }
    }

    fn print(&self, text: &str) {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        let _ = handle.write_all(text.as_bytes());
        if !text.ends_with('\n') {
            let _ = handle.write_all(b"\n");
        }
        let _ = handle.flush();
    }

    fn print_list(&self, view: &TaskListView) {
        let text = render_list(view);
        let mut last = self
            .last_list
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        // Polls that change nothing still mark the view dirty.
        if last.as_deref() == Some(text.as_str()) {
            return;
        }
        self.print(&text);
        *last = Some(text);
    }
}

impl EventSink for ConsolePrinter {
    fn emit(&self, event: EngineEvent) {
        match event {
            EngineEvent::TaskUpdated(task) => self.print(&format!(
                "{} {} {}%",
                task.id, task.status, task.progress
            )),
            EngineEvent::TaskFinished(task) => self.print(&render_task(&task)),
            EngineEvent::ListRefreshed(view) => {
                if self.show_lists {
                    self.print_list(&view);
                }
            }
            EngineEvent::AuthInvalid { scope } => self.print(&format!(
                "error: the backend rejected the {scope}; it has been cleared"
            )),
            EngineEvent::Notice { level, message } => {
                self.print(&format!("{}: {message}", notice_prefix(level)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use console_core::{MediaRef, PageCursor, TaskStatus, TaskType};
    use serde_json::json;

    fn row(id: &str, status: TaskStatus, selected: bool) -> TaskRowView {
        TaskRowView {
            id: id.to_string(),
            kind: TaskType::Video,
            status,
            progress: 40,
            summary: "a cat".to_string(),
            media: None,
            error: None,
            created_at: 0,
            selected,
        }
    }

    #[test]
    fn unknown_timestamp_is_a_dash() {
        assert_eq!(format_timestamp(0), "-");
        assert_eq!(format_timestamp(-5), "-");
        assert_eq!(format_timestamp(1_700_000_000).len(), 19);
    }

    #[test]
    fn list_shows_paging_and_selection() {
        let view = TaskListView {
            rows: vec![
                row("a", TaskStatus::Running, true),
                row("b", TaskStatus::Pending, false),
            ],
            select_all: SelectAllState::Some,
            cursor: PageCursor::new(2, 20, 45),
            selected_count: 1,
            polling: true,
            ..TaskListView::default()
        };
        let text = render_list(&view);
        assert!(text.starts_with("Page 2/3  (45 tasks, refreshing)"));
        assert!(text.contains("[-] ID"));
        assert!(text.contains("[x] a"));
        assert!(text.contains("[ ] b"));
        assert!(text.contains("1 selected"));
    }

    #[test]
    fn empty_list_says_so() {
        let text = render_list(&TaskListView::default());
        assert!(text.contains("No tasks."));
    }

    #[test]
    fn inline_media_is_shortened() {
        let mut done = row("c", TaskStatus::Completed, false);
        done.media = Some(MediaRef {
            media_url: Some("data:image/png;base64,AAAA".to_string()),
            thumbnail_url: None,
        });
        assert!(render_row(&done).ends_with("data:image/png;base64,..."));
    }

    #[test]
    fn completed_task_detail_lists_media() {
        let task = Task {
            id: "t1".to_string(),
            kind: TaskType::Video,
            status: TaskStatus::Completed,
            progress: 100,
            payload: json!({"prompt": "cat"}),
            result: Some(json!({"video_url": "https://cdn.example.com/v.mp4"})),
            error: None,
            created_at: 0,
        };
        let text = render_task(&task);
        assert!(text.contains("Prompt   cat"));
        assert!(text.contains("Media    https://cdn.example.com/v.mp4"));
    }
}
