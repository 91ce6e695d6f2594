use crate::{MediaRef, PageCursor, SelectAllState, TaskId, TaskStatus, TaskType};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRowView {
    pub id: TaskId,
    pub kind: TaskType,
    pub status: TaskStatus,
    pub progress: u8,
    pub summary: String,
    /// Extracted result media; only present for completed tasks.
    pub media: Option<MediaRef>,
    pub error: Option<String>,
    pub created_at: i64,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TaskListView {
    pub rows: Vec<TaskRowView>,
    pub select_all: SelectAllState,
    pub cursor: PageCursor,
    pub selected_count: usize,
    pub status_filter: Option<TaskStatus>,
    pub type_filter: Option<TaskType>,
    pub polling: bool,
    pub loading: bool,
    pub auth_invalid: bool,
    pub dirty: bool,
}

impl TaskListView {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn visible_ids(&self) -> Vec<TaskId> {
        self.rows.iter().map(|row| row.id.clone()).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

/// Human-readable byte size: `0 B`, `1.5 KB`, `12.25 MB`.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 B".to_string();
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let rounded = (value * 100.0).round() / 100.0;
    format!("{rounded} {}", UNITS[unit])
}
