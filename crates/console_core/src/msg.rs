use crate::{ListQuery, Task, TaskId, TaskPage, TaskStatus, TaskType};

/// Full-state result of one list fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct ListSnapshot {
    pub tasks: Vec<Task>,
    pub total: u64,
}

impl ListSnapshot {
    /// A server-paginated page.
    pub fn from_page(page: TaskPage) -> Self {
        Self {
            total: page.total,
            tasks: page.data,
        }
    }

    /// The whole list, for views that paginate locally.
    pub fn full(tasks: Vec<Task>) -> Self {
        Self {
            total: tasks.len() as u64,
            tasks,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    /// View mounted or operator asked for a reload.
    RefreshRequested,
    /// A fetch for `query` came back.
    PageLoaded {
        query: ListQuery,
        snapshot: ListSnapshot,
    },
    /// A fetch failed after retries.
    LoadFailed(String),
    /// Move forwards/backwards by this many pages.
    PageChanged(i64),
    PageSizeChanged(u32),
    StatusFilterChanged(Option<TaskStatus>),
    TypeFilterChanged(Option<TaskType>),
    /// Operator ticked or unticked one row.
    SelectionToggled(TaskId),
    /// Operator clicked the select-all control for the visible rows.
    SelectAllToggled,
    SelectionCleared,
    BatchDeleteRequested,
    BatchDeleted {
        task_ids: Vec<TaskId>,
        message: String,
    },
    /// Clear every task matching the current filters.
    ClearTasksRequested,
    TasksCleared {
        message: String,
    },
    ActionFailed(String),
    /// The backend rejected the credential.
    AuthInvalid,
    /// View torn down.
    Disposed,
}
