use std::collections::HashSet;

use crate::reconcile::{reconcile, refresh_selection, ReconciledPage};
use crate::view_model::TaskListView;
use crate::{ListQuery, ListSnapshot, PageCursor, SelectionSet, Task, TaskId};

/// How a list view pages through its tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PagingMode {
    /// The server returns one page per query.
    #[default]
    Server,
    /// The full list is fetched once and sliced locally.
    Client,
}

/// Per-view session state for one task list.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TaskListState {
    mode: PagingMode,
    query: ListQuery,
    cursor: PageCursor,
    selection: SelectionSet,
    /// Server mode: the current page. Client mode: the whole cached list.
    tasks: Vec<Task>,
    page: ReconciledPage,
    seen: HashSet<TaskId>,
    polling: bool,
    loading: bool,
    auth_invalid: bool,
    disposed: bool,
    dirty: bool,
}

impl TaskListState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mode(mode: PagingMode, page_size: u32) -> Self {
        Self::with_query(
            mode,
            ListQuery {
                size: page_size,
                ..ListQuery::default()
            },
        )
    }

    /// Starts from `query` instead of the first unfiltered page. In client
    /// mode the page only moves the local cursor.
    pub fn with_query(mode: PagingMode, mut query: ListQuery) -> Self {
        query.size = query.size.max(1);
        let cursor = PageCursor::new(query.page, query.size, 0);
        query.page = match mode {
            PagingMode::Server => cursor.page,
            PagingMode::Client => 1,
        };
        Self {
            mode,
            cursor,
            query,
            ..Self::default()
        }
    }

    pub fn view(&self) -> TaskListView {
        TaskListView {
            rows: self.page.rows.clone(),
            select_all: self.page.select_all,
            cursor: self.cursor,
            selected_count: self.selection.len(),
            status_filter: self.query.status.clone(),
            type_filter: self.query.task_type,
            polling: self.polling,
            loading: self.loading,
            auth_invalid: self.auth_invalid,
            dirty: self.dirty,
        }
    }

    pub fn mode(&self) -> PagingMode {
        self.mode
    }

    pub fn query(&self) -> &ListQuery {
        &self.query
    }

    pub fn selection(&self) -> &SelectionSet {
        &self.selection
    }

    pub fn is_polling(&self) -> bool {
        self.polling
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Returns whether anything changed since the last call and resets the flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub(crate) fn set_loading(&mut self, loading: bool) {
        if self.loading != loading {
            self.loading = loading;
            self.mark_dirty();
        }
    }

    pub(crate) fn set_polling(&mut self, polling: bool) {
        self.polling = polling;
    }

    pub(crate) fn mark_auth_invalid(&mut self) {
        self.auth_invalid = true;
        self.loading = false;
        self.mark_dirty();
    }

    pub(crate) fn dispose(&mut self) {
        self.disposed = true;
    }

    pub(crate) fn query_mut(&mut self) -> &mut ListQuery {
        &mut self.query
    }

    pub(crate) fn cursor(&self) -> PageCursor {
        self.cursor
    }

    /// Merges a fetch result. Returns true when the requested page turned out
    /// to be past the end and the query was clamped (server mode only).
    pub(crate) fn apply_snapshot(&mut self, snapshot: ListSnapshot) -> bool {
        self.seen.extend(snapshot.tasks.iter().map(|task| task.id.clone()));
        self.tasks = snapshot.tasks;
        self.auth_invalid = false;
        self.loading = false;

        let clamped = match self.mode {
            PagingMode::Server => {
                self.cursor = PageCursor::new(self.query.page, self.query.size, snapshot.total);
                let clamped = self.cursor.clamp();
                self.query.page = self.cursor.page;
                clamped
            }
            PagingMode::Client => {
                self.cursor.total = snapshot.total;
                self.cursor.clamp();
                false
            }
        };

        self.rebuild_page();
        clamped
    }

    /// Rows on screen right now. In client mode this is a slice of the cache.
    pub(crate) fn visible_tasks(&self) -> &[Task] {
        match self.mode {
            PagingMode::Server => &self.tasks,
            PagingMode::Client => self.cursor.slice(&self.tasks),
        }
    }

    /// Whether any fetched task (whole cache in client mode) is still active.
    pub(crate) fn has_active_work(&self) -> bool {
        crate::reconcile::has_active_work(&self.tasks)
    }

    pub(crate) fn rebuild_page(&mut self) {
        self.page = reconcile(self.visible_tasks(), &self.selection, self.cursor);
        self.mark_dirty();
    }

    pub(crate) fn set_client_page(&mut self, page: u32) {
        self.cursor.page = page;
        self.cursor.clamp();
        self.rebuild_page();
    }

    /// Filters changed: both the query and the local cursor go back to page 1.
    pub(crate) fn reset_to_first_page(&mut self) {
        self.query.page = 1;
        self.cursor.page = 1;
    }

    pub(crate) fn set_page_size(&mut self, size: u32) {
        // Client mode fetches the whole list, so its query never carries paging.
        if self.mode == PagingMode::Server {
            self.query.size = size;
            self.query.page = 1;
        }
        self.cursor.page_size = size;
        self.cursor.page = 1;
    }

    pub(crate) fn toggle_selection(&mut self, id: &str) -> bool {
        if !self.seen.contains(id) {
            return false;
        }
        self.selection.toggle(id);
        self.refresh_selection();
        true
    }

    pub(crate) fn toggle_select_all(&mut self) {
        let visible: Vec<&str> = self.page.rows.iter().map(|row| row.id.as_str()).collect();
        self.selection.select_all(visible.iter().copied());
        self.refresh_selection();
    }

    pub(crate) fn clear_selection(&mut self) {
        self.selection.clear();
        self.refresh_selection();
    }

    pub(crate) fn forget_selected(&mut self, ids: &[TaskId]) {
        self.selection.remove_all(ids.iter().map(String::as_str));
        self.refresh_selection();
    }

    fn refresh_selection(&mut self) {
        refresh_selection(&mut self.page, &self.selection);
        self.mark_dirty();
    }
}
