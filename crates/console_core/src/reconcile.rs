use crate::extract::{extract_media, payload_summary};
use crate::{PageCursor, SelectAllState, SelectionSet, Task, TaskRowView};

/// Render-ready rows for one page plus the recomputed select-all state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReconciledPage {
    pub rows: Vec<TaskRowView>,
    pub select_all: SelectAllState,
    pub cursor: PageCursor,
}

/// Merges a freshly fetched page with the current selection.
///
/// The selection itself is not modified; rows only reflect it. The
/// select-all state is computed against the IDs on this page, so selected
/// IDs that have disappeared server-side do not count.
pub fn reconcile(tasks: &[Task], selection: &SelectionSet, cursor: PageCursor) -> ReconciledPage {
    let rows: Vec<TaskRowView> = tasks.iter().map(|task| row_for(task, selection)).collect();
    let select_all = selection.tri_state(rows.iter().map(|row| row.id.as_str()));
    ReconciledPage {
        rows,
        select_all,
        cursor,
    }
}

/// Re-derives only the selection flags, e.g. after a checkbox toggle.
pub fn refresh_selection(page: &mut ReconciledPage, selection: &SelectionSet) {
    for row in &mut page.rows {
        row.selected = selection.has(&row.id);
    }
    page.select_all = selection.tri_state(page.rows.iter().map(|row| row.id.as_str()));
}

pub fn has_active_work(tasks: &[Task]) -> bool {
    tasks.iter().any(Task::is_active)
}

fn row_for(task: &Task, selection: &SelectionSet) -> TaskRowView {
    let media = if task.status.is_success() {
        Some(extract_media(task.kind, task.result.as_ref()))
    } else {
        None
    };
    TaskRowView {
        id: task.id.clone(),
        kind: task.kind,
        status: task.status.clone(),
        progress: task.progress,
        summary: payload_summary(&task.payload),
        media,
        error: task.error.clone(),
        created_at: task.created_at,
        selected: selection.has(&task.id),
    }
}
