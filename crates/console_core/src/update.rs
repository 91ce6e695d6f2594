use console_logging::console_debug;

use crate::{Effect, Msg, PagingMode, TaskListState};

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: TaskListState, msg: Msg) -> (TaskListState, Vec<Effect>) {
    if state.is_disposed() {
        return (state, Vec::new());
    }

    let effects = match msg {
        Msg::RefreshRequested => {
            state.set_loading(true);
            vec![Effect::FetchPage(state.query().clone())]
        }
        Msg::PageLoaded { query, snapshot } => {
            // Check-before-apply: a response for a query the view has moved
            // away from is a stale snapshot.
            if &query != state.query() {
                console_debug!(
                    "Dropping stale list response page={} (current page={})",
                    query.page,
                    state.query().page
                );
                return (state, Vec::new());
            }
            let clamped = state.apply_snapshot(snapshot);
            if clamped {
                console_debug!("Page past the end, clamped to {}", state.query().page);
                state.set_loading(true);
                vec![Effect::FetchPage(state.query().clone())]
            } else {
                polling_effects(&mut state)
            }
        }
        Msg::LoadFailed(message) => {
            state.set_loading(false);
            vec![Effect::error(format!("Failed to load tasks: {message}"))]
        }
        Msg::PageChanged(delta) => match state.cursor().step(delta) {
            Some(page) => match state.mode() {
                PagingMode::Server => {
                    state.query_mut().page = page;
                    state.set_loading(true);
                    vec![Effect::FetchPage(state.query().clone())]
                }
                PagingMode::Client => {
                    state.set_client_page(page);
                    Vec::new()
                }
            },
            None => Vec::new(),
        },
        Msg::PageSizeChanged(size) => {
            if size == 0 || size == state.cursor().page_size {
                return (state, Vec::new());
            }
            state.set_page_size(size);
            match state.mode() {
                PagingMode::Server => {
                    state.set_loading(true);
                    vec![Effect::FetchPage(state.query().clone())]
                }
                PagingMode::Client => {
                    state.set_client_page(1);
                    Vec::new()
                }
            }
        }
        Msg::StatusFilterChanged(status) => {
            state.query_mut().status = status;
            state.reset_to_first_page();
            state.set_loading(true);
            vec![Effect::FetchPage(state.query().clone())]
        }
        Msg::TypeFilterChanged(task_type) => {
            state.query_mut().task_type = task_type;
            state.reset_to_first_page();
            state.set_loading(true);
            vec![Effect::FetchPage(state.query().clone())]
        }
        Msg::SelectionToggled(id) => {
            if !state.toggle_selection(&id) {
                console_debug!("Ignoring selection of unseen task {}", id);
            }
            Vec::new()
        }
        Msg::SelectAllToggled => {
            state.toggle_select_all();
            Vec::new()
        }
        Msg::SelectionCleared => {
            state.clear_selection();
            Vec::new()
        }
        Msg::BatchDeleteRequested => {
            if state.selection().is_empty() {
                Vec::new()
            } else {
                vec![Effect::BatchDelete {
                    task_ids: state.selection().ids(),
                }]
            }
        }
        Msg::BatchDeleted { task_ids, message } => {
            state.forget_selected(&task_ids);
            state.set_loading(true);
            vec![
                Effect::success(message),
                Effect::FetchPage(state.query().clone()),
            ]
        }
        Msg::ClearTasksRequested => vec![Effect::ClearTasks {
            task_type: state.query().task_type,
            status: state.query().status.clone(),
        }],
        Msg::TasksCleared { message } => {
            state.clear_selection();
            state.set_loading(true);
            vec![
                Effect::success(message),
                Effect::FetchPage(state.query().clone()),
            ]
        }
        Msg::ActionFailed(message) => vec![Effect::error(message)],
        Msg::AuthInvalid => {
            state.mark_auth_invalid();
            let mut effects = stop_polling(&mut state);
            effects.push(Effect::error("Credential rejected; set a valid key and retry"));
            effects
        }
        Msg::Disposed => {
            let effects = stop_polling(&mut state);
            state.dispose();
            effects
        }
    };

    (state, effects)
}

/// Start polling while active work exists, stop once none remains.
fn polling_effects(state: &mut TaskListState) -> Vec<Effect> {
    let active = state.has_active_work();
    match (active, state.is_polling()) {
        (true, false) => {
            state.set_polling(true);
            vec![Effect::StartPolling]
        }
        (false, true) => stop_polling(state),
        _ => Vec::new(),
    }
}

fn stop_polling(state: &mut TaskListState) -> Vec<Effect> {
    if state.is_polling() {
        state.set_polling(false);
        vec![Effect::StopPolling]
    } else {
        Vec::new()
    }
}
