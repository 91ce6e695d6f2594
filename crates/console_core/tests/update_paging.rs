use std::sync::Once;

use console_core::{
    update, Effect, ListQuery, ListSnapshot, Msg, PagingMode, Task, TaskListState, TaskStatus,
    TaskType,
};
use pretty_assertions::assert_eq;
use serde_json::Value;

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(console_logging::initialize_for_tests);
}

fn task(id: &str, status: TaskStatus) -> Task {
    Task {
        id: id.to_string(),
        kind: TaskType::Image,
        status,
        progress: 0,
        payload: Value::Null,
        result: None,
        error: None,
        created_at: 0,
    }
}

fn tasks(ids: &[&str]) -> Vec<Task> {
    ids.iter()
        .map(|id| task(id, TaskStatus::Completed))
        .collect()
}

fn loaded(state: TaskListState, tasks: Vec<Task>, total: u64) -> (TaskListState, Vec<Effect>) {
    let query = state.query().clone();
    update(
        state,
        Msg::PageLoaded {
            query,
            snapshot: ListSnapshot { tasks, total },
        },
    )
}

fn row_ids(state: &TaskListState) -> Vec<String> {
    state.view().visible_ids()
}

#[test]
fn page_past_the_end_is_clamped_and_refetched() {
    init_logging();
    let state = TaskListState::with_mode(PagingMode::Server, 20);
    let (state, _) = loaded(state, tasks(&["a"]), 200);
    let (state, effects) = update(state, Msg::PageChanged(4));
    assert_eq!(state.query().page, 5);
    assert_eq!(effects, vec![Effect::FetchPage(state.query().clone())]);

    // Rows were deleted elsewhere while page 5 was in flight.
    let (state, effects) = loaded(state, Vec::new(), 45);

    let expected = ListQuery {
        page: 3,
        ..ListQuery::default()
    };
    assert_eq!(state.query(), &expected);
    assert_eq!(state.view().cursor.page, 3);
    assert_eq!(effects, vec![Effect::FetchPage(expected)]);
}

#[test]
fn out_of_range_page_change_is_ignored() {
    init_logging();
    let state = TaskListState::new();
    let (state, _) = loaded(state, tasks(&["a", "b"]), 2);

    let (state, effects) = update(state, Msg::PageChanged(1));
    assert!(effects.is_empty());
    let (state, effects) = update(state, Msg::PageChanged(-1));
    assert!(effects.is_empty());
    assert_eq!(state.query().page, 1);
}

#[test]
fn stale_response_is_dropped() {
    init_logging();
    let state = TaskListState::new();
    let (state, _) = loaded(state, tasks(&["p1"]), 60);
    let first_page = state.query().clone();
    let (state, _) = update(state, Msg::PageChanged(1));
    let (state, _) = loaded(state, tasks(&["p2"]), 60);

    let (state, effects) = update(
        state,
        Msg::PageLoaded {
            query: first_page,
            snapshot: ListSnapshot {
                tasks: tasks(&["old"]),
                total: 60,
            },
        },
    );

    assert!(effects.is_empty());
    assert_eq!(row_ids(&state), vec!["p2".to_string()]);
    assert_eq!(state.query().page, 2);
}

#[test]
fn filter_change_resets_to_first_page() {
    init_logging();
    let state = TaskListState::new();
    let (state, _) = loaded(state, tasks(&["a"]), 100);
    let (state, _) = update(state, Msg::PageChanged(2));
    assert_eq!(state.query().page, 3);

    let (state, effects) = update(state, Msg::StatusFilterChanged(Some(TaskStatus::Failed)));
    let expected = ListQuery {
        status: Some(TaskStatus::Failed),
        ..ListQuery::default()
    };
    assert_eq!(effects, vec![Effect::FetchPage(expected.clone())]);
    assert!(state.view().loading);

    let (state, effects) = update(state, Msg::TypeFilterChanged(Some(TaskType::Video)));
    assert_eq!(
        effects,
        vec![Effect::FetchPage(ListQuery {
            task_type: Some(TaskType::Video),
            ..expected
        })]
    );
    assert_eq!(state.view().type_filter, Some(TaskType::Video));
}

#[test]
fn client_mode_filter_change_returns_to_first_page() {
    init_logging();
    let state = TaskListState::with_mode(PagingMode::Client, 2);
    let (state, _) = loaded(state, tasks(&["t1", "t2", "t3", "t4", "t5", "t6"]), 6);
    let (state, _) = update(state, Msg::PageChanged(2));
    assert_eq!(state.view().cursor.page, 3);

    let (state, effects) = update(state, Msg::StatusFilterChanged(Some(TaskStatus::Failed)));
    assert_eq!(effects, vec![Effect::FetchPage(state.query().clone())]);
    let (state, _) = loaded(state, tasks(&["f1", "f2", "f3", "f4", "f5", "f6"]), 6);
    assert_eq!(state.view().cursor.page, 1);
    assert_eq!(row_ids(&state), vec!["f1".to_string(), "f2".to_string()]);

    let (state, _) = update(state, Msg::PageChanged(1));
    let (state, _) = update(state, Msg::TypeFilterChanged(Some(TaskType::Video)));
    let (state, _) = loaded(state, tasks(&["v1", "v2", "v3"]), 3);
    assert_eq!(state.view().cursor.page, 1);
}

#[test]
fn page_size_change_refetches_from_page_one() {
    init_logging();
    let state = TaskListState::new();
    let (state, _) = loaded(state, tasks(&["a"]), 100);
    let (state, _) = update(state, Msg::PageChanged(1));

    let (state, effects) = update(state, Msg::PageSizeChanged(50));
    let expected = ListQuery {
        size: 50,
        ..ListQuery::default()
    };
    assert_eq!(effects, vec![Effect::FetchPage(expected)]);

    let (_state, effects) = update(state, Msg::PageSizeChanged(50));
    assert!(effects.is_empty());
}

#[test]
fn client_mode_pages_locally() {
    init_logging();
    let state = TaskListState::with_mode(PagingMode::Client, 2);
    let query = state.query().clone();
    let (state, effects) = update(
        state,
        Msg::PageLoaded {
            query,
            snapshot: ListSnapshot::full(tasks(&["t1", "t2", "t3", "t4", "t5"])),
        },
    );
    assert!(effects.is_empty());
    assert_eq!(row_ids(&state), vec!["t1".to_string(), "t2".to_string()]);
    assert_eq!(state.view().cursor.total_pages(), 3);

    let (state, effects) = update(state, Msg::PageChanged(2));
    assert!(effects.is_empty());
    assert_eq!(row_ids(&state), vec!["t5".to_string()]);

    let (state, effects) = update(state, Msg::PageSizeChanged(4));
    assert!(effects.is_empty());
    assert_eq!(state.view().cursor.page, 1);
    assert_eq!(row_ids(&state).len(), 4);
}

#[test]
fn client_mode_shrinking_list_clamps_locally() {
    init_logging();
    let state = TaskListState::with_mode(PagingMode::Client, 2);
    let (state, _) = loaded(state, tasks(&["t1", "t2", "t3", "t4", "t5"]), 5);
    let (state, _) = update(state, Msg::PageChanged(2));
    assert_eq!(state.view().cursor.page, 3);

    let (state, effects) = loaded(state, tasks(&["t1", "t2"]), 2);
    assert!(effects.is_empty());
    assert_eq!(state.view().cursor.page, 1);
    assert_eq!(row_ids(&state), vec!["t1".to_string(), "t2".to_string()]);
}

#[test]
fn starting_query_is_sent_on_first_refresh() {
    init_logging();
    let start = ListQuery {
        page: 2,
        size: 10,
        status: Some(TaskStatus::Failed),
        task_type: Some(TaskType::Video),
        ..ListQuery::default()
    };
    let state = TaskListState::with_query(PagingMode::Server, start.clone());
    let (_, effects) = update(state, Msg::RefreshRequested);
    assert_eq!(effects, vec![Effect::FetchPage(start)]);
}

#[test]
fn client_mode_start_page_only_moves_the_cursor() {
    init_logging();
    let start = ListQuery {
        page: 2,
        size: 2,
        ..ListQuery::default()
    };
    let state = TaskListState::with_query(PagingMode::Client, start);
    assert_eq!(state.query().page, 1);
    let (state, _) = loaded(state, tasks(&["a", "b", "c", "d", "e"]), 5);
    assert_eq!(row_ids(&state), vec!["c", "d"]);
}
