mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{http_api, init_logging, CountingStore, RecordingSink};
use console_core::{Msg, NoticeLevel, SelectAllState, TaskStatus};
use console_engine::{CredentialScope, CredentialStore, EngineEvent, ListSession, ViewConfig};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn admin_task(id: &str, status: &str) -> Value {
    let progress = if status == "completed" { 100 } else { 10 };
    json!({
        "id": id,
        "type": "video",
        "status": status,
        "progress": progress,
        "payload": {"prompt": format!("prompt {id}")},
        "result": null,
        "error": null,
        "created_at": 1700000000
    })
}

fn page(tasks: Vec<Value>, total: u64) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "data": tasks,
        "total": total,
        "page": 1,
        "size": 20
    }))
}

struct Fixture {
    server: MockServer,
    store: Arc<CountingStore>,
    sink: Arc<RecordingSink>,
}

impl Fixture {
    async fn start() -> Self {
        init_logging();
        Self {
            server: MockServer::start().await,
            store: Arc::new(CountingStore::with_admin_and_token()),
            sink: Arc::new(RecordingSink::default()),
        }
    }

    fn session(&self, config: ViewConfig) -> ListSession {
        let api = http_api(&self.server.uri(), self.store.clone(), self.sink.clone());
        ListSession::create(api, config, self.sink.clone())
    }

    fn admin_session(&self) -> ListSession {
        self.session(ViewConfig {
            poll_interval: Duration::from_millis(50),
            ..ViewConfig::admin_tasks()
        })
    }

    async fn requests_to(&self, wanted: &str) -> usize {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|request| request.url.path() == wanted)
            .count()
    }
}

#[tokio::test]
async fn refresh_renders_server_page_with_admin_bearer() {
    let fx = Fixture::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/admin/tasks"))
        .and(header("authorization", "Bearer admin-key"))
        .and(query_param("page", "1"))
        .and(query_param("size", "20"))
        .and(query_param("sort_by", "created_at"))
        .and(query_param("order", "desc"))
        .respond_with(page(
            vec![admin_task("a", "completed"), admin_task("b", "failed")],
            2,
        ))
        .mount(&fx.server)
        .await;

    let session = fx.admin_session();
    session.refresh().await;

    let view = session.view();
    assert_eq!(view.visible_ids(), vec!["a".to_string(), "b".to_string()]);
    assert_eq!(view.rows[0].summary, "prompt a");
    assert!(!view.loading);
    assert!(!session.is_polling());
    assert!(fx
        .sink
        .take()
        .iter()
        .any(|event| matches!(event, EngineEvent::ListRefreshed(view) if view.rows.len() == 2)));
}

#[tokio::test]
async fn list_poller_stops_after_observing_all_terminal() {
    let fx = Fixture::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/admin/tasks"))
        .respond_with(page(vec![admin_task("a", "running")], 1))
        .up_to_n_times(1)
        .mount(&fx.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/admin/tasks"))
        .respond_with(page(vec![admin_task("a", "completed")], 1))
        .mount(&fx.server)
        .await;

    let session = fx.admin_session();
    session.refresh().await;
    assert!(session.is_polling());
    assert!(session.view().polling);

    tokio::time::timeout(Duration::from_secs(5), session.polling_finished())
        .await
        .expect("poller settles");
    assert!(!session.is_polling());
    assert_eq!(session.view().rows[0].status, TaskStatus::Completed);
    assert_eq!(fx.requests_to("/v1/admin/tasks").await, 2);

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(fx.requests_to("/v1/admin/tasks").await, 2);
}

#[tokio::test]
async fn rejected_key_is_cleared_and_flagged() {
    let fx = Fixture::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/admin/tasks"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"detail": "invalid key"})))
        .mount(&fx.server)
        .await;

    let session = fx.admin_session();
    session.refresh().await;

    assert!(session.view().auth_invalid);
    assert_eq!(fx.store.get(CredentialScope::Admin), None);
    assert_eq!(fx.store.clears(), 1);
    assert_eq!(fx.requests_to("/v1/admin/tasks").await, 1);
    let events = fx.sink.take();
    assert!(events.contains(&EngineEvent::AuthInvalid {
        scope: CredentialScope::Admin
    }));
    assert!(events.iter().any(|event| matches!(
        event,
        EngineEvent::Notice {
            level: NoticeLevel::Error,
            ..
        }
    )));
}

#[tokio::test]
async fn batch_delete_posts_selection_and_refetches() {
    let fx = Fixture::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/admin/tasks"))
        .respond_with(page(
            vec![
                admin_task("a", "failed"),
                admin_task("b", "failed"),
                admin_task("c", "failed"),
            ],
            3,
        ))
        .mount(&fx.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/admin/tasks/batch/delete"))
        .and(body_json(json!({"task_ids": ["a", "c"]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "Deleted 2 tasks"})))
        .expect(1)
        .mount(&fx.server)
        .await;

    let session = fx.admin_session();
    session.refresh().await;
    session.dispatch(Msg::SelectionToggled("a".to_string())).await;
    session.dispatch(Msg::SelectionToggled("c".to_string())).await;
    assert_eq!(session.view().select_all, SelectAllState::Some);
    fx.sink.take();

    session.dispatch(Msg::BatchDeleteRequested).await;

    assert_eq!(session.view().selected_count, 0);
    assert_eq!(fx.requests_to("/v1/admin/tasks").await, 2);
    assert!(fx.sink.take().contains(&EngineEvent::Notice {
        level: NoticeLevel::Success,
        message: "Deleted 2 tasks".to_string(),
    }));
}

#[tokio::test]
async fn disposed_session_issues_no_requests() {
    let fx = Fixture::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/admin/tasks"))
        .respond_with(page(vec![admin_task("a", "running")], 1))
        .mount(&fx.server)
        .await;

    let session = fx.admin_session();
    session.refresh().await;
    assert!(session.is_polling());

    session.dispose();
    assert!(!session.is_polling());
    let before = fx.requests_to("/v1/admin/tasks").await;
    session.refresh().await;
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(fx.requests_to("/v1/admin/tasks").await, before);
}

#[tokio::test]
async fn video_list_is_fetched_once_and_paged_locally() {
    let fx = Fixture::start().await;
    let records: Vec<Value> = (1..=5)
        .map(|n| {
            json!({
                "id": format!("v{n}"),
                "prompt": "waves",
                "status": "completed",
                "progress": 100,
                "video_url": format!("https://cdn.example.com/v{n}.mp4"),
                "created_at": 1700000000.25
            })
        })
        .collect();
    Mock::given(method("GET"))
        .and(path("/v1/video/tasks"))
        .and(header("authorization", "Bearer task-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "tasks": records })))
        .mount(&fx.server)
        .await;

    let session = fx.session(ViewConfig {
        page_size: 2,
        poll_interval: Duration::from_millis(50),
        ..ViewConfig::video_tasks()
    });
    session.refresh().await;
    assert_eq!(
        session.view().visible_ids(),
        vec!["v1".to_string(), "v2".to_string()]
    );
    assert_eq!(
        session.view().rows[0]
            .media
            .as_ref()
            .and_then(|media| media.media_url.clone()),
        Some("https://cdn.example.com/v1.mp4".to_string())
    );

    session.dispatch(Msg::PageChanged(2)).await;
    assert_eq!(session.view().visible_ids(), vec!["v5".to_string()]);
    assert_eq!(fx.requests_to("/v1/video/tasks").await, 1);
}
