mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{init_logging, network_error, CountingStore, RecordingSink, ScriptedTransport};
use console_engine::{
    ApiError, ApiRequest, ApiResponse, Auth, AuthHeader, CredentialScope, CredentialStore,
    EngineEvent, FailureKind, RetryClient, RetryPolicy,
};
use pretty_assertions::assert_eq;

struct Harness {
    transport: Arc<ScriptedTransport>,
    store: Arc<CountingStore>,
    sink: Arc<RecordingSink>,
    client: RetryClient,
}

fn harness(transport: ScriptedTransport) -> Harness {
    init_logging();
    let transport = Arc::new(transport);
    let store = Arc::new(CountingStore::with_admin_and_token());
    let sink = Arc::new(RecordingSink::default());
    let client = RetryClient::new(transport.clone(), store.clone(), sink.clone());
    Harness {
        transport,
        store,
        sink,
        client,
    }
}

fn admin_request() -> ApiRequest {
    ApiRequest::get("/v1/admin/tasks").with_auth(Auth::Bearer(CredentialScope::Admin))
}

#[tokio::test(start_paused = true)]
async fn two_retryable_failures_then_success() {
    let h = harness(ScriptedTransport::statuses(&[503, 503, 200]));

    let response = h
        .client
        .request(&admin_request(), &RetryPolicy::default())
        .await
        .expect("response");

    assert_eq!(response.status, 200);
    let times = h.transport.call_times();
    assert_eq!(times.len(), 3);
    assert_eq!(times[1] - times[0], Duration::from_millis(300));
    assert_eq!(times[2] - times[1], Duration::from_millis(600));
}

#[tokio::test(start_paused = true)]
async fn exhausted_budget_returns_final_retryable_response() {
    let h = harness(ScriptedTransport::statuses(&[503, 503, 503, 200]));

    let response = h
        .client
        .request(&admin_request(), &RetryPolicy::default())
        .await
        .expect("response");

    assert_eq!(response.status, 503);
    assert_eq!(h.transport.call_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn unauthorized_is_never_retried_and_clears_once() {
    let h = harness(ScriptedTransport::new(vec![Ok(ApiResponse::new(
        401,
        r#"{"detail":"bad key"}"#,
    ))]));

    let err = h
        .client
        .request(&admin_request(), &RetryPolicy::default().with_retries(5))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        ApiError {
            kind: FailureKind::AuthInvalid,
            message: "bad key".to_string(),
        }
    );
    assert_eq!(h.transport.call_count(), 1);
    assert_eq!(
        h.transport.auth_headers(),
        vec![Some(AuthHeader::Bearer("admin-key".to_string()))]
    );
    assert_eq!(h.store.clears(), 1);
    assert_eq!(h.store.get(CredentialScope::Admin), None);
    assert_eq!(
        h.store.get(CredentialScope::TaskToken),
        Some("task-token".to_string())
    );
    assert_eq!(
        h.sink.take(),
        vec![EngineEvent::AuthInvalid {
            scope: CredentialScope::Admin
        }]
    );
}

#[tokio::test(start_paused = true)]
async fn unauthorized_without_invalidation_is_returned() {
    let h = harness(ScriptedTransport::statuses(&[401]));

    let response = h
        .client
        .request(
            &admin_request(),
            &RetryPolicy::default().without_auth_invalidation(),
        )
        .await
        .expect("response");

    assert_eq!(response.status, 401);
    assert_eq!(h.store.clears(), 0);
    assert!(h.sink.take().is_empty());
}

#[tokio::test(start_paused = true)]
async fn network_failures_share_the_budget() {
    let h = harness(ScriptedTransport::new(vec![
        Err(network_error()),
        Err(network_error()),
        Ok(ApiResponse::new(200, "{}")),
    ]));
    let response = h
        .client
        .request(&admin_request(), &RetryPolicy::default())
        .await
        .expect("response");
    assert_eq!(response.status, 200);

    let h = harness(ScriptedTransport::new(vec![
        Err(network_error()),
        Err(network_error()),
        Err(network_error()),
    ]));
    let err = h
        .client
        .request(&admin_request(), &RetryPolicy::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind, FailureKind::Network);
    assert_eq!(h.transport.call_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn non_transient_errors_and_other_statuses_return_immediately() {
    let h = harness(ScriptedTransport::new(vec![Err(ApiError {
        kind: FailureKind::InvalidUrl,
        message: "bad url".to_string(),
    })]));
    let err = h
        .client
        .request(&admin_request(), &RetryPolicy::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind, FailureKind::InvalidUrl);
    assert_eq!(h.transport.call_count(), 1);

    let h = harness(ScriptedTransport::statuses(&[404]));
    let response = h
        .client
        .request(&admin_request(), &RetryPolicy::default())
        .await
        .expect("response");
    assert_eq!(response.status, 404);
    assert_eq!(h.transport.call_count(), 1);
}

#[tokio::test]
async fn missing_credential_fails_before_sending() {
    let h = harness(ScriptedTransport::default());
    h.store.clear(CredentialScope::TaskToken);

    let request = ApiRequest::get("/v1/video/tasks")
        .with_auth(Auth::Bearer(CredentialScope::TaskToken));
    let err = h
        .client
        .request(&request, &RetryPolicy::default())
        .await
        .unwrap_err();

    assert_eq!(err.kind, FailureKind::Validation);
    assert_eq!(h.transport.call_count(), 0);
}

#[test]
fn backoff_doubles_up_to_the_cap() {
    let policy = RetryPolicy::default();
    assert_eq!(policy.delay_for(0), Duration::from_millis(300));
    assert_eq!(policy.delay_for(1), Duration::from_millis(600));
    assert_eq!(policy.delay_for(2), Duration::from_millis(1200));
    assert_eq!(policy.delay_for(3), Duration::from_millis(2000));
    assert_eq!(policy.delay_for(40), Duration::from_millis(2000));
}
