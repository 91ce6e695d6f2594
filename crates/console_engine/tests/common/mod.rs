#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};

use console_engine::{
    ApiError, ApiRequest, ApiResponse, AuthHeader, ByteStream, ConsoleApi, CredentialScope,
    CredentialStore, EngineEvent, EventSink, FailureKind, MemoryCredentialStore, ReqwestTransport,
    RetryClient, RetryPolicy, Transport, TransportSettings,
};
use tokio::time::Instant;

pub fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(console_logging::initialize_for_tests);
}

#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<EngineEvent>>,
}

impl RecordingSink {
    pub fn take(&self) -> Vec<EngineEvent> {
        self.events.lock().unwrap().drain(..).collect()
    }

    pub fn snapshot(&self) -> Vec<EngineEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: EngineEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// Credential store that counts how often each credential was cleared.
#[derive(Default)]
pub struct CountingStore {
    inner: MemoryCredentialStore,
    clears: AtomicUsize,
}

impl CountingStore {
    pub fn with_admin_and_token() -> Self {
        let store = Self::default();
        store.set(CredentialScope::Admin, "admin-key".to_string());
        store.set(CredentialScope::TaskToken, "task-token".to_string());
        store
    }

    pub fn clears(&self) -> usize {
        self.clears.load(Ordering::SeqCst)
    }
}

impl CredentialStore for CountingStore {
    fn get(&self, scope: CredentialScope) -> Option<String> {
        self.inner.get(scope)
    }

    fn set(&self, scope: CredentialScope, secret: String) {
        self.inner.set(scope, secret);
    }

    fn clear(&self, scope: CredentialScope) {
        self.clears.fetch_add(1, Ordering::SeqCst);
        self.inner.clear(scope);
    }
}

/// Replies from a fixed script and records when each call arrived.
#[derive(Default)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Result<ApiResponse, ApiError>>>,
    calls: Mutex<Vec<(Instant, Option<AuthHeader>)>>,
}

impl ScriptedTransport {
    pub fn new(script: Vec<Result<ApiResponse, ApiError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn statuses(statuses: &[u16]) -> Self {
        Self::new(
            statuses
                .iter()
                .map(|status| Ok(ApiResponse::new(*status, "{}")))
                .collect(),
        )
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn call_times(&self) -> Vec<Instant> {
        self.calls.lock().unwrap().iter().map(|(at, _)| *at).collect()
    }

    pub fn auth_headers(&self) -> Vec<Option<AuthHeader>> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(_, auth)| auth.clone())
            .collect()
    }
}

#[async_trait::async_trait]
impl Transport for ScriptedTransport {
    async fn send(
        &self,
        _request: &ApiRequest,
        auth: Option<&AuthHeader>,
    ) -> Result<ApiResponse, ApiError> {
        self.calls
            .lock()
            .unwrap()
            .push((Instant::now(), auth.cloned()));
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .expect("script exhausted")
    }

    async fn open_stream(
        &self,
        _request: &ApiRequest,
        _auth: Option<&AuthHeader>,
    ) -> Result<ByteStream, ApiError> {
        Err(network_error())
    }
}

pub fn network_error() -> ApiError {
    ApiError {
        kind: FailureKind::Network,
        message: "connection reset".to_string(),
    }
}

/// An API client against a real HTTP server (wiremock).
pub fn http_api(
    base_url: &str,
    store: Arc<dyn CredentialStore>,
    sink: Arc<dyn EventSink>,
) -> ConsoleApi {
    let transport = ReqwestTransport::new(TransportSettings {
        base_url: base_url.to_string(),
        ..TransportSettings::default()
    })
    .expect("transport");
    let client = RetryClient::new(Arc::new(transport), store, sink);
    ConsoleApi::new(client, RetryPolicy::default())
}
