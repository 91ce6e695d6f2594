//! Typed calls for every backend endpoint the console consumes.
//!
//! Admin task endpoints authenticate with the admin key as a bearer token,
//! cache endpoints send the same key as `X-API-Key`, and the generation
//! endpoints use the task token.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use console_core::{GenerationRequest, ListQuery, Task, TaskId, TaskPage, TaskStatus, TaskType};

use crate::retry::{RetryClient, RetryPolicy};
use crate::transport::{ApiRequest, Auth};
use crate::{ApiError, CredentialScope, FailureKind};

const ADMIN_TASKS: &str = "/v1/admin/tasks";
const CACHE: &str = "/api/v1/admin/cache";

/// `{message}` style acknowledgement returned by mutating endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ActionMessage {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub count: Option<u64>,
}

impl ActionMessage {
    /// The backend's message, or `fallback` when it sent none.
    pub fn text_or(&self, fallback: &str) -> String {
        if self.message.trim().is_empty() {
            fallback.to_string()
        } else {
            self.message.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CacheStats {
    #[serde(default)]
    pub image_count: u64,
    #[serde(default)]
    pub video_count: u64,
    #[serde(default)]
    pub total_size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OnlineCacheStats {
    #[serde(default)]
    pub image_count: u64,
    #[serde(default)]
    pub video_count: u64,
    #[serde(default)]
    pub total_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheItem {
    pub name: String,
    #[serde(default)]
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CachePage {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub items: Vec<CacheItem>,
}

#[derive(Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Deserialize)]
struct Submitted {
    #[serde(rename = "taskId", alias = "task_id")]
    task_id: TaskId,
}

#[derive(Deserialize)]
struct VideoTaskList {
    #[serde(default, alias = "data")]
    tasks: Vec<Value>,
}

#[derive(Clone)]
pub struct ConsoleApi {
    client: RetryClient,
    policy: RetryPolicy,
}

impl ConsoleApi {
    pub fn new(client: RetryClient, policy: RetryPolicy) -> Self {
        Self { client, policy }
    }

    pub fn client(&self) -> &RetryClient {
        &self.client
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    async fn call<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, ApiError> {
        self.call_with(request, &self.policy).await
    }

    async fn call_with<T: DeserializeOwned>(
        &self,
        request: ApiRequest,
        policy: &RetryPolicy,
    ) -> Result<T, ApiError> {
        self.client.request(&request, policy).await?.into_result()
    }

    fn admin(request: ApiRequest) -> ApiRequest {
        request.with_auth(Auth::Bearer(CredentialScope::Admin))
    }

    fn cache(request: ApiRequest) -> ApiRequest {
        request.with_auth(Auth::ApiKey(CredentialScope::Admin))
    }

    fn generation(request: ApiRequest) -> ApiRequest {
        request.with_auth(Auth::Bearer(CredentialScope::TaskToken))
    }

    // Admin tasks

    pub async fn list_tasks(&self, query: &ListQuery) -> Result<TaskPage, ApiError> {
        let request = ApiRequest::get(ADMIN_TASKS).with_query(query.to_query_pairs());
        self.call(Self::admin(request)).await
    }

    pub async fn task_detail(&self, task_id: &str) -> Result<Task, ApiError> {
        let request = ApiRequest::get(format!("{ADMIN_TASKS}/{task_id}"));
        let body: Value = self.call(Self::admin(request)).await?;
        let record = match body {
            Value::Object(mut object) if object.get("data").is_some_and(Value::is_object) => {
                object.remove("data").unwrap_or(Value::Null)
            }
            other => other,
        };
        serde_json::from_value(record).map_err(decode_error)
    }

    pub async fn batch_delete(&self, task_ids: &[TaskId]) -> Result<ActionMessage, ApiError> {
        let request = ApiRequest::post(
            format!("{ADMIN_TASKS}/batch/delete"),
            json!({ "task_ids": task_ids }),
        );
        self.call(Self::admin(request)).await
    }

    pub async fn clear_tasks(
        &self,
        task_type: Option<TaskType>,
        status: Option<&TaskStatus>,
    ) -> Result<ActionMessage, ApiError> {
        let mut body = Map::new();
        if let Some(task_type) = task_type {
            body.insert("type".into(), json!(task_type.as_str()));
        }
        if let Some(status) = status {
            body.insert("status".into(), json!(status.as_str()));
        }
        let request = ApiRequest::post(format!("{ADMIN_TASKS}/clear"), Value::Object(body));
        self.call(Self::admin(request)).await
    }

    // Generation

    /// Validates and submits a generation job, returning the new task ID.
    pub async fn submit_generation(&self, request: &GenerationRequest) -> Result<TaskId, ApiError> {
        request.validate()?;
        let api_request = ApiRequest::post(request.endpoint(), request.to_payload());
        let submitted: Envelope<Submitted> = self.call(Self::generation(api_request)).await?;
        Ok(submitted.data.task_id)
    }

    /// Status of one generation task, for polling. A 401 is reported as an
    /// error without clearing the stored token.
    pub async fn generation_task(&self, kind: TaskType, task_id: &str) -> Result<Task, ApiError> {
        let request = ApiRequest::get(format!("{}/{task_id}", tasks_path(kind)));
        let policy = self.policy.without_auth_invalidation();
        let body: Envelope<Value> = self.call_with(Self::generation(request), &policy).await?;
        normalize_task(kind, body.data)
    }

    pub async fn list_video_tasks(
        &self,
        status: Option<&TaskStatus>,
    ) -> Result<Vec<Task>, ApiError> {
        let mut request = ApiRequest::get(tasks_path(TaskType::Video));
        if let Some(status) = status {
            request = request.with_query([("status", status.as_str())]);
        }
        let list: VideoTaskList = self.call(Self::generation(request)).await?;
        list.tasks
            .into_iter()
            .map(|record| normalize_task(TaskType::Video, record))
            .collect()
    }

    pub async fn cancel_video_task(&self, task_id: &str) -> Result<ActionMessage, ApiError> {
        let request = ApiRequest::delete(format!("{}/{task_id}", tasks_path(TaskType::Video)));
        self.call(Self::generation(request)).await
    }

    pub async fn delete_video_tasks(&self, task_ids: &[TaskId]) -> Result<ActionMessage, ApiError> {
        let request = ApiRequest::delete(tasks_path(TaskType::Video))
            .with_body(json!({ "task_ids": task_ids }));
        self.call(Self::generation(request)).await
    }

    pub async fn delete_video_tasks_by_status(
        &self,
        status: &TaskStatus,
    ) -> Result<ActionMessage, ApiError> {
        let request = ApiRequest::delete(format!(
            "{}/status/{}",
            tasks_path(TaskType::Video),
            status.as_str()
        ));
        self.call(Self::generation(request)).await
    }

    pub async fn clear_video_tasks(&self) -> Result<ActionMessage, ApiError> {
        let request = ApiRequest::delete(format!("{}/all", tasks_path(TaskType::Video)));
        self.call(Self::generation(request)).await
    }

    /// The request that opens a task's progress event stream.
    pub fn video_stream_request(&self, task_id: &str) -> ApiRequest {
        Self::generation(ApiRequest::get(format!(
            "{}/{task_id}/stream",
            tasks_path(TaskType::Video)
        )))
    }

    /// Checks a task token against the backend without storing it.
    pub async fn verify_token(&self, token: &str) -> Result<(), ApiError> {
        let request = ApiRequest::get("/v1/models").with_auth(Auth::Explicit(token.to_string()));
        let policy = self.policy.without_auth_invalidation();
        let response = self.client.request(&request, &policy).await?;
        match response.status {
            status if (200..300).contains(&status) => Ok(()),
            401 | 403 => Err(ApiError::new(
                FailureKind::AuthInvalid,
                response.error_message(),
            )),
            status => Err(ApiError::new(
                FailureKind::HttpStatus(status),
                response.error_message(),
            )),
        }
    }

    // Cache

    pub async fn cache_stats(&self) -> Result<CacheStats, ApiError> {
        self.call(Self::cache(ApiRequest::get(CACHE))).await
    }

    pub async fn cache_list(
        &self,
        kind: TaskType,
        page: u32,
        page_size: u32,
    ) -> Result<CachePage, ApiError> {
        let request = ApiRequest::get(format!("{CACHE}/list")).with_query([
            ("type", kind.as_str().to_string()),
            ("page", page.max(1).to_string()),
            ("page_size", page_size.max(1).to_string()),
        ]);
        self.call(Self::cache(request)).await
    }

    pub async fn online_cache_stats(&self) -> Result<OnlineCacheStats, ApiError> {
        self.call(Self::cache(ApiRequest::get(format!("{CACHE}/online/stats"))))
            .await
    }

    pub async fn delete_cache_item(
        &self,
        kind: TaskType,
        name: &str,
    ) -> Result<ActionMessage, ApiError> {
        let request = ApiRequest::post(
            format!("{CACHE}/item/delete"),
            json!({ "type": kind.as_str(), "name": name }),
        );
        self.call(Self::cache(request)).await
    }

    pub async fn clear_cache(&self, kind: TaskType) -> Result<ActionMessage, ApiError> {
        let request = ApiRequest::post(format!("{CACHE}/clear"), json!({ "type": kind.as_str() }));
        self.call(Self::cache(request)).await
    }

    pub async fn load_online_cache(&self) -> Result<ActionMessage, ApiError> {
        let request = ApiRequest::post(format!("{CACHE}/online/load/async"), json!({}));
        self.call(Self::cache(request)).await
    }

    pub async fn clear_online_cache(&self) -> Result<ActionMessage, ApiError> {
        let request = ApiRequest::post(format!("{CACHE}/online/clear"), json!({}));
        self.call(Self::cache(request)).await
    }
}

fn tasks_path(kind: TaskType) -> &'static str {
    match kind {
        TaskType::Video => "/v1/video/tasks",
        TaskType::Image => "/v1/images/tasks",
    }
}

fn decode_error(err: serde_json::Error) -> ApiError {
    ApiError::new(FailureKind::Decode, err.to_string())
}

/// Turns a generation-side task record into a [`Task`].
///
/// Those records are flat: no `type`, the prompt at top level, and the
/// output links (`video_url`, `thumbnail_url`) next to the status instead of
/// inside `result`.
pub(crate) fn normalize_task(kind: TaskType, record: Value) -> Result<Task, ApiError> {
    let Value::Object(mut record) = record else {
        return Err(ApiError::new(
            FailureKind::Decode,
            "task record is not an object",
        ));
    };
    record
        .entry("type")
        .or_insert_with(|| json!(kind.as_str()));
    if !record.contains_key("payload") {
        if let Some(prompt) = record.get("prompt").filter(|value| !value.is_null()) {
            let payload = json!({ "prompt": prompt });
            record.insert("payload".into(), payload);
        }
    }
    if record.get("result").map_or(true, Value::is_null) {
        let links: Map<String, Value> = ["video_url", "thumbnail_url"]
            .iter()
            .filter_map(|key| {
                record
                    .get(*key)
                    .filter(|value| !value.is_null())
                    .map(|value| ((*key).to_string(), value.clone()))
            })
            .collect();
        if !links.is_empty() {
            record.insert("result".into(), Value::Object(links));
        }
    }
    serde_json::from_value(Value::Object(record)).map_err(decode_error)
}
