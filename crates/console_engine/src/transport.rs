use std::time::Duration;

use bytes::Bytes;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use crate::{ApiError, CredentialScope, FailureKind};

/// Raw SSE body chunks.
pub type ByteStream = BoxStream<'static, Result<Bytes, ApiError>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Delete,
}

impl Method {
    fn as_reqwest(self) -> reqwest::Method {
        match self {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

/// How a request authenticates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Auth {
    None,
    /// `Authorization: Bearer` with the stored credential of this scope.
    Bearer(CredentialScope),
    /// `X-API-Key` with the stored credential of this scope.
    ApiKey(CredentialScope),
    /// `Authorization: Bearer` with a token that is not stored yet.
    Explicit(String),
}

impl Auth {
    /// The stored credential this request depends on, if any.
    pub fn scope(&self) -> Option<CredentialScope> {
        match self {
            Auth::Bearer(scope) | Auth::ApiKey(scope) => Some(*scope),
            Auth::None | Auth::Explicit(_) => None,
        }
    }
}

/// Resolved credential header for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthHeader {
    Bearer(String),
    ApiKey(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    /// Path relative to the configured base URL, with a leading `/`.
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    pub auth: Auth,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            auth: Auth::None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::Post, path).with_body(body)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path)
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_query<K, V>(mut self, pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.query
            .extend(pairs.into_iter().map(|(key, value)| (key.into(), value.into())));
        self
    }

    pub fn with_auth(mut self, auth: Auth) -> Self {
        self.auth = auth;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Bytes,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        serde_json::from_slice(&self.body)
            .map_err(|err| ApiError::new(FailureKind::Decode, err.to_string()))
    }

    /// The backend's own explanation: `detail`, then `message`, then the
    /// status line.
    pub fn error_message(&self) -> String {
        let parsed: Option<Value> = serde_json::from_slice(&self.body).ok();
        let from_body = parsed.as_ref().and_then(|body| {
            ["detail", "message"].iter().find_map(|key| match body.get(key) {
                Some(Value::String(text)) if !text.is_empty() => Some(text.clone()),
                Some(Value::Null) | None => None,
                Some(other) => Some(other.to_string()),
            })
        });
        from_body.unwrap_or_else(|| status_text(self.status))
    }

    /// Success body decoded as `T`; any other status becomes an error.
    pub fn into_result<T: DeserializeOwned>(self) -> Result<T, ApiError> {
        if self.is_success() {
            self.json()
        } else {
            Err(ApiError::new(
                FailureKind::HttpStatus(self.status),
                self.error_message(),
            ))
        }
    }
}

fn status_text(status: u16) -> String {
    match reqwest::StatusCode::from_u16(status) {
        Ok(code) => code.to_string(),
        Err(_) => format!("HTTP {status}"),
    }
}

#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        request: &ApiRequest,
        auth: Option<&AuthHeader>,
    ) -> Result<ApiResponse, ApiError>;

    /// Opens a long-lived response body; non-2xx statuses fail.
    async fn open_stream(
        &self,
        request: &ApiRequest,
        auth: Option<&AuthHeader>,
    ) -> Result<ByteStream, ApiError>;
}

#[derive(Debug, Clone)]
pub struct TransportSettings {
    pub base_url: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    base_url: String,
    client: reqwest::Client,
    /// Same as `client` without the overall deadline, for SSE bodies.
    stream_client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(settings: TransportSettings) -> Result<Self, ApiError> {
        Url::parse(&settings.base_url)
            .map_err(|err| ApiError::new(FailureKind::InvalidUrl, err.to_string()))?;
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| ApiError::new(FailureKind::Network, err.to_string()))?;
        let stream_client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .build()
            .map_err(|err| ApiError::new(FailureKind::Network, err.to_string()))?;
        Ok(Self {
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            client,
            stream_client,
        })
    }

    fn url_for(&self, request: &ApiRequest) -> Result<Url, ApiError> {
        let mut url = Url::parse(&format!("{}{}", self.base_url, request.path))
            .map_err(|err| ApiError::new(FailureKind::InvalidUrl, err.to_string()))?;
        if !request.query.is_empty() {
            url.query_pairs_mut().extend_pairs(request.query.iter());
        }
        Ok(url)
    }

    fn build(
        &self,
        client: &reqwest::Client,
        request: &ApiRequest,
        auth: Option<&AuthHeader>,
    ) -> Result<reqwest::RequestBuilder, ApiError> {
        let url = self.url_for(request)?;
        let mut builder = client.request(request.method.as_reqwest(), url);
        match auth {
            Some(AuthHeader::Bearer(token)) => {
                builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
            }
            Some(AuthHeader::ApiKey(key)) => {
                builder = builder.header("X-API-Key", key.as_str());
            }
            None => {}
        }
        if let Some(body) = &request.body {
            let encoded = serde_json::to_vec(body)
                .map_err(|err| ApiError::new(FailureKind::Validation, err.to_string()))?;
            builder = builder
                .header(CONTENT_TYPE, "application/json")
                .body(encoded);
        }
        Ok(builder)
    }
}

#[async_trait::async_trait]
impl Transport for ReqwestTransport {
    async fn send(
        &self,
        request: &ApiRequest,
        auth: Option<&AuthHeader>,
    ) -> Result<ApiResponse, ApiError> {
        let response = self
            .build(&self.client, request, auth)?
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(map_reqwest_error)?;
        Ok(ApiResponse { status, body })
    }

    async fn open_stream(
        &self,
        request: &ApiRequest,
        auth: Option<&AuthHeader>,
    ) -> Result<ByteStream, ApiError> {
        let response = self
            .build(&self.stream_client, request, auth)?
            .header(ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.bytes().await.unwrap_or_default();
            let response = ApiResponse::new(status.as_u16(), body);
            let kind = if status.as_u16() == 401 {
                FailureKind::AuthInvalid
            } else {
                FailureKind::HttpStatus(status.as_u16())
            };
            return Err(ApiError::new(kind, response.error_message()));
        }
        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map_err(map_reqwest_error))
            .boxed())
    }
}

fn map_reqwest_error(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        return ApiError::new(FailureKind::Timeout, err.to_string());
    }
    if err.is_builder() {
        return ApiError::new(FailureKind::InvalidUrl, err.to_string());
    }
    ApiError::new(FailureKind::Network, err.to_string())
}
