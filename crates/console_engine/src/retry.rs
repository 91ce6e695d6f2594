use std::sync::Arc;
use std::time::Duration;

use console_logging::{console_debug, console_warn};

use crate::credentials::CredentialStore;
use crate::events::EventSink;
use crate::transport::{ApiRequest, ApiResponse, Auth, AuthHeader, ByteStream, Transport};
use crate::{ApiError, CredentialScope, EngineEvent, FailureKind};

/// Statuses worth another attempt: rate limiting and gateway/server hiccups.
pub const RETRYABLE_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first one.
    pub retries: u32,
    /// Clear the credential and fail on 401 instead of returning the response.
    pub invalidate_on_auth: bool,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 2,
            invalidate_on_auth: true,
            base_delay: Duration::from_millis(300),
            max_delay: Duration::from_millis(2000),
        }
    }
}

impl RetryPolicy {
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn without_auth_invalidation(mut self) -> Self {
        self.invalidate_on_auth = false;
        self
    }

    /// `min(max_delay, base_delay * 2^attempt)`, attempt counted from 0.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

pub fn is_retryable_status(status: u16) -> bool {
    RETRYABLE_STATUSES.contains(&status)
}

/// Sends requests with credential resolution, 401 invalidation and bounded
/// exponential backoff.
#[derive(Clone)]
pub struct RetryClient {
    transport: Arc<dyn Transport>,
    credentials: Arc<dyn CredentialStore>,
    events: Arc<dyn EventSink>,
}

impl RetryClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        credentials: Arc<dyn CredentialStore>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            transport,
            credentials,
            events,
        }
    }

    pub fn credentials(&self) -> &Arc<dyn CredentialStore> {
        &self.credentials
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub async fn request(
        &self,
        request: &ApiRequest,
        policy: &RetryPolicy,
    ) -> Result<ApiResponse, ApiError> {
        let auth = self.resolve_auth(&request.auth)?;
        let mut attempt = 0u32;
        loop {
            match self.transport.send(request, auth.as_ref()).await {
                Ok(response) if response.status == 401 => {
                    if !policy.invalidate_on_auth {
                        return Ok(response);
                    }
                    self.invalidate(&request.auth);
                    return Err(ApiError::new(
                        FailureKind::AuthInvalid,
                        response.error_message(),
                    ));
                }
                Ok(response) if is_retryable_status(response.status) && attempt < policy.retries => {
                    let delay = policy.delay_for(attempt);
                    console_warn!(
                        "{} returned {}, retry {}/{} in {:?}",
                        request.path,
                        response.status,
                        attempt + 1,
                        policy.retries,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Ok(response) => return Ok(response),
                Err(err) if err.is_transient() && attempt < policy.retries => {
                    let delay = policy.delay_for(attempt);
                    console_warn!(
                        "{} failed ({}), retry {}/{} in {:?}",
                        request.path,
                        err,
                        attempt + 1,
                        policy.retries,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Opens a streaming body. Streams are not retried; a 401 still clears
    /// the credential.
    pub async fn open_stream(&self, request: &ApiRequest) -> Result<ByteStream, ApiError> {
        let auth = self.resolve_auth(&request.auth)?;
        match self.transport.open_stream(request, auth.as_ref()).await {
            Err(err) if err.is_auth_invalid() => {
                self.invalidate(&request.auth);
                Err(err)
            }
            other => other,
        }
    }

    /// Resolves the header for a request. A missing stored credential fails
    /// before anything is sent.
    pub(crate) fn resolve_auth(&self, auth: &Auth) -> Result<Option<AuthHeader>, ApiError> {
        let secret = |scope: CredentialScope| {
            self.credentials.get(scope).ok_or_else(|| {
                ApiError::new(
                    FailureKind::Validation,
                    format!("no {scope} configured"),
                )
            })
        };
        Ok(match auth {
            Auth::None => None,
            Auth::Bearer(scope) => Some(AuthHeader::Bearer(secret(*scope)?)),
            Auth::ApiKey(scope) => Some(AuthHeader::ApiKey(secret(*scope)?)),
            Auth::Explicit(token) => Some(AuthHeader::Bearer(token.clone())),
        })
    }

    pub(crate) fn invalidate(&self, auth: &Auth) {
        let Some(scope) = auth.scope() else {
            console_debug!("401 for a request without a stored credential");
            return;
        };
        console_warn!("Backend rejected the {}; clearing it", scope);
        self.credentials.clear(scope);
        self.events.emit(EngineEvent::AuthInvalid { scope });
    }
}
