use std::fmt;

use console_core::{NoticeLevel, Task, TaskId, TaskListView};

/// Which stored credential a request authenticates with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CredentialScope {
    /// Admin key for `/v1/admin/*` and the cache endpoints.
    Admin,
    /// API token for the generation endpoints.
    TaskToken,
}

impl fmt::Display for CredentialScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialScope::Admin => write!(f, "admin key"),
            CredentialScope::TaskToken => write!(f, "task token"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// A watched task reported a new snapshot.
    TaskUpdated(Task),
    /// A watched task reached a terminal status; its poller has stopped.
    TaskFinished(Task),
    /// A list session re-rendered.
    ListRefreshed(TaskListView),
    /// The backend rejected a credential and it was cleared.
    AuthInvalid { scope: CredentialScope },
    Notice { level: NoticeLevel, message: String },
}

impl EngineEvent {
    pub fn task_id(&self) -> Option<&TaskId> {
        match self {
            EngineEvent::TaskUpdated(task) | EngineEvent::TaskFinished(task) => Some(&task.id),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct ApiError {
    pub kind: FailureKind,
    pub message: String,
}

impl ApiError {
    pub(crate) fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Connection-level failures that the retry budget covers.
    pub fn is_transient(&self) -> bool {
        matches!(self.kind, FailureKind::Network | FailureKind::Timeout)
    }

    pub fn is_auth_invalid(&self) -> bool {
        self.kind == FailureKind::AuthInvalid
    }
}

impl From<console_core::ValidationError> for ApiError {
    fn from(err: console_core::ValidationError) -> Self {
        ApiError::new(FailureKind::Validation, err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    AuthInvalid,
    HttpStatus(u16),
    Network,
    Timeout,
    InvalidUrl,
    Decode,
    Validation,
    Unsupported,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::AuthInvalid => write!(f, "credential rejected"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Network => write!(f, "network error"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::Decode => write!(f, "malformed response"),
            FailureKind::Validation => write!(f, "invalid request"),
            FailureKind::Unsupported => write!(f, "unsupported"),
        }
    }
}
