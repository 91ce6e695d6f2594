//! Console engine: HTTP transport, retries, polling and effect execution.
mod api;
mod credentials;
mod events;
mod poller;
mod retry;
mod session;
mod stream;
mod transport;
mod types;
mod watch;

pub use api::{ActionMessage, CacheItem, CachePage, CacheStats, ConsoleApi, OnlineCacheStats};
pub use credentials::{CredentialStore, MemoryCredentialStore};
pub use events::{ChannelEventSink, EventSink};
pub use poller::{PollControl, Poller};
pub use retry::{is_retryable_status, RetryClient, RetryPolicy, RETRYABLE_STATUSES};
pub use session::{ListSession, ListSource, ViewConfig};
pub use stream::{SseDecoder, SseEvent, StreamUpdate, TaskStream};
pub use transport::{
    ApiRequest, ApiResponse, Auth, AuthHeader, ByteStream, Method, ReqwestTransport, Transport,
    TransportSettings,
};
pub use types::{ApiError, CredentialScope, EngineEvent, FailureKind};
pub use watch::{submit_and_watch, watch_task};
