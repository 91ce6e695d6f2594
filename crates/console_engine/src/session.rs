use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use console_core::{
    update, Effect, ListQuery, ListSnapshot, Msg, PagingMode, TaskListState, TaskListView,
    TaskStatus, TaskType, DEFAULT_PAGE_SIZE,
};
use console_logging::{console_debug, console_info};

use crate::api::ConsoleApi;
use crate::events::EventSink;
use crate::poller::{PollControl, Poller};
use crate::{ApiError, EngineEvent};

/// Which backend list a session shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListSource {
    /// `/v1/admin/tasks`, paged by the server.
    AdminTasks,
    /// `/v1/video/tasks`, fetched whole and paged locally.
    VideoTasks,
}

impl ListSource {
    fn paging_mode(self) -> PagingMode {
        match self {
            ListSource::AdminTasks => PagingMode::Server,
            ListSource::VideoTasks => PagingMode::Client,
        }
    }

    fn label(self) -> &'static str {
        match self {
            ListSource::AdminTasks => "admin task list",
            ListSource::VideoTasks => "video task list",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewConfig {
    pub source: ListSource,
    pub page_size: u32,
    pub poll_interval: Duration,
    /// Page shown on mount, clamped once the total is known.
    pub start_page: u32,
    pub status: Option<TaskStatus>,
    pub task_type: Option<TaskType>,
}

impl ViewConfig {
    pub fn admin_tasks() -> Self {
        Self {
            source: ListSource::AdminTasks,
            page_size: DEFAULT_PAGE_SIZE,
            poll_interval: Duration::from_secs(5),
            start_page: 1,
            status: None,
            task_type: None,
        }
    }

    pub fn video_tasks() -> Self {
        Self {
            source: ListSource::VideoTasks,
            page_size: DEFAULT_PAGE_SIZE,
            poll_interval: Duration::from_secs(2),
            start_page: 1,
            status: None,
            task_type: None,
        }
    }

    fn initial_query(&self) -> ListQuery {
        ListQuery {
            page: self.start_page,
            size: self.page_size,
            status: self.status.clone(),
            task_type: self.task_type,
            ..ListQuery::default()
        }
    }
}

/// One mounted task list: its state, the effects it asks for and the poller
/// that keeps it fresh while work is active.
///
/// Dropping the session stops its poller.
pub struct ListSession {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    api: ConsoleApi,
    config: ViewConfig,
    state: Mutex<TaskListState>,
    poller: Mutex<Poller>,
    sink: Arc<dyn EventSink>,
}

impl ListSession {
    pub fn create(api: ConsoleApi, config: ViewConfig, sink: Arc<dyn EventSink>) -> Self {
        let state = TaskListState::with_query(config.source.paging_mode(), config.initial_query());
        let poller = Poller::new(config.source.label());
        Self {
            inner: Arc::new(SessionInner {
                api,
                config,
                state: Mutex::new(state),
                poller: Mutex::new(poller),
                sink,
            }),
        }
    }

    pub async fn refresh(&self) {
        self.dispatch(Msg::RefreshRequested).await;
    }

    /// Applies a message and runs the effects it produces, including the
    /// follow-up messages those effects report back.
    pub async fn dispatch(&self, msg: Msg) {
        self.inner.process(msg).await;
    }

    pub fn view(&self) -> TaskListView {
        self.inner.lock_state().view()
    }

    pub fn query(&self) -> ListQuery {
        self.inner.lock_state().query().clone()
    }

    pub fn is_polling(&self) -> bool {
        self.inner.lock_poller().is_active()
    }

    /// Resolves when the list poller has stopped (immediately if idle).
    pub async fn polling_finished(&self) {
        let finished = self.inner.lock_poller().finished();
        finished.await;
    }

    /// Tears the view down. Late responses are dropped from here on.
    pub fn dispose(&self) {
        self.inner.apply(Msg::Disposed);
        self.inner.lock_poller().stop();
    }
}

impl Drop for ListSession {
    fn drop(&mut self) {
        self.inner.lock_poller().stop();
    }
}

impl SessionInner {
    fn lock_state(&self) -> MutexGuard<'_, TaskListState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_poller(&self) -> MutexGuard<'_, Poller> {
        self.poller.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn process(self: &Arc<Self>, msg: Msg) {
        let mut queue = VecDeque::from([msg]);
        while let Some(msg) = queue.pop_front() {
            for effect in self.apply(msg) {
                if let Some(next) = self.execute(effect).await {
                    queue.push_back(next);
                }
            }
        }
    }

    /// Runs the state machine under the lock; never held across an await.
    fn apply(&self, msg: Msg) -> Vec<Effect> {
        let (effects, view) = {
            let mut guard = self.lock_state();
            let state = std::mem::take(&mut *guard);
            let (mut state, effects) = update(state, msg);
            let view = state.consume_dirty().then(|| state.view());
            *guard = state;
            (effects, view)
        };
        if let Some(view) = view {
            self.sink.emit(EngineEvent::ListRefreshed(view));
        }
        effects
    }

    async fn execute(self: &Arc<Self>, effect: Effect) -> Option<Msg> {
        match effect {
            Effect::FetchPage(query) => Some(match self.fetch(&query).await {
                Ok(snapshot) => Msg::PageLoaded { query, snapshot },
                Err(err) => failure_msg(err, Msg::LoadFailed),
            }),
            Effect::BatchDelete { task_ids } => {
                let result = match self.config.source {
                    ListSource::AdminTasks => self.api.batch_delete(&task_ids).await,
                    ListSource::VideoTasks => self.api.delete_video_tasks(&task_ids).await,
                };
                Some(match result {
                    Ok(ack) => Msg::BatchDeleted {
                        message: ack.text_or(&format!("Deleted {} task(s)", task_ids.len())),
                        task_ids,
                    },
                    Err(err) => failure_msg(err, |message| {
                        Msg::ActionFailed(format!("Delete failed: {message}"))
                    }),
                })
            }
            Effect::ClearTasks { task_type, status } => {
                let result = match (self.config.source, &status) {
                    (ListSource::AdminTasks, _) => {
                        self.api.clear_tasks(task_type, status.as_ref()).await
                    }
                    (ListSource::VideoTasks, Some(status)) => {
                        self.api.delete_video_tasks_by_status(status).await
                    }
                    (ListSource::VideoTasks, None) => self.api.clear_video_tasks().await,
                };
                Some(match result {
                    Ok(ack) => Msg::TasksCleared {
                        message: ack.text_or("Tasks cleared"),
                    },
                    Err(err) => failure_msg(err, |message| {
                        Msg::ActionFailed(format!("Clear failed: {message}"))
                    }),
                })
            }
            Effect::StartPolling => {
                self.start_polling();
                None
            }
            Effect::StopPolling => {
                self.lock_poller().stop();
                None
            }
            Effect::Notify { level, message } => {
                self.sink.emit(EngineEvent::Notice { level, message });
                None
            }
        }
    }

    async fn fetch(&self, query: &ListQuery) -> Result<ListSnapshot, ApiError> {
        match self.config.source {
            ListSource::AdminTasks => self
                .api
                .list_tasks(query)
                .await
                .map(ListSnapshot::from_page),
            ListSource::VideoTasks => self
                .api
                .list_video_tasks(query.status.as_ref())
                .await
                .map(ListSnapshot::full),
        }
    }

    fn start_polling(self: &Arc<Self>) {
        let weak: Weak<SessionInner> = Arc::downgrade(self);
        console_info!(
            "Polling {} every {:?}",
            self.config.source.label(),
            self.config.poll_interval
        );
        self.lock_poller()
            .start(self.config.poll_interval, move || {
                let weak = weak.clone();
                async move {
                    match weak.upgrade() {
                        Some(inner) => inner.poll_tick().await,
                        None => Ok(PollControl::Stop),
                    }
                }
            });
    }

    /// Re-fetches the current query. Fetch errors are returned to the poller,
    /// which logs them and keeps going; a rejected credential ends polling.
    async fn poll_tick(self: &Arc<Self>) -> Result<PollControl, ApiError> {
        let query = self.lock_state().query().clone();
        match self.fetch(&query).await {
            Ok(snapshot) => self.process(Msg::PageLoaded { query, snapshot }).await,
            Err(err) if err.is_auth_invalid() => {
                self.process(Msg::AuthInvalid).await;
                return Ok(PollControl::Stop);
            }
            Err(err) => return Err(err),
        }
        let still_polling = self.lock_state().is_polling();
        if still_polling {
            Ok(PollControl::Continue)
        } else {
            console_debug!("{} settled, no active work", self.config.source.label());
            Ok(PollControl::Stop)
        }
    }
}

fn failure_msg(err: ApiError, otherwise: impl FnOnce(String) -> Msg) -> Msg {
    if err.is_auth_invalid() {
        Msg::AuthInvalid
    } else {
        otherwise(err.message)
    }
}
