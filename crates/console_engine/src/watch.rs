use std::sync::Arc;
use std::time::Duration;

use console_core::{GenerationRequest, TaskId, TaskType};
use console_logging::console_info;

use crate::api::ConsoleApi;
use crate::events::EventSink;
use crate::poller::{PollControl, Poller};
use crate::{ApiError, EngineEvent};

/// Polls one generation task until it reaches a terminal status.
///
/// Emits [`EngineEvent::TaskUpdated`] for every non-terminal snapshot and a
/// single [`EngineEvent::TaskFinished`] before stopping. A terminal status is
/// the only thing that ends the watch on its own: failed ticks (including a
/// 401, which does not clear the stored token here) are logged and skipped.
pub fn watch_task(
    api: ConsoleApi,
    kind: TaskType,
    task_id: TaskId,
    interval: Duration,
    sink: Arc<dyn EventSink>,
) -> Poller {
    let mut poller = Poller::new(format!("{kind} task {task_id}"));
    poller.start(interval, move || {
        let api = api.clone();
        let sink = sink.clone();
        let task_id = task_id.clone();
        async move {
            match api.generation_task(kind, &task_id).await {
                Ok(task) if task.status.is_terminal() => {
                    console_info!("Task {} finished as {}", task.id, task.status);
                    sink.emit(EngineEvent::TaskFinished(task));
                    Ok(PollControl::Stop)
                }
                Ok(task) => {
                    sink.emit(EngineEvent::TaskUpdated(task));
                    Ok(PollControl::Continue)
                }
                Err(err) => Err(err),
            }
        }
    });
    poller
}

/// Validates and submits `request`, then watches the new task.
pub async fn submit_and_watch(
    api: &ConsoleApi,
    request: &GenerationRequest,
    interval: Duration,
    sink: Arc<dyn EventSink>,
) -> Result<(TaskId, Poller), ApiError> {
    let task_id = api.submit_generation(request).await?;
    console_info!("Submitted {} task {}", request.task_type, task_id);
    let poller = watch_task(
        api.clone(),
        request.task_type,
        task_id.clone(),
        interval,
        sink,
    );
    Ok((task_id, poller))
}
