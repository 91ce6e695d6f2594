use std::future::Future;
use std::time::Duration;

use console_logging::{console_debug, console_warn};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::ApiError;

/// What a tick decided about the next one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollControl {
    Continue,
    Stop,
}

struct PollRun {
    stop: CancellationToken,
    done: CancellationToken,
}

/// A cancellable recurring fetch.
///
/// At most one timer runs per poller. Ticks are serialized: the next tick is
/// not scheduled until the previous one has finished, and missed ticks are
/// delayed rather than bursted. A failed tick is logged and skipped. The
/// timer stops when a tick returns [`PollControl::Stop`], when [`Poller::stop`]
/// is called, or when the poller is dropped. A tick already in flight when
/// the poller stops is allowed to finish.
pub struct Poller {
    label: String,
    run: Option<PollRun>,
}

impl Poller {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            run: None,
        }
    }

    /// Starts ticking every `interval`, the first tick one interval from now.
    /// A running timer is stopped first. Must be called inside a tokio runtime.
    pub fn start<F, Fut>(&mut self, interval: Duration, mut tick: F)
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<PollControl, ApiError>> + Send + 'static,
    {
        self.stop();

        let stop = CancellationToken::new();
        let done = CancellationToken::new();
        let label = self.label.clone();
        let run_stop = stop.clone();
        let run_done = done.clone();

        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = run_stop.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                match tick().await {
                    Ok(PollControl::Continue) => {}
                    Ok(PollControl::Stop) => {
                        console_debug!("{} poller stopping itself", label);
                        break;
                    }
                    Err(err) => console_warn!("{} poll tick failed: {}", label, err),
                }
                if run_stop.is_cancelled() {
                    break;
                }
            }
            run_stop.cancel();
            run_done.cancel();
        });

        console_debug!("{} poller started every {:?}", self.label, interval);
        self.run = Some(PollRun { stop, done });
    }

    /// Idempotent; a no-op when never started.
    pub fn stop(&mut self) {
        if let Some(run) = &self.run {
            if !run.stop.is_cancelled() {
                console_debug!("{} poller stopped", self.label);
                run.stop.cancel();
            }
        }
    }

    pub fn is_active(&self) -> bool {
        self.run
            .as_ref()
            .is_some_and(|run| !run.stop.is_cancelled() && !run.done.is_cancelled())
    }

    /// Resolves once the current timer has ended and its last tick returned.
    /// Resolves immediately when the poller was never started.
    pub fn finished(&self) -> impl Future<Output = ()> + Send + 'static {
        let done = self.run.as_ref().map(|run| run.done.clone());
        async move {
            if let Some(done) = done {
                done.cancelled().await;
            }
        }
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for Poller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Poller")
            .field("label", &self.label)
            .field("active", &self.is_active())
            .finish()
    }
}
