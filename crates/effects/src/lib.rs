use std::{
    panic::AssertUnwindSafe,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use anyhow::{anyhow, Context};
use futures::{future::join_all, FutureExt};
use serde::Serialize;
use slice_core::{DeferredRegistry, DeferredTask, DispatchContext};
use slice_protocol::{Action, Payload};
use tokio::{
    runtime::Handle,
    sync::{broadcast, Notify},
    task::JoinHandle,
};
use tokio_stream::{
    wrappers::{errors::BroadcastStreamRecvError, BroadcastStream},
    StreamExt,
};
use tracing::{debug, error, info, warn};

const DEFAULT_EFFECT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum EffectEvent {
    Started { tag: String },
    Completed { tag: String, dispatched: usize },
    Failed { tag: String, reason: String },
    Unregistered { tag: String },
}

#[derive(Debug, Clone)]
pub struct EffectRunnerConfig {
    pub timeout: Duration,
    pub event_capacity: usize,
}

impl Default for EffectRunnerConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_EFFECT_TIMEOUT,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

#[derive(Clone)]
pub struct EffectRunner {
    registry: DeferredRegistry,
    context: DispatchContext,
    runtime: Handle,
    timeout: Duration,
    events: broadcast::Sender<EffectEvent>,
    pending: Arc<AtomicUsize>,
    idle: Arc<Notify>,
}

impl EffectRunner {
    /// Must be called from within a tokio runtime; spawned operations run on it.
    pub fn new(registry: DeferredRegistry, context: DispatchContext) -> anyhow::Result<Self> {
        Self::with_config(registry, context, EffectRunnerConfig::default())
    }

    pub fn with_config(
        registry: DeferredRegistry,
        context: DispatchContext,
        config: EffectRunnerConfig,
    ) -> anyhow::Result<Self> {
        let runtime = Handle::try_current().context("effect runner requires a tokio runtime")?;
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Ok(Self {
            registry,
            context,
            runtime,
            timeout: config.timeout,
            events,
            pending: Arc::new(AtomicUsize::new(0)),
            idle: Arc::new(Notify::new()),
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<EffectEvent> {
        self.events.subscribe()
    }

    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    pub fn observe(&self, action: &Action) -> Option<JoinHandle<()>> {
        if !action.is_deferred() {
            return None;
        }

        let Some(task) = self.registry.lookup(action.tag()) else {
            debug!(tag = action.tag(), "no deferred operation registered for tag");
            let _ = self.events.send(EffectEvent::Unregistered {
                tag: action.tag().to_string(),
            });
            return None;
        };

        let guard = PendingGuard::acquire(self);
        let tag = action.tag().to_string();
        let _ = self.events.send(EffectEvent::Started { tag: tag.clone() });

        let runner = self.clone();
        let payload = action.payload().clone();
        Some(self.runtime.spawn(async move {
            let outcome = AssertUnwindSafe(runner.execute(&task, payload))
                .catch_unwind()
                .await;
            let event = match outcome {
                Ok(Ok(dispatched)) => {
                    debug!(tag = %tag, dispatched, "deferred operation completed");
                    EffectEvent::Completed { tag, dispatched }
                }
                Ok(Err(err)) => {
                    warn!(tag = %tag, error = %format!("{err:#}"), "deferred operation failed");
                    EffectEvent::Failed {
                        tag,
                        reason: format!("{err:#}"),
                    }
                }
                Err(_) => {
                    error!(tag = %tag, "deferred operation panicked");
                    EffectEvent::Failed {
                        tag,
                        reason: "panicked".to_string(),
                    }
                }
            };
            let _ = runner.events.send(event);
            drop(guard);
        }))
    }

    async fn execute(&self, task: &DeferredTask, payload: Payload) -> anyhow::Result<usize> {
        let actions = tokio::time::timeout(self.timeout, task.run(payload))
            .await
            .map_err(|_| anyhow!("timed out after {:?}", self.timeout))??;

        let mut dispatched = 0;
        for action in actions {
            let tag = action.tag().to_string();
            self.context
                .dispatch(action)
                .with_context(|| format!("failed to dispatch follow-up '{tag}'"))?;
            dispatched += 1;
        }
        Ok(dispatched)
    }

    /// Resolves once no spawned operation is outstanding, including follow-ups they triggered.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            if self.pending() == 0 {
                return;
            }
            notified.await;
        }
    }

    pub async fn run(self, actions: broadcast::Receiver<Action>) {
        info!("effect runner started");
        let mut stream = BroadcastStream::new(actions);
        let mut handles = Vec::new();
        while let Some(next) = stream.next().await {
            match next {
                Ok(action) => {
                    if let Some(handle) = self.observe(&action) {
                        handles.push(handle);
                    }
                }
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    warn!(skipped, "effect runner lagged behind the action feed");
                }
            }
            handles.retain(|handle| !handle.is_finished());
        }
        join_all(handles).await;
        info!("effect runner stopped");
    }
}

// Releases one pending slot on drop, also when the task panics or is aborted.
struct PendingGuard {
    pending: Arc<AtomicUsize>,
    idle: Arc<Notify>,
}

impl PendingGuard {
    fn acquire(runner: &EffectRunner) -> Self {
        runner.pending.fetch_add(1, Ordering::AcqRel);
        Self {
            pending: Arc::clone(&runner.pending),
            idle: Arc::clone(&runner.idle),
        }
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        if self.pending.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.idle.notify_waiters();
        }
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
