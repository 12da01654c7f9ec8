use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use slice_protocol::Action;
use tracing::{debug, error};

use crate::error::DispatchError;

pub trait Sink: Send + Sync {
    fn dispatch(&self, action: Action) -> Result<Action, DispatchError>;
}

impl<F> Sink for F
where
    F: Fn(Action) -> Result<Action, DispatchError> + Send + Sync,
{
    fn dispatch(&self, action: Action) -> Result<Action, DispatchError> {
        (self)(action)
    }
}

pub fn dispatch_via(sink: &dyn Sink, action: Action) -> Result<Action, DispatchError> {
    sink.dispatch(action)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkState {
    Uninitialized,
    Active,
}

#[derive(Clone, Default)]
pub struct DispatchContext {
    sink: Arc<RwLock<Option<Arc<dyn Sink>>>>,
}

impl DispatchContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sink(sink: impl Sink + 'static) -> Self {
        let ctx = Self::new();
        ctx.register(sink);
        ctx
    }

    pub fn register(&self, sink: impl Sink + 'static) {
        self.rebind(Arc::new(sink));
    }

    pub fn rebind(&self, sink: Arc<dyn Sink>) -> Option<Arc<dyn Sink>> {
        let previous = self
            .sink
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(sink);
        if previous.is_some() {
            debug!("replaced registered sink");
        } else {
            debug!("registered sink");
        }
        previous
    }

    pub fn shutdown(&self) -> Option<Arc<dyn Sink>> {
        let previous = self
            .sink
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        debug!(had_sink = previous.is_some(), "dispatch context shut down");
        previous
    }

    pub fn state(&self) -> SinkState {
        if self.current().is_some() {
            SinkState::Active
        } else {
            SinkState::Uninitialized
        }
    }

    fn current(&self) -> Option<Arc<dyn Sink>> {
        self.sink
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Delivers through the sink registered at call time; later rebinds do not affect this call.
    pub fn dispatch(&self, action: Action) -> Result<Action, DispatchError> {
        let Some(sink) = self.current() else {
            error!(tag = action.tag(), "dispatch attempted before a sink was registered");
            return Err(DispatchError::SinkNotRegistered {
                tag: action.tag().to_string(),
            });
        };
        dispatch_via(sink.as_ref(), action)
    }
}

pub fn global_context() -> &'static DispatchContext {
    static CONTEXT: OnceLock<DispatchContext> = OnceLock::new();
    CONTEXT.get_or_init(DispatchContext::new)
}

pub fn register_sink(sink: impl Sink + 'static) {
    global_context().register(sink);
}
