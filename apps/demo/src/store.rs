use std::sync::{Arc, Mutex, PoisonError};

use serde_json::Value;
use slice_core::{Action, CombinedReducer, DispatchError, Sink};
use slice_effects::EffectRunner;
use tokio::sync::broadcast;
use tracing::debug;

struct StoreInner {
    reducer: CombinedReducer,
    state: Mutex<Value>,
    actions: broadcast::Sender<Action>,
    effects: Option<EffectRunner>,
}

#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

impl Store {
    pub fn new(reducer: CombinedReducer, capacity: usize, effects: Option<EffectRunner>) -> Self {
        let (actions, _) = broadcast::channel(capacity.max(1));
        let state = reducer.initial_state();
        Self {
            inner: Arc::new(StoreInner {
                reducer,
                state: Mutex::new(state),
                actions,
                effects,
            }),
        }
    }

    pub fn state(&self) -> Value {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Action> {
        self.inner.actions.subscribe()
    }
}

impl Sink for Store {
    fn dispatch(&self, action: Action) -> Result<Action, DispatchError> {
        {
            let mut state = self
                .inner
                .state
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            let current = std::mem::take(&mut *state);
            *state = self.inner.reducer.reduce(Some(current), &action);
        }
        debug!(tag = action.tag(), "store reduced action");

        // Effects run after the lock is released; follow-ups re-enter dispatch.
        if let Some(effects) = &self.inner.effects {
            effects.observe(&action);
        }
        let _ = self.inner.actions.send(action.clone());
        Ok(action)
    }
}

#[cfg(test)]
#[path = "tests/store_tests.rs"]
mod tests;
