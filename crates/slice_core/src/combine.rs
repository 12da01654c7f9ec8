use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use slice_protocol::Action;
use tracing::warn;

use crate::reducer::Reducer;

trait SliceReducer: Send + Sync {
    fn identity(&self) -> &str;
    fn handles(&self, tag: &str) -> bool;
    fn initial_value(&self) -> Value;
    fn reduce_value(&self, state: &Value, action: &Action) -> Value;
}

impl<S> SliceReducer for Reducer<S>
where
    S: Clone + Send + Sync + Serialize + DeserializeOwned,
{
    fn identity(&self) -> &str {
        Reducer::identity(self)
    }

    fn handles(&self, tag: &str) -> bool {
        Reducer::handles(self, tag)
    }

    fn initial_value(&self) -> Value {
        serde_json::to_value(self.initial_state()).unwrap_or_else(|err| {
            warn!(identity = Reducer::identity(self), error = %err, "default state is not representable as JSON");
            Value::Null
        })
    }

    fn reduce_value(&self, state: &Value, action: &Action) -> Value {
        let current = match S::deserialize(state) {
            Ok(current) => current,
            Err(err) => {
                warn!(identity = Reducer::identity(self), error = %err, "stored slice does not decode; keeping it");
                return state.clone();
            }
        };
        let next = self.reduce(Some(current), action);
        serde_json::to_value(next).unwrap_or_else(|err| {
            warn!(identity = Reducer::identity(self), error = %err, "next state is not representable as JSON; keeping previous");
            state.clone()
        })
    }
}

#[derive(Default)]
pub struct CombinedReducer {
    slices: Vec<Box<dyn SliceReducer>>,
}

impl CombinedReducer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<S>(mut self, reducer: Reducer<S>) -> Self
    where
        S: Clone + Send + Sync + Serialize + DeserializeOwned + 'static,
    {
        self.push(reducer);
        self
    }

    /// A second reducer with an identity already present is ignored.
    pub fn push<S>(&mut self, reducer: Reducer<S>)
    where
        S: Clone + Send + Sync + Serialize + DeserializeOwned + 'static,
    {
        if self
            .slices
            .iter()
            .any(|slice| slice.identity() == reducer.identity())
        {
            warn!(identity = reducer.identity(), "reducer already combined; ignoring duplicate");
            return;
        }
        self.slices.push(Box::new(reducer));
    }

    pub fn identities(&self) -> impl Iterator<Item = &str> {
        self.slices.iter().map(|slice| slice.identity())
    }

    pub fn initial_state(&self) -> Value {
        let map: Map<String, Value> = self
            .slices
            .iter()
            .map(|slice| (slice.identity().to_string(), slice.initial_value()))
            .collect();
        Value::Object(map)
    }

    pub fn reduce(&self, state: Option<Value>, action: &Action) -> Value {
        let mut map = match state {
            Some(Value::Object(map)) => map,
            None | Some(Value::Null) => Map::new(),
            Some(other) => {
                warn!(tag = action.tag(), "combined state is not an object; keeping it");
                return other;
            }
        };

        for slice in &self.slices {
            let key = slice.identity();
            if !map.contains_key(key) {
                map.insert(key.to_string(), slice.initial_value());
            }
            if !slice.handles(action.tag()) {
                continue;
            }
            if let Some(current) = map.get(key) {
                let next = slice.reduce_value(current, action);
                map.insert(key.to_string(), next);
            }
        }

        Value::Object(map)
    }
}
