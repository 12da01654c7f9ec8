use std::{collections::HashMap, fmt, sync::Arc};

use serde::de::DeserializeOwned;
use slice_protocol::{is_deferred_tag, Action};
use tracing::{trace, warn};

use crate::{classify::Classification, handler::TransitionFn};

pub enum TransitionEntry<S> {
    Apply(TransitionFn<S>),
    ReplaceState,
    Constant(S),
}

impl<S: Clone> Clone for TransitionEntry<S> {
    fn clone(&self) -> Self {
        match self {
            Self::Apply(f) => Self::Apply(Arc::clone(f)),
            Self::ReplaceState => Self::ReplaceState,
            Self::Constant(value) => Self::Constant(value.clone()),
        }
    }
}

impl<S: fmt::Debug> fmt::Debug for TransitionEntry<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Apply(_) => f.write_str("Apply(..)"),
            Self::ReplaceState => f.write_str("ReplaceState"),
            Self::Constant(value) => f.debug_tuple("Constant").field(value).finish(),
        }
    }
}

pub struct Reducer<S> {
    identity: Arc<str>,
    default_state: S,
    table: Arc<HashMap<String, TransitionEntry<S>>>,
}

impl<S: Clone> Clone for Reducer<S> {
    fn clone(&self) -> Self {
        Self {
            identity: Arc::clone(&self.identity),
            default_state: self.default_state.clone(),
            table: Arc::clone(&self.table),
        }
    }
}

impl<S> Reducer<S>
where
    S: Clone + DeserializeOwned,
{
    pub fn from_classification(classification: &Classification<S>) -> Self {
        Self {
            identity: classification.shared_identity(),
            default_state: classification.default_state().clone(),
            table: Arc::new(classification.transitions().clone()),
        }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn initial_state(&self) -> S {
        self.default_state.clone()
    }

    pub fn handles(&self, tag: &str) -> bool {
        !is_deferred_tag(tag) && self.table.contains_key(tag)
    }

    /// `None` starts from the default state. Never fails: unknown and deferred tags leave state as is.
    pub fn reduce(&self, state: Option<S>, action: &Action) -> S {
        let state = state.unwrap_or_else(|| self.initial_state());

        if action.is_deferred() {
            return state;
        }

        let Some(entry) = self.table.get(action.tag()) else {
            trace!(identity = %self.identity, tag = action.tag(), "tag not handled here");
            return state;
        };

        match entry {
            TransitionEntry::ReplaceState => match S::deserialize(action.payload()) {
                Ok(replacement) => replacement,
                Err(err) => {
                    warn!(
                        identity = %self.identity,
                        tag = action.tag(),
                        error = %err,
                        "replacement payload does not fit the state type; state unchanged"
                    );
                    state
                }
            },
            TransitionEntry::Apply(f) => f(&state, action.payload()),
            TransitionEntry::Constant(value) => value.clone(),
        }
    }

    pub fn into_fn(self) -> impl Fn(Option<S>, &Action) -> S {
        move |state, action| self.reduce(state, action)
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    use super::*;
    use crate::{
        classify::classify,
        handler::{EffectContext, Handler, OperationSet},
        registry::DeferredRegistry,
    };
    use slice_protocol::{Payload, Tag};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Point {
        x: i64,
    }

    struct Shapes;

    impl Handler for Shapes {
        type State = Point;

        fn default_state(&self) -> Point {
            Point { x: 0 }
        }

        fn operations(&self) -> OperationSet<Point> {
            OperationSet::<Point>::new()
                .transition("shift", |p: &Point, by| Point {
                    x: p.x + by.as_i64().unwrap_or_default(),
                })
                .replace_state("reset")
                .constant("origin", Point { x: 0 })
                .deferred("load", |_ctx: EffectContext, _payload: Payload| async {
                    Ok::<Vec<Action>, anyhow::Error>(Vec::new())
                })
        }
    }

    fn reducer() -> Reducer<Point> {
        Reducer::from_classification(&classify(&Shapes, &DeferredRegistry::new()))
    }

    fn action(tag: &str, payload: Payload) -> Action {
        Action::new(tag, payload).expect("action")
    }

    #[test]
    fn missing_state_starts_from_default() {
        let next = reducer().reduce(None, &action("Shapes.shift", json!(2)));
        assert_eq!(next, Point { x: 2 });
    }

    #[test]
    fn replace_state_takes_the_payload_verbatim() {
        let next = reducer().reduce(Some(Point { x: 9 }), &action("Shapes.reset", json!({ "x": 1 })));
        assert_eq!(next, Point { x: 1 });
    }

    #[test]
    fn replace_state_with_ill_typed_payload_keeps_state() {
        let next = reducer().reduce(Some(Point { x: 9 }), &action("Shapes.reset", json!("nope")));
        assert_eq!(next, Point { x: 9 });
    }

    #[test]
    fn constant_entries_become_the_new_state() {
        let next = reducer().reduce(Some(Point { x: 9 }), &action("Shapes.origin", Payload::Null));
        assert_eq!(next, Point { x: 0 });
    }

    #[test]
    fn deferred_and_unknown_tags_are_no_ops() {
        let reducer = reducer();
        let state = Some(Point { x: 4 });
        let deferred = Action::from_tag(&Tag::deferred("Shapes", "shift"), json!(100));
        assert_eq!(reducer.reduce(state.clone(), &deferred), Point { x: 4 });
        assert_eq!(
            reducer.reduce(state.clone(), &action("Shapes.load", Payload::Null)),
            Point { x: 4 }
        );
        assert_eq!(
            reducer.reduce(state, &action("Other.shift", json!(1))),
            Point { x: 4 }
        );
    }

    #[test]
    fn into_fn_matches_reduce() {
        let transition = reducer().into_fn();
        assert_eq!(
            transition(Some(Point { x: 1 }), &action("Shapes.shift", json!(1))),
            Point { x: 2 }
        );
        assert!(reducer().handles("Shapes.shift"));
        assert!(!reducer().handles("Shapes.shift@deferred"));
        assert!(!reducer().handles("Shapes.load"));
    }
}
