use std::{fmt, future::Future, sync::Arc};

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use slice_protocol::{Action, Payload, Tag};

pub type TransitionFn<S> = Arc<dyn Fn(&S, &Payload) -> S + Send + Sync>;

pub trait Handler: Send + Sync + 'static {
    type State: Clone + Send + Sync + Serialize + DeserializeOwned + 'static;

    fn identity(&self) -> String {
        type_identity::<Self>().to_string()
    }

    fn default_state(&self) -> Self::State;

    fn operations(&self) -> OperationSet<Self::State>;
}

pub fn type_identity<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    PureTransition,
    DeferredOperation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectContext {
    namespace: Arc<str>,
}

impl EffectContext {
    pub fn new(namespace: impl Into<Arc<str>>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn action(&self, operation: &str, payload: Payload) -> Action {
        Action::from_tag(&Tag::direct(&*self.namespace, operation), payload)
    }

    pub fn typed_action<P: Serialize>(&self, operation: &str, payload: P) -> anyhow::Result<Action> {
        let payload = serde_json::to_value(payload)?;
        Ok(self.action(operation, payload))
    }
}

#[async_trait]
pub trait DeferredOperation: Send + Sync {
    async fn run(&self, ctx: EffectContext, payload: Payload) -> anyhow::Result<Vec<Action>>;
}

#[async_trait]
impl<F, Fut> DeferredOperation for F
where
    F: Fn(EffectContext, Payload) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Vec<Action>>> + Send + 'static,
{
    async fn run(&self, ctx: EffectContext, payload: Payload) -> anyhow::Result<Vec<Action>> {
        (self)(ctx, payload).await
    }
}

pub enum Operation<S> {
    Transition(TransitionFn<S>),
    /// The payload becomes the new state verbatim.
    ReplaceState,
    Constant(S),
    Deferred(Arc<dyn DeferredOperation>),
}

impl<S> Operation<S> {
    pub fn transition<F>(f: F) -> Self
    where
        F: Fn(&S, &Payload) -> S + Send + Sync + 'static,
    {
        Self::Transition(Arc::new(f))
    }

    /// Transition over a typed payload. Payloads that do not decode leave state untouched.
    pub fn typed_transition<P, F>(f: F) -> Self
    where
        S: Clone + 'static,
        P: DeserializeOwned + 'static,
        F: Fn(&S, P) -> S + Send + Sync + 'static,
    {
        Self::Transition(Arc::new(move |state: &S, payload: &Payload| {
            match P::deserialize(payload) {
                Ok(decoded) => f(state, decoded),
                Err(err) => {
                    tracing::warn!(error = %err, "payload does not match transition input; state unchanged");
                    state.clone()
                }
            }
        }))
    }

    pub fn deferred<D>(operation: D) -> Self
    where
        D: DeferredOperation + 'static,
    {
        Self::Deferred(Arc::new(operation))
    }

    pub fn kind(&self) -> OperationKind {
        match self {
            Self::Deferred(_) => OperationKind::DeferredOperation,
            Self::Transition(_) | Self::ReplaceState | Self::Constant(_) => {
                OperationKind::PureTransition
            }
        }
    }
}

impl<S> Clone for Operation<S>
where
    S: Clone,
{
    fn clone(&self) -> Self {
        match self {
            Self::Transition(f) => Self::Transition(Arc::clone(f)),
            Self::ReplaceState => Self::ReplaceState,
            Self::Constant(value) => Self::Constant(value.clone()),
            Self::Deferred(op) => Self::Deferred(Arc::clone(op)),
        }
    }
}

impl<S> fmt::Debug for Operation<S>
where
    S: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transition(_) => f.write_str("Transition(..)"),
            Self::ReplaceState => f.write_str("ReplaceState"),
            Self::Constant(value) => f.debug_tuple("Constant").field(value).finish(),
            Self::Deferred(_) => f.write_str("Deferred(..)"),
        }
    }
}

pub struct OperationSet<S> {
    entries: Vec<(String, Option<Operation<S>>)>,
}

impl<S> Default for OperationSet<S> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<S> OperationSet<S> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, operation: Operation<S>) -> Self {
        self.insert(name, operation);
        self
    }

    pub fn transition<F>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&S, &Payload) -> S + Send + Sync + 'static,
    {
        self.with(name, Operation::transition(f))
    }

    pub fn replace_state(self, name: impl Into<String>) -> Self {
        self.with(name, Operation::ReplaceState)
    }

    pub fn constant(self, name: impl Into<String>, value: S) -> Self {
        self.with(name, Operation::Constant(value))
    }

    pub fn deferred<D>(self, name: impl Into<String>, operation: D) -> Self
    where
        D: DeferredOperation + 'static,
    {
        self.with(name, Operation::deferred(operation))
    }

    pub fn declare(mut self, name: impl Into<String>) -> Self {
        self.entries.push((name.into(), None));
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, operation: Operation<S>) {
        self.entries.push((name.into(), Some(operation)));
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn into_entries(self) -> Vec<(String, Option<Operation<S>>)> {
        self.entries
    }
}
