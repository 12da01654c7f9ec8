use std::{
    collections::BTreeMap,
    fmt,
    sync::{Arc, OnceLock, PoisonError, RwLock},
};

use slice_protocol::{Action, Payload, Tag};
use tracing::debug;

use crate::handler::{DeferredOperation, EffectContext};

#[derive(Clone)]
struct DeferredEntry {
    context: EffectContext,
    operations: BTreeMap<String, Arc<dyn DeferredOperation>>,
}

#[derive(Clone, Default)]
pub struct DeferredRegistry {
    handlers: Arc<RwLock<BTreeMap<String, DeferredEntry>>>,
}

#[derive(Clone)]
pub struct DeferredTask {
    tag: Tag,
    context: EffectContext,
    operation: Arc<dyn DeferredOperation>,
}

impl DeferredTask {
    pub fn tag(&self) -> &Tag {
        &self.tag
    }

    pub fn context(&self) -> &EffectContext {
        &self.context
    }

    pub async fn run(&self, payload: Payload) -> anyhow::Result<Vec<Action>> {
        self.operation.run(self.context.clone(), payload).await
    }
}

impl fmt::Debug for DeferredTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredTask")
            .field("tag", &self.tag)
            .finish_non_exhaustive()
    }
}

impl DeferredRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a handler, or appends operations it did not have yet. Existing operations are kept.
    pub fn register<I>(&self, identity: &str, operations: I)
    where
        I: IntoIterator<Item = (String, Arc<dyn DeferredOperation>)>,
    {
        let mut handlers = self
            .handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let entry = handlers
            .entry(identity.to_string())
            .or_insert_with(|| DeferredEntry {
                context: EffectContext::new(identity),
                operations: BTreeMap::new(),
            });
        for (name, operation) in operations {
            if entry.operations.contains_key(&name) {
                continue;
            }
            debug!(identity, operation = %name, "registered deferred operation");
            entry.operations.insert(name, operation);
        }
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(identity)
    }

    pub fn identities(&self) -> Vec<String> {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    pub fn operations_of(&self, identity: &str) -> Vec<String> {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(identity)
            .map(|entry| entry.operations.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Resolves a deferred-marked tag. Direct tags and unknown operations resolve to `None`.
    pub fn lookup(&self, tag: &str) -> Option<DeferredTask> {
        let tag = Tag::parse(tag).ok()?;
        if !tag.is_deferred() {
            return None;
        }
        let handlers = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let entry = handlers.get(tag.namespace())?;
        let operation = Arc::clone(entry.operations.get(tag.operation())?);
        Some(DeferredTask {
            context: entry.context.clone(),
            tag,
            operation,
        })
    }

    pub fn len(&self) -> usize {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub fn global_registry() -> &'static DeferredRegistry {
    static REGISTRY: OnceLock<DeferredRegistry> = OnceLock::new();
    REGISTRY.get_or_init(DeferredRegistry::new)
}
