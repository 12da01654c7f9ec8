use std::{
    collections::{btree_map::Entry, BTreeMap, BTreeSet, HashMap},
    sync::Arc,
};

use slice_protocol::{qualify, DEFERRED_SUFFIX, NAMESPACE_SEPARATOR};
use tracing::{debug, warn};

use crate::{
    handler::{DeferredOperation, Handler, Operation, OperationKind},
    reducer::TransitionEntry,
    registry::DeferredRegistry,
};

const SETTER_PREFIX: &str = "set";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetterMap {
    entries: BTreeMap<String, String>,
}

impl GetterMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` when the getter is already linked; the existing link is kept.
    pub fn record(&mut self, getter: impl Into<String>, setter: impl Into<String>) -> bool {
        match self.entries.entry(getter.into()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(setter.into());
                true
            }
        }
    }

    pub fn setter_for(&self, getter: &str) -> Option<&str> {
        self.entries.get(getter).map(String::as_str)
    }

    /// Scans setter names (the map's values), not getter names.
    pub fn contains_setter(&self, name: &str) -> bool {
        self.entries.values().any(|setter| setter == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(getter, setter)| (getter.as_str(), setter.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// `setCount` -> `count`, `set_count` -> `count`. Anything else has no getter.
pub fn derive_getter_name(name: &str) -> Option<String> {
    let rest = name.strip_prefix(SETTER_PREFIX)?;

    if let Some(snake) = rest.strip_prefix('_') {
        let first = snake.chars().next()?;
        return first.is_lowercase().then(|| snake.to_string());
    }

    let mut chars = rest.chars();
    let first = chars.next()?;
    if !first.is_uppercase() {
        return None;
    }
    let mut derived: String = first.to_lowercase().collect();
    derived.push_str(chars.as_str());
    Some(derived)
}

fn is_reserved(name: &str) -> bool {
    name.is_empty() || name.contains(NAMESPACE_SEPARATOR) || name.contains(DEFERRED_SUFFIX)
}

pub struct Classification<S> {
    identity: Arc<str>,
    default_state: S,
    transitions: HashMap<String, TransitionEntry<S>>,
    deferred: BTreeMap<String, Arc<dyn DeferredOperation>>,
    getters: GetterMap,
    declared: BTreeSet<String>,
    kinds: BTreeMap<String, OperationKind>,
}

impl<S> Classification<S> {
    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub(crate) fn shared_identity(&self) -> Arc<str> {
        Arc::clone(&self.identity)
    }

    pub fn default_state(&self) -> &S {
        &self.default_state
    }

    pub fn transitions(&self) -> &HashMap<String, TransitionEntry<S>> {
        &self.transitions
    }

    pub fn deferred_operations(&self) -> impl Iterator<Item = &str> {
        self.deferred.keys().map(String::as_str)
    }

    pub fn getters(&self) -> &GetterMap {
        &self.getters
    }

    pub fn declared(&self) -> &BTreeSet<String> {
        &self.declared
    }

    pub fn kind_of(&self, operation: &str) -> Option<OperationKind> {
        self.kinds.get(operation).copied()
    }
}

pub fn classify<H: Handler>(handler: &H, registry: &DeferredRegistry) -> Classification<H::State> {
    let identity: Arc<str> = handler.identity().into();
    if identity.is_empty() || identity.contains(NAMESPACE_SEPARATOR) {
        warn!(identity = %identity, "handler identity is not a single tag segment; its tags will not parse");
    }

    let mut declared = BTreeSet::new();
    let mut accepted = Vec::new();
    for (name, operation) in handler.operations().into_entries() {
        if is_reserved(&name) {
            warn!(identity = %identity, operation = %name, "operation name collides with reserved tag tokens; skipped");
            continue;
        }
        if !declared.insert(name.clone()) {
            warn!(identity = %identity, operation = %name, "duplicate operation declaration; keeping the first");
            continue;
        }
        accepted.push((name, operation));
    }

    let mut transitions = HashMap::new();
    let mut deferred = BTreeMap::new();
    let mut getters = GetterMap::new();
    let mut kinds = BTreeMap::new();

    for (name, operation) in accepted {
        let Some(operation) = operation else {
            debug!(identity = %identity, operation = %name, "operation has no implementation; skipped");
            continue;
        };

        kinds.insert(name.clone(), operation.kind());
        let entry = match operation {
            Operation::Deferred(op) => {
                deferred.insert(name.clone(), op);
                None
            }
            Operation::Transition(f) => Some(TransitionEntry::Apply(f)),
            Operation::ReplaceState => Some(TransitionEntry::ReplaceState),
            Operation::Constant(value) => Some(TransitionEntry::Constant(value)),
        };
        if let Some(entry) = entry {
            transitions.insert(qualify(&identity, &name), entry);
        }

        if let Some(getter) = derive_getter_name(&name) {
            if declared.contains(&getter) && getters.record(getter.clone(), name.clone()) {
                debug!(identity = %identity, getter = %getter, setter = %name, "linked getter to setter");
            }
        }
    }

    if !deferred.is_empty() {
        registry.register(
            &identity,
            deferred
                .iter()
                .map(|(name, op)| (name.clone(), Arc::clone(op))),
        );
    }

    debug!(
        identity = %identity,
        transitions = transitions.len(),
        deferred = deferred.len(),
        getters = getters.len(),
        "classified handler"
    );

    Classification {
        identity,
        default_state: handler.default_state(),
        transitions,
        deferred,
        getters,
        declared,
        kinds,
    }
}
