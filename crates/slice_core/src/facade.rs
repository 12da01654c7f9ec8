use std::{collections::BTreeSet, fmt, sync::Arc};

use serde::Serialize;
use slice_protocol::{Action, Payload, Tag, TagKind};
use tracing::{debug, trace};

use crate::{
    classify::{Classification, GetterMap},
    error::DispatchError,
    sink::DispatchContext,
};

#[derive(Clone)]
pub struct Facade {
    identity: Arc<str>,
    operations: Arc<BTreeSet<String>>,
    getters: Arc<GetterMap>,
    pure_by_default: bool,
    context: DispatchContext,
}

impl fmt::Debug for Facade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Facade")
            .field("identity", &self.identity)
            .field("operations", &self.operations)
            .field("pure_by_default", &self.pure_by_default)
            .finish_non_exhaustive()
    }
}

impl Facade {
    pub fn new<S>(
        classification: &Classification<S>,
        context: DispatchContext,
        pure_by_default: bool,
    ) -> Self {
        Self {
            identity: classification.shared_identity(),
            operations: Arc::new(classification.declared().clone()),
            getters: Arc::new(classification.getters().clone()),
            pure_by_default,
            context,
        }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn operations(&self) -> impl Iterator<Item = &str> {
        self.operations.iter().map(String::as_str)
    }

    pub fn has_operation(&self, operation: &str) -> bool {
        self.operations.contains(operation)
    }

    pub fn is_pure_by_default(&self) -> bool {
        self.pure_by_default
    }

    pub fn is_pure(&self, operation: &str) -> bool {
        self.pure_by_default || self.getters.contains_setter(operation)
    }

    pub fn tag_for(&self, operation: &str) -> Tag {
        let kind = if self.is_pure(operation) {
            TagKind::Direct
        } else {
            TagKind::Deferred
        };
        Tag::new(&*self.identity, operation, kind)
    }

    pub fn call<P: Serialize>(&self, operation: &str, payload: P) -> Result<Action, DispatchError> {
        let payload =
            serde_json::to_value(payload).map_err(|source| DispatchError::PayloadEncoding {
                operation: operation.to_string(),
                source,
            })?;
        self.call_value(operation, payload)
    }

    pub fn call_value(&self, operation: &str, payload: Payload) -> Result<Action, DispatchError> {
        if !self.has_operation(operation) {
            return Err(DispatchError::UnknownOperation {
                namespace: self.identity.to_string(),
                operation: operation.to_string(),
            });
        }

        let tag = self.tag_for(operation);
        debug!(tag = %tag, "dispatching facade call");
        self.context.dispatch(Action::from_tag(&tag, payload))
    }

    pub fn assign(&self, name: &str, _value: Payload) {
        trace!(identity = %self.identity, name, "ignored assignment to frozen facade");
    }
}

#[macro_export]
macro_rules! facade {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $($method:ident => $operation:literal),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone)]
        $vis struct $name($crate::Facade);

        impl $name {
            $vis fn new(facade: $crate::Facade) -> Self {
                Self(facade)
            }

            $vis fn facade(&self) -> &$crate::Facade {
                &self.0
            }

            $(
                $vis fn $method<P: $crate::__private::Serialize>(
                    &self,
                    payload: P,
                ) -> ::std::result::Result<$crate::Action, $crate::DispatchError> {
                    self.0.call($operation, payload)
                }
            )*
        }
    };
}
