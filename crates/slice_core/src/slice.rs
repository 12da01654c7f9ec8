use std::sync::Arc;

use crate::{
    classify::{classify, Classification, GetterMap},
    facade::Facade,
    handler::{Handler, OperationKind},
    reducer::Reducer,
    registry::{global_registry, DeferredRegistry},
    sink::{global_context, DispatchContext},
};

pub struct Slice<H: Handler> {
    handler: Arc<H>,
    classification: Arc<Classification<H::State>>,
}

impl<H: Handler> Clone for Slice<H> {
    fn clone(&self) -> Self {
        Self {
            handler: Arc::clone(&self.handler),
            classification: Arc::clone(&self.classification),
        }
    }
}

impl<H: Handler> Slice<H> {
    pub fn new(handler: H, registry: &DeferredRegistry) -> Self {
        let classification = classify(&handler, registry);
        Self {
            handler: Arc::new(handler),
            classification: Arc::new(classification),
        }
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn identity(&self) -> &str {
        self.classification.identity()
    }

    pub fn classification(&self) -> &Classification<H::State> {
        &self.classification
    }

    pub fn getters(&self) -> &GetterMap {
        self.classification.getters()
    }

    pub fn kind_of(&self, operation: &str) -> Option<OperationKind> {
        self.classification.kind_of(operation)
    }

    pub fn reducer(&self) -> Reducer<H::State> {
        Reducer::from_classification(&self.classification)
    }

    pub fn facade(&self, context: DispatchContext, pure_by_default: bool) -> Facade {
        Facade::new(&self.classification, context, pure_by_default)
    }
}

pub fn create_transition<H: Handler>(handler: &H) -> Reducer<H::State> {
    Reducer::from_classification(&classify(handler, global_registry()))
}

pub fn create_facade<H: Handler>(handler: &H, pure_by_default: bool) -> Facade {
    let classification = classify(handler, global_registry());
    Facade::new(&classification, global_context().clone(), pure_by_default)
}
