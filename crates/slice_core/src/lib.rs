pub mod classify;
pub mod combine;
pub mod error;
pub mod facade;
pub mod handler;
pub mod reducer;
pub mod registry;
pub mod sink;
mod slice;

pub use classify::{classify, derive_getter_name, Classification, GetterMap};
pub use combine::CombinedReducer;
pub use error::DispatchError;
pub use facade::Facade;
pub use handler::{
    type_identity, DeferredOperation, EffectContext, Handler, Operation, OperationKind,
    OperationSet, TransitionFn,
};
pub use reducer::{Reducer, TransitionEntry};
pub use registry::{global_registry, DeferredRegistry, DeferredTask};
pub use sink::{dispatch_via, global_context, register_sink, DispatchContext, Sink, SinkState};
pub use slice::{create_facade, create_transition, Slice};
pub use slice_protocol::{Action, Payload, Tag, TagKind};

#[doc(hidden)]
pub mod __private {
    pub use serde::Serialize;
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
