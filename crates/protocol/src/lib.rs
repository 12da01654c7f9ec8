pub mod action;
pub mod error;
pub mod tag;

pub use action::{Action, Payload};
pub use error::ProtocolError;
pub use tag::{
    from_deferred_tag, is_deferred_tag, qualify, to_deferred_tag, Tag, TagKind, DEFERRED_SUFFIX,
    NAMESPACE_SEPARATOR,
};
