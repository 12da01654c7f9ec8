use slice_protocol::ProtocolError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("no sink registered; cannot dispatch '{tag}'")]
    SinkNotRegistered { tag: String },
    #[error("'{operation}' is not an operation of {namespace}")]
    UnknownOperation {
        namespace: String,
        operation: String,
    },
    #[error("failed to encode payload for {operation}: {source}")]
    PayloadEncoding {
        operation: String,
        source: serde_json::Error,
    },
    #[error("sink rejected '{tag}': {reason}")]
    Rejected { tag: String, reason: String },
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl DispatchError {
    pub fn rejected(tag: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Rejected {
            tag: tag.into(),
            reason: reason.into(),
        }
    }

    /// Bootstrap-ordering bugs rather than per-message failures.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::SinkNotRegistered { .. })
    }
}
