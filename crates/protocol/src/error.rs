use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("action tag must not be empty")]
    EmptyTag,
    #[error("tag '{tag}' has no namespace separator")]
    MissingNamespace { tag: String },
    #[error("tag '{tag}' has an empty {segment}")]
    EmptySegment { tag: String, segment: &'static str },
}

impl ProtocolError {
    pub fn tag(&self) -> Option<&str> {
        match self {
            Self::EmptyTag => None,
            Self::MissingNamespace { tag } | Self::EmptySegment { tag, .. } => Some(tag),
        }
    }
}
