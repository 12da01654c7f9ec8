use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

/// Appended to a qualified tag when the message must go through the deferred path.
pub const DEFERRED_SUFFIX: &str = "@deferred";

pub const NAMESPACE_SEPARATOR: char = '.';

pub fn to_deferred_tag(tag: &str) -> String {
    let mut deferred = String::with_capacity(tag.len() + DEFERRED_SUFFIX.len());
    deferred.push_str(tag);
    deferred.push_str(DEFERRED_SUFFIX);
    deferred
}

/// Strips the deferred marker. Tags without it are returned unchanged.
///
/// A direct tag whose operation name happens to end with [`DEFERRED_SUFFIX`]
/// cannot be told apart from a deferred one; operation names containing the
/// marker are rejected when handlers are classified.
pub fn from_deferred_tag(tag: &str) -> &str {
    tag.strip_suffix(DEFERRED_SUFFIX).unwrap_or(tag)
}

pub fn is_deferred_tag(tag: &str) -> bool {
    tag.ends_with(DEFERRED_SUFFIX)
}

pub fn qualify(namespace: &str, operation: &str) -> String {
    format!("{namespace}{NAMESPACE_SEPARATOR}{operation}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagKind {
    Direct,
    Deferred,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tag {
    namespace: String,
    operation: String,
    kind: TagKind,
}

impl Tag {
    pub fn new(namespace: impl Into<String>, operation: impl Into<String>, kind: TagKind) -> Self {
        Self {
            namespace: namespace.into(),
            operation: operation.into(),
            kind,
        }
    }

    pub fn direct(namespace: impl Into<String>, operation: impl Into<String>) -> Self {
        Self::new(namespace, operation, TagKind::Direct)
    }

    pub fn deferred(namespace: impl Into<String>, operation: impl Into<String>) -> Self {
        Self::new(namespace, operation, TagKind::Deferred)
    }

    pub fn parse(raw: &str) -> Result<Self, ProtocolError> {
        if raw.is_empty() {
            return Err(ProtocolError::EmptyTag);
        }

        let (qualified, kind) = if is_deferred_tag(raw) {
            (from_deferred_tag(raw), TagKind::Deferred)
        } else {
            (raw, TagKind::Direct)
        };

        let Some((namespace, operation)) = qualified.split_once(NAMESPACE_SEPARATOR) else {
            return Err(ProtocolError::MissingNamespace {
                tag: raw.to_string(),
            });
        };
        if namespace.is_empty() {
            return Err(ProtocolError::EmptySegment {
                tag: raw.to_string(),
                segment: "namespace",
            });
        }
        if operation.is_empty() {
            return Err(ProtocolError::EmptySegment {
                tag: raw.to_string(),
                segment: "operation",
            });
        }

        Ok(Self::new(namespace, operation, kind))
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn kind(&self) -> TagKind {
        self.kind
    }

    pub fn is_deferred(&self) -> bool {
        self.kind == TagKind::Deferred
    }

    pub fn qualified(&self) -> String {
        qualify(&self.namespace, &self.operation)
    }

    pub fn to_direct(&self) -> Self {
        Self::direct(self.namespace.clone(), self.operation.clone())
    }

    pub fn to_deferred(&self) -> Self {
        Self::deferred(self.namespace.clone(), self.operation.clone())
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.namespace, NAMESPACE_SEPARATOR, self.operation)?;
        if self.is_deferred() {
            f.write_str(DEFERRED_SUFFIX)?;
        }
        Ok(())
    }
}
