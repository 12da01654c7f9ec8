use serde::{Deserialize, Serialize};

use crate::{
    error::ProtocolError,
    tag::{is_deferred_tag, Tag},
};

/// Arbitrary message payload. `Null` stands in for "no argument".
pub type Payload = serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawAction")]
pub struct Action {
    tag: String,
    payload: Payload,
}

#[derive(Deserialize)]
struct RawAction {
    tag: String,
    #[serde(default)]
    payload: Payload,
}

impl TryFrom<RawAction> for Action {
    type Error = ProtocolError;

    fn try_from(raw: RawAction) -> Result<Self, Self::Error> {
        Self::new(raw.tag, raw.payload)
    }
}

impl Action {
    pub fn new(tag: impl Into<String>, payload: Payload) -> Result<Self, ProtocolError> {
        let tag = tag.into();
        if tag.is_empty() {
            return Err(ProtocolError::EmptyTag);
        }
        Ok(Self { tag, payload })
    }

    pub fn from_tag(tag: &Tag, payload: Payload) -> Self {
        Self {
            tag: tag.to_string(),
            payload,
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn into_parts(self) -> (String, Payload) {
        (self.tag, self.payload)
    }

    pub fn is_deferred(&self) -> bool {
        is_deferred_tag(&self.tag)
    }

    pub fn structured_tag(&self) -> Result<Tag, ProtocolError> {
        Tag::parse(&self.tag)
    }
}
