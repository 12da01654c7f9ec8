use std::{fmt, str::FromStr};

use anyhow::{bail, Context};
use serde_json::Value;
use slice_protocol::NAMESPACE_SEPARATOR;

/// One scripted call: `Namespace.operation` or `Namespace.operation=<json>`.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub namespace: String,
    pub operation: String,
    pub payload: Value,
}

impl FromStr for Step {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> anyhow::Result<Self> {
        let (target, payload) = match raw.split_once('=') {
            Some((target, payload)) => (target, parse_payload(payload)),
            None => (raw, Value::Null),
        };
        let (namespace, operation) = target
            .split_once(NAMESPACE_SEPARATOR)
            .with_context(|| format!("step '{raw}' must look like Namespace.operation[=json]"))?;
        if namespace.is_empty() || operation.is_empty() {
            bail!("step '{raw}' has an empty namespace or operation");
        }
        Ok(Self {
            namespace: namespace.to_string(),
            operation: operation.to_string(),
            payload,
        })
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.namespace, NAMESPACE_SEPARATOR, self.operation)?;
        if !self.payload.is_null() {
            write!(f, "={}", self.payload)?;
        }
        Ok(())
    }
}

// Bare words are taken as strings so `Todos.add_title=milk` style input works.
fn parse_payload(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}
