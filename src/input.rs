use serde_json::Value;

use crate::error::{Error, Result};

/// Target addresses as handed over by a loosely typed caller, e.g. a JSON
/// request body. Only an array of strings is accepted.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TargetList(Vec<String>);

impl TargetList {
    pub fn addresses(&self) -> &[String] {
        &self.0
    }

    pub fn into_inner(self) -> Vec<String> {
        self.0
    }
}

impl TryFrom<&Value> for TargetList {
    type Error = Error;

    fn try_from(value: &Value) -> Result<Self> {
        let items = value
            .as_array()
            .ok_or_else(|| Error::InvalidTargets(format!("expected an array, got {}", kind(value))))?;
        items
            .iter()
            .map(|item| {
                item.as_str().map(str::to_string).ok_or_else(|| {
                    Error::InvalidTargets(format!("expected address strings, got {}", kind(item)))
                })
            })
            .collect::<Result<Vec<_>>>()
            .map(Self)
    }
}

impl From<Vec<String>> for TargetList {
    fn from(addresses: Vec<String>) -> Self {
        Self(addresses)
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
