use std::fmt;

/// A single RouterOS API command: a menu path plus `=key=value` attributes.
#[derive(Clone, Eq, PartialEq, Hash, Default)]
pub struct Command {
    path: String,
    attributes: Vec<(String, String)>,
    proplist: Vec<String>,
}

impl Command {
    pub fn new(path: &str) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn with_attribute(mut self, key: &str, value: impl Into<String>) -> Self {
        self.attributes.push((key.into(), value.into()));
        self
    }

    /// Limits the properties returned for each row.
    pub fn with_proplist(mut self, properties: &[&str]) -> Self {
        self.proplist = properties.iter().map(|property| property.to_string()).collect();
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub(crate) fn to_words(&self, tag: Option<&str>) -> Vec<String> {
        let mut words = Vec::with_capacity(self.attributes.len() + 3);
        words.push(self.path.clone());
        words.extend(
            self.attributes
                .iter()
                .map(|(key, value)| format!("={key}={value}")),
        );
        if !self.proplist.is_empty() {
            words.push(format!(".proplist={}", self.proplist.join(",")));
        }
        if let Some(tag) = tag {
            words.push(format!(".tag={tag}"));
        }
        words
    }
}

// attribute values may carry credentials, so only keys are shown
impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("path", &self.path)
            .field(
                "attributes",
                &self.attributes.iter().map(|(key, _)| key).collect::<Vec<_>>(),
            )
            .field("proplist", &self.proplist)
            .finish()
    }
}
