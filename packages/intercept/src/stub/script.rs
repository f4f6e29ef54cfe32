// packages/intercept/src/stub/script.rs
//! Canned request/response scripts

use crate::utils::errors::{InterceptError, Result};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::Path;

/// One canned answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exchange {
    pub request: String,

    /// Empty means "nothing bound remotely"
    #[serde(default)]
    pub response: String,
}

/// Ordered list of canned exchanges
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayScript {
    #[serde(default)]
    pub exchanges: Vec<Exchange>,
}

impl ReplayScript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an answer for `request`; repeated requests consume answers in order
    pub fn on(mut self, request: impl Into<String>, response: impl Into<String>) -> Self {
        self.exchanges.push(Exchange {
            request: request.into(),
            response: response.into(),
        });
        self
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        serde_yaml::from_str(text)
            .map_err(|e| InterceptError::Config(format!("Invalid replay script: {}", e)))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            InterceptError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&text)
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self)
            .map_err(|e| InterceptError::Config(format!("Failed to serialize script: {}", e)))
    }
}

/// Lookup table built from a script.
///
/// Each request has a queue of answers; the last one sticks once the others
/// are used up. Unknown requests get the empty answer.
#[derive(Debug, Default)]
pub struct ResponseTable {
    entries: DashMap<String, VecDeque<String>>,
}

impl ResponseTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_script(script: &ReplayScript) -> Self {
        let table = Self::new();
        for exchange in &script.exchanges {
            table.push(exchange.request.clone(), exchange.response.clone());
        }
        table
    }

    pub fn push(&self, request: impl Into<String>, response: impl Into<String>) {
        self.entries
            .entry(request.into())
            .or_default()
            .push_back(response.into());
    }

    pub fn respond(&self, request: &str) -> String {
        match self.entries.get_mut(request) {
            Some(mut queue) => {
                if queue.len() > 1 {
                    queue.pop_front().unwrap_or_default()
                } else {
                    queue.front().cloned().unwrap_or_default()
                }
            }
            None => String::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_request_is_empty() {
        let table = ResponseTable::new();
        assert_eq!(table.respond("IMPORT:widgets"), "");
        assert!(table.is_empty());
    }

    #[test]
    fn test_queued_answers_last_one_sticks() {
        let script = ReplayScript::new()
            .on("GETATTR:clock:SEP:now", "1")
            .on("GETATTR:clock:SEP:now", "2");
        let table = ResponseTable::from_script(&script);

        assert_eq!(table.respond("GETATTR:clock:SEP:now"), "1");
        assert_eq!(table.respond("GETATTR:clock:SEP:now"), "2");
        assert_eq!(table.respond("GETATTR:clock:SEP:now"), "2");
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_yaml_script() {
        let yaml = r#"
exchanges:
  - request: "IMPORT:widgets"
  - request: "CALL:widgets:SEP:Button:SEP:():SEP:{'label': 'Go'}"
    response: "Instance('Button', 'btn-17')"
"#;
        let script = ReplayScript::from_yaml(yaml).unwrap();
        assert_eq!(script.exchanges.len(), 2);
        assert_eq!(script.exchanges[0].response, "");
        assert_eq!(script.exchanges[1].response, "Instance('Button', 'btn-17')");

        let reparsed = ReplayScript::from_yaml(&script.to_yaml().unwrap()).unwrap();
        assert_eq!(reparsed, script);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("script.yaml");
        std::fs::write(&path, "exchanges:\n  - request: \"IMPORT:m\"\n    response: \"None\"\n")
            .unwrap();

        let script = ReplayScript::load(&path).unwrap();
        assert_eq!(script, ReplayScript::new().on("IMPORT:m", "None"));
        assert!(ReplayScript::load(dir.path().join("missing.yaml")).is_err());
    }
}
