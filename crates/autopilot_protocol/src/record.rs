use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{ProtocolError, Status};

/// One pass/fail observation produced by a check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    pub criterion: String,
    pub fulfilled: bool,
    pub justification: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

impl CheckResult {
    pub fn new(
        criterion: impl Into<String>,
        fulfilled: bool,
        justification: impl Into<String>,
    ) -> Self {
        Self {
            criterion: criterion.into(),
            fulfilled,
            justification: justification.into(),
            metadata: None,
        }
    }

    pub fn fulfilled(criterion: impl Into<String>, justification: impl Into<String>) -> Self {
        Self::new(criterion, true, justification)
    }

    pub fn unfulfilled(criterion: impl Into<String>, justification: impl Into<String>) -> Self {
        Self::new(criterion, false, justification)
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata
            .get_or_insert_with(Map::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn metadata_value(&self, key: &str) -> Option<&Value> {
        self.metadata.as_ref()?.get(key)
    }

    /// `{"result": {...}}` as a single compact line, without the trailing newline.
    pub fn to_json_line(&self) -> Result<String, ProtocolError> {
        #[derive(Serialize)]
        struct Line<'a> {
            result: &'a CheckResult,
        }
        Ok(serde_json::to_string(&Line { result: self })?)
    }
}

/// Key/value facts a step hands to downstream steps. Later writes win.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OutputMap(BTreeMap<String, String>);

impl OutputMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(key.into(), value.into())
    }

    /// Later-wins merge of `other` into `self`.
    pub fn merge(&mut self, other: &OutputMap) {
        for (key, value) in &other.0 {
            self.0.insert(key.clone(), value.clone());
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Entries of `self` that are new or changed compared to `before`.
    pub fn changed_since(&self, before: &OutputMap) -> OutputMap {
        OutputMap(
            self.0
                .iter()
                .filter(|(key, value)| before.0.get(*key) != Some(*value))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }

    /// Canonical serialisation: a flat JSON object with keys in sorted order.
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(&self.0)?)
    }

    /// `{"output": {...}}` for re-emitting the map on a parent step's own stdout.
    pub fn to_output_line(&self) -> Result<String, ProtocolError> {
        #[derive(Serialize)]
        struct Line<'a> {
            output: &'a OutputMap,
        }
        Ok(serde_json::to_string(&Line { output: self })?)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for OutputMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        OutputMap(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl From<BTreeMap<String, String>> for OutputMap {
    fn from(map: BTreeMap<String, String>) -> Self {
        OutputMap(map)
    }
}

impl IntoIterator for OutputMap {
    type Item = (String, String);
    type IntoIter = std::collections::btree_map::IntoIter<String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// `(status, reason)` produced by an evaluator; serialises as the final status line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evaluation {
    pub status: Status,
    pub reason: String,
}

impl Evaluation {
    pub fn new(status: Status, reason: impl Into<String>) -> Self {
        Self {
            status,
            reason: reason.into(),
        }
    }

    pub fn to_json_line(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }
}
