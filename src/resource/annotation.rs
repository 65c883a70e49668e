/*!
 * Typed extension map carried by every resource.
 *
 * Steps attach data such as leverage scores or notes here. The framework
 * never interprets the entries; readers that need a stable view take a
 * snapshot.
 */

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Value of an annotation entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnnotationValue {
    Flag(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    List(Vec<String>),
}

impl AnnotationValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            AnnotationValue::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            AnnotationValue::Integer(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_flag(&self) -> Option<bool> {
        match self {
            AnnotationValue::Flag(value) => Some(*value),
            _ => None,
        }
    }
}

impl From<&str> for AnnotationValue {
    fn from(value: &str) -> Self {
        AnnotationValue::Text(value.to_string())
    }
}

impl From<String> for AnnotationValue {
    fn from(value: String) -> Self {
        AnnotationValue::Text(value)
    }
}

impl From<i64> for AnnotationValue {
    fn from(value: i64) -> Self {
        AnnotationValue::Integer(value)
    }
}

impl From<bool> for AnnotationValue {
    fn from(value: bool) -> Self {
        AnnotationValue::Flag(value)
    }
}

/// Read-only view of annotations taken at one point in time.
pub type AnnotationSnapshot = Arc<BTreeMap<String, AnnotationValue>>;

/// Annotation map owned by a resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Annotations {
    entries: BTreeMap<String, AnnotationValue>,
}

impl Annotations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set<V: Into<AnnotationValue>>(&mut self, name: &str, value: V) {
        self.entries.insert(name.to_string(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&AnnotationValue> {
        self.entries.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<AnnotationValue> {
        self.entries.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &AnnotationValue)> {
        self.entries.iter()
    }

    /// Immutable copy of the current entries.
    pub fn snapshot(&self) -> AnnotationSnapshot {
        Arc::new(self.entries.clone())
    }
}
