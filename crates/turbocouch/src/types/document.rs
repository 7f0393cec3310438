//! Generic JSON document.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A database document.
///
/// The reserved `_id`, `_rev` and `_deleted` members are typed; every other
/// member lives in [`Document::fields`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Document ID
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Revision
    #[serde(rename = "_rev", default, skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,

    /// Tombstone marker
    #[serde(rename = "_deleted", default, skip_serializing_if = "Option::is_none")]
    pub deleted: Option<bool>,

    /// All remaining members
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Document {
    /// Create an empty document with the given ID.
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Default::default()
        }
    }

    /// Look up a non-reserved member.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }
}
