//! Mango query (`_find`) types.

use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::Document;

/// Options for `POST /{db}/_find` and `POST /{db}/_partition/{partition_key}/_find`.
#[derive(Debug, Clone, PartialEq, Serialize, Builder)]
#[builder(setter(into, strip_option), build_fn(error = "crate::Error"))]
pub struct PostFindOptions {
    /// Database name
    #[serde(skip)]
    pub db: String,

    /// Mango selector
    pub selector: Value,

    /// Continuation token from a previous response
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(default)]
    pub bookmark: Option<String>,

    /// Include conflict information
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(default)]
    pub conflicts: Option<bool>,

    /// Include execution statistics
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(default)]
    pub execution_stats: Option<bool>,

    /// Fields to project from each document
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(default)]
    pub fields: Option<Vec<String>>,

    /// Maximum number of documents
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(default)]
    pub limit: Option<u32>,

    /// Number of documents to skip
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(default)]
    pub skip: Option<u64>,

    /// Sort specification, e.g. `[{"price": "asc"}]`
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(default)]
    pub sort: Option<Vec<Value>>,

    /// Prefer the same set of shard replicas between requests
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(default)]
    pub stable: Option<bool>,

    /// Index update mode
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(default)]
    pub update: Option<String>,

    /// Index to use: a design document name or `[ddoc, index]`
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(default)]
    pub use_index: Option<Value>,

    /// Read quorum
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(default)]
    pub r: Option<u32>,
}

impl PostFindOptions {
    /// Create a builder.
    pub fn builder() -> PostFindOptionsBuilder {
        PostFindOptionsBuilder::default()
    }
}

/// Response of a `_find` query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FindResult {
    /// Matching documents
    #[serde(default)]
    pub docs: Vec<Document>,

    /// Continuation token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bookmark: Option<String>,

    /// Execution statistics, when requested
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_stats: Option<Map<String, Value>>,

    /// Server warning, e.g. no matching index
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_selector_is_required() {
        let err = PostFindOptions::builder().db("shop").build().unwrap_err();
        assert!(err.to_string().contains("selector"));
    }

    #[test]
    fn test_find_result_with_warning() {
        let result: FindResult = serde_json::from_value(json!({
            "docs": [{"_id": "a", "type": "product"}],
            "bookmark": "g1AAAAA",
            "warning": "No matching index found, create an index to optimize query time."
        }))
        .unwrap();

        assert_eq!(result.docs.len(), 1);
        assert_eq!(result.bookmark.as_deref(), Some("g1AAAAA"));
        assert!(result.warning.is_some());
    }
}
