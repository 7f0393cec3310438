//! MapReduce view types.

use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::Document;

/// Options for `POST /{db}/_design/{ddoc}/_view/{view}` and its partitioned
/// counterpart.
///
/// `db`, `ddoc` and `view` form the path; the rest is the JSON body.
#[derive(Debug, Clone, PartialEq, Serialize, Builder)]
#[builder(setter(into, strip_option), build_fn(error = "crate::Error"))]
pub struct PostViewOptions {
    /// Database name
    #[serde(skip)]
    pub db: String,

    /// Design document name, without the `_design/` prefix
    #[serde(skip)]
    pub ddoc: String,

    /// View name
    #[serde(skip)]
    pub view: String,

    /// Include attachment encoding information
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(default)]
    pub att_encoding_info: Option<bool>,

    /// Include attachment bodies
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(default)]
    pub attachments: Option<bool>,

    /// Include conflict information
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(default)]
    pub conflicts: Option<bool>,

    /// Reverse the key order
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(default)]
    pub descending: Option<bool>,

    /// Include document bodies
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(default)]
    pub include_docs: Option<bool>,

    /// Include rows matching `end_key`
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(default)]
    pub inclusive_end: Option<bool>,

    /// Maximum number of rows
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(default)]
    pub limit: Option<u32>,

    /// Number of rows to skip
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(default)]
    pub skip: Option<u64>,

    /// Include the update sequence in the response
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(default)]
    pub update_seq: Option<bool>,

    /// Stop returning rows at this key
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(default)]
    pub end_key: Option<Value>,

    /// Stop returning rows at this document ID within `end_key`
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(default)]
    pub end_key_doc_id: Option<String>,

    /// Group reduce results by key
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(default)]
    pub group: Option<bool>,

    /// Group reduce results by this many array key elements
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(default)]
    pub group_level: Option<u32>,

    /// Return only rows with this key
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(default)]
    pub key: Option<Value>,

    /// Return only rows with these keys
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(default)]
    pub keys: Option<Vec<Value>>,

    /// Run the reduce function
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(default)]
    pub reduce: Option<bool>,

    /// Prefer the same set of shard replicas between requests
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(default)]
    pub stable: Option<bool>,

    /// Start returning rows at this key
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(default)]
    pub start_key: Option<Value>,

    /// Start returning rows at this document ID within `start_key`
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(default)]
    pub start_key_doc_id: Option<String>,

    /// Index update mode: `true`, `false` or `lazy`
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(default)]
    pub update: Option<String>,
}

impl PostViewOptions {
    /// Create a builder.
    pub fn builder() -> PostViewOptionsBuilder {
        PostViewOptionsBuilder::default()
    }
}

/// A row of a view response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewResultRow {
    /// Emitting document ID; absent on reduced rows
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Emitted key
    #[serde(default)]
    pub key: Value,

    /// Emitted value
    #[serde(default)]
    pub value: Value,

    /// Document body, when `include_docs` was requested
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<Document>,

    /// Per-row error
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Response of a view query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewResult {
    /// Total number of rows in the view
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_rows: Option<u64>,

    /// Update sequence, when requested
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_seq: Option<String>,

    /// Returned rows
    #[serde(default)]
    pub rows: Vec<ViewResultRow>,
}
