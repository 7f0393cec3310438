//! Full-text search index types.

use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::Document;

/// Options for `POST /{db}/_design/{ddoc}/_search/{index}` and its
/// partitioned counterpart.
#[derive(Debug, Clone, PartialEq, Serialize, Builder)]
#[builder(setter(into, strip_option), build_fn(error = "crate::Error"))]
pub struct PostSearchOptions {
    /// Database name
    #[serde(skip)]
    pub db: String,

    /// Design document name, without the `_design/` prefix
    #[serde(skip)]
    pub ddoc: String,

    /// Search index name
    #[serde(skip)]
    pub index: String,

    /// Lucene query string
    pub query: String,

    /// Continuation token from a previous response
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(default)]
    pub bookmark: Option<String>,

    /// Include document bodies
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(default)]
    pub include_docs: Option<bool>,

    /// Stored fields to return
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(default)]
    pub include_fields: Option<Vec<String>>,

    /// Fields to highlight
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(default)]
    pub highlight_fields: Option<Vec<String>>,

    /// Tag inserted before each highlighted term
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(default)]
    pub highlight_pre_tag: Option<String>,

    /// Tag inserted after each highlighted term
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(default)]
    pub highlight_post_tag: Option<String>,

    /// Number of highlight fragments per field
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(default)]
    pub highlight_number: Option<u32>,

    /// Size of each highlight fragment, in characters
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(default)]
    pub highlight_size: Option<u32>,

    /// Maximum number of rows
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(default)]
    pub limit: Option<u32>,

    /// Sort specification
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(default)]
    pub sort: Option<Vec<String>>,

    /// Prefer the same set of shard replicas between requests
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(default)]
    pub stable: Option<bool>,

    /// Index update mode
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(default)]
    pub update: Option<String>,

    /// Fields to count facets for
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(default)]
    pub counts: Option<Vec<String>>,

    /// Facet drilldown, `[[field, value], ...]`
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(default)]
    pub drilldown: Option<Vec<Vec<String>>>,

    /// Field to group results by
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(default)]
    pub group_field: Option<String>,

    /// Maximum number of groups
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(default)]
    pub group_limit: Option<u32>,

    /// Sort order of groups
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(default)]
    pub group_sort: Option<Vec<String>>,

    /// Numeric range facets
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(default)]
    pub ranges: Option<Map<String, Value>>,
}

impl PostSearchOptions {
    /// Create a builder.
    pub fn builder() -> PostSearchOptionsBuilder {
        PostSearchOptionsBuilder::default()
    }
}

/// A row of a search response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResultRow {
    /// Document ID
    pub id: String,

    /// Stored fields
    #[serde(default)]
    pub fields: Map<String, Value>,

    /// Sort order values
    #[serde(default)]
    pub order: Vec<Value>,

    /// Document body, when `include_docs` was requested
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<Document>,

    /// Highlighted fragments per field
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub highlights: Option<Map<String, Value>>,
}

/// Response of a search query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Number of matches
    #[serde(default)]
    pub total_rows: u64,

    /// Continuation token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bookmark: Option<String>,

    /// Matching rows
    #[serde(default)]
    pub rows: Vec<SearchResultRow>,

    /// Facet counts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counts: Option<Map<String, Value>>,

    /// Range facet counts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ranges: Option<Map<String, Value>>,

    /// Grouped results
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub groups: Option<Vec<Value>>,
}
