//! `_all_docs` and `_design_docs` types.

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use super::Document;

/// Options for `POST /{db}/_all_docs`, `POST /{db}/_design_docs` and
/// `POST /{db}/_partition/{partition_key}/_all_docs`.
///
/// Everything except `db` is sent as the JSON request body.
#[derive(Debug, Clone, PartialEq, Serialize, Builder)]
#[builder(setter(into, strip_option), build_fn(error = "crate::Error"))]
pub struct PostAllDocsOptions {
    /// Database name
    #[serde(skip)]
    pub db: String,

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

    /// Stop returning rows at this document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(default)]
    pub end_key: Option<String>,

    /// Return only the row with this document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(default)]
    pub key: Option<String>,

    /// Return only rows with these document IDs
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(default)]
    pub keys: Option<Vec<String>>,

    /// Start returning rows at this document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(default)]
    pub start_key: Option<String>,
}

impl PostAllDocsOptions {
    /// Create a builder.
    pub fn builder() -> PostAllDocsOptionsBuilder {
        PostAllDocsOptionsBuilder::default()
    }
}

/// Revision information of an `_all_docs` row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocsResultRowValue {
    /// Current revision
    pub rev: String,

    /// Whether the document is deleted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted: Option<bool>,
}

/// A row of an `_all_docs` style response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocsResultRow {
    /// Document ID; absent for `keys` lookups that found nothing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Row key (the document ID)
    pub key: String,

    /// Revision information
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<DocsResultRowValue>,

    /// Document body, when `include_docs` was requested
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<Document>,

    /// Per-row error such as `not_found`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Response of the `_all_docs` family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllDocsResult {
    /// Total number of rows in the index
    #[serde(default)]
    pub total_rows: u64,

    /// Returned rows
    #[serde(default)]
    pub rows: Vec<DocsResultRow>,

    /// Update sequence, when requested
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_seq: Option<String>,
}
