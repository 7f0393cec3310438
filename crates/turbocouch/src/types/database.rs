//! Database information types.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Size information of a database.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentInformationSizes {
    /// Size of live data inside the database, in bytes
    #[serde(default)]
    pub active: u64,

    /// Uncompressed size of database contents, in bytes
    #[serde(default)]
    pub external: u64,

    /// Size of the database file on disk, in bytes
    #[serde(default)]
    pub file: u64,
}

/// Response of `GET /{db}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseInformation {
    /// Database name
    pub db_name: String,

    /// Number of live documents
    #[serde(default)]
    pub doc_count: u64,

    /// Number of deleted documents
    #[serde(default)]
    pub doc_del_count: u64,

    /// Size information
    #[serde(default)]
    pub sizes: ContentInformationSizes,

    /// Current update sequence
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_seq: Option<String>,

    /// Members not modelled above
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DatabaseInformation {
    /// Average uncompressed document size in bytes, `0.0` for an empty database.
    pub fn average_document_size(&self) -> f64 {
        if self.doc_count == 0 {
            0.0
        } else {
            self.sizes.external as f64 / self.doc_count as f64
        }
    }
}
