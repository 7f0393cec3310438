//! Changes feed types.

use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::Document;

/// A single revision entry in a change item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    /// Revision ID
    pub rev: String,
}

/// One document change from the feed.
///
/// Unknown members are kept in [`ChangesResultItem::extra`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangesResultItem {
    /// Document ID
    pub id: String,

    /// Opaque sequence identifier of this change
    pub seq: String,

    /// Leaf revisions of the document
    #[serde(default)]
    pub changes: Vec<Change>,

    /// Whether the change is a deletion
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted: Option<bool>,

    /// The document body, when `include_docs` was requested
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<Document>,

    /// Members not modelled above
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One batch of the changes feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangesResult {
    /// Changes in server order
    #[serde(default)]
    pub results: Vec<ChangesResultItem>,

    /// Sequence to resume from
    pub last_seq: String,

    /// Number of changes remaining after this batch
    #[serde(default)]
    pub pending: u64,
}

/// Feed type of a changes request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangesFeed {
    /// Return the current batch and close
    Normal,
    /// Hold the request until a change arrives or the timeout elapses
    Longpoll,
    /// Stream changes on an open connection
    Continuous,
    /// Server-sent events
    Eventsource,
}

impl ChangesFeed {
    /// Query string value.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangesFeed::Normal => "normal",
            ChangesFeed::Longpoll => "longpoll",
            ChangesFeed::Continuous => "continuous",
            ChangesFeed::Eventsource => "eventsource",
        }
    }
}

/// Options for `POST /{db}/_changes`.
///
/// # Example
///
/// ```rust
/// use turbocouch::types::PostChangesOptions;
///
/// let options = PostChangesOptions::builder()
///     .db("orders")
///     .include_docs(true)
///     .build()
///     .unwrap();
/// assert_eq!(options.since, None);
/// ```
#[derive(Debug, Clone, PartialEq, Builder)]
#[builder(setter(into, strip_option), build_fn(error = "crate::Error"))]
pub struct PostChangesOptions {
    /// Database name
    pub db: String,

    /// Include attachment encoding information
    #[builder(default)]
    pub att_encoding_info: Option<bool>,

    /// Include attachment bodies (requires `include_docs`)
    #[builder(default)]
    pub attachments: Option<bool>,

    /// Include conflict information (requires `include_docs`)
    #[builder(default)]
    pub conflicts: Option<bool>,

    /// Return changes in descending order
    #[builder(default)]
    pub descending: Option<bool>,

    /// Restrict the feed to these document IDs
    #[builder(default)]
    pub doc_ids: Option<Vec<String>>,

    /// Feed type
    #[builder(default)]
    pub feed: Option<ChangesFeed>,

    /// Fields projected from documents matched by `selector`
    #[builder(default)]
    pub fields: Option<Vec<String>>,

    /// Filter function or built-in filter
    #[builder(default)]
    pub filter: Option<String>,

    /// Heartbeat interval in milliseconds
    #[builder(default)]
    pub heartbeat: Option<u64>,

    /// Include document bodies
    #[builder(default)]
    pub include_docs: Option<bool>,

    /// Alias of `since` sent as the `Last-Event-ID` header
    #[builder(default)]
    pub last_event_id: Option<String>,

    /// Maximum number of changes to return
    #[builder(default)]
    pub limit: Option<u64>,

    /// Mango selector used with the `_selector` filter
    #[builder(default)]
    pub selector: Option<Value>,

    /// Sequence to start after
    #[builder(default)]
    pub since: Option<String>,

    /// Long-poll timeout in milliseconds
    #[builder(default)]
    pub timeout: Option<u64>,
}

impl PostChangesOptions {
    /// Create a builder.
    pub fn builder() -> PostChangesOptionsBuilder {
        PostChangesOptionsBuilder::default()
    }

    /// Options for `db` with everything else unset.
    pub fn new(db: impl Into<String>) -> Self {
        Self {
            db: db.into(),
            att_encoding_info: None,
            attachments: None,
            conflicts: None,
            descending: None,
            doc_ids: None,
            feed: None,
            fields: None,
            filter: None,
            heartbeat: None,
            include_docs: None,
            last_event_id: None,
            limit: None,
            selector: None,
            since: None,
            timeout: None,
        }
    }
}
