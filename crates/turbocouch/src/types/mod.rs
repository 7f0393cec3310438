//! Request options and response models for the database endpoints.
//!
//! Option bags are built with `derive_builder` (`PostViewOptions::builder()`)
//! and validate their required fields at `build()`. Response models keep
//! fields the crate does not know about in a residual map so newer server
//! versions remain readable.

pub mod all_docs;
pub mod changes;
pub mod database;
pub mod document;
pub mod find;
pub mod search;
pub mod view;

pub use all_docs::{
    AllDocsResult, DocsResultRow, DocsResultRowValue, PostAllDocsOptions, PostAllDocsOptionsBuilder,
};
pub use changes::{
    Change, ChangesFeed, ChangesResult, ChangesResultItem, PostChangesOptions,
    PostChangesOptionsBuilder,
};
pub use database::{ContentInformationSizes, DatabaseInformation};
pub use document::Document;
pub use find::{FindResult, PostFindOptions, PostFindOptionsBuilder};
pub use search::{PostSearchOptions, PostSearchOptionsBuilder, SearchResult, SearchResultRow};
pub use view::{PostViewOptions, PostViewOptionsBuilder, ViewResult, ViewResultRow};

impl From<derive_builder::UninitializedFieldError> for crate::Error {
    fn from(error: derive_builder::UninitializedFieldError) -> Self {
        crate::Error::InvalidRequest(format!(
            "missing required option `{}`",
            error.field_name()
        ))
    }
}
