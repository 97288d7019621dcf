//! Internal failure kinds of the load/save pipeline
//!
//! None of these cross the public `ClaimStore` boundary; each is absorbed into
//! a recovery path or a `false`/`None` return.

use thiserror::Error;

use crate::platform::BackendError;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Stored value is not valid JSON (or not the expected record shape)
    #[error("stored value under `{key}` is unreadable: {source}")]
    Parse {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    /// Backend rejected a read or write
    #[error(transparent)]
    Backend(#[from] BackendError),
    /// Stored value is JSON but not a document object
    #[error("stored value under `{key}` is not a JSON object")]
    NotAnObject { key: String },
    /// Restore target id not present
    #[error("no {kind} with id {id}")]
    NotFound { kind: &'static str, id: i64 },
    #[error("could not encode record: {0}")]
    Encode(#[source] serde_json::Error),
}

impl StoreError {
    pub(crate) fn parse(key: &str, source: serde_json::Error) -> Self {
        StoreError::Parse {
            key: key.to_string(),
            source,
        }
    }
}
