use std::path::PathBuf;

use crate::contract::RemoteError;
use crate::id::{InvalidId, PageId};
use crate::model::ColumnType;

/// Fatal errors. Anything that can be recovered from is logged where it
/// happens and never reaches this type.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("remote request failed while {context}: {source}")]
    Remote {
        context: String,
        #[source]
        source: RemoteError,
    },

    #[error("version batch mismatch: {0}")]
    BatchMismatch(String),

    #[error("page cache failure for {id}: {source}")]
    Cache {
        id: String,
        #[source]
        source: std::io::Error,
    },

    #[error("page {0} is reachable but missing from the cache")]
    NotCached(PageId),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    InvalidId(#[from] InvalidId),

    #[error("database {page_id} is a {kind} block, not a collection view")]
    NotACollection { page_id: PageId, kind: String },

    #[error("view {view_id} does not belong to database {page_id}")]
    UnknownView { page_id: PageId, view_id: PageId },

    #[error(transparent)]
    Image(#[from] ImageError),

    #[error("cannot write {path}: {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot persist state to {path}: {source}")]
    State {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SyncError {
    pub fn remote(context: impl Into<String>, source: RemoteError) -> Self {
        SyncError::Remote {
            context: context.into(),
            source,
        }
    }

    pub fn cache(id: impl ToString, source: std::io::Error) -> Self {
        SyncError::Cache {
            id: id.to_string(),
            source,
        }
    }
}

/// Collection schema cannot be mapped to front matter.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SchemaError {
    #[error("column {0:?} must exist")]
    MissingColumn(&'static str),

    #[error("column {name:?} has type {found}; expected one of {expected:?}")]
    WrongType {
        name: String,
        found: ColumnType,
        expected: Vec<ColumnType>,
    },

    #[error("column name {0:?} is reserved")]
    ReservedName(String),
}

/// A private image could not be downloaded or stored.
#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("cannot download image {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: RemoteError,
    },

    #[error("cannot save image {url} to {path}: {source}")]
    Write {
        url: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("image task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
