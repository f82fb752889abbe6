//! Service Error Types
//!
//! Errors split along the process lifecycle: `LoadError` covers the fatal
//! startup class (unreadable options or data files, malformed records) and
//! aborts the process before any connection is accepted; `RequestError`
//! covers the per-request class and only ever maps to a canned 400/404
//! response. Malformed client input never raises a process-level fault.

use std::path::PathBuf;
use thiserror::Error;

/// Result alias for startup/load operations.
pub type LoadResult<T> = std::result::Result<T, LoadError>;

/// Fatal startup errors raised while reading the options source or bulk
/// loading the data directory. Any of these aborts before serving begins.
#[derive(Error, Debug)]
pub enum LoadError {
    /// Filesystem failure while opening or reading a required input
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The two-line options source was missing a line or held a non-integer
    #[error("malformed options source {path}: {reason}")]
    BadOptions { path: PathBuf, reason: String },

    /// A carved record was structurally unusable
    #[error("malformed record in {path} at byte offset {offset}")]
    MalformedRecord { path: PathBuf, offset: usize },

    /// A record lacked one of its fixed-schema fields
    #[error("record in {path} is missing field `{field}`")]
    MissingField { path: PathBuf, field: &'static str },

    /// A numeric field failed to parse or was out of the representable range
    #[error("invalid number in field `{field}` in {path}")]
    InvalidNumber { path: PathBuf, field: &'static str },

    /// A visit referenced a user or location id outside the pre-sized arrays
    #[error("visit {visit} references unknown {kind} id {id}")]
    UnknownReference {
        visit: u32,
        kind: &'static str,
        id: u64,
    },
}

/// Per-request failures. These are statuses, not faults: each variant maps to
/// a pre-rendered static response and the connection stays open.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestError {
    /// A recognized filter key had an empty or unparseable value, a malformed
    /// query pair was present, or a POST carried no locatable body
    #[error("bad request")]
    BadRequest,

    /// No route matched after id-placeholder substitution, or the entity id
    /// was outside the valid range for its type
    #[error("not found")]
    NotFound,
}

/// Result alias for request handling.
pub type RequestResult<T> = std::result::Result<T, RequestError>;
