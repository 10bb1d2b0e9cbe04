//! Error types for the cache.
//!
//! Per the error handling design, only genuinely exceptional conditions are
//! represented here. A malformed `Date`/`Expires` header is not an error —
//! the predicate that needed it treats the header as absent (see
//! [`crate::policy`]) — and a transport failure is the executor's own error
//! type, propagated through [`crate::interceptor::intercept`] unchanged
//! rather than wrapped in [`CacheError`].

use thiserror::Error;

/// A type-erased error from a pluggable collaborator (store backend,
/// conditional-request strategy).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A `Result` typedef to use with [`CacheError`].
pub type Result<T> = std::result::Result<T, CacheError>;

/// Errors produced by the cache's own components (C2-C5).
///
/// These never mask a successful origin response: both
/// [`BodyTooLarge`](CacheError::BodyTooLarge) and
/// [`Store`](CacheError::Store) are caught by the interceptor and logged as
/// warnings, after which the uncached origin response is returned as-is.
#[derive(Error, Debug)]
pub enum CacheError {
    /// The response body exceeded `max_response_body_size` while being
    /// drained. The check is on cumulative bytes read, not on the
    /// completed body, so this fires as soon as the bound is crossed.
    #[error("response body exceeded max_response_body_size ({limit} bytes)")]
    BodyTooLarge {
        /// The configured bound.
        limit: u64,
    },
    /// The underlying store backend (in-memory map, disk, distributed)
    /// failed for a reason of its own.
    #[error("cache store failure: {0}")]
    Store(#[source] BoxError),
    /// A header required to build a request/response shape could not be
    /// constructed (e.g. an invalid header name or value supplied by a
    /// collaborator). This is distinct from a header merely failing to
    /// *parse* as a date or number, which degrades to "absent" instead of
    /// erroring.
    #[error(transparent)]
    InvalidHeaderValue(#[from] http::header::InvalidHeaderValue),
    /// Same as above, for header names.
    #[error(transparent)]
    InvalidHeaderName(#[from] http::header::InvalidHeaderName),
}
