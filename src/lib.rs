//! An HTTP client-side response cache implementing the RFC 7234 (HTTP
//! Caching) and RFC 5861 (stale-if-error) semantics required by a private
//! or shared cache sitting between an HTTP client and a transport.
//!
//! The crate is organized as a small pipeline, leaves first:
//!
//! - [`directives`] — tokenizes a `Cache-Control` header value.
//! - [`entry`] — the immutable captured response and its age arithmetic.
//! - [`store`] — key→entry storage with bounded body capture.
//! - [`policy`] — the four cacheability predicates and freshness math.
//! - [`interceptor`] — the per-request decision state machine tying the
//!   above together behind a single [`interceptor::Interceptor::intercept`]
//!   call.
//!
//! Request execution, the key-value storage backend, and conditional
//! request construction are treated as pluggable collaborators reached
//! through [`interceptor::Executor`], [`store::HttpResponseCache`], and
//! [`strategy::ConditionalRequestStrategy`] respectively — this crate ships
//! one default implementation of each store/strategy collaborator
//! ([`store::InMemoryHttpCache`], [`strategy::EtagLastModifiedStrategy`])
//! but does not assume any particular HTTP client.

pub mod directives;
pub mod entry;
pub mod error;
pub mod interceptor;
pub mod policy;
pub mod store;
pub mod strategy;

pub use directives::CacheControlDirectives;
pub use entry::{CacheEntry, CachedResponseView};
pub use error::{CacheError, Result};
pub use interceptor::{Executor, InterceptedResponse, Interceptor, RawResponse};
pub use policy::CachingPolicy;
pub use store::{BufferedBody, HttpResponseCache, InMemoryHttpCache, ResponseBody};
pub use strategy::{ConditionalRequestStrategy, EtagLastModifiedStrategy};
