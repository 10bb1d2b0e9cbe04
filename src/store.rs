//! Response store (C3) — key→entry mapping with bounded body capture.
//!
//! The body-capture discipline here is the spec's most resource-sensitive
//! requirement: reads happen through a fixed-size buffer and the
//! cumulative-bytes check happens *during* the read loop, not after the
//! full body has been assembled, so a misbehaving origin can't force an
//! unbounded allocation before the bound is noticed.

use std::collections::HashMap;
use std::sync::RwLock;

use bytes::{Bytes, BytesMut};
use http::{request, HeaderMap, StatusCode};

use crate::entry::CacheEntry;
use crate::error::{BoxError, CacheError};

/// Size of the fixed read buffer used while draining a response body.
const READ_CHUNK_SIZE: usize = 4 * 1024;

/// A chunked source of response body bytes, supplied by the transport.
///
/// This is the narrow interface the store uses to drain an origin response
/// without depending on any particular HTTP client or async runtime. A
/// transport adapter implements this over whatever streaming body type it
/// already has (`reqwest::Response`, `hyper::body::Incoming`, ...).
#[async_trait::async_trait]
pub trait ResponseBody: Send {
    /// Returns the next chunk of body bytes, or `None` at end of stream.
    /// Implementations should yield chunks no larger than a few tens of
    /// KiB; the store does not assume any particular chunk size.
    async fn next_chunk(&mut self) -> std::result::Result<Option<Bytes>, BoxError>;
}

/// A [`ResponseBody`] over an already-fully-received buffer, useful for
/// tests and for transports that buffer internally.
pub struct BufferedBody {
    remaining: Option<Bytes>,
}

impl BufferedBody {
    /// Wraps a complete, already-available body.
    pub fn new(body: impl Into<Bytes>) -> Self {
        Self { remaining: Some(body.into()) }
    }
}

#[async_trait::async_trait]
impl ResponseBody for BufferedBody {
    async fn next_chunk(&mut self) -> std::result::Result<Option<Bytes>, BoxError> {
        Ok(self.remaining.take().filter(|b| !b.is_empty()))
    }
}

/// Drains `body` into a single [`Bytes`], enforcing `max_response_body_size`
/// on cumulative bytes read rather than on the finished array.
async fn drain_body(
    body: &mut dyn ResponseBody,
    max_response_body_size: u64,
) -> Result<Bytes, CacheError> {
    let mut buf = BytesMut::new();
    loop {
        let chunk = body.next_chunk().await.map_err(CacheError::Store)?;
        let Some(chunk) = chunk else { break };
        // Cumulative check happens before the chunk is appended: the
        // moment the running total would cross the bound, we abort
        // without materializing the oversized buffer.
        if buf.len() as u64 + chunk.len() as u64 > max_response_body_size {
            return Err(CacheError::BodyTooLarge { limit: max_response_body_size });
        }
        for piece in chunk.chunks(READ_CHUNK_SIZE) {
            buf.extend_from_slice(piece);
        }
    }
    Ok(buf.freeze())
}

/// Drains `body` into a single [`Bytes`] with no size bound, used when the
/// interceptor needs the full response body regardless of whether the
/// response ends up cacheable (§5: bodies are always fully drained and
/// buffered, independent of the caching decision).
pub(crate) async fn drain_body_unbounded(
    body: &mut dyn ResponseBody,
) -> std::result::Result<Bytes, CacheError> {
    let mut buf = BytesMut::new();
    while let Some(chunk) = body.next_chunk().await.map_err(CacheError::Store)? {
        for piece in chunk.chunks(READ_CHUNK_SIZE) {
            buf.extend_from_slice(piece);
        }
    }
    Ok(buf.freeze())
}

/// The default cache key: the absolute request URI, treating the method
/// implicitly as GET (per §3, only GET requests are cached, so the method
/// never needs to be part of the key).
pub fn cache_key(request: &request::Parts) -> String {
    request.uri.to_string()
}

/// Key→entry mapping with bounded body capture (C3).
///
/// `get`/`put`/`evict`/`clear` must be safe for concurrent use by distinct
/// requests (§5); this crate's default implementation,
/// [`InMemoryHttpCache`], uses a lock-guarded map. Two concurrent `put`s for
/// the same key race to an unspecified winner, which the spec accepts
/// because entries are semantically interchangeable snapshots.
#[async_trait::async_trait]
pub trait HttpResponseCache: Send + Sync {
    /// Looks up the entry for `request`'s derived key.
    async fn get(&self, request: &request::Parts) -> Option<CacheEntry>;

    /// Drains `body` (see [`ResponseBody`]), constructs a new entry, stores
    /// it under `request`'s derived key, and returns it.
    async fn put(
        &self,
        request: &request::Parts,
        status: StatusCode,
        headers: HeaderMap,
        body: &mut dyn ResponseBody,
        request_time_s: i64,
        response_time_s: i64,
    ) -> Result<CacheEntry, CacheError>;

    /// Removes the entry at `request`'s derived key, if any.
    async fn evict(&self, request: &request::Parts);

    /// Removes all entries.
    async fn clear(&self);
}

/// The default in-memory, bounded [`HttpResponseCache`] backend.
///
/// This is the only store backend shipped in the hard core; disk-backed or
/// distributed backends are external collaborators a host application can
/// plug in by implementing [`HttpResponseCache`] itself.
pub struct InMemoryHttpCache {
    max_response_body_size: u64,
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl InMemoryHttpCache {
    /// Creates an empty cache that refuses to store bodies larger than
    /// `max_response_body_size` bytes.
    pub fn new(max_response_body_size: u64) -> Self {
        Self { max_response_body_size, entries: RwLock::new(HashMap::new()) }
    }

    fn entries_read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn entries_write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait::async_trait]
impl HttpResponseCache for InMemoryHttpCache {
    async fn get(&self, request: &request::Parts) -> Option<CacheEntry> {
        self.entries_read().get(&cache_key(request)).cloned()
    }

    async fn put(
        &self,
        request: &request::Parts,
        status: StatusCode,
        headers: HeaderMap,
        body: &mut dyn ResponseBody,
        request_time_s: i64,
        response_time_s: i64,
    ) -> Result<CacheEntry, CacheError> {
        let body = drain_body(body, self.max_response_body_size).await?;
        let entry =
            CacheEntry::new(body, status, headers, request_time_s, response_time_s);
        self.entries_write().insert(cache_key(request), entry.clone());
        Ok(entry)
    }

    async fn evict(&self, request: &request::Parts) {
        self.entries_write().remove(&cache_key(request));
    }

    async fn clear(&self) {
        self.entries_write().clear();
    }
}
