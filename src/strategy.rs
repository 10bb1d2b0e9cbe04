//! Conditional request strategy — how a stale entry is revalidated.
//!
//! Grounded on `kornelski/rusty-http-cache-semantics`'s
//! `revalidationHeaders`/`revalidationRequest`: a revalidation request is the
//! original request with a conditional header added from whichever
//! validator the stored entry carries. `ETag` is preferred over
//! `Last-Modified` when both are present, matching that implementation's
//! ordering.

use http::{request, HeaderValue};

use crate::entry::CacheEntry;

/// Decides whether, and how, a stale [`CacheEntry`] can be revalidated with
/// a conditional request.
///
/// This is a collaborator seam: a host crate that wants a different
/// validator scheme (e.g. a custom ETag negotiation) implements this trait
/// instead of relying on [`EtagLastModifiedStrategy`].
pub trait ConditionalRequestStrategy: Send + Sync {
    /// Whether `entry` carries a validator this strategy can use at all.
    fn can_revalidate(&self, entry: &CacheEntry) -> bool;

    /// Adds the conditional header(s) derived from `entry` onto a clone of
    /// `request`, returning the new request parts to send upstream.
    fn create_conditional_request(
        &self,
        request: &request::Parts,
        entry: &CacheEntry,
    ) -> request::Parts;
}

/// The default strategy: `If-None-Match` from a stored `ETag`, falling back
/// to `If-Modified-Since` from a stored `Last-Modified`.
#[derive(Debug, Default, Clone, Copy)]
pub struct EtagLastModifiedStrategy;

impl ConditionalRequestStrategy for EtagLastModifiedStrategy {
    fn can_revalidate(&self, entry: &CacheEntry) -> bool {
        entry.headers().contains_key(http::header::ETAG)
            || entry.headers().contains_key(http::header::LAST_MODIFIED)
    }

    fn create_conditional_request(
        &self,
        request: &request::Parts,
        entry: &CacheEntry,
    ) -> request::Parts {
        let mut parts = request.clone();

        if let Some(etag) = entry.headers().get(http::header::ETAG) {
            if let Ok(value) = HeaderValue::from_bytes(etag.as_bytes()) {
                parts.headers.insert(http::header::IF_NONE_MATCH, value);
            }
        } else if let Some(last_modified) =
            entry.headers().get(http::header::LAST_MODIFIED)
        {
            if let Ok(value) = HeaderValue::from_bytes(last_modified.as_bytes()) {
                parts.headers.insert(http::header::IF_MODIFIED_SINCE, value);
            }
        }

        parts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http::{HeaderMap, Request, StatusCode};

    fn get_request() -> request::Parts {
        Request::builder()
            .method("GET")
            .uri("http://example.org/resource")
            .body(())
            .unwrap()
            .into_parts()
            .0
    }

    fn entry_with(name: http::HeaderName, value: &str) -> CacheEntry {
        let mut headers = HeaderMap::new();
        headers.insert(name, HeaderValue::from_str(value).unwrap());
        CacheEntry::new(Bytes::new(), StatusCode::OK, headers, 0, 0)
    }

    #[test]
    fn prefers_etag_over_last_modified() {
        let strategy = EtagLastModifiedStrategy;
        let mut headers = HeaderMap::new();
        headers.insert(http::header::ETAG, HeaderValue::from_static("\"abc\""));
        headers.insert(
            http::header::LAST_MODIFIED,
            HeaderValue::from_static("Tue, 15 Nov 1994 12:45:26 GMT"),
        );
        let entry = CacheEntry::new(Bytes::new(), StatusCode::OK, headers, 0, 0);
        assert!(strategy.can_revalidate(&entry));

        let conditional =
            strategy.create_conditional_request(&get_request(), &entry);
        assert_eq!(
            conditional.headers.get(http::header::IF_NONE_MATCH).unwrap(),
            "\"abc\""
        );
        assert!(conditional.headers.get(http::header::IF_MODIFIED_SINCE).is_none());
    }

    #[test]
    fn falls_back_to_last_modified() {
        let strategy = EtagLastModifiedStrategy;
        let entry = entry_with(
            http::header::LAST_MODIFIED,
            "Tue, 15 Nov 1994 12:45:26 GMT",
        );
        let conditional =
            strategy.create_conditional_request(&get_request(), &entry);
        assert_eq!(
            conditional.headers.get(http::header::IF_MODIFIED_SINCE).unwrap(),
            "Tue, 15 Nov 1994 12:45:26 GMT"
        );
    }

    #[test]
    fn cannot_revalidate_without_a_validator() {
        let strategy = EtagLastModifiedStrategy;
        let entry = CacheEntry::new(Bytes::new(), StatusCode::OK, HeaderMap::new(), 0, 0);
        assert!(!strategy.can_revalidate(&entry));
    }
}
