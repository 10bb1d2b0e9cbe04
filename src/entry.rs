//! Cache entry (C2) — immutable captured response and age arithmetic.
//!
//! Age math follows RFC 7234 §4.2.3 as set out in the design notes: whole
//! seconds throughout, and the `response_delay` refinement is skipped
//! because `request_time`/`response_time` are observed locally (the delay
//! is already folded into `corrected_age_value`). The algorithm shape
//! mirrors `kornelski/rusty-http-cache-semantics`'s `age()`/`raw_server_date`
//! (same `Age`/`Date` header handling), adapted to the spec's explicit
//! request/response timestamp pair instead of a single `response_time`.

use bytes::Bytes;
use http::{HeaderMap, HeaderValue, StatusCode};

use crate::directives::CacheControlDirectives;

/// An immutable, captured origin response plus the timing metadata needed
/// for age arithmetic.
///
/// Bodies are held in a [`Bytes`] so that a [`CacheEntry`] returned from a
/// `get`/`put` can be cheaply cloned and shared with callers for read-only
/// access, while the store retains exclusive ownership of the canonical
/// copy (see the module docs on entry identity).
#[derive(Debug, Clone)]
pub struct CacheEntry {
    body: Bytes,
    status: StatusCode,
    headers: HeaderMap,
    request_time_s: i64,
    response_time_s: i64,
    corrected_initial_age_s: i64,
}

impl CacheEntry {
    /// Constructs a new entry, computing `corrected_initial_age_s` from the
    /// captured headers per §4.2.
    ///
    /// # Panics
    ///
    /// Never panics, but callers should uphold `request_time_s <=
    /// response_time_s`; violating it does not corrupt the entry, it just
    /// makes `corrected_initial_age_s` larger than it should be.
    pub fn new(
        body: Bytes,
        status: StatusCode,
        headers: HeaderMap,
        request_time_s: i64,
        response_time_s: i64,
    ) -> Self {
        let corrected_initial_age_s =
            corrected_initial_age(&headers, request_time_s, response_time_s);
        Self {
            body,
            status,
            headers,
            request_time_s,
            response_time_s,
            corrected_initial_age_s,
        }
    }

    /// The captured response body.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// The captured HTTP status.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// The captured response headers, as originally received (never
    /// includes a recomputed `Age` — see [`CacheEntry::view`]).
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Wall-clock seconds when the originating request was sent.
    pub fn request_time_s(&self) -> i64 {
        self.request_time_s
    }

    /// Wall-clock seconds when the response was received.
    pub fn response_time_s(&self) -> i64 {
        self.response_time_s
    }

    /// The entry's age at the moment of storage (§4.2).
    pub fn corrected_initial_age_s(&self) -> i64 {
        self.corrected_initial_age_s
    }

    /// `current_age(now_s) = corrected_initial_age + (now_s - response_time_s)`.
    pub fn current_age(&self, now_s: i64) -> i64 {
        self.corrected_initial_age_s + (now_s - self.response_time_s)
    }

    /// Parses this entry's response `Cache-Control` directives.
    pub fn directives(&self) -> CacheControlDirectives {
        CacheControlDirectives::parse_from_headers(&self.headers)
    }

    /// Builds a read-through view of this entry with `Age` overridden to
    /// `current_age(now_s)`, without mutating the stored entry. This is the
    /// only place an `Age` header is ever computed for a caller; the
    /// entry's own `headers()` are left untouched (design notes: "a correct
    /// re-implementation MUST NOT mutate the stored entry").
    pub fn view(&self, now_s: i64) -> CachedResponseView {
        let mut headers = self.headers.clone();
        let age = self.current_age(now_s).max(0);
        if let Ok(value) = HeaderValue::from_str(&age.to_string()) {
            headers.insert(http::header::AGE, value);
        }
        CachedResponseView { body: self.body.clone(), status: self.status, headers }
    }
}

/// A cheap, owned response view read through a [`CacheEntry`] with `Age`
/// overridden. Distinct from [`CacheEntry`] so the stored entry's headers
/// invariant (never mutated after insertion) is upheld at the type level.
#[derive(Debug, Clone)]
pub struct CachedResponseView {
    /// The response body (shares storage with the stored entry).
    pub body: Bytes,
    /// The response status.
    pub status: StatusCode,
    /// The response headers, with `Age` recomputed for the view's `now`.
    pub headers: HeaderMap,
}

fn corrected_initial_age(
    headers: &HeaderMap,
    request_time_s: i64,
    response_time_s: i64,
) -> i64 {
    let date_header_s = http_date_seconds(headers, http::header::DATE)
        .unwrap_or(0)
        .max(0);
    let age_header_s = age_header_seconds(headers).unwrap_or(0).max(0);

    let apparent_age = (response_time_s - date_header_s).max(0);
    let corrected_age_value =
        age_header_s + (response_time_s - request_time_s);

    apparent_age.max(corrected_age_value).max(0)
}

/// Parses an RFC 1123 ("HTTP-date") header value into whole seconds since
/// the Unix epoch. Returns `None` if the header is absent or unparseable —
/// a parse failure degrades to "absent" per the error handling design,
/// never an error the caller observes.
pub(crate) fn http_date_seconds(
    headers: &HeaderMap,
    name: http::HeaderName,
) -> Option<i64> {
    let raw = headers.get(name)?.to_str().ok()?;
    let when = httpdate::parse_http_date(raw).ok()?;
    let secs = when
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);
    Some(secs)
}

fn age_header_seconds(headers: &HeaderMap) -> Option<i64> {
    headers
        .get(http::header::AGE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<i64>().ok())
}
