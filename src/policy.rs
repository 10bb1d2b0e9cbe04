//! Caching policy (C4) — the four cacheability predicates and freshness
//! math.
//!
//! The heuristically-cacheable status set and the shared-cache/
//! `Authorization`/`proxy-revalidate` handling are grounded on
//! `kornelski/rusty-http-cache-semantics`'s `is_storable`/`max_age`, with
//! the decision surface narrowed to exactly the predicates this spec
//! names (no `Vary` matching, no heuristic freshness fraction, no
//! `immutable` handling — those are the documented non-goals / quirks the
//! original leaves unspecified).

use http::{request, HeaderMap, StatusCode};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::directives::CacheControlDirectives;
use crate::entry::{http_date_seconds, CacheEntry};

/// HTTP status codes that are cacheable by default absent any explicit
/// freshness information, per RFC 7231 §6.1.
const HEURISTICALLY_CACHEABLE_STATUSES: &[u16] =
    &[200, 203, 204, 300, 301, 404, 405, 410, 414, 501];

/// Configures the four cacheability predicates.
///
/// `default_freshness_s` is mutable at runtime (§4.4 calls it out
/// explicitly), so it's held in an [`AtomicU64`] rather than a plain field —
/// a `CachingPolicy` is typically shared across the many concurrent
/// requests an [`crate::interceptor::Interceptor`] serves (§5).
#[derive(Debug)]
pub struct CachingPolicy {
    /// Whether this cache serves multiple users (stricter `private`/
    /// `Authorization`/`proxy-revalidate` handling) or a single user.
    pub is_shared_cache: bool,
    /// Upper bound on a cacheable response's `Content-Length`.
    pub max_response_body_size: u64,
    default_freshness_s: AtomicU64,
}

impl CachingPolicy {
    /// Creates a policy with the given shared-cache/body-size
    /// configuration and the spec's default freshness lifetime (3600s).
    pub fn new(is_shared_cache: bool, max_response_body_size: u64) -> Self {
        Self {
            is_shared_cache,
            max_response_body_size,
            default_freshness_s: AtomicU64::new(3600),
        }
    }

    /// Current fallback freshness lifetime used when a response carries no
    /// explicit `max-age`/`s-maxage`/`Expires`.
    pub fn default_freshness_s(&self) -> u64 {
        self.default_freshness_s.load(Ordering::Relaxed)
    }

    /// Updates the fallback freshness lifetime.
    pub fn set_default_freshness_s(&self, value: u64) {
        self.default_freshness_s.store(value, Ordering::Relaxed);
    }

    /// §4.4.1 — whether `request` is even eligible to be served from or
    /// stored into the cache, independent of any particular entry.
    pub fn is_servable_from_cache(&self, request: &request::Parts) -> bool {
        if request.method != http::Method::GET {
            return false;
        }
        let req_cc = CacheControlDirectives::parse_from_headers(&request.headers);
        if req_cc.no_cache || req_cc.no_store {
            return false;
        }
        if req_cc.max_age == Some(0) {
            return false;
        }
        if request.headers.contains_key(http::header::RANGE) {
            return false;
        }
        true
    }

    /// §4.4.2 — whether a previously stored `entry` may be served for
    /// `request` right now, without revalidation.
    pub fn is_cached_response_usable(
        &self,
        request: &request::Parts,
        entry: &CacheEntry,
        now_s: i64,
    ) -> bool {
        let req_cc = CacheControlDirectives::parse_from_headers(&request.headers);
        let resp_cc = entry.directives();
        let age = entry.current_age(now_s);
        let lifetime = self.freshness_lifetime(entry) as i64;

        let revalidate = resp_cc.must_revalidate
            || (self.is_shared_cache && resp_cc.proxy_revalidate);

        if !revalidate {
            if let Some(max_stale) = req_cc.max_stale {
                return lifetime + saturating_i64_from_u64(max_stale) > age;
            }
        }
        if let Some(min_fresh) = req_cc.min_fresh {
            return lifetime - saturating_i64_from_u64(min_fresh) > age;
        }
        if let Some(max_age) = req_cc.max_age {
            return age < saturating_i64_from_u64(max_age);
        }
        lifetime > age
    }

    /// §4.4.3 — freshness lifetime in seconds for a stored `entry`.
    pub fn freshness_lifetime(&self, entry: &CacheEntry) -> u64 {
        let resp_cc = entry.directives();

        if self.is_shared_cache {
            if let Some(s_maxage) = resp_cc.s_max_age {
                if s_maxage > 0 {
                    return s_maxage;
                }
            }
        }
        if let Some(max_age) = resp_cc.max_age {
            if max_age > 0 {
                return max_age;
            }
        }
        if let (Some(expires_s), Some(date_s)) = (
            http_date_seconds(entry.headers(), http::header::EXPIRES),
            http_date_seconds(entry.headers(), http::header::DATE),
        ) {
            if expires_s > 0 {
                return (expires_s - date_s).max(0) as u64;
            }
        }
        self.default_freshness_s()
    }

    /// §4.4.4 — whether `response` (for `request`) may be stored at all.
    pub fn is_response_cacheable(
        &self,
        request: &request::Parts,
        status: StatusCode,
        response_headers: &HeaderMap,
        content_length: Option<u64>,
    ) -> bool {
        if !self.is_servable_from_cache(request) {
            return false;
        }
        if !HEURISTICALLY_CACHEABLE_STATUSES.contains(&status.as_u16()) {
            return false;
        }

        let resp_cc = CacheControlDirectives::parse_from_headers(response_headers);
        if resp_cc.private || resp_cc.no_store {
            return false;
        }

        if self.is_shared_cache
            && request.headers.contains_key(http::header::AUTHORIZATION)
        {
            let reauthorized =
                resp_cc.public && resp_cc.s_max_age.is_some_and(|s| s > 0);
            if !reauthorized {
                return false;
            }
        }

        if response_headers.contains_key(http::header::VARY) {
            return false;
        }

        let Some(date_s) = http_date_seconds(response_headers, http::header::DATE)
        else {
            return false;
        };
        if date_s < 0 {
            return false;
        }

        if let Some(len) = content_length {
            if len > self.max_response_body_size {
                return false;
            }
        }

        let expires_in_future = http_date_seconds(
            response_headers,
            http::header::EXPIRES,
        )
        .is_some_and(|expires_s| expires_s > date_s);

        resp_cc.s_max_age.is_some_and(|v| v > 0)
            || resp_cc.max_age.is_some_and(|v| v > 0)
            || resp_cc.public
            || expires_in_future
    }

    /// §4.4.5 — default policy: always allow serving a stale entry when
    /// revalidation elicits a server error. The default does not consult
    /// `stale-if-error` on the entry (documented quirk, see DESIGN.md).
    pub fn can_serve_stale_response_if_error(&self, _entry: &CacheEntry) -> bool {
        true
    }
}

fn saturating_i64_from_u64(value: u64) -> i64 {
    value.min(i64::MAX as u64) as i64
}
