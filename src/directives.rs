//! Cache-Control directive parsing (C1).
//!
//! Tokenizes a single `Cache-Control` header value into a
//! [`CacheControlDirectives`] record. Grounded on the tokenizing style of
//! `kornelski/rusty-http-cache-semantics`'s `parse_cache_control` (split on
//! `,`, then on the first `=`, trim whitespace and surrounding quotes), but
//! this implementation keeps last-wins semantics for duplicate directives
//! and isolates a malformed numeric argument to that one directive instead
//! of invalidating the whole header.

use http::{HeaderMap, HeaderValue};

/// Parsed `Cache-Control` directives from a single header value (or set of
/// header values — multiple `Cache-Control` header lines are folded
/// together the same way `HeaderMap::get_all` would be).
///
/// Numeric fields use `None` as the "unset" sentinel described in the spec
/// (conceptually absent; never negative once parsed). Flags default to
/// `false`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheControlDirectives {
    /// `max-age` seconds.
    pub max_age: Option<u64>,
    /// `s-maxage` seconds.
    pub s_max_age: Option<u64>,
    /// `max-stale` seconds. Present-but-valueless (`max-stale` with no `=`)
    /// is represented as `Some(u64::MAX)`, meaning "any age".
    pub max_stale: Option<u64>,
    /// `min-fresh` seconds.
    pub min_fresh: Option<u64>,
    /// `stale-while-revalidate` seconds.
    pub stale_while_revalidate: Option<u64>,
    /// `stale-if-error` seconds.
    pub stale_if_error: Option<u64>,
    /// `no-cache` flag.
    pub no_cache: bool,
    /// `no-store` flag.
    pub no_store: bool,
    /// `must-revalidate` flag.
    pub must_revalidate: bool,
    /// `proxy-revalidate` flag.
    pub proxy_revalidate: bool,
    /// `no-transform` flag.
    pub no_transform: bool,
    /// `public` flag.
    pub public: bool,
    /// `private` flag.
    pub private: bool,
}

impl CacheControlDirectives {
    /// Parses the `Cache-Control` header(s), if any, out of a header map.
    /// An absent header yields all-default directives.
    pub fn parse_from_headers(headers: &HeaderMap) -> Self {
        let mut directives = Self::default();
        for value in headers.get_all(http::header::CACHE_CONTROL) {
            directives.apply(value);
        }
        directives
    }

    /// Parses a single `Cache-Control` header value, merging into `self`
    /// with last-wins semantics for duplicate directive names.
    fn apply(&mut self, value: &HeaderValue) {
        let Ok(value) = value.to_str() else { return };
        for part in value.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let mut kv = part.splitn(2, '=');
            let name = kv.next().unwrap_or_default().trim();
            if name.is_empty() {
                continue;
            }
            let raw_value = kv.next().map(|v| v.trim().trim_matches('"'));
            self.apply_directive(name, raw_value);
        }
    }

    fn apply_directive(&mut self, name: &str, raw_value: Option<&str>) {
        // Directive names are compared case-insensitively; unrecognized
        // directives are ignored outright.
        match name.to_ascii_lowercase().as_str() {
            "max-age" => self.max_age = parse_seconds(name, raw_value),
            "s-maxage" => self.s_max_age = parse_seconds(name, raw_value),
            "max-stale" => {
                self.max_stale = Some(match raw_value {
                    None => u64::MAX,
                    Some(v) => v.parse().unwrap_or_else(|_| {
                        log::trace!("ignoring malformed max-stale directive value: {v:?}");
                        u64::MAX
                    }),
                })
            }
            "min-fresh" => self.min_fresh = parse_seconds(name, raw_value),
            "stale-while-revalidate" => {
                self.stale_while_revalidate = parse_seconds(name, raw_value)
            }
            "stale-if-error" => self.stale_if_error = parse_seconds(name, raw_value),
            "no-cache" => self.no_cache = true,
            "no-store" => self.no_store = true,
            "must-revalidate" => self.must_revalidate = true,
            "proxy-revalidate" => self.proxy_revalidate = true,
            "no-transform" => self.no_transform = true,
            "public" => self.public = true,
            "private" => self.private = true,
            _ => {}
        }
    }
}

/// Parses a non-negative integer directive argument. A malformed argument
/// (missing, non-numeric, or negative) leaves the directive unset rather
/// than failing the whole header; a present-but-unparseable value is traced
/// so the failure is at least observable.
fn parse_seconds(name: &str, raw_value: Option<&str>) -> Option<u64> {
    let raw_value = raw_value?;
    match raw_value.parse::<u64>() {
        Ok(value) => Some(value),
        Err(_) => {
            log::trace!("ignoring malformed {name} directive value: {raw_value:?}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers_with_cache_control(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            http::header::CACHE_CONTROL,
            HeaderValue::from_str(value).unwrap(),
        );
        headers
    }

    #[test]
    fn absent_header_is_all_default() {
        let directives =
            CacheControlDirectives::parse_from_headers(&HeaderMap::new());
        assert_eq!(directives, CacheControlDirectives::default());
    }

    #[test]
    fn parses_numeric_and_flag_directives() {
        let headers = headers_with_cache_control(
            "max-age=3600, must-revalidate, no-transform",
        );
        let directives = CacheControlDirectives::parse_from_headers(&headers);
        assert_eq!(directives.max_age, Some(3600));
        assert!(directives.must_revalidate);
        assert!(directives.no_transform);
        assert!(!directives.no_cache);
    }

    #[test]
    fn is_case_insensitive_and_whitespace_tolerant() {
        let headers =
            headers_with_cache_control("  MAX-AGE = 10 ,NO-CACHE  ");
        let directives = CacheControlDirectives::parse_from_headers(&headers);
        assert_eq!(directives.max_age, Some(10));
        assert!(directives.no_cache);
    }

    #[test]
    fn duplicate_directive_is_last_wins() {
        let headers = headers_with_cache_control("max-age=10, max-age=20");
        let directives = CacheControlDirectives::parse_from_headers(&headers);
        assert_eq!(directives.max_age, Some(20));
    }

    #[test]
    fn malformed_numeric_argument_invalidates_only_that_directive() {
        let headers =
            headers_with_cache_control("max-age=not-a-number, no-store");
        let directives = CacheControlDirectives::parse_from_headers(&headers);
        assert_eq!(directives.max_age, None);
        assert!(directives.no_store);
    }

    #[test]
    fn unrecognized_directive_is_ignored() {
        let headers = headers_with_cache_control("immutable, max-age=5");
        let directives = CacheControlDirectives::parse_from_headers(&headers);
        assert_eq!(directives.max_age, Some(5));
    }

    #[test]
    fn max_stale_without_value_means_any_age() {
        let headers = headers_with_cache_control("max-stale");
        let directives = CacheControlDirectives::parse_from_headers(&headers);
        assert_eq!(directives.max_stale, Some(u64::MAX));
    }
}
