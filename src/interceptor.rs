//! Interceptor (C5) — the per-request decision state machine.
//!
//! This is the component that ties C3/C4 and a [`ConditionalRequestStrategy`]
//! together into the single `intercept` entry point. The decision DAG mirrors
//! the teacher's `HttpCache::run`/`conditional_fetch`/`remote_fetch` shape
//! (lookup, freshness check, conditional revalidation, store-on-miss), but
//! the branches themselves follow this crate's own four-predicate policy
//! rather than the teacher's `CacheMode`-driven dispatch.

use bytes::Bytes;
use http::{request, HeaderMap, StatusCode};

use crate::entry::{CacheEntry, CachedResponseView};
use crate::policy::CachingPolicy;
use crate::store::{drain_body_unbounded, BufferedBody, HttpResponseCache, ResponseBody};
use crate::strategy::ConditionalRequestStrategy;

/// An origin response as handed back by an [`Executor`], before the
/// interceptor has decided whether to buffer or cache it.
pub struct RawResponse {
    /// The response status.
    pub status: StatusCode,
    /// The response headers.
    pub headers: HeaderMap,
    /// A chunked source of body bytes (see [`ResponseBody`]).
    pub body: Box<dyn ResponseBody>,
}

/// What `intercept` hands back to the caller.
#[derive(Debug, Clone)]
pub enum InterceptedResponse {
    /// Served from, or just written into, the cache. Carries a read-through
    /// view with `Age` computed for the moment of serving.
    Cached(CachedResponseView),
    /// Not cached (ineligible, or the store rejected it): the origin
    /// response, fully buffered, returned as received.
    Passthrough {
        /// The response status.
        status: StatusCode,
        /// The response headers.
        headers: HeaderMap,
        /// The fully drained response body.
        body: Bytes,
    },
}

impl InterceptedResponse {
    /// The response status, regardless of whether it was served from cache.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Cached(view) => view.status,
            Self::Passthrough { status, .. } => *status,
        }
    }

    /// The response headers, regardless of whether it was served from
    /// cache (a cached view's headers already carry the recomputed `Age`).
    pub fn headers(&self) -> &HeaderMap {
        match self {
            Self::Cached(view) => &view.headers,
            Self::Passthrough { headers, .. } => headers,
        }
    }

    /// The response body.
    pub fn body(&self) -> &Bytes {
        match self {
            Self::Cached(view) => &view.body,
            Self::Passthrough { body, .. } => body,
        }
    }

    /// Whether this response was served from the cache rather than the
    /// origin (a direct hit, a refreshed-by-304 entry, or a stale-if-error
    /// fallback all count).
    pub fn was_cached(&self) -> bool {
        matches!(self, Self::Cached(_))
    }
}

/// The sole suspension point in the decision flow: sends a request upstream
/// and returns its response. Implemented by the host application over
/// whatever HTTP client it already has.
#[async_trait::async_trait]
pub trait Executor: Send + Sync {
    /// The executor's own transport error type, propagated through
    /// [`Interceptor::intercept`] unchanged — the core never wraps it.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Sends `request` (with `body`) and returns the origin's response.
    async fn execute(
        &self,
        request: &request::Parts,
        body: Bytes,
    ) -> std::result::Result<RawResponse, Self::Error>;
}

/// Composes a store, a policy, and a conditional-request strategy into the
/// `intercept` entry point (§4.5 of the design).
///
/// An `Interceptor` is typically held behind `Arc` and shared across the
/// many concurrent requests it serves; nothing about it requires exclusive
/// access (the store and policy are themselves safe for concurrent use).
pub struct Interceptor<C, S> {
    store: C,
    policy: CachingPolicy,
    strategy: S,
}

impl<C, S> Interceptor<C, S>
where
    C: HttpResponseCache,
    S: ConditionalRequestStrategy,
{
    /// Builds an interceptor from its three collaborators.
    pub fn new(store: C, policy: CachingPolicy, strategy: S) -> Self {
        Self { store, policy, strategy }
    }

    /// The underlying store, for direct inspection (`evict`, `clear`) by a
    /// host application.
    pub fn store(&self) -> &C {
        &self.store
    }

    /// The policy driving this interceptor's decisions.
    pub fn policy(&self) -> &CachingPolicy {
        &self.policy
    }

    /// Runs `request` through the full decision flow, calling `executor`
    /// at most once.
    pub async fn intercept<E>(
        &self,
        request: request::Parts,
        body: Bytes,
        executor: &E,
    ) -> std::result::Result<InterceptedResponse, E::Error>
    where
        E: Executor,
    {
        if self.policy.is_servable_from_cache(&request) {
            let entry = self.store.get(&request).await;
            let now = now_s();
            if let Some(entry) = entry {
                if self.policy.is_cached_response_usable(&request, &entry, now) {
                    log::debug!("cache hit: {}", request.uri);
                    return Ok(InterceptedResponse::Cached(entry.view(now)));
                }
                if self.strategy.can_revalidate(&entry) {
                    let cond = self.strategy.create_conditional_request(&request, &entry);
                    return self
                        .execute_and_cache_conditional(cond, entry, body, executor)
                        .await;
                }
                log::debug!(
                    "cache entry stale and not revalidatable: {}",
                    request.uri
                );
            } else {
                log::debug!("cache miss: {}", request.uri);
            }
        }
        self.execute_and_cache(request, body, executor).await
    }

    /// §4.5 (B) — sends the conditional request and either refreshes the
    /// entry on a 304, stores a fresh representation, falls back to the
    /// stale entry on a server error, or passes the response through.
    async fn execute_and_cache_conditional<E>(
        &self,
        cond: request::Parts,
        entry: CacheEntry,
        body: Bytes,
        executor: &E,
    ) -> std::result::Result<InterceptedResponse, E::Error>
    where
        E: Executor,
    {
        let request_time_s = now_s();
        let raw = executor.execute(&cond, body).await?;
        let response_time_s = now_s();

        if raw.status == StatusCode::NOT_MODIFIED {
            // A 304 carries no representation of its own: RFC 7232 §4.1 has
            // the cache keep the stored body/status and only update headers
            // from the validation response. Storing the 304 verbatim would
            // overwrite the cached body with an empty one under the same key.
            let mut raw_body = raw.body;
            if let Err(err) = drain_body_unbounded(&mut *raw_body).await {
                log::warn!("failed to read revalidation body for {}: {err}", cond.uri);
            }

            let merged_headers = merge_revalidation_headers(entry.headers(), &raw.headers);
            let mut cached_body = BufferedBody::new(entry.body().clone());
            return Ok(
                match self
                    .store
                    .put(&cond, entry.status(), merged_headers, &mut cached_body, request_time_s, response_time_s)
                    .await
                {
                    Ok(refreshed) => {
                        log::debug!("revalidation refreshed entry: {}", cond.uri);
                        InterceptedResponse::Cached(refreshed.view(response_time_s))
                    }
                    Err(err) => {
                        log::warn!("failed to refresh entry after revalidation for {}: {err}", cond.uri);
                        InterceptedResponse::Cached(entry.view(response_time_s))
                    }
                },
            );
        }

        Ok(self
            .finish_response(&cond, raw, request_time_s, response_time_s, Some(&entry))
            .await)
    }

    /// §4.5 (C) — sends the request unconditionally and stores the
    /// response if the policy allows it.
    async fn execute_and_cache<E>(
        &self,
        request: request::Parts,
        body: Bytes,
        executor: &E,
    ) -> std::result::Result<InterceptedResponse, E::Error>
    where
        E: Executor,
    {
        let request_time_s = now_s();
        let raw = executor.execute(&request, body).await?;
        let response_time_s = now_s();
        Ok(self
            .finish_response(&request, raw, request_time_s, response_time_s, None)
            .await)
    }

    /// Shared tail of both execute paths: decide cacheability, store if
    /// eligible, fall back to a stale entry on a server error if one was
    /// supplied, otherwise return the buffered response as-is.
    async fn finish_response(
        &self,
        request_for_key: &request::Parts,
        raw: RawResponse,
        request_time_s: i64,
        response_time_s: i64,
        stale_fallback: Option<&CacheEntry>,
    ) -> InterceptedResponse {
        let RawResponse { status, headers, mut body } = raw;
        let content_length = content_length(&headers);

        if self
            .policy
            .is_response_cacheable(request_for_key, status, &headers, content_length)
        {
            let drained = match drain_body_unbounded(&mut *body).await {
                Ok(bytes) => bytes,
                Err(err) => {
                    log::warn!(
                        "failed to read response body for {}: {err}",
                        request_for_key.uri
                    );
                    return InterceptedResponse::Passthrough { status, headers, body: Bytes::new() };
                }
            };
            let mut buffered = BufferedBody::new(drained.clone());
            match self
                .store
                .put(request_for_key, status, headers.clone(), &mut buffered, request_time_s, response_time_s)
                .await
            {
                Ok(stored) => {
                    log::debug!("stored new entry: {}", request_for_key.uri);
                    return InterceptedResponse::Cached(stored.view(response_time_s));
                }
                Err(err) => {
                    log::warn!(
                        "cache store failed for {}, returning origin response: {err}",
                        request_for_key.uri
                    );
                    return InterceptedResponse::Passthrough { status, headers, body: drained };
                }
            }
        }

        if status.is_server_error() {
            if let Some(entry) = stale_fallback {
                if self.policy.can_serve_stale_response_if_error(entry) {
                    log::debug!(
                        "serving stale entry after error response: {}",
                        request_for_key.uri
                    );
                    return InterceptedResponse::Cached(entry.view(response_time_s));
                }
            }
        }

        let drained = drain_body_unbounded(&mut *body).await.unwrap_or_else(|err| {
            log::warn!(
                "failed to read response body for {}: {err}",
                request_for_key.uri
            );
            Bytes::new()
        });
        InterceptedResponse::Passthrough { status, headers, body: drained }
    }
}

/// Applies RFC 7232 §4.1's validation-response merge: headers named in
/// `fresh` replace the corresponding entries in `stored`; everything else
/// from `stored` is kept as-is.
fn merge_revalidation_headers(stored: &HeaderMap, fresh: &HeaderMap) -> HeaderMap {
    let mut merged = stored.clone();
    for name in fresh.keys() {
        merged.remove(name);
        for value in fresh.get_all(name) {
            merged.append(name.clone(), value.clone());
        }
    }
    merged
}

fn content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(http::header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}

fn now_s() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::CachingPolicy;
    use crate::store::InMemoryHttpCache;
    use crate::strategy::EtagLastModifiedStrategy;
    use http::{HeaderValue, Request};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct ScriptedExecutor {
        responses: Mutex<VecDeque<(StatusCode, HeaderMap, Bytes)>>,
        calls: Mutex<u32>,
    }

    impl ScriptedExecutor {
        fn new(responses: Vec<(StatusCode, HeaderMap, Bytes)>) -> Self {
            Self {
                responses: Mutex::new(responses.into_iter().collect()),
                calls: Mutex::new(0),
            }
        }

        fn call_count(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait::async_trait]
    impl Executor for ScriptedExecutor {
        type Error = std::convert::Infallible;

        async fn execute(
            &self,
            _request: &request::Parts,
            _body: Bytes,
        ) -> std::result::Result<RawResponse, Self::Error> {
            *self.calls.lock().unwrap() += 1;
            let (status, headers, body) =
                self.responses.lock().unwrap().pop_front().expect("scripted response");
            Ok(RawResponse { status, headers, body: Box::new(BufferedBody::new(body)) })
        }
    }

    fn get_request() -> request::Parts {
        Request::builder()
            .method("GET")
            .uri("http://example.org/resource")
            .body(())
            .unwrap()
            .into_parts()
            .0
    }

    fn headers_with(pairs: &[(http::HeaderName, &str)]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (name, value) in pairs {
            headers.insert(name.clone(), HeaderValue::from_str(value).unwrap());
        }
        headers
    }

    #[tokio::test]
    async fn store_and_serve_second_request_without_executor() {
        let date = httpdate::fmt_http_date(std::time::SystemTime::now());
        let executor = ScriptedExecutor::new(vec![(
            StatusCode::OK,
            headers_with(&[
                (http::header::CACHE_CONTROL, "max-age=3600"),
                (http::header::DATE, date.as_str()),
            ]),
            Bytes::from_static(b"testbody"),
        )]);
        let interceptor = Interceptor::new(
            InMemoryHttpCache::new(1024),
            CachingPolicy::new(false, 1024),
            EtagLastModifiedStrategy,
        );

        let first = interceptor
            .intercept(get_request(), Bytes::new(), &executor)
            .await
            .unwrap();
        assert_eq!(first.body().as_ref(), b"testbody");
        assert_eq!(executor.call_count(), 1);

        let second = interceptor
            .intercept(get_request(), Bytes::new(), &executor)
            .await
            .unwrap();
        assert_eq!(second.body().as_ref(), b"testbody");
        assert!(second.was_cached());
        assert_eq!(executor.call_count(), 1);
        assert!(second.headers().contains_key(http::header::AGE));
    }

    #[tokio::test]
    async fn stale_entry_triggers_conditional_revalidation_and_304_refreshes() {
        let store = InMemoryHttpCache::new(1024);
        let req = get_request();
        let mut seed_body = BufferedBody::new(&b"v1body"[..]);
        store
            .put(
                &req,
                StatusCode::OK,
                headers_with(&[
                    (http::header::CACHE_CONTROL, "max-age=100"),
                    (http::header::ETAG, "\"v1\""),
                ]),
                &mut seed_body,
                0,
                0,
            )
            .await
            .unwrap();

        let executor = ScriptedExecutor::new(vec![(
            StatusCode::NOT_MODIFIED,
            headers_with(&[(http::header::CACHE_CONTROL, "max-age=100")]),
            Bytes::new(),
        )]);
        let interceptor =
            Interceptor::new(store, CachingPolicy::new(false, 1024), EtagLastModifiedStrategy);

        let response = interceptor.intercept(req, Bytes::new(), &executor).await.unwrap();
        assert!(response.was_cached());
        assert_eq!(executor.call_count(), 1);
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.body().as_ref(), b"v1body");
    }

    #[tokio::test]
    async fn stale_entry_falls_back_on_server_error() {
        let store = InMemoryHttpCache::new(1024);
        let req = get_request();
        let mut seed_body = BufferedBody::new(&b"staledata"[..]);
        store
            .put(
                &req,
                StatusCode::OK,
                headers_with(&[
                    (http::header::CACHE_CONTROL, "max-age=100"),
                    (http::header::ETAG, "\"v1\""),
                ]),
                &mut seed_body,
                0,
                0,
            )
            .await
            .unwrap();

        let executor =
            ScriptedExecutor::new(vec![(StatusCode::INTERNAL_SERVER_ERROR, HeaderMap::new(), Bytes::new())]);
        let interceptor =
            Interceptor::new(store, CachingPolicy::new(false, 1024), EtagLastModifiedStrategy);

        let response = interceptor.intercept(req, Bytes::new(), &executor).await.unwrap();
        assert!(response.was_cached());
        assert_eq!(response.body().as_ref(), b"staledata");
    }

    #[tokio::test]
    async fn no_store_request_is_never_served_from_or_written_to_cache() {
        let store = InMemoryHttpCache::new(1024);
        let req = get_request();
        let mut seed_body = BufferedBody::new(&b"cached"[..]);
        store
            .put(
                &req,
                StatusCode::OK,
                headers_with(&[(http::header::CACHE_CONTROL, "max-age=3600")]),
                &mut seed_body,
                0,
                0,
            )
            .await
            .unwrap();

        let mut no_store_request = get_request();
        no_store_request
            .headers
            .insert(http::header::CACHE_CONTROL, HeaderValue::from_static("no-store"));

        let executor = ScriptedExecutor::new(vec![(
            StatusCode::OK,
            HeaderMap::new(),
            Bytes::from_static(b"freshbody"),
        )]);
        let interceptor =
            Interceptor::new(store, CachingPolicy::new(false, 1024), EtagLastModifiedStrategy);

        let response = interceptor
            .intercept(no_store_request, Bytes::new(), &executor)
            .await
            .unwrap();
        assert_eq!(executor.call_count(), 1);
        assert_eq!(response.body().as_ref(), b"freshbody");
        assert!(!response.was_cached());
    }

    #[tokio::test]
    async fn body_too_large_falls_back_to_origin_response_untouched() {
        let date = httpdate::fmt_http_date(std::time::SystemTime::now());
        let executor = ScriptedExecutor::new(vec![(
            StatusCode::OK,
            headers_with(&[
                (http::header::CACHE_CONTROL, "max-age=60"),
                (http::header::DATE, date.as_str()),
            ]),
            Bytes::from(vec![b'x'; 2000]),
        )]);
        let interceptor = Interceptor::new(
            InMemoryHttpCache::new(1024),
            CachingPolicy::new(false, 1024),
            EtagLastModifiedStrategy,
        );

        let response = interceptor
            .intercept(get_request(), Bytes::new(), &executor)
            .await
            .unwrap();
        assert!(!response.was_cached());
        assert_eq!(response.body().len(), 2000);

        let second = interceptor
            .intercept(get_request(), Bytes::new(), &executor)
            .await
            .unwrap();
        assert_eq!(executor.call_count(), 2);
        assert!(!second.was_cached());
    }
}
