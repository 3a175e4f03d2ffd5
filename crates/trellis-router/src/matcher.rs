//! Request matching.
//!
//! [`Router::find_first_matching_route`] walks the tree in declaration order
//! and returns the first endpoint whose method, path shape and content type
//! all fit. Results for purely literal endpoints are cached by method,
//! content type and decoded segments; anything involving a capture is
//! recomputed on every request.

use std::collections::HashMap;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};

use tracing::{debug, trace};

use crate::capture::CaptureContext;
use crate::endpoint::Endpoint;
use crate::error::Result;
use crate::request::{normalize_content_type, percent_decode, Method, Params, Request};
use crate::tree::{EndpointId, PathPart, RouteInfo, RouteTree, Scope, RELATIVE_PATH};

/// Outcome of matching one request.
#[derive(Debug, Clone, PartialEq)]
pub enum RouteMatch {
    /// Method, path and content type all matched.
    Found {
        /// The endpoint.
        endpoint: EndpointId,
        /// Captured values.
        params: Params,
    },
    /// Method and path matched but no endpoint accepted the content type.
    /// Carries the first such endpoint.
    BadContentType {
        /// The closest endpoint.
        endpoint: EndpointId,
    },
    /// Nothing matched.
    NotFound,
}

impl RouteMatch {
    /// The endpoint involved, if any.
    #[must_use]
    pub const fn endpoint(&self) -> Option<EndpointId> {
        match self {
            Self::Found { endpoint, .. } | Self::BadContentType { endpoint } => Some(*endpoint),
            Self::NotFound => None,
        }
    }
}

/// Normalized request signature.
struct MatchInput<'a> {
    method: Method,
    content_type: Option<&'a str>,
    path: &'a str,
    segments: &'a [String],
}

/// Cache key. Segments are kept apart so `/a%2Fb` and `/a/b` never collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    method: Method,
    content_type: Option<String>,
    segments: Vec<String>,
}

enum Candidate {
    Full(Params),
    WrongContentType,
    Miss,
}

/// A route tree plus its match cache.
pub struct Router {
    tree: RouteTree,
    cache: RwLock<HashMap<CacheKey, RouteMatch>>,
    cache_enabled: bool,
    walks: AtomicUsize,
}

impl Router {
    /// Wraps a finished tree.
    #[must_use]
    pub fn new(tree: RouteTree) -> Self {
        Self {
            tree,
            cache: RwLock::new(HashMap::new()),
            cache_enabled: true,
            walks: AtomicUsize::new(0),
        }
    }

    /// Declares routes on a fresh tree and wraps it.
    pub fn build<F>(configure: F) -> Result<Self>
    where
        F: FnOnce(&mut Scope<'_>) -> Result<()>,
    {
        let mut tree = RouteTree::new();
        configure(&mut tree.root())?;
        Ok(Self::new(tree))
    }

    /// Enables or disables the match cache.
    #[must_use]
    pub const fn with_cache(mut self, enabled: bool) -> Self {
        self.cache_enabled = enabled;
        self
    }

    /// The route tree.
    #[must_use]
    pub const fn tree(&self) -> &RouteTree {
        &self.tree
    }

    /// Returns an endpoint by handle.
    #[must_use]
    pub fn endpoint(&self, id: EndpointId) -> &Endpoint {
        self.tree.endpoint(id)
    }

    /// Describes every endpoint.
    #[must_use]
    pub fn routes(&self) -> Vec<RouteInfo> {
        self.tree.routes()
    }

    /// Builds the concrete path of a named route.
    pub fn url_for(&self, name: &str, params: &Params) -> Result<String> {
        self.tree.url_for(name, params)
    }

    /// Number of full tree walks performed so far.
    #[must_use]
    pub fn walk_count(&self) -> usize {
        self.walks.load(Ordering::Relaxed)
    }

    /// Number of cached results.
    #[must_use]
    pub fn cache_len(&self) -> usize {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Matches a request by method, `Content-Type` header and path.
    #[must_use]
    pub fn match_request(&self, request: &Request) -> RouteMatch {
        let content_type = request.get_header("Content-Type");
        self.find_first_matching_route(request.method, content_type, &request.path)
    }

    /// Finds the first endpoint, in declaration order, fitting the request.
    ///
    /// `path` is the raw, percent-encoded path without a query string.
    #[must_use]
    pub fn find_first_matching_route(
        &self,
        method: Method,
        content_type: Option<&str>,
        path: &str,
    ) -> RouteMatch {
        let content_type = content_type.and_then(normalize_content_type);
        let trimmed = path.strip_prefix('/').unwrap_or(path);
        let segments = if trimmed.is_empty() {
            Vec::new()
        } else {
            trimmed
                .split('/')
                .map(|s| percent_decode(s, false))
                .collect::<Vec<_>>()
        };
        let decoded = format!("/{}", segments.join("/"));

        let key = CacheKey {
            method,
            content_type,
            segments,
        };
        if self.cache_enabled {
            let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(hit) = cache.get(&key) {
                trace!(
                    %method,
                    content_type = key.content_type.as_deref(),
                    path = %decoded,
                    "route cache hit"
                );
                return hit.clone();
            }
        }

        let input = MatchInput {
            method,
            content_type: key.content_type.as_deref(),
            path: &decoded,
            segments: &key.segments,
        };
        let result = self.walk(&input);

        let cacheable = result
            .endpoint()
            .is_some_and(|id| !self.tree.endpoint(id).is_dynamic());
        if self.cache_enabled && cacheable {
            trace!(
                %method,
                content_type = key.content_type.as_deref(),
                path = %decoded,
                "caching route match"
            );
            self.cache
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(key, result.clone());
        }
        result
    }

    fn walk(&self, input: &MatchInput<'_>) -> RouteMatch {
        self.walks.fetch_add(1, Ordering::Relaxed);
        let mut possible = None;

        let found = self.tree.walk_routes(|entry| {
            match try_endpoint(entry.endpoint, input) {
                Candidate::Full(params) => ControlFlow::Break(RouteMatch::Found {
                    endpoint: entry.endpoint.id(),
                    params,
                }),
                Candidate::WrongContentType => {
                    possible.get_or_insert(entry.endpoint.id());
                    ControlFlow::Continue(())
                }
                Candidate::Miss => ControlFlow::Continue(()),
            }
        });

        found.unwrap_or_else(|| match possible {
            Some(endpoint) => {
                debug!(
                    path = input.path,
                    content_type = input.content_type,
                    "content type rejected by every matching endpoint"
                );
                RouteMatch::BadContentType { endpoint }
            }
            None => RouteMatch::NotFound,
        })
    }
}

fn try_endpoint(endpoint: &Endpoint, input: &MatchInput<'_>) -> Candidate {
    if !endpoint.methods().contains(&input.method) {
        return Candidate::Miss;
    }

    let parts = endpoint.path_parts();
    let (declared, given) = (parts.len(), input.segments.len());
    let trailing_optional = matches!(parts.last(), Some(PathPart::Capture(c)) if c.is_optional());
    let shape_fits = declared == given
        || (endpoint.is_wild() && given > declared)
        || (trailing_optional && given + 1 == declared);
    if !shape_fits {
        return Candidate::Miss;
    }

    let mut params = Params::new();
    for (i, part) in parts.iter().enumerate() {
        let segment = input.segments.get(i);
        match part {
            PathPart::Literal(literal) => {
                if segment != Some(literal) {
                    return Candidate::Miss;
                }
            }
            PathPart::Capture(capture) => {
                let Some(segment) = segment else {
                    if capture.is_optional() {
                        continue;
                    }
                    return Candidate::Miss;
                };
                let value = capture.matches(&CaptureContext {
                    value: segment,
                    method: input.method,
                    path: input.path,
                    content_type: input.content_type,
                    params: &params,
                });
                match value {
                    Some(value) => params.insert(capture.name(), value),
                    None if capture.is_optional() => {}
                    None => return Candidate::Miss,
                }
            }
        }
    }

    if endpoint.is_wild() {
        let rest = input.segments.get(declared..).unwrap_or_default();
        params.insert(RELATIVE_PATH, rest.join("/"));
    }

    if input.method.is_bodyless() {
        return Candidate::Full(params);
    }
    match endpoint.content_types() {
        None => Candidate::Full(params),
        Some(accepted) => {
            let fits = input
                .content_type
                .is_some_and(|ct| accepted.iter().any(|m| m.matches(ct)));
            if fits {
                Candidate::Full(params)
            } else {
                Candidate::WrongContentType
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::*;
    use crate::capture::{Capture, ParamType};
    use crate::endpoint::EndpointOptions;

    fn router() -> Router {
        Router::build(|root| {
            root.endpoint("", "home")?;
            root.path("objects", |objects| {
                let id = Capture::typed("id", ParamType::Number).optional();
                objects.endpoint(&id, "objects.show")?;
                Ok(())
            })?;
            root.path("things", |things| {
                things.endpoint(Capture::new("id"), "things.show")?;
                Ok(())
            })?;
            root.endpoint("files", EndpointOptions::new("files").wild())?;
            Ok(())
        })
        .unwrap()
    }

    fn path_of(router: &Router, result: &RouteMatch) -> Option<String> {
        result
            .endpoint()
            .map(|id| router.endpoint(id).path().to_string())
    }

    #[test]
    fn test_root_path() {
        let router = router();
        let result = router.find_first_matching_route(Method::Get, None, "/");
        assert_eq!(path_of(&router, &result).as_deref(), Some("/"));
    }

    #[test]
    fn test_optional_trailing_capture() {
        let router = router();
        let with = router.find_first_matching_route(Method::Get, None, "/objects/1");
        match with {
            RouteMatch::Found { params, .. } => assert_eq!(params.get("id"), Some(&Value::from(1))),
            other => panic!("unexpected {other:?}"),
        }
        let without = router.find_first_matching_route(Method::Get, None, "/objects");
        match without {
            RouteMatch::Found { params, .. } => assert!(!params.contains("id")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_required_capture_rejects_missing_segment() {
        let router = router();
        assert_eq!(
            router.find_first_matching_route(Method::Get, None, "/things"),
            RouteMatch::NotFound
        );
        assert_eq!(
            router.find_first_matching_route(Method::Get, None, "/things/"),
            RouteMatch::NotFound
        );
    }

    #[test]
    fn test_segments_are_decoded() {
        let router = router();
        match router.find_first_matching_route(Method::Get, None, "/things/caf%C3%A9%2Fx") {
            RouteMatch::Found { params, .. } => assert_eq!(params.get_str("id"), Some("café/x")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_wild_endpoint() {
        let router = router();
        match router.find_first_matching_route(Method::Get, None, "/files/a/b/c") {
            RouteMatch::Found { params, .. } => {
                assert_eq!(params.get_str(RELATIVE_PATH), Some("a/b/c"));
            }
            other => panic!("unexpected {other:?}"),
        }
        match router.find_first_matching_route(Method::Get, None, "/files") {
            RouteMatch::Found { params, .. } => assert_eq!(params.get_str(RELATIVE_PATH), Some("")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_method_filter() {
        let router = router();
        assert_eq!(
            router.find_first_matching_route(Method::Delete, None, "/"),
            RouteMatch::NotFound
        );
    }

    #[test]
    fn test_static_routes_cached_dynamic_not() {
        let router = router();
        let first = router.find_first_matching_route(Method::Get, None, "/");
        let walks = router.walk_count();
        let second = router.find_first_matching_route(Method::Get, None, "/");
        assert_eq!(first, second);
        assert_eq!(router.walk_count(), walks);
        assert_eq!(router.cache_len(), 1);

        router.find_first_matching_route(Method::Get, None, "/things/1");
        router.find_first_matching_route(Method::Get, None, "/things/1");
        assert_eq!(router.walk_count(), walks + 2);
        assert_eq!(router.cache_len(), 1);
    }

    #[test]
    fn test_not_found_not_cached() {
        let router = router();
        router.find_first_matching_route(Method::Get, None, "/nope");
        assert_eq!(router.cache_len(), 0);
    }

    #[test]
    fn test_cache_can_be_disabled() {
        let router = router().with_cache(false);
        router.find_first_matching_route(Method::Get, None, "/");
        router.find_first_matching_route(Method::Get, None, "/");
        assert_eq!(router.walk_count(), 2);
        assert_eq!(router.cache_len(), 0);
    }
}
