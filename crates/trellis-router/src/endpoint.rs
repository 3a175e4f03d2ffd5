//! Terminal route nodes.
//!
//! An [`Endpoint`] is built once from [`EndpointOptions`] when the
//! declarative API registers a path, and never changes afterwards. Building
//! normalizes methods and content types and resolves the CORS policy.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use regex::Regex;

use crate::error::{Result, RouterError};
use crate::handler::HandlerRef;
use crate::middleware::Middleware;
use crate::query::QueryParam;
use crate::request::{normalize_content_type, Method};
use crate::tree::{render_path, EndpointId, PathPart, ScopeOptions};

/// Headers allowed by a CORS policy that does not list its own.
pub const DEFAULT_CORS_HEADERS: [&str; 4] = [
    "Accept",
    "Accept-Language",
    "Content-Language",
    "Content-Type",
];

/// Preflight cache lifetime, in seconds, when none is configured.
pub const DEFAULT_CORS_MAX_AGE: u64 = 86_400;

/// One accepted content type.
#[derive(Debug, Clone)]
pub enum ContentTypeMatcher {
    /// Lowercased MIME type without parameters.
    Exact(String),
    /// Regular expression tested against the normalized content type.
    Pattern(Regex),
}

impl ContentTypeMatcher {
    /// Creates a literal matcher, stripping parameters and lowercasing.
    #[must_use]
    pub fn exact(raw: &str) -> Self {
        Self::Exact(normalize_content_type(raw).unwrap_or_default())
    }

    /// Creates a matcher from a regular expression source.
    pub fn pattern(pattern: &str) -> Result<Self> {
        Regex::new(pattern)
            .map(Self::Pattern)
            .map_err(|source| RouterError::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            })
    }

    /// Tests a normalized content type.
    #[must_use]
    pub fn matches(&self, content_type: &str) -> bool {
        match self {
            Self::Exact(expected) => expected == content_type,
            Self::Pattern(re) => re.is_match(content_type),
        }
    }

    fn is_any(&self) -> bool {
        matches!(self, Self::Exact(s) if s == "*")
    }

    /// Unquoted form used in route listings.
    #[must_use]
    pub fn as_listing(&self) -> String {
        match self {
            Self::Exact(s) => s.clone(),
            Self::Pattern(re) => format!("/{}/", re.as_str()),
        }
    }
}

impl fmt::Display for ContentTypeMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(s) => write!(f, "\"{s}\""),
            Self::Pattern(re) => write!(f, "/{}/", re.as_str()),
        }
    }
}

impl From<&str> for ContentTypeMatcher {
    fn from(raw: &str) -> Self {
        Self::exact(raw)
    }
}

impl From<Regex> for ContentTypeMatcher {
    fn from(re: Regex) -> Self {
        Self::Pattern(re)
    }
}

/// CORS settings as declared; unset fields fall back to defaults.
#[derive(Debug, Clone, Default)]
pub struct CorsOptions {
    /// `Access-Control-Allow-Origin`, default `*`.
    pub allow_origin: Option<String>,
    /// `Access-Control-Allow-Methods`, default: the endpoint's methods.
    pub allow_methods: Option<Vec<Method>>,
    /// `Access-Control-Allow-Headers`, default [`DEFAULT_CORS_HEADERS`].
    pub allow_headers: Option<Vec<String>>,
    /// `Access-Control-Max-Age`, default [`DEFAULT_CORS_MAX_AGE`].
    pub max_age: Option<u64>,
}

impl CorsOptions {
    /// Sets the allowed origin.
    #[must_use]
    pub fn allow_origin(mut self, origin: impl Into<String>) -> Self {
        self.allow_origin = Some(origin.into());
        self
    }

    /// Sets the allowed methods.
    #[must_use]
    pub fn allow_methods(mut self, methods: impl IntoIterator<Item = Method>) -> Self {
        self.allow_methods = Some(methods.into_iter().collect());
        self
    }

    /// Sets the allowed headers.
    #[must_use]
    pub fn allow_headers<S: Into<String>>(mut self, headers: impl IntoIterator<Item = S>) -> Self {
        self.allow_headers = Some(headers.into_iter().map(Into::into).collect());
        self
    }

    /// Sets the preflight max age in seconds.
    #[must_use]
    pub const fn max_age(mut self, seconds: u64) -> Self {
        self.max_age = Some(seconds);
        self
    }
}

/// Declared CORS setting.
#[derive(Debug, Clone)]
pub enum Cors {
    /// No CORS; OPTIONS requests are refused.
    Off,
    /// CORS enabled with the given options.
    On(CorsOptions),
}

impl From<bool> for Cors {
    fn from(enabled: bool) -> Self {
        if enabled {
            Self::On(CorsOptions::default())
        } else {
            Self::Off
        }
    }
}

impl From<CorsOptions> for Cors {
    fn from(options: CorsOptions) -> Self {
        Self::On(options)
    }
}

/// A fully resolved CORS policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorsPolicy {
    /// Allowed origin.
    pub allow_origin: String,
    /// Allowed methods.
    pub allow_methods: Vec<Method>,
    /// Allowed headers.
    pub allow_headers: Vec<String>,
    /// Preflight max age in seconds.
    pub max_age: Option<u64>,
}

impl CorsPolicy {
    fn resolve(options: &CorsOptions, methods: &BTreeSet<Method>) -> Self {
        Self {
            allow_origin: options.allow_origin.clone().unwrap_or_else(|| "*".to_string()),
            allow_methods: options
                .allow_methods
                .clone()
                .unwrap_or_else(|| methods.iter().copied().collect()),
            allow_headers: options.allow_headers.clone().unwrap_or_else(|| {
                DEFAULT_CORS_HEADERS
                    .iter()
                    .map(|h| (*h).to_string())
                    .collect()
            }),
            max_age: Some(options.max_age.unwrap_or(DEFAULT_CORS_MAX_AGE)),
        }
    }

    /// The response headers this policy emits.
    #[must_use]
    pub fn headers(&self) -> Vec<(String, String)> {
        let methods = self
            .allow_methods
            .iter()
            .map(Method::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        let mut headers = vec![
            (
                "Access-Control-Allow-Origin".to_string(),
                self.allow_origin.clone(),
            ),
            ("Access-Control-Allow-Methods".to_string(), methods),
            (
                "Access-Control-Allow-Headers".to_string(),
                self.allow_headers.join(", "),
            ),
        ];
        if let Some(max_age) = self.max_age {
            headers.push(("Access-Control-Max-Age".to_string(), max_age.to_string()));
        }
        headers
    }
}

/// Options accepted by `Scope::endpoint`.
///
/// A bare string converts into options with only the handler set.
#[derive(Clone, Default)]
pub struct EndpointOptions {
    /// Route name for reverse URL lookup.
    pub name: Option<String>,
    /// HTTP verbs; `*` expands to every verb. Defaults to `GET`.
    pub methods: Option<Vec<String>>,
    /// Accepted content types; `None` or a `*` entry accepts anything.
    pub content_type: Option<Vec<ContentTypeMatcher>>,
    /// The handler.
    pub handler: Option<HandlerRef>,
    /// Path string override for listings.
    pub path: Option<String>,
    /// Declared query parameters.
    pub query_params: BTreeMap<String, QueryParam>,
    /// Endpoint middleware, run after global middleware.
    pub middleware: Vec<Arc<dyn Middleware>>,
    /// CORS setting.
    pub cors: Option<Cors>,
    /// Success status code, default 200.
    pub status: Option<u16>,
    /// Consume all trailing segments into `_relativePath`.
    pub wild: bool,
}

impl EndpointOptions {
    /// Creates options for the given handler.
    pub fn new(handler: impl Into<HandlerRef>) -> Self {
        Self {
            handler: Some(handler.into()),
            ..Self::default()
        }
    }

    /// Sets the route name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the methods.
    #[must_use]
    pub fn methods<S: Into<String>>(mut self, methods: impl IntoIterator<Item = S>) -> Self {
        self.methods = Some(methods.into_iter().map(Into::into).collect());
        self
    }

    /// Adds an accepted content type.
    #[must_use]
    pub fn content_type(mut self, matcher: impl Into<ContentTypeMatcher>) -> Self {
        self.content_type
            .get_or_insert_with(Vec::new)
            .push(matcher.into());
        self
    }

    /// Overrides the listed path.
    #[must_use]
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Declares a query parameter.
    #[must_use]
    pub fn query_param(mut self, name: impl Into<String>, param: QueryParam) -> Self {
        self.query_params.insert(name.into(), param);
        self
    }

    /// Appends endpoint middleware.
    #[must_use]
    pub fn middleware(mut self, mw: impl Middleware + 'static) -> Self {
        self.middleware.push(Arc::new(mw));
        self
    }

    /// Sets CORS.
    #[must_use]
    pub fn cors(mut self, cors: impl Into<Cors>) -> Self {
        self.cors = Some(cors.into());
        self
    }

    /// Sets the success status code.
    #[must_use]
    pub const fn status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Makes the endpoint consume all trailing segments.
    #[must_use]
    pub const fn wild(mut self) -> Self {
        self.wild = true;
        self
    }
}

impl From<&str> for EndpointOptions {
    fn from(handler: &str) -> Self {
        Self::new(handler)
    }
}

impl From<String> for EndpointOptions {
    fn from(handler: String) -> Self {
        Self::new(handler)
    }
}

impl From<HandlerRef> for EndpointOptions {
    fn from(handler: HandlerRef) -> Self {
        Self::new(handler)
    }
}

/// A terminal route node.
#[derive(Clone)]
pub struct Endpoint {
    id: EndpointId,
    name: Option<String>,
    methods: BTreeSet<Method>,
    content_type: Option<Vec<ContentTypeMatcher>>,
    cors: Option<CorsPolicy>,
    path: String,
    path_parts: Vec<PathPart>,
    handler: HandlerRef,
    query_params: BTreeMap<String, QueryParam>,
    middleware: Vec<Arc<dyn Middleware>>,
    status: u16,
    is_dynamic: bool,
    wild: bool,
}

impl Endpoint {
    /// Builds an endpoint, applying scope defaults under the options.
    pub(crate) fn build(
        id: EndpointId,
        options: EndpointOptions,
        defaults: &ScopeOptions,
        path_parts: Vec<PathPart>,
        is_dynamic: bool,
    ) -> Result<Self> {
        let path = options
            .path
            .unwrap_or_else(|| render_path(&path_parts, options.wild));
        let handler = options
            .handler
            .ok_or_else(|| RouterError::UnsupportedRoute {
                path: path.clone(),
                reason: "endpoint has no handler".to_string(),
            })?;

        let methods = normalize_methods(options.methods.as_ref().or(defaults.methods.as_ref()))?;
        let content_type = normalize_content_types(
            options
                .content_type
                .or_else(|| defaults.content_type.clone()),
        );
        let cors = match options.cors.as_ref().or(defaults.cors.as_ref()) {
            Some(Cors::On(cors)) => Some(CorsPolicy::resolve(cors, &methods)),
            Some(Cors::Off) | None => None,
        };

        let mut query_params = defaults.query_params.clone();
        query_params.extend(options.query_params);
        let mut middleware = defaults.middleware.clone();
        middleware.extend(options.middleware);

        Ok(Self {
            id,
            name: options.name,
            methods,
            content_type,
            cors,
            path,
            path_parts,
            handler,
            query_params,
            middleware,
            status: options.status.unwrap_or(200),
            is_dynamic,
            wild: options.wild,
        })
    }

    /// Arena handle.
    #[must_use]
    pub const fn id(&self) -> EndpointId {
        self.id
    }

    /// Route name.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Accepted methods, OPTIONS included.
    #[must_use]
    pub const fn methods(&self) -> &BTreeSet<Method> {
        &self.methods
    }

    /// Accepted content types; `None` accepts anything.
    #[must_use]
    pub fn content_types(&self) -> Option<&[ContentTypeMatcher]> {
        self.content_type.as_deref()
    }

    /// Resolved CORS policy.
    #[must_use]
    pub const fn cors(&self) -> Option<&CorsPolicy> {
        self.cors.as_ref()
    }

    /// Fully-qualified path string.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Path parts from the root.
    #[must_use]
    pub fn path_parts(&self) -> &[PathPart] {
        &self.path_parts
    }

    /// Handler reference.
    #[must_use]
    pub const fn handler(&self) -> &HandlerRef {
        &self.handler
    }

    /// Declared query parameters.
    #[must_use]
    pub const fn query_params(&self) -> &BTreeMap<String, QueryParam> {
        &self.query_params
    }

    /// Endpoint middleware.
    #[must_use]
    pub fn middleware(&self) -> &[Arc<dyn Middleware>] {
        &self.middleware
    }

    /// Success status code.
    #[must_use]
    pub const fn status(&self) -> u16 {
        self.status
    }

    /// Whether any path part is a capture.
    #[must_use]
    pub const fn is_dynamic(&self) -> bool {
        self.is_dynamic
    }

    /// Whether trailing segments are consumed.
    #[must_use]
    pub const fn is_wild(&self) -> bool {
        self.wild
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("path", &self.path)
            .field("methods", &self.methods)
            .field("content_type", &self.content_type)
            .field("cors", &self.cors)
            .field("is_dynamic", &self.is_dynamic)
            .field("wild", &self.wild)
            .finish_non_exhaustive()
    }
}

/// Uppercases, expands `*`, deduplicates and adds OPTIONS.
pub(crate) fn normalize_methods(methods: Option<&Vec<String>>) -> Result<BTreeSet<Method>> {
    let mut set = BTreeSet::new();
    for method in methods.into_iter().flatten() {
        if method.trim() == "*" {
            set.extend(Method::ALL);
        } else {
            set.insert(method.parse::<Method>()?);
        }
    }
    if set.is_empty() {
        set.insert(Method::Get);
    }
    set.insert(Method::Options);
    Ok(set)
}

/// A `*` entry, or an empty list, disables negotiation.
fn normalize_content_types(
    matchers: Option<Vec<ContentTypeMatcher>>,
) -> Option<Vec<ContentTypeMatcher>> {
    let matchers = matchers?;
    if matchers.is_empty() || matchers.iter().any(ContentTypeMatcher::is_any) {
        return None;
    }
    Some(matchers)
}
