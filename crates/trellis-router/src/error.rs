//! Error types for route construction and request dispatch.

use std::collections::HashMap;
use std::fmt;

use thiserror::Error;

use crate::endpoint::ContentTypeMatcher;

/// Boxed error returned by handlers and middleware.
///
/// The dispatch pipeline downcasts it to [`HttpError`] to pick the response
/// status; anything else becomes a 500.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Configuration errors raised while building the route tree.
#[derive(Debug, Error)]
pub enum RouterError {
    /// Unknown HTTP method name.
    #[error("invalid HTTP method: {0}")]
    InvalidMethod(String),

    /// A regular expression failed to compile.
    #[error("invalid pattern `{pattern}`: {source}")]
    InvalidPattern {
        /// The offending pattern.
        pattern: String,
        /// The regex compiler error.
        source: regex::Error,
    },

    /// The route shape cannot be matched reliably.
    #[error("unsupported route {path}: {reason}")]
    UnsupportedRoute {
        /// Fully-qualified route path.
        path: String,
        /// Why the route was rejected.
        reason: String,
    },

    /// Two endpoints were registered under the same name.
    #[error("duplicate route name: {0}")]
    DuplicateName(String),

    /// Route name not found.
    #[error("route not found: {0}")]
    RouteNotFound(String),

    /// A required parameter was missing while building a URL.
    #[error("missing parameter `{param}` for route {route}")]
    MissingParam {
        /// Route name.
        route: String,
        /// Parameter name.
        param: String,
    },

    /// Invalid configuration document.
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}

/// Result type alias for router operations.
pub type Result<T> = std::result::Result<T, RouterError>;

/// The closed set of request failures understood by the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpErrorKind {
    /// 400, generic validation failure.
    BadRequest,
    /// 400, path and method matched but the content type did not.
    BadContentType,
    /// 401
    Unauthorized,
    /// 403
    Forbidden,
    /// 404, no endpoint matched.
    NotFound,
    /// 500
    InternalServerError,
}

impl HttpErrorKind {
    /// Returns the HTTP status code for this kind.
    #[must_use]
    pub const fn status(self) -> u16 {
        match self {
            Self::BadRequest | Self::BadContentType => 400,
            Self::Unauthorized => 401,
            Self::Forbidden => 403,
            Self::NotFound => 404,
            Self::InternalServerError => 500,
        }
    }

    /// Default message used when none is supplied.
    #[must_use]
    pub const fn default_message(self) -> &'static str {
        match self {
            Self::BadRequest => "Bad Request",
            Self::BadContentType => "Bad Content Type",
            Self::Unauthorized => "Unauthorized",
            Self::Forbidden => "Forbidden",
            Self::NotFound => "Not Found",
            Self::InternalServerError => "Internal Server Error",
        }
    }
}

impl fmt::Display for HttpErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.default_message())
    }
}

/// A request failure carrying status, message, route, and extra headers.
#[derive(Debug, Clone, Error)]
#[error("{kind}: {message}")]
pub struct HttpError {
    /// Error kind.
    pub kind: HttpErrorKind,
    /// Human-readable message sent to the client.
    pub message: String,
    /// Path of the endpoint the error belongs to, if one was matched.
    pub route: Option<String>,
    /// Headers to attach to the error response.
    pub headers: HashMap<String, String>,
}

impl HttpError {
    /// Creates an error of the given kind.
    pub fn new(kind: HttpErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            route: None,
            headers: HashMap::new(),
        }
    }

    /// 400 Bad Request.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(HttpErrorKind::BadRequest, message)
    }

    /// 400 for a content type the endpoint does not accept.
    ///
    /// The message lists the accepted types: literals quoted, patterns
    /// between slashes.
    pub fn bad_content_type(content_type: Option<&str>, accepted: &[ContentTypeMatcher]) -> Self {
        let accepted = accepted
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        let message = match content_type {
            Some(ct) => format!("Content type \"{ct}\" is not accepted. Expected one of: {accepted}"),
            None => format!("Missing content type. Expected one of: {accepted}"),
        };
        Self::new(HttpErrorKind::BadContentType, message)
    }

    /// 401 Unauthorized.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(HttpErrorKind::Unauthorized, message)
    }

    /// 403 Forbidden.
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(HttpErrorKind::Forbidden, message)
    }

    /// 404 for a request no endpoint matched.
    pub fn not_found(method: &str, path: &str) -> Self {
        Self::new(
            HttpErrorKind::NotFound,
            format!("No route matched: {method} {path}"),
        )
    }

    /// 500 Internal Server Error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(HttpErrorKind::InternalServerError, message)
    }

    /// Attaches the route path.
    #[must_use]
    pub fn with_route(mut self, route: impl Into<String>) -> Self {
        self.route = Some(route.into());
        self
    }

    /// Adds a response header.
    #[must_use]
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Returns the HTTP status code.
    #[must_use]
    pub const fn status(&self) -> u16 {
        self.kind.status()
    }
}
