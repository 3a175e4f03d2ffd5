//! The per-request pipeline.
//!
//! For each request the [`Dispatcher`]:
//!
//! 1. runs global middleware,
//! 2. matches the (possibly rewritten) request against the route tree,
//! 3. answers OPTIONS itself: a CORS preflight when the endpoint has a
//!    policy, 403 otherwise,
//! 4. resolves the handler,
//! 5. validates and coerces query parameters,
//! 6. runs endpoint middleware, then handler-contributed middleware,
//! 7. invokes the handler and serializes its output.
//!
//! Steps 1 to 7 run inside the configured [`ExecutionContext`]. An error at
//! any step skips the rest and is turned into a response by the error
//! handler; known [`HttpError`]s keep their status, everything else is a 500.

use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::config::DispatchConfig;
use crate::error::{BoxError, HttpError, HttpErrorKind};
use crate::handler::{resolve_handler, ExecutionContext, HandlerMap, HandlerRegistry, NoContext};
use crate::matcher::{RouteMatch, Router};
use crate::middleware::{run_chain, Middleware};
use crate::query::compile_query_params;
use crate::request::{Method, Request};
use crate::response::Response;

/// Drives requests through middleware, matching and handlers.
pub struct Dispatcher {
    router: Router,
    registry: Arc<dyn HandlerRegistry>,
    context: Arc<dyn ExecutionContext>,
    middleware: Vec<Arc<dyn Middleware>>,
    config: DispatchConfig,
}

impl Dispatcher {
    /// Creates a dispatcher with an empty registry and no context.
    #[must_use]
    pub fn new(router: Router) -> Self {
        Self {
            router,
            registry: Arc::new(HandlerMap::new()),
            context: Arc::new(NoContext),
            middleware: Vec::new(),
            config: DispatchConfig::default(),
        }
    }

    /// Sets the handler registry.
    #[must_use]
    pub fn registry(mut self, registry: impl HandlerRegistry + 'static) -> Self {
        self.registry = Arc::new(registry);
        self
    }

    /// Sets the execution context.
    #[must_use]
    pub fn context(mut self, context: impl ExecutionContext + 'static) -> Self {
        self.context = Arc::new(context);
        self
    }

    /// Adds global middleware.
    #[must_use]
    pub fn middleware(mut self, mw: impl Middleware + 'static) -> Self {
        self.middleware.push(Arc::new(mw));
        self
    }

    /// Applies a configuration.
    #[must_use]
    pub fn config(mut self, config: DispatchConfig) -> Self {
        self.router = self.router.with_cache(config.match_cache);
        self.config = config;
        self
    }

    /// The router.
    #[must_use]
    pub const fn router(&self) -> &Router {
        &self.router
    }

    /// Handles one request. Never fails: errors become error responses.
    pub async fn dispatch(&self, mut request: Request) -> Response {
        debug!(method = %request.method, path = %request.path, "dispatching request");

        let mut cors_headers = Vec::new();
        let result = self
            .context
            .run(Box::pin(self.process(&mut request, &mut cors_headers)))
            .await;

        let mut response = match result {
            Ok(response) => response,
            Err(err) => self.error_response(err, &request),
        };
        for (key, value) in cors_headers {
            if response.get_header(&key).is_none() {
                response.headers.insert(key, value);
            }
        }
        for mw in self.middleware.iter().rev() {
            response = mw.after(response).await;
        }

        debug!(status = response.status, "request complete");
        response
    }

    async fn process(
        &self,
        request: &mut Request,
        cors_headers: &mut Vec<(String, String)>,
    ) -> Result<Response, BoxError> {
        if let Some(response) = run_chain(&self.middleware, request).await? {
            return Ok(response);
        }

        let (endpoint, params) = match self.router.match_request(request) {
            RouteMatch::Found { endpoint, params } => (self.router.endpoint(endpoint), params),
            RouteMatch::BadContentType { endpoint } => {
                let endpoint = self.router.endpoint(endpoint);
                let accepted = endpoint.content_types().unwrap_or_default();
                return Err(HttpError::bad_content_type(request.content_type().as_deref(), accepted)
                    .with_route(endpoint.path())
                    .into());
            }
            RouteMatch::NotFound => {
                return Err(HttpError::not_found(request.method.as_str(), &request.path).into());
            }
        };

        match endpoint.cors() {
            Some(policy) => {
                cors_headers.extend(policy.headers());
                if request.method == Method::Options {
                    return Ok(Response::new(self.config.preflight_status));
                }
            }
            None if request.method == Method::Options => {
                debug!(route = endpoint.path(), "OPTIONS refused, no CORS policy");
                return Ok(Response::new(403));
            }
            None => {}
        }

        request.params = params;
        let handler = resolve_handler(self.registry.as_ref(), request, endpoint)?;
        request.query_params = compile_query_params(endpoint.query_params(), &request.query)
            .map_err(|e| e.with_route(endpoint.path()))?;

        let chain = endpoint
            .middleware()
            .iter()
            .cloned()
            .chain(handler.middleware())
            .collect::<Vec<_>>();
        if let Some(response) = run_chain(&chain, request).await? {
            return Ok(response);
        }

        let output = handler.call(request.clone()).await?;
        Ok(output.into_response(endpoint.status()))
    }

    fn error_response(&self, err: BoxError, request: &Request) -> Response {
        let error = match err.downcast::<HttpError>() {
            Ok(http) => *http,
            Err(other) => {
                error!(
                    method = %request.method,
                    path = %request.path,
                    error = %other,
                    "unhandled error"
                );
                let message = if self.config.expose_internal_errors {
                    other.to_string()
                } else {
                    HttpErrorKind::InternalServerError
                        .default_message()
                        .to_string()
                };
                return Response::from_error(&HttpError::internal(message), request.accepts_json());
            }
        };

        let route = error.route.as_deref().unwrap_or("-");
        if error.status() >= 500 {
            error!(status = error.status(), route, message = %error.message, "request failed");
        } else if self.config.log_client_errors {
            warn!(status = error.status(), route, message = %error.message, "request rejected");
        } else {
            debug!(status = error.status(), route, message = %error.message, "request rejected");
        }
        Response::from_error(&error, request.accepts_json())
    }
}
