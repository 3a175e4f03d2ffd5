//! # trellis-router
//!
//! An embeddable HTTP request router.
//!
//! This crate provides:
//! - A route tree of nested scopes and endpoints, declared in order
//! - Captures: named path segments with typed, regex or custom evaluation
//! - Matching by method, path and `Content-Type`, with a result cache
//! - A dispatch pipeline with middleware, CORS and query validation
//! - Named routes for reverse URL lookup
//!
//! ## Quick Start
//!
//! ```ignore
//! use trellis_router::{handler_fn, Dispatcher, HandlerMap, ParamType, Request, Router};
//!
//! let router = Router::build(|root| {
//!     root.endpoint("/", "home")?;
//!     root.path("users", |users| {
//!         let id = users.capture("id", ParamType::Number);
//!         users.endpoint(id, "users.show")?;
//!         Ok(())
//!     })?;
//!     Ok(())
//! })?;
//!
//! let handlers = HandlerMap::new()
//!     .with("home", handler_fn(|_req| async { Ok::<_, HttpError>("Hello, World!") }))
//!     .with("users.show", handler_fn(|req: Request| async move {
//!         Ok::<_, HttpError>(serde_json::json!({ "id": req.params.get("id") }))
//!     }));
//!
//! let dispatcher = Dispatcher::new(router).registry(handlers);
//! let response = dispatcher.dispatch(Request::get("/users/123")).await;
//! ```
//!
//! ## Captures
//!
//! A capture consumes one path segment. Its evaluator decides whether the
//! segment matches and what value lands in `request.params`:
//!
//! ```ignore
//! let slug = Capture::pattern("slug", r"^[a-z0-9-]+$")?;
//! let page = Capture::typed("page", ParamType::Number).optional();
//! root.path("posts", |posts| {
//!     posts.endpoint(vec![slug.into(), page.into()], "posts.show")?;
//!     Ok(())
//! })?;
//! ```
//!
//! Only the last part of a route may be optional.
//!
//! ## Middleware
//!
//! ```ignore
//! let dispatcher = Dispatcher::new(router)
//!     .middleware(LoggingMiddleware)
//!     .registry(handlers);
//! ```
//!
//! Scope and endpoint middleware run after routing; global middleware runs
//! before it and may rewrite the request.
//!
//! ## Named Routes
//!
//! ```ignore
//! root.path("users", |users| {
//!     let id = users.capture("id", ParamType::Number);
//!     users.endpoint(id, EndpointOptions::new("users.show").name("user_detail"))?;
//!     Ok(())
//! })?;
//!
//! let url = router.url_for("user_detail", &[("id", "123")].into_iter().collect())?;
//! assert_eq!(url, "/users/123");
//! ```

mod capture;
mod config;
mod dispatch;
mod endpoint;
mod error;
mod handler;
mod matcher;
mod middleware;
mod query;
mod request;
mod response;
mod tree;

pub use capture::{Capture, CaptureContext, CaptureFn, CaptureOverrides, Evaluator, ParamType};
pub use config::DispatchConfig;
pub use dispatch::Dispatcher;
pub use endpoint::{ContentTypeMatcher, Cors, CorsOptions, CorsPolicy, Endpoint, EndpointOptions};
pub use error::{BoxError, HttpError, HttpErrorKind, Result, RouterError};
pub use handler::{
    handler_fn, resolve_handler, ExecutionContext, FnHandler, Handler, HandlerMap, HandlerOutput,
    HandlerRef, HandlerRegistry, NoContext, ResolverFn, Work,
};
pub use matcher::{RouteMatch, Router};
pub use middleware::{
    middleware_fn, run_chain, BoxFuture, FnMiddleware, LoggingMiddleware, Middleware,
    MiddlewareResult,
};
pub use query::{compile_query_params, QueryParam, Validate};
pub use request::{Method, Params, Request};
pub use response::Response;
pub use tree::{
    EndpointId, PathPart, RouteEntry, RouteInfo, RoutePart, RouteTree, Scope, ScopeId,
    ScopeOptions, Segment, Walk, RELATIVE_PATH,
};
