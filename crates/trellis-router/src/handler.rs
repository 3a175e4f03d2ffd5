//! Handlers and the collaborators used to resolve and run them.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use serde_json::Value;

use crate::endpoint::Endpoint;
use crate::error::{BoxError, HttpError};
use crate::middleware::{BoxFuture, Middleware};
use crate::request::{Params, Request};
use crate::response::Response;

/// What a handler produced.
#[derive(Debug, Clone)]
pub enum HandlerOutput {
    /// A finished response, sent as is.
    Response(Response),
    /// A value: objects and arrays become JSON, anything else plain text.
    Value(Value),
}

impl HandlerOutput {
    /// Turns the output into a response with the endpoint's status.
    #[must_use]
    pub fn into_response(self, status: u16) -> Response {
        match self {
            Self::Response(res) => res,
            Self::Value(value @ (Value::Object(_) | Value::Array(_))) => {
                Response::json(&value).status(status)
            }
            Self::Value(Value::Null) => Response::new(status),
            Self::Value(Value::String(s)) => Response::text(s).status(status),
            Self::Value(other) => Response::text(other.to_string()).status(status),
        }
    }
}

impl From<Response> for HandlerOutput {
    fn from(res: Response) -> Self {
        Self::Response(res)
    }
}

impl From<Value> for HandlerOutput {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<String> for HandlerOutput {
    fn from(s: String) -> Self {
        Self::Value(Value::String(s))
    }
}

impl From<&str> for HandlerOutput {
    fn from(s: &str) -> Self {
        Self::Value(Value::String(s.to_string()))
    }
}

impl From<()> for HandlerOutput {
    fn from((): ()) -> Self {
        Self::Value(Value::Null)
    }
}

/// A request handler.
pub trait Handler: Send + Sync {
    /// Handles the request. Params and compiled query values are set.
    fn call(&self, req: Request) -> BoxFuture<'static, Result<HandlerOutput, BoxError>>;

    /// Middleware contributed by the handler, run after the endpoint's own.
    fn middleware(&self) -> Vec<Arc<dyn Middleware>> {
        Vec::new()
    }
}

/// Handler built from an async function.
pub struct FnHandler<F> {
    f: F,
}

/// Wraps an async function as a handler.
///
/// # Example
///
/// ```ignore
/// let show = handler_fn(|req: Request| async move {
///     Ok::<_, HttpError>(serde_json::json!({ "id": req.params.get("id") }))
/// });
/// ```
pub const fn handler_fn<F, Fut, O, E>(f: F) -> FnHandler<F>
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = Result<O, E>> + Send + 'static,
    O: Into<HandlerOutput>,
    E: Into<BoxError>,
{
    FnHandler { f }
}

impl<F, Fut, O, E> Handler for FnHandler<F>
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = Result<O, E>> + Send + 'static,
    O: Into<HandlerOutput>,
    E: Into<BoxError>,
{
    fn call(&self, req: Request) -> BoxFuture<'static, Result<HandlerOutput, BoxError>> {
        let fut = (self.f)(req);
        Box::pin(async move { fut.await.map(Into::into).map_err(Into::into) })
    }
}

/// Picks a handler at request time.
pub type ResolverFn = Arc<dyn Fn(&Request, &Endpoint, &Params) -> HandlerRef + Send + Sync>;

/// How an endpoint refers to its handler.
#[derive(Clone)]
pub enum HandlerRef {
    /// Looked up by name in the [`HandlerRegistry`].
    Named(String),
    /// A handler instance.
    Direct(Arc<dyn Handler>),
    /// A function returning another reference, resolved once more.
    Resolver(ResolverFn),
}

impl HandlerRef {
    /// Wraps a handler instance.
    pub fn direct(handler: impl Handler + 'static) -> Self {
        Self::Direct(Arc::new(handler))
    }

    /// Wraps a resolver function.
    pub fn resolver<F>(f: F) -> Self
    where
        F: Fn(&Request, &Endpoint, &Params) -> Self + Send + Sync + 'static,
    {
        Self::Resolver(Arc::new(f))
    }
}

impl fmt::Debug for HandlerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => f.debug_tuple("Named").field(name).finish(),
            Self::Direct(_) => f.write_str("Direct(..)"),
            Self::Resolver(_) => f.write_str("Resolver(..)"),
        }
    }
}

impl From<&str> for HandlerRef {
    fn from(name: &str) -> Self {
        Self::Named(name.to_string())
    }
}

impl From<String> for HandlerRef {
    fn from(name: String) -> Self {
        Self::Named(name)
    }
}

impl From<Arc<dyn Handler>> for HandlerRef {
    fn from(handler: Arc<dyn Handler>) -> Self {
        Self::Direct(handler)
    }
}

impl<F> From<FnHandler<F>> for HandlerRef
where
    FnHandler<F>: Handler + 'static,
{
    fn from(handler: FnHandler<F>) -> Self {
        Self::direct(handler)
    }
}

/// Resolves handler names. Supplied by the hosting application.
pub trait HandlerRegistry: Send + Sync {
    /// Returns the handler registered under `name`.
    fn resolve(&self, name: &str) -> Option<Arc<dyn Handler>>;
}

/// In-memory [`HandlerRegistry`].
#[derive(Default, Clone)]
pub struct HandlerMap {
    handlers: HashMap<String, Arc<dyn Handler>>,
}

impl HandlerMap {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, handler: impl Handler + 'static) -> Self {
        self.handlers.insert(name.into(), Arc::new(handler));
        self
    }

    /// Registers a shared handler.
    pub fn insert(&mut self, name: impl Into<String>, handler: Arc<dyn Handler>) {
        self.handlers.insert(name.into(), handler);
    }
}

impl HandlerRegistry for HandlerMap {
    fn resolve(&self, name: &str) -> Option<Arc<dyn Handler>> {
        self.handlers.get(name).cloned()
    }
}

/// Resolves an endpoint's handler reference to an instance.
///
/// A resolver function is called once; if it returns another resolver the
/// lookup fails.
pub fn resolve_handler(
    registry: &dyn HandlerRegistry,
    req: &Request,
    endpoint: &Endpoint,
) -> Result<Arc<dyn Handler>, HttpError> {
    let resolved = match endpoint.handler() {
        HandlerRef::Resolver(f) => f(req, endpoint, &req.params),
        other => other.clone(),
    };
    match resolved {
        HandlerRef::Direct(handler) => Ok(handler),
        HandlerRef::Named(name) => registry.resolve(&name).ok_or_else(|| {
            HttpError::internal(format!("handler not found: {name}")).with_route(endpoint.path())
        }),
        HandlerRef::Resolver(_) => Err(HttpError::internal(
            "handler resolver returned another resolver",
        )
        .with_route(endpoint.path())),
    }
}

/// Work run by an [`ExecutionContext`].
pub type Work<'a> = BoxFuture<'a, Result<Response, BoxError>>;

/// Runs request processing inside an application context, such as an open
/// persistence session. Errors from the work must be returned unchanged.
pub trait ExecutionContext: Send + Sync {
    /// Runs `work` inside the context.
    fn run<'a>(&'a self, work: Work<'a>) -> Work<'a>;
}

/// Runs work directly.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoContext;

impl ExecutionContext for NoContext {
    fn run<'a>(&'a self, work: Work<'a>) -> Work<'a> {
        work
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HttpErrorKind;
    use crate::tree::RouteTree;

    fn ok_handler() -> FnHandler<impl Fn(Request) -> std::future::Ready<Result<&'static str, HttpError>>> {
        handler_fn(|_req: Request| std::future::ready(Ok::<_, HttpError>("ok")))
    }

    fn endpoint_with(handler: HandlerRef) -> Endpoint {
        let mut tree = RouteTree::new();
        tree.root().endpoint("x", handler).unwrap();
        let endpoint = tree.endpoints().next().unwrap().clone();
        endpoint
    }

    #[test]
    fn test_output_serialization() {
        let res = HandlerOutput::from(serde_json::json!({"a": 1})).into_response(201);
        assert_eq!(res.status, 201);
        assert_eq!(res.get_header("Content-Type"), Some("application/json"));

        let res = HandlerOutput::from(serde_json::json!([1, 2])).into_response(200);
        assert_eq!(res.body_string(), Some("[1,2]".to_string()));

        let res = HandlerOutput::from("hi").into_response(200);
        assert_eq!(res.body_string(), Some("hi".to_string()));
        assert!(res.get_header("Content-Type").unwrap().starts_with("text/plain"));

        let res = HandlerOutput::from(serde_json::json!(42)).into_response(200);
        assert_eq!(res.body_string(), Some("42".to_string()));

        let sent = Response::new(418);
        assert_eq!(HandlerOutput::from(sent).into_response(200).status, 418);
    }

    #[test]
    fn test_resolve_named() {
        let registry = HandlerMap::new().with("things.list", ok_handler());
        let endpoint = endpoint_with("things.list".into());
        let req = Request::get("/x");
        assert!(resolve_handler(&registry, &req, &endpoint).is_ok());

        let missing = endpoint_with("things.show".into());
        let err = resolve_handler(&registry, &req, &missing).err().unwrap();
        assert_eq!(err.kind, HttpErrorKind::InternalServerError);
    }

    #[test]
    fn test_resolver_is_followed_once() {
        let registry = HandlerMap::new().with("v2", ok_handler());
        let req = Request::get("/x");

        let once = endpoint_with(HandlerRef::resolver(|_, _, _| "v2".into()));
        assert!(resolve_handler(&registry, &req, &once).is_ok());

        let twice = endpoint_with(HandlerRef::resolver(|_, _, _| {
            HandlerRef::resolver(|_, _, _| "v2".into())
        }));
        assert!(resolve_handler(&registry, &req, &twice).is_err());
    }

    #[tokio::test]
    async fn test_no_context_passes_work_through() {
        let res = NoContext
            .run(Box::pin(async { Ok(Response::new(204)) }))
            .await
            .unwrap();
        assert_eq!(res.status, 204);
    }
}
