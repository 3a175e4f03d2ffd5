//! Middleware support for request/response processing.
//!
//! Middleware runs as an ordered list driven by [`run_chain`]: each step is
//! awaited in turn, may end the chain with a response, and an error from
//! any step skips the remaining steps.

use std::future::Future;
use std::pin::Pin;

use tracing::info;

use crate::error::BoxError;
use crate::request::Request;
use crate::response::Response;

/// A boxed future for async middleware operations.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Result of one middleware step.
#[derive(Debug)]
pub enum MiddlewareResult {
    /// Continue to the next middleware/handler.
    Continue,
    /// Stop processing and return this response.
    Respond(Response),
}

/// Trait for middleware that processes requests and responses.
///
/// # Example
///
/// ```ignore
/// struct RequireJson;
///
/// impl Middleware for RequireJson {
///     fn handle<'a>(
///         &'a self,
///         req: &'a mut Request,
///     ) -> BoxFuture<'a, Result<MiddlewareResult, BoxError>> {
///         Box::pin(async move {
///             if req.accepts_json() {
///                 Ok(MiddlewareResult::Continue)
///             } else {
///                 Err(HttpError::bad_request("JSON only").into())
///             }
///         })
///     }
/// }
/// ```
pub trait Middleware: Send + Sync {
    /// Called before the handler. May modify the request, answer it, or fail.
    fn handle<'a>(&'a self, req: &'a mut Request)
        -> BoxFuture<'a, Result<MiddlewareResult, BoxError>>;

    /// Called with the final response. Only invoked for global middleware.
    fn after<'a>(&'a self, res: Response) -> BoxFuture<'a, Response> {
        Box::pin(async move { res })
    }
}

/// Runs middleware in order.
///
/// Returns `Ok(Some(response))` when a step answered the request,
/// `Ok(None)` when every step continued.
pub async fn run_chain<M>(chain: &[M], req: &mut Request) -> Result<Option<Response>, BoxError>
where
    M: AsRef<dyn Middleware>,
{
    for mw in chain {
        match mw.as_ref().handle(req).await? {
            MiddlewareResult::Continue => {}
            MiddlewareResult::Respond(res) => return Ok(Some(res)),
        }
    }
    Ok(None)
}

/// Middleware built from a synchronous function.
pub struct FnMiddleware<F> {
    f: F,
}

/// Wraps a function as middleware.
pub const fn middleware_fn<F>(f: F) -> FnMiddleware<F>
where
    F: Fn(&mut Request) -> Result<MiddlewareResult, BoxError> + Send + Sync,
{
    FnMiddleware { f }
}

impl<F> Middleware for FnMiddleware<F>
where
    F: Fn(&mut Request) -> Result<MiddlewareResult, BoxError> + Send + Sync,
{
    fn handle<'a>(
        &'a self,
        req: &'a mut Request,
    ) -> BoxFuture<'a, Result<MiddlewareResult, BoxError>> {
        let result = (self.f)(req);
        Box::pin(async move { result })
    }
}

/// Middleware that logs requests.
pub struct LoggingMiddleware;

impl Middleware for LoggingMiddleware {
    fn handle<'a>(
        &'a self,
        req: &'a mut Request,
    ) -> BoxFuture<'a, Result<MiddlewareResult, BoxError>> {
        Box::pin(async move {
            info!("--> {} {}", req.method, req.path);
            Ok(MiddlewareResult::Continue)
        })
    }

    fn after<'a>(&'a self, res: Response) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            info!("<-- {}", res.status);
            res
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::error::HttpError;

    #[tokio::test]
    async fn test_chain_runs_in_order() {
        let chain: Vec<Arc<dyn Middleware>> = vec![
            Arc::new(middleware_fn(|req| {
                req.headers.insert("X-Trail".to_string(), "a".to_string());
                Ok(MiddlewareResult::Continue)
            })),
            Arc::new(middleware_fn(|req| {
                let trail = req.get_header("X-Trail").unwrap_or_default().to_string();
                req.headers.insert("X-Trail".to_string(), format!("{trail}b"));
                Ok(MiddlewareResult::Continue)
            })),
        ];
        let mut req = Request::get("/");
        let res = run_chain(&chain, &mut req).await.unwrap();
        assert!(res.is_none());
        assert_eq!(req.get_header("X-Trail"), Some("ab"));
    }

    #[tokio::test]
    async fn test_respond_ends_chain() {
        let reached = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&reached);
        let chain: Vec<Arc<dyn Middleware>> = vec![
            Arc::new(middleware_fn(|_| {
                Ok(MiddlewareResult::Respond(Response::text("early")))
            })),
            Arc::new(middleware_fn(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(MiddlewareResult::Continue)
            })),
        ];
        let mut req = Request::get("/");
        let res = run_chain(&chain, &mut req).await.unwrap().unwrap();
        assert_eq!(res.body_string(), Some("early".to_string()));
        assert_eq!(reached.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_error_short_circuits() {
        let reached = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&reached);
        let chain: Vec<Arc<dyn Middleware>> = vec![
            Arc::new(middleware_fn(|_| Err(HttpError::unauthorized("login").into()))),
            Arc::new(middleware_fn(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(MiddlewareResult::Continue)
            })),
        ];
        let mut req = Request::get("/");
        assert!(run_chain(&chain, &mut req).await.is_err());
        assert_eq!(reached.load(Ordering::SeqCst), 0);
    }
}
