#![allow(dead_code)]

use serde_json::{json, Value};
use trellis_router::{
    handler_fn, Dispatcher, EndpointId, HandlerMap, HttpError, Params, Request, Response, Result,
    RouteMatch, Router, Scope,
};

pub fn router<F>(configure: F) -> Router
where
    F: FnOnce(&mut Scope<'_>) -> Result<()>,
{
    Router::build(configure).unwrap_or_else(|e| panic!("Failed to build routes: {e}"))
}

/// Handlers used across tests: `ok` answers "ok", `echo` returns the
/// matched params and compiled query as JSON.
pub fn handlers() -> HandlerMap {
    HandlerMap::new()
        .with(
            "ok",
            handler_fn(|_req: Request| async { Ok::<_, HttpError>("ok") }),
        )
        .with(
            "echo",
            handler_fn(|req: Request| async move {
                Ok::<_, HttpError>(json!({
                    "params": req.params,
                    "query": req.query_params,
                }))
            }),
        )
}

pub fn dispatcher<F>(configure: F) -> Dispatcher
where
    F: FnOnce(&mut Scope<'_>) -> Result<()>,
{
    Dispatcher::new(router(configure)).registry(handlers())
}

pub fn found(result: RouteMatch) -> (EndpointId, Params) {
    match result {
        RouteMatch::Found { endpoint, params } => (endpoint, params),
        other => panic!("Expected a match, got {other:?}"),
    }
}

pub fn handler_name(router: &Router, result: RouteMatch) -> String {
    let (id, _) = found(result);
    match router.endpoint(id).handler() {
        trellis_router::HandlerRef::Named(name) => name.clone(),
        other => panic!("Expected a named handler, got {other:?}"),
    }
}

pub fn body_json(res: &Response) -> Value {
    serde_json::from_slice(&res.body)
        .unwrap_or_else(|e| panic!("Body is not JSON: {e}\n{:?}", res.body_string()))
}
