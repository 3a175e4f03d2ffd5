//! The route tree.
//!
//! Routes are declared through [`Scope`], a handle onto one node of a
//! [`RouteTree`]. Scopes and endpoints live in arenas and refer to each
//! other through [`ScopeId`] and [`EndpointId`]; each scope keeps its
//! children in a multi-map from path part to nodes, in insertion order.
//! Traversal order is declaration order, and the matcher relies on it to
//! break ties.
//!
//! ```ignore
//! let mut tree = RouteTree::new();
//! let mut root = tree.root();
//! root.path("api", |api| {
//!     let id = api.capture("id", ParamType::Number);
//!     api.endpoint("things", "things.list")?;
//!     api.endpoint(vec![PathPart::from("things"), id.optional().into()], "things.show")?;
//!     Ok(())
//! })?;
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::ops::ControlFlow;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::capture::{Capture, CaptureOverrides, Evaluator};
use crate::endpoint::{ContentTypeMatcher, Cors, Endpoint, EndpointOptions};
use crate::error::{Result, RouterError};
use crate::middleware::Middleware;
use crate::query::QueryParam;
use crate::request::{Method, Params};

/// Handle of a scope in a [`RouteTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(usize);

/// Handle of an endpoint in a [`RouteTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EndpointId(usize);

/// One declared path segment.
#[derive(Debug, Clone)]
pub enum PathPart {
    /// Matches the segment exactly.
    Literal(String),
    /// Matches through a capture.
    Capture(Capture),
}

impl PathPart {
    /// Literal parts are keyed by text, captures by name.
    fn same_key(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Literal(a), Self::Literal(b)) => a == b,
            (Self::Capture(a), Self::Capture(b)) => a.name() == b.name(),
            _ => false,
        }
    }

    fn optional_capture(&self) -> Option<&Capture> {
        match self {
            Self::Capture(c) if c.is_optional() => Some(c),
            _ => None,
        }
    }
}

impl fmt::Display for PathPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(s) => f.write_str(s),
            Self::Capture(c) => c.fmt(f),
        }
    }
}

impl From<&str> for PathPart {
    fn from(s: &str) -> Self {
        Self::Literal(s.to_string())
    }
}

impl From<Capture> for PathPart {
    fn from(c: Capture) -> Self {
        Self::Capture(c)
    }
}

impl From<&Capture> for PathPart {
    fn from(c: &Capture) -> Self {
        Self::Capture(c.clone())
    }
}

/// A sequence of path parts given to [`Scope::path`] or [`Scope::endpoint`].
///
/// Strings are split on `/`; the empty string addresses the scope itself.
#[derive(Debug, Clone, Default)]
pub struct Segment(Vec<PathPart>);

impl From<&str> for Segment {
    fn from(s: &str) -> Self {
        Self(
            s.split('/')
                .filter(|p| !p.is_empty())
                .map(PathPart::from)
                .collect(),
        )
    }
}

impl From<Capture> for Segment {
    fn from(c: Capture) -> Self {
        Self(vec![PathPart::Capture(c)])
    }
}

impl From<&Capture> for Segment {
    fn from(c: &Capture) -> Self {
        Self(vec![PathPart::from(c)])
    }
}

impl From<PathPart> for Segment {
    fn from(part: PathPart) -> Self {
        Self(vec![part])
    }
}

impl From<Vec<PathPart>> for Segment {
    fn from(parts: Vec<PathPart>) -> Self {
        Self(parts)
    }
}

/// Options a scope passes down to every descendant endpoint.
///
/// Endpoint options win over scalar settings; query parameters merge by
/// name and middleware lists concatenate, outermost first.
#[derive(Clone, Default)]
pub struct ScopeOptions {
    /// Default methods.
    pub methods: Option<Vec<String>>,
    /// Default accepted content types.
    pub content_type: Option<Vec<ContentTypeMatcher>>,
    /// Default CORS setting.
    pub cors: Option<Cors>,
    /// Middleware prepended to each endpoint's list.
    pub middleware: Vec<Arc<dyn Middleware>>,
    /// Query parameters declared on each endpoint.
    pub query_params: BTreeMap<String, QueryParam>,
}

impl ScopeOptions {
    /// Creates empty options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the default methods.
    #[must_use]
    pub fn methods<S: Into<String>>(mut self, methods: impl IntoIterator<Item = S>) -> Self {
        self.methods = Some(methods.into_iter().map(Into::into).collect());
        self
    }

    /// Adds a default accepted content type.
    #[must_use]
    pub fn content_type(mut self, matcher: impl Into<ContentTypeMatcher>) -> Self {
        self.content_type
            .get_or_insert_with(Vec::new)
            .push(matcher.into());
        self
    }

    /// Sets the default CORS setting.
    #[must_use]
    pub fn cors(mut self, cors: impl Into<Cors>) -> Self {
        self.cors = Some(cors.into());
        self
    }

    /// Appends scope middleware.
    #[must_use]
    pub fn middleware(mut self, mw: impl Middleware + 'static) -> Self {
        self.middleware.push(Arc::new(mw));
        self
    }

    /// Declares a query parameter.
    #[must_use]
    pub fn query_param(mut self, name: impl Into<String>, param: QueryParam) -> Self {
        self.query_params.insert(name.into(), param);
        self
    }

    fn merged(&self, child: &Self) -> Self {
        let mut query_params = self.query_params.clone();
        query_params.extend(child.query_params.clone());
        let mut middleware = self.middleware.clone();
        middleware.extend(child.middleware.iter().cloned());
        Self {
            methods: child.methods.clone().or_else(|| self.methods.clone()),
            content_type: child
                .content_type
                .clone()
                .or_else(|| self.content_type.clone()),
            cors: child.cors.clone().or_else(|| self.cors.clone()),
            middleware,
            query_params,
        }
    }
}

/// A child of a scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutePart {
    /// A nested scope.
    Scope(ScopeId),
    /// An endpoint.
    Endpoint(EndpointId),
}

/// Children registered under one key; `None` is the scope itself.
type ChildEntry = (Option<PathPart>, Vec<RoutePart>);

struct ScopeNode {
    parent: Option<ScopeId>,
    path_parts: Vec<PathPart>,
    children: Vec<ChildEntry>,
    options: ScopeOptions,
    is_dynamic: bool,
}

impl ScopeNode {
    fn children_at(&mut self, key: Option<&PathPart>) -> &mut Vec<RoutePart> {
        let pos = self.children.iter().position(|(k, _)| match (k, key) {
            (None, None) => true,
            (Some(a), Some(b)) => a.same_key(b),
            _ => false,
        });
        let pos = pos.unwrap_or_else(|| {
            self.children.push((key.cloned(), Vec::new()));
            self.children.len() - 1
        });
        &mut self.children[pos].1
    }
}

/// Route tree built once at startup and read-only afterwards.
pub struct RouteTree {
    scopes: Vec<ScopeNode>,
    endpoints: Vec<Endpoint>,
    names: HashMap<String, EndpointId>,
}

impl Default for RouteTree {
    fn default() -> Self {
        Self::new()
    }
}

impl RouteTree {
    /// Creates a tree with an empty root scope.
    #[must_use]
    pub fn new() -> Self {
        Self {
            scopes: vec![ScopeNode {
                parent: None,
                path_parts: Vec::new(),
                children: Vec::new(),
                options: ScopeOptions::default(),
                is_dynamic: false,
            }],
            endpoints: Vec::new(),
            names: HashMap::new(),
        }
    }

    /// Handle onto the root scope.
    pub fn root(&mut self) -> Scope<'_> {
        Scope {
            tree: self,
            id: ScopeId(0),
        }
    }

    /// Returns an endpoint by handle.
    #[must_use]
    pub fn endpoint(&self, id: EndpointId) -> &Endpoint {
        &self.endpoints[id.0]
    }

    /// Looks up an endpoint by route name.
    #[must_use]
    pub fn endpoint_by_name(&self, name: &str) -> Option<&Endpoint> {
        self.names.get(name).map(|id| self.endpoint(*id))
    }

    /// Parent of a scope; `None` for the root.
    #[must_use]
    pub fn parent(&self, id: ScopeId) -> Option<ScopeId> {
        self.scopes[id.0].parent
    }

    /// All endpoints in registration order.
    pub fn endpoints(&self) -> impl Iterator<Item = &Endpoint> {
        self.endpoints.iter()
    }

    /// Number of endpoints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    /// Returns true when no endpoint is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// Depth-first traversal of the endpoints in declaration order.
    #[must_use]
    pub fn entries(&self) -> Walk<'_> {
        Walk {
            tree: self,
            stack: vec![(ScopeId(0), 0, 0)],
        }
    }

    /// Visits endpoints in traversal order until `visit` breaks.
    pub fn walk_routes<T>(
        &self,
        mut visit: impl FnMut(RouteEntry<'_>) -> ControlFlow<T>,
    ) -> Option<T> {
        for entry in self.entries() {
            if let ControlFlow::Break(value) = visit(entry) {
                return Some(value);
            }
        }
        None
    }

    /// Describes every endpoint in traversal order.
    #[must_use]
    pub fn routes(&self) -> Vec<RouteInfo> {
        self.entries()
            .map(|entry| RouteInfo::from(entry.endpoint))
            .collect()
    }

    /// Builds the concrete path of a named route.
    ///
    /// Optional captures may be omitted; wild routes append `_relativePath`.
    pub fn url_for(&self, name: &str, params: &Params) -> Result<String> {
        let endpoint = self
            .endpoint_by_name(name)
            .ok_or_else(|| RouterError::RouteNotFound(name.to_string()))?;

        let mut segments = Vec::with_capacity(endpoint.path_parts().len() + 1);
        for part in endpoint.path_parts() {
            match part {
                PathPart::Literal(s) => segments.push(s.clone()),
                PathPart::Capture(c) => match params.get(c.name()) {
                    Some(value) => segments.push(param_to_segment(value)),
                    None if c.is_optional() => {}
                    None => {
                        return Err(RouterError::MissingParam {
                            route: name.to_string(),
                            param: c.name().to_string(),
                        })
                    }
                },
            }
        }
        if endpoint.is_wild() {
            if let Some(rest) = params.get(RELATIVE_PATH).map(param_to_segment) {
                if !rest.is_empty() {
                    segments.push(rest);
                }
            }
        }
        Ok(format!("/{}", segments.join("/")))
    }

    fn add_scope(&mut self, parent: ScopeId, part: PathPart) -> ScopeId {
        let id = ScopeId(self.scopes.len());
        let parent_node = &self.scopes[parent.0];
        let mut path_parts = parent_node.path_parts.clone();
        path_parts.push(part.clone());
        let node = ScopeNode {
            parent: Some(parent),
            path_parts,
            children: Vec::new(),
            options: parent_node.options.clone(),
            is_dynamic: parent_node.is_dynamic || matches!(part, PathPart::Capture(_)),
        };
        self.scopes.push(node);
        self.scopes[parent.0]
            .children_at(Some(&part))
            .push(RoutePart::Scope(id));
        id
    }

    /// Finds or creates the child scope under `part`.
    fn child_scope(&mut self, parent: ScopeId, part: PathPart) -> ScopeId {
        let existing = self.scopes[parent.0]
            .children
            .iter()
            .find(|(key, _)| key.as_ref().is_some_and(|k| k.same_key(&part)))
            .and_then(|(_, nodes)| {
                nodes.iter().find_map(|node| match node {
                    RoutePart::Scope(id) => Some(*id),
                    RoutePart::Endpoint(_) => None,
                })
            });
        existing.unwrap_or_else(|| self.add_scope(parent, part))
    }
}

/// Parameter name holding the segments consumed by a wild endpoint.
pub const RELATIVE_PATH: &str = "_relativePath";

fn param_to_segment(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Renders parts as `/a/:b/:c?`, with a trailing `/*` for wild routes.
pub(crate) fn render_path(parts: &[PathPart], wild: bool) -> String {
    let mut path = parts
        .iter()
        .map(|p| format!("/{p}"))
        .collect::<String>();
    if wild {
        path.push_str("/*");
    }
    if path.is_empty() {
        path.push('/');
    }
    path
}

/// A mutable handle onto one scope of a [`RouteTree`].
pub struct Scope<'t> {
    tree: &'t mut RouteTree,
    id: ScopeId,
}

impl Scope<'_> {
    /// This scope's handle.
    #[must_use]
    pub const fn id(&self) -> ScopeId {
        self.id
    }

    /// Path parts from the root to this scope.
    #[must_use]
    pub fn path_parts(&self) -> &[PathPart] {
        &self.tree.scopes[self.id.0].path_parts
    }

    /// Whether this scope or an ancestor is keyed by a capture.
    #[must_use]
    pub fn is_dynamic(&self) -> bool {
        self.tree.scopes[self.id.0].is_dynamic
    }

    /// Creates a capture for use in this scope's routes.
    pub fn capture(&self, name: impl Into<String>, evaluator: impl Into<Evaluator>) -> Capture {
        Capture::with_evaluator(name, evaluator)
    }

    /// Creates a capture with `overrides` applied, e.g. an optional one.
    pub fn capture_with(
        &self,
        name: impl Into<String>,
        evaluator: impl Into<Evaluator>,
        overrides: CaptureOverrides,
    ) -> Capture {
        Capture::with_evaluator(name, evaluator).clone_with(overrides)
    }

    /// Enters (creating if needed) the child scope at `segment`.
    pub fn path<F>(&mut self, segment: impl Into<Segment>, configure: F) -> Result<&mut Self>
    where
        F: FnOnce(&mut Scope<'_>) -> Result<()>,
    {
        self.path_with(segment, &ScopeOptions::default(), configure)
    }

    /// Like [`Scope::path`], merging `options` into the child scope.
    ///
    /// Optional captures become required: a scope always consumes its
    /// segment.
    pub fn path_with<F>(
        &mut self,
        segment: impl Into<Segment>,
        options: &ScopeOptions,
        configure: F,
    ) -> Result<&mut Self>
    where
        F: FnOnce(&mut Scope<'_>) -> Result<()>,
    {
        let mut id = self.id;
        for part in segment.into().0 {
            id = self.tree.child_scope(id, required(part));
        }
        let node = &mut self.tree.scopes[id.0];
        node.options = node.options.merged(options);

        configure(&mut Scope {
            tree: &mut *self.tree,
            id,
        })?;
        Ok(self)
    }

    /// Registers an endpoint at `segment`.
    pub fn endpoint(
        &mut self,
        segment: impl Into<Segment>,
        options: impl Into<EndpointOptions>,
    ) -> Result<&mut Self> {
        let mut parts = segment.into().0;
        let options = options.into();

        let mut path_parts = self.path_parts().to_vec();
        path_parts.extend(parts.iter().cloned());
        if let Some(pos) = path_parts.iter().position(|p| p.optional_capture().is_some()) {
            if pos + 1 != path_parts.len() || options.wild {
                return Err(RouterError::UnsupportedRoute {
                    path: render_path(&path_parts, options.wild),
                    reason: "only a single trailing optional capture is supported".to_string(),
                });
            }
        }

        let key = parts.pop();
        let mut scope = self.id;
        for part in parts {
            scope = self.tree.child_scope(scope, part);
        }

        let node = &self.tree.scopes[scope.0];
        let is_dynamic = node.is_dynamic || matches!(key, Some(PathPart::Capture(_)));
        let defaults = node.options.clone();

        let id = EndpointId(self.tree.endpoints.len());
        let endpoint = Endpoint::build(id, options, &defaults, path_parts, is_dynamic)?;
        if let Some(name) = endpoint.name() {
            if self.tree.names.contains_key(name) {
                return Err(RouterError::DuplicateName(name.to_string()));
            }
            self.tree.names.insert(name.to_string(), id);
        }

        self.tree.endpoints.push(endpoint);
        self.tree.scopes[scope.0]
            .children_at(key.as_ref())
            .push(RoutePart::Endpoint(id));
        Ok(self)
    }
}

fn required(part: PathPart) -> PathPart {
    match part {
        PathPart::Capture(c) if c.is_optional() => PathPart::Capture(c.clone_with(
            CaptureOverrides {
                optional: Some(false),
                ..CaptureOverrides::default()
            },
        )),
        other => other,
    }
}

/// One endpoint reached by a traversal.
#[derive(Debug, Clone, Copy)]
pub struct RouteEntry<'t> {
    /// The endpoint.
    pub endpoint: &'t Endpoint,
    /// The scope it is registered in.
    pub scope: ScopeId,
}

impl RouteEntry<'_> {
    /// Path parts from the root to the endpoint.
    #[must_use]
    pub fn path_parts(&self) -> &[PathPart] {
        self.endpoint.path_parts()
    }
}

/// Depth-first iterator over a [`RouteTree`].
pub struct Walk<'t> {
    tree: &'t RouteTree,
    /// (scope, child entry index, node index within the entry)
    stack: Vec<(ScopeId, usize, usize)>,
}

impl<'t> Iterator for Walk<'t> {
    type Item = RouteEntry<'t>;

    fn next(&mut self) -> Option<Self::Item> {
        let tree = self.tree;
        loop {
            let frame = self.stack.last_mut()?;
            let scope_id = frame.0;
            let Some((_, nodes)) = tree.scopes[scope_id.0].children.get(frame.1) else {
                self.stack.pop();
                continue;
            };
            let Some(&node) = nodes.get(frame.2) else {
                frame.1 += 1;
                frame.2 = 0;
                continue;
            };
            frame.2 += 1;
            match node {
                RoutePart::Scope(child) => self.stack.push((child, 0, 0)),
                RoutePart::Endpoint(id) => {
                    return Some(RouteEntry {
                        endpoint: tree.endpoint(id),
                        scope: scope_id,
                    })
                }
            }
        }
    }
}

/// Serializable description of an endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteInfo {
    /// Route name.
    pub name: Option<String>,
    /// Fully-qualified path.
    pub path: String,
    /// Accepted methods.
    pub methods: Vec<Method>,
    /// Accepted content types; `None` accepts anything.
    pub content_types: Option<Vec<String>>,
    /// Whether any path part is a capture.
    pub dynamic: bool,
    /// Whether trailing segments are consumed.
    pub wild: bool,
}

impl From<&Endpoint> for RouteInfo {
    fn from(endpoint: &Endpoint) -> Self {
        Self {
            name: endpoint.name().map(str::to_string),
            path: endpoint.path().to_string(),
            methods: endpoint.methods().iter().copied().collect(),
            content_types: endpoint
                .content_types()
                .map(|list| list.iter().map(ContentTypeMatcher::as_listing).collect()),
            dynamic: endpoint.is_dynamic(),
            wild: endpoint.is_wild(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::ParamType;

    fn paths(tree: &RouteTree) -> Vec<String> {
        tree.entries()
            .map(|e| e.endpoint.path().to_string())
            .collect()
    }

    #[test]
    fn test_traversal_follows_declaration_order() {
        let mut tree = RouteTree::new();
        let mut root = tree.root();
        root.endpoint("", "home").unwrap();
        root.path("api", |api| {
            api.endpoint("a", "a")?;
            api.path("nested", |n| {
                n.endpoint("deep", "deep")?;
                Ok(())
            })?;
            api.endpoint("b", "b")?;
            Ok(())
        })
        .unwrap();
        root.endpoint("z", "z").unwrap();

        assert_eq!(
            paths(&tree),
            vec!["/", "/api/a", "/api/nested/deep", "/api/b", "/z"]
        );
    }

    #[test]
    fn test_scope_reused_for_same_literal() {
        let mut tree = RouteTree::new();
        let mut root = tree.root();
        root.path("api", |api| {
            api.endpoint("one", "one")?;
            Ok(())
        })
        .unwrap();
        root.endpoint("other", "other").unwrap();
        root.path("api", |api| {
            api.endpoint("two", "two")?;
            Ok(())
        })
        .unwrap();

        assert_eq!(paths(&tree), vec!["/api/one", "/api/two", "/other"]);
    }

    #[test]
    fn test_same_key_holds_sibling_endpoints() {
        let mut tree = RouteTree::new();
        tree.root()
            .endpoint("items", EndpointOptions::new("list").methods(["GET"]))
            .unwrap()
            .endpoint("items", EndpointOptions::new("create").methods(["POST"]))
            .unwrap();
        assert_eq!(tree.len(), 2);
        assert_eq!(tree.scopes[0].children.len(), 1);
        assert_eq!(paths(&tree), vec!["/items", "/items"]);
    }

    #[test]
    fn test_dynamic_flag_and_promotion() {
        let mut tree = RouteTree::new();
        let mut root = tree.root();
        let org = Capture::new("org").optional();
        root.path(&org, |scope| {
            assert!(scope.is_dynamic());
            match &scope.path_parts()[0] {
                PathPart::Capture(c) => assert!(!c.is_optional()),
                PathPart::Literal(_) => panic!("expected capture"),
            }
            scope.endpoint("settings", "settings")?;
            Ok(())
        })
        .unwrap();
        root.endpoint("static", "static").unwrap();

        let routes = tree.routes();
        assert_eq!(routes[0].path, "/:org/settings");
        assert!(routes[0].dynamic);
        assert!(!routes[1].dynamic);
    }

    #[test]
    fn test_optional_capture_must_be_last() {
        let mut tree = RouteTree::new();
        let id = Capture::new("id").optional();
        let err = tree
            .root()
            .endpoint(vec![PathPart::from(&id), "edit".into()], "edit")
            .err()
            .unwrap();
        assert!(matches!(err, RouterError::UnsupportedRoute { .. }));
    }

    #[test]
    fn test_scope_capture_with_overrides() {
        let mut tree = RouteTree::new();
        tree.root()
            .path("pages", |pages| {
                let page = pages.capture_with(
                    "page",
                    ParamType::String,
                    CaptureOverrides {
                        optional: Some(true),
                        param_type: Some(ParamType::Number),
                    },
                );
                assert!(page.is_optional());
                pages.endpoint(&page, "pages")?;
                Ok(())
            })
            .unwrap();
        let endpoint = tree.endpoints().next().unwrap();
        assert_eq!(endpoint.path(), "/pages/:page?");
        assert!(matches!(
            endpoint.path_parts().last(),
            Some(PathPart::Capture(c)) if c.is_optional()
                && matches!(c.evaluator(), Evaluator::Coerce(ParamType::Number))
        ));
    }

    #[test]
    fn test_scope_options_cascade() {
        let mut tree = RouteTree::new();
        let options = ScopeOptions::new()
            .methods(["POST"])
            .content_type("application/json")
            .query_param("token", QueryParam::new().required());
        tree.root()
            .path_with("api", &options, |api| {
                api.endpoint("inherit", "inherit")?;
                api.endpoint("own", EndpointOptions::new("own").methods(["PUT"]))?;
                Ok(())
            })
            .unwrap();

        let inherit = tree.endpoints().next().unwrap();
        assert!(inherit.methods().contains(&Method::Post));
        assert!(inherit.content_types().is_some());
        assert!(inherit.query_params().contains_key("token"));

        let own = tree.endpoints().nth(1).unwrap();
        assert!(own.methods().contains(&Method::Put));
        assert!(!own.methods().contains(&Method::Post));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let mut tree = RouteTree::new();
        let mut root = tree.root();
        root.endpoint("a", EndpointOptions::new("a").name("dup"))
            .unwrap();
        let err = root
            .endpoint("b", EndpointOptions::new("b").name("dup"))
            .err()
            .unwrap();
        assert!(matches!(err, RouterError::DuplicateName(_)));
    }

    #[test]
    fn test_walk_stops_early() {
        let mut tree = RouteTree::new();
        tree.root()
            .endpoint("a", "a")
            .unwrap()
            .endpoint("b", "b")
            .unwrap()
            .endpoint("c", "c")
            .unwrap();

        let mut visited = 0;
        let found = tree.walk_routes(|entry| {
            visited += 1;
            if entry.endpoint.path() == "/b" {
                ControlFlow::Break(entry.endpoint.id())
            } else {
                ControlFlow::Continue(())
            }
        });
        assert_eq!(visited, 2);
        assert_eq!(found.map(|id| tree.endpoint(id).path()), Some("/b"));
    }

    #[test]
    fn test_url_for() {
        let mut tree = RouteTree::new();
        let id = Capture::typed("id", ParamType::Number);
        let mut root = tree.root();
        root.path("posts", |posts| {
            posts.endpoint(&id, EndpointOptions::new("show").name("post"))?;
            posts.endpoint(
                vec![PathPart::from(&id), "files".into()],
                EndpointOptions::new("files").name("files").wild(),
            )?;
            Ok(())
        })
        .unwrap();

        let mut params = Params::new();
        params.insert("id", 7);
        assert_eq!(tree.url_for("post", &params).unwrap(), "/posts/7");

        params.insert(RELATIVE_PATH, "a/b.txt");
        assert_eq!(
            tree.url_for("files", &params).unwrap(),
            "/posts/7/files/a/b.txt"
        );

        assert!(matches!(
            tree.url_for("post", &Params::new()),
            Err(RouterError::MissingParam { .. })
        ));
        assert!(matches!(
            tree.url_for("nope", &params),
            Err(RouterError::RouteNotFound(_))
        ));
    }

    #[test]
    fn test_route_listing_serializes() {
        let mut tree = RouteTree::new();
        tree.root()
            .endpoint(
                "upload",
                EndpointOptions::new("upload")
                    .methods(["POST"])
                    .content_type("image/png"),
            )
            .unwrap();
        let json = serde_json::to_value(tree.routes()).unwrap();
        assert_eq!(json[0]["path"], "/upload");
        assert_eq!(json[0]["methods"], serde_json::json!(["POST", "OPTIONS"]));
        assert_eq!(json[0]["content_types"], serde_json::json!(["image/png"]));
    }
}
