//! Radix-tree request router and the dispatch pipeline.
//!
//! One tree per HTTP method, O(path-length) lookup via `matchit`. The
//! router also owns the installed [`ErrorCatcher`]: `respond` runs the full
//! lookup → handler → catch pipeline for one request, which is what the
//! server calls per request and what tests drive directly.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use matchit::Router as MatchitRouter;

use crate::catch::{CatchConfig, ErrorCatcher};
use crate::error::Fault;
use crate::handler::{BoxedHandler, Handler};
use crate::method::Method;
use crate::request::Request;
use crate::response::{Response, ResponseSlot};

/// The application router.
///
/// Build it once at startup, install the catcher, pass it to
/// [`Server::serve`](crate::Server::serve). Each registration returns
/// `self` so calls chain naturally:
///
/// ```rust,no_run
/// # use crashless::{CatchConfig, Request, Response, Router, Fault};
/// # async fn get_user(_: Request) -> Result<Response, Fault> { Ok(Response::text("")) }
/// # async fn ping(_: Request) -> Response { Response::text("pong") }
/// let app = Router::new()
///     .get("/user/{id}", get_user)
///     .get("/ping", ping)
///     .catch(CatchConfig::new());
/// ```
pub struct Router {
    routes: HashMap<Method, MatchitRouter<BoxedHandler>>,
    catcher: ErrorCatcher,
}

impl Router {
    /// A router with no routes and a default-configured catcher.
    pub fn new() -> Self {
        Self {
            routes: HashMap::new(),
            catcher: ErrorCatcher::new(CatchConfig::new()),
        }
    }

    /// Installs the error catcher for this application. Call once; a later
    /// call replaces the earlier installation.
    pub fn catch(mut self, config: CatchConfig) -> Self {
        self.catcher = ErrorCatcher::new(config);
        self
    }

    /// Register a handler for a method + path pair. Returns `self` for chaining.
    ///
    /// Path parameters use `{name}` syntax — `req.param("name")` retrieves
    /// them.
    pub fn on(self, method: Method, path: &str, handler: impl Handler) -> Self {
        self.add(method, path, handler)
    }

    pub fn get(self, path: &str, handler: impl Handler) -> Self {
        self.add(Method::Get, path, handler)
    }

    pub fn post(self, path: &str, handler: impl Handler) -> Self {
        self.add(Method::Post, path, handler)
    }

    pub fn put(self, path: &str, handler: impl Handler) -> Self {
        self.add(Method::Put, path, handler)
    }

    pub fn patch(self, path: &str, handler: impl Handler) -> Self {
        self.add(Method::Patch, path, handler)
    }

    pub fn delete(self, path: &str, handler: impl Handler) -> Self {
        self.add(Method::Delete, path, handler)
    }

    fn add(mut self, method: Method, path: &str, handler: impl Handler) -> Self {
        self.routes
            .entry(method)
            .or_default()
            .insert(path, handler.into_boxed_handler())
            .unwrap_or_else(|e| panic!("invalid route `{path}`: {e}"));
        self
    }

    /// Runs one request through the full pipeline and returns the response.
    ///
    /// Lookup, handler execution (under `catch_unwind`, so a panicking
    /// handler becomes a fault rather than a torn connection), and failure
    /// capture all happen here. Unmatched paths get a bare 404; only
    /// handler failures travel the envelope path.
    pub async fn respond(&self, req: Request) -> Response {
        let method = req.method();
        let path = req.path().to_owned();

        let mut slot = ResponseSlot::new();
        match self.lookup(method, &path) {
            Some((handler, params)) => {
                let req = req.with_params(params);
                let outcome = AssertUnwindSafe(handler.call(req)).catch_unwind().await;
                match outcome {
                    Ok(Ok(response)) => slot.commit(response),
                    Ok(Err(fault)) => self.catcher.handle(fault, method, &path, &mut slot),
                    Err(payload) => {
                        self.catcher
                            .handle(Fault::from_panic(payload), method, &path, &mut slot)
                    }
                }
            }
            None => slot.commit(Response::status(404)),
        }

        slot.into_response().unwrap_or_else(|| Response::status(500))
    }

    fn lookup(
        &self,
        method: Method,
        path: &str,
    ) -> Option<(BoxedHandler, HashMap<String, String>)> {
        let tree = self.routes.get(&method)?;
        let matched = tree.at(path).ok()?;
        let handler = Arc::clone(matched.value);
        let params = matched
            .params
            .iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        Some((handler, params))
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}
