//! Route table and dispatcher.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::error::RouteError;
use crate::http::{status, HttpMethod, HttpRequest, HttpResponse};

pub mod handler;
pub mod pattern;

pub use handler::{Handler, HandlerFuture, HandlerResult};
pub use pattern::PathPattern;

/// A (method, pattern) pair bound to one handler.
#[derive(Clone)]
pub struct Route {
    method: HttpMethod,
    pattern: PathPattern,
    handler: Arc<dyn Handler>,
}

impl Route {
    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn pattern(&self) -> &PathPattern {
        &self.pattern
    }

    pub fn handler(&self) -> &Arc<dyn Handler> {
        &self.handler
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("pattern", &self.pattern.as_str())
            .finish_non_exhaustive()
    }
}

/// A resolved route together with the parameters it captured.
#[derive(Debug)]
pub struct RouteMatch<'a> {
    route: &'a Route,
    params: HashMap<String, String>,
}

impl<'a> RouteMatch<'a> {
    pub fn route(&self) -> &'a Route {
        self.route
    }

    pub fn params(&self) -> &HashMap<String, String> {
        &self.params
    }
}

/// Router that dispatches requests to registered handlers.
///
/// Routes are tried in registration order and the first match wins.
/// Registering the same method and pattern twice replaces the earlier handler
/// while keeping its position.
#[derive(Debug, Clone, Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    pub fn new() -> Self {
        Router { routes: Vec::new() }
    }

    pub fn add<H: Handler>(
        &mut self,
        method: HttpMethod,
        pattern: &str,
        handler: H,
    ) -> Result<(), RouteError> {
        let pattern = PathPattern::parse(pattern)?;
        let handler: Arc<dyn Handler> = Arc::new(handler);

        if let Some(existing) = self
            .routes
            .iter_mut()
            .find(|r| r.method == method && r.pattern == pattern)
        {
            log::warn!(
                "Replacing handler for {} {} (registered as {})",
                method,
                pattern,
                existing.pattern
            );
            existing.pattern = pattern;
            existing.handler = handler;
            return Ok(());
        }

        log::debug!("Registered route {} {}", method, pattern);
        self.routes.push(Route {
            method,
            pattern,
            handler,
        });
        Ok(())
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Find the route for `method` and `path`.
    ///
    /// HEAD requests fall back to GET routes when no HEAD route matches.
    pub fn resolve(&self, method: HttpMethod, path: &str) -> Option<RouteMatch<'_>> {
        self.find(method, path).or_else(|| match method {
            HttpMethod::Head => self.find(HttpMethod::Get, path),
            _ => None,
        })
    }

    fn find(&self, method: HttpMethod, path: &str) -> Option<RouteMatch<'_>> {
        self.routes
            .iter()
            .filter(|route| route.method == method)
            .find_map(|route| {
                route
                    .pattern
                    .matches(path)
                    .map(|params| RouteMatch { route, params })
            })
    }

    /// Resolve `request`, run its handler and return the response.
    ///
    /// Never fails: no match gives 404, a failing or panicking handler and a
    /// status or header that cannot be sent give 500.
    pub async fn dispatch(&self, mut request: HttpRequest) -> HttpResponse {
        let method = request.method();
        let Some(found) = self.resolve(method, request.path()) else {
            log::debug!("No route for {} {}", method, request.path());
            return HttpResponse::not_found();
        };

        let route = found.route();
        request.set_params(found.params);

        // Run on its own task so a panic is contained and reported as a JoinError.
        let mut task = AbortOnDrop(tokio::spawn(route.handler.call(request)));

        match (&mut task.0).await {
            Ok(Ok(response)) if !status::is_valid(response.status_code()) => {
                log::error!(
                    "Handler for {} {} returned invalid status {}",
                    method,
                    route.pattern,
                    response.status_code()
                );
                HttpResponse::internal_error()
            }
            Ok(Ok(response)) if response.invalid_header().is_some() => {
                log::error!(
                    "Handler for {} {} returned invalid header {:?}",
                    method,
                    route.pattern,
                    response.invalid_header().unwrap_or_default()
                );
                HttpResponse::internal_error()
            }
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                log::error!("Handler for {} {} failed: {:#}", method, route.pattern, e);
                HttpResponse::internal_error()
            }
            Err(e) => {
                log::error!("Handler for {} {} did not complete: {}", method, route.pattern, e);
                HttpResponse::internal_error()
            }
        }
    }
}

/// Aborts the handler task when the dispatch future is dropped, e.g. when
/// the connection is torn down on shutdown.
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}
