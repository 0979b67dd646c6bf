use std::future::Future;
use std::pin::Pin;

use crate::http::{HttpRequest, HttpResponse};

/// What a handler resolves to. Errors are turned into a 500 by the router.
pub type HandlerResult = anyhow::Result<HttpResponse>;

pub type HandlerFuture = Pin<Box<dyn Future<Output = HandlerResult> + Send + 'static>>;

/// An asynchronous request handler.
///
/// Implemented for every `Fn(HttpRequest) -> impl Future<Output = HandlerResult>`,
/// so plain `async fn`s and closures returning `async move` blocks can be
/// registered directly.
pub trait Handler: Send + Sync + 'static {
    fn call(&self, request: HttpRequest) -> HandlerFuture;
}

impl<F, Fut> Handler for F
where
    F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn call(&self, request: HttpRequest) -> HandlerFuture {
        Box::pin(self(request))
    }
}
