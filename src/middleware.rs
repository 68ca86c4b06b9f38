use std::sync::Arc;

use futures::future::{BoxFuture, Future};

use crate::{context::Context, error::JaspeError};

/// Future returned by a handler. The context travels with the outcome so
/// outer layers and the pool keep working with it afterwards.
pub type HandlerFuture = BoxFuture<'static, (Context, Result<(), JaspeError>)>;

/// A unit of request-handling logic operating on an owned context.
pub type Handler = Arc<dyn Fn(Context) -> HandlerFuture + Send + Sync>;

/// A decorator around a handler: takes the next handler, returns the
/// wrapped one. Cross-cutting behavior (authentication, logging, recovery,
/// ...) composes out of these.
pub type Middleware = Arc<dyn Fn(Handler) -> Handler + Send + Sync>;

/// Lift an async closure into a [`Handler`].
///
/// ```ignore
/// let hello = handler_fn(|mut ctx: Context| async move {
///     let res = ctx.string(StatusCode::OK, "hello").await;
///     (ctx, res)
/// });
/// ```
pub fn handler_fn<F, Fut>(f: F) -> Handler
where
    F: Fn(Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (Context, Result<(), JaspeError>)> + Send + 'static,
{
    Arc::new(move |ctx| Box::pin(f(ctx)))
}

/// Lift a wrapping closure into a [`Middleware`].
pub fn middleware_fn<F>(f: F) -> Middleware
where
    F: Fn(Handler) -> Handler + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Ordered decorator chain applied to every handler the server runs.
///
/// Layers wrap in application order: the first one applied sees the request
/// first and the response last. Ordering is fixed at configuration time.
#[derive(Clone, Default)]
pub struct MiddlewareStack {
    layers: Vec<Middleware>,
}

impl MiddlewareStack {
    pub fn new() -> Self {
        MiddlewareStack::default()
    }

    /// Method to apply a new middleware onto the stack.
    pub fn apply(mut self, middleware: Middleware) -> Self {
        self.layers.push(middleware);
        self
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Wrap `handler` with every configured layer.
    pub fn wrap(&self, handler: Handler) -> Handler {
        self.layers.iter().rev().fold(handler, |next, layer| layer(next))
    }
}
