//! ### jaspe is a pooled per-request http context layer for async rust services
//! It sits between a hosting server/router and handler code: one [`Context`](context::Context)
//! wraps one request/response exchange, binding input from path captures, query,
//! form and structured bodies, encoding output through content-negotiated codecs,
//! and keeping the status line overridable until the first body byte goes out.
//! The server, the route matching and the middleware implementations stay outside;
//! this crate only asks them to satisfy small contracts.
//!
//! ## Quick handler setup
//! ```ignore
//! use jaspe::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn serve(request: Request) {
//! let stack = Stack::builder()
//!     .configure_codecs(|c| c.response_default(BodyFormat::Json))
//!     .build();
//! let pool = Arc::new(ContextPool::new(stack));
//!
//! let hello = handler_fn(|mut ctx: Context| async move {
//!     let res = ctx.string(StatusCode::OK, "hello").await;
//!     (ctx, res)
//! });
//!
//! // per matched request: `request` carries the router's captures
//! let (sink, receiver) = ChannelSink::new();
//! let ctx = pool.acquire(Box::new(sink), request);
//! let wrapped = ctx.middleware(hello);
//! let (ctx, _res) = wrapped(ctx).await;
//! pool.release(ctx);
//! let raw = receiver.into_response().await;
//! # }
//! ```

#[macro_use]
extern crate log;

/// Flat key/value containers and the serde-driven binder
pub mod binding;
/// The inbound request body
pub mod body;
/// Body format negotiation and the concrete codecs
pub mod codec;
/// Context enveloping every request <-> response
pub mod context;
/// Error definitions
pub mod error;
/// Handler shape and middleware chain composition
pub mod middleware;
/// Context slot pool
pub mod pool;
/// The Http Request type
pub mod request;
/// Response buffering and sinks
pub mod response;
/// Cancellation/deadline capability of a request scope
pub mod scope;
/// Shared per-server configuration
pub mod stack;
///
pub use cookie;
///
pub use http;
///
pub use hyper;

/// Contains everything you need to put a context in front of your handlers
pub mod prelude {
    ///
    pub use crate::binding::Values;
    ///
    pub use crate::body::Body;
    ///
    pub use crate::codec::BodyFormat;
    ///
    pub use crate::codec::Codecs;
    ///
    pub use crate::context::Context;
    ///
    pub use crate::context::StatusOverride;
    ///
    pub use crate::error::JaspeError;
    ///
    pub use crate::middleware::handler_fn;
    ///
    pub use crate::middleware::middleware_fn;
    ///
    pub use crate::middleware::Handler;
    ///
    pub use crate::middleware::HandlerFuture;
    ///
    pub use crate::middleware::Middleware;
    ///
    pub use crate::middleware::MiddlewareStack;
    ///
    pub use crate::pool::ContextPool;
    ///
    pub use crate::request::Request;
    ///
    pub use crate::response::ChannelSink;
    ///
    pub use crate::response::ResponseBuffer;
    ///
    pub use crate::response::ResponseReceiver;
    ///
    pub use crate::response::ResponseSink;
    ///
    pub use crate::scope::CancelHandle;
    ///
    pub use crate::scope::CancelReason;
    ///
    pub use crate::scope::RequestScope;
    ///
    pub use crate::stack::Builder;
    ///
    pub use crate::stack::Stack;
    ///
    pub use cookie::Cookie;
    ///
    pub use cookie::CookieJar;
    ///
    pub use http::header;
    ///
    pub use http::Extensions;
    ///
    pub use http::Method;
    ///
    pub use http::StatusCode;
    ///
    pub use http::Uri;
    ///
    pub use http::Version;
    ///
    pub use hyper::body::Bytes;
}
