use std::sync::Arc;

use crate::{
    codec::Codecs,
    middleware::{Handler, MiddlewareStack},
};

/// Read-only per-server configuration shared by every pooled context: the
/// codec defaults and the middleware chain. Built once at startup, then
/// only ever read, so contexts share it through an `Arc` without locking.
pub struct Stack {
    codecs: Codecs,
    middlewares: MiddlewareStack,
}

impl Stack {
    /// Produce a stack builder
    #[inline]
    pub fn builder() -> Builder {
        Builder::default()
    }

    pub fn codecs(&self) -> &Codecs {
        &self.codecs
    }

    /// Wrap a handler with the configured middleware chain.
    pub fn wrap(&self, handler: Handler) -> Handler {
        self.middlewares.wrap(handler)
    }
}

/// Builder for a [`Stack`].
#[derive(Default)]
pub struct Builder {
    codecs: Codecs,
    middlewares: MiddlewareStack,
}

impl Builder {
    #[inline]
    pub fn configure_codecs<F>(mut self, f: F) -> Self
    where
        F: FnOnce(Codecs) -> Codecs,
    {
        self.codecs = f(self.codecs);
        self
    }

    #[inline]
    pub fn configure_middlewares<F>(mut self, f: F) -> Self
    where
        F: FnOnce(MiddlewareStack) -> MiddlewareStack,
    {
        self.middlewares = f(self.middlewares);
        self
    }

    pub fn build(self) -> Arc<Stack> {
        Arc::new(Stack {
            codecs: self.codecs,
            middlewares: self.middlewares,
        })
    }
}
