use std::sync::Arc;

use parking_lot::Mutex;

use crate::{context::Context, request::Request, response::ResponseSink, stack::Stack};

/// Idle slots kept by default before released contexts are dropped instead
/// of parked.
pub const DEFAULT_MAX_IDLE: usize = 64;

/// Slot pool of reusable contexts.
///
/// `acquire` hands out *ownership* of a freshly bound context; `release`
/// takes it back, clears the binding and parks the slot. Moving the context
/// by value is what enforces single-owner-at-a-time: no two requests can
/// hold the same slot, and a slot is only rebound after the previous
/// exchange returned it. The mutex below is the one shared structure;
/// everything a context touches beyond it is exclusively owned.
pub struct ContextPool {
    stack: Arc<Stack>,
    idle: Mutex<Vec<Context>>,
    max_idle: usize,
}

impl ContextPool {
    pub fn new(stack: Arc<Stack>) -> Self {
        Self::with_max_idle(stack, DEFAULT_MAX_IDLE)
    }

    pub fn with_max_idle(stack: Arc<Stack>, max_idle: usize) -> Self {
        ContextPool {
            stack,
            idle: Mutex::new(Vec::new()),
            max_idle,
        }
    }

    pub fn stack(&self) -> &Arc<Stack> {
        &self.stack
    }

    /// Take a slot (or allocate one) and bind it to the live pair.
    pub fn acquire(&self, sink: Box<dyn ResponseSink>, request: Request) -> Context {
        let mut ctx = self
            .idle
            .lock()
            .pop()
            .unwrap_or_else(|| Context::detached(self.stack.clone()));
        ctx.reset(sink, request);
        ctx
    }

    /// Return a slot once the response is fully written. The binding is
    /// cleared before the slot becomes visible to other workers.
    pub fn release(&self, mut ctx: Context) {
        ctx.unbind();
        let mut idle = self.idle.lock();
        if idle.len() < self.max_idle {
            idle.push(ctx);
        } else {
            trace!("context pool at capacity, dropping a released slot");
        }
    }

    /// Number of parked slots.
    pub fn idle_len(&self) -> usize {
        self.idle.lock().len()
    }
}
