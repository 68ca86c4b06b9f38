use futures_util::future::{pending, BoxFuture};
use http::Extensions;
use std::fmt::{Display, Formatter};
use tokio::{sync::watch, time::Instant};

/// Why a request scope's cancellation signal fired
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CancelReason {
    /// The peer went away or the hosting server tore the request down
    Cancelled,
    /// The request ran past its deadline
    DeadlineExceeded,
}

impl Display for CancelReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            CancelReason::Cancelled => f.write_str("cancelled"),
            CancelReason::DeadlineExceeded => f.write_str("deadline exceeded"),
        }
    }
}

/// Minimal cancellable capability of a request scope.
///
/// This is deliberately narrower than [`Context`](crate::context::Context):
/// code that only needs to observe cancellation receives a
/// `&dyn RequestScope` and never sees the write-capable surface. A context
/// not yet bound to a request answers with safe defaults: no deadline, a
/// signal that never fires, and a `Cancelled` reason.
pub trait RequestScope: Send {
    /// Instant after which the request should be abandoned, if any.
    fn deadline(&self) -> Option<Instant>;

    /// Resolves once the request is cancelled or its deadline passes.
    fn cancelled(&self) -> BoxFuture<'static, CancelReason>;

    /// `None` while the request is live, the reason once it is not.
    fn cancel_reason(&self) -> Option<CancelReason>;

    /// Typed ambient key/value store of the request, when one is bound.
    fn extensions(&self) -> Option<&Extensions>;
}

/// Cancellation state attached to one bound request.
///
/// Built as the receiving half of a [`CancelHandle`] pair; requests without
/// one simply never observe a cancellation.
pub struct CancelState {
    deadline: Option<Instant>,
    rx: watch::Receiver<Option<CancelReason>>,
}

impl CancelState {
    pub(crate) fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub(crate) fn reason(&self) -> Option<CancelReason> {
        if let Some(reason) = *self.rx.borrow() {
            return Some(reason);
        }
        if self.rx.has_changed().is_err() {
            // handle dropped: the request scope tore down
            return Some(CancelReason::Cancelled);
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Some(CancelReason::DeadlineExceeded);
            }
        }
        None
    }

    pub(crate) fn cancelled(&self) -> BoxFuture<'static, CancelReason> {
        let mut rx = self.rx.clone();
        let deadline = self.deadline;
        Box::pin(async move {
            let fired = async move {
                loop {
                    if let Some(reason) = *rx.borrow() {
                        return reason;
                    }
                    if rx.changed().await.is_err() {
                        return CancelReason::Cancelled;
                    }
                }
            };
            match deadline {
                Some(deadline) => tokio::select! {
                    reason = fired => reason,
                    _ = tokio::time::sleep_until(deadline) => CancelReason::DeadlineExceeded,
                },
                None => fired.await,
            }
        })
    }
}

/// A signal that never fires, handed out by contexts observed before they
/// are bound to a live request.
pub(crate) fn never() -> BoxFuture<'static, CancelReason> {
    Box::pin(pending())
}

/// Server-glue half of the cancellation pair: fires the signal for the
/// request carrying the matching [`CancelState`]. Dropping the handle
/// counts as a cancellation, so request teardown releases every waiter.
pub struct CancelHandle {
    tx: watch::Sender<Option<CancelReason>>,
}

impl CancelHandle {
    /// A pair without a deadline.
    pub fn new() -> (CancelHandle, CancelState) {
        Self::build(None)
    }

    /// A pair whose signal also fires once `deadline` passes.
    pub fn with_deadline(deadline: Instant) -> (CancelHandle, CancelState) {
        Self::build(Some(deadline))
    }

    fn build(deadline: Option<Instant>) -> (CancelHandle, CancelState) {
        let (tx, rx) = watch::channel(None);
        (CancelHandle { tx }, CancelState { deadline, rx })
    }

    /// Fire the signal explicitly.
    pub fn cancel(&self) {
        let _ = self.tx.send(Some(CancelReason::Cancelled));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn reason_is_none_until_the_signal_fires() {
        let (handle, state) = CancelHandle::new();
        assert_eq!(state.reason(), None);
        handle.cancel();
        assert_eq!(state.reason(), Some(CancelReason::Cancelled));
        assert_eq!(state.cancelled().await, CancelReason::Cancelled);
    }

    #[tokio::test]
    async fn dropping_the_handle_counts_as_cancellation() {
        let (handle, state) = CancelHandle::new();
        drop(handle);
        assert_eq!(state.cancelled().await, CancelReason::Cancelled);
        assert_eq!(state.reason(), Some(CancelReason::Cancelled));
    }

    #[tokio::test]
    async fn deadline_fires_the_signal() {
        let (_handle, state) = CancelHandle::with_deadline(Instant::now() + Duration::from_millis(20));
        assert!(state.deadline().is_some());
        assert_eq!(state.reason(), None);
        assert_eq!(state.cancelled().await, CancelReason::DeadlineExceeded);
    }
}
