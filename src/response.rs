use crate::error::JaspeError;
use async_trait::async_trait;
use http::{HeaderMap, Response as RawResponse, StatusCode};
use hyper::{body::Bytes, Body as RawBody};
use std::io::{Error as IoError, ErrorKind};
use tokio::sync::oneshot;

/// Write half of one HTTP exchange, supplied by the hosting server.
///
/// Implementations transport the status line exactly once and body bytes in
/// the order they are handed over. Header mutations after the head went out
/// are lost by construction, per HTTP semantics.
#[async_trait]
pub trait ResponseSink: Send {
    /// The outgoing header map, writable until the head is sent.
    fn headers_mut(&mut self) -> &mut HeaderMap;

    /// Emit the status line together with the headers accumulated so far.
    /// Called at most once per exchange.
    async fn send_head(&mut self, status: StatusCode) -> Result<(), JaspeError>;

    /// Emit one chunk of body bytes.
    async fn send_data(&mut self, chunk: Bytes) -> Result<(), JaspeError>;
}

/// Buffers the status code so it stays overridable until the first body
/// byte is flushed.
///
/// The underlying sink's status line goes out at most once, triggered by
/// the first body write since the buffer was (re)bound, carrying whatever
/// status is pending *at that moment*.
pub struct ResponseBuffer {
    sink: Option<Box<dyn ResponseSink>>,
    status: StatusCode,
    head_sent: bool,
}

impl ResponseBuffer {
    /// A buffer not yet bound to a sink; writes fail with
    /// [`JaspeError::Detached`].
    pub(crate) fn detached() -> Self {
        ResponseBuffer {
            sink: None,
            status: StatusCode::OK,
            head_sent: false,
        }
    }

    /// Bind to a new sink. The pending status returns to `200 OK` and the
    /// head counts as unsent. No I/O is performed.
    pub(crate) fn rebind(&mut self, sink: Box<dyn ResponseSink>) {
        self.sink = Some(sink);
        self.status = StatusCode::OK;
        self.head_sent = false;
    }

    /// Drop the current sink (pool release path).
    pub(crate) fn unbind(&mut self) {
        self.sink = None;
        self.status = StatusCode::OK;
        self.head_sent = false;
    }

    /// The pending status code.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// In-memory update only; the last value set before the first body byte
    /// is what the status line carries. Calls after the head went out keep
    /// the pending field current but cannot reach the wire anymore.
    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    /// Whether the status line already went out.
    pub fn head_sent(&self) -> bool {
        self.head_sent
    }

    /// Outgoing headers, `None` while detached. Headers must be in place
    /// before the first body write.
    pub fn headers_mut(&mut self) -> Option<&mut HeaderMap> {
        self.sink.as_mut().map(|sink| sink.headers_mut())
    }

    /// Emit the status line now if it has not gone out yet.
    pub async fn flush_head(&mut self) -> Result<(), JaspeError> {
        let sink = self.sink.as_mut().ok_or(JaspeError::Detached)?;
        if !self.head_sent {
            sink.send_head(self.status).await?;
            self.head_sent = true;
        }
        Ok(())
    }

    /// Write body bytes. The first call since the buffer was bound emits
    /// the status line with the current pending code; every call forwards
    /// the chunk.
    pub async fn write(&mut self, chunk: Bytes) -> Result<(), JaspeError> {
        self.flush_head().await?;
        self.sink
            .as_mut()
            .ok_or(JaspeError::Detached)?
            .send_data(chunk)
            .await
    }
}

/// Head of an outgoing response, as handed to the hosting server by a
/// [`ChannelSink`].
#[derive(Debug)]
pub struct ResponseHead {
    pub status: StatusCode,
    pub headers: HeaderMap,
}

/// Production sink bridging to hyper: the head travels over a oneshot, the
/// body over `hyper::Body::channel`, so the hosting server can assemble and
/// start streaming the raw response while the handler is still writing.
pub struct ChannelSink {
    headers: HeaderMap,
    head_tx: Option<oneshot::Sender<ResponseHead>>,
    body_tx: hyper::body::Sender,
}

impl ChannelSink {
    pub fn new() -> (ChannelSink, ResponseReceiver) {
        let (head_tx, head_rx) = oneshot::channel();
        let (body_tx, body) = RawBody::channel();
        (
            ChannelSink {
                headers: HeaderMap::new(),
                head_tx: Some(head_tx),
                body_tx,
            },
            ResponseReceiver { head: head_rx, body },
        )
    }
}

#[async_trait]
impl ResponseSink for ChannelSink {
    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    async fn send_head(&mut self, status: StatusCode) -> Result<(), JaspeError> {
        let tx = self
            .head_tx
            .take()
            .ok_or_else(|| JaspeError::Io(IoError::new(ErrorKind::InvalidInput, "status line already sent")))?;
        let headers = std::mem::take(&mut self.headers);
        tx.send(ResponseHead { status, headers })
            .map_err(|_| JaspeError::Io(IoError::new(ErrorKind::BrokenPipe, "response receiver went away")))
    }

    async fn send_data(&mut self, chunk: Bytes) -> Result<(), JaspeError> {
        self.body_tx.send_data(chunk).await.map_err(JaspeError::from)
    }
}

/// Receiving half of a [`ChannelSink`] pair.
pub struct ResponseReceiver {
    head: oneshot::Receiver<ResponseHead>,
    body: RawBody,
}

impl ResponseReceiver {
    /// Await the head and assemble the raw response for the hosting server.
    /// The body streams through as the context keeps writing it.
    pub async fn into_response(self) -> Result<RawResponse<RawBody>, JaspeError> {
        let head = self.head.await.map_err(|_| {
            JaspeError::Io(IoError::new(
                ErrorKind::UnexpectedEof,
                "sink dropped before a response was written",
            ))
        })?;
        let mut response = RawResponse::new(self.body);
        *response.status_mut() = head.status;
        *response.headers_mut() = head.headers;
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Recorded {
        head: Option<StatusCode>,
        head_writes: usize,
        body: Vec<u8>,
    }

    struct RecordingSink {
        headers: HeaderMap,
        recorded: Arc<Mutex<Recorded>>,
    }

    impl RecordingSink {
        fn new() -> (RecordingSink, Arc<Mutex<Recorded>>) {
            let recorded = Arc::new(Mutex::new(Recorded::default()));
            (
                RecordingSink {
                    headers: HeaderMap::new(),
                    recorded: recorded.clone(),
                },
                recorded,
            )
        }
    }

    #[async_trait]
    impl ResponseSink for RecordingSink {
        fn headers_mut(&mut self) -> &mut HeaderMap {
            &mut self.headers
        }

        async fn send_head(&mut self, status: StatusCode) -> Result<(), JaspeError> {
            let mut recorded = self.recorded.lock().unwrap();
            recorded.head = Some(status);
            recorded.head_writes += 1;
            Ok(())
        }

        async fn send_data(&mut self, chunk: Bytes) -> Result<(), JaspeError> {
            self.recorded.lock().unwrap().body.extend_from_slice(&chunk);
            Ok(())
        }
    }

    #[tokio::test]
    async fn head_waits_for_the_first_body_byte_and_takes_the_last_status() {
        let (sink, recorded) = RecordingSink::new();
        let mut buffer = ResponseBuffer::detached();
        buffer.rebind(Box::new(sink));

        buffer.set_status(StatusCode::CREATED);
        buffer.set_status(StatusCode::IM_A_TEAPOT);
        assert!(recorded.lock().unwrap().head.is_none());

        buffer.write(Bytes::from_static(b"a")).await.unwrap();
        buffer.set_status(StatusCode::INTERNAL_SERVER_ERROR);
        buffer.write(Bytes::from_static(b"b")).await.unwrap();

        let recorded = recorded.lock().unwrap();
        assert_eq!(recorded.head, Some(StatusCode::IM_A_TEAPOT));
        assert_eq!(recorded.head_writes, 1);
        assert_eq!(recorded.body, b"ab");
    }

    #[tokio::test]
    async fn rebind_restores_the_default_status() {
        let (first, _) = RecordingSink::new();
        let (second, recorded) = RecordingSink::new();
        let mut buffer = ResponseBuffer::detached();

        buffer.rebind(Box::new(first));
        buffer.set_status(StatusCode::NOT_FOUND);
        buffer.rebind(Box::new(second));
        assert_eq!(buffer.status(), StatusCode::OK);

        buffer.write(Bytes::from_static(b"ok")).await.unwrap();
        assert_eq!(recorded.lock().unwrap().head, Some(StatusCode::OK));
    }

    #[tokio::test]
    async fn detached_buffer_refuses_to_write() {
        let mut buffer = ResponseBuffer::detached();
        assert!(matches!(
            buffer.write(Bytes::from_static(b"x")).await,
            Err(JaspeError::Detached)
        ));
    }
}
