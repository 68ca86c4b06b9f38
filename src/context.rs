use std::sync::Arc;

use futures::future::BoxFuture;
use http::{header, Extensions, HeaderMap, HeaderValue, StatusCode};
use hyper::body::Bytes;
use serde::{de::DeserializeOwned, Serialize};
use tokio::{
    io::{AsyncRead, AsyncReadExt},
    time::Instant,
};

use crate::{
    binding::{self, Values},
    codec::{self, BodyFormat},
    error::JaspeError,
    middleware::Handler,
    request::Request,
    response::{ResponseBuffer, ResponseSink},
    scope::{self, CancelReason, RequestScope},
    stack::Stack,
};

/// Bytes pulled per iteration of a [`Context::stream`] copy.
const STREAM_CHUNK_BYTES: usize = 8 * 1024;

/// Queued intent to mutate the response buffer. Replayed, in insertion
/// order, by every write operation right before its body flush; cleared
/// only by [`Context::reset`].
type DeferredMutation = Box<dyn Fn(&mut ResponseBuffer) + Send + Sync>;

/// Narrow capability for influencing the final status code from deep call
/// stacks without threading the full write-capable context through every
/// layer. Handlers pass a `&mut dyn StatusOverride` down; queuing is always
/// effective.
pub trait StatusOverride {
    /// Queue a status override. It replays right before the next body
    /// flush, after the write call's own status argument, so the last
    /// queued override wins.
    fn queue_status_override(&mut self, status: StatusCode);
}

/// Per-request entry point handlers use to read input and produce output.
///
/// A context is bound to exactly one request/response pair at a time.
/// [`reset`](Context::reset) is the sole rebinding boundary, which is what
/// makes pooled reuse through [`ContextPool`](crate::pool::ContextPool)
/// safe: one worker owns the context for the whole exchange, and a slot is
/// rebound only after the previous exchange released it.
pub struct Context {
    stack: Arc<Stack>,
    request: Option<Request>,
    response: ResponseBuffer,
    deferred: Vec<DeferredMutation>,
}

impl Context {
    /// A context not yet bound to any request/response pair. The
    /// cancellation capability answers with safe defaults; I/O operations
    /// fail with [`JaspeError::Detached`].
    pub fn detached(stack: Arc<Stack>) -> Self {
        Context {
            stack,
            request: None,
            response: ResponseBuffer::detached(),
            deferred: Vec::new(),
        }
    }

    /// Bind to a new request/response pair: replaces the stored request,
    /// rebinds the response buffer (pending status back to `200 OK`) and
    /// clears the deferred-mutation queue.
    pub fn reset(&mut self, sink: Box<dyn ResponseSink>, request: Request) {
        self.response.rebind(sink);
        self.request = Some(request);
        self.deferred.clear();
    }

    /// Drop the current binding; the pool's release path.
    pub(crate) fn unbind(&mut self) {
        self.response.unbind();
        self.request = None;
        self.deferred.clear();
    }

    pub fn is_bound(&self) -> bool {
        self.request.is_some()
    }

    /// The bound request.
    pub fn request(&self) -> Option<&Request> {
        self.request.as_ref()
    }

    /// The bound request, mutably. This is where the hosting router
    /// deposits path captures before the handler chain runs.
    pub fn request_mut(&mut self) -> Option<&mut Request> {
        self.request.as_mut()
    }

    /// Router-supplied path captures, exactly one value per key.
    pub fn vars(&self) -> Values {
        match &self.request {
            Some(request) => Values::from_pairs(request.captures().iter().map(|(k, v)| (k.as_str(), v.as_str()))),
            None => Values::new(),
        }
    }

    /// Parsed query string, multi-valued.
    pub fn query(&self) -> Values {
        self.request.as_ref().map(Request::query).unwrap_or_default()
    }

    /// Form body merged with the query. Never fails: malformed input comes
    /// back as an empty map, so callers need no error arm on this path.
    pub async fn form(&mut self) -> Values {
        let mut cancelled = self.cancelled();
        let request = match self.request.as_mut() {
            Some(request) => request,
            None => return Values::new(),
        };
        tokio::select! {
            biased;
            _ = &mut cancelled => Values::new(),
            values = request.form() => values,
        }
    }

    /// The request's headers.
    pub fn headers(&self) -> Option<&HeaderMap> {
        self.request.as_ref().map(|request| request.headers())
    }

    /// Deserialize the request body into `T` using the decoder negotiated
    /// from the Content-Type (falling back to the configured default).
    pub async fn bind<T: DeserializeOwned>(&mut self) -> Result<T, JaspeError> {
        let format = {
            let request = self.request.as_ref().ok_or(JaspeError::Detached)?;
            self.stack.codecs().request_format(request.headers())
        };
        let bytes = self.load_body().await?;
        codec::decode(format, &bytes).map_err(JaspeError::Decode)
    }

    /// Bind the path captures onto the named fields of `T`.
    pub fn bind_vars<T: DeserializeOwned>(&self) -> Result<T, JaspeError> {
        binding::bind(&self.vars())
    }

    /// Bind the query pairs onto the named fields of `T`.
    pub fn bind_query<T: DeserializeOwned>(&self) -> Result<T, JaspeError> {
        binding::bind(&self.query())
    }

    /// Bind the combined form pairs onto the named fields of `T`.
    pub async fn bind_form<T: DeserializeOwned>(&mut self) -> Result<T, JaspeError> {
        binding::bind(&self.form().await)
    }

    /// The response buffer, for header access and status inspection before
    /// the first body write.
    pub fn response(&mut self) -> &mut ResponseBuffer {
        &mut self.response
    }

    /// Encode `value` with the encoder negotiated from the Accept list
    /// (falling back to the configured default) at the given status.
    pub async fn result<T: Serialize>(&mut self, status: StatusCode, value: &T) -> Result<(), JaspeError> {
        let format = {
            let request = self.request.as_ref().ok_or(JaspeError::Detached)?;
            self.stack.codecs().response_format(request.headers())
        };
        self.encoded(status, format, value).await
    }

    /// Encode `value` as JSON at the given status, regardless of
    /// negotiation.
    pub async fn json<T: Serialize>(&mut self, status: StatusCode, value: &T) -> Result<(), JaspeError> {
        self.encoded(status, BodyFormat::Json, value).await
    }

    /// Encode `value` as XML at the given status, regardless of
    /// negotiation.
    pub async fn xml<T: Serialize>(&mut self, status: StatusCode, value: &T) -> Result<(), JaspeError> {
        self.encoded(status, BodyFormat::Xml, value).await
    }

    /// Write raw text as `text/plain`.
    pub async fn string(&mut self, status: StatusCode, text: impl Into<String>) -> Result<(), JaspeError> {
        self.finalize(status, HeaderValue::from_static("text/plain"))?;
        self.write_chunk(Bytes::from(text.into())).await
    }

    /// Write raw bytes with the caller-specified content type.
    pub async fn blob(&mut self, status: StatusCode, content_type: &str, data: impl Into<Bytes>) -> Result<(), JaspeError> {
        let content_type = HeaderValue::from_str(content_type)?;
        self.finalize(status, content_type)?;
        self.write_chunk(data.into()).await
    }

    /// Copy `reader` to the response incrementally, never holding more than
    /// one chunk in memory. Aborts with [`JaspeError::Canceled`] when the
    /// request's cancellation signal fires mid-copy.
    pub async fn stream<R>(&mut self, status: StatusCode, content_type: &str, mut reader: R) -> Result<(), JaspeError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let content_type = HeaderValue::from_str(content_type)?;
        self.finalize(status, content_type)?;

        let mut cancelled = self.cancelled();
        let mut buf = vec![0u8; STREAM_CHUNK_BYTES];
        loop {
            let read = tokio::select! {
                biased;
                reason = &mut cancelled => return Err(JaspeError::Canceled(reason)),
                read = reader.read(&mut buf) => read?,
            };
            if read == 0 {
                break;
            }
            let chunk = Bytes::copy_from_slice(&buf[..read]);
            tokio::select! {
                biased;
                reason = &mut cancelled => return Err(JaspeError::Canceled(reason)),
                written = self.response.write(chunk) => written?,
            }
        }

        // an empty stream still owes the peer its status line
        self.response.flush_head().await
    }

    /// Convenience over `result`: a business error propagates unchanged and
    /// the encoder is never touched; a value encodes at `200 OK`.
    pub async fn returns<T: Serialize>(&mut self, outcome: Result<T, JaspeError>) -> Result<(), JaspeError> {
        match outcome {
            Ok(value) => self.result(StatusCode::OK, &value).await,
            Err(e) => Err(e),
        }
    }

    /// Wrap `handler` with the stack's configured middleware chain.
    pub fn middleware(&self, handler: Handler) -> Handler {
        self.stack.wrap(handler)
    }

    async fn encoded<T: Serialize>(&mut self, status: StatusCode, format: BodyFormat, value: &T) -> Result<(), JaspeError> {
        let body = codec::encode(format, value).map_err(JaspeError::Encode)?;
        self.finalize(status, format.content_type())?;
        self.write_chunk(Bytes::from(body)).await
    }

    /// The shared tail of every write operation, in this order: content
    /// type, the call's own status, then the queued overrides. An override
    /// issued before the call therefore wins at flush time.
    fn finalize(&mut self, status: StatusCode, content_type: HeaderValue) -> Result<(), JaspeError> {
        self.response
            .headers_mut()
            .ok_or(JaspeError::Detached)?
            .insert(header::CONTENT_TYPE, content_type);
        self.response.set_status(status);
        for mutation in &self.deferred {
            mutation(&mut self.response);
        }
        Ok(())
    }

    async fn write_chunk(&mut self, chunk: Bytes) -> Result<(), JaspeError> {
        let mut cancelled = self.cancelled();
        tokio::select! {
            biased;
            reason = &mut cancelled => Err(JaspeError::Canceled(reason)),
            written = self.response.write(chunk) => written,
        }
    }

    async fn load_body(&mut self) -> Result<Bytes, JaspeError> {
        let mut cancelled = self.cancelled();
        let request = self.request.as_mut().ok_or(JaspeError::Detached)?;
        tokio::select! {
            biased;
            reason = &mut cancelled => Err(JaspeError::Canceled(reason)),
            bytes = request.body_mut().load() => bytes,
        }
    }
}

impl StatusOverride for Context {
    fn queue_status_override(&mut self, status: StatusCode) {
        self.deferred.push(Box::new(move |response| response.set_status(status)));
    }
}

impl RequestScope for Context {
    fn deadline(&self) -> Option<Instant> {
        self.request.as_ref().and_then(Request::cancel).and_then(|c| c.deadline())
    }

    fn cancelled(&self) -> BoxFuture<'static, CancelReason> {
        match self.request.as_ref().and_then(Request::cancel) {
            Some(cancel) => cancel.cancelled(),
            None => scope::never(),
        }
    }

    fn cancel_reason(&self) -> Option<CancelReason> {
        match &self.request {
            Some(request) => request.cancel().and_then(|c| c.reason()),
            // observed before binding, e.g. in a pooled-reuse race
            None => Some(CancelReason::Cancelled),
        }
    }

    fn extensions(&self) -> Option<&Extensions> {
        self.request.as_ref().map(|request| request.extensions())
    }
}
