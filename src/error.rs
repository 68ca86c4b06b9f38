use crate::scope::CancelReason;
use std::error::Error as StdError;
use thiserror::Error;

/// Failure of a concrete codec while touching a request or response body
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("xml: {0}")]
    Xml(#[from] quick_xml::DeError),
    #[error("form: {0}")]
    Form(#[from] serde_urlencoded::de::Error),
    #[error("form: {0}")]
    FormSer(#[from] serde_urlencoded::ser::Error),
}

/// Error type throughout the jaspe stack
#[derive(Debug, Error)]
pub enum JaspeError {
    /// The negotiated decoder rejected the request body
    #[error("unable to decode request body: {0}")]
    Decode(#[source] CodecError),
    /// A flat key/value set could not be mapped onto the target's fields;
    /// the decoder's message identifies the first rejected entry
    #[error("binding: {0}")]
    Binding(#[source] serde_urlencoded::de::Error),
    /// The response body could not be serialized; nothing was flushed
    #[error("unable to encode response body: {0}")]
    Encode(#[source] CodecError),
    ///
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    /// Failure pulling body bytes from, or pushing them to, the peer
    #[error("hyper: {0}")]
    Hyper(#[from] hyper::Error),
    ///
    #[error("http: {0}")]
    Http(#[from] http::Error),
    /// The request was cancelled or ran past its deadline mid-operation
    #[error("request cancelled: {0}")]
    Canceled(CancelReason),
    /// I/O was attempted on a context not currently bound to a
    /// request/response pair
    #[error("context is not bound to a request")]
    Detached,
    /// Handler-supplied error carried through `Context::returns` untouched
    #[error("handler: {0}")]
    Handler(Box<dyn StdError + Send + Sync + 'static>),
}

impl JaspeError {
    /// Wrap a business error so it can ride through the transport unchanged.
    pub fn handler<E: StdError + Send + Sync + 'static>(e: E) -> Self {
        JaspeError::Handler(Box::new(e))
    }
}

impl From<http::header::InvalidHeaderValue> for JaspeError {
    fn from(e: http::header::InvalidHeaderValue) -> Self {
        JaspeError::Http(http::Error::from(e))
    }
}
