use crate::error::JaspeError;
use hyper::{body::Bytes, Body as RawBody};

/// Inbound request body: either the live hyper stream or bytes already
/// pulled into memory.
pub struct Body {
    inner: BodyInner,
}

enum BodyInner {
    Raw(RawBody),
    Memory(Bytes),
}

impl Body {
    pub fn empty() -> Self {
        Body {
            inner: BodyInner::Memory(Bytes::new()),
        }
    }

    pub fn from_raw(raw: RawBody) -> Self {
        Body {
            inner: BodyInner::Raw(raw),
        }
    }

    /// Drain the remaining stream into memory. The result is cached, so
    /// repeated calls hand back the same bytes without touching the
    /// connection again.
    pub async fn load(&mut self) -> Result<Bytes, JaspeError> {
        if let BodyInner::Raw(_) = self.inner {
            let raw = match std::mem::replace(&mut self.inner, BodyInner::Memory(Bytes::new())) {
                BodyInner::Raw(raw) => raw,
                BodyInner::Memory(_) => unreachable!("checked to be raw above"),
            };
            let bytes = hyper::body::to_bytes(raw).await?;
            self.inner = BodyInner::Memory(bytes);
        }

        match &self.inner {
            BodyInner::Memory(bytes) => Ok(bytes.clone()),
            BodyInner::Raw(_) => unreachable!("loaded above"),
        }
    }
}

impl Default for Body {
    fn default() -> Self {
        Body::empty()
    }
}

impl From<Bytes> for Body {
    fn from(bytes: Bytes) -> Self {
        Body {
            inner: BodyInner::Memory(bytes),
        }
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Bytes::from(bytes).into()
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Bytes::from(text).into()
    }
}

impl From<&'static str> for Body {
    fn from(text: &'static str) -> Self {
        Bytes::from_static(text.as_bytes()).into()
    }
}
