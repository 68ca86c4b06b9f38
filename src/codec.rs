use crate::error::CodecError;
use http::{header, HeaderMap, HeaderValue};
use serde::{de::DeserializeOwned, Serialize};

/// Body serialization formats the transport knows how to negotiate.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BodyFormat {
    Json,
    Xml,
    Form,
}

impl BodyFormat {
    /// Content type written alongside bodies of this format.
    pub fn content_type(self) -> HeaderValue {
        HeaderValue::from_static(match self {
            BodyFormat::Json => "application/json",
            BodyFormat::Xml => "application/xml",
            BodyFormat::Form => "application/x-www-form-urlencoded",
        })
    }

    pub(crate) fn from_essence(essence: &str) -> Option<BodyFormat> {
        match essence {
            "application/json" => Some(BodyFormat::Json),
            "application/xml" | "text/xml" => Some(BodyFormat::Xml),
            "application/x-www-form-urlencoded" => Some(BodyFormat::Form),
            _ if essence.ends_with("+json") => Some(BodyFormat::Json),
            _ if essence.ends_with("+xml") => Some(BodyFormat::Xml),
            _ => None,
        }
    }
}

/// Media type without its parameters, e.g. `text/xml; charset=utf-8` ->
/// `text/xml`.
pub(crate) fn essence(media_type: &str) -> &str {
    media_type.split(';').next().unwrap_or("").trim()
}

/// Codec configuration shared by every context of a server. Read-only once
/// the owning [`Stack`](crate::stack::Stack) is built.
#[derive(Clone, Copy, Debug)]
pub struct Codecs {
    request_default: BodyFormat,
    response_default: BodyFormat,
}

impl Default for Codecs {
    fn default() -> Self {
        Codecs {
            request_default: BodyFormat::Json,
            response_default: BodyFormat::Json,
        }
    }
}

impl Codecs {
    /// Format assumed for request bodies carrying no recognized
    /// Content-Type.
    pub fn request_default(mut self, format: BodyFormat) -> Self {
        self.request_default = format;
        self
    }

    /// Format used for responses when the Accept list names nothing we
    /// serve.
    pub fn response_default(mut self, format: BodyFormat) -> Self {
        self.response_default = format;
        self
    }

    /// Decoder implied by the request's Content-Type.
    pub fn request_format(&self, headers: &HeaderMap) -> BodyFormat {
        headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| BodyFormat::from_essence(essence(v)))
            .unwrap_or(self.request_default)
    }

    /// Encoder implied by the request's Accept list; the first recognized
    /// entry wins. Full preference-ordering negotiation is out of scope.
    pub fn response_format(&self, headers: &HeaderMap) -> BodyFormat {
        if let Some(accept) = headers.get(header::ACCEPT).and_then(|v| v.to_str().ok()) {
            for entry in accept.split(',') {
                if let Some(format) = BodyFormat::from_essence(essence(entry)) {
                    return format;
                }
            }
        }
        self.response_default
    }
}

pub(crate) fn decode<T: DeserializeOwned>(format: BodyFormat, bytes: &[u8]) -> Result<T, CodecError> {
    match format {
        BodyFormat::Json => serde_json::from_slice(bytes).map_err(CodecError::from),
        BodyFormat::Xml => quick_xml::de::from_reader(bytes).map_err(CodecError::from),
        BodyFormat::Form => serde_urlencoded::from_bytes(bytes).map_err(CodecError::from),
    }
}

pub(crate) fn encode<T: Serialize>(format: BodyFormat, value: &T) -> Result<Vec<u8>, CodecError> {
    match format {
        BodyFormat::Json => serde_json::to_vec(value).map_err(CodecError::from),
        BodyFormat::Xml => quick_xml::se::to_string(value)
            .map(String::into_bytes)
            .map_err(CodecError::from),
        BodyFormat::Form => serde_urlencoded::to_string(value)
            .map(String::into_bytes)
            .map_err(CodecError::from),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for &(name, value) in pairs {
            map.insert(
                header::HeaderName::from_static(name),
                HeaderValue::from_static(value),
            );
        }
        map
    }

    #[test]
    fn request_format_follows_content_type() {
        let codecs = Codecs::default();
        assert_eq!(
            codecs.request_format(&headers(&[("content-type", "application/xml; charset=utf-8")])),
            BodyFormat::Xml
        );
        assert_eq!(
            codecs.request_format(&headers(&[("content-type", "application/x-www-form-urlencoded")])),
            BodyFormat::Form
        );
        assert_eq!(
            codecs.request_format(&headers(&[("content-type", "application/problem+json")])),
            BodyFormat::Json
        );
        // unrecognized falls back to the configured default
        let codecs = codecs.request_default(BodyFormat::Form);
        assert_eq!(
            codecs.request_format(&headers(&[("content-type", "text/csv")])),
            BodyFormat::Form
        );
    }

    #[test]
    fn response_format_takes_the_first_recognized_accept_entry() {
        let codecs = Codecs::default();
        assert_eq!(
            codecs.response_format(&headers(&[("accept", "text/html, application/xml;q=0.9")])),
            BodyFormat::Xml
        );
        assert_eq!(codecs.response_format(&headers(&[])), BodyFormat::Json);
    }
}
