use std::{
    collections::HashMap,
    net::SocketAddr,
    ops::{Deref, DerefMut},
};

use cookie::{Cookie, CookieJar};
use http::{header, Request as RawRequest};

use crate::{
    binding::Values,
    body::Body,
    codec::{self, BodyFormat},
    scope::CancelState,
};

/// Struct that wraps a raw request + the transport-supplied trimmings:
/// router path captures, cookies, the peer address and the cancellation
/// state of the exchange.
pub struct Request {
    #[doc(hidden)]
    inner: RawRequest<Body>,
    #[doc(hidden)]
    captures: HashMap<String, String>,
    #[doc(hidden)]
    cookies: CookieJar,
    #[doc(hidden)]
    peer_addr: Option<SocketAddr>,
    #[doc(hidden)]
    cancel: Option<CancelState>,
    #[doc(hidden)]
    form: Option<Values>,
}

impl Request {
    #[doc(hidden)]
    pub fn new(raw: RawRequest<Body>, peer_addr: Option<SocketAddr>) -> Self {
        Request {
            inner: raw,
            captures: Default::default(),
            cookies: Default::default(),
            peer_addr,
            cancel: None,
            form: None,
        }
    }

    /// Wire the cancellation state handed out by
    /// [`CancelHandle`](crate::scope::CancelHandle). Requests without one
    /// never observe a cancellation.
    pub fn with_cancellation(mut self, cancel: CancelState) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Return the peer SocketAddr if one was available when receiving the
    /// request
    #[inline]
    pub fn peer_addr(&self) -> Option<&SocketAddr> {
        self.peer_addr.as_ref()
    }

    /// Access the captured variables from the request path. E.g. a path
    /// composed as `/user/{user_id}/profile` will store a capture named
    /// `"user_id"`.
    #[inline]
    pub fn captures(&self) -> &HashMap<String, String> {
        &self.captures
    }

    /// Access the captured variables from the request path, in a mutable
    /// way. This is how the hosting router deposits its captures.
    #[inline]
    pub fn captures_mut(&mut self) -> &mut HashMap<String, String> {
        &mut self.captures
    }

    /// Get the cookies sent by the browsers.
    ///
    /// Before accessing cookies, you will need to parse them, it is done
    /// with the [`parse_cookies`](#method.parse_cookies) method
    #[inline]
    pub fn cookies(&self) -> &CookieJar {
        &self.cookies
    }

    /// Get the cookies sent by the browsers in a mutable way
    #[inline]
    pub fn cookies_mut(&mut self) -> &mut CookieJar {
        &mut self.cookies
    }

    /// Parse cookies from the Cookie header
    pub fn parse_cookies(&mut self) {
        let jar = &mut self.cookies;
        if let Some(cookie_iter) = self
            .inner
            .headers()
            .get(header::COOKIE)
            .and_then(|cookies| cookies.to_str().ok())
            .map(|cookies_str| cookies_str.split("; "))
            .map(|cookie_iter| cookie_iter.filter_map(|cookie_s| Cookie::parse(cookie_s.to_string()).ok()))
        {
            cookie_iter.for_each(|c| jar.add_original(c));
        }
    }

    /// Parsed query string as a multi-valued map; malformed input yields an
    /// empty one.
    pub fn query(&self) -> Values {
        self.inner.uri().query().map(Values::from_query).unwrap_or_default()
    }

    /// Urlencoded form body merged with the query string, body pairs first.
    /// Cached after the first call; the body is only read once. Malformed
    /// input yields an empty map, never an error.
    pub async fn form(&mut self) -> Values {
        if self.form.is_none() {
            let parsed = self.parse_form().await;
            self.form = Some(parsed);
        }
        self.form.clone().unwrap_or_default()
    }

    async fn parse_form(&mut self) -> Values {
        let mut values = Values::new();

        let is_form = self
            .inner
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| BodyFormat::from_essence(codec::essence(v)) == Some(BodyFormat::Form))
            .unwrap_or(false);

        if is_form {
            match self.inner.body_mut().load().await {
                Ok(bytes) => match Values::try_from_bytes(&bytes) {
                    Ok(parsed) => values.extend(parsed),
                    Err(e) => {
                        debug!("malformed form body, falling back to an empty map: {}", e);
                        return Values::new();
                    }
                },
                Err(e) => {
                    debug!("unable to read form body: {}", e);
                    return Values::new();
                }
            }
        }

        values.extend(self.query());
        values
    }

    pub(crate) fn cancel(&self) -> Option<&CancelState> {
        self.cancel.as_ref()
    }
}

impl Deref for Request {
    type Target = RawRequest<Body>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl DerefMut for Request {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.inner
    }
}
