//! Responses with a single-use body.
//!
//! A `Response` body can be read exactly once. Returning a response to the page
//! and writing it to a store are two independent consumers, so callers that need
//! both must `try_clone()` before either one reads the body. `Response` is not
//! `Clone` on purpose: the duplication is always explicit.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::Error;

/// Where a response came from, mirroring the fetch response taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    /// Same-origin network response.
    Basic,
    /// Cross-origin response the page may read.
    Cors,
    /// Cross-origin response the page may not read.
    Opaque,
    /// Synthesized locally.
    Default,
}

impl ResponseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseType::Basic => "basic",
            ResponseType::Cors => "cors",
            ResponseType::Opaque => "opaque",
            ResponseType::Default => "default",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "basic" => ResponseType::Basic,
            "cors" => ResponseType::Cors,
            "opaque" => ResponseType::Opaque,
            _ => ResponseType::Default,
        }
    }
}

/// A response body that yields its bytes once.
#[derive(Debug)]
pub struct Body {
    inner: Option<Bytes>,
}

impl Body {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self { inner: Some(bytes.into()) }
    }

    pub fn is_used(&self) -> bool {
        self.inner.is_none()
    }

    /// Take the bytes, leaving the body used.
    pub fn take(&mut self) -> Result<Bytes, Error> {
        self.inner
            .take()
            .ok_or_else(|| Error::BodyUsed("body has already been consumed".into()))
    }

    fn duplicate(&self) -> Result<Self, Error> {
        match &self.inner {
            Some(bytes) => Ok(Self { inner: Some(bytes.clone()) }),
            None => Err(Error::BodyUsed("cannot clone a consumed body".into())),
        }
    }
}

/// A network, stored, or synthesized response.
#[derive(Debug)]
pub struct Response {
    pub status: u16,
    pub status_text: String,
    pub headers: Vec<(String, String)>,
    pub response_type: ResponseType,
    /// Final URL, when the response came from the network or a store.
    pub url: Option<String>,
    body: Body,
}

impl Response {
    pub fn new(status: u16, status_text: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            status_text: status_text.into(),
            headers: Vec::new(),
            response_type: ResponseType::Default,
            url: None,
            body: Body::new(body),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_headers(mut self, headers: Vec<(String, String)>) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_type(mut self, response_type: ResponseType) -> Self {
        self.response_type = response_type;
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Synthesized `503 Service Unavailable` with a plain-text body.
    pub fn service_unavailable(message: &str) -> Self {
        Self::new(503, "Service Unavailable", message.to_string()).with_header("Content-Type", "text/plain")
    }

    /// Status in the 200-299 range.
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Eligible for storage: exactly 200 and same-origin.
    pub fn is_storable(&self) -> bool {
        self.status == 200 && self.response_type == ResponseType::Basic
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    pub fn body_used(&self) -> bool {
        self.body.is_used()
    }

    /// Duplicate the response, including an independent handle on the body.
    ///
    /// Fails with `BODY_USED` once the body has been read.
    pub fn try_clone(&self) -> Result<Self, Error> {
        Ok(Self {
            status: self.status,
            status_text: self.status_text.clone(),
            headers: self.headers.clone(),
            response_type: self.response_type,
            url: self.url.clone(),
            body: self.body.duplicate()?,
        })
    }

    /// Read the body, leaving this response with a used body.
    pub fn take_body(&mut self) -> Result<Bytes, Error> {
        self.body.take()
    }

    /// Consume the response and return its body.
    pub fn bytes(mut self) -> Result<Bytes, Error> {
        self.body.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_reads_once() {
        let mut response = Response::new(200, "OK", "hello");
        assert_eq!(response.take_body().unwrap(), Bytes::from("hello"));
        assert!(response.body_used());
        assert!(matches!(response.take_body(), Err(Error::BodyUsed(_))));
    }

    #[test]
    fn test_clone_before_consumption() {
        let response = Response::new(200, "OK", "payload").with_header("ETag", "\"v1\"");
        let copy = response.try_clone().unwrap();

        assert_eq!(response.bytes().unwrap(), Bytes::from("payload"));
        assert_eq!(copy.header("etag"), Some("\"v1\""));
        assert_eq!(copy.bytes().unwrap(), Bytes::from("payload"));
    }

    #[test]
    fn test_clone_after_consumption_fails() {
        let mut response = Response::new(200, "OK", "payload");
        response.take_body().unwrap();
        assert!(matches!(response.try_clone(), Err(Error::BodyUsed(_))));
    }

    #[test]
    fn test_storable_requires_200_basic() {
        let basic = Response::new(200, "OK", "").with_type(ResponseType::Basic);
        let cors = Response::new(200, "OK", "").with_type(ResponseType::Cors);
        let partial = Response::new(206, "Partial Content", "").with_type(ResponseType::Basic);

        assert!(basic.is_storable());
        assert!(!cors.is_storable());
        assert!(!partial.is_storable());
        assert!(partial.ok());
    }

    #[test]
    fn test_service_unavailable() {
        let response = Response::service_unavailable("Offline");
        assert_eq!(response.status, 503);
        assert_eq!(response.status_text, "Service Unavailable");
        assert_eq!(response.content_type(), Some("text/plain"));
        assert_eq!(response.response_type, ResponseType::Default);
        assert_eq!(response.bytes().unwrap(), Bytes::from("Offline"));
    }
}
