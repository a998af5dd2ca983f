//! Typed request/response model and transport abstraction
//!
//! Every call the session pipeline makes goes through the `Transport` trait.
//! `HttpTransport` is the reqwest-backed implementation used in production;
//! tests substitute scripted transports without touching the network.
//!
//! Requests carry an explicit `auth_endpoint` flag set at construction time.
//! The pipeline consults that flag, never the URL, to decide whether an
//! authorization failure may trigger a credential refresh.

pub mod error;
pub mod http;

pub use error::{Error, Result};
pub use http::HttpTransport;
pub use reqwest::header;
pub use reqwest::{Method, StatusCode};

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::de::DeserializeOwned;
use std::future::Future;
use std::pin::Pin;

/// Request payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Body {
    #[default]
    Empty,
    /// Sent as `application/json`
    Json(serde_json::Value),
    /// Sent as `application/x-www-form-urlencoded`
    Form(Vec<(String, String)>),
}

/// An outgoing call to the remote service.
///
/// `path` is relative to the transport's base URL (e.g. `/books/3`).
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    pub body: Body,
    auth_endpoint: bool,
}

impl Request {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            body: Body::Empty,
            auth_endpoint: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post_json(path: impl Into<String>, value: serde_json::Value) -> Self {
        Self::new(Method::POST, path).with_body(Body::Json(value))
    }

    /// Request targeting a login or refresh endpoint. Authorization failures
    /// on these requests are surfaced to the caller instead of being recovered.
    pub fn auth_endpoint(method: Method, path: impl Into<String>, body: Body) -> Self {
        Self {
            auth_endpoint: true,
            ..Self::new(method, path).with_body(body)
        }
    }

    pub fn with_body(mut self, body: Body) -> Self {
        self.body = body;
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn is_auth_endpoint(&self) -> bool {
        self.auth_endpoint
    }
}

/// A completed exchange with the remote service, whatever its status.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Response {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// Build a response with a serialized JSON body.
    pub fn with_json(status: StatusCode, value: &serde_json::Value) -> Self {
        let mut response = Self::new(status, value.to_string());
        response.headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        response
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status == StatusCode::UNAUTHORIZED
    }

    pub fn json<T: DeserializeOwned>(&self) -> std::result::Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Sends requests to the remote service.
///
/// Any HTTP status is a successful send; `Err` means the exchange itself did
/// not complete (connect failure, timeout, unreadable body).
///
/// Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility (`Arc<dyn Transport>`).
pub trait Transport: Send + Sync {
    fn send<'a>(
        &'a self,
        request: &'a Request,
    ) -> Pin<Box<dyn Future<Output = Result<Response>> + Send + 'a>>;
}
