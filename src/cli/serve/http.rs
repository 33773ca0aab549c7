//! Request/response types shared by the handler layers.
//!
//! Handlers work on these plain values; only the request loop touches
//! `tiny_http` requests.

use std::io::Cursor;
use std::sync::Arc;

use anyhow::Result;
use tiny_http::{Header, Method, StatusCode};

use crate::utils::mime::types::{HTML, PLAIN};

/// An incoming request as seen by handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    /// Raw URL (path and query), possibly with a mount prefix stripped
    pub url: String,
}

impl Request {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    /// URL without the query string.
    pub fn path(&self) -> &str {
        self.url.split(['?', '#']).next().unwrap_or_default()
    }

    /// Same request at another URL.
    pub fn with_url(&self, url: impl Into<String>) -> Self {
        Self::new(self.method.clone(), url)
    }
}

/// A response produced by a handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Vec<u8>,
    /// `Location` header for redirects
    pub location: Option<String>,
}

impl Response {
    pub fn html(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            content_type: HTML,
            body: body.into().into_bytes(),
            location: None,
        }
    }

    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            content_type: PLAIN,
            body: body.into().into_bytes(),
            location: None,
        }
    }

    pub fn not_found() -> Self {
        Self::text(404, "404 Not Found")
    }

    pub fn method_not_allowed() -> Self {
        Self::text(405, "405 Method Not Allowed")
    }

    /// Permanent redirect keeping the method.
    pub fn redirect(location: impl Into<String>) -> Self {
        let location = location.into();
        Self {
            location: Some(location.clone()),
            ..Self::text(308, format!("Redirecting to {location}"))
        }
    }

    pub fn into_tiny(self) -> tiny_http::Response<Cursor<Vec<u8>>> {
        let mut response =
            tiny_http::Response::from_data(self.body).with_status_code(StatusCode(self.status));
        if let Some(header) = make_header("Content-Type", self.content_type) {
            response.add_header(header);
        }
        if let Some(header) = self.location.and_then(|l| make_header("Location", &l)) {
            response.add_header(header);
        }
        response
    }
}

fn make_header(key: &str, value: &str) -> Option<Header> {
    Header::from_bytes(key.as_bytes(), value.as_bytes()).ok()
}

/// One layer of the request pipeline.
pub trait Handler: Send + Sync {
    fn handle(&self, request: &Request) -> Result<Response>;
}

impl<H: Handler + ?Sized> Handler for Arc<H> {
    fn handle(&self, request: &Request) -> Result<Response> {
        (**self).handle(request)
    }
}

impl<H: Handler + ?Sized> Handler for Box<H> {
    fn handle(&self, request: &Request) -> Result<Response> {
        (**self).handle(request)
    }
}
