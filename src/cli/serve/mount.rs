//! Serve a handler below a URL prefix.

use anyhow::Result;

use super::http::{Handler, Request, Response};

/// Forwards `prefix/...` to the inner handler with the prefix stripped.
///
/// The bare prefix redirects to `prefix/`; anything outside it is 404.
pub struct Mount<H> {
    /// Normalized: leading slash, no trailing slash
    prefix: String,
    inner: H,
}

impl<H: Handler> Mount<H> {
    pub fn new(prefix: impl Into<String>, inner: H) -> Self {
        Self {
            prefix: prefix.into(),
            inner,
        }
    }
}

impl<H: Handler> Handler for Mount<H> {
    fn handle(&self, request: &Request) -> Result<Response> {
        let Some(rest) = request.url.strip_prefix(self.prefix.as_str()) else {
            return Ok(Response::not_found());
        };

        if rest.is_empty() || rest.starts_with(['?', '#']) {
            return Ok(Response::redirect(format!("{}/{rest}", self.prefix)));
        }
        if !rest.starts_with('/') {
            // `/ledgerx` is not below `/ledger`
            return Ok(Response::not_found());
        }

        self.inner.handle(&request.with_url(rest))
    }
}
