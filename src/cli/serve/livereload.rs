//! Live-reload client injection.

use anyhow::Result;

use super::http::{Handler, Request, Response};
use crate::embed::serve::{LIVERELOAD_SCRIPT, LivereloadVars};
use crate::utils::mime::is_html;

/// Adds the live-reload client to every HTML response.
///
/// Must sit inside the prefix mount: the first path segment it sees is the
/// source key of the page.
pub struct Livereload<H> {
    inner: H,
    ws_port: u16,
}

impl<H: Handler> Livereload<H> {
    pub fn new(inner: H, ws_port: u16) -> Self {
        Self { inner, ws_port }
    }
}

impl<H: Handler> Handler for Livereload<H> {
    fn handle(&self, request: &Request) -> Result<Response> {
        let mut response = self.inner.handle(request)?;
        if is_html(response.content_type) {
            let script = LIVERELOAD_SCRIPT.render(&LivereloadVars {
                ws_port: self.ws_port,
                source: page_source(request.path()).map(str::to_string),
            });
            response.body = inject_script(&response.body, &script);
        }
        Ok(response)
    }
}

/// Source key of a page URL: its first path segment.
fn page_source(path: &str) -> Option<&str> {
    path.trim_start_matches('/')
        .split('/')
        .next()
        .filter(|segment| !segment.is_empty())
}

/// Inject `script` before the last `</body>` tag, or append it.
fn inject_script(content: &[u8], script: &str) -> Vec<u8> {
    const PATTERN: &[u8] = b"</body>";

    let script = script.as_bytes();
    let pos = content
        .windows(PATTERN.len())
        .rposition(|w| w.eq_ignore_ascii_case(PATTERN))
        .unwrap_or(content.len());

    let mut result = Vec::with_capacity(content.len() + script.len());
    result.extend_from_slice(&content[..pos]);
    result.extend_from_slice(script);
    result.extend_from_slice(&content[pos..]);
    result
}
