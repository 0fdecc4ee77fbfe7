//! `web_fetch`: HTTP GET with markup stripping.
//!
//! Fetches a URL, drops `<script>`/`<style>` blocks and all remaining
//! tags, decodes the common entities, and collapses whitespace so the
//! model gets prose instead of markup. The raw payload is capped at
//! 10 MiB before stripping.

use std::time::Duration;

use tracing::{debug, info};

use crate::AgentError;
use crate::cancel::CancelFlag;

/// Raw payload cap.
pub const MAX_FETCH_BYTES: usize = 10 * 1024 * 1024;

/// Fetch `url` and return its stripped text content.
pub async fn web_fetch(url: &str, cancel: &CancelFlag) -> Result<String, AgentError> {
    if cancel.is_cancelled() {
        return Err(AgentError::Cancelled);
    }
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(AgentError::InvalidArgument(format!(
            "web_fetch needs an http(s) URL, got '{url}'"
        )));
    }

    info!("[web_fetch] GET {url}");
    let client = reqwest::Client::builder()
        .user_agent("tether/0.1")
        .timeout(Duration::from_secs(30))
        .build()
        .map_err(|e| AgentError::Io(format!("failed to build HTTP client: {e}")))?;

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| AgentError::Io(format!("request failed: {e}")))?;

    if cancel.is_cancelled() {
        return Err(AgentError::Cancelled);
    }

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| AgentError::Io(format!("failed to read response body: {e}")))?;
    debug!("[web_fetch] HTTP {status}, {} bytes", body.len());

    if !status.is_success() {
        return Err(AgentError::Io(format!("HTTP {status} fetching {url}")));
    }

    let capped = cap_bytes(&body, MAX_FETCH_BYTES);
    Ok(strip_markup(capped))
}

/// Truncate to at most `max` bytes on a char boundary.
fn cap_bytes(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    #[allow(clippy::string_slice)] // end is on a char boundary
    &s[..end]
}

/// Remove script/style blocks and tags, decode common entities, collapse
/// whitespace runs to single spaces.
pub fn strip_markup(html: &str) -> String {
    let without_scripts = strip_block(html, "script");
    let without_styles = strip_block(&without_scripts, "style");

    let mut text = String::with_capacity(without_styles.len());
    let mut in_tag = false;
    for c in without_styles.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => {
                in_tag = false;
                // Tag boundaries separate words.
                text.push(' ');
            }
            _ if !in_tag => text.push(c),
            _ => {}
        }
    }

    let decoded = text
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");

    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Remove `<tag …>…</tag>` blocks (case-insensitive), including their
/// contents.
fn strip_block(html: &str, tag: &str) -> String {
    // ASCII lowering keeps byte offsets aligned with the original text.
    let lower = html.to_ascii_lowercase();
    let open = format!("<{tag}");
    let close = format!("</{tag}>");

    let mut out = String::with_capacity(html.len());
    let mut position = 0;
    while let Some(start) = lower[position..].find(&open).map(|p| p + position) {
        #[allow(clippy::string_slice)] // indices come from find() on the same text
        out.push_str(&html[position..start]);
        match lower[start..].find(&close).map(|p| p + start) {
            Some(end) => position = end + close.len(),
            None => {
                // Unclosed block: drop the remainder.
                return out;
            }
        }
    }
    #[allow(clippy::string_slice)] // position tracks char boundaries of html
    out.push_str(&html[position..]);
    out
}
