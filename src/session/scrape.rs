//! Token scraping
//!
//! The platform publishes nothing machine-readable: anti-forgery tokens,
//! hidden form fields and even cookies are buried in the page source.
//! Extraction is positional (`between`) or regex-based; a miss returns
//! `None` and the caller decides whether that is fatal.

use crate::types::CookieRecord;
use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

static INPUT_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<input[^>]*>").expect("input tag pattern"));

static NAME_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"name\s*=\s*"([^"]*)""#).expect("name attr pattern"));

static VALUE_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"value\s*=\s*"([^"]*)""#).expect("value attr pattern"));

static META_REFRESH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<meta http-equiv="refresh" content="0;url=([^"]+)[^>]*>"#)
        .expect("meta refresh pattern")
});

static ASYNC_GUARD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^for\s*\(\s*;\s*;\s*\)\s*;\s*").expect("guard pattern"));

/// Marker the desktop rendering path always carries
pub const DESKTOP_MARKER: &str = "MPageLoadClientMetrics";

/// Marker of the unsupported-browser interstitial
pub const UNSUPPORTED_BROWSER_MARKER: &str = "This browser is not supported";

/// Marker of the recent-login review anomaly page
pub const REVIEW_RECENT_LOGIN_MARKER: &str = "Review Recent Login";

/// Marker of the suspicious-login device-confirm variant
pub const SUSPICIOUS_LOGIN_MARKER: &str = "Suspicious Login Attempt";

/// Substring extraction between two anchors
///
/// Returns the text strictly between the first occurrence of `start` and
/// the next occurrence of `end`. An empty `start` anchors at the beginning.
pub fn between<'a>(haystack: &'a str, start: &str, end: &str) -> Option<&'a str> {
    let from = if start.is_empty() {
        0
    } else {
        haystack.find(start)? + start.len()
    };
    let rest = &haystack[from..];
    let to = rest.find(end)?;
    Some(&rest[..to])
}

/// Harvest named, non-empty-valued `<input>` fields from a markup fragment
pub fn form_inputs(html: &str) -> Vec<(String, String)> {
    let mut fields = Vec::new();
    for tag in INPUT_TAG.find_iter(html) {
        let tag = tag.as_str();
        let Some(name) = NAME_ATTR.captures(tag).map(|c| c[1].to_string()) else {
            continue;
        };
        let Some(value) = VALUE_ATTR.captures(tag).map(|c| c[1].to_string()) else {
            continue;
        };
        if name.is_empty() || value.is_empty() {
            continue;
        }
        fields.push((name, value));
    }
    fields
}

/// Harvest the login form's hidden fields specifically
///
/// Scopes to the fragment between the login form marker and its closing
/// tag; an unrecognized page yields no fields, which the submission builds
/// on top of anyway.
pub fn login_form_inputs(html: &str) -> Vec<(String, String)> {
    match between(html, r#"id="login_form""#, "</form>") {
        Some(fragment) => form_inputs(fragment),
        None => Vec::new(),
    }
}

/// Extract the anti-forgery token embedded in the page source
pub fn lsd_token(html: &str) -> Option<&str> {
    between(html, r#"["LSD",[],{"token":""#, r#""}"#)
}

/// Extract the login round identifier hidden field
pub fn lgnrnd(html: &str) -> Option<&str> {
    between(html, r#"name="lgnrnd" value=""#, r#"""#)
}

/// Cookies the platform injects through inline script rather than headers
///
/// The page carries `["_js_<name>", "<value>", ...]` fragments that a
/// browser would turn into cookies client-side. Each fragment is a JSON
/// array of `[name, value, expiry, path]`; the records are scoped to the
/// given domain.
pub fn embedded_js_cookies(html: &str, domain: &str) -> Vec<CookieRecord> {
    let mut records = Vec::new();
    for chunk in html.split(r#""_js_"#).skip(1) {
        let Some(fragment) = between(chunk, "", "]") else {
            continue;
        };
        let payload = format!("[\"{}]", fragment);
        match serde_json::from_str::<Vec<serde_json::Value>>(&payload) {
            Ok(parts) => {
                let name = parts.first().and_then(|v| v.as_str()).unwrap_or_default();
                let value = parts.get(1).and_then(|v| v.as_str()).unwrap_or_default();
                if name.is_empty() {
                    continue;
                }
                let mut record = CookieRecord::new(name, value, domain);
                if let Some(path) = parts.get(3).and_then(|v| v.as_str()) {
                    record.path = path.to_string();
                }
                records.push(record);
            }
            Err(e) => {
                debug!("skipping malformed embedded cookie fragment: {e}");
            }
        }
    }
    records
}

/// Target of a zero-delay meta-refresh directive, if present
pub fn meta_refresh_target(html: &str) -> Option<String> {
    META_REFRESH
        .captures(html)
        .map(|captures| captures[1].to_string())
}

/// Redirect identifier embedded in the unsupported-browser interstitial
///
/// The identifier sits between the home-php marker and the following
/// escape sequence; anything unextractable means the pass is skipped.
pub fn unsupported_browser_gfid(html: &str) -> Option<String> {
    if !html.contains(UNSUPPORTED_BROWSER_MARKER) {
        return None;
    }
    let tail = html.split("2Fhome.php&amp;gfid=").nth(1)?;
    let gfid: String = tail
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect();
    if gfid.is_empty() { None } else { Some(gfid) }
}

/// Whether the checkpoint response flags the submitted approval code
pub fn has_invalid_code_marker(html: &str) -> bool {
    html.contains("approvals_code") && html.contains("data-xui-error")
}

/// Error marker text attached to the approvals field, when present
pub fn invalid_code_detail(html: &str) -> Option<&str> {
    between(html, r#"data-xui-error=""#, r#"""#)
}

/// Label of the checkpoint submit button, used as the submitted value
pub fn checkpoint_submit_label(html: &str) -> Option<String> {
    let tag_onward = html.split(r#"id="checkpointSubmitButton""#).nth(1)?;
    let inner = between(tag_onward, ">", "<")?;
    let label = inner.trim();
    if label.is_empty() {
        None
    } else {
        Some(label.to_string())
    }
}

/// Strip the anti-hijacking guard prefix from a JSON-ish response body
pub fn strip_async_guard(body: &str) -> &str {
    match ASYNC_GUARD.find(body) {
        Some(found) => &body[found.end()..],
        None => body,
    }
}

/// Target of an inline `window.location.replace` call, unescaped
pub fn location_replace_target(html: &str) -> Option<String> {
    let fragment = between(html, r#"window.location.replace("https:\/\/www.facebook.com"#, r#"");"#)?;
    let mut target = fragment.replace('\\', "");
    // The path always carries a trailing slash the follow-up fetch rejects
    target.pop();
    if target.is_empty() { None } else { Some(target) }
}
