//! Login option handling
//!
//! Options arrive as a loosely-typed JSON map with camelCase keys, the
//! shape callers already pass around. Unknown keys are logged and ignored,
//! never rejected. The resolved struct is what the rest of the crate reads.

use serde_json::Value;
use tracing::warn;

/// Default desktop browser identity
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_10_2) AppleWebKit/600.3.18 (KHTML, like Gecko) Version/8.0.3 Safari/600.3.18";

/// Mobile browser identity used by the rendering-path fallback
pub const MOBILE_USER_AGENT: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 16_6 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.6 Mobile/15E148 Safari/604.1";

/// Resolved login options
#[derive(Debug, Clone)]
pub struct LoginOptions {
    pub online: bool,
    pub self_listen: bool,
    pub listen_events: bool,
    pub listen_typing: bool,
    pub update_presence: bool,
    /// Gates the device-confirmation checkpoint branch
    pub force_login: bool,
    pub auto_mark_delivery: bool,
    pub auto_mark_read: bool,
    pub auto_reconnect: bool,
    pub emit_ready: bool,
    /// Browser identity string sent with every request
    pub user_agent: String,
    /// Acting-subject override; when set, the bootstrap adopts this page
    /// identity after the session context is built
    pub subject_id_override: Option<String>,
    /// Proxy URL; `None` clears any previously configured proxy
    pub proxy: Option<String>,
}

impl Default for LoginOptions {
    fn default() -> Self {
        Self {
            online: true,
            self_listen: false,
            listen_events: false,
            listen_typing: false,
            update_presence: false,
            force_login: false,
            auto_mark_delivery: true,
            auto_mark_read: false,
            auto_reconnect: true,
            emit_ready: false,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            subject_id_override: None,
            proxy: None,
        }
    }
}

impl LoginOptions {
    /// Resolve options from a JSON map on top of the defaults
    pub fn from_map(map: &serde_json::Map<String, Value>) -> Self {
        let mut options = Self::default();
        options.apply(map);
        options
    }

    /// Apply a JSON map of option overrides onto `self`
    ///
    /// Recognized keys use camelCase names. Values are coerced loosely,
    /// booleans via truthiness and the subject override via string
    /// conversion, so callers can pass raw JSON straight through.
    pub fn apply(&mut self, map: &serde_json::Map<String, Value>) {
        for (key, value) in map {
            match key.as_str() {
                "online" => self.online = truthy(value),
                "selfListen" => self.self_listen = truthy(value),
                "listenEvents" => self.listen_events = truthy(value),
                "listenTyping" => self.listen_typing = truthy(value),
                "updatePresence" => self.update_presence = truthy(value),
                "forceLogin" => self.force_login = truthy(value),
                "autoMarkDelivery" => self.auto_mark_delivery = truthy(value),
                "autoMarkRead" => self.auto_mark_read = truthy(value),
                "autoReconnect" => self.auto_reconnect = truthy(value),
                "emitReady" => self.emit_ready = truthy(value),
                "userAgent" => {
                    if let Some(ua) = value.as_str() {
                        self.user_agent = ua.to_string();
                    }
                }
                "subjectIDOverride" => {
                    self.subject_id_override = Some(coerce_string(value));
                }
                "proxy" => {
                    // A non-string value clears the proxy
                    self.proxy = value.as_str().map(str::to_string);
                }
                other => {
                    warn!("unrecognized option '{other}'");
                }
            }
        }
    }
}

/// JS-style truthiness for option values
fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Null => false,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Coerce any JSON value to its string form, strings unquoted
fn coerce_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
