//! Credential bundle type definitions
//!
//! A credential bundle ("app state") is the persisted form of a previous
//! session: an ordered list of cookie records in the JSON shape other
//! appstate tooling writes. Restoring one bypasses credential submission.

use serde::{Deserialize, Serialize};

/// Email/password credentials for a fresh login
#[derive(Debug, Clone)]
pub struct Credentials {
    /// Account email address
    pub email: String,
    /// Account password
    pub password: String,
}

impl Credentials {
    /// Create new credentials
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

/// A single persisted cookie record
///
/// Field names are wire-exact: bundles written by other tools must restore
/// verbatim, with no transformation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookieRecord {
    /// Cookie name
    pub key: String,

    /// Cookie value
    pub value: String,

    /// Domain the cookie is scoped to (may carry a leading dot)
    pub domain: String,

    /// Path the cookie is scoped to
    #[serde(default = "default_path")]
    pub path: String,

    /// Expiration timestamp, if the cookie is not session-scoped
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration: Option<String>,
}

fn default_path() -> String {
    "/".to_string()
}

impl CookieRecord {
    /// Create a new cookie record scoped to the given domain
    pub fn new(
        key: impl Into<String>,
        value: impl Into<String>,
        domain: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            domain: domain.into(),
            path: default_path(),
            expiration: None,
        }
    }

    /// Set the cookie path
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Set the expiration timestamp
    pub fn with_expiration(mut self, expiration: impl Into<String>) -> Self {
        self.expiration = Some(expiration.into());
        self
    }

    /// Whether this cookie applies to requests against `host`
    pub fn matches_host(&self, host: &str) -> bool {
        let domain = self.domain.trim_start_matches('.');
        host == domain || host.ends_with(&format!(".{domain}"))
    }
}

/// An ordered sequence of cookie records, serialized as a bare JSON array
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CredentialBundle(pub Vec<CookieRecord>);

impl CredentialBundle {
    /// Create an empty bundle
    pub fn new() -> Self {
        Self::default()
    }

    /// Records in insertion order
    pub fn records(&self) -> &[CookieRecord] {
        &self.0
    }

    /// Whether the bundle carries no cookies at all
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The set of distinct domains named by the bundle
    pub fn domains(&self) -> Vec<String> {
        let mut domains: Vec<String> = Vec::new();
        for record in &self.0 {
            if !domains.contains(&record.domain) {
                domains.push(record.domain.clone());
            }
        }
        domains
    }

    /// Parse a bundle from its JSON text form
    pub fn from_json(text: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Render the bundle as pretty-printed JSON
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl From<Vec<CookieRecord>> for CredentialBundle {
    fn from(records: Vec<CookieRecord>) -> Self {
        Self(records)
    }
}
