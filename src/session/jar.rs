//! Cookie store
//!
//! An ordered, domain-scoped cookie set shared by every request the
//! bootstrap issues. The store is the single shared mutable resource of the
//! pipeline: the main flow and the background confirmation poller both
//! write to it, so all access funnels through one `RwLock`. Snapshots of
//! the store are the persisted "app state" credential bundle.

use crate::types::{CookieRecord, CredentialBundle};
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;

/// Shared cookie store
#[derive(Debug, Default)]
pub struct CookieJar {
    /// Records in insertion order; replacement keeps the original slot
    records: RwLock<Vec<CookieRecord>>,
}

impl CookieJar {
    /// Create an empty jar
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a cookie record
    ///
    /// Records without a domain are rejected; a record matching an existing
    /// (name, domain, path) triple replaces it in place.
    pub async fn set(&self, record: CookieRecord) -> crate::Result<()> {
        if record.domain.is_empty() {
            return Err(crate::Error::internal(
                "refusing to store a cookie without a domain",
            ));
        }

        let mut records = self.records.write().await;
        if let Some(existing) = records.iter_mut().find(|r| {
            r.key == record.key && r.domain == record.domain && r.path == record.path
        }) {
            *existing = record;
        } else {
            records.push(record);
        }
        Ok(())
    }

    /// Ordered records applicable to requests against `host`
    ///
    /// Expired records are skipped when their expiration parses; records
    /// with opaque expiration strings are kept.
    pub async fn cookies_for(&self, host: &str) -> Vec<CookieRecord> {
        let records = self.records.read().await;
        records
            .iter()
            .filter(|r| r.matches_host(host) && !is_expired(r))
            .cloned()
            .collect()
    }

    /// Value of a named cookie visible to `host`
    pub async fn get_value(&self, host: &str, name: &str) -> Option<String> {
        self.cookies_for(host)
            .await
            .into_iter()
            .find(|r| r.key == name)
            .map(|r| r.value)
    }

    /// Render the `Cookie` request header for `host`, if any cookies apply
    pub async fn cookie_header(&self, host: &str) -> Option<String> {
        let cookies = self.cookies_for(host).await;
        if cookies.is_empty() {
            return None;
        }
        Some(
            cookies
                .iter()
                .map(|r| format!("{}={}", r.key, r.value))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }

    /// Export the full store as a credential bundle
    pub async fn snapshot(&self) -> CredentialBundle {
        let records = self.records.read().await;
        CredentialBundle::from(records.clone())
    }

    /// Restore a credential bundle into the store
    ///
    /// Only records scoped to the bundle's domains are overwritten;
    /// unrelated pre-existing records are preserved.
    pub async fn restore(&self, bundle: &CredentialBundle) {
        let domains = bundle.domains();
        let mut records = self.records.write().await;
        records.retain(|r| !domains.contains(&r.domain));
        records.extend(bundle.records().iter().cloned());
        debug!("restored {} cookie records", bundle.records().len());
    }

    /// Apply one `Set-Cookie` response header against the request host
    pub async fn apply_set_cookie(&self, host: &str, header: &str) -> crate::Result<()> {
        if let Some(record) = parse_set_cookie(host, header) {
            self.set(record).await?;
        }
        Ok(())
    }

    /// Number of stored records
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Whether the jar holds no records
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

/// Whether a record's expiration is parseable and in the past
fn is_expired(record: &CookieRecord) -> bool {
    let Some(expiration) = &record.expiration else {
        return false;
    };
    parse_expiry(expiration).is_some_and(|when| when < Utc::now())
}

fn parse_expiry(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(when) = DateTime::parse_from_rfc3339(text) {
        return Some(when.with_timezone(&Utc));
    }
    if let Ok(when) = DateTime::parse_from_rfc2822(text) {
        return Some(when.with_timezone(&Utc));
    }
    None
}

/// Parse a `Set-Cookie` header into a record scoped to `host` by default
fn parse_set_cookie(host: &str, header: &str) -> Option<CookieRecord> {
    let mut parts = header.split(';').map(str::trim);

    let (name, value) = parts.next()?.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }

    let mut record = CookieRecord::new(name, value.trim(), host);
    for attr in parts {
        let (attr_name, attr_value) = match attr.split_once('=') {
            Some((n, v)) => (n.trim().to_ascii_lowercase(), v.trim()),
            None => (attr.trim().to_ascii_lowercase(), ""),
        };
        match attr_name.as_str() {
            "domain" if !attr_value.is_empty() => {
                record.domain = attr_value.to_string();
            }
            "path" if !attr_value.is_empty() => {
                record.path = attr_value.to_string();
            }
            "expires" if !attr_value.is_empty() => {
                record.expiration = Some(attr_value.to_string());
            }
            "max-age" => {
                if let Ok(secs) = attr_value.parse::<i64>() {
                    let when = Utc::now() + chrono::Duration::seconds(secs);
                    record.expiration = Some(when.to_rfc3339());
                }
            }
            _ => {}
        }
    }

    Some(record)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_requires_domain() {
        let jar = CookieJar::new();
        let record = CookieRecord::new("datr", "v", "");
        assert!(jar.set(record).await.is_err());
        assert!(jar.is_empty().await);
    }

    #[tokio::test]
    async fn test_set_replaces_in_place() {
        let jar = CookieJar::new();
        jar.set(CookieRecord::new("a", "1", ".facebook.com"))
            .await
            .unwrap();
        jar.set(CookieRecord::new("b", "2", ".facebook.com"))
            .await
            .unwrap();
        jar.set(CookieRecord::new("a", "changed", ".facebook.com"))
            .await
            .unwrap();

        let cookies = jar.cookies_for("www.facebook.com").await;
        assert_eq!(cookies.len(), 2);
        assert_eq!(cookies[0].key, "a");
        assert_eq!(cookies[0].value, "changed");
        assert_eq!(cookies[1].key, "b");
    }

    #[tokio::test]
    async fn test_snapshot_restore_roundtrip() {
        let jar = CookieJar::new();
        let bundle = CredentialBundle::from(vec![
            CookieRecord::new("datr", "v1", ".facebook.com")
                .with_expiration("2030-01-01T00:00:00+00:00"),
            CookieRecord::new("c_user", "100000123", ".facebook.com"),
            CookieRecord::new("xs", "v3", ".facebook.com").with_path("/login"),
        ]);

        jar.restore(&bundle).await;
        assert_eq!(jar.snapshot().await, bundle);
    }

    #[tokio::test]
    async fn test_restore_preserves_unrelated_domains() {
        let jar = CookieJar::new();
        jar.set(CookieRecord::new("other", "kept", ".example.com"))
            .await
            .unwrap();
        jar.set(CookieRecord::new("stale", "old", ".facebook.com"))
            .await
            .unwrap();

        let bundle =
            CredentialBundle::from(vec![CookieRecord::new("fresh", "new", ".facebook.com")]);
        jar.restore(&bundle).await;

        let all = jar.snapshot().await;
        assert_eq!(all.records().len(), 2);
        assert!(all.records().iter().any(|r| r.key == "other"));
        assert!(all.records().iter().any(|r| r.key == "fresh"));
        assert!(!all.records().iter().any(|r| r.key == "stale"));
    }

    #[tokio::test]
    async fn test_cookie_header_rendering() {
        let jar = CookieJar::new();
        jar.set(CookieRecord::new("datr", "v1", ".facebook.com"))
            .await
            .unwrap();
        jar.set(CookieRecord::new("c_user", "42", ".facebook.com"))
            .await
            .unwrap();
        jar.set(CookieRecord::new("unrelated", "x", ".example.com"))
            .await
            .unwrap();

        let header = jar.cookie_header("www.facebook.com").await.unwrap();
        assert_eq!(header, "datr=v1; c_user=42");
        assert!(jar.cookie_header("nowhere.test").await.is_none());
    }

    #[tokio::test]
    async fn test_expired_records_are_skipped() {
        let jar = CookieJar::new();
        jar.set(
            CookieRecord::new("old", "v", ".facebook.com")
                .with_expiration("2001-01-01T00:00:00+00:00"),
        )
        .await
        .unwrap();
        jar.set(
            CookieRecord::new("opaque", "v", ".facebook.com").with_expiration("not a date"),
        )
        .await
        .unwrap();

        let cookies = jar.cookies_for("www.facebook.com").await;
        assert_eq!(cookies.len(), 1);
        assert_eq!(cookies[0].key, "opaque");
    }

    #[tokio::test]
    async fn test_apply_set_cookie() {
        let jar = CookieJar::new();
        jar.apply_set_cookie(
            "www.facebook.com",
            "xs=abc123; Domain=.facebook.com; Path=/; Secure; HttpOnly",
        )
        .await
        .unwrap();
        jar.apply_set_cookie("www.facebook.com", "plain=1").await.unwrap();

        let records = jar.snapshot().await;
        assert_eq!(records.records()[0].key, "xs");
        assert_eq!(records.records()[0].domain, ".facebook.com");
        // No Domain attribute scopes to the request host
        assert_eq!(records.records()[1].domain, "www.facebook.com");
    }

    #[tokio::test]
    async fn test_apply_set_cookie_max_age() {
        let jar = CookieJar::new();
        jar.apply_set_cookie("www.facebook.com", "fr=tok; Max-Age=3600")
            .await
            .unwrap();

        let records = jar.snapshot().await;
        let expiration = records.records()[0].expiration.as_ref().unwrap();
        let when = DateTime::parse_from_rfc3339(expiration).unwrap();
        assert!(when.with_timezone(&Utc) > Utc::now());
    }

    #[test]
    fn test_parse_set_cookie_rejects_nameless() {
        assert!(parse_set_cookie("host", "=value; Path=/").is_none());
        assert!(parse_set_cookie("host", "no-equals-sign").is_none());
    }
}
