//! Session context construction
//!
//! Once the exchange lands on an authenticated page, the realtime endpoint
//! configuration is dug out of the markup. Three generations of the inline
//! fragment exist in the wild and are probed independently; missing all of
//! them degrades the context instead of failing, because the identity
//! cookie is the only hard requirement.

use crate::{
    Result,
    config::Settings,
    session::jar::CookieJar,
    types::LoginOptions,
};
use rand::Rng;
use regex::Regex;
use std::sync::{Arc, LazyLock};
use tracing::{info, warn};

/// Application identifier pinned inside every endpoint fragment
const REALTIME_APP_ID: &str = "219994525426954";

static ENDPOINT_CURRENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r#"irisSeqID:"(.+?)",appID:{REALTIME_APP_ID},endpoint:"(.+?)""#
    ))
    .expect("current endpoint pattern")
});

static ENDPOINT_JSON: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r#"\{{"app_id":"{REALTIME_APP_ID}","endpoint":"(.+?)","iris_seq_id":"(.+?)"\}}"#
    ))
    .expect("json endpoint pattern")
});

static ENDPOINT_LEGACY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r#"\["MqttWebConfig",\[\],\{{fbid:"(.+?)",appID:{REALTIME_APP_ID},endpoint:"(.+?)",pollingEndpoint:"(.+?)""#
    ))
    .expect("legacy endpoint pattern")
});

/// The immutable bundle of identifiers produced by a successful bootstrap
#[derive(Debug, Clone)]
pub struct SessionContext {
    /// Stable numeric subject identifier from the identity cookie
    pub user_id: String,
    /// Randomly generated client identifier, hex
    pub client_id: String,
    /// Effective login options the bootstrap ran with
    pub options: LoginOptions,
    /// Realtime endpoint URL, when the markup yielded one
    pub mqtt_endpoint: Option<String>,
    /// Uppercased region code from the endpoint query string
    pub region: Option<String>,
    /// Monotonically increasing sequence identifier
    pub last_seq_id: Option<String>,
    /// Raw landing page retained when no endpoint generation matched
    pub raw_page: Option<String>,
    /// Shared cookie store backing the session
    pub jar: Arc<CookieJar>,
}

/// Endpoint fields recovered from one of the markup generations
#[derive(Debug, Default, PartialEq)]
struct RealtimeConfig {
    endpoint: Option<String>,
    region: Option<String>,
    seq_id: Option<String>,
}

/// Build the session context from the final landing page
///
/// The identity cookie is mandatory; everything realtime is best-effort.
pub async fn build_context(
    html: &str,
    jar: Arc<CookieJar>,
    options: LoginOptions,
    settings: &Settings,
) -> Result<SessionContext> {
    let host = url::Url::parse(&settings.urls.base)?
        .host_str()
        .unwrap_or_default()
        .to_string();

    // The identity cookie is non-negotiable; an acting-subject override
    // only affects post-login navigation, never the session identity.
    let user_id = jar
        .get_value(&host, "c_user")
        .await
        .ok_or(crate::Error::MissingIdentityCookie)?;

    if html.contains("/checkpoint/block/?next") {
        warn!("account is sitting behind a checkpoint block");
    }

    info!("logged in as {user_id}");

    let realtime = extract_realtime_config(html);
    let degraded = realtime == RealtimeConfig::default();
    if degraded {
        warn!("unable to resolve realtime endpoint, region and sequence id; continuing without them");
    } else if let Some(region) = &realtime.region {
        info!("realtime region {region}");
    }

    Ok(SessionContext {
        user_id,
        client_id: random_client_id(),
        options,
        mqtt_endpoint: realtime.endpoint,
        region: realtime.region,
        last_seq_id: realtime.seq_id,
        raw_page: degraded.then(|| html.to_string()),
        jar,
    })
}

/// Probe the three historical fragment generations in order
fn extract_realtime_config(html: &str) -> RealtimeConfig {
    if let Some(captures) = ENDPOINT_CURRENT.captures(html) {
        let endpoint = captures[2].to_string();
        return RealtimeConfig {
            region: region_of(&endpoint),
            seq_id: Some(captures[1].to_string()),
            endpoint: Some(endpoint),
        };
    }

    if let Some(captures) = ENDPOINT_JSON.captures(html) {
        let endpoint = captures[1].replace(r"\/", "/");
        return RealtimeConfig {
            region: region_of(&endpoint),
            seq_id: Some(captures[2].to_string()),
            endpoint: Some(endpoint),
        };
    }

    if let Some(captures) = ENDPOINT_LEGACY.captures(html) {
        // The legacy generation carries no sequence id
        let endpoint = captures[2].to_string();
        return RealtimeConfig {
            region: region_of(&endpoint),
            seq_id: None,
            endpoint: Some(endpoint),
        };
    }

    RealtimeConfig::default()
}

/// Uppercased `region` query parameter of an endpoint URL
fn region_of(endpoint: &str) -> Option<String> {
    let parsed = url::Url::parse(endpoint).ok()?;
    parsed
        .query_pairs()
        .find(|(name, _)| name == "region")
        .map(|(_, value)| value.to_uppercase())
}

/// Random 31-bit client identifier rendered as hex
fn random_client_id() -> String {
    let value: u32 = rand::rng().random();
    format!("{:x}", value >> 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CookieRecord;

    async fn jar_with_identity() -> Arc<CookieJar> {
        let jar = Arc::new(CookieJar::new());
        jar.set(CookieRecord::new("c_user", "100000123", ".facebook.com"))
            .await
            .unwrap();
        jar
    }

    #[test]
    fn test_current_generation_extraction() {
        let html = format!(
            r#"x irisSeqID:"6723",appID:{REALTIME_APP_ID},endpoint:"wss://edge-chat.facebook.com/chat?region=prn&sid=1" y"#
        );
        let config = extract_realtime_config(&html);
        assert_eq!(
            config.endpoint.as_deref(),
            Some("wss://edge-chat.facebook.com/chat?region=prn&sid=1")
        );
        assert_eq!(config.region.as_deref(), Some("PRN"));
        assert_eq!(config.seq_id.as_deref(), Some("6723"));
    }

    #[test]
    fn test_json_generation_extraction() {
        let html = format!(
            r#"{{"app_id":"{REALTIME_APP_ID}","endpoint":"wss:\/\/edge-chat.facebook.com\/chat?region=ash","iris_seq_id":"991"}}"#
        );
        let config = extract_realtime_config(&html);
        assert_eq!(
            config.endpoint.as_deref(),
            Some("wss://edge-chat.facebook.com/chat?region=ash")
        );
        assert_eq!(config.region.as_deref(), Some("ASH"));
        assert_eq!(config.seq_id.as_deref(), Some("991"));
    }

    #[test]
    fn test_legacy_generation_has_no_seq_id() {
        let html = format!(
            r#"["MqttWebConfig",[],{{fbid:"42",appID:{REALTIME_APP_ID},endpoint:"wss://chat.facebook.com/x?region=frc",pollingEndpoint:"https://poll.facebook.com"3790]"#
        );
        let config = extract_realtime_config(&html);
        assert_eq!(
            config.endpoint.as_deref(),
            Some("wss://chat.facebook.com/x?region=frc")
        );
        assert_eq!(config.region.as_deref(), Some("FRC"));
        assert_eq!(config.seq_id, None);
    }

    #[test]
    fn test_no_generation_matches() {
        let config = extract_realtime_config("<html><body>plain page</body></html>");
        assert_eq!(config, RealtimeConfig::default());
    }

    #[tokio::test]
    async fn test_build_context_requires_identity_cookie() {
        let jar = Arc::new(CookieJar::new());
        let result = build_context(
            "<html></html>",
            jar,
            LoginOptions::default(),
            &Settings::default(),
        )
        .await;
        assert!(matches!(
            result.unwrap_err(),
            crate::Error::MissingIdentityCookie
        ));
    }

    #[tokio::test]
    async fn test_build_context_soft_degrades() {
        let jar = jar_with_identity().await;
        let context = build_context(
            "<html><body>no realtime fragment</body></html>",
            jar,
            LoginOptions::default(),
            &Settings::default(),
        )
        .await
        .unwrap();

        assert_eq!(context.user_id, "100000123");
        assert!(!context.client_id.is_empty());
        assert_eq!(context.mqtt_endpoint, None);
        assert_eq!(context.region, None);
        assert_eq!(context.last_seq_id, None);
        assert!(context.raw_page.is_some());
    }

    #[tokio::test]
    async fn test_build_context_with_realtime_fields() {
        let jar = jar_with_identity().await;
        let html = format!(
            r#"irisSeqID:"1",appID:{REALTIME_APP_ID},endpoint:"wss://edge-chat.facebook.com/chat?region=prn""#
        );
        let context = build_context(
            &html,
            jar,
            LoginOptions::default(),
            &Settings::default(),
        )
        .await
        .unwrap();

        assert_eq!(context.region.as_deref(), Some("PRN"));
        assert!(context.raw_page.is_none());
    }

    #[tokio::test]
    async fn test_subject_override_does_not_replace_identity() {
        // The override never stands in for the identity cookie.
        let mut options = LoginOptions::default();
        options.subject_id_override = Some("555".to_string());

        let missing = build_context(
            "<html></html>",
            Arc::new(CookieJar::new()),
            options.clone(),
            &Settings::default(),
        )
        .await;
        assert!(matches!(
            missing.unwrap_err(),
            crate::Error::MissingIdentityCookie
        ));

        let context = build_context(
            "<html></html>",
            jar_with_identity().await,
            options,
            &Settings::default(),
        )
        .await
        .unwrap();
        assert_eq!(context.user_id, "100000123");
        assert_eq!(context.options.subject_id_override.as_deref(), Some("555"));
    }

    #[test]
    fn test_client_id_is_hex() {
        let id = random_client_id();
        assert!(!id.is_empty());
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
