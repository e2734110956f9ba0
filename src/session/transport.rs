//! HTTP transport
//!
//! Wraps a `reqwest` client with the identity the bootstrap presents to the
//! platform: user agent, optional proxy, and the shared cookie store.
//! Redirect following is disabled because the state machine branches on the
//! `Location` header itself. Cookie updates from a response are applied to
//! the store before the response is handed back, so no later request can be
//! built from a stale cookie snapshot.

use crate::{Result, config::Settings, session::jar::CookieJar};
use reqwest::{Client, Proxy, StatusCode, header};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, trace};

/// A fully-read response as the state machine sees it
#[derive(Debug, Clone)]
pub struct PageResponse {
    /// HTTP status
    pub status: StatusCode,
    /// `Location` header, when the server redirected
    pub location: Option<String>,
    /// Decoded body text
    pub body: String,
}

impl PageResponse {
    /// Whether the server pointed somewhere else
    pub fn is_redirect(&self) -> bool {
        self.location.is_some()
    }
}

/// Mutable identity of the transport
#[derive(Debug)]
struct Identity {
    client: Client,
    user_agent: String,
    proxy: Option<String>,
}

/// Shared HTTP transport with a rebuildable identity
#[derive(Debug, Clone)]
pub struct Transport {
    settings: Arc<Settings>,
    jar: Arc<CookieJar>,
    identity: Arc<RwLock<Identity>>,
}

impl Transport {
    /// Create a transport with the given identity
    pub fn new(
        settings: Arc<Settings>,
        jar: Arc<CookieJar>,
        user_agent: impl Into<String>,
        proxy: Option<String>,
    ) -> Result<Self> {
        let user_agent = user_agent.into();
        let client = build_client(&settings, proxy.as_deref())?;
        Ok(Self {
            settings,
            jar,
            identity: Arc::new(RwLock::new(Identity {
                client,
                user_agent,
                proxy,
            })),
        })
    }

    /// The cookie store every request reads from and every response updates
    pub fn jar(&self) -> &Arc<CookieJar> {
        &self.jar
    }

    /// Current user agent string
    pub async fn user_agent(&self) -> String {
        self.identity.read().await.user_agent.clone()
    }

    /// Switch the presented browser identity
    pub async fn set_user_agent(&self, user_agent: impl Into<String>) {
        let mut identity = self.identity.write().await;
        identity.user_agent = user_agent.into();
        debug!("switched user agent to {}", identity.user_agent);
    }

    /// Set or clear the proxy, rebuilding the underlying client
    pub async fn set_proxy(&self, proxy: Option<String>) -> Result<()> {
        let client = build_client(&self.settings, proxy.as_deref())?;
        let mut identity = self.identity.write().await;
        identity.client = client;
        identity.proxy = proxy;
        Ok(())
    }

    /// Currently configured proxy URL
    pub async fn proxy(&self) -> Option<String> {
        self.identity.read().await.proxy.clone()
    }

    /// Issue a GET request
    pub async fn get(&self, url: &str, referer: Option<&str>) -> Result<PageResponse> {
        let (client, user_agent) = {
            let identity = self.identity.read().await;
            (identity.client.clone(), identity.user_agent.clone())
        };
        let request = client.get(url);
        self.dispatch(request, url, &user_agent, referer).await
    }

    /// Issue a form-encoded POST request
    pub async fn post_form(
        &self,
        url: &str,
        fields: &[(String, String)],
        referer: Option<&str>,
    ) -> Result<PageResponse> {
        let (client, user_agent) = {
            let identity = self.identity.read().await;
            (identity.client.clone(), identity.user_agent.clone())
        };
        let request = client.post(url).form(fields);
        self.dispatch(request, url, &user_agent, referer).await
    }

    async fn dispatch(
        &self,
        mut request: reqwest::RequestBuilder,
        url: &str,
        user_agent: &str,
        referer: Option<&str>,
    ) -> Result<PageResponse> {
        let host = host_of(url)?;

        request = request
            .header(header::USER_AGENT, user_agent)
            .header(
                header::ACCEPT,
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            )
            .header(header::ACCEPT_LANGUAGE, "en-US,en;q=0.5");

        if let Some(referer) = referer {
            request = request.header(header::REFERER, referer);
        }

        if let Some(cookie_header) = self.jar.cookie_header(&host).await {
            request = request.header(header::COOKIE, cookie_header);
        }

        trace!("dispatching request to {url}");
        let response = request.send().await?;

        let status = response.status();
        let location = response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        // Cookie updates land in the store before the body is even read,
        // so the next request never sees a stale snapshot.
        for set_cookie in response.headers().get_all(header::SET_COOKIE) {
            if let Ok(raw) = set_cookie.to_str() {
                self.jar.apply_set_cookie(&host, raw).await?;
            }
        }

        let body = response.text().await?;
        debug!("{} {} ({} bytes)", status, url, body.len());

        Ok(PageResponse {
            status,
            location,
            body,
        })
    }
}

/// Host component of an absolute URL
fn host_of(url: &str) -> Result<String> {
    let parsed = url::Url::parse(url)?;
    parsed
        .host_str()
        .map(str::to_string)
        .ok_or_else(|| crate::Error::internal(format!("URL without a host: {url}")))
}

/// Build a client with redirects disabled and the shared timeout policy
fn build_client(settings: &Settings, proxy: Option<&str>) -> Result<Client> {
    let mut builder = Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .connect_timeout(Duration::from_secs(settings.network.connect_timeout))
        .timeout(Duration::from_secs(settings.network.request_timeout));

    if let Some(proxy_url) = proxy {
        let proxy = Proxy::all(proxy_url)
            .map_err(|e| crate::Error::proxy(proxy_url, &format!("Invalid proxy URL: {}", e)))?;
        builder = builder.proxy(proxy);
    }

    builder
        .build()
        .map_err(|e| crate::Error::internal(format!("Failed to create HTTP client: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::options::DEFAULT_USER_AGENT;

    fn transport() -> Transport {
        Transport::new(
            Arc::new(Settings::default()),
            Arc::new(CookieJar::new()),
            DEFAULT_USER_AGENT,
            None,
        )
        .unwrap()
    }

    #[test]
    fn test_host_of() {
        assert_eq!(
            host_of("https://www.facebook.com/login").unwrap(),
            "www.facebook.com"
        );
        assert_eq!(host_of("http://127.0.0.1:4545/").unwrap(), "127.0.0.1");
        assert!(host_of("not a url").is_err());
    }

    #[test]
    fn test_invalid_proxy_is_rejected() {
        let settings = Arc::new(Settings::default());
        let result = Transport::new(
            settings,
            Arc::new(CookieJar::new()),
            DEFAULT_USER_AGENT,
            Some("::bad::".to_string()),
        );
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_identity_switch() {
        let transport = transport();
        assert_eq!(transport.user_agent().await, DEFAULT_USER_AGENT);

        transport.set_user_agent("TestAgent/2.0").await;
        assert_eq!(transport.user_agent().await, "TestAgent/2.0");
    }

    #[tokio::test]
    async fn test_proxy_set_and_clear() {
        let transport = transport();
        assert_eq!(transport.proxy().await, None);

        transport
            .set_proxy(Some("http://proxy:8080".to_string()))
            .await
            .unwrap();
        assert_eq!(transport.proxy().await, Some("http://proxy:8080".to_string()));

        transport.set_proxy(None).await.unwrap();
        assert_eq!(transport.proxy().await, None);
    }
}
