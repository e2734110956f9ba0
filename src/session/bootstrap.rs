//! Bootstrap state machine
//!
//! Drives the browser-emulating credential exchange from a seed (stored
//! cookies or email/password) to a built session context. Checkpoint
//! branches surface as an [`Outcome::ApprovalPending`] holding a
//! [`Checkpoint`] the caller resolves with a one-time code or by waiting
//! for an out-of-band device approval. Every resolution re-enters the
//! machine through the freshly updated cookie jar instead of recursing.

use crate::{
    Error, Result,
    api::{CapabilitySet, RequestHelpers},
    config::Settings,
    session::{
        context::{SessionContext, build_context},
        jar::CookieJar,
        scrape,
        transport::{PageResponse, Transport},
    },
    types::{CredentialBundle, Credentials, LoginOptions},
    types::options::MOBILE_USER_AGENT,
};
use async_trait::async_trait;
use base64::Engine as _;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

/// Fixed browser dimension fingerprint submitted with the login form
const DIMENSION_BLOB: &str = r#"{"w":1440,"h":900,"aw":1440,"ah":834,"c":24}"#;

/// What a finished bootstrap attempt hands back to the caller
pub enum Outcome {
    /// Fully authenticated, context built, capabilities bound
    Ready(Session),
    /// A checkpoint needs a code or an out-of-band approval first
    ApprovalPending(Checkpoint),
}

impl std::fmt::Debug for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Ready(session) => f.debug_tuple("Ready").field(session).finish(),
            Outcome::ApprovalPending(checkpoint) => {
                f.debug_tuple("ApprovalPending").field(checkpoint).finish()
            }
        }
    }
}

/// An authenticated session with its bound post-login operations
#[derive(Debug)]
pub struct Session {
    /// The immutable identifiers and realtime endpoint data
    pub context: SessionContext,
    /// Named operations bound against the context
    pub capabilities: CapabilitySet,
}

/// How a checkpoint should be resolved
pub enum ApprovalInput {
    /// A one-time approval code typed by the account owner
    Code(String),
    /// Wait for the login to be confirmed from another device or browser
    AwaitDeviceApproval,
}

/// Decides whether an out-of-band approval has landed
///
/// The production probe posts the pending form fields to the approval
/// check endpoint; tests substitute their own implementation.
#[async_trait]
pub trait ConfirmationProbe: Send + Sync {
    /// Returns `true` once the platform reports the login as confirmed
    async fn check(&self, fields: &[(String, String)]) -> Result<bool>;
}

struct HttpConfirmationProbe {
    transport: Transport,
    settings: Arc<Settings>,
}

#[async_trait]
impl ConfirmationProbe for HttpConfirmationProbe {
    async fn check(&self, fields: &[(String, String)]) -> Result<bool> {
        let url = format!(
            "{}{}",
            self.settings.urls.base, self.settings.urls.approval_check_path
        );
        let referer = format!("{}/checkpoint/?next", self.settings.urls.base);
        let response = match self.transport.post_form(&url, fields, Some(&referer)).await {
            Ok(response) => response,
            Err(err) => {
                // Transport hiccups never end the wait
                debug!("confirmation probe transport error: {err}");
                return Ok(false);
            }
        };

        // A well-formed guarded JSON body means the approval is still
        // pending; anything else is the post-confirmation page.
        let payload = scrape::strip_async_guard(&response.body);
        Ok(serde_json::from_str::<serde_json::Value>(payload).is_err())
    }
}

enum Seed {
    Bundle(CredentialBundle),
    Credentials(Credentials),
    Jar,
}

enum Flow {
    Done(SessionContext),
    Pending(Checkpoint),
    Restart,
}

enum Submission {
    Direct,
    Checkpoint(String),
}

/// The bootstrap engine owning the transport, jar and background poller
pub struct Engine {
    settings: Arc<Settings>,
    options: LoginOptions,
    transport: Transport,
    poller: Mutex<Option<AbortHandle>>,
    probe: Arc<dyn ConfirmationProbe>,
}

impl Engine {
    /// Create an engine for the given deployment settings and options
    pub fn new(settings: Settings, options: LoginOptions) -> Result<Self> {
        settings.validate()?;
        let settings = Arc::new(settings);
        let jar = Arc::new(CookieJar::new());
        let proxy = options.proxy.clone().or_else(|| settings.get_proxy_url());
        let transport = Transport::new(
            settings.clone(),
            jar,
            options.user_agent.clone(),
            proxy,
        )?;
        let probe = Arc::new(HttpConfirmationProbe {
            transport: transport.clone(),
            settings: settings.clone(),
        });
        Ok(Self {
            settings,
            options,
            transport,
            poller: Mutex::new(None),
            probe,
        })
    }

    /// Replace the confirmation probe (test seam)
    pub fn with_probe(mut self, probe: Arc<dyn ConfirmationProbe>) -> Self {
        self.probe = probe;
        self
    }

    /// The cookie jar the exchange reads from and writes to
    pub fn jar(&self) -> &Arc<CookieJar> {
        self.transport.jar()
    }

    /// Run the bootstrap from a stored bundle or from raw credentials
    ///
    /// A non-empty bundle always wins over credentials and skips the
    /// submission phase entirely.
    pub async fn login(
        self: &Arc<Self>,
        bundle: Option<CredentialBundle>,
        credentials: Option<Credentials>,
    ) -> Result<Outcome> {
        let seed = match (bundle, credentials) {
            (Some(bundle), _) if !bundle.is_empty() => Seed::Bundle(bundle),
            (_, Some(credentials)) => Seed::Credentials(credentials),
            _ => {
                return Err(Error::config(
                    "credentials",
                    "either a cookie bundle or email and password must be supplied",
                ));
            }
        };
        self.run(seed).await
    }

    async fn run(self: &Arc<Self>, mut seed: Seed) -> Result<Outcome> {
        loop {
            // Every attempt starts by killing any poller a previous
            // attempt left behind, so timers never stack up.
            self.cancel_poller().await;
            match self.attempt(&seed).await? {
                Flow::Done(context) => return Ok(Outcome::Ready(self.finish(context).await)),
                Flow::Pending(checkpoint) => return Ok(Outcome::ApprovalPending(checkpoint)),
                Flow::Restart => seed = Seed::Jar,
            }
        }
    }

    async fn attempt(self: &Arc<Self>, seed: &Seed) -> Result<Flow> {
        let base = self.settings.urls.base.clone();
        let landing = match seed {
            Seed::Bundle(bundle) => {
                self.jar().restore(bundle).await;
                self.transport.get(&base, None).await?
            }
            Seed::Jar => self.transport.get(&base, None).await?,
            Seed::Credentials(credentials) => {
                let primer = self.transport.get(&base, None).await?;
                match self.submit_credentials(&primer.body, credentials).await? {
                    Submission::Checkpoint(location) => {
                        return self.resolve_branch(&location).await;
                    }
                    // The post-login landing fetch establishes the
                    // long-lived identity cookie.
                    Submission::Direct => self.transport.get(&base, None).await?,
                }
            }
        };

        let landing = self.normalize(landing).await?;
        let context = build_context(
            &landing.body,
            self.jar().clone(),
            self.options.clone(),
            &self.settings,
        )
        .await?;
        Ok(Flow::Done(context))
    }

    /// Scrape the login form, assemble the payload and POST it
    async fn submit_credentials(
        &self,
        primer_html: &str,
        credentials: &Credentials,
    ) -> Result<Submission> {
        let mut form = scrape::login_form_inputs(primer_html);
        let lsd = scrape::lsd_token(primer_html).ok_or_else(|| Error::scrape("lsd token"))?;
        let lgnrnd = scrape::lgnrnd(primer_html).ok_or_else(|| Error::scrape("lgnrnd field"))?;

        upsert(&mut form, "lsd", lsd);
        upsert(
            &mut form,
            "lgndim",
            base64::engine::general_purpose::STANDARD.encode(DIMENSION_BLOB),
        );
        upsert(&mut form, "email", &credentials.email);
        upsert(&mut form, "pass", &credentials.password);
        upsert(&mut form, "default_persistent", "0");
        upsert(&mut form, "lgnrnd", lgnrnd);
        upsert(&mut form, "locale", "en_US");
        upsert(&mut form, "timezone", "240");
        upsert(
            &mut form,
            "lgnjs",
            chrono::Utc::now().timestamp().to_string(),
        );

        // The primer page injects some cookies through inline script
        // instead of Set-Cookie headers; lift them into the jar first.
        let host = self.base_host()?;
        for record in scrape::embedded_js_cookies(primer_html, &host) {
            self.jar().set(record).await?;
        }

        info!("submitting credentials");
        let url = format!("{}{}", self.settings.urls.base, self.settings.urls.login_path);
        let response = self.transport.post_form(&url, &form, None).await?;

        match response.location {
            None => Err(Error::InvalidCredentials),
            Some(location) if location.contains("/checkpoint/") => {
                Ok(Submission::Checkpoint(location))
            }
            Some(_) => Ok(Submission::Direct),
        }
    }

    /// Decide between the 2FA and device-confirmation checkpoint branches
    async fn resolve_branch(self: &Arc<Self>, location: &str) -> Result<Flow> {
        let url = self.absolutize(location);
        let response = self.transport.get(&url, None).await?;
        let html = response.body;
        let form = scrape::form_inputs(&html);

        if html.contains("checkpoint/?next") {
            info!("login approvals are enabled for this account");
            let submit_label = scrape::checkpoint_submit_label(&html)
                .unwrap_or_else(|| "Continue".to_string());
            return Ok(Flow::Pending(Checkpoint {
                engine: self.clone(),
                form,
                submit_label,
                retries_left: self.settings.approval.max_code_retries,
                last_error: None,
            }));
        }

        // Confirmation-only checkpoint. Without explicit permission this
        // is treated as a blocked account.
        if !self.options.force_login {
            return Err(Error::AccountBlockedOrUnsupported);
        }

        let mut form = form;
        if html.contains(scrape::SUSPICIOUS_LOGIN_MARKER) {
            upsert(&mut form, "submit[This was me]", "This was me");
        } else {
            upsert(&mut form, "submit[This Is Okay]", "This Is Okay");
        }

        let url = self.checkpoint_url();
        self.transport.post_form(&url, &form, None).await?;

        upsert(&mut form, "name_action_selected", "save_device");
        let response = self.transport.post_form(&url, &form, None).await?;
        if !response.is_redirect() && response.body.contains(scrape::REVIEW_RECENT_LOGIN_MARKER) {
            return Err(Error::review_login("device confirmation"));
        }

        Ok(Flow::Restart)
    }

    /// Post-success normalization passes, each a no-op without its trigger
    async fn normalize(&self, response: PageResponse) -> Result<PageResponse> {
        let response = self.follow_meta_refresh(response).await?;
        let response = self.fix_unsupported_browser(response).await?;

        if response.body.contains(scrape::DESKTOP_MARKER) {
            return Ok(response);
        }

        // Some accounts only expose the realtime fragment under the
        // mobile rendering path.
        debug!("desktop marker absent, retrying with the mobile identity");
        self.transport.set_user_agent(MOBILE_USER_AGENT).await;
        let refetched = self.transport.get(&self.settings.urls.base, None).await?;
        let refetched = self.follow_meta_refresh(refetched).await?;
        self.fix_unsupported_browser(refetched).await
    }

    async fn fix_unsupported_browser(&self, response: PageResponse) -> Result<PageResponse> {
        let Some(gfid) = scrape::unsupported_browser_gfid(&response.body) else {
            return Ok(response);
        };
        let mobile = &self.settings.urls.mobile_base;
        let home: String =
            url::form_urlencoded::byte_serialize(format!("{mobile}/home.php").as_bytes())
                .collect();
        let target = format!(
            "{mobile}/a/preferences.php?basic_site_devices=m_basic&uri={home}&gfid={gfid}"
        );
        info!("applying the unsupported-browser preference fix");
        self.transport.get(&target, None).await
    }

    async fn follow_meta_refresh(&self, response: PageResponse) -> Result<PageResponse> {
        match scrape::meta_refresh_target(&response.body) {
            Some(target) => {
                debug!("following meta refresh to {target}");
                self.transport.get(&self.absolutize(&target), None).await
            }
            None => Ok(response),
        }
    }

    async fn finish(self: &Arc<Self>, context: SessionContext) -> Session {
        if let Some(subject) = context.options.subject_id_override.clone() {
            self.navigate_to_subject(&subject).await;
        }
        let helpers = RequestHelpers::new(self.transport.clone(), self.settings.clone());
        let capabilities = CapabilitySet::bind(&context, helpers);
        Session {
            context,
            capabilities,
        }
    }

    /// Best-effort switch onto a managed subject's inbox
    ///
    /// Failure here degrades the session rather than failing it; the
    /// identity cookie is already established.
    async fn navigate_to_subject(&self, subject: &str) {
        let base = &self.settings.urls.base;
        let url = format!("{base}/{subject}/messages/?section=messages&subsection=inbox");
        let response = match self.transport.get(&url, None).await {
            Ok(response) => response,
            Err(err) => {
                warn!("subject page fetch failed: {err}");
                return;
            }
        };
        match scrape::location_replace_target(&response.body) {
            Some(path) => {
                let target = format!("{base}{path}");
                if let Err(err) = self.transport.get(&target, None).await {
                    warn!("subject inbox navigation failed: {err}");
                }
            }
            None => warn!("unable to resolve the subject inbox redirect, continuing"),
        }
    }

    /// Wait for an out-of-band device approval, bounded and cancellable
    ///
    /// The wait runs on its own task so that a newly started bootstrap
    /// attempt can abort it through the stored handle.
    async fn await_device_approval(
        self: &Arc<Self>,
        fields: Vec<(String, String)>,
    ) -> Result<()> {
        self.cancel_poller().await;

        let probe = self.probe.clone();
        let approval = self.settings.approval.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(approval.poll_initial_delay_ms)).await;
            for attempt in 1..=approval.max_poll_attempts {
                match probe.check(&fields).await {
                    Ok(true) => {
                        info!("login confirmed from another device");
                        return Ok(());
                    }
                    Ok(false) => debug!("approval still pending (probe {attempt})"),
                    Err(err) => debug!("confirmation probe failed: {err}"),
                }
                tokio::time::sleep(Duration::from_secs(approval.poll_interval_secs)).await;
            }
            Err(Error::login_approval(
                "the login was not confirmed from another device in time",
            ))
        });

        *self.poller.lock().await = Some(handle.abort_handle());

        match handle.await {
            Ok(result) => result,
            Err(join) if join.is_cancelled() => Err(Error::login_approval(
                "the approval wait was superseded by a new login attempt",
            )),
            Err(join) => Err(Error::internal(format!("approval poller failed: {join}"))),
        }
    }

    async fn cancel_poller(&self) {
        if let Some(handle) = self.poller.lock().await.take() {
            handle.abort();
            debug!("cancelled a pending confirmation poller");
        }
    }

    fn checkpoint_url(&self) -> String {
        format!(
            "{}{}",
            self.settings.urls.base, self.settings.urls.checkpoint_path
        )
    }

    fn absolutize(&self, location: &str) -> String {
        if location.starts_with('/') {
            format!("{}{}", self.settings.urls.base, location)
        } else {
            location.to_string()
        }
    }

    fn base_host(&self) -> Result<String> {
        let parsed = url::Url::parse(&self.settings.urls.base)?;
        Ok(parsed.host_str().unwrap_or_default().to_string())
    }
}

/// A suspended checkpoint resolution
///
/// Holds the pending form fields and enough engine state to resume the
/// bootstrap once the account owner supplies a code or approves the
/// login elsewhere. Consumed by [`Checkpoint::submit`].
pub struct Checkpoint {
    engine: Arc<Engine>,
    form: Vec<(String, String)>,
    submit_label: String,
    retries_left: u32,
    last_error: Option<String>,
}

impl std::fmt::Debug for Checkpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Checkpoint")
            .field("submit_label", &self.submit_label)
            .field("retries_left", &self.retries_left)
            .field("last_error", &self.last_error)
            .finish()
    }
}

impl Checkpoint {
    /// The rejection detail from the previous code attempt, if any
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Code attempts remaining before the bootstrap fails hard
    pub fn retries_left(&self) -> u32 {
        self.retries_left
    }

    /// Resolve the checkpoint and resume the bootstrap
    ///
    /// A rejected code yields a fresh `ApprovalPending` outcome carrying
    /// the rejection detail, until the retry budget runs out.
    pub async fn submit(self, input: ApprovalInput) -> Result<Outcome> {
        match input {
            ApprovalInput::Code(code) => self.submit_code(code).await,
            ApprovalInput::AwaitDeviceApproval => {
                let fields = probe_fields(&self.form);
                self.engine.await_device_approval(fields).await?;
                self.engine.run(Seed::Jar).await
            }
        }
    }

    async fn submit_code(self, code: String) -> Result<Outcome> {
        let engine = self.engine.clone();
        let url = engine.checkpoint_url();

        let mut form = self.form.clone();
        upsert(&mut form, "approvals_code", code);
        upsert(&mut form, "submit[Continue]", &self.submit_label);

        let response = engine.transport.post_form(&url, &form, None).await?;
        if scrape::has_invalid_code_marker(&response.body) {
            let detail = scrape::invalid_code_detail(&response.body)
                .unwrap_or("the approval code was rejected")
                .to_string();
            if self.retries_left <= 1 {
                return Err(Error::invalid_code(detail));
            }
            warn!("approval code rejected: {detail}");
            return Ok(Outcome::ApprovalPending(Checkpoint {
                engine,
                form: self.form,
                submit_label: self.submit_label,
                retries_left: self.retries_left - 1,
                last_error: Some(detail),
            }));
        }

        // Finalize device trust as "do not remember" and resubmit.
        remove(&mut form, "no_fido");
        remove(&mut form, "approvals_code");
        upsert(&mut form, "name_action_selected", "dont_save");

        let response = engine.transport.post_form(&url, &form, None).await?;
        if !response.is_redirect() && response.body.contains(scrape::REVIEW_RECENT_LOGIN_MARKER) {
            return Err(Error::review_login("approval resubmission"));
        }

        engine.run(Seed::Jar).await
    }
}

/// Entry point: run a full bootstrap with its own engine
pub async fn bootstrap(
    bundle: Option<CredentialBundle>,
    credentials: Option<Credentials>,
    options: LoginOptions,
    settings: Settings,
) -> Result<Outcome> {
    let engine = Arc::new(Engine::new(settings, options)?);
    engine.login(bundle, credentials).await
}

fn upsert(form: &mut Vec<(String, String)>, name: &str, value: impl Into<String>) {
    let value = value.into();
    match form.iter_mut().find(|(existing, _)| existing == name) {
        Some(entry) => entry.1 = value,
        None => form.push((name.to_string(), value)),
    }
}

fn remove(form: &mut Vec<(String, String)>, name: &str) {
    form.retain(|(existing, _)| existing != name);
}

/// The subset of pending fields the confirmation probe carries
fn probe_fields(form: &[(String, String)]) -> Vec<(String, String)> {
    let mut fields: Vec<(String, String)> = form
        .iter()
        .filter(|(name, _)| name == "fb_dtsg" || name == "jazoest")
        .cloned()
        .collect();
    fields.push(("dpr".to_string(), "1".to_string()));
    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upsert_replaces_in_place() {
        let mut form = vec![("lsd".to_string(), "old".to_string())];
        upsert(&mut form, "lsd", "new");
        upsert(&mut form, "email", "a@b.c");
        assert_eq!(form.len(), 2);
        assert_eq!(form[0].1, "new");
        assert_eq!(form[1], ("email".to_string(), "a@b.c".to_string()));
    }

    #[test]
    fn test_remove_drops_all_matches() {
        let mut form = vec![
            ("no_fido".to_string(), "1".to_string()),
            ("keep".to_string(), "x".to_string()),
            ("no_fido".to_string(), "2".to_string()),
        ];
        remove(&mut form, "no_fido");
        assert_eq!(form, vec![("keep".to_string(), "x".to_string())]);
    }

    #[test]
    fn test_probe_fields_subset() {
        let form = vec![
            ("fb_dtsg".to_string(), "tok".to_string()),
            ("approvals_code".to_string(), "123".to_string()),
            ("jazoest".to_string(), "2888".to_string()),
        ];
        let fields = probe_fields(&form);
        assert_eq!(
            fields,
            vec![
                ("fb_dtsg".to_string(), "tok".to_string()),
                ("jazoest".to_string(), "2888".to_string()),
                ("dpr".to_string(), "1".to_string()),
            ]
        );
    }

    #[test]
    fn test_login_requires_a_seed() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(async {
            let engine = Arc::new(
                Engine::new(Settings::default(), LoginOptions::default()).unwrap(),
            );
            let result = engine.login(None, None).await;
            assert!(matches!(result.unwrap_err(), Error::Config { .. }));

            let empty = CredentialBundle::default();
            let result = engine.login(Some(empty), None).await;
            assert!(matches!(result.unwrap_err(), Error::Config { .. }));
        });
    }

    #[test]
    fn test_absolutize() {
        let engine =
            Engine::new(Settings::with_base_url("http://127.0.0.1:1"), LoginOptions::default())
                .unwrap();
        assert_eq!(
            engine.absolutize("/checkpoint/?x=1"),
            "http://127.0.0.1:1/checkpoint/?x=1"
        );
        assert_eq!(engine.absolutize("http://other/x"), "http://other/x");
    }
}
