//! Shared fixtures for the integration tests
//!
//! Markup fixtures mirror the shapes of the real pages the exchange
//! scrapes: the login primer, the two checkpoint variants, and the
//! authenticated landing page with the realtime fragment.

#![allow(dead_code)]

use redfox::{CookieRecord, CredentialBundle, Credentials, Settings};

/// Subject identifier used across the fixtures
pub const USER_ID: &str = "100000123";

/// The current-generation realtime fragment
pub const REALTIME_FRAGMENT: &str = r#"irisSeqID:"6723",appID:219994525426954,endpoint:"wss://edge-chat.example.net/chat?region=prn&sid=1""#;

/// Settings pointed at a mock server, with tight approval pacing
pub fn test_settings(base: &str) -> Settings {
    let mut settings = Settings::with_base_url(base);
    settings.approval.poll_initial_delay_ms = 0;
    settings.approval.poll_interval_secs = 1;
    settings.approval.max_poll_attempts = 3;
    settings
}

/// Credentials accepted by every mocked login form
pub fn credentials() -> Credentials {
    Credentials::new("user@example.com", "hunter2")
}

/// The unauthenticated primer page with the login form and tokens
pub fn login_page() -> String {
    r#"<html><body>
<script>["LSD",[],{"token":"AVqwMyrc"}]</script>
<script>window.setCookie("_js_datr","abc-123",31536000,"/"]);</script>
<form id="login_form" action="/login/" method="post">
<input type="hidden" name="jazoest" value="2888">
<input name="lgnrnd" value="031519_Bslf">
<input type="text" name="email" value="">
</form>
</body></html>"#
        .to_string()
}

/// The authenticated landing page with the desktop marker and fragment
pub fn landing_page() -> String {
    format!("<html><body>MPageLoadClientMetrics {REALTIME_FRAGMENT}</body></html>")
}

/// A landing page served with the desktop marker but no fragment
pub fn bare_landing_page() -> String {
    "<html><body>MPageLoadClientMetrics, nothing else of note</body></html>".to_string()
}

/// The checkpoint page that asks for an approval code
pub fn two_factor_page() -> String {
    r#"<html><body>
Enter the code we sent you, then continue to checkpoint/?next to finish.
<form action="/checkpoint/" method="post">
<input type="hidden" name="fb_dtsg" value="AQHxTok">
<input type="hidden" name="jazoest" value="2888">
<input type="hidden" name="nh" value="nh-abc">
</form>
<button id="checkpointSubmitButton" type="submit">Continue</button>
</body></html>"#
        .to_string()
}

/// The confirmation-only checkpoint page ("was this you")
pub fn device_confirm_page() -> String {
    r#"<html><body>
Please confirm this was you before we let the device in.
<form action="/checkpoint/" method="post">
<input type="hidden" name="fb_dtsg" value="AQHxTok">
<input type="hidden" name="jazoest" value="2888">
</form>
</body></html>"#
        .to_string()
}

/// The checkpoint response rejecting a submitted approval code
pub fn invalid_code_page() -> String {
    r#"<html><body>
<div data-xui-error="Invalid code. Please try again.">
<input id="approvals_code" name="approvals_code" value="">
</div>
</body></html>"#
        .to_string()
}

/// A cookie bundle carrying an established identity for `host`
pub fn identity_bundle(host: &str) -> CredentialBundle {
    CredentialBundle::from(vec![
        CookieRecord::new("c_user", USER_ID, host),
        CookieRecord::new("xs", "session%3Atoken", host),
    ])
}
