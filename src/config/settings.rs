//! Configuration settings
//!
//! Settings cover the parts of the bootstrap that are deployment-specific:
//! the platform origins (overridable so tests can point at a mock server),
//! network timeouts and proxies, and the explicit bounds on the approval
//! retry and poll loops.

use serde::{Deserialize, Serialize};

// Helper functions for serde defaults
fn default_base_url() -> String {
    "https://www.facebook.com".to_string()
}

fn default_mobile_base_url() -> String {
    "https://m.facebook.com".to_string()
}

fn default_login_path() -> String {
    "/login/device-based/regular/login/?login_attempt=1&lwv=110".to_string()
}

fn default_checkpoint_path() -> String {
    "/checkpoint/?next=https%3A%2F%2Fwww.facebook.com%2Fhome.php".to_string()
}

fn default_approval_check_path() -> String {
    "/login/approvals/approved_machine_check/".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_connect_timeout() -> u64 {
    30
}

fn default_request_timeout() -> u64 {
    60
}

fn default_poll_interval_secs() -> u64 {
    5
}

fn default_poll_initial_delay_ms() -> u64 {
    2500
}

fn default_max_poll_attempts() -> u32 {
    60
}

fn default_max_code_retries() -> u32 {
    5
}

/// Main configuration settings for the bootstrapper
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Platform origin configuration
    #[serde(default)]
    pub urls: UrlSettings,
    /// Network configuration
    #[serde(default)]
    pub network: NetworkSettings,
    /// Checkpoint approval configuration
    #[serde(default)]
    pub approval: ApprovalSettings,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Platform origins and well-known paths
///
/// Everything here is overridable so integration tests can run the whole
/// exchange against a local mock server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrlSettings {
    /// Desktop origin, no trailing slash
    #[serde(default = "default_base_url")]
    pub base: String,
    /// Mobile origin used by the unsupported-browser fix
    #[serde(default = "default_mobile_base_url")]
    pub mobile_base: String,
    /// Device-based login submission path
    #[serde(default = "default_login_path")]
    pub login_path: String,
    /// Checkpoint continuation path (with the post-login next target)
    #[serde(default = "default_checkpoint_path")]
    pub checkpoint_path: String,
    /// Out-of-band approval probe path
    #[serde(default = "default_approval_check_path")]
    pub approval_check_path: String,
}

/// Network and proxy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkSettings {
    /// HTTPS proxy URL
    #[serde(default)]
    pub https_proxy: Option<String>,
    /// HTTP proxy URL
    #[serde(default)]
    pub http_proxy: Option<String>,
    /// All protocols proxy URL
    #[serde(default)]
    pub all_proxy: Option<String>,
    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,
    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
}

/// Bounds and pacing for the checkpoint approval loops
///
/// Both the code retry loop and the background poll loop carry explicit
/// limits so a stuck checkpoint cannot spin forever.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalSettings {
    /// Seconds between background confirmation probes
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Delay before the first probe, in milliseconds
    #[serde(default = "default_poll_initial_delay_ms")]
    pub poll_initial_delay_ms: u64,
    /// Probes issued before the approval wait gives up
    #[serde(default = "default_max_poll_attempts")]
    pub max_poll_attempts: u32,
    /// Invalid approval codes tolerated before failing hard
    #[serde(default = "default_max_code_retries")]
    pub max_code_retries: u32,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable verbose logging
    #[serde(default)]
    pub verbose: bool,
    /// Log format (text, json)
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for UrlSettings {
    fn default() -> Self {
        Self {
            base: default_base_url(),
            mobile_base: default_mobile_base_url(),
            login_path: default_login_path(),
            checkpoint_path: default_checkpoint_path(),
            approval_check_path: default_approval_check_path(),
        }
    }
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            https_proxy: None,
            http_proxy: None,
            all_proxy: None,
            connect_timeout: default_connect_timeout(),
            request_timeout: default_request_timeout(),
        }
    }
}

impl Default for ApprovalSettings {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            poll_initial_delay_ms: default_poll_initial_delay_ms(),
            max_poll_attempts: default_max_poll_attempts(),
            max_code_retries: default_max_code_retries(),
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            verbose: false,
            format: default_log_format(),
        }
    }
}

impl Settings {
    /// Create new settings with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Create settings pointed at a custom origin (for testing)
    ///
    /// Both the desktop and mobile origins collapse onto the given base so
    /// every request a test flow issues lands on the same mock server.
    pub fn with_base_url(base: impl Into<String>) -> Self {
        let base = base.into();
        let mut settings = Self::default();
        settings.urls.mobile_base = base.clone();
        settings.urls.base = base;
        settings
    }

    /// Load settings from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut settings = Self::default();

        if let Ok(base) = std::env::var("REDFOX_BASE_URL") {
            settings.urls.base = base;
        }

        if let Ok(mobile) = std::env::var("REDFOX_MOBILE_BASE_URL") {
            settings.urls.mobile_base = mobile;
        }

        if let Ok(interval) = std::env::var("REDFOX_POLL_INTERVAL") {
            settings.approval.poll_interval_secs = interval.parse().map_err(|e| {
                crate::Error::config("poll_interval_secs", &format!("Invalid interval: {}", e))
            })?;
        }

        if let Ok(attempts) = std::env::var("REDFOX_MAX_POLL_ATTEMPTS") {
            settings.approval.max_poll_attempts = attempts.parse().map_err(|e| {
                crate::Error::config("max_poll_attempts", &format!("Invalid count: {}", e))
            })?;
        }

        // Proxy settings follow the conventional environment names
        settings.network.https_proxy = std::env::var("HTTPS_PROXY").ok();
        settings.network.http_proxy = std::env::var("HTTP_PROXY").ok();
        settings.network.all_proxy = std::env::var("ALL_PROXY").ok();

        if let Ok(level) = std::env::var("LOG_LEVEL") {
            settings.logging.level = level;
        }

        if let Ok(verbose) = std::env::var("VERBOSE") {
            settings.logging.verbose = verbose.parse().unwrap_or(false);
        }

        Ok(settings)
    }

    /// Load settings from configuration file
    pub fn from_file<P: AsRef<std::path::Path>>(path: P) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            crate::Error::config("file", &format!("Failed to read config file: {}", e))
        })?;

        let settings: Settings = toml::from_str(&content).map_err(|e| {
            crate::Error::config("file", &format!("Failed to parse config file: {}", e))
        })?;

        Ok(settings)
    }

    /// Merge settings with environment variable overrides
    pub fn merge_with_env(mut self) -> crate::Result<Self> {
        let env_settings = Self::from_env()?;
        let defaults = Self::default();

        if env_settings.urls.base != defaults.urls.base {
            self.urls.base = env_settings.urls.base;
        }

        if env_settings.urls.mobile_base != defaults.urls.mobile_base {
            self.urls.mobile_base = env_settings.urls.mobile_base;
        }

        if env_settings.approval.poll_interval_secs != defaults.approval.poll_interval_secs {
            self.approval.poll_interval_secs = env_settings.approval.poll_interval_secs;
        }

        if env_settings.approval.max_poll_attempts != defaults.approval.max_poll_attempts {
            self.approval.max_poll_attempts = env_settings.approval.max_poll_attempts;
        }

        // Proxy settings always override if present
        if env_settings.network.https_proxy.is_some() {
            self.network.https_proxy = env_settings.network.https_proxy;
        }
        if env_settings.network.http_proxy.is_some() {
            self.network.http_proxy = env_settings.network.http_proxy;
        }
        if env_settings.network.all_proxy.is_some() {
            self.network.all_proxy = env_settings.network.all_proxy;
        }

        Ok(self)
    }

    /// Get effective proxy URL based on priority
    pub fn get_proxy_url(&self) -> Option<String> {
        self.network
            .https_proxy
            .as_ref()
            .or(self.network.http_proxy.as_ref())
            .or(self.network.all_proxy.as_ref())
            .cloned()
    }

    /// Validate configuration settings
    pub fn validate(&self) -> crate::Result<()> {
        for (name, origin) in [
            ("urls.base", &self.urls.base),
            ("urls.mobile_base", &self.urls.mobile_base),
        ] {
            if let Err(e) = url::Url::parse(origin) {
                return Err(crate::Error::config(
                    name,
                    &format!("Invalid origin '{}': {}", origin, e),
                ));
            }
            if origin.ends_with('/') {
                return Err(crate::Error::config(
                    name,
                    "Origin must not carry a trailing slash",
                ));
            }
        }

        if self.approval.poll_interval_secs == 0 {
            return Err(crate::Error::config(
                "poll_interval_secs",
                "Poll interval cannot be 0",
            ));
        }

        if self.approval.max_poll_attempts == 0 {
            return Err(crate::Error::config(
                "max_poll_attempts",
                "Poll attempt bound cannot be 0",
            ));
        }

        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(crate::Error::config(
                    "log_level",
                    &format!("Invalid log level: {}", self.logging.level),
                ));
            }
        }

        // Validate proxy URLs if present
        for (name, proxy_url) in [
            ("https_proxy", &self.network.https_proxy),
            ("http_proxy", &self.network.http_proxy),
            ("all_proxy", &self.network.all_proxy),
        ]
        .iter()
        {
            if let Some(url_str) = proxy_url
                && let Err(e) = url::Url::parse(url_str)
            {
                return Err(crate::Error::config(
                    *name,
                    &format!("Invalid proxy URL '{}': {}", url_str, e),
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.urls.base, "https://www.facebook.com");
        assert_eq!(settings.urls.mobile_base, "https://m.facebook.com");
        assert_eq!(settings.approval.poll_interval_secs, 5);
        assert_eq!(settings.approval.max_poll_attempts, 60);
        assert_eq!(settings.approval.max_code_retries, 5);
        assert!(settings.urls.login_path.contains("device-based"));
    }

    #[test]
    fn test_with_base_url_collapses_origins() {
        let settings = Settings::with_base_url("http://127.0.0.1:4545");
        assert_eq!(settings.urls.base, "http://127.0.0.1:4545");
        assert_eq!(settings.urls.mobile_base, "http://127.0.0.1:4545");
    }

    #[test]
    fn test_load_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[urls]
base = "http://localhost:9000"

[approval]
poll_interval_secs = 1
max_poll_attempts = 3
"#
        )
        .unwrap();

        let settings = Settings::from_file(temp_file.path()).unwrap();
        assert_eq!(settings.urls.base, "http://localhost:9000");
        assert_eq!(settings.approval.poll_interval_secs, 1);
        assert_eq!(settings.approval.max_poll_attempts, 3);
        // Untouched sections keep defaults
        assert_eq!(settings.urls.mobile_base, "https://m.facebook.com");
    }

    #[test]
    fn test_validate_rejects_bad_origin() {
        let mut settings = Settings::default();
        settings.urls.base = "not a url".to_string();
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.urls.base = "https://www.facebook.com/".to_string();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_bounds() {
        let mut settings = Settings::default();
        settings.approval.poll_interval_secs = 0;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.approval.max_poll_attempts = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_proxy() {
        let mut settings = Settings::default();
        settings.network.https_proxy = Some("::not-a-proxy::".to_string());
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validate_accepts_defaults() {
        assert!(Settings::default().validate().is_ok());
    }
}
