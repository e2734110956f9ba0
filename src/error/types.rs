//! Error classification for the bootstrap pipeline
//!
//! Terminal login failures, recoverable checkpoint states, and the
//! ambient I/O conversions.

use thiserror::Error;

/// Main error type for the application
#[derive(Debug, Error)]
pub enum Error {
    /// HTTP request errors
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML configuration parsing errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing errors
    #[error("URL parsing error: {0}")]
    Url(#[from] url::ParseError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Credential submission came back without a redirect target
    #[error("Wrong username/password")]
    InvalidCredentials,

    /// A checkpoint requires out-of-band approval before login can finish
    #[error("Login approval required: {reason}")]
    LoginApprovalRequired {
        /// Why the approval path could not complete
        reason: String,
    },

    /// The submitted approval code was rejected and no retries remain
    #[error("Invalid approval code: {detail}")]
    InvalidApprovalCode {
        /// The error marker text scraped from the checkpoint page
        detail: String,
    },

    /// Device-confirmation checkpoint reached without `forceLogin` enabled
    #[error(
        "Couldn't login. The account may be blocked; log in with a browser or enable 'forceLogin' and try again"
    )]
    AccountBlockedOrUnsupported,

    /// The post-confirmation resubmission hit the recent-login review page
    #[error("Login review failed: {reason}")]
    ReviewLoginFailed {
        /// Which confirmation step went wrong
        reason: String,
    },

    /// The landing page cookies lack the mandatory identity cookie
    #[error("Unable to get the identity cookie; no session context can be built")]
    MissingIdentityCookie,

    /// Configuration errors
    #[error("Configuration error in {field}: {message}")]
    Config {
        /// The configuration field that has an error
        field: String,
        /// Error message describing the issue
        message: String,
    },

    /// Proxy configuration errors
    #[error("Proxy error with config '{config}': {message}")]
    Proxy {
        /// The proxy configuration that caused the error
        config: String,
        /// Error message describing the proxy issue
        message: String,
    },

    /// A required markup fragment could not be extracted
    #[error("Scrape failed: {what}")]
    Scrape {
        /// Which fragment was being extracted
        what: String,
    },

    /// Generic internal errors
    #[error("Internal error: {message}")]
    Internal {
        /// Error message describing the internal issue
        message: String,
    },
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a login-approval error
    pub fn login_approval(reason: impl Into<String>) -> Self {
        Self::LoginApprovalRequired {
            reason: reason.into(),
        }
    }

    /// Create an invalid-approval-code error
    pub fn invalid_code(detail: impl Into<String>) -> Self {
        Self::InvalidApprovalCode {
            detail: detail.into(),
        }
    }

    /// Create a review-login error
    pub fn review_login(reason: impl Into<String>) -> Self {
        Self::ReviewLoginFailed {
            reason: reason.into(),
        }
    }

    /// Create a configuration error
    pub fn config<S: Into<String>>(field: S, message: S) -> Self {
        Self::Config {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a proxy error
    pub fn proxy<S: Into<String>>(config: S, message: S) -> Self {
        Self::Proxy {
            config: config.into(),
            message: message.into(),
        }
    }

    /// Create a scrape error
    pub fn scrape(what: impl Into<String>) -> Self {
        Self::Scrape { what: what.into() }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether the caller can still finish the bootstrap after this error
    ///
    /// Recoverable errors correspond to checkpoint states that a fresh
    /// continuation or an out-of-band approval can resolve.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::LoginApprovalRequired { .. } | Error::InvalidApprovalCode { .. }
        )
    }

    /// Get error category for logging/metrics
    pub fn category(&self) -> &'static str {
        match self {
            Error::Http(..) => "http",
            Error::Json(..) => "json",
            Error::Toml(..) => "toml",
            Error::Url(..) => "url",
            Error::Io(..) => "io",
            Error::InvalidCredentials => "credentials",
            Error::LoginApprovalRequired { .. } => "approval",
            Error::InvalidApprovalCode { .. } => "approval",
            Error::AccountBlockedOrUnsupported => "blocked",
            Error::ReviewLoginFailed { .. } => "review",
            Error::MissingIdentityCookie => "identity",
            Error::Config { .. } => "config",
            Error::Proxy { .. } => "proxy",
            Error::Scrape { .. } => "scrape",
            Error::Internal { .. } => "internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = Error::config("field", "test config error");
        assert!(matches!(err, Error::Config { .. }));
        assert_eq!(
            err.to_string(),
            "Configuration error in field: test config error"
        );
    }

    #[test]
    fn test_error_from_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid json");
        assert!(json_err.is_err());

        let err: Error = json_err.unwrap_err().into();
        assert!(matches!(err, Error::Json(_)));
    }

    #[test]
    fn test_invalid_credentials_is_terminal() {
        let err = Error::InvalidCredentials;
        assert!(!err.is_recoverable());
        assert_eq!(err.category(), "credentials");
    }

    #[test]
    fn test_approval_errors_are_recoverable() {
        assert!(Error::login_approval("waiting for device").is_recoverable());
        assert!(Error::invalid_code("wrong code").is_recoverable());
        assert!(!Error::AccountBlockedOrUnsupported.is_recoverable());
    }

    #[test]
    fn test_scrape_error() {
        let err = Error::scrape("lsd token");
        assert!(matches!(err, Error::Scrape { .. }));
        assert!(err.to_string().contains("lsd token"));
    }

    #[test]
    fn test_review_login_error() {
        let err = Error::review_login("approval resubmission");
        assert_eq!(err.category(), "review");
        assert!(err.to_string().contains("approval resubmission"));
    }
}
