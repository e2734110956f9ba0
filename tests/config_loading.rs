//! Configuration loading precedence and validation

use redfox::{ConfigLoader, Settings};
use std::io::Write;
use tempfile::NamedTempFile;

#[test]
fn defaults_are_valid() {
    let loader = ConfigLoader::new();
    let settings = loader.load(None).unwrap();
    assert_eq!(settings.urls.base, "https://www.facebook.com");
    assert_eq!(settings.approval.poll_interval_secs, 5);
    assert_eq!(settings.approval.max_code_retries, 5);
    assert!(settings.validate().is_ok());
}

#[test]
fn explicit_file_overrides_defaults() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[urls]
base = "http://localhost:9000"

[approval]
max_code_retries = 2

[logging]
level = "debug"
"#
    )
    .unwrap();

    let settings = ConfigLoader::new().load(Some(file.path())).unwrap();
    assert_eq!(settings.urls.base, "http://localhost:9000");
    assert_eq!(settings.approval.max_code_retries, 2);
    assert_eq!(settings.logging.level, "debug");
    // Untouched sections keep their defaults
    assert_eq!(settings.urls.mobile_base, "https://m.facebook.com");
    assert_eq!(settings.approval.poll_interval_secs, 5);
}

#[test]
fn invalid_file_is_rejected() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "this is not toml {{").unwrap();

    let result = ConfigLoader::new().load(Some(file.path()));
    assert!(result.is_err());
}

#[test]
fn invalid_origin_fails_validation() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[urls]
base = "https://www.facebook.com/"
"#
    )
    .unwrap();

    // Trailing slash on an origin is rejected
    let result = ConfigLoader::new().load(Some(file.path()));
    assert!(result.is_err());
}

#[test]
fn proxy_priority_order() {
    let mut settings = Settings::default();
    settings.network.all_proxy = Some("http://all:1".to_string());
    assert_eq!(settings.get_proxy_url().as_deref(), Some("http://all:1"));

    settings.network.http_proxy = Some("http://http:2".to_string());
    assert_eq!(settings.get_proxy_url().as_deref(), Some("http://http:2"));

    settings.network.https_proxy = Some("http://https:3".to_string());
    assert_eq!(settings.get_proxy_url().as_deref(), Some("http://https:3"));
}
