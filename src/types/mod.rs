//! Type definitions for the session bootstrapper
//!
//! This module contains the data structures exchanged with callers:
//! credential bundles, login options and the built session context.

pub mod bundle;
pub mod options;

pub use bundle::{CookieRecord, CredentialBundle, Credentials};
pub use options::LoginOptions;
