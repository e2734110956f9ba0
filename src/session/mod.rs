//! Session bootstrap
//!
//! This module holds the whole credential exchange: the cookie jar, the
//! identity-carrying transport, the markup scraping helpers, the bootstrap
//! state machine, and the session context builder that caps a successful
//! run.

pub mod bootstrap;
pub mod context;
pub mod jar;
pub mod scrape;
pub mod transport;

pub use bootstrap::{
    ApprovalInput, Checkpoint, ConfirmationProbe, Engine, Outcome, Session, bootstrap,
};
pub use context::{SessionContext, build_context};
pub use jar::CookieJar;
pub use transport::{PageResponse, Transport};
