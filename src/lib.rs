//! Redfox - Session Bootstrap
//!
//! A browser-emulating login client for a platform without a formal login
//! API. It drives the multi-step credential exchange, resolves checkpoint
//! branches (two-factor approval, device confirmation, markup-version
//! differences), and produces a session context usable by post-login
//! operations.
//!
//! # Features
//!
//! - **Cookie-seeded resume**: a stored credential bundle skips the
//!   password exchange entirely
//! - **Checkpoint resolution**: two-factor codes and out-of-band device
//!   approvals, with bounded retry and polling loops
//! - **Markup-version fallback**: three generations of the realtime
//!   endpoint fragment are probed, with a mobile-identity refetch when the
//!   desktop rendering withholds them
//! - **Capability binding**: a statically enumerated registry of named
//!   post-login operations bound against the built context
//!
//! # Usage
//!
//! ```rust,no_run
//! use redfox::{Credentials, LoginOptions, Outcome, Settings, bootstrap};
//!
//! # async fn example() -> redfox::Result<()> {
//! let credentials = Credentials::new("user@example.com", "hunter2");
//! let outcome = bootstrap(
//!     None,
//!     Some(credentials),
//!     LoginOptions::default(),
//!     Settings::default(),
//! )
//! .await?;
//!
//! if let Outcome::Ready(session) = outcome {
//!     println!("logged in as {}", session.context.user_id);
//! }
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod session;
pub mod types;
pub mod utils;

pub use config::{ConfigLoader, Settings};
pub use error::{Error, Result};
pub use session::{
    ApprovalInput, Checkpoint, Engine, Outcome, Session, SessionContext, bootstrap,
};
pub use types::{CookieRecord, CredentialBundle, Credentials, LoginOptions};
