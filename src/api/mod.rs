//! Post-login capability surface
//!
//! The bootstrap core hands the built session context and a shared set of
//! request helpers to this layer, which binds the statically enumerated
//! capability registry against them. The core never looks inside a
//! capability; it only guarantees the context outlives the binding.

pub mod registry;

pub use registry::{Capability, CapabilitySet};

use crate::{Result, config::Settings, session::transport::{PageResponse, Transport}};
use std::sync::Arc;

/// Shared request plumbing handed to every bound capability
///
/// Wraps the bootstrap's transport so capabilities issue requests with the
/// session's cookies and identity, addressed relative to the platform
/// origin.
#[derive(Clone)]
pub struct RequestHelpers {
    transport: Transport,
    settings: Arc<Settings>,
}

impl RequestHelpers {
    /// Create helpers over the session's transport
    pub fn new(transport: Transport, settings: Arc<Settings>) -> Self {
        Self {
            transport,
            settings,
        }
    }

    /// The underlying transport
    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// Deployment settings the session was built with
    pub fn settings(&self) -> &Arc<Settings> {
        &self.settings
    }

    /// GET a path relative to the platform origin
    pub async fn get(&self, path: &str) -> Result<PageResponse> {
        let url = format!("{}{}", self.settings.urls.base, path);
        self.transport.get(&url, None).await
    }

    /// POST a form to a path relative to the platform origin
    pub async fn post_form(
        &self,
        path: &str,
        fields: &[(String, String)],
    ) -> Result<PageResponse> {
        let url = format!("{}{}", self.settings.urls.base, path);
        self.transport.post_form(&url, fields, None).await
    }
}
