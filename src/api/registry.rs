//! Static capability registry
//!
//! Capabilities are enumerated at compile time as a name-to-constructor
//! table and bound once per session. Adding an operation means adding a
//! constructor to the table, so the available surface is known without
//! any runtime discovery.

use crate::{
    Error, Result,
    api::RequestHelpers,
    session::{context::SessionContext, jar::CookieJar, transport::Transport},
    types::LoginOptions,
};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// A named post-login operation bound to a session
#[async_trait]
pub trait Capability: Send + Sync {
    /// Invoke the operation with a JSON payload
    async fn invoke(&self, input: Value) -> Result<Value>;
}

/// Everything a capability constructor may capture from the session
struct BindSeed {
    jar: Arc<CookieJar>,
    transport: Transport,
    options: Arc<RwLock<LoginOptions>>,
}

type Constructor = fn(&BindSeed) -> Box<dyn Capability>;

/// The compile-time capability table
static REGISTRY: &[(&str, Constructor)] = &[
    ("getAppState", bind_get_app_state),
    ("setOptions", bind_set_options),
];

/// The set of capabilities bound against one session
pub struct CapabilitySet {
    options: Arc<RwLock<LoginOptions>>,
    entries: HashMap<String, Box<dyn Capability>>,
}

impl std::fmt::Debug for CapabilitySet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilitySet")
            .field("names", &self.names())
            .finish()
    }
}

impl CapabilitySet {
    /// Bind every registered capability against the given session
    pub fn bind(context: &SessionContext, helpers: RequestHelpers) -> Self {
        let options = Arc::new(RwLock::new(context.options.clone()));
        let seed = BindSeed {
            jar: context.jar.clone(),
            transport: helpers.transport().clone(),
            options: options.clone(),
        };

        let mut entries = HashMap::new();
        for (name, constructor) in REGISTRY {
            entries.insert((*name).to_string(), constructor(&seed));
            debug!("bound capability '{name}'");
        }

        Self { options, entries }
    }

    /// Names of all bound capabilities, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Look up a bound capability by name
    pub fn get(&self, name: &str) -> Option<&dyn Capability> {
        self.entries.get(name).map(Box::as_ref)
    }

    /// Invoke a capability by name
    pub async fn invoke(&self, name: &str, input: Value) -> Result<Value> {
        match self.entries.get(name) {
            Some(capability) => capability.invoke(input).await,
            None => Err(Error::internal(format!("unknown capability '{name}'"))),
        }
    }

    /// The live options shared with the `setOptions` capability
    pub fn options(&self) -> Arc<RwLock<LoginOptions>> {
        self.options.clone()
    }
}

fn bind_get_app_state(seed: &BindSeed) -> Box<dyn Capability> {
    Box::new(GetAppState {
        jar: seed.jar.clone(),
    })
}

fn bind_set_options(seed: &BindSeed) -> Box<dyn Capability> {
    Box::new(SetOptions {
        options: seed.options.clone(),
        transport: seed.transport.clone(),
    })
}

/// Exports the cookie jar as a persistable credential bundle
struct GetAppState {
    jar: Arc<CookieJar>,
}

#[async_trait]
impl Capability for GetAppState {
    async fn invoke(&self, _input: Value) -> Result<Value> {
        let bundle = self.jar.snapshot().await;
        Ok(serde_json::to_value(bundle)?)
    }
}

/// Applies an option map onto the live session options
///
/// Proxy and user-agent changes take effect on the shared transport
/// immediately; everything else only updates the option set.
struct SetOptions {
    options: Arc<RwLock<LoginOptions>>,
    transport: Transport,
}

#[async_trait]
impl Capability for SetOptions {
    async fn invoke(&self, input: Value) -> Result<Value> {
        let Value::Object(map) = input else {
            return Err(Error::internal("setOptions expects a JSON object"));
        };

        {
            let mut options = self.options.write().await;
            options.apply(&map);

            if map.contains_key("proxy") {
                self.transport.set_proxy(options.proxy.clone()).await?;
            }
            if map.contains_key("userAgent") {
                self.transport.set_user_agent(options.user_agent.clone()).await;
            }
        }

        Ok(Value::Null)
    }
}
