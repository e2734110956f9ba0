//! Login mode CLI logic
//!
//! Runs the full bootstrap from the command line, resolving checkpoints
//! interactively: approval codes are read from stdin, an empty answer
//! waits for an out-of-band device approval instead.

use anyhow::Result;
use std::path::PathBuf;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    ConfigLoader,
    session::{ApprovalInput, Outcome, bootstrap},
    types::{Credentials, LoginOptions},
    utils::appstate::{AppStateFile, get_appstate_path},
};

/// Arguments for login mode
#[derive(Debug)]
pub struct LoginArgs {
    pub email: Option<String>,
    pub password: Option<String>,
    pub appstate: Option<PathBuf>,
    pub out: Option<PathBuf>,
    pub proxy: Option<String>,
    pub user_agent: Option<String>,
    pub force_login: bool,
    pub page: Option<String>,
    pub config: Option<PathBuf>,
    pub verbose: bool,
}

/// Run login mode with the given arguments
pub async fn run_login_mode(args: LoginArgs) -> Result<()> {
    // Logging goes to stderr so the exported bundle can go to stdout
    if args.verbose {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "debug".into()),
            )
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "info".into()),
            )
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    let config_path = args.config.clone().or_else(ConfigLoader::get_config_path);
    let settings = ConfigLoader::new().load(config_path.as_deref())?;

    let mut options = LoginOptions::default();
    options.force_login = args.force_login;
    options.proxy = args.proxy.clone();
    options.subject_id_override = args.page.clone();
    if let Some(user_agent) = args.user_agent.clone() {
        options.user_agent = user_agent;
    }

    debug!(
        "starting login: email={:?}, appstate={:?}, force_login={}",
        args.email, args.appstate, args.force_login
    );

    let credentials = match (&args.email, &args.password) {
        (Some(email), Some(password)) => Some(Credentials::new(email, password)),
        (Some(_), None) | (None, Some(_)) => {
            anyhow::bail!("both --email and --password are required for a fresh login");
        }
        (None, None) => None,
    };

    let store_path = match &args.appstate {
        Some(path) => path.clone(),
        None => get_appstate_path()?,
    };
    let store = AppStateFile::new(store_path);

    let bundle = if restore_stored_bundle(args.appstate.is_some(), credentials.is_some()) {
        store.load().await?
    } else {
        None
    };
    if bundle.is_some() {
        info!("restoring a stored session bundle");
    }

    let mut outcome = bootstrap(bundle, credentials, options, settings).await?;

    loop {
        match outcome {
            Outcome::Ready(session) => {
                info!("session established for {}", session.context.user_id);
                if session.context.mqtt_endpoint.is_none() {
                    warn!("session is degraded: no realtime endpoint was resolved");
                }

                let bundle = session.context.jar.snapshot().await;
                let out_store = match &args.out {
                    Some(path) => AppStateFile::new(path.clone()),
                    None => store,
                };
                out_store.save(&bundle).await?;

                println!("{}", session.context.user_id);
                return Ok(());
            }
            Outcome::ApprovalPending(checkpoint) => {
                if let Some(detail) = checkpoint.last_error() {
                    eprintln!(
                        "Approval code rejected ({detail}); {} attempts left",
                        checkpoint.retries_left()
                    );
                }
                eprintln!(
                    "Login approval required. Enter the code, or press Enter to wait for approval from another device:"
                );

                let answer = read_line()?;
                let input = if answer.is_empty() {
                    eprintln!("Waiting for approval from another device...");
                    ApprovalInput::AwaitDeviceApproval
                } else {
                    ApprovalInput::Code(answer)
                };
                outcome = checkpoint.submit(input).await?;
            }
        }
    }
}

/// Whether the stored bundle should seed the attempt
///
/// An explicit --appstate always restores; the default store is only
/// consulted when no credentials were given, so a stale bundle cannot
/// shadow a requested fresh login.
fn restore_stored_bundle(explicit_appstate: bool, has_credentials: bool) -> bool {
    explicit_appstate || !has_credentials
}

fn read_line() -> Result<String> {
    let mut buffer = String::new();
    std::io::stdin().read_line(&mut buffer)?;
    Ok(buffer.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_skip_the_default_store() {
        // Fresh login with nothing else: the stale default bundle stays out
        assert!(!restore_stored_bundle(false, true));
    }

    #[test]
    fn test_explicit_appstate_always_restores() {
        assert!(restore_stored_bundle(true, true));
        assert!(restore_stored_bundle(true, false));
    }

    #[test]
    fn test_bare_invocation_resumes_from_the_default_store() {
        assert!(restore_stored_bundle(false, false));
    }
}
