//! Redfox login CLI
//!
//! Runs the session bootstrap from the command line: restores a stored
//! bundle or logs in with credentials, resolves checkpoints interactively,
//! and writes the resulting bundle back to disk.
//!
//! # Usage
//!
//! ## Fresh login
//! ```bash
//! redfox --email user@example.com --password hunter2
//! ```
//!
//! ## Resume from a stored bundle
//! ```bash
//! redfox --appstate ./appstate.json
//! ```

use clap::Parser;
use std::path::PathBuf;

use redfox::cli::login::{LoginArgs, run_login_mode};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(name = "redfox")]
struct Cli {
    /// Account email address for a fresh login
    #[arg(short, long, value_name = "EMAIL")]
    email: Option<String>,

    /// Account password for a fresh login
    #[arg(short, long, value_name = "PASSWORD")]
    password: Option<String>,

    /// Path to a stored credential bundle (takes precedence over credentials)
    #[arg(short, long, value_name = "FILE")]
    appstate: Option<PathBuf>,

    /// Where to write the resulting bundle (defaults to the appstate path)
    #[arg(short, long, value_name = "FILE")]
    out: Option<PathBuf>,

    /// Proxy server URL (http://host:port, socks5://host:port, etc.)
    #[arg(long, value_name = "PROXY")]
    proxy: Option<String>,

    /// Browser identity string to present
    #[arg(short, long, value_name = "USER_AGENT")]
    user_agent: Option<String>,

    /// Push through the device-confirmation checkpoint instead of failing
    #[arg(short, long)]
    force_login: bool,

    /// Act as the given page identity after login
    #[arg(long, value_name = "PAGE_ID")]
    page: Option<String>,

    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let args = LoginArgs {
        email: cli.email,
        password: cli.password,
        appstate: cli.appstate,
        out: cli.out,
        proxy: cli.proxy,
        user_agent: cli.user_agent,
        force_login: cli.force_login,
        page: cli.page,
        config: cli.config,
        verbose: cli.verbose,
    };
    run_login_mode(args).await
}
