//! Login command implementation.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use whtools_core::tokens::SESSION_COOKIE;

use crate::config::{DEFAULT_CONFIG_FILE, WarehouseConfig};
use crate::output;

#[derive(Args, Debug)]
pub struct LoginArgs {
    /// Path to the client configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,
}

pub async fn run(args: LoginArgs) -> Result<()> {
    let config = WarehouseConfig::load(&args.config)
        .with_context(|| format!("Failed to load configuration from {}", args.config.display()))?;
    let tls = config.tls_settings().context("Failed to load trust bundle")?;

    let session = super::authenticate(&config, &tls).await?;

    output::success("Logged in successfully");
    println!();
    output::field("CAS", config.cas_url.as_str());
    output::field("Service", config.http_warehouse_url()?.as_str());
    if session.is_empty() {
        output::warning(&format!("The warehouse did not set {}", SESSION_COOKIE));
    } else {
        output::field(SESSION_COOKIE, session.as_str());
    }

    Ok(())
}
