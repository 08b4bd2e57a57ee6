//! Subcommand implementations.

pub mod login;
pub mod run;

use anyhow::{Context, Result};
use colored::Colorize;

use whtools_core::SessionId;
use whtools_net::{CasClient, TlsSettings};

use crate::config::WarehouseConfig;

/// Run the CAS exchange for the warehouse named in `config`.
async fn authenticate(config: &WarehouseConfig, tls: &TlsSettings) -> Result<SessionId> {
    let service = config.http_warehouse_url()?;

    eprintln!("{}", format!("Logging in to {}...", config.cas_url).dimmed());

    let cas = CasClient::new(config.cas_url.clone(), tls.clone());
    let session = cas
        .login(&config.credentials(), &service)
        .await
        .context("CAS login failed")?;

    Ok(session)
}
