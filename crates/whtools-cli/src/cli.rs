//! CLI argument definitions.

use clap::{Parser, Subcommand};

use crate::commands::login::LoginArgs;
use crate::commands::run::RunArgs;

/// Client for the situation data warehouse.
#[derive(Parser, Debug)]
#[command(name = "whclient")]
#[command(author, version = env!("WHCLIENT_VERSION"), about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Output logs as JSON
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Log in, open the warehouse session and relay request and deposit files
    Run(RunArgs),

    /// Log in through CAS and print the session id
    Login(LoginArgs),
}
