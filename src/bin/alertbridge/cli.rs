use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{ArgAction, Parser};

#[derive(Parser, Debug)]
#[command(author, version, about = "Alertmanager to Mattermost alert bridge", long_about = None)]
pub struct Cli {
    /// Path of the TOML configuration file.
    #[arg(long, value_name = "PATH", default_value = "alertbridge.toml")]
    pub config: PathBuf,

    /// Override the listen address (e.g. "127.0.0.1:8080").
    #[arg(long, value_name = "ADDR")]
    pub listen: Option<SocketAddr>,

    /// Validate the configuration and exit.
    #[arg(long, action = ArgAction::SetTrue)]
    pub check_config: bool,

    /// Emit JSON logs (requires `--features json-logs`).
    #[arg(long, action = ArgAction::SetTrue)]
    pub json_logs: bool,

    /// Explicit log filter (e.g. "alertbridge=debug").
    #[arg(long, value_name = "FILTER")]
    pub log_filter: Option<String>,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
