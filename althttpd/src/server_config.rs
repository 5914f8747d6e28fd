//! Process-wide configuration, loaded once at boot from [`Cli`] and shared
//! behind an `Arc` thereafter (§3 "Ownership") — the async analogue of the
//! teacher's `ServenteConfig`/`ServenteSettings` split between immutable
//! config data and mutable per-connection state.

use std::path::PathBuf;

use althttpd_config::{Cli, Family};

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub content_root: PathBuf,
    pub default_port: u16,
    pub family: Family,
    pub https: bool,
    pub jail: bool,
    pub max_age_secs: u64,
    pub max_cpu_secs: u64,
    pub debug: bool,
    pub log_path: Option<PathBuf>,
    pub server_name: String,
}

impl ServerConfig {
    #[must_use]
    pub fn from_cli(cli: &Cli) -> Self {
        Self {
            content_root: cli.root.clone().unwrap_or_else(|| PathBuf::from(".")),
            default_port: cli.port,
            family: cli.family,
            https: cli.https,
            jail: cli.jail,
            max_age_secs: cli.max_age,
            max_cpu_secs: cli.max_cpu,
            debug: cli.debug,
            // Unlike the original's mandatory `-logfile`, a bare run with no
            // flag at all still gets an access log rather than silently
            // discarding every request (judgment call, recorded in DESIGN.md).
            log_path: Some(cli.logfile.clone().unwrap_or_else(|| PathBuf::from("althttpd-access.log"))),
            server_name: hostname(),
        }
    }
}

fn hostname() -> String {
    #[cfg(unix)]
    {
        nix::unistd::gethostname()
            .ok()
            .and_then(|s| s.into_string().ok())
            .unwrap_or_else(|| "localhost".to_string())
    }
    #[cfg(not(unix))]
    {
        "localhost".to_string()
    }
}
