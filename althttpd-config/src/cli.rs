//! Command-line flags, parsed with `clap`'s derive API.
//!
//! Grounded on `collaudatrice`'s `#[derive(Parser)]` usage in the teacher's
//! own tooling (`collaudatrice/src/main.rs`), the one place in the pack that
//! shows this teacher reaching for `clap` rather than hand-rolling an
//! argument loop.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

#[derive(Parser, Debug)]
#[command(author, version, about = "A small, self-contained HTTP/1.1 server", long_about = None)]
pub struct Cli {
    /// Standalone mode content root (also the jail root, if `--jail` is set).
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Port to bind in standalone mode.
    #[arg(long, default_value_t = 8080)]
    pub port: u16,

    /// Unix user to drop privileges to after chroot, if started as root.
    #[arg(long)]
    pub user: Option<String>,

    /// CSV access log path; may contain `strftime`-style `%Y`/`%m`/`%d` tokens.
    #[arg(long)]
    pub logfile: Option<PathBuf>,

    /// Record requests as having arrived over HTTPS (TLS is terminated upstream).
    #[arg(long)]
    pub https: bool,

    /// Address family to bind in standalone mode.
    #[arg(long, value_enum, default_value_t = Family::Any)]
    pub family: Family,

    /// Chroot + setuid/setgid before serving (only possible if started as root).
    #[arg(long, default_value_t = true)]
    pub jail: bool,

    /// Default `Cache-Control: max-age` for static files, in seconds.
    #[arg(long, default_value_t = 120)]
    pub max_age: u64,

    /// CPU time limit for CGI children, in seconds; 0 disables the limit.
    #[arg(long, default_value_t = 30)]
    pub max_cpu: u64,

    /// Disable every request/connection timeout (for interactive debugging).
    #[arg(long)]
    pub debug: bool,

    /// Replay a request recorded in `FILE` instead of reading from a socket.
    #[arg(long)]
    pub input: Option<PathBuf>,

    /// Run the RFC 822 date round-trip self-test and exit.
    #[arg(long)]
    pub datetest: bool,

    /// Run in super-server mode: serve exactly one connection already
    /// attached to stdin/stdout (the inetd/xinetd invocation), instead of
    /// binding `--port` and accepting connections directly.
    #[arg(long)]
    pub super_server: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum Family {
    Ipv4,
    Ipv6,
    Any,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_distilled_spec() {
        let cli = Cli::parse_from(["althttpd"]);
        assert_eq!(cli.port, 8080);
        assert_eq!(cli.max_age, 120);
        assert_eq!(cli.max_cpu, 30);
        assert!(cli.jail);
        assert!(!cli.https);
        assert_eq!(cli.family, Family::Any);
    }

    #[test]
    fn flags_override_defaults() {
        let cli = Cli::parse_from([
            "althttpd", "--root", "/srv/www", "--port", "9000", "--user", "www-data", "--max-cpu", "0", "--https",
        ]);
        assert_eq!(cli.root, Some(PathBuf::from("/srv/www")));
        assert_eq!(cli.port, 9000);
        assert_eq!(cli.user.as_deref(), Some("www-data"));
        assert_eq!(cli.max_cpu, 0);
        assert!(cli.https);
    }
}
