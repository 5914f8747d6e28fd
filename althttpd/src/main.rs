//! Entry point: parses flags, initializes logging, optionally jails the
//! process, then dispatches to the standalone accept loop or the
//! super-server single-connection path.
//!
//! Grounded on `servente_cli`'s `main.rs` shape (parse `Cli`, init
//! `tracing_subscriber`, build a config value, hand off to the async
//! runtime) generalized with this server's own boot sequence (§5): jail
//! before binding a socket, since `enter_jail` chroots and the standalone
//! content root must still be reachable as `/` afterward.

use std::process::ExitCode;
use std::sync::Arc;

use althttpd::{listener, server_config::ServerConfig};
use althttpd_config::{boot, Cli};
use clap::Parser;

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    if cli.datetest {
        return run_date_self_test();
    }

    let config = ServerConfig::from_cli(&cli);

    if config.jail {
        if let Err(err) = boot::enter_jail(&config.content_root, cli.user.as_deref()) {
            tracing::error!(error = %err, "failed to enter jail");
            return ExitCode::FAILURE;
        }
    }
    if let Err(err) = boot::install_default_cpu_rlimit(config.max_cpu_secs) {
        tracing::error!(error = %err, "failed to install default CPU rlimit");
        return ExitCode::FAILURE;
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(err) => {
            tracing::error!(error = %err, "failed to start the async runtime");
            return ExitCode::FAILURE;
        }
    };

    let config = Arc::new(config);
    let result = runtime.block_on(async move {
        if cli.super_server {
            listener::run_super_server(config).await;
            Ok(())
        } else {
            listener::run_standalone(config).await
        }
    });

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "server exited with an error");
            ExitCode::FAILURE
        }
    }
}

/// Runs the RFC 822 round-trip self-test (`--datetest`): format then parse
/// every sampled timestamp, exiting non-zero on the first mismatch rather
/// than requiring the test suite to catch a date regression.
fn run_date_self_test() -> ExitCode {
    let mut t: i64 = 0;
    let mut failures = 0u32;
    while t < (1i64 << 31) {
        let formatted = althttpd_http1::date::format_rfc822(t);
        match althttpd_http1::date::parse_rfc822(&formatted) {
            Some(parsed) if parsed == t => {}
            other => {
                eprintln!("date round-trip failed for t={t} ({formatted}): got {other:?}");
                failures += 1;
            }
        }
        t += 127 * 10_000;
    }

    if failures == 0 {
        println!("date round-trip self-test passed");
        ExitCode::SUCCESS
    } else {
        eprintln!("{failures} date round-trip failures");
        ExitCode::FAILURE
    }
}
