//! The CGI launcher (§4.7, §5): spawns the target script as a child process,
//! installs the CGI/1.0 environment, optionally caps its CPU time, and hands
//! the caller its stdin/stdout so the pipeline can stream the request body in
//! and either parse a framed reply or, for an NPH script, pass the child's
//! output straight through.
//!
//! Grounded on `servente-cgi`'s process-launching shape, moved from a forked
//! `std::process::Command` onto `tokio::process::Command` since the rest of
//! this server is async end to end.

use std::path::Path;
use std::process::Stdio;

#[cfg(unix)]
use tokio::process::CommandExt;
use tokio::process::{Child, Command};

use crate::env::{sanitize_env_value, CGI_ONLY_ENV_TABLE, ENV_TABLE};
use crate::CgiEnv;

#[derive(Debug, thiserror::Error)]
pub enum CgiError {
    #[error("failed to spawn CGI script: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("CGI script did not expose a stdout pipe")]
    NoStdout,
    #[error("CGI script did not expose a stdin pipe")]
    NoStdin,
}

/// A script is launched NPH (non-parsed-headers) when its name starts with
/// `nph-`, the one naming convention the distilled spec inherited and kept
/// unchanged (§9 Glossary: "NPH").
#[must_use]
pub fn is_nph(script_file_name: &str) -> bool {
    script_file_name.starts_with("nph-")
}

/// Spawns `script_path` with `path_info` as its sole argument (matching the
/// original CGI convention of passing extra path segments as `argv[1]`),
/// running with its working directory at the script's own directory
/// (`SCRIPT_DIRECTORY`), and the CGI/1.0 environment built from `env`.
///
/// `max_cpu_secs`, when set, is installed as `RLIMIT_CPU` on the child via
/// `pre_exec`, the one place this crate still needs a raw, unsafe fork-time
/// hook: there is no async-native way to bound a process's own CPU budget
/// before it execs.
pub fn spawn(
    script_path: &Path,
    path_info: &str,
    env: &CgiEnv,
    max_cpu_secs: Option<u64>,
) -> Result<Child, CgiError> {
    let mut command = Command::new(script_path);
    command
        .current_dir(&env.script_directory)
        .arg(path_info)
        .env_clear()
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit());

    for (name, accessor) in ENV_TABLE.iter().chain(CGI_ONLY_ENV_TABLE.iter()) {
        if let Some(value) = accessor(env) {
            command.env(*name, sanitize_env_value(value));
        }
    }

    #[cfg(unix)]
    if let Some(cpu_secs) = max_cpu_secs {
        unsafe {
            command.pre_exec(move || {
                let limit = nix::sys::resource::Resource::RLIMIT_CPU;
                nix::sys::resource::setrlimit(limit, cpu_secs, cpu_secs)
                    .map_err(|errno| std::io::Error::from_raw_os_error(errno as i32))
            });
        }
    }
    #[cfg(not(unix))]
    let _ = max_cpu_secs;

    command.spawn().map_err(CgiError::Spawn)
}

/// Splits a spawned child into its stdin/stdout handles, matching how the
/// pipeline wants to hand the body writer and reply reader to two
/// independently-driven tasks (write the POST body while concurrently
/// reading whatever the script has started writing back).
pub fn split(child: &mut Child) -> Result<(tokio::process::ChildStdin, tokio::process::ChildStdout), CgiError> {
    let stdin = child.stdin.take().ok_or(CgiError::NoStdin)?;
    let stdout = child.stdout.take().ok_or(CgiError::NoStdout)?;
    Ok((stdin, stdout))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nph_prefix_is_detected() {
        assert!(is_nph("nph-status.cgi"));
        assert!(!is_nph("status.cgi"));
    }
}
