//! The SCGI relay (§4.8): parses a `.scgi` control file, connects to the
//! named backend (retrying through `relight:` once on total failure), and
//! frames the request environment as an SCGI netstring header block.
//!
//! Grounded on `servente-cgi`'s process-launching plumbing for the
//! `relight:` child-spawn path, and on the teacher's preference for
//! `tokio::net` resolution helpers (`servente_http1::start`'s listener setup
//! uses the same `tokio::net::lookup_host`-shaped async resolution).

use std::path::PathBuf;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::process::Command;

use crate::env::{sanitize_env_value, CgiEnv, ENV_TABLE};

#[derive(Debug, thiserror::Error)]
pub enum ScgiError {
    #[error("control file line 1 was not 'SCGI <host> <port>'")]
    MalformedHeaderLine,
    #[error("control file named a non-numeric port: {0}")]
    InvalidPort(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A parsed `.scgi` control file: the mandatory `SCGI <host> <port>` header
/// line, plus the optional `fallback:` and `relight:` directives. `#`-led
/// lines are comments and are skipped.
#[derive(Debug, Clone, Default)]
pub struct ScgiConfig {
    pub host: String,
    pub port: u16,
    pub fallback: Option<PathBuf>,
    pub relight: Option<String>,
}

/// Parses the control file grammar: first non-blank line `SCGI <host>
/// <port>`, then zero or more `fallback:<path>` / `relight:<command>` /
/// `#comment` lines.
pub fn parse_control_file(contents: &str) -> Result<ScgiConfig, ScgiError> {
    let mut lines = contents.lines().filter(|line| !line.trim().is_empty());

    let header = lines.next().ok_or(ScgiError::MalformedHeaderLine)?;
    let mut parts = header.split_whitespace();
    let tag = parts.next().ok_or(ScgiError::MalformedHeaderLine)?;
    let host = parts.next().ok_or(ScgiError::MalformedHeaderLine)?;
    let port_token = parts.next().ok_or(ScgiError::MalformedHeaderLine)?;
    if tag != "SCGI" {
        return Err(ScgiError::MalformedHeaderLine);
    }
    let port: u16 = port_token
        .parse()
        .map_err(|_| ScgiError::InvalidPort(port_token.to_string()))?;

    let mut config = ScgiConfig { host: host.to_string(), port, fallback: None, relight: None };

    for line in lines {
        let line = line.trim();
        if line.starts_with('#') {
            continue;
        }
        if let Some(path) = line.strip_prefix("fallback:") {
            config.fallback = Some(PathBuf::from(path.trim()));
        } else if let Some(command) = line.strip_prefix("relight:") {
            config.relight = Some(command.trim().to_string());
        }
    }

    Ok(config)
}

/// What the caller should do after [`connect_with_relight`] returns.
pub enum ScgiOutcome {
    Connected(TcpStream),
    /// Connection failed even after a relight retry; serve the static
    /// `fallback:` file instead (§4.6), if one is configured.
    UseFallback(PathBuf),
    /// Connection failed, no relight configured or it didn't help, and no
    /// fallback file is configured either: the caller reports `malfunction`.
    Malfunction,
}

/// Tries every address `host` resolves to at `port`; on total failure, runs
/// `relight:` once (giving the backend a second to start, per §4.8) and
/// retries the same resolution once more before giving up.
pub async fn connect_with_relight(config: &ScgiConfig) -> ScgiOutcome {
    if let Ok(stream) = try_connect(&config.host, config.port).await {
        return ScgiOutcome::Connected(stream);
    }

    if let Some(relight) = &config.relight {
        if spawn_relight(relight).await.is_ok() {
            tokio::time::sleep(Duration::from_secs(1)).await;
            if let Ok(stream) = try_connect(&config.host, config.port).await {
                return ScgiOutcome::Connected(stream);
            }
        }
    }

    match &config.fallback {
        Some(path) => ScgiOutcome::UseFallback(path.clone()),
        None => ScgiOutcome::Malfunction,
    }
}

async fn try_connect(host: &str, port: u16) -> std::io::Result<TcpStream> {
    let mut last_err = None;
    for addr in tokio::net::lookup_host((host, port)).await? {
        match TcpStream::connect(addr).await {
            Ok(stream) => return Ok(stream),
            Err(err) => last_err = Some(err),
        }
    }
    Err(last_err.unwrap_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, "no addresses resolved")))
}

async fn spawn_relight(command_line: &str) -> std::io::Result<()> {
    let shell = std::env::var("SHELL").unwrap_or_else(|_| "/bin/sh".to_string());
    Command::new(shell).arg("-c").arg(command_line).status().await.map(|_| ())
}

/// Encodes the SCGI netstring header block: a sequence of NUL-separated
/// `name`/`value` pairs, `CONTENT_LENGTH` always first, wrapped as
/// `<byte-length>:<body>,`. `SCGI=1` is emitted immediately after
/// `CONTENT_LENGTH`, present only in this framed block (it is not part of
/// the shared [`ENV_TABLE`] since CGI never sets it).
#[must_use]
pub fn encode_headers(env: &CgiEnv) -> Vec<u8> {
    let mut body = Vec::new();

    let content_length = env.content_length.clone().unwrap_or_else(|| "0".to_string());
    push_pair(&mut body, "CONTENT_LENGTH", &content_length);
    push_pair(&mut body, "SCGI", "1");

    for (name, accessor) in ENV_TABLE.iter().skip(1) {
        if let Some(value) = accessor(env) {
            push_pair(&mut body, name, &sanitize_env_value(value));
        }
    }

    let mut framed = format!("{}:", body.len()).into_bytes();
    framed.extend_from_slice(&body);
    framed.push(b',');
    framed
}

fn push_pair(body: &mut Vec<u8>, name: &str, value: &str) {
    body.extend_from_slice(name.as_bytes());
    body.push(0);
    body.extend_from_slice(value.as_bytes());
    body.push(0);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_header_line_and_directives() {
        let config = parse_control_file("SCGI 127.0.0.1 9000\nfallback:/srv/down.html\nrelight:/usr/local/bin/wake\n#comment\n").unwrap();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 9000);
        assert_eq!(config.fallback, Some(PathBuf::from("/srv/down.html")));
        assert_eq!(config.relight.as_deref(), Some("/usr/local/bin/wake"));
    }

    #[test]
    fn missing_scgi_tag_is_rejected() {
        assert!(matches!(parse_control_file("nope here\n"), Err(ScgiError::MalformedHeaderLine)));
    }

    #[test]
    fn non_numeric_port_is_rejected() {
        assert!(matches!(parse_control_file("SCGI localhost abc\n"), Err(ScgiError::InvalidPort(_))));
    }

    #[test]
    fn encoded_header_block_has_content_length_and_scgi_first() {
        let mut env = CgiEnv::default();
        env.content_length = Some("27".to_string());
        env.request_method = "POST".to_string();
        let encoded = encode_headers(&env);
        let text = String::from_utf8_lossy(&encoded);
        assert!(text.contains("CONTENT_LENGTH\u{0}27\u{0}SCGI\u{0}1\u{0}"));
        assert!(text.ends_with(','));
    }
}
