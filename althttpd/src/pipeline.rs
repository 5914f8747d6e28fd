//! The per-connection/per-request state machine (§4.9): reads a request off
//! the wire, sanitizes and resolves it to a filesystem object inside a
//! per-host content root, runs the `-auth` check, dispatches to static
//! file / CGI / SCGI, writes the response, and logs the request — then loops
//! for the next pipelined request until something latches `close_connection`.
//!
//! Grounded on the teacher's `servente_http1::start` connection-task shape
//! (accept, then drive one task to completion reading request after
//! request) generalized from a single always-on HTTP/1.1 loop to this
//! server's three-way dispatch and harder timeout/resource policy. Every
//! alarm-based deadline in the original becomes a `tokio::time::timeout`
//! wrapping the corresponding future (§4.9, §5), skipped entirely in
//! `--debug` mode the same way the original disables its `alarm(2)` calls.

use std::path::PathBuf;
use std::time::{Duration, Instant, SystemTime};

use althttpd_cgi::{cgi, env::CgiEnv, reply, scgi};
use althttpd_config::auth;
use althttpd_config::vhost;
use althttpd_http::{ByteRange, HeaderName, Method};
use althttpd_http1::{read, sanitize, write};
use althttpd_resources::static_file;
use tokio::io::{AsyncBufRead, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::context::{ConnectionState, RequestContext};
use crate::diag;
use crate::logger;
use crate::policy;
use crate::resolve::{self, ResolveOutcome};
use crate::response;
use crate::server_config::ServerConfig;

/// §6 "Request-body cap": larger than this and a POST is rejected with 500
/// before a single byte of it is read.
const MAX_CONTENT_LENGTH: u64 = 250_000_000;

const REQUEST_LINE_TIMEOUT: Duration = Duration::from_secs(15);
const HEADER_TIMEOUT: Duration = Duration::from_secs(15);
const PRE_DISPATCH_TIMEOUT: Duration = Duration::from_secs(10);
const IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// §4.10: a standalone connection is force-closed after its 100th request,
/// the async reading of "run the per-request loop up to 100 requests, then
/// one final request with force-close".
const MAX_REQUESTS_PER_CONNECTION: u64 = 100;

fn post_body_timeout(content_length: u64) -> Duration {
    Duration::from_secs(15 + content_length / 2000)
}

fn static_stream_timeout(size: u64) -> Duration {
    Duration::from_secs(30 + size / 1000)
}

/// Awaits `fut` under `duration`, unless `debug` is set, in which case the
/// deadline is skipped entirely (§5: "`--debug` disables every timeout").
async fn maybe_timeout<F: std::future::Future>(debug: bool, duration: Duration, fut: F) -> Result<F::Output, ()> {
    if debug {
        return Ok(fut.await);
    }
    tokio::time::timeout(duration, fut).await.map_err(|_| ())
}

/// Strips the `::ffff:`-prefixed IPv4-mapped-IPv6 form down to the plain
/// dotted-quad address (§3 "remote_addr"), leaving every other address
/// (including real IPv6) untouched.
#[must_use]
pub fn strip_ipv4_mapped(addr: &str) -> String {
    if let Some(tail) = addr.strip_prefix("::ffff:") {
        if tail.split('.').count() == 4 && tail.chars().all(|c| c.is_ascii_digit() || c == '.') {
            return tail.to_string();
        }
    }
    addr.to_string()
}

/// Splits a `Host:` value into host and port, honoring the `[IPv6]:port`
/// bracket form (§4.9 step 4). Returns an empty port when none was given.
fn split_host_port(raw: &str) -> (String, String) {
    if let Some(rest) = raw.strip_prefix('[') {
        if let Some(idx) = rest.find(']') {
            let host = rest[..idx].to_string();
            let port = rest[idx + 1..].strip_prefix(':').unwrap_or("").to_string();
            return (host, port);
        }
    }
    match raw.rsplit_once(':') {
        Some((host, port)) if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) => {
            (host.to_string(), port.to_string())
        }
        _ => (raw.to_string(), String::new()),
    }
}

/// Normalizes a sanitized `Host` into the directory-name key used to pick a
/// `<key>.website` content root (§4.9 step 9): lowercased, `.` kept, every
/// other byte folded to `_`, trailing dots stripped.
fn vhost_key(host: &str) -> String {
    let mut key: String = host
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' { c.to_ascii_lowercase() } else { '_' })
        .collect();
    while key.ends_with('.') {
        key.pop();
    }
    key
}

fn collapse_leading_slashes(target: &str) -> String {
    if let Some(rest) = target.strip_prefix("//") {
        format!("/{}", rest.trim_start_matches('/'))
    } else {
        target.to_string()
    }
}

fn split_query(target: &str) -> (String, String) {
    match target.split_once('?') {
        Some((path, query)) => (path.to_string(), format!("?{query}")),
        None => (target.to_string(), String::new()),
    }
}

/// Rejects any `.`/`-`-led segment outside the one whitelisted prefix
/// `/.well-known/`, and rejects a literal `..` segment even under it (§4.9
/// step 8, §3 invariants).
fn has_forbidden_path_segment(path: &str) -> bool {
    let under_well_known = path.starts_with("/.well-known/");
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        if segment == ".." {
            return true;
        }
        if !under_well_known && (segment.starts_with('.') || segment.starts_with('-')) {
            return true;
        }
    }
    false
}

/// Decodes an `Authorization: Basic <b64>` header into the literal
/// `"login:password"` string compared against each `-auth` `user` directive
/// (§4.5); anything else (a different scheme, undecodable base64, no `:`
/// separator) yields `None`, treated as "no credentials" by the caller.
fn parse_basic_credentials(header: &str) -> Option<String> {
    let encoded = header.strip_prefix("Basic ")?;
    let decoded = sanitize::decode_base64_lenient(encoded.trim());
    let text = String::from_utf8_lossy(&decoded);
    text.contains(':').then(|| text.into_owned())
}

/// Notes a failed response write as a broken-pipe close rather than letting
/// the error escape: the peer is already gone, there's nothing left to do
/// but stop serving this connection (§7: "Signal ... close").
fn note_write_failure(ctx: &mut RequestContext, result: std::io::Result<()>) {
    if result.is_err() {
        ctx.diagnostic_code = diag::BROKEN_PIPE;
        ctx.close_connection = true;
    }
}

/// Logs the just-finished request (unless `skip_log`, the NPH bypass — §8
/// "every accepted request gets one log entry, unless the explicit `nph-`
/// path is taken") and reports whether the connection should read another
/// pipelined request.
async fn finish(
    config: &ServerConfig,
    ctx: &mut RequestContext,
    connection: &mut ConnectionState,
    request_start: Instant,
    skip_log: bool,
) -> bool {
    if !skip_log {
        if let Some(log_path) = &config.log_path {
            let expanded = logger::expand_log_path(log_path);
            match logger::append_entry(&expanded, ctx, connection, request_start) {
                Ok(usage) => connection.previous_usage = usage,
                Err(err) => tracing::warn!(error = %err, "failed to append access log entry"),
            }
        }
    }
    !ctx.close_connection
}

/// Drives one connection end to end: reads requests until something
/// latches `close_connection` or the peer goes away. `remote_addr` has
/// already had any IPv4-mapped-IPv6 prefix stripped by the caller.
pub async fn serve_connection<S>(stream: S, config: &ServerConfig, remote_addr: String)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (read_half, mut writer) = tokio::io::split(stream);
    let mut reader = BufReader::new(read_half);
    let mut connection = ConnectionState::new(false);

    loop {
        connection.request_number += 1;
        if connection.request_number >= MAX_REQUESTS_PER_CONNECTION {
            connection.force_close = true;
        }
        let mut ctx = RequestContext::new(remote_addr.clone(), config.https, connection.force_close);
        let request_start = Instant::now();

        let keep_going = serve_one_request(config, &mut reader, &mut writer, &mut ctx, &mut connection, request_start).await;
        if !keep_going {
            break;
        }
    }
}

/// Serves exactly one request on an already-open connection; returns
/// whether the caller should read another.
async fn serve_one_request<R, W>(
    config: &ServerConfig,
    reader: &mut R,
    writer: &mut W,
    ctx: &mut RequestContext,
    connection: &mut ConnectionState,
    request_start: Instant,
) -> bool
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    // Step 2: request line. A fresh connection gets the strict 15s deadline;
    // a pipelined request gets the more generous keep-alive idle window,
    // since there is no byte on the wire yet to distinguish "still reading a
    // slow line" from "nothing has arrived since the last response".
    let line_timeout = if connection.request_number <= 1 { REQUEST_LINE_TIMEOUT } else { IDLE_TIMEOUT };
    let line_result = maybe_timeout(config.debug, line_timeout, read::read_request_line(reader)).await;

    let (method, target, version) = match line_result {
        Err(()) => {
            let diagnostic = if connection.request_number <= 1 { diag::TIMEOUT_READ } else { diag::TIMEOUT_IDLE };
            note_write_failure(ctx, response::request_timeout(writer, ctx, diagnostic).await);
            return finish(config, ctx, connection, request_start, false).await;
        }
        Ok(Err(althttpd_http::Error::Eof)) => return false,
        Ok(Err(_)) => {
            note_write_failure(ctx, response::bad_request(writer, ctx).await);
            return finish(config, ctx, connection, request_start, false).await;
        }
        Ok(Ok(parsed)) => parsed,
    };

    ctx.protocol = version;
    ctx.method = method;
    ctx.raw_uri = target.clone();
    if version < althttpd_http::HttpVersion::Http11 {
        ctx.close_connection = true;
    }

    if !target.starts_with('/') {
        note_write_failure(ctx, response::not_found(writer, ctx).await);
        ctx.diagnostic_code = diag::EMPTY_REQUEST_URI;
        return finish(config, ctx, connection, request_start, false).await;
    }
    let target = collapse_leading_slashes(&target);

    // Step 3: method.
    if matches!(ctx.method, Method::Other(_)) {
        note_write_failure(ctx, response::not_implemented(writer, ctx).await);
        return finish(config, ctx, connection, request_start, false).await;
    }

    // Step 4: headers.
    let headers = match maybe_timeout(config.debug, HEADER_TIMEOUT, read::read_headers(reader)).await {
        Err(()) => {
            note_write_failure(ctx, response::request_timeout(writer, ctx, diag::TIMEOUT_READ).await);
            return finish(config, ctx, connection, request_start, false).await;
        }
        Ok(Err(_)) => {
            note_write_failure(ctx, response::bad_request(writer, ctx).await);
            return finish(config, ctx, connection, request_start, false).await;
        }
        Ok(Ok(headers)) => headers,
    };

    ctx.user_agent = headers.get(&HeaderName::UserAgent).map(str::to_string);
    ctx.accept = headers.get(&HeaderName::Accept).map(str::to_string);
    ctx.accept_encoding = headers.get(&HeaderName::AcceptEncoding).map(str::to_string);
    ctx.cookie = headers.get(&HeaderName::Cookie).map(str::to_string);
    ctx.referer = headers.get(&HeaderName::Referer).map(str::to_string);
    ctx.if_none_match = headers.get(&HeaderName::IfNoneMatch).map(str::to_string);
    ctx.if_modified_since = headers.get(&HeaderName::IfModifiedSince).map(str::to_string);
    ctx.authorization = headers.get(&HeaderName::Authorization).map(str::to_string);
    ctx.content_type = headers.get(&HeaderName::ContentType).map(str::to_string);
    ctx.content_length = headers.get(&HeaderName::ContentLength).and_then(|v| v.parse::<u64>().ok());
    ctx.range = headers.get(&HeaderName::Range).and_then(ByteRange::parse);
    if let Some(connection_header) = headers.get(&HeaderName::Connection) {
        if connection_header.eq_ignore_ascii_case("close") {
            ctx.close_connection = true;
        }
    }

    let raw_host = headers.get(&HeaderName::Host).unwrap_or("").to_string();
    let (host_part, port_part) = split_host_port(&raw_host);
    if !sanitize::is_sanitary_host(&host_part) {
        note_write_failure(ctx, response::forbidden(writer, ctx).await);
        return finish(config, ctx, connection, request_start, false).await;
    }
    ctx.host = host_part;
    ctx.server_port = port_part;

    if let Some(user_agent) = &ctx.user_agent {
        if policy::is_blocked_user_agent(user_agent) {
            note_write_failure(ctx, response::forbidden(writer, ctx).await);
            ctx.diagnostic_code = diag::BLOCKED_USER_AGENT;
            return finish(config, ctx, connection, request_start, false).await;
        }
    }
    if let Some(referer) = &ctx.referer {
        if policy::is_blocked_referrer(referer) {
            note_write_failure(ctx, response::forbidden(writer, ctx).await);
            ctx.diagnostic_code = diag::BLOCKED_REFERRER;
            return finish(config, ctx, connection, request_start, false).await;
        }
    }

    // Step 5: fill defaults.
    if ctx.host.is_empty() {
        ctx.host = config.server_name.clone();
    }
    if ctx.server_port.is_empty() {
        ctx.server_port = config.default_port.to_string();
    }

    // Step 6: split query.
    let (path, query_suffix) = split_query(&target);
    ctx.query_suffix = query_suffix;

    // Step 7: POST body capture.
    if ctx.method.may_have_body() {
        if let Some(content_length) = ctx.content_length {
            if content_length > MAX_CONTENT_LENGTH {
                note_write_failure(ctx, response::post_body_too_large(writer, ctx).await);
                return finish(config, ctx, connection, request_start, false).await;
            }
            match capture_post_body(reader, content_length, config.debug).await {
                Ok(body_path) => {
                    ctx.post_body_path = Some(body_path);
                    ctx.bytes_in = content_length;
                }
                Err(CaptureError::Timeout) => {
                    note_write_failure(ctx, response::request_timeout(writer, ctx, diag::TIMEOUT_BODY).await);
                    return finish(config, ctx, connection, request_start, false).await;
                }
                Err(CaptureError::Io(_)) => {
                    note_write_failure(ctx, response::malfunction(writer, ctx, "failed to capture request body").await);
                    ctx.diagnostic_code = diag::POST_BODY_IO_ERROR;
                    return finish(config, ctx, connection, request_start, false).await;
                }
            }
        }
    }

    // Step 8: sanitize path.
    let (sanitized_path, _substitutions) = sanitize::sanitize(&path);
    let ends_with_slash = sanitized_path.ends_with('/');
    if has_forbidden_path_segment(&sanitized_path) {
        note_write_failure(ctx, response::not_found(writer, ctx).await);
        ctx.diagnostic_code = diag::FORBIDDEN_PATH_SEGMENT;
        return finish(config, ctx, connection, request_start, false).await;
    }
    ctx.script_uri = sanitized_path;

    // Step 9: choose content root.
    ctx.content_root = vhost::resolve_content_root(&config.content_root, &vhost_key(&ctx.host));

    // Step 10: resolve file.
    match resolve::resolve(&ctx.content_root, &ctx.script_uri, ends_with_slash).await {
        ResolveOutcome::NotFound => {
            note_write_failure(ctx, response::not_found(writer, ctx).await);
            return finish(config, ctx, connection, request_start, false).await;
        }
        ResolveOutcome::FallbackRedirect(target) => {
            note_write_failure(ctx, response::redirect(writer, ctx, &target, 302).await);
            return finish(config, ctx, connection, request_start, false).await;
        }
        ResolveOutcome::NeedsTrailingSlash => {
            let target = format!("{}/", ctx.script_uri);
            note_write_failure(ctx, response::redirect(writer, ctx, &target, 301).await);
            return finish(config, ctx, connection, request_start, false).await;
        }
        ResolveOutcome::Found { file_path, dir_path, path_info } => {
            if path_info.is_empty() {
                if let Some(name) = file_path.file_name().and_then(|n| n.to_str()) {
                    if !ctx.script_uri.ends_with(name) {
                        if !ctx.script_uri.ends_with('/') {
                            ctx.script_uri.push('/');
                        }
                        ctx.script_uri.push_str(name);
                    }
                }
            }
            ctx.file_path = file_path;
            ctx.dir_path = dir_path;
            ctx.path_info = path_info;
        }
    }

    // Step 11: auth check.
    match maybe_timeout(config.debug, PRE_DISPATCH_TIMEOUT, check_auth(ctx)).await {
        Err(()) => {
            note_write_failure(ctx, response::request_timeout(writer, ctx, diag::TIMEOUT_READ).await);
            return finish(config, ctx, connection, request_start, false).await;
        }
        Ok(AuthOutcome::Proceed) => {}
        Ok(AuthOutcome::Challenge(realm)) => {
            note_write_failure(ctx, response::not_authorized(writer, ctx, realm.as_deref()).await);
            return finish(config, ctx, connection, request_start, false).await;
        }
        Ok(AuthOutcome::RedirectToHttps) => {
            let path = ctx.script_uri.clone();
            note_write_failure(ctx, response::redirect_with_scheme(writer, ctx, "https", &path, 301).await);
            return finish(config, ctx, connection, request_start, false).await;
        }
        Ok(AuthOutcome::NotFound(diagnostic)) => {
            note_write_failure(ctx, response::not_found(writer, ctx).await);
            ctx.diagnostic_code = diagnostic;
            return finish(config, ctx, connection, request_start, false).await;
        }
        Ok(AuthOutcome::Allow(user)) => ctx.remote_user = user,
    }

    // Step 12: dispatch.
    let skip_log = dispatch(config, writer, ctx).await;
    finish(config, ctx, connection, request_start, skip_log).await
}

enum CaptureError {
    Timeout,
    Io(std::io::Error),
}

/// §4.9 step 7: reads exactly `content_length` bytes into a fresh temp file
/// under the platform temp directory, returning its path for the dispatcher
/// to hand off as a CGI/SCGI stdin source. The logger is the sole owner of
/// deleting it afterward (§4.3), so the returned [`tempfile::TempPath`] is
/// immediately `keep()`-ed rather than left to delete itself on drop.
async fn capture_post_body<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    content_length: u64,
    debug: bool,
) -> Result<PathBuf, CaptureError> {
    let body = async {
        let named = tempfile::Builder::new()
            .prefix("-post-data-")
            .tempfile()
            .map_err(CaptureError::Io)?;
        let (std_file, temp_path) = named.into_parts();
        let mut file = tokio::fs::File::from_std(std_file);

        let mut limited = (&mut *reader).take(content_length);
        tokio::io::copy(&mut limited, &mut file).await.map_err(CaptureError::Io)?;
        file.flush().await.map_err(CaptureError::Io)?;

        temp_path.keep().map_err(|err| CaptureError::Io(err.error))
    };

    match maybe_timeout(debug, post_body_timeout(content_length), body).await {
        Ok(result) => result,
        Err(()) => Err(CaptureError::Timeout),
    }
}

enum AuthOutcome {
    Proceed,
    Allow(Option<String>),
    Challenge(Option<String>),
    RedirectToHttps,
    NotFound(u32),
}

/// §4.5: consults `<dir_path>/-auth` if present and readable. No file at all
/// is not an error — the request simply proceeds to dispatch.
async fn check_auth(ctx: &RequestContext) -> AuthOutcome {
    let auth_path = ctx.dir_path.join("-auth");
    let contents = match tokio::fs::read_to_string(&auth_path).await {
        Ok(contents) => contents,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return AuthOutcome::Proceed,
        Err(_) => return AuthOutcome::NotFound(diag::AUTH_FILE_UNREADABLE),
    };

    let policy = match auth::parse(&contents) {
        Ok(policy) => policy,
        Err(_) => return AuthOutcome::NotFound(diag::AUTH_FILE_UNREADABLE),
    };

    let credential = ctx.authorization.as_deref().and_then(parse_basic_credentials);
    let decision = auth::decide(&policy, ctx.https, credential.as_deref());

    match decision {
        auth::Decision::Allow(name) => AuthOutcome::Allow(name),
        auth::Decision::Challenge => AuthOutcome::Challenge(policy.realm),
        auth::Decision::RedirectToHttps => AuthOutcome::RedirectToHttps,
        auth::Decision::NotFoundHttpsOnly => AuthOutcome::NotFound(diag::AUTH_HTTPS_ONLY_VIOLATION),
    }
}

/// §4.9 step 12: picks static / CGI / SCGI and writes the response. Returns
/// whether logging should be skipped (the NPH bypass).
async fn dispatch<W: AsyncWrite + Unpin>(config: &ServerConfig, writer: &mut W, ctx: &mut RequestContext) -> bool {
    let metadata = match tokio::fs::metadata(&ctx.file_path).await {
        Ok(metadata) => metadata,
        Err(_) => {
            note_write_failure(ctx, response::not_found(writer, ctx).await);
            return false;
        }
    };

    if is_executable(&metadata) {
        if is_group_or_world_writable(&metadata) {
            note_write_failure(ctx, response::cgi_script_writable(writer, ctx).await);
            return false;
        }
        return dispatch_cgi(config, writer, ctx).await;
    }

    let is_scgi = ctx.file_path.extension().and_then(|e| e.to_str()) == Some("scgi");
    if is_scgi {
        return dispatch_scgi(config, writer, ctx).await;
    }

    if !ctx.path_info.is_empty() {
        note_write_failure(ctx, response::not_found(writer, ctx).await);
        ctx.diagnostic_code = diag::DIRECTORY_WITHOUT_INDEX;
        return false;
    }

    dispatch_static(config, writer, ctx, &metadata).await;
    false
}

#[cfg(unix)]
fn is_executable(metadata: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_metadata: &std::fs::Metadata) -> bool {
    false
}

#[cfg(unix)]
fn is_group_or_world_writable(metadata: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o022 != 0
}

#[cfg(not(unix))]
fn is_group_or_world_writable(_metadata: &std::fs::Metadata) -> bool {
    false
}

async fn dispatch_static<W: AsyncWrite + Unpin>(
    config: &ServerConfig,
    writer: &mut W,
    ctx: &mut RequestContext,
    metadata: &std::fs::Metadata,
) {
    let file_name = ctx.file_path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let mtime = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
    let size = metadata.len();

    let decision = static_file::decide(
        file_name,
        size,
        mtime,
        ctx.if_none_match.as_deref(),
        ctx.if_modified_since.as_deref(),
        ctx.range,
        config.max_age_secs,
        matches!(ctx.method, Method::Head),
    );

    let headers: Vec<String> =
        decision.headers.iter().map(|(name, value)| format!("{}: {}", name.as_wire_str(), value)).collect();

    if response::send_head(writer, ctx, decision.status.code(), decision.status.reason_phrase(), headers)
        .await
        .is_err()
    {
        note_write_failure(ctx, Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "write failed")));
        return;
    }

    if let static_file::BodyPlan::Range { skip, length } = decision.body {
        let file_path = ctx.file_path.clone();
        let transfer = async {
            let mut file = tokio::fs::File::open(&file_path).await?;
            write::transfer_range(writer, &mut file, skip, length).await
        };
        match maybe_timeout(config.debug, static_stream_timeout(size), transfer).await {
            Ok(Ok(written)) => ctx.bytes_out += written,
            Ok(Err(_)) => {
                ctx.diagnostic_code = diag::BROKEN_PIPE;
                ctx.close_connection = true;
            }
            Err(()) => {
                ctx.diagnostic_code = diag::TIMEOUT_STATIC_STREAM;
                ctx.close_connection = true;
            }
        }
    }
}

fn build_cgi_env(config: &ServerConfig, ctx: &RequestContext) -> CgiEnv {
    CgiEnv {
        content_length: ctx.content_length.map(|n| n.to_string()),
        auth_type: ctx.authorization.as_deref().and_then(|v| v.split_whitespace().next()).map(str::to_string),
        auth_content: ctx.authorization.as_deref().and_then(|v| v.split_once(' ')).map(|(_, rest)| rest.to_string()),
        remote_user: ctx.remote_user.clone(),
        content_type: ctx.content_type.clone(),
        document_root: ctx.content_root.display().to_string(),
        http_accept: ctx.accept.clone(),
        http_accept_encoding: ctx.accept_encoding.clone(),
        http_cookie: ctx.cookie.clone(),
        http_host: Some(ctx.host.clone()),
        http_if_modified_since: ctx.if_modified_since.clone(),
        http_if_none_match: ctx.if_none_match.clone(),
        http_referer: ctx.referer.clone(),
        http_user_agent: ctx.user_agent.clone(),
        path_info: ctx.path_info.clone(),
        query_string: ctx.query_suffix.strip_prefix('?').unwrap_or("").to_string(),
        remote_addr: ctx.remote_addr.clone(),
        request_method: ctx.method.as_str().to_string(),
        request_uri: ctx.raw_uri.clone(),
        script_directory: ctx.dir_path.display().to_string(),
        script_filename: ctx.file_path.display().to_string(),
        script_name: script_name(ctx),
        server_name: ctx.host.clone(),
        server_port: ctx.server_port.clone(),
        server_protocol: ctx.protocol.as_str().to_string(),
        https: ctx.https,
    }
}

fn script_name(ctx: &RequestContext) -> String {
    if ctx.path_info.is_empty() {
        return ctx.script_uri.clone();
    }
    let suffix = format!("/{}", ctx.path_info);
    ctx.script_uri.strip_suffix(suffix.as_str()).unwrap_or(&ctx.script_uri).to_string()
}

async fn dispatch_cgi<W: AsyncWrite + Unpin>(config: &ServerConfig, writer: &mut W, ctx: &mut RequestContext) -> bool {
    let env = build_cgi_env(config, ctx);
    let max_cpu = if config.max_cpu_secs == 0 { None } else { Some(config.max_cpu_secs) };

    let mut child = match cgi::spawn(&ctx.file_path, &ctx.path_info, &env, max_cpu) {
        Ok(child) => child,
        Err(_) => {
            note_write_failure(ctx, response::malfunction(writer, ctx, "failed to launch CGI script").await);
            ctx.diagnostic_code = diag::CGI_SPAWN_FAILED;
            return false;
        }
    };

    let file_name = ctx.file_path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    if cgi::is_nph(file_name) {
        run_nph(ctx, writer, &mut child).await;
        ctx.close_connection = true;
        return true;
    }

    let (mut child_stdin, child_stdout) = match cgi::split(&mut child) {
        Ok(pipes) => pipes,
        Err(_) => {
            note_write_failure(ctx, response::cgi_error(writer, ctx).await);
            return false;
        }
    };
    let mut reader = BufReader::new(child_stdout);

    let body_path = ctx.post_body_path.clone();
    let write_stdin = async move {
        if let Some(path) = body_path {
            if let Ok(mut file) = tokio::fs::File::open(&path).await {
                let _ = tokio::io::copy(&mut file, &mut child_stdin).await;
            }
        }
        drop(child_stdin);
    };
    let (_, reply_result) = tokio::join!(write_stdin, reply::read_reply_headers(&mut reader));

    let mut reply = match reply_result {
        Ok(reply) => reply,
        Err(_) => {
            note_write_failure(ctx, response::cgi_error(writer, ctx).await);
            let _ = child.wait().await;
            return false;
        }
    };

    let clipped = reply::apply_pending_range(&mut reply, ctx.range);
    if let Some(len) = reply.content_length {
        reply.headers.append(HeaderName::ContentLength, len.to_string());
    }
    let headers: Vec<String> = reply.headers.iter().map(|(name, value)| format!("{}: {}", name.as_wire_str(), value)).collect();

    if response::send_head(writer, ctx, reply.status.code(), reply.status.phrase(), headers).await.is_err() {
        note_write_failure(ctx, Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "write failed")));
        let _ = child.wait().await;
        return false;
    }

    if !matches!(ctx.method, Method::Head) {
        let transfer_result = match clipped {
            Some((skip, length)) => write::transfer_range(writer, &mut reader, skip, length).await,
            None => write::transfer_full(writer, &mut reader).await,
        };
        match transfer_result {
            Ok(written) => ctx.bytes_out += written,
            Err(_) => {
                ctx.diagnostic_code = diag::BROKEN_PIPE;
                ctx.close_connection = true;
            }
        }
    }

    let _ = child.wait().await;
    false
}

/// NPH (non-parsed-headers): the child's own stdout is the complete HTTP
/// response, streamed verbatim with no reply framing and no access-log
/// entry (§8, §9 Glossary "NPH").
async fn run_nph<W: AsyncWrite + Unpin>(ctx: &mut RequestContext, writer: &mut W, child: &mut tokio::process::Child) {
    let Ok((mut child_stdin, mut child_stdout)) = cgi::split(child) else {
        return;
    };

    let body_path = ctx.post_body_path.clone();
    let write_stdin = async move {
        if let Some(path) = body_path {
            if let Ok(mut file) = tokio::fs::File::open(&path).await {
                let _ = tokio::io::copy(&mut file, &mut child_stdin).await;
            }
        }
        drop(child_stdin);
    };
    let stream_out = async {
        let _ = tokio::io::copy(&mut child_stdout, writer).await;
    };
    tokio::join!(write_stdin, stream_out);

    ctx.status_sent = true;
    let _ = child.wait().await;
}

async fn dispatch_scgi<W: AsyncWrite + Unpin>(config: &ServerConfig, writer: &mut W, ctx: &mut RequestContext) -> bool {
    let contents = match tokio::fs::read_to_string(&ctx.file_path).await {
        Ok(contents) => contents,
        Err(_) => {
            note_write_failure(ctx, response::malfunction(writer, ctx, "SCGI control file unreadable").await);
            ctx.diagnostic_code = diag::SCGI_MALFUNCTION;
            return false;
        }
    };
    let scgi_config = match scgi::parse_control_file(&contents) {
        Ok(config) => config,
        Err(_) => {
            note_write_failure(ctx, response::malfunction(writer, ctx, "SCGI control file malformed").await);
            ctx.diagnostic_code = diag::SCGI_MALFUNCTION;
            return false;
        }
    };

    match scgi::connect_with_relight(&scgi_config).await {
        scgi::ScgiOutcome::Connected(stream) => relay_scgi(config, writer, ctx, stream).await,
        scgi::ScgiOutcome::UseFallback(relative_path) => {
            let fallback_path = ctx.dir_path.join(relative_path);
            match tokio::fs::metadata(&fallback_path).await {
                Ok(metadata) => {
                    let previous_file_path = std::mem::replace(&mut ctx.file_path, fallback_path);
                    ctx.diagnostic_code = diag::SCGI_FALLBACK_SERVED;
                    dispatch_static(config, writer, ctx, &metadata).await;
                    // §8: "connection closes" even though a plain 200 would
                    // otherwise keep it alive.
                    ctx.close_connection = true;
                    let _ = previous_file_path;
                }
                Err(_) => {
                    note_write_failure(ctx, response::malfunction(writer, ctx, "SCGI backend unreachable").await);
                    ctx.diagnostic_code = diag::SCGI_MALFUNCTION;
                }
            }
        }
        scgi::ScgiOutcome::Malfunction => {
            note_write_failure(ctx, response::malfunction(writer, ctx, "SCGI backend unreachable").await);
            ctx.diagnostic_code = diag::SCGI_MALFUNCTION;
        }
    }
    false
}

async fn relay_scgi<W: AsyncWrite + Unpin>(
    config: &ServerConfig,
    writer: &mut W,
    ctx: &mut RequestContext,
    stream: tokio::net::TcpStream,
) {
    let env = build_cgi_env(config, ctx);
    let header_block = scgi::encode_headers(&env);

    let (read_half, mut write_half) = tokio::io::split(stream);
    let mut reader = BufReader::new(read_half);

    if write_half.write_all(&header_block).await.is_err() {
        ctx.diagnostic_code = diag::SCGI_MALFUNCTION;
        ctx.close_connection = true;
        return;
    }
    if let Some(path) = &ctx.post_body_path {
        if let Ok(mut file) = tokio::fs::File::open(path).await {
            let _ = tokio::io::copy(&mut file, &mut write_half).await;
        }
    }

    let mut reply = match reply::read_reply_headers(&mut reader).await {
        Ok(reply) => reply,
        Err(_) => {
            note_write_failure(ctx, response::malfunction(writer, ctx, "SCGI backend reply malformed").await);
            ctx.diagnostic_code = diag::SCGI_MALFUNCTION;
            return;
        }
    };

    let clipped = reply::apply_pending_range(&mut reply, ctx.range);
    if let Some(len) = reply.content_length {
        reply.headers.append(HeaderName::ContentLength, len.to_string());
    }
    let headers: Vec<String> = reply.headers.iter().map(|(name, value)| format!("{}: {}", name.as_wire_str(), value)).collect();

    if response::send_head(writer, ctx, reply.status.code(), reply.status.phrase(), headers).await.is_err() {
        note_write_failure(ctx, Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "write failed")));
        return;
    }

    if !matches!(ctx.method, Method::Head) {
        let transfer_result = match clipped {
            Some((skip, length)) => write::transfer_range(writer, &mut reader, skip, length).await,
            None => write::transfer_full(writer, &mut reader).await,
        };
        match transfer_result {
            Ok(written) => ctx.bytes_out += written,
            Err(_) => {
                ctx.diagnostic_code = diag::BROKEN_PIPE;
                ctx.close_connection = true;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ipv4_mapped_prefix_is_stripped() {
        assert_eq!(strip_ipv4_mapped("::ffff:127.0.0.1"), "127.0.0.1");
        assert_eq!(strip_ipv4_mapped("2001:db8::1"), "2001:db8::1");
    }

    #[test]
    fn bracketed_ipv6_host_splits_port() {
        assert_eq!(split_host_port("[::1]:8080"), ("::1".to_string(), "8080".to_string()));
        assert_eq!(split_host_port("example.com:8080"), ("example.com".to_string(), "8080".to_string()));
        assert_eq!(split_host_port("example.com"), ("example.com".to_string(), String::new()));
    }

    #[test]
    fn vhost_key_lowercases_and_strips_trailing_dot() {
        assert_eq!(vhost_key("Example.COM."), "example.com");
        assert_eq!(vhost_key("evil host!"), "evil_host_");
    }

    #[test]
    fn well_known_prefix_is_exempt_except_dotdot() {
        assert!(!has_forbidden_path_segment("/.well-known/x"));
        assert!(has_forbidden_path_segment("/.well-known/../x"));
        assert!(has_forbidden_path_segment("/../etc/passwd"));
        assert!(!has_forbidden_path_segment("/a/b/c"));
    }

    #[test]
    fn basic_credentials_round_trip() {
        let header = "Basic YWxhZGRpbjpvcGVuc2VzYW1l";
        assert_eq!(parse_basic_credentials(header), Some("aladdin:opensesame".to_string()));
        assert_eq!(parse_basic_credentials("Bearer xyz"), None);
    }

    #[test]
    fn collapse_leading_slashes_keeps_single_leading_slash() {
        assert_eq!(collapse_leading_slashes("//a/b"), "/a/b");
        assert_eq!(collapse_leading_slashes("/a/b"), "/a/b");
    }

    #[test]
    fn split_query_separates_path_from_suffix() {
        assert_eq!(split_query("/a/b?x=1"), ("/a/b".to_string(), "?x=1".to_string()));
        assert_eq!(split_query("/a/b"), ("/a/b".to_string(), String::new()));
    }
}
