//! The response writer (§4.4): status-line emission with the
//! "status-already-sent" latch, the keep-alive/close decision, and the
//! predefined responders every terminal path in the pipeline reaches for.
//!
//! Grounded on the teacher's `servente_http_handling::responses` module —
//! one async function per canned response (`create_request_timeout` and
//! siblings) — generalized from building an in-memory `Response` value to
//! writing straight to the connection, since this server has no response
//! buffering stage. `write_response_head` (`althttpd_http1::write`) is the
//! one place that actually touches the wire; everything here is policy on
//! top of it.

use std::time::SystemTime;

use althttpd_http::Method;
use althttpd_http1::date::format_rfc822;
use althttpd_http1::write::write_response_head;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::context::RequestContext;
use crate::diag;

fn unix_now() -> i64 {
    SystemTime::now().duration_since(SystemTime::UNIX_EPOCH).map(|d| d.as_secs() as i64).unwrap_or(0)
}

/// Writes the status line plus the `Connection`/`Date` headers every
/// response carries, explicitly deciding `close` rather than deriving it
/// from `code` — the one caller that needs to diverge from "4xx/5xx closes"
/// is [`not_authorized`], where the distilled spec's own error table (§7)
/// carves out 401 as keep-alive-preserving despite being a 4xx.
async fn write_head<W: AsyncWrite + Unpin>(
    stream: &mut W,
    ctx: &mut RequestContext,
    code: u16,
    phrase: &str,
    mut extra_headers: Vec<String>,
    close: bool,
) -> std::io::Result<()> {
    if ctx.status_sent {
        return Ok(());
    }
    ctx.status_sent = true;
    ctx.reply_status = code;
    // `close_connection` is monotone (§3 invariants): a reason to close
    // latched before this response was even decided — HTTP/1.0, an explicit
    // request `Connection: close`, the connection's request-count cap —
    // must survive a response that would otherwise keep the connection open.
    ctx.close_connection |= close;
    let close = ctx.close_connection;

    let mut headers = vec![
        format!("Connection: {}", if close { "close" } else { "keep-alive" }),
        format!("Date: {}", format_rfc822(unix_now())),
    ];
    headers.append(&mut extra_headers);
    write_response_head(stream, ctx.protocol.as_str(), code, phrase, &headers).await
}

/// `send_head` for everything except the 401 carve-out: closes on 4xx/5xx,
/// keeps alive otherwise (§4.4).
pub async fn send_head<W: AsyncWrite + Unpin>(
    stream: &mut W,
    ctx: &mut RequestContext,
    code: u16,
    phrase: &str,
    extra_headers: Vec<String>,
) -> std::io::Result<()> {
    write_head(stream, ctx, code, phrase, extra_headers, code >= 400).await
}

async fn text_response<W: AsyncWrite + Unpin>(
    stream: &mut W,
    ctx: &mut RequestContext,
    code: u16,
    phrase: &str,
    body: &str,
    diagnostic: u32,
) -> std::io::Result<()> {
    ctx.diagnostic_code = diagnostic;
    let headers = vec![
        "Content-Type: text/plain; charset=utf-8".to_string(),
        format!("Content-Length: {}", body.len()),
    ];
    send_head(stream, ctx, code, phrase, headers).await?;
    if !matches!(ctx.method, Method::Head) {
        stream.write_all(body.as_bytes()).await?;
        ctx.bytes_out += body.len() as u64;
    }
    Ok(())
}

pub async fn not_found<W: AsyncWrite + Unpin>(stream: &mut W, ctx: &mut RequestContext) -> std::io::Result<()> {
    text_response(stream, ctx, 404, "Not Found", "Not Found\n", diag::FILE_NOT_FOUND).await
}

pub async fn forbidden<W: AsyncWrite + Unpin>(stream: &mut W, ctx: &mut RequestContext) -> std::io::Result<()> {
    text_response(stream, ctx, 403, "Forbidden", "Forbidden\n", diag::HOST_NOT_SANITARY).await
}

pub async fn bad_request<W: AsyncWrite + Unpin>(stream: &mut W, ctx: &mut RequestContext) -> std::io::Result<()> {
    text_response(stream, ctx, 400, "Bad Request", "Bad Request\n", diag::BAD_PROTOCOL).await
}

pub async fn not_implemented<W: AsyncWrite + Unpin>(stream: &mut W, ctx: &mut RequestContext) -> std::io::Result<()> {
    text_response(stream, ctx, 501, "Not Implemented", "Not Implemented\n", diag::UNSUPPORTED_METHOD).await
}

/// The one responder that does not force `close_connection` on a 4xx: the
/// client may retry the same connection with credentials (§7: "Auth
/// required, no credentials match" -> keep-alive preserved).
pub async fn not_authorized<W: AsyncWrite + Unpin>(
    stream: &mut W,
    ctx: &mut RequestContext,
    realm: Option<&str>,
) -> std::io::Result<()> {
    ctx.diagnostic_code = diag::AUTH_CHALLENGE;
    let body = "Authorization Required\n";
    let headers = vec![
        format!("WWW-Authenticate: Basic realm=\"{}\"", realm.unwrap_or("unknown realm")),
        "Content-Type: text/plain; charset=utf-8".to_string(),
        format!("Content-Length: {}", body.len()),
    ];
    write_head(stream, ctx, 401, "Unauthorized", headers, false).await?;
    if !matches!(ctx.method, Method::Head) {
        stream.write_all(body.as_bytes()).await?;
        ctx.bytes_out += body.len() as u64;
    }
    Ok(())
}

pub async fn cgi_error<W: AsyncWrite + Unpin>(stream: &mut W, ctx: &mut RequestContext) -> std::io::Result<()> {
    text_response(stream, ctx, 500, "Internal Server Error", "CGI Error\n", diag::CGI_MALFORMED_REPLY).await
}

pub async fn cgi_script_writable<W: AsyncWrite + Unpin>(
    stream: &mut W,
    ctx: &mut RequestContext,
) -> std::io::Result<()> {
    text_response(
        stream,
        ctx,
        500,
        "Internal Server Error",
        "CGI Configuration Error: script is writable by someone other than its owner\n",
        diag::CGI_WRITABLE_BY_OTHERS,
    )
    .await
}

pub async fn malfunction<W: AsyncWrite + Unpin>(
    stream: &mut W,
    ctx: &mut RequestContext,
    message: &str,
) -> std::io::Result<()> {
    text_response(stream, ctx, 500, "Internal Server Error", &format!("{message}\n"), diag::INTERNAL_MALFUNCTION).await
}

/// A timeout anywhere in the pipeline (§7: synthetic code `9<sig>`, "no body
/// beyond what was already written"). The original's `Timeout()` handler
/// never calls `StartResponse` — it logs the diagnostic and exits — so this
/// writes nothing new: it only records the diagnostic and latches the
/// connection closed, leaving whatever was already sent (often nothing at
/// all) as the final response.
pub async fn request_timeout<W: AsyncWrite + Unpin>(
    _stream: &mut W,
    ctx: &mut RequestContext,
    diagnostic: u32,
) -> std::io::Result<()> {
    ctx.diagnostic_code = diagnostic;
    ctx.close_connection = true;
    Ok(())
}

pub async fn post_body_too_large<W: AsyncWrite + Unpin>(
    stream: &mut W,
    ctx: &mut RequestContext,
) -> std::io::Result<()> {
    text_response(stream, ctx, 500, "Internal Server Error", "Request Body Too Large\n", diag::POST_BODY_TOO_LARGE).await
}

/// Composes the `Location` target per §4.4: `scheme://host[:port]path?query`,
/// omitting `:port` only when it is empty or exactly `"80"`. `scheme` is
/// taken explicitly rather than read off `ctx.https`, since the `-auth`
/// `http-redirect` directive (§4.5) needs to force `https` on a connection
/// that itself arrived over plain HTTP.
#[must_use]
pub fn compose_location(ctx: &RequestContext, scheme: &str, path: &str) -> String {
    let port_suffix = if ctx.server_port.is_empty() || ctx.server_port == "80" {
        String::new()
    } else {
        format!(":{}", ctx.server_port)
    };
    format!("{scheme}://{}{port_suffix}{path}{}", ctx.host, ctx.query_suffix)
}

#[must_use]
pub fn compose_redirect_location(ctx: &RequestContext, path: &str) -> String {
    compose_location(ctx, if ctx.https { "https" } else { "http" }, path)
}

pub async fn redirect<W: AsyncWrite + Unpin>(
    stream: &mut W,
    ctx: &mut RequestContext,
    path: &str,
    code: u16,
) -> std::io::Result<()> {
    redirect_with_scheme(stream, ctx, if ctx.https { "https" } else { "http" }, path, code).await
}

/// As [`redirect`], but with the scheme forced rather than inferred from
/// the connection's own `ctx.https` flag.
pub async fn redirect_with_scheme<W: AsyncWrite + Unpin>(
    stream: &mut W,
    ctx: &mut RequestContext,
    scheme: &str,
    path: &str,
    code: u16,
) -> std::io::Result<()> {
    let phrase = match code {
        301 => "Moved Permanently",
        308 => "Permanent Redirect",
        _ => "Found",
    };
    ctx.diagnostic_code = diag::REDIRECT;
    let location = compose_location(ctx, scheme, path);
    let headers = vec![format!("Location: {location}"), "Content-Length: 0".to_string()];
    send_head(stream, ctx, code, phrase, headers).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> RequestContext {
        RequestContext::new("127.0.0.1".to_string(), false, false)
    }

    #[tokio::test]
    async fn not_authorized_keeps_connection_alive_despite_401() {
        let mut out = Vec::new();
        let mut context = ctx();
        not_authorized(&mut out, &mut context, Some("Staff")).await.unwrap();
        assert!(!context.close_connection);
        assert_eq!(context.reply_status, 401);
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("WWW-Authenticate: Basic realm=\"Staff\""));
        assert!(text.contains("Connection: keep-alive"));
    }

    #[tokio::test]
    async fn not_found_forces_close() {
        let mut out = Vec::new();
        let mut context = ctx();
        not_found(&mut out, &mut context).await.unwrap();
        assert!(context.close_connection);
        assert_eq!(context.reply_status, 404);
    }

    #[tokio::test]
    async fn request_timeout_writes_nothing_and_closes() {
        let mut out = Vec::new();
        let mut context = ctx();
        request_timeout(&mut out, &mut context, diag::TIMEOUT_READ).await.unwrap();
        assert!(out.is_empty());
        assert!(context.close_connection);
        assert_eq!(context.diagnostic_code, diag::TIMEOUT_READ);
        assert_eq!(context.reply_status, 0);
    }

    #[tokio::test]
    async fn request_timeout_after_a_status_was_already_sent_still_writes_nothing_new() {
        let mut out = Vec::new();
        let mut context = ctx();
        not_found(&mut out, &mut context).await.unwrap();
        let first_len = out.len();
        request_timeout(&mut out, &mut context, diag::TIMEOUT_BODY).await.unwrap();
        assert_eq!(out.len(), first_len);
        assert_eq!(context.diagnostic_code, diag::TIMEOUT_BODY);
    }

    #[tokio::test]
    async fn second_write_after_status_sent_is_a_no_op() {
        let mut out = Vec::new();
        let mut context = ctx();
        not_found(&mut out, &mut context).await.unwrap();
        let first_len = out.len();
        forbidden(&mut out, &mut context).await.unwrap();
        assert_eq!(out.len(), first_len);
        assert_eq!(context.reply_status, 404);
    }

    #[test]
    fn redirect_location_omits_default_port() {
        let mut context = ctx();
        context.host = "example.com".to_string();
        context.server_port = "80".to_string();
        assert_eq!(compose_redirect_location(&context, "/deep/"), "http://example.com/deep/");
    }

    #[test]
    fn redirect_location_keeps_nondefault_port() {
        let mut context = ctx();
        context.host = "example.com".to_string();
        context.server_port = "8080".to_string();
        context.https = true;
        assert_eq!(compose_redirect_location(&context, "/x"), "https://example.com:8080/x");
    }
}
