//! The reply framer shared by CGI and SCGI (§4.7): reads a CGI-style header
//! block off the child/backend's reply stream, recognising `Location:`,
//! `Status:` and `Content-length:` specially and buffering everything else
//! for pass-through, then hands the remaining stream back so the caller can
//! stream or range-clip the body.
//!
//! Grounded on `althttpd_http1::read::read_headers`'s "read lines until a
//! blank line" shape, generalized to any `AsyncBufRead` since a CGI child's
//! stdout and an SCGI backend's socket are otherwise unrelated types.

use althttpd_http::{ByteRange, HeaderMap, HeaderName, StatusCode};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

/// The maximum size of the reply header block; a script that never emits a
/// blank line is a malfunctioning script, not an unbounded memory sink.
const MAX_REPLY_HEADER_BYTES: usize = 64 * 1024;

#[derive(Debug)]
pub struct CgiReply {
    /// `200` unless the script sent `Location:` (treated as `302`) or an
    /// explicit `Status:` line.
    pub status: CgiStatus,
    pub content_length: Option<u64>,
    /// Every header read, `Status` itself excluded (it never goes on the
    /// wire verbatim; it only selects `status` above).
    pub headers: HeaderMap,
}

/// A CGI script can specify a status that doesn't fit the server's own
/// closed [`StatusCode`] set (e.g. a script emitting `Status: 201 Created`);
/// this keeps the script's code and phrase when it isn't one we recognise.
#[derive(Debug, Clone)]
pub enum CgiStatus {
    Known(StatusCode),
    Other { code: u16, phrase: String },
}

impl CgiStatus {
    #[must_use]
    pub fn code(&self) -> u16 {
        match self {
            Self::Known(status) => status.code(),
            Self::Other { code, .. } => *code,
        }
    }

    #[must_use]
    pub fn phrase(&self) -> &str {
        match self {
            Self::Known(status) => status.reason_phrase(),
            Self::Other { phrase, .. } => phrase,
        }
    }
}

/// Reads the reply header block, per §4.7: a script emitting no headers at
/// all (immediate EOF on the first line) is reported as the synthetic
/// malfunction the pipeline maps to a `500`, rather than panicking on an
/// empty `Status`-less reply with no `Content-Type`.
pub async fn read_reply_headers<R: AsyncBufRead + Unpin>(stream: &mut R) -> std::io::Result<CgiReply> {
    let mut headers = HeaderMap::new();
    let mut status = CgiStatus::Known(StatusCode::Ok);
    let mut saw_location = false;
    let mut total = 0usize;

    loop {
        let mut line = Vec::new();
        let n = stream.read_until(b'\n', &mut line).await?;
        if n == 0 {
            break;
        }
        total += n;
        if total > MAX_REPLY_HEADER_BYTES {
            return Err(std::io::Error::new(std::io::ErrorKind::InvalidData, "CGI reply header block too large"));
        }
        while line.last() == Some(&b'\n') || line.last() == Some(&b'\r') {
            line.pop();
        }
        if line.is_empty() {
            break;
        }
        let line = String::from_utf8_lossy(&line);
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let name = HeaderName::parse(name.trim());
        let value = value.trim().to_string();

        match &name {
            HeaderName::Status => {
                status = parse_status_line(&value);
            }
            HeaderName::Location => {
                saw_location = true;
                headers.append(name, value);
            }
            _ => headers.append(name, value),
        }
    }

    if saw_location && matches!(status, CgiStatus::Known(StatusCode::Ok)) {
        status = CgiStatus::Known(StatusCode::Found);
    }

    let content_length = headers
        .get(&HeaderName::ContentLength)
        .and_then(|v| v.parse::<u64>().ok());

    Ok(CgiReply { status, content_length, headers })
}

/// `Status: 200 OK` → `(200, "OK")`; an unrecognised code keeps the
/// script's own phrase rather than substituting a canned one.
fn parse_status_line(value: &str) -> CgiStatus {
    let mut parts = value.splitn(2, ' ');
    let code = parts.next().and_then(|c| c.parse::<u16>().ok()).unwrap_or(200);
    let phrase = parts.next().unwrap_or("").trim().to_string();

    let known = match code {
        200 => Some(StatusCode::Ok),
        206 => Some(StatusCode::PartialContent),
        301 => Some(StatusCode::MovedPermanently),
        302 => Some(StatusCode::Found),
        304 => Some(StatusCode::NotModified),
        308 => Some(StatusCode::PermanentRedirect),
        400 => Some(StatusCode::BadRequest),
        401 => Some(StatusCode::Unauthorized),
        403 => Some(StatusCode::Forbidden),
        404 => Some(StatusCode::NotFound),
        500 => Some(StatusCode::InternalServerError),
        501 => Some(StatusCode::NotImplemented),
        504 => Some(StatusCode::GatewayTimeout),
        _ => None,
    };

    match known {
        Some(status) => CgiStatus::Known(status),
        None => CgiStatus::Other { code, phrase },
    }
}

/// Converts a `200` reply into a `206` once a pending range is known to be
/// satisfiable against the script's own `Content-Length` (§4.7: "converts to
/// 206 if a range is pending and Content-Length is known").
#[must_use]
pub fn apply_pending_range(reply: &mut CgiReply, range: Option<ByteRange>) -> Option<(u64, u64)> {
    let CgiReply { status, content_length: Some(size), .. } = reply else {
        return None;
    };
    if !matches!(status, CgiStatus::Known(StatusCode::Ok)) {
        return None;
    }
    let range = range?.clone();
    if range.start >= *size {
        return None;
    }
    let end = range.end.min(size.saturating_sub(1));
    let length = end - range.start + 1;
    reply.status = CgiStatus::Known(StatusCode::PartialContent);
    reply.headers.append(HeaderName::ContentRange, format!("bytes {}-{}/{}", range.start, end, size));
    reply.content_length = Some(length);
    Some((range.start, length))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn defaults_to_200_when_no_status_header() {
        let mut stream = Cursor::new(b"Content-Type: text/plain\r\n\r\nbody".to_vec());
        let reply = read_reply_headers(&mut stream).await.unwrap();
        assert_eq!(reply.status.code(), 200);
    }

    #[tokio::test]
    async fn location_without_explicit_status_becomes_302() {
        let mut stream = Cursor::new(b"Location: /elsewhere\r\n\r\n".to_vec());
        let reply = read_reply_headers(&mut stream).await.unwrap();
        assert_eq!(reply.status.code(), 302);
        assert_eq!(reply.headers.get(&HeaderName::Location), Some("/elsewhere"));
    }

    #[tokio::test]
    async fn explicit_status_line_is_honored() {
        let mut stream = Cursor::new(b"Status: 201 Created\r\nContent-Type: text/plain\r\n\r\n".to_vec());
        let reply = read_reply_headers(&mut stream).await.unwrap();
        assert_eq!(reply.status.code(), 201);
        assert_eq!(reply.status.phrase(), "Created");
    }

    #[tokio::test]
    async fn content_length_is_parsed() {
        let mut stream = Cursor::new(b"Content-Length: 42\r\n\r\n".to_vec());
        let reply = read_reply_headers(&mut stream).await.unwrap();
        assert_eq!(reply.content_length, Some(42));
    }

    #[test]
    fn pending_range_converts_200_to_206() {
        let mut reply = CgiReply {
            status: CgiStatus::Known(StatusCode::Ok),
            content_length: Some(100),
            headers: HeaderMap::new(),
        };
        let clipped = apply_pending_range(&mut reply, Some(ByteRange { start: 10, end: 19 }));
        assert_eq!(clipped, Some((10, 10)));
        assert_eq!(reply.status.code(), 206);
    }

    #[test]
    fn single_byte_range_0_0_converts_to_206() {
        let mut reply = CgiReply {
            status: CgiStatus::Known(StatusCode::Ok),
            content_length: Some(10),
            headers: HeaderMap::new(),
        };
        let clipped = apply_pending_range(&mut reply, Some(ByteRange { start: 0, end: 0 }));
        assert_eq!(clipped, Some((0, 1)));
        assert_eq!(reply.status.code(), 206);
    }

    #[test]
    fn pending_range_past_eof_is_ignored() {
        let mut reply = CgiReply {
            status: CgiStatus::Known(StatusCode::Ok),
            content_length: Some(10),
            headers: HeaderMap::new(),
        };
        let clipped = apply_pending_range(&mut reply, Some(ByteRange { start: 100, end: u64::MAX }));
        assert_eq!(clipped, None);
        assert_eq!(reply.status.code(), 200);
    }
}
