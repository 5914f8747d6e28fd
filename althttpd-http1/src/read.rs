//! Reads the request line and header block off the wire.
//!
//! Grounded on `servente_http1::read`: a small buffered-line reader with a
//! maximum-length guard per RFC-defined entity, generalized here to also
//! serve as the CGI/SCGI reply-header reader (§4.7), since both speak the
//! same "lines until a blank line" grammar.

use althttpd_http::{Error, HeaderMap, HeaderName, HttpParseError, HttpVersion, Method};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

/// Maximum length, in bytes, of a single request line or header line
/// (name + value, excluding the CRLF). Mirrors the distilled spec's note
/// that the original's 1000-byte working buffer is not load-bearing; we
/// just need a symmetric, generous cap and a `400`/`414`-style rejection.
const MAX_LINE_LENGTH: usize = 8192;

/// Reads one CRLF-terminated line, enforcing [`MAX_LINE_LENGTH`].
///
/// A bare `LF` without a preceding `CR` is accepted as many real-world HTTP/1
/// readers do (leniency on input, strictness on output); only lines that
/// exceed the limit before any terminator is seen are rejected.
async fn read_line<R: AsyncBufRead + Unpin>(stream: &mut R) -> Result<String, Error> {
    let mut buf = Vec::new();
    let n = stream.read_until(b'\n', &mut buf).await?;
    if n == 0 {
        return Err(Error::Eof);
    }
    if buf.len() > MAX_LINE_LENGTH {
        return Err(Error::Parse(HttpParseError::LineTooLarge));
    }
    while buf.last() == Some(&b'\n') || buf.last() == Some(&b'\r') {
        buf.pop();
    }
    String::from_utf8(buf).map_err(|_| Error::Parse(HttpParseError::InvalidCrlf))
}

/// Parses the request line: `METHOD SP request-target SP HTTP/x.y`.
///
/// The protocol token must be exactly 8 characters starting with `HTTP/`
/// (§4.9 step 2); anything else is a `400`, not a best-effort guess.
pub async fn read_request_line<R: AsyncBufRead + Unpin>(
    stream: &mut R,
) -> Result<(Method, String, HttpVersion), Error> {
    let line = read_line(stream).await?;
    let mut parts = line.splitn(3, ' ');
    let method = parts.next().filter(|s| !s.is_empty()).ok_or(Error::Parse(HttpParseError::InvalidRequestTarget))?;
    let target = parts.next().ok_or(Error::Parse(HttpParseError::InvalidRequestTarget))?;
    let version_token = parts.next().ok_or(Error::Parse(HttpParseError::InvalidHttpVersion))?;

    if version_token.len() != 8 || !version_token.starts_with("HTTP/") {
        return Err(Error::Parse(HttpParseError::InvalidHttpVersion));
    }
    let version = HttpVersion::parse(version_token).ok_or(Error::Parse(HttpParseError::InvalidHttpVersion))?;

    Ok((Method::from(method), target.to_string(), version))
}

/// Reads headers until a blank line, folding repeated `Cookie:` fields and
/// trimming trailing CR/LF from values (§4.9 step 4).
pub async fn read_headers<R: AsyncBufRead + Unpin>(stream: &mut R) -> Result<HeaderMap, Error> {
    let mut headers = HeaderMap::new();
    loop {
        let line = read_line(stream).await?;
        if line.is_empty() {
            return Ok(headers);
        }
        let (name, value) = line
            .split_once(':')
            .ok_or(Error::Parse(HttpParseError::HeaderDoesNotContainColon))?;
        headers.append(HeaderName::parse(name.trim()), value.trim().to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn reads_a_simple_request_line() {
        let mut stream = Cursor::new(b"GET /index.html HTTP/1.1\r\n".to_vec());
        let (method, target, version) = read_request_line(&mut stream).await.unwrap();
        assert_eq!(method, Method::Get);
        assert_eq!(target, "/index.html");
        assert_eq!(version, HttpVersion::Http11);
    }

    #[tokio::test]
    async fn rejects_malformed_protocol_token() {
        let mut stream = Cursor::new(b"GET / HTTP/2\r\n".to_vec());
        let result = read_request_line(&mut stream).await;
        assert!(matches!(result, Err(Error::Parse(HttpParseError::InvalidHttpVersion))));
    }

    #[tokio::test]
    async fn eof_before_any_bytes_is_silent_eof() {
        let mut stream = Cursor::new(Vec::<u8>::new());
        assert!(matches!(read_request_line(&mut stream).await, Err(Error::Eof)));
    }

    #[tokio::test]
    async fn headers_stop_at_blank_line_and_fold_cookies() {
        let mut stream = Cursor::new(
            b"Host: example.com\r\nCookie: a=1\r\nCookie: b=2\r\n\r\nbody-not-read".to_vec(),
        );
        let headers = read_headers(&mut stream).await.unwrap();
        assert_eq!(headers.get(&HeaderName::Host), Some("example.com"));
        assert_eq!(headers.get(&HeaderName::Cookie), Some("a=1; b=2"));
    }

    #[tokio::test]
    async fn header_without_colon_is_rejected() {
        let mut stream = Cursor::new(b"NotAHeader\r\n\r\n".to_vec());
        let result = read_headers(&mut stream).await;
        assert!(matches!(result, Err(Error::Parse(HttpParseError::HeaderDoesNotContainColon))));
    }
}
