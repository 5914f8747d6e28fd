//! Low-level helpers for writing a response head and streaming a body.
//!
//! The response-writer's higher-level policy (status-already-sent latch,
//! `close_connection` decision, the predefined responders) lives in the
//! `althttpd` bin crate's `response` module — this is just the part that
//! touches the wire, the same division the teacher draws between
//! `servente_http1`'s transfer helpers and `servente_http_handling`'s
//! `Response` construction.

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Writes `<version> <code> <phrase>\r\n` followed by `headers` (already
/// formatted as `"Name: value"` strings) and the blank line ending the head.
pub async fn write_response_head<W: AsyncWrite + Unpin>(
    stream: &mut W,
    version: &str,
    code: u16,
    phrase: &str,
    headers: &[String],
) -> io::Result<()> {
    stream.write_all(format!("{version} {code} {phrase}\r\n").as_bytes()).await?;
    for header in headers {
        stream.write_all(header.as_bytes()).await?;
        stream.write_all(b"\r\n").await?;
    }
    stream.write_all(b"\r\n").await?;
    Ok(())
}

/// Copies the full contents of `input` to `output`, returning the number of
/// bytes transferred. Used for the non-range body path (§4.6 step 6).
pub async fn transfer_full<O, I>(output: &mut O, input: &mut I) -> io::Result<u64>
where
    O: AsyncWrite + Unpin,
    I: AsyncRead + Unpin,
{
    tokio::io::copy(input, output).await
}

/// Skips `skip` bytes then copies at most `limit` further bytes from `input`
/// to `output`. Used both for the static byte-range path and for a pending
/// range applied to a CGI/SCGI reply body (§4.6 step 3, §4.7).
pub async fn transfer_range<O, I>(output: &mut O, input: &mut I, skip: u64, limit: u64) -> io::Result<u64>
where
    O: AsyncWrite + Unpin,
    I: AsyncRead + Unpin,
{
    let mut remaining_skip = skip;
    let mut buf = [0u8; 8192];
    while remaining_skip > 0 {
        let want = remaining_skip.min(buf.len() as u64) as usize;
        let read = input.read(&mut buf[..want]).await?;
        if read == 0 {
            return Ok(0);
        }
        remaining_skip -= read as u64;
    }

    let mut remaining = limit;
    let mut written = 0u64;
    while remaining > 0 {
        let want = remaining.min(buf.len() as u64) as usize;
        let read = input.read(&mut buf[..want]).await?;
        if read == 0 {
            break;
        }
        output.write_all(&buf[..read]).await?;
        written += read as u64;
        remaining -= read as u64;
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn writes_status_line_and_headers() {
        let mut out = Vec::new();
        write_response_head(&mut out, "HTTP/1.1", 404, "Not Found", &["Connection: close".to_string()])
            .await
            .unwrap();
        assert_eq!(out, b"HTTP/1.1 404 Not Found\r\nConnection: close\r\n\r\n");
    }

    #[tokio::test]
    async fn transfer_range_skips_and_limits() {
        let mut input = Cursor::new(b"0123456789".to_vec());
        let mut out = Vec::new();
        let written = transfer_range(&mut out, &mut input, 2, 3).await.unwrap();
        assert_eq!(written, 3);
        assert_eq!(out, b"234");
    }

    #[tokio::test]
    async fn transfer_full_copies_everything() {
        let mut input = Cursor::new(b"hello".to_vec());
        let mut out = Vec::new();
        let written = transfer_full(&mut out, &mut input).await.unwrap();
        assert_eq!(written, 5);
        assert_eq!(out, b"hello");
    }
}
