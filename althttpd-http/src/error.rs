/// Parse failures the wire reader (`althttpd-http1`) can raise.
///
/// Kept narrow and `thiserror`-derived, the same shape as the teacher's
/// `servente_http::HttpParseError`, pruned to what this server's strict
/// request-line/header grammar can actually reject.
#[derive(Copy, Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum HttpParseError {
    #[error("request line or header exceeded the maximum length")]
    LineTooLarge,
    #[error("malformed HTTP version token")]
    InvalidHttpVersion,
    #[error("request line did not have a method and request-target")]
    InvalidRequestTarget,
    #[error("header line did not contain a colon")]
    HeaderDoesNotContainColon,
    #[error("line ended with CR but not followed by LF")]
    InvalidCrlf,
    #[error("Content-Length was not a valid non-negative integer")]
    InvalidContentLength,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] HttpParseError),
    #[error("connection closed before a full request was read")]
    Eof,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
