/// The fixed header vocabulary the pipeline cares about (§3 of the request
/// context table), plus `Other` for everything read from the wire but never
/// consulted — the same shape as a general-purpose `HeaderName` enum, just
/// pruned to what this server actually dispatches on.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum HeaderName {
    Accept,
    AcceptEncoding,
    Authorization,
    CacheControl,
    Connection,
    ContentLength,
    ContentRange,
    ContentType,
    Cookie,
    Date,
    ETag,
    Host,
    IfModifiedSince,
    IfNoneMatch,
    LastModified,
    Location,
    Range,
    Referer,
    Status,
    UserAgent,
    WwwAuthenticate,
    Other(String),
}

impl HeaderName {
    #[must_use]
    pub fn parse(name: &str) -> Self {
        // Header field names are case-insensitive (RFC 9110 §5.1); the wire
        // reader always passes the raw field name through here.
        match name.to_ascii_lowercase().as_str() {
            "accept" => Self::Accept,
            "accept-encoding" => Self::AcceptEncoding,
            "authorization" => Self::Authorization,
            "cache-control" => Self::CacheControl,
            "connection" => Self::Connection,
            "content-length" => Self::ContentLength,
            "content-range" => Self::ContentRange,
            "content-type" => Self::ContentType,
            "cookie" => Self::Cookie,
            "date" => Self::Date,
            "etag" => Self::ETag,
            "host" => Self::Host,
            "if-modified-since" => Self::IfModifiedSince,
            "if-none-match" => Self::IfNoneMatch,
            "last-modified" => Self::LastModified,
            "location" => Self::Location,
            "range" => Self::Range,
            "referer" => Self::Referer,
            "status" => Self::Status,
            "user-agent" => Self::UserAgent,
            "www-authenticate" => Self::WwwAuthenticate,
            other => Self::Other(other.to_string()),
        }
    }

    #[must_use]
    pub fn as_wire_str(&self) -> &str {
        match self {
            Self::Accept => "Accept",
            Self::AcceptEncoding => "Accept-Encoding",
            Self::Authorization => "Authorization",
            Self::CacheControl => "Cache-Control",
            Self::Connection => "Connection",
            Self::ContentLength => "Content-Length",
            Self::ContentRange => "Content-Range",
            Self::ContentType => "Content-Type",
            Self::Cookie => "Cookie",
            Self::Date => "Date",
            Self::ETag => "ETag",
            Self::Host => "Host",
            Self::IfModifiedSince => "If-Modified-Since",
            Self::IfNoneMatch => "If-None-Match",
            Self::LastModified => "Last-Modified",
            Self::Location => "Location",
            Self::Range => "Range",
            Self::Referer => "Referer",
            Self::Status => "Status",
            Self::UserAgent => "User-Agent",
            Self::WwwAuthenticate => "WWW-Authenticate",
            Self::Other(name) => name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!(HeaderName::parse("HOST"), HeaderName::Host);
        assert_eq!(HeaderName::parse("host"), HeaderName::Host);
        assert_eq!(HeaderName::parse("HoSt"), HeaderName::Host);
    }

    #[test]
    fn unknown_header_is_preserved_lowercase() {
        assert_eq!(
            HeaderName::parse("X-Forwarded-For"),
            HeaderName::Other("x-forwarded-for".to_string())
        );
    }
}
