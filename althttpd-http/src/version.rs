#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum HttpVersion {
    Http10,
    Http11,
}

impl HttpVersion {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Http10 => "HTTP/1.0",
            Self::Http11 => "HTTP/1.1",
        }
    }

    /// Parses the 8-byte `HTTP/x.y` token from a request line.
    ///
    /// Anything that isn't exactly `HTTP/1.0` or `HTTP/1.1` is rejected,
    /// including well-formed-looking versions like `HTTP/2.0` or `HTTP/0.9`:
    /// this server only ever speaks the two versions it can frame correctly.
    #[must_use]
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "HTTP/1.0" => Some(Self::Http10),
            "HTTP/1.1" => Some(Self::Http11),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_supported_versions() {
        assert_eq!(HttpVersion::parse("HTTP/1.0"), Some(HttpVersion::Http10));
        assert_eq!(HttpVersion::parse("HTTP/1.1"), Some(HttpVersion::Http11));
    }

    #[test]
    fn rejects_everything_else() {
        assert_eq!(HttpVersion::parse("HTTP/2.0"), None);
        assert_eq!(HttpVersion::parse("HTTP/0.9"), None);
        assert_eq!(HttpVersion::parse("http/1.1"), None);
        assert_eq!(HttpVersion::parse("HTTP/1.10"), None);
    }
}
