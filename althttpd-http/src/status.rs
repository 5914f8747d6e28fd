/// The fixed set of statuses this server ever puts on the wire.
///
/// `reply_status` in the request context is always exactly these three
/// ASCII digits; there is no free-form status anywhere in the pipeline.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StatusCode {
    Ok,
    PartialContent,
    MovedPermanently,
    Found,
    NotModified,
    PermanentRedirect,
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    InternalServerError,
    NotImplemented,
    GatewayTimeout,
}

impl StatusCode {
    #[must_use]
    pub fn code(&self) -> u16 {
        match self {
            Self::Ok => 200,
            Self::PartialContent => 206,
            Self::MovedPermanently => 301,
            Self::Found => 302,
            Self::NotModified => 304,
            Self::PermanentRedirect => 308,
            Self::BadRequest => 400,
            Self::Unauthorized => 401,
            Self::Forbidden => 403,
            Self::NotFound => 404,
            Self::InternalServerError => 500,
            Self::NotImplemented => 501,
            Self::GatewayTimeout => 504,
        }
    }

    #[must_use]
    pub fn reason_phrase(&self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::PartialContent => "Partial Content",
            Self::MovedPermanently => "Moved Permanently",
            Self::Found => "Found",
            Self::NotModified => "Not Modified",
            Self::PermanentRedirect => "Permanent Redirect",
            Self::BadRequest => "Bad Request",
            Self::Unauthorized => "Unauthorized",
            Self::Forbidden => "Forbidden",
            Self::NotFound => "Not Found",
            Self::InternalServerError => "Internal Server Error",
            Self::NotImplemented => "Not Implemented",
            Self::GatewayTimeout => "Gateway Timeout",
        }
    }

    /// The 3-digit wire form, e.g. `"404"`. Always exactly 3 ASCII bytes.
    #[must_use]
    pub fn code_str(&self) -> String {
        format!("{:03}", self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_str_is_always_three_ascii_digits() {
        for status in [
            StatusCode::Ok,
            StatusCode::PartialContent,
            StatusCode::MovedPermanently,
            StatusCode::NotFound,
            StatusCode::InternalServerError,
            StatusCode::GatewayTimeout,
        ] {
            assert_eq!(status.code_str().len(), 3);
        }
    }

}
