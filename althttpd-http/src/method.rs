/// The small set of methods this server understands.
///
/// Unlike a general-purpose HTTP library, anything outside `GET`/`HEAD`/`POST`
/// is not a distinct variant: the pipeline rejects it with `501` before it
/// ever reaches a handler, so there is nothing else worth naming.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Head,
    Post,
    Other(String),
}

impl Method {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
            Self::Post => "POST",
            Self::Other(s) => s,
        }
    }

    /// `true` for methods whose request carries a body worth reading.
    #[must_use]
    pub fn may_have_body(&self) -> bool {
        matches!(self, Self::Post)
    }
}

impl From<&str> for Method {
    fn from(value: &str) -> Self {
        match value {
            "GET" => Self::Get,
            "HEAD" => Self::Head,
            "POST" => Self::Post,
            other => Self::Other(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_methods_round_trip() {
        assert_eq!(Method::from("GET").as_str(), "GET");
        assert_eq!(Method::from("HEAD").as_str(), "HEAD");
        assert_eq!(Method::from("POST").as_str(), "POST");
    }

    #[test]
    fn unknown_method_is_preserved_verbatim() {
        assert_eq!(Method::from("PATCH"), Method::Other("PATCH".to_string()));
    }

    #[test]
    fn only_post_may_have_a_body() {
        assert!(Method::Post.may_have_body());
        assert!(!Method::Get.may_have_body());
        assert!(!Method::Head.may_have_body());
    }
}
