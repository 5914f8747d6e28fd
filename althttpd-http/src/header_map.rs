use hashbrown::HashMap;

use crate::HeaderName;

/// An ordered-enough multimap of request/response headers.
///
/// Grounded on the teacher's `servente_http::HeaderMap`: a `hashbrown`-backed
/// map with a special `append` rule for the one header this server ever
/// accumulates (`Cookie`, concatenated with `"; "` per §4.9 step 4).
#[derive(Clone, Debug, Default)]
pub struct HeaderMap {
    headers: HashMap<HeaderName, String>,
}

impl HeaderMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `value`, concatenating with the existing value for `Cookie`
    /// (`"; "`-joined, matching how multiple `Cookie:` lines are folded) and
    /// overwriting everything else.
    pub fn append(&mut self, name: HeaderName, value: String) {
        if name == HeaderName::Cookie {
            self.headers
                .entry(name)
                .and_modify(|existing| {
                    existing.push_str("; ");
                    existing.push_str(&value);
                })
                .or_insert(value);
            return;
        }

        self.headers.insert(name, value);
    }

    #[must_use]
    pub fn get(&self, name: &HeaderName) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    #[must_use]
    pub fn contains(&self, name: &HeaderName) -> bool {
        self.headers.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&HeaderName, &str)> {
        self.headers.iter().map(|(k, v)| (k, v.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cookies_are_joined_with_semicolon_space() {
        let mut headers = HeaderMap::new();
        headers.append(HeaderName::Cookie, "a=1".to_string());
        headers.append(HeaderName::Cookie, "b=2".to_string());
        assert_eq!(headers.get(&HeaderName::Cookie), Some("a=1; b=2"));
    }

    #[test]
    fn other_headers_overwrite() {
        let mut headers = HeaderMap::new();
        headers.append(HeaderName::Host, "a.example".to_string());
        headers.append(HeaderName::Host, "b.example".to_string());
        assert_eq!(headers.get(&HeaderName::Host), Some("b.example"));
    }
}
