//! The `-auth` per-directory control-file grammar (§6): `realm`, `user`,
//! `https-only`, `http-redirect`, `anyone`, one directive per line,
//! `str::lines()`/`split_whitespace` — no external parser crate, the
//! grammar is simpler than anything `serde` would buy us.

use std::collections::BTreeMap;

/// The parsed contents of an `-auth` file for one directory.
#[derive(Debug, Clone, Default)]
pub struct AuthPolicy {
    pub realm: Option<String>,
    /// `"LOGIN:PASSWORD" -> NAME`, keyed on the literal credential token from
    /// the directive (`user NAME LOGIN:PASSWORD`) compared verbatim against
    /// the decoded `Authorization: Basic` string — `NAME` is the identity
    /// recorded as `remote_user` on a match, and need not equal `LOGIN`.
    pub credentials: BTreeMap<String, String>,
    pub https_only: bool,
    pub http_redirect: bool,
    /// `anyone` disables the challenge entirely: any (or no) credentials
    /// pass, used for directories that only want the `https-only` redirect
    /// behavior without actually gating on a password.
    pub anyone: bool,
}

/// What the authorization check decided for one request, given an
/// [`AuthPolicy`] and the request's own `Authorization` header (already
/// base64-decoded by the caller) and scheme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow(Option<String>),
    Challenge,
    RedirectToHttps,
    /// `https-only` without `http-redirect`, violated: the original replies
    /// plain 404 here (`NotFound(160)`), not a 401 challenge — a plain-HTTP
    /// request to an HTTPS-only directory isn't meant to look like it merely
    /// lacks credentials.
    NotFoundHttpsOnly,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthParseError {
    #[error("line {0} did not name a directive")]
    EmptyDirective(usize),
    #[error("'user' directive on line {0} requires 'user <name> <login>:<password>'")]
    MalformedUserLine(usize),
    #[error("line {0} named an unrecognized directive '{1}'")]
    UnrecognizedDirective(usize, String),
}

/// Parses one `-auth` file's contents.
pub fn parse(contents: &str) -> Result<AuthPolicy, AuthParseError> {
    let mut policy = AuthPolicy::default();

    for (index, raw_line) in contents.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let mut words = line.split_whitespace();
        let directive = words.next().ok_or(AuthParseError::EmptyDirective(index + 1))?;

        match directive {
            "realm" => policy.realm = Some(words.collect::<Vec<_>>().join(" ")),
            "user" => {
                let name = words.next().ok_or(AuthParseError::MalformedUserLine(index + 1))?;
                let login_password = words.next().ok_or(AuthParseError::MalformedUserLine(index + 1))?;
                if !login_password.contains(':') {
                    return Err(AuthParseError::MalformedUserLine(index + 1));
                }
                policy.credentials.insert(login_password.to_string(), name.to_string());
            }
            "https-only" => policy.https_only = true,
            "http-redirect" => policy.http_redirect = true,
            "anyone" => policy.anyone = true,
            // §4.5: "anything else — reply 404." The original's directive
            // loop calls `NotFound(180)` and stops parsing on the first
            // unrecognized line; returning an error here lets the pipeline's
            // existing "auth file unreadable/malformed -> 404" branch
            // (`check_auth`'s `Err(_)` arm) handle it the same way, rather
            // than silently skipping a directive the file author expected
            // to matter.
            other => return Err(AuthParseError::UnrecognizedDirective(index + 1, other.to_string())),
        }
    }

    Ok(policy)
}

/// Decides allow / challenge / redirect for one request against `policy`.
///
/// `is_https` is the connection's own HTTPS flag; `credential` is the
/// decoded `"login:password"` string from `Authorization: Basic ...`,
/// compared literally against each `user` directive's `LOGIN:PASSWORD`
/// token (§4.5: "the credentials are compared only after decoding").
#[must_use]
pub fn decide(policy: &AuthPolicy, is_https: bool, credential: Option<&str>) -> Decision {
    // `http-redirect` and `https-only` are independent directives (the
    // original checks them as separate `else if` arms over the file's
    // lines, each able to fire on its own): a directory can carry
    // `http-redirect` alone to upgrade every plain-HTTP visitor without
    // also refusing to serve over HTTP outright.
    if policy.http_redirect && !is_https {
        return Decision::RedirectToHttps;
    }
    if policy.https_only && !is_https {
        return Decision::NotFoundHttpsOnly;
    }

    if policy.anyone {
        return Decision::Allow(None);
    }

    match credential.and_then(|token| policy.credentials.get(token)) {
        Some(name) => Decision::Allow(Some(name.clone())),
        None => Decision::Challenge,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_realm_and_user_directives() {
        let policy = parse("realm Staff Area\nuser alice alice:hunter2\nuser bob bob:s3cr3t\n").unwrap();
        assert_eq!(policy.realm.as_deref(), Some("Staff Area"));
        assert_eq!(policy.credentials.get("alice:hunter2").map(String::as_str), Some("alice"));
        assert_eq!(policy.credentials.get("bob:s3cr3t").map(String::as_str), Some("bob"));
    }

    #[test]
    fn name_may_differ_from_the_login_half_of_the_credential() {
        let policy = parse("user staff shared:swordfish\n").unwrap();
        assert_eq!(decide(&policy, true, Some("shared:swordfish")), Decision::Allow(Some("staff".to_string())));
    }

    #[test]
    fn malformed_user_line_is_rejected() {
        assert!(matches!(parse("user alice\n"), Err(AuthParseError::MalformedUserLine(1))));
        assert!(matches!(parse("user alice hunter2\n"), Err(AuthParseError::MalformedUserLine(1))));
    }

    #[test]
    fn unrecognized_directive_is_rejected() {
        assert!(matches!(
            parse("realm Staff\nrequire-2fa\n"),
            Err(AuthParseError::UnrecognizedDirective(2, ref d)) if d == "require-2fa"
        ));
    }

    #[test]
    fn anyone_allows_without_credentials() {
        let policy = parse("anyone\n").unwrap();
        assert_eq!(decide(&policy, true, None), Decision::Allow(None));
    }

    #[test]
    fn https_only_without_redirect_is_not_found_on_plain_http() {
        let policy = parse("https-only\nuser alice alice:hunter2\n").unwrap();
        assert_eq!(decide(&policy, false, None), Decision::NotFoundHttpsOnly);
    }

    #[test]
    fn https_only_with_redirect_sends_to_https() {
        let policy = parse("https-only\nhttp-redirect\nuser alice alice:hunter2\n").unwrap();
        assert_eq!(decide(&policy, false, None), Decision::RedirectToHttps);
    }

    #[test]
    fn http_redirect_alone_upgrades_without_https_only() {
        let policy = parse("http-redirect\nanyone\n").unwrap();
        assert_eq!(decide(&policy, false, None), Decision::RedirectToHttps);
        assert_eq!(decide(&policy, true, None), Decision::Allow(None));
    }

    #[test]
    fn correct_credentials_over_https_are_allowed() {
        let policy = parse("https-only\nuser alice alice:hunter2\n").unwrap();
        assert_eq!(decide(&policy, true, Some("alice:hunter2")), Decision::Allow(Some("alice".to_string())));
    }

    #[test]
    fn wrong_password_is_challenged() {
        let policy = parse("user alice alice:hunter2\n").unwrap();
        assert_eq!(decide(&policy, false, Some("alice:wrong")), Decision::Challenge);
    }
}
