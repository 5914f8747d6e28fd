//! Data, not code, for the two historical compiled-out blocklists (§9 Design
//! Notes, Open Question 1): a hard-coded `User-Agent` substring match and a
//! `Referer` substring match against `"devids.net/"`-style scraper referrers.
//! The original carried these as dead code; this server consults them as a
//! plain `&[&str]` table, so adding an entry never touches the pipeline.

/// Any `User-Agent` containing one of these substrings is rejected with 403
/// before the request reaches path resolution (§4.9 step 4).
pub const BLOCKED_USER_AGENT_SUBSTRINGS: &[&str] = &[
    "SemrushBot",
    "MJ12bot",
    "AhrefsBot",
    "PetalBot",
];

/// Any `Referer` containing one of these substrings is rejected with 403.
/// Resolves Design Note Open Question 2: the original assigned `zReferer`
/// then called `Forbidden()`, which exits before the assignment could ever
/// matter; the dead assignment is dropped, the reject-on-match behavior kept.
pub const BLOCKED_REFERRER_SUBSTRINGS: &[&str] = &["devids.net/"];

#[must_use]
pub fn is_blocked_user_agent(user_agent: &str) -> bool {
    BLOCKED_USER_AGENT_SUBSTRINGS.iter().any(|needle| user_agent.contains(needle))
}

#[must_use]
pub fn is_blocked_referrer(referer: &str) -> bool {
    BLOCKED_REFERRER_SUBSTRINGS.iter().any(|needle| referer.contains(needle))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_scraper_agent_is_blocked() {
        assert!(is_blocked_user_agent("Mozilla/5.0 (compatible; AhrefsBot/7.0)"));
        assert!(!is_blocked_user_agent("Mozilla/5.0 (compatible; Googlebot/2.1)"));
    }

    #[test]
    fn devids_referer_is_blocked() {
        assert!(is_blocked_referrer("http://devids.net/spam"));
        assert!(!is_blocked_referrer("http://example.com/"));
    }
}
