use std::time::{SystemTime, UNIX_EPOCH};

/// `ETag = m<mtime-hex>s<size-hex>` (§4.6 step 1) — a strong validator over
/// exactly the two things that change when a file's contents change.
#[must_use]
pub fn compute(mtime: SystemTime, size: u64) -> String {
    let mtime_secs = mtime.duration_since(UNIX_EPOCH).unwrap_or_default().as_secs();
    format!("m{mtime_secs:x}s{size:x}")
}

/// `If-None-Match` may arrive quoted (`"m1s2"`) or bare (`m1s2`); both
/// compare literally against the computed ETag, no weak-comparison fuzzing.
#[must_use]
pub fn if_none_match_matches(if_none_match: &str, etag: &str) -> bool {
    if_none_match.trim().trim_matches('"') == etag
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn formats_as_m_hex_s_hex() {
        let etag = compute(UNIX_EPOCH + Duration::from_secs(0x1a), 0xff);
        assert_eq!(etag, "m1asff");
    }

    #[test]
    fn matches_quoted_and_bare_forms() {
        assert!(if_none_match_matches("\"m1asff\"", "m1asff"));
        assert!(if_none_match_matches("m1asff", "m1asff"));
        assert!(!if_none_match_matches("\"m1asfe\"", "m1asff"));
    }
}
