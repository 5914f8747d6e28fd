//! The static file responder: stat, conditional-GET shortcut, byte-range
//! computation. This module only *decides* what to send; the caller (the
//! pipeline in the `althttpd` bin crate) owns opening the file and streaming
//! the bytes with `althttpd_http1::write::{transfer_full, transfer_range}`,
//! the same split the teacher draws between deciding a `Response` and the
//! `transfer_body_*` functions that actually move bytes.

use std::time::SystemTime;

use althttpd_http::{ByteRange, HeaderName, StatusCode};
use althttpd_http1::date::{format_rfc822, parse_rfc822};

use crate::{etag, media_type};

/// What the caller should do with the body, once headers have been decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyPlan {
    /// No body at all (a `304`, or the caller already knows it's a `HEAD`).
    None,
    /// Stream `length` bytes starting `skip` bytes into the file.
    Range { skip: u64, length: u64 },
}

#[derive(Debug, Clone)]
pub struct StaticFileDecision {
    pub status: StatusCode,
    /// Headers beyond the universal `Date`/`Connection` pair the response
    /// writer always adds; order matches the distilled spec's enumeration.
    pub headers: Vec<(HeaderName, String)>,
    pub body: BodyPlan,
}

/// Decides how to answer a `GET`/`HEAD` for a file whose metadata the
/// caller already `stat`-ed, per §4.6.
#[must_use]
pub fn decide(
    file_name: &str,
    size: u64,
    mtime: SystemTime,
    if_none_match: Option<&str>,
    if_modified_since: Option<&str>,
    range: Option<ByteRange>,
    max_age_secs: u64,
    is_head: bool,
) -> StaticFileDecision {
    let tag = etag::compute(mtime, size);
    let last_modified = format_rfc822(unix_secs(mtime));

    let cache_hit = if_none_match
        .map(|value| etag::if_none_match_matches(value, &tag))
        .unwrap_or(false)
        || if_modified_since
            .and_then(parse_rfc822)
            .map(|since| since >= unix_secs(mtime))
            .unwrap_or(false);

    if cache_hit {
        return StaticFileDecision {
            status: StatusCode::NotModified,
            headers: vec![
                (HeaderName::LastModified, last_modified),
                (HeaderName::CacheControl, format!("max-age={max_age_secs}")),
                (HeaderName::ETag, tag),
            ],
            body: BodyPlan::None,
        };
    }

    let mut headers = vec![
        (HeaderName::LastModified, last_modified),
        (HeaderName::CacheControl, format!("max-age={max_age_secs}")),
        (HeaderName::ETag, tag),
        (HeaderName::ContentType, media_type::lookup(file_name).to_string()),
    ];

    // Byte range: only honored if the range actually starts inside the file
    // (§4.6 step 3); `bytes=100-` on a 10-byte file is simply ignored.
    let valid_range = range.filter(|r| r.start < size);

    let (status, content_length, body) = match valid_range {
        Some(r) => {
            let end = r.end.min(size.saturating_sub(1));
            let length = end - r.start + 1;
            headers.push((HeaderName::ContentRange, format!("bytes {}-{}/{}", r.start, end, size)));
            (StatusCode::PartialContent, length, BodyPlan::Range { skip: r.start, length })
        }
        None => (StatusCode::Ok, size, BodyPlan::Range { skip: 0, length: size }),
    };

    headers.push((HeaderName::ContentLength, content_length.to_string()));

    StaticFileDecision {
        status,
        headers,
        body: if is_head { BodyPlan::None } else { body },
    }
}

fn unix_secs(t: SystemTime) -> i64 {
    t.duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn mtime_at(secs: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
    }

    #[test]
    fn plain_get_returns_200_with_full_length() {
        let decision = decide("index.html", 5, mtime_at(1000), None, None, None, 120, false);
        assert_eq!(decision.status, StatusCode::Ok);
        assert_eq!(decision.body, BodyPlan::Range { skip: 0, length: 5 });
    }

    #[test]
    fn matching_etag_yields_304_with_no_body() {
        let tag = etag::compute(mtime_at(1000), 5);
        let decision = decide("index.html", 5, mtime_at(1000), Some(&format!("\"{tag}\"")), None, None, 120, false);
        assert_eq!(decision.status, StatusCode::NotModified);
        assert_eq!(decision.body, BodyPlan::None);
    }

    #[test]
    fn if_modified_since_at_or_after_mtime_yields_304() {
        let since = format_rfc822(unix_secs(mtime_at(1000)));
        let decision = decide("index.html", 5, mtime_at(1000), None, Some(&since), None, 120, false);
        assert_eq!(decision.status, StatusCode::NotModified);
    }

    #[test]
    fn range_0_0_on_ten_byte_file_is_one_byte_206() {
        let decision = decide(
            "index.html",
            10,
            mtime_at(1000),
            None,
            None,
            Some(ByteRange { start: 0, end: 0 }),
            120,
            false,
        );
        assert_eq!(decision.status, StatusCode::PartialContent);
        assert_eq!(decision.body, BodyPlan::Range { skip: 0, length: 1 });
        assert!(decision
            .headers
            .iter()
            .any(|(name, value)| *name == HeaderName::ContentRange && value == "bytes 0-0/10"));
    }

    #[test]
    fn range_starting_past_eof_is_ignored_and_returns_200() {
        let decision = decide(
            "index.html",
            10,
            mtime_at(1000),
            None,
            None,
            Some(ByteRange { start: 100, end: u64::MAX }),
            120,
            false,
        );
        assert_eq!(decision.status, StatusCode::Ok);
        assert_eq!(decision.body, BodyPlan::Range { skip: 0, length: 10 });
    }

    #[test]
    fn head_request_never_gets_a_body_plan() {
        let decision = decide("index.html", 5, mtime_at(1000), None, None, None, 120, true);
        assert_eq!(decision.body, BodyPlan::None);
        assert_eq!(decision.status, StatusCode::Ok);
    }
}
