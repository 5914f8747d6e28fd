/// A single `Range: bytes=S-E` / `bytes=S-` request, already validated
/// against the representation size by the caller (§4.6 step 3).
///
/// This server only ever honors one byte-range per request — the original
/// does not support multipart/byteranges, and neither do we.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    /// Parses `bytes=S-E` or `bytes=S-`. Multiple ranges, suffix ranges
    /// (`bytes=-N`), and anything else malformed are rejected by returning
    /// `None`, which the caller treats as "no range" (§8: `bytes=100-` on a
    /// 10-byte file ⇒ 200, range ignored, is a malformed-*relative-to-size*
    /// case handled by the caller, not here).
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        let rest = value.strip_prefix("bytes=")?;
        if rest.contains(',') {
            return None;
        }
        let (start, end) = rest.split_once('-')?;
        let start: u64 = start.parse().ok()?;
        let end: u64 = if end.is_empty() {
            u64::MAX
        } else {
            end.parse().ok()?
        };
        Some(Self { start, end })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_closed_range() {
        assert_eq!(
            ByteRange::parse("bytes=0-0"),
            Some(ByteRange { start: 0, end: 0 })
        );
    }

    #[test]
    fn parses_open_ended_range() {
        assert_eq!(
            ByteRange::parse("bytes=100-"),
            Some(ByteRange { start: 100, end: u64::MAX })
        );
    }

    #[test]
    fn rejects_multi_range_and_suffix_forms() {
        assert_eq!(ByteRange::parse("bytes=0-10,20-30"), None);
        assert_eq!(ByteRange::parse("bytes=-500"), None);
        assert_eq!(ByteRange::parse("garbage"), None);
    }
}
