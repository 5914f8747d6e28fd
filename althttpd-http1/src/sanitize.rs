/// Bytes allowed to survive sanitization verbatim: `[0-9a-zA-Z,-./:_~]`.
///
/// Grounded on the distilled spec §4.1; expressed as a lookup table the same
/// way the teacher's `servente_http::syntax` module classifies token bytes,
/// rather than a chain of range checks.
const fn is_allowed_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b',' | b'-' | b'.' | b'/' | b':' | b'_' | b'~')
}

/// Replaces every disallowed byte with `_`, and compacts any `%XX`
/// percent-escape triplet (regardless of whether `XX` are valid hex digits)
/// to a single `_`, advancing three bytes in the source for one in the
/// destination.
///
/// Returns the sanitized string and the number of substitutions made; the
/// Host check uses a non-zero count as its rejection signal (§4.1).
#[must_use]
pub fn sanitize(path: &str) -> (String, usize) {
    let bytes = path.as_bytes();
    let mut out = String::with_capacity(bytes.len());
    let mut substitutions = 0usize;
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            out.push('_');
            substitutions += 1;
            i += 3;
            continue;
        }

        let b = bytes[i];
        if is_allowed_byte(b) {
            out.push(b as char);
        } else {
            out.push('_');
            substitutions += 1;
        }
        i += 1;
    }

    (out, substitutions)
}

/// Boolean-predicate form used for the `Host` header: `true` iff sanitizing
/// `host` would not change a single byte.
#[must_use]
pub fn is_sanitary_host(host: &str) -> bool {
    sanitize(host).1 == 0
}

/// Decodes standard base64, tolerating padding and discarding any byte
/// outside the alphabet as if it contributed nothing — the original decoder
/// never fails, it just silently skips junk, so HTTP Basic credentials that
/// are slightly malformed still get compared (and rejected) rather than
/// crashing the request. Used only for `Authorization: Basic`.
#[must_use]
pub fn decode_base64_lenient(input: &str) -> Vec<u8> {
    use base64::Engine;
    // Strip anything outside the standard alphabet (and '=' padding) before
    // handing it to a strict decoder, matching the "ignore padding, discard
    // unknown bytes" contract without re-implementing the bit-packing.
    let filtered: String = input
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '/' | '='))
        .collect();
    let trimmed = filtered.trim_end_matches('=');
    base64::engine::general_purpose::STANDARD_NO_PAD
        .decode(trimmed)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allowed_bytes_pass_through() {
        let (out, subs) = sanitize("/a/b-c,d.e:f_g~h");
        assert_eq!(out, "/a/b-c,d.e:f_g~h");
        assert_eq!(subs, 0);
    }

    #[test]
    fn disallowed_bytes_become_underscore() {
        let (out, subs) = sanitize("/a b");
        assert_eq!(out, "/a_b");
        assert_eq!(subs, 1);
    }

    #[test]
    fn percent_escape_compacts_to_one_underscore() {
        // %2e%2e must not survive as "..": each triplet compacts to "_", so
        // the pair becomes "__", never "..".
        let (out, subs) = sanitize("/%2e%2e/x");
        assert_eq!(out, "/__/x");
        assert_eq!(subs, 2);
    }

    #[test]
    fn host_with_percent_is_not_sanitary() {
        assert!(!is_sanitary_host("evil%20host"));
        assert!(is_sanitary_host("example.com"));
    }

    #[test]
    fn base64_decodes_valid_credentials() {
        assert_eq!(decode_base64_lenient("YWxhZGRpbjpvcGVuc2VzYW1l"), b"aladdin:opensesame");
    }

    #[test]
    fn base64_tolerates_junk_bytes() {
        // Embedded whitespace/newlines are simply dropped, not fatal.
        assert_eq!(decode_base64_lenient("YWxh\nZGRpbjpvcGVuc2VzYW1l"), b"aladdin:opensesame");
    }
}
