use phf::phf_map;
use unicase::UniCase;

/// Falls back to this when the suffix has no entry (§4.2).
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Returns the MIME type for a file name by its lowercase suffix, or
/// [`OCTET_STREAM`] on a miss.
///
/// Grounded on the teacher's `servente_resources::MediaType::from_extension`:
/// a `phf::Map` keyed on a case-insensitive suffix, rather than the original
/// C server's binary search over a sorted array — both are O(1)-ish static
/// lookups over a fixed table, but `phf` is the idiom this ecosystem reaches
/// for when the table is known at compile time.
#[must_use]
pub fn lookup(file_name: &str) -> &'static str {
    match file_name.rsplit_once('.') {
        Some((_, extension)) => MEDIA_TYPE_BY_EXTENSION
            .get(&UniCase::ascii(extension))
            .copied()
            .unwrap_or(OCTET_STREAM),
        None => OCTET_STREAM,
    }
}

static MEDIA_TYPE_BY_EXTENSION: phf::Map<UniCase<&'static str>, &'static str> = phf_map! {
    UniCase::ascii("css") => "text/css; charset=utf-8",
    UniCase::ascii("htm") => "text/html; charset=utf-8",
    UniCase::ascii("html") => "text/html; charset=utf-8",
    UniCase::ascii("js") => "text/javascript; charset=utf-8",
    UniCase::ascii("md") => "text/markdown; charset=utf-8",
    UniCase::ascii("txt") => "text/plain; charset=utf-8",
    UniCase::ascii("csv") => "text/csv; charset=utf-8",
    UniCase::ascii("yaml") => "text/yaml; charset=utf-8",
    UniCase::ascii("xml") => "application/xml; charset=utf-8",

    UniCase::ascii("json") => "application/json; charset=utf-8",
    UniCase::ascii("pdf") => "application/pdf",
    UniCase::ascii("zip") => "application/zip",
    UniCase::ascii("gz") => "application/gzip",
    UniCase::ascii("bz2") => "application/x-bzip2",
    UniCase::ascii("xz") => "application/x-xz",
    UniCase::ascii("tar") => "application/x-tar",
    UniCase::ascii("wasm") => "application/wasm",

    UniCase::ascii("gif") => "image/gif",
    UniCase::ascii("ico") => "image/x-icon",
    UniCase::ascii("jpeg") => "image/jpeg",
    UniCase::ascii("jpg") => "image/jpeg",
    UniCase::ascii("png") => "image/png",
    UniCase::ascii("svg") => "image/svg+xml",
    UniCase::ascii("webp") => "image/webp",

    UniCase::ascii("mp3") => "audio/mpeg",
    UniCase::ascii("wav") => "audio/wav",
    UniCase::ascii("ogg") => "audio/ogg",

    UniCase::ascii("mp4") => "video/mp4",
    UniCase::ascii("webm") => "video/webm",
    UniCase::ascii("mov") => "video/quicktime",

    UniCase::ascii("woff") => "font/woff",
    UniCase::ascii("woff2") => "font/woff2",
    UniCase::ascii("ttf") => "font/ttf",
    UniCase::ascii("otf") => "font/otf",
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_suffix_is_case_insensitive() {
        assert_eq!(lookup("index.HTML"), "text/html; charset=utf-8");
        assert_eq!(lookup("index.html"), "text/html; charset=utf-8");
    }

    #[test]
    fn unknown_suffix_falls_back_to_octet_stream() {
        assert_eq!(lookup("archive.qux"), OCTET_STREAM);
    }

    #[test]
    fn no_suffix_falls_back_to_octet_stream() {
        assert_eq!(lookup("README"), OCTET_STREAM);
    }
}
