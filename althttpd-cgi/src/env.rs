//! The CGI/SCGI environment-variable table, kept as a single immutable list
//! read by both the CGI `putenv` loop and the SCGI netstring header loop
//! (Design Note: "treat the list as a single immutable table read by both").

/// Everything about a request that CGI/SCGI environment variables can be
/// derived from. Built by the pipeline from its `RequestContext`; this crate
/// never sees the context itself, only this flattened view of it.
#[derive(Debug, Clone, Default)]
pub struct CgiEnv {
    pub content_length: Option<String>,
    pub auth_type: Option<String>,
    pub auth_content: Option<String>,
    pub remote_user: Option<String>,
    pub content_type: Option<String>,
    pub document_root: String,
    pub http_accept: Option<String>,
    pub http_accept_encoding: Option<String>,
    pub http_cookie: Option<String>,
    pub http_host: Option<String>,
    pub http_if_modified_since: Option<String>,
    pub http_if_none_match: Option<String>,
    pub http_referer: Option<String>,
    pub http_user_agent: Option<String>,
    pub path_info: String,
    pub query_string: String,
    pub remote_addr: String,
    pub request_method: String,
    pub request_uri: String,
    pub script_directory: String,
    pub script_filename: String,
    pub script_name: String,
    pub server_name: String,
    pub server_port: String,
    pub server_protocol: String,
    pub https: bool,
}

/// `(variable name, accessor)`. `CONTENT_LENGTH` is first — SCGI requires
/// it to be; CGI doesn't care about order, so sharing the table costs it
/// nothing. Variables whose accessor returns `None` are omitted entirely,
/// matching "omitting any whose value is null" for SCGI and simply not
/// `putenv`-ing it for CGI.
pub const ENV_TABLE: &[(&str, fn(&CgiEnv) -> Option<String>)] = &[
    ("CONTENT_LENGTH", |e| Some(e.content_length.clone().unwrap_or_else(|| "0".to_string()))),
    ("AUTH_TYPE", |e| e.auth_type.clone()),
    ("AUTH_CONTENT", |e| e.auth_content.clone()),
    ("CONTENT_TYPE", |e| e.content_type.clone()),
    ("DOCUMENT_ROOT", |e| Some(e.document_root.clone())),
    ("HTTP_ACCEPT", |e| e.http_accept.clone()),
    ("HTTP_ACCEPT_ENCODING", |e| e.http_accept_encoding.clone()),
    ("HTTP_COOKIE", |e| e.http_cookie.clone()),
    ("HTTP_HOST", |e| e.http_host.clone()),
    ("HTTP_IF_MODIFIED_SINCE", |e| e.http_if_modified_since.clone()),
    ("HTTP_IF_NONE_MATCH", |e| e.http_if_none_match.clone()),
    ("HTTP_REFERER", |e| e.http_referer.clone()),
    ("HTTP_USER_AGENT", |e| e.http_user_agent.clone()),
    ("PATH_INFO", |e| Some(e.path_info.clone())),
    ("QUERY_STRING", |e| Some(e.query_string.clone())),
    ("REMOTE_ADDR", |e| Some(e.remote_addr.clone())),
    ("REQUEST_METHOD", |e| Some(e.request_method.clone())),
    ("REQUEST_URI", |e| Some(e.request_uri.clone())),
    ("REMOTE_USER", |e| e.remote_user.clone()),
    ("SCRIPT_NAME", |e| Some(e.script_name.clone())),
    ("SERVER_NAME", |e| Some(e.server_name.clone())),
    ("SERVER_PORT", |e| Some(e.server_port.clone())),
    ("SERVER_PROTOCOL", |e| Some(e.server_protocol.clone())),
];

/// Variables `SCRIPT_DIRECTORY`/`SCRIPT_FILENAME`/`PATH` that only CGI sets
/// (the spawned process runs with its cwd already at the script's
/// directory, so SCGI — which never spawns a local process — has no use
/// for them), plus the two CGI-only discriminators.
pub const CGI_ONLY_ENV_TABLE: &[(&str, fn(&CgiEnv) -> Option<String>)] = &[
    ("GATEWAY_INTERFACE", |_| Some("CGI/1.0".to_string())),
    ("PATH", |_| std::env::var("PATH").ok()),
    ("SCRIPT_DIRECTORY", |e| Some(e.script_directory.clone())),
    ("SCRIPT_FILENAME", |e| Some(e.script_filename.clone())),
    ("HTTPS", |e| if e.https { Some("on".to_string()) } else { None }),
    ("REQUEST_SCHEME", |e| Some(if e.https { "https".to_string() } else { "http".to_string() })),
];

/// Any environment value beginning with `() {` is the historical bash
/// function-export (Shellshock) payload; silence it to empty rather than
/// ever handing it to a child's environment (§6 "Environment policy").
#[must_use]
pub fn sanitize_env_value(value: String) -> String {
    if value.starts_with("() {") {
        String::new()
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_length_defaults_to_zero_and_is_always_present() {
        let env = CgiEnv::default();
        let (name, accessor) = ENV_TABLE[0];
        assert_eq!(name, "CONTENT_LENGTH");
        assert_eq!(accessor(&env), Some("0".to_string()));
    }

    #[test]
    fn missing_optional_headers_are_omitted() {
        let env = CgiEnv::default();
        for (name, accessor) in ENV_TABLE {
            if *name == "HTTP_HOST" {
                assert_eq!(accessor(&env), None);
            }
        }
    }

    #[test]
    fn shellshock_payload_is_silenced() {
        assert_eq!(sanitize_env_value("() { :; }; echo pwned".to_string()), "");
        assert_eq!(sanitize_env_value("text/plain".to_string()), "text/plain");
    }
}
