//! Site-local diagnostic codes tagged on the last CSV log field (§7):
//! not the HTTP status, a finer-grained code so operators can tell apart
//! two different reasons the same status went out. The two example codes
//! from the distilled spec's §7 commentary (`200`/`210`) are kept verbatim;
//! the rest of this table is new but follows the same "hundreds group by
//! pipeline stage" shape.

pub const BAD_PROTOCOL: u32 = 200;
pub const EMPTY_REQUEST_URI: u32 = 210;
pub const UNSUPPORTED_METHOD: u32 = 211;
pub const REQUEST_URI_TOO_LARGE: u32 = 212;

pub const HOST_NOT_SANITARY: u32 = 300;
pub const BLOCKED_USER_AGENT: u32 = 301;
pub const BLOCKED_REFERRER: u32 = 302;

pub const FORBIDDEN_PATH_SEGMENT: u32 = 400;
pub const VHOST_DIRECTORY_MISSING: u32 = 401;
pub const FILE_NOT_FOUND: u32 = 410;
pub const FILE_UNREADABLE: u32 = 411;
pub const DIRECTORY_WITHOUT_INDEX: u32 = 412;
pub const REDIRECT: u32 = 420;

pub const AUTH_CHALLENGE: u32 = 500;
pub const AUTH_FILE_UNREADABLE: u32 = 501;
pub const AUTH_HTTPS_ONLY_VIOLATION: u32 = 502;

pub const CGI_WRITABLE_BY_OTHERS: u32 = 600;
pub const CGI_SPAWN_FAILED: u32 = 601;
pub const CGI_MALFORMED_REPLY: u32 = 602;

pub const SCGI_MALFUNCTION: u32 = 700;
pub const SCGI_FALLBACK_SERVED: u32 = 701;

pub const POST_BODY_TOO_LARGE: u32 = 800;
pub const POST_BODY_IO_ERROR: u32 = 801;

pub const INTERNAL_MALFUNCTION: u32 = 850;

/// Read timeout (request line/headers), matching the alarm-based `9<sig>`
/// convention with a dedicated synthetic family instead of a signal number.
pub const TIMEOUT_READ: u32 = 900;
pub const TIMEOUT_BODY: u32 = 901;
pub const TIMEOUT_IDLE: u32 = 902;
pub const TIMEOUT_STATIC_STREAM: u32 = 903;
pub const BROKEN_PIPE: u32 = 913;

pub const OK: u32 = 0;
