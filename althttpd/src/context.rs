//! The request context (§3 "Data model") and the handful of fields that
//! survive across pipelined requests on one connection.
//!
//! Each request gets a fresh [`RequestContext`]; nothing here is reused
//! between requests, which is the async-task reading of "each connection
//! starts from a clean RequestContext" — there is no leftover field to
//! accidentally leak from one pipelined request to the next, and the
//! `close_connection` monotonicity invariant falls out for free, since the
//! connection's read loop stops as soon as one context latches it.

use std::path::PathBuf;
use std::time::Instant;

use althttpd_http::{ByteRange, HttpVersion, Method};

/// Survives across every request read on one connection (the async
/// analogue of state a forked child would keep in its own stack across
/// its serve loop, rather than state shared between connections).
pub struct ConnectionState {
    pub request_number: u64,
    /// Latched true by the listener for the 101st request in standalone
    /// mode, or by a protocol-level signal (HTTP/1.0, no keep-alive) —
    /// forces the *next* context to close regardless of its own status.
    pub force_close: bool,
    pub previous_usage: ProcessUsage,
}

impl ConnectionState {
    #[must_use]
    pub fn new(force_close: bool) -> Self {
        Self { request_number: 0, force_close, previous_usage: ProcessUsage::sample() }
    }
}

/// Process-wide CPU usage, sampled via `getrusage`. The original attributes
/// CPU time to the one child serving a single connection; this server is a
/// multiplexed multi-connection process, so there is no OS-level "this
/// connection's child" to query. Process-wide `RUSAGE_SELF`/`RUSAGE_CHILDREN`
/// deltas since the previous log call on the *same* connection are the
/// closest available analogue, and are what fields 8-11 of the log line
/// report (judgment call, recorded in DESIGN.md).
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessUsage {
    pub self_user_usec: i64,
    pub self_system_usec: i64,
    pub children_user_usec: i64,
    pub children_system_usec: i64,
}

impl ProcessUsage {
    #[cfg(unix)]
    #[must_use]
    pub fn sample() -> Self {
        use nix::sys::resource::{getrusage, UsageWho};

        let to_usec = |tv: nix::sys::time::TimeVal| tv.tv_sec() * 1_000_000 + i64::from(tv.tv_usec());

        let self_usage = getrusage(UsageWho::RUSAGE_SELF).ok();
        let children_usage = getrusage(UsageWho::RUSAGE_CHILDREN).ok();

        Self {
            self_user_usec: self_usage.map(|u| to_usec(u.user_time())).unwrap_or(0),
            self_system_usec: self_usage.map(|u| to_usec(u.system_time())).unwrap_or(0),
            children_user_usec: children_usage.map(|u| to_usec(u.user_time())).unwrap_or(0),
            children_system_usec: children_usage.map(|u| to_usec(u.system_time())).unwrap_or(0),
        }
    }

    #[cfg(not(unix))]
    #[must_use]
    pub fn sample() -> Self {
        Self::default()
    }

    /// `[self_user, self_system, children_user, children_system]` deltas
    /// against `earlier`, each clamped to non-negative (a concurrent
    /// connection's CGI children can make `RUSAGE_CHILDREN` jump between
    /// samples taken on two different connections; clamping avoids a
    /// negative delta rather than claiming it is meaningful).
    #[must_use]
    pub fn delta_since(&self, earlier: &ProcessUsage) -> [i64; 4] {
        [
            (self.self_user_usec - earlier.self_user_usec).max(0),
            (self.self_system_usec - earlier.self_system_usec).max(0),
            (self.children_user_usec - earlier.children_user_usec).max(0),
            (self.children_system_usec - earlier.children_system_usec).max(0),
        ]
    }
}

/// One request's worth of state, threaded from request-line parsing
/// through response writing and logging (§3).
pub struct RequestContext {
    pub protocol: HttpVersion,
    pub method: Method,
    pub raw_uri: String,
    pub script_uri: String,
    pub query_suffix: String,
    pub host: String,
    pub server_port: String,
    pub https: bool,

    pub content_root: PathBuf,
    pub file_path: PathBuf,
    pub dir_path: PathBuf,
    pub path_info: String,

    pub user_agent: Option<String>,
    pub accept: Option<String>,
    pub accept_encoding: Option<String>,
    pub cookie: Option<String>,
    pub referer: Option<String>,
    pub if_none_match: Option<String>,
    pub if_modified_since: Option<String>,
    pub range: Option<ByteRange>,
    pub authorization: Option<String>,
    pub content_length: Option<u64>,
    pub content_type: Option<String>,

    pub remote_addr: String,
    pub remote_user: Option<String>,

    pub reply_status: u16,
    pub bytes_in: u64,
    pub bytes_out: u64,
    pub close_connection: bool,
    pub status_sent: bool,
    pub post_body_path: Option<PathBuf>,
    pub diagnostic_code: u32,

    pub started_at: Instant,
}

impl RequestContext {
    /// A blank context for the start of one request; every field not set
    /// here is filled in as the pipeline reads the request line and
    /// headers (§4.9 steps 2-7).
    #[must_use]
    pub fn new(remote_addr: String, https: bool, force_close: bool) -> Self {
        Self {
            protocol: HttpVersion::Http11,
            method: Method::Get,
            raw_uri: String::new(),
            script_uri: String::new(),
            query_suffix: String::new(),
            host: String::new(),
            server_port: String::new(),
            https,
            content_root: PathBuf::new(),
            file_path: PathBuf::new(),
            dir_path: PathBuf::new(),
            path_info: String::new(),
            user_agent: None,
            accept: None,
            accept_encoding: None,
            cookie: None,
            referer: None,
            if_none_match: None,
            if_modified_since: None,
            range: None,
            authorization: None,
            content_length: None,
            content_type: None,
            remote_addr,
            remote_user: None,
            reply_status: 0,
            bytes_in: 0,
            bytes_out: 0,
            close_connection: force_close,
            status_sent: false,
            post_body_path: None,
            diagnostic_code: crate::diag::OK,
            started_at: Instant::now(),
        }
    }
}
