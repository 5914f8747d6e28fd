//! CGI launching, the SCGI relay, and the reply framer they share.

pub mod cgi;
pub mod env;
pub mod reply;
pub mod scgi;

pub use cgi::{is_nph, spawn, split, CgiError};
pub use env::CgiEnv;
pub use reply::{apply_pending_range, read_reply_headers, CgiReply, CgiStatus};
pub use scgi::{connect_with_relight, encode_headers, parse_control_file, ScgiConfig, ScgiError, ScgiOutcome};
