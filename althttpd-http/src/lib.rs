//! Core HTTP vocabulary shared by the althttpd request pipeline: methods,
//! versions, status codes, headers and byte ranges. No I/O lives here —
//! that's `althttpd-http1`'s job — this crate is the plain-data layer both
//! the wire reader and the pipeline agree on.

mod error;
mod header_map;
mod header_name;
mod method;
mod range;
mod status;
mod version;

pub use error::{Error, HttpParseError};
pub use header_map::HeaderMap;
pub use header_name::HeaderName;
pub use method::Method;
pub use range::ByteRange;
pub use status::StatusCode;
pub use version::HttpVersion;
