//! The `althttpd` binary's guts, exposed as a library so integration tests
//! under `tests/` can drive [`pipeline::serve_connection`] directly against
//! an in-memory duplex stream instead of spawning the compiled binary and
//! shelling out to `curl` (the shape the teacher's own `servente_bin` tests
//! use, traded here for a dependency this server's CI can actually run
//! without a `curl` binary on the test runner).

pub mod context;
pub mod diag;
pub mod listener;
pub mod logger;
pub mod pipeline;
pub mod policy;
pub mod resolve;
pub mod response;
pub mod server_config;
