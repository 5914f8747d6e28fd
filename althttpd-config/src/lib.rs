//! CLI flags, virtual-host resolution, per-directory authorization, and the
//! boot-time privilege-separation sequence.

pub mod auth;
pub mod boot;
pub mod cli;
pub mod vhost;

pub use cli::{Cli, Family};
