//! HTTP/1.1 wire protocol: reading the request line and headers, writing a
//! response head and body, URL/Host sanitization and RFC822 date handling.
//!
//! This crate owns everything that touches raw bytes on the wire; the
//! `althttpd` bin crate's `pipeline` module owns the state machine that
//! decides *what* to read and write.

pub mod date;
pub mod read;
pub mod sanitize;
pub mod write;
