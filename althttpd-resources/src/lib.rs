//! MIME lookup and the static file responder.

pub mod etag;
pub mod media_type;
pub mod static_file;

pub use static_file::{decide, BodyPlan, StaticFileDecision};
