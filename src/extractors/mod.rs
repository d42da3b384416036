//! Request extractors: request context and per-verb request data.

pub mod request;
pub use request::{request_data, RequestContext, BODY_LIMIT};
