//! Wire Protocol Layer
//!
//! Hand-rolled HTTP handling for the exact request shapes this service
//! consumes; no general-purpose HTTP stack. [`request`] parses one complete
//! buffered request without copying out of the input buffer, [`route`]
//! resolves the rewritten path against the fixed route table, and
//! [`response`] renders JSON bodies and wraps them in the one response
//! template the service ever emits.

pub mod request;
pub mod response;
pub mod route;

pub use request::{parse_request, QueryParams, Request};
pub use route::Route;
