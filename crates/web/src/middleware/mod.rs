//! HTTP middleware stack for the read API.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layer (capture errors)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//! 4. Timeout (whole-request deadline)

pub mod request_id;

pub use request_id::{REQUEST_ID_HEADER, request_id_middleware};
