//! Tower middleware for form binding.
//!
//! # Middleware Order
//! Layer binding middleware with `.route_layer()` so it only runs for
//! matched routes. Place it inside tracing/timeout layers so rejected
//! requests are still traced.

pub mod bind_form;

pub use bind_form::{BindFormLayer, BindFormMiddleware};
