//! Typed form binding and validation for axum.
//!
//! Three ways to get a bound form into a handler:
//! - [`Bind`] / [`Valid`] extractors, or [`FormBinder`] called directly;
//! - [`BindFormLayer`] middleware that pre-populates the request extensions
//!   (read with [`BoundForm`] / [`FormError`]);
//! - [`wrap_handler`] and friends, which hand the form to a plain function.
//!
//! Failures are routed to error handlers registered per key in
//! [`ErrorHandlers`].

#[path = "_core/mod.rs"]
pub mod core;
pub mod binder;
pub mod extract;
pub mod handler;
pub mod middleware;
pub mod registry;

pub use self::core::{config, error, telemetry};

pub use binder::{FormBinder, Rejected, bind_parts};
pub use config::BindConfig;
pub use error::{BindError, FieldViolation};
pub use extract::{Bind, BoundForm, FormError, Valid};
pub use handler::{
    wrap_handler, wrap_handler_with, wrap_validated_handler, wrap_validated_handler_with,
};
pub use middleware::BindFormLayer;
pub use registry::{
    DEFAULT_KEY, ErrorHandler, ErrorHandlers, register_error_handler,
    register_error_handler_with_key,
};
