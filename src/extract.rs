//! Axum extractors for bound forms.
//!
//! [`BoundForm`] and [`FormError`] read what [`BindFormLayer`] stored in the
//! request extensions. [`Bind`] and [`Valid`] bind on their own, using the
//! [`FormBinder`] found in the request extensions or the default binder.
//!
//! ```ignore
//! async fn create(Valid(form): Valid<CreateUser>) -> impl IntoResponse { /* ... */ }
//!
//! async fn update(form: Option<BoundForm<UpdateUser>>, error: Option<FormError>) { /* ... */ }
//! ```
//!
//! [`BindFormLayer`]: crate::middleware::BindFormLayer

use std::any::type_name;
use std::convert::Infallible;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use axum::extract::{FromRequest, FromRequestParts, OptionalFromRequestParts, Request};
use axum::response::{IntoResponse, Response};
use http::StatusCode;
use http::request::Parts;
use serde::de::DeserializeOwned;
use tracing::error;
use validator::Validate;

use crate::binder::{FormBinder, Rejected};
use crate::error::BindError;

/// Form bound by the middleware for this request.
#[derive(Debug, Clone, Copy, Default)]
pub struct BoundForm<T>(pub T);

impl<T> BoundForm<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> Deref for BoundForm<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T> DerefMut for BoundForm<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

/// Binding error recorded by the middleware for this request, tagged with
/// the form type that failed to bind.
#[derive(Debug, Clone)]
pub struct FormError {
    error: Arc<BindError>,
    form: &'static str,
}

impl FormError {
    /// Record `error` as the outcome of binding `T`.
    #[must_use]
    pub fn new<T>(error: BindError) -> Self {
        Self {
            error: Arc::new(error),
            form: type_name::<T>(),
        }
    }

    #[must_use]
    pub fn error(&self) -> &BindError {
        &self.error
    }

    /// Type name of the form whose bind failed.
    #[must_use]
    pub const fn form_type(&self) -> &'static str {
        self.form
    }

    /// Whether this error came from binding `T`.
    #[must_use]
    pub fn is_for<T>(&self) -> bool {
        self.form == type_name::<T>()
    }
}

impl Deref for FormError {
    type Target = BindError;

    fn deref(&self) -> &Self::Target {
        &self.error
    }
}

impl IntoResponse for FormError {
    fn into_response(self) -> Response {
        self.error.to_response()
    }
}

/// Rejection for extractors whose extension was never inserted.
///
/// Usually means the route is missing its `BindFormLayer`.
#[derive(Debug, Clone, Copy)]
pub struct MissingExtension(&'static str);

impl MissingExtension {
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        self.0
    }
}

impl IntoResponse for MissingExtension {
    fn into_response(self) -> Response {
        error!(extension = self.0, "Missing request extension, is the route layered?");
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
    }
}

impl<S, T> FromRequestParts<S> for BoundForm<T>
where
    T: Clone + Send + Sync + 'static,
    S: Send + Sync,
{
    type Rejection = MissingExtension;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Self>()
            .cloned()
            .ok_or(MissingExtension(type_name::<Self>()))
    }
}

impl<S, T> OptionalFromRequestParts<S> for BoundForm<T>
where
    T: Clone + Send + Sync + 'static,
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(parts.extensions.get::<Self>().cloned())
    }
}

impl<S> FromRequestParts<S> for FormError
where
    S: Send + Sync,
{
    type Rejection = MissingExtension;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Self>()
            .cloned()
            .ok_or(MissingExtension(type_name::<Self>()))
    }
}

impl<S> OptionalFromRequestParts<S> for FormError
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(parts.extensions.get::<Self>().cloned())
    }
}

/// Binds `T` from the request without validating it.
#[derive(Debug, Clone, Copy, Default)]
pub struct Bind<T>(pub T);

/// Binds `T` from the request and validates it.
#[derive(Debug, Clone, Copy, Default)]
pub struct Valid<T>(pub T);

fn binder_for(req: &Request) -> FormBinder {
    req.extensions().get::<FormBinder>().cloned().unwrap_or_default()
}

impl<S, T> FromRequest<S> for Bind<T>
where
    T: DeserializeOwned + Send + 'static,
    S: Send + Sync,
{
    type Rejection = Rejected;

    async fn from_request(req: Request, _state: &S) -> Result<Self, Self::Rejection> {
        let binder = binder_for(&req);
        let (_, form) = binder.bind_request(req).await?;
        Ok(Self(form))
    }
}

impl<S, T> FromRequest<S> for Valid<T>
where
    T: DeserializeOwned + Validate + Send + 'static,
    S: Send + Sync,
{
    type Rejection = Rejected;

    async fn from_request(req: Request, _state: &S) -> Result<Self, Self::Rejection> {
        let binder = binder_for(&req);
        let (_, form) = binder.bind_validated_request(req).await?;
        Ok(Self(form))
    }
}

impl<T> Deref for Bind<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T> Deref for Valid<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
