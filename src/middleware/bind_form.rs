//! Form binding middleware.
//!
//! Binds a fresh `T` for every request before the handler runs:
//! - success: `BoundForm<T>` is inserted into the request extensions;
//! - failure: `FormError` is inserted and the keyed error handler consulted.
//!   A handler response short-circuits the chain; otherwise the request
//!   continues so the handler can inspect the error.
//!
//! The body is buffered and restored, so downstream extractors can still
//! read it. `GET` and `HEAD` bind from the query and pass the body through
//! untouched.

use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::response::Response;
use http::Request;
use serde::de::DeserializeOwned;
use tower::{Layer, Service};
use validator::Validate;

use crate::binder::{FormBinder, ValidateFn, binds_from_query};
use crate::config::BindConfig;
use crate::extract::{BoundForm, FormError};
use crate::registry::ErrorHandlers;

/// Tower layer binding `T` for every request.
pub struct BindFormLayer<T> {
    binder: FormBinder,
    validate: Option<ValidateFn<T>>,
    _form: PhantomData<fn() -> T>,
}

impl<T> Clone for BindFormLayer<T> {
    fn clone(&self) -> Self {
        Self {
            binder: self.binder.clone(),
            validate: self.validate,
            _form: PhantomData,
        }
    }
}

impl<T> std::fmt::Debug for BindFormLayer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BindFormLayer")
            .field("form", &std::any::type_name::<T>())
            .field("binder", &self.binder)
            .field("validated", &self.validate.is_some())
            .finish()
    }
}

impl<T> Default for BindFormLayer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> BindFormLayer<T> {
    /// Bind without validation, reporting failures under the default key.
    #[must_use]
    pub fn new() -> Self {
        Self::from_binder(FormBinder::new())
    }

    /// Bind without validation, reporting failures under `key`.
    #[must_use]
    pub fn with_key(key: impl Into<Arc<str>>) -> Self {
        Self::from_binder(FormBinder::with_key(key))
    }

    #[must_use]
    pub fn from_binder(binder: FormBinder) -> Self {
        Self {
            binder,
            validate: None,
            _form: PhantomData,
        }
    }

    /// Look handlers up in `handlers` instead of the global registry.
    #[must_use]
    pub fn handlers(mut self, handlers: ErrorHandlers) -> Self {
        self.binder = self.binder.with_handlers(handlers);
        self
    }

    /// Apply the key and body limit from `config`.
    #[must_use]
    pub fn config(mut self, config: &BindConfig) -> Self {
        self.binder = self
            .binder
            .key(config.error_key.as_str())
            .max_body_bytes(config.max_body_bytes);
        self
    }
}

impl<T: Validate> BindFormLayer<T> {
    /// Also validate the bound form.
    #[must_use]
    pub fn validated(mut self) -> Self {
        self.validate = Some(T::validate);
        self
    }
}

impl<S, T> Layer<S> for BindFormLayer<T> {
    type Service = BindFormMiddleware<S, T>;

    fn layer(&self, inner: S) -> Self::Service {
        BindFormMiddleware {
            inner,
            binder: self.binder.clone(),
            validate: self.validate,
            _form: PhantomData,
        }
    }
}

/// Form binding middleware service.
pub struct BindFormMiddleware<S, T> {
    inner: S,
    binder: FormBinder,
    validate: Option<ValidateFn<T>>,
    _form: PhantomData<fn() -> T>,
}

impl<S: Clone, T> Clone for BindFormMiddleware<S, T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            binder: self.binder.clone(),
            validate: self.validate,
            _form: PhantomData,
        }
    }
}

impl<S, T> Service<Request<Body>> for BindFormMiddleware<S, T>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let binder = self.binder.clone();
        let validate = self.validate;
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let (mut parts, body) = req.into_parts();

            let (body, outcome) = if binds_from_query(&parts.method) {
                let outcome = binder.bind_with::<T>(&parts, &[], validate);
                (body, outcome)
            } else {
                match binder.collect_body(&parts.headers, body).await {
                    Ok(bytes) => {
                        let outcome = binder.bind_with::<T>(&parts, &bytes, validate);
                        (Body::from(bytes), outcome)
                    }
                    Err(error) => (Body::empty(), Err(binder.reject(&parts, error))),
                }
            };

            match outcome {
                Ok(form) => {
                    parts.extensions.insert(BoundForm(form));
                }
                Err(rejected) => {
                    let (error, response) = rejected.into_parts();
                    if let Some(response) = response {
                        return Ok(response);
                    }
                    parts.extensions.insert(FormError::new::<T>(error));
                }
            }

            inner.call(Request::from_parts(parts, body)).await
        })
    }
}
