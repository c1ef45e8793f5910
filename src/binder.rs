//! Request → form binding.
//!
//! Parsing is delegated to serde (`serde_urlencoded` for query strings and
//! urlencoded bodies, `serde_json` for JSON bodies); validation is delegated
//! to `validator`. [`FormBinder`] adds the error handler lookup on top.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::Request;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use http::request::Parts;
use http::{HeaderMap, Method};
use http_body_util::LengthLimitError;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;
use validator::{Validate, ValidationErrors};

use crate::config::{BindConfig, DEFAULT_MAX_BODY_BYTES};
use crate::error::BindError;
use crate::registry::{DEFAULT_KEY, ErrorHandlers};

/// Validation hook applied after a successful bind.
pub type ValidateFn<T> = fn(&T) -> Result<(), ValidationErrors>;

/// How a request body is interpreted.
#[derive(Debug, PartialEq, Eq)]
enum BodyKind {
    Json,
    Form,
    Unsupported(String),
}

impl BodyKind {
    fn from_headers(headers: &HeaderMap) -> Self {
        let Some(value) = headers.get(CONTENT_TYPE) else {
            return Self::Unsupported("missing content type".to_string());
        };
        let Ok(content_type) = value.to_str() else {
            return Self::Unsupported(format!("malformed content type {value:?}"));
        };

        let mime = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        if mime == "application/json" || mime.ends_with("+json") {
            Self::Json
        } else if mime == "application/x-www-form-urlencoded" {
            Self::Form
        } else {
            Self::Unsupported(mime)
        }
    }
}

/// `GET` and `HEAD` bind from the query string only; their body is never read.
pub(crate) fn binds_from_query(method: &Method) -> bool {
    method == Method::GET || method == Method::HEAD
}

/// Bind a fresh `T` from request parts and an already collected body.
///
/// `GET`/`HEAD` requests and empty bodies bind from the query string. JSON
/// bodies bind from the body alone. Urlencoded bodies bind from body pairs
/// followed by query pairs; on duplicate keys the body wins.
///
/// # Errors
/// Returns [`BindError`] when the content type is unsupported or the data
/// does not deserialize into `T`.
pub fn bind_parts<T: DeserializeOwned>(parts: &Parts, body: &[u8]) -> Result<T, BindError> {
    let query = parts.uri.query().unwrap_or_default();

    if body.is_empty() || binds_from_query(&parts.method) {
        return serde_urlencoded::from_str(query).map_err(BindError::Query);
    }

    match BodyKind::from_headers(&parts.headers) {
        BodyKind::Json => Ok(serde_json::from_slice(body)?),
        BodyKind::Form => {
            let merged = merge_encoded(body, query);
            serde_urlencoded::from_str(&merged).map_err(BindError::Form)
        }
        BodyKind::Unsupported(mime) => Err(BindError::UnsupportedMediaType(mime)),
    }
}

/// Append query pairs whose decoded key is not already present in `body`.
fn merge_encoded(body: &[u8], query: &str) -> String {
    let mut pairs: Vec<(String, String)> = form_urlencoded::parse(body).into_owned().collect();
    let body_pairs = pairs.len();

    for (key, value) in form_urlencoded::parse(query.as_bytes()).into_owned() {
        if !pairs[..body_pairs].iter().any(|(k, _)| *k == key) {
            pairs.push((key, value));
        }
    }

    form_urlencoded::Serializer::new(String::new())
        .extend_pairs(&pairs)
        .finish()
}

/// A failed bind, together with the error handler's answer if it gave one.
///
/// As a response it yields the handler's response, or the default JSON
/// error response when the handler declined or none was registered.
#[derive(Debug, Error)]
#[error("form binding rejected")]
pub struct Rejected {
    #[source]
    error: BindError,
    response: Option<Response>,
}

impl Rejected {
    #[must_use]
    pub const fn error(&self) -> &BindError {
        &self.error
    }

    /// Whether an error handler produced a response.
    #[must_use]
    pub const fn is_handled(&self) -> bool {
        self.response.is_some()
    }

    #[must_use]
    pub fn into_error(self) -> BindError {
        self.error
    }

    #[must_use]
    pub fn into_parts(self) -> (BindError, Option<Response>) {
        (self.error, self.response)
    }
}

impl IntoResponse for Rejected {
    fn into_response(self) -> Response {
        match self.response {
            Some(response) => response,
            None => self.error.into_response(),
        }
    }
}

/// Binds forms and routes failures to the error handler registered under
/// its key.
#[derive(Debug, Clone)]
pub struct FormBinder {
    handlers: ErrorHandlers,
    key: Arc<str>,
    max_body_bytes: usize,
}

impl Default for FormBinder {
    fn default() -> Self {
        Self::new()
    }
}

impl FormBinder {
    /// Binder on the global registry using [`DEFAULT_KEY`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_key(DEFAULT_KEY)
    }

    /// Binder on the global registry using `key`.
    #[must_use]
    pub fn with_key(key: impl Into<Arc<str>>) -> Self {
        Self {
            handlers: ErrorHandlers::global().clone(),
            key: key.into(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    /// Binder on the global registry, key and body limit from `config`.
    #[must_use]
    pub fn with_config(config: &BindConfig) -> Self {
        Self::with_key(config.error_key.as_str()).max_body_bytes(config.max_body_bytes)
    }

    /// Use `handlers` instead of the global registry.
    #[must_use]
    pub fn with_handlers(mut self, handlers: ErrorHandlers) -> Self {
        self.handlers = handlers;
        self
    }

    #[must_use]
    pub fn key(mut self, key: impl Into<Arc<str>>) -> Self {
        self.key = key.into();
        self
    }

    #[must_use]
    pub fn max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = limit;
        self
    }

    #[must_use]
    pub fn error_key(&self) -> &str {
        &self.key
    }

    #[must_use]
    pub const fn body_limit(&self) -> usize {
        self.max_body_bytes
    }

    /// Bind a fresh `T`.
    ///
    /// # Errors
    /// Returns [`Rejected`] after consulting the keyed error handler.
    pub fn bind<T: DeserializeOwned>(&self, parts: &Parts, body: &[u8]) -> Result<T, Rejected> {
        self.bind_with(parts, body, None)
    }

    /// Bind a fresh `T`, then validate it.
    ///
    /// # Errors
    /// Returns [`Rejected`] after consulting the keyed error handler.
    pub fn bind_validated<T>(&self, parts: &Parts, body: &[u8]) -> Result<T, Rejected>
    where
        T: DeserializeOwned + Validate,
    {
        self.bind_with(parts, body, Some(T::validate))
    }

    /// Bind into an existing form.
    ///
    /// On success `form` is overwritten and `true` returned. On failure
    /// `form` is left untouched, the keyed error handler is invoked and
    /// `false` returned.
    pub fn bind_into<T: DeserializeOwned>(&self, parts: &Parts, body: &[u8], form: &mut T) -> bool {
        match self.bind(parts, body) {
            Ok(bound) => {
                *form = bound;
                true
            }
            Err(_) => false,
        }
    }

    /// Collect the body of `req` and bind a fresh `T` from it.
    ///
    /// # Errors
    /// Returns [`Rejected`] for oversized or unreadable bodies and for bind
    /// failures.
    pub async fn bind_request<T: DeserializeOwned>(
        &self,
        req: Request,
    ) -> Result<(Parts, T), Rejected> {
        self.bind_request_with(req, None).await
    }

    /// Collect the body of `req`, bind a fresh `T` and validate it.
    ///
    /// # Errors
    /// Returns [`Rejected`] for body, bind or validation failures.
    pub async fn bind_validated_request<T>(&self, req: Request) -> Result<(Parts, T), Rejected>
    where
        T: DeserializeOwned + Validate,
    {
        self.bind_request_with(req, Some(T::validate)).await
    }

    /// Read `body` into memory, enforcing the body limit.
    ///
    /// The declared `Content-Length` is checked before reading. Callers skip
    /// this for `GET`/`HEAD`, which bind from the query alone.
    ///
    /// # Errors
    /// Returns [`BindError::BodyTooLarge`] or [`BindError::Body`].
    pub async fn collect_body(&self, headers: &HeaderMap, body: Body) -> Result<Bytes, BindError> {
        let limit = self.max_body_bytes;
        let declared = headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<usize>().ok());
        if declared.is_some_and(|len| len > limit) {
            return Err(BindError::BodyTooLarge { limit });
        }

        axum::body::to_bytes(body, limit).await.map_err(|e| {
            let inner = e.into_inner();
            if inner.is::<LengthLimitError>() {
                BindError::BodyTooLarge { limit }
            } else {
                BindError::Body(inner.to_string())
            }
        })
    }

    pub(crate) async fn bind_request_with<T: DeserializeOwned>(
        &self,
        req: Request,
        validate: Option<ValidateFn<T>>,
    ) -> Result<(Parts, T), Rejected> {
        let (parts, body) = req.into_parts();
        let bytes = self.collect_body_for(&parts, body).await?;
        let form = self.bind_with(&parts, &bytes, validate)?;
        Ok((parts, form))
    }

    /// Like [`collect_body`](Self::collect_body), but returns no bytes for
    /// `GET`/`HEAD` and routes failures through the error handler.
    pub(crate) async fn collect_body_for(
        &self,
        parts: &Parts,
        body: Body,
    ) -> Result<Bytes, Rejected> {
        if binds_from_query(&parts.method) {
            return Ok(Bytes::new());
        }
        self.collect_body(&parts.headers, body)
            .await
            .map_err(|error| self.reject(parts, error))
    }

    pub(crate) fn bind_with<T: DeserializeOwned>(
        &self,
        parts: &Parts,
        body: &[u8],
        validate: Option<ValidateFn<T>>,
    ) -> Result<T, Rejected> {
        let form: T = bind_parts(parts, body).map_err(|e| self.reject(parts, e))?;
        if let Some(validate) = validate {
            validate(&form).map_err(|e| self.reject(parts, e.into()))?;
        }
        debug!(path = parts.uri.path(), form = std::any::type_name::<T>(), "Form bound");
        Ok(form)
    }

    pub(crate) fn reject(&self, parts: &Parts, error: BindError) -> Rejected {
        debug!(key = %self.key, path = parts.uri.path(), error = %error, "Form binding rejected");
        let response = self.handlers.handle(&self.key, parts, &error);
        Rejected { error, response }
    }
}
