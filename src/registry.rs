//! Keyed registry of bind error handlers.
//!
//! Binders look up a handler by key whenever binding or validation fails.
//! A handler either answers the request itself (`Some(response)`) or lets
//! the request continue with the error recorded (`None`).

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use axum::response::Response;
use http::request::Parts;
use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use tracing::debug;

use crate::error::BindError;

/// Key used when callers do not name one.
pub const DEFAULT_KEY: &str = "_form_default";

/// Callback invoked on bind or validation failure.
pub type ErrorHandler = Arc<dyn Fn(&Parts, &BindError) -> Option<Response> + Send + Sync>;

static GLOBAL_HANDLERS: OnceCell<ErrorHandlers> = OnceCell::new();

/// Shared handle to a key → [`ErrorHandler`] map.
///
/// Clones share the same map.
#[derive(Clone, Default)]
pub struct ErrorHandlers {
    inner: Arc<RwLock<HashMap<String, ErrorHandler>>>,
}

impl ErrorHandlers {
    /// Create an empty, independent registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry, initialized on first use.
    pub fn global() -> &'static Self {
        GLOBAL_HANDLERS.get_or_init(Self::new)
    }

    /// Register `handler` under `key`, returning the handler it replaced.
    pub fn register<F>(&self, key: impl Into<String>, handler: F) -> Option<ErrorHandler>
    where
        F: Fn(&Parts, &BindError) -> Option<Response> + Send + Sync + 'static,
    {
        self.inner.write().insert(key.into(), Arc::new(handler))
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<ErrorHandler> {
        self.inner.read().get(key).cloned()
    }

    pub fn remove(&self, key: &str) -> Option<ErrorHandler> {
        self.inner.write().remove(key)
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.inner.read().contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// Invoke the handler registered under `key`, if any.
    ///
    /// The lock is released before the handler runs so handlers may
    /// register or remove entries themselves.
    pub fn handle(&self, key: &str, parts: &Parts, error: &BindError) -> Option<Response> {
        let Some(handler) = self.get(key) else {
            debug!(key, "No bind error handler registered");
            return None;
        };
        handler(parts, error)
    }
}

impl fmt::Debug for ErrorHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let map = self.inner.read();
        let mut keys: Vec<&str> = map.keys().map(String::as_str).collect();
        keys.sort_unstable();
        f.debug_struct("ErrorHandlers").field("keys", &keys).finish()
    }
}

/// Register a handler on the global registry under [`DEFAULT_KEY`].
pub fn register_error_handler<F>(handler: F)
where
    F: Fn(&Parts, &BindError) -> Option<Response> + Send + Sync + 'static,
{
    register_error_handler_with_key(DEFAULT_KEY, handler);
}

/// Register a handler on the global registry under `key`.
///
/// Re-registering a key replaces the previous handler.
pub fn register_error_handler_with_key<F>(key: impl Into<String>, handler: F)
where
    F: Fn(&Parts, &BindError) -> Option<Response> + Send + Sync + 'static,
{
    ErrorHandlers::global().register(key, handler);
}
