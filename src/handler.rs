//! Handler wrappers that hand a bound form to plain async functions.
//!
//! ```ignore
//! async fn update_profile(parts: Parts, form: ProfileForm) -> impl IntoResponse { /* ... */ }
//!
//! Router::new().route("/profile", post(wrap_validated_handler(update_profile)));
//! ```
//!
//! If a [`BindFormLayer`] already bound the form it is reused; if it
//! recorded a [`FormError`] for the same form type that error is answered
//! with its default response (the error handler has already been
//! consulted). Otherwise the wrapper binds the form itself.
//!
//! [`BindFormLayer`]: crate::middleware::BindFormLayer

use std::future::Future;
use std::pin::Pin;

use axum::extract::Request;
use axum::response::{IntoResponse, Response};
use http::request::Parts;
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::binder::{FormBinder, ValidateFn};
use crate::extract::{BoundForm, FormError};

/// Boxed future returned by wrapped handlers.
pub type ResponseFuture = Pin<Box<dyn Future<Output = Response> + Send>>;

/// Wrap `handler`, binding `T` with the default binder.
pub fn wrap_handler<T, F, Fut, R>(
    handler: F,
) -> impl Fn(Request) -> ResponseFuture + Clone + Send + Sync + 'static
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
    F: Fn(Parts, T) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse,
{
    wrap(FormBinder::new(), None, handler)
}

/// Wrap `handler`, binding `T` with `binder`.
pub fn wrap_handler_with<T, F, Fut, R>(
    binder: FormBinder,
    handler: F,
) -> impl Fn(Request) -> ResponseFuture + Clone + Send + Sync + 'static
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
    F: Fn(Parts, T) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse,
{
    wrap(binder, None, handler)
}

/// Wrap `handler`, binding and validating `T` with the default binder.
pub fn wrap_validated_handler<T, F, Fut, R>(
    handler: F,
) -> impl Fn(Request) -> ResponseFuture + Clone + Send + Sync + 'static
where
    T: DeserializeOwned + Validate + Clone + Send + Sync + 'static,
    F: Fn(Parts, T) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse,
{
    wrap(FormBinder::new(), Some(T::validate), handler)
}

/// Wrap `handler`, binding and validating `T` with `binder`.
pub fn wrap_validated_handler_with<T, F, Fut, R>(
    binder: FormBinder,
    handler: F,
) -> impl Fn(Request) -> ResponseFuture + Clone + Send + Sync + 'static
where
    T: DeserializeOwned + Validate + Clone + Send + Sync + 'static,
    F: Fn(Parts, T) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse,
{
    wrap(binder, Some(T::validate), handler)
}

fn wrap<T, F, Fut, R>(
    binder: FormBinder,
    validate: Option<ValidateFn<T>>,
    handler: F,
) -> impl Fn(Request) -> ResponseFuture + Clone + Send + Sync + 'static
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
    F: Fn(Parts, T) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse,
{
    move |req: Request| {
        let binder = binder.clone();
        let handler = handler.clone();

        Box::pin(async move {
            let (parts, body) = req.into_parts();

            if let Some(BoundForm(form)) = parts.extensions.get::<BoundForm<T>>().cloned() {
                return handler(parts, form).await.into_response();
            }
            if let Some(error) = parts
                .extensions
                .get::<FormError>()
                .filter(|error| error.is_for::<T>())
            {
                return error.clone().into_response();
            }

            let bytes = match binder.collect_body_for(&parts, body).await {
                Ok(bytes) => bytes,
                Err(rejected) => return rejected.into_response(),
            };
            match binder.bind_with(&parts, &bytes, validate) {
                Ok(form) => handler(parts, form).await.into_response(),
                Err(rejected) => rejected.into_response(),
            }
        }) as ResponseFuture
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::Router;
    use axum::body::Body;
    use axum::routing::{get, post};
    use http::StatusCode;
    use http::header::CONTENT_TYPE;
    use serde::Deserialize;
    use tower::ServiceExt;

    use super::*;
    use crate::middleware::BindFormLayer;
    use crate::registry::{ErrorHandlers, register_error_handler};

    #[derive(Debug, Clone, Deserialize, Validate)]
    struct Profile {
        #[validate(length(min = 1, max = 32))]
        display_name: String,
        #[validate(range(min = 13))]
        age: u8,
    }

    async fn greet(parts: Parts, profile: Profile) -> String {
        format!("{} {} {}", parts.method, profile.display_name, profile.age)
    }

    fn isolated() -> FormBinder {
        FormBinder::with_key("handler-tests").with_handlers(ErrorHandlers::new())
    }

    async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn json(body: &'static str) -> http::Request<Body> {
        http::Request::post("/profile")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn wrapper_binds_and_calls_handler() {
        let app = Router::new().route("/profile", post(wrap_handler_with(isolated(), greet)));

        let response = app
            .oneshot(json(r#"{"display_name":"Ada","age":36}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "POST Ada 36");
    }

    #[tokio::test]
    async fn validated_wrapper_rejects_invalid_form() {
        let app = Router::new().route(
            "/profile",
            post(wrap_validated_handler_with(isolated(), greet)),
        );

        let response = app
            .oneshot(json(r#"{"display_name":"Ada","age":7}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body_string(response).await.contains("\"field\":\"age\""));
    }

    #[tokio::test]
    async fn wrapper_routes_failures_to_error_handler() {
        let handlers = ErrorHandlers::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        handlers.register("profile", move |_, _| {
            seen.fetch_add(1, Ordering::SeqCst);
            Some(StatusCode::BAD_GATEWAY.into_response())
        });
        let binder = FormBinder::with_key("profile").with_handlers(handlers);
        let app = Router::new().route("/profile", get(wrap_handler_with(binder, greet)));

        let response = app
            .oneshot(
                http::Request::get("/profile?display_name=Ada")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn wrapper_reuses_form_bound_by_middleware() {
        let layer = BindFormLayer::<Profile>::from_binder(isolated()).validated();
        let app = Router::new()
            .route("/profile", get(wrap_handler_with(isolated(), greet)))
            .route_layer(layer);

        let response = app
            .oneshot(
                http::Request::get("/profile?display_name=Grace&age=85")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(body_string(response).await, "GET Grace 85");
    }

    #[tokio::test]
    async fn wrapper_answers_error_recorded_by_middleware() {
        let handlers = ErrorHandlers::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        handlers.register("profile", move |_, _| {
            seen.fetch_add(1, Ordering::SeqCst);
            None
        });
        let binder = FormBinder::with_key("profile").with_handlers(handlers);
        let app = Router::new()
            .route("/profile", get(wrap_handler_with(binder.clone(), greet)))
            .route_layer(BindFormLayer::<Profile>::from_binder(binder).validated());

        let response = app
            .oneshot(
                http::Request::get("/profile?display_name=Tim&age=3")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[derive(Debug, Clone, Deserialize)]
    struct Other {
        #[allow(dead_code)]
        token: String,
    }

    #[derive(Debug, Clone, Deserialize)]
    struct Mine {
        q: String,
    }

    #[tokio::test]
    async fn wrapper_ignores_error_recorded_for_another_form() {
        let app = Router::new()
            .route(
                "/x",
                get(wrap_handler_with(isolated(), |_: Parts, mine: Mine| async move {
                    mine.q
                })),
            )
            .route_layer(BindFormLayer::<Other>::from_binder(isolated()));

        let response = app
            .oneshot(http::Request::get("/x?q=hi").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "hi");
    }

    // The only test in this binary that registers under the default key.
    #[tokio::test]
    async fn default_wrappers_use_global_default_handler() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        register_error_handler(move |_, error| {
            seen.fetch_add(1, Ordering::SeqCst);
            error
                .is_validation()
                .then(|| StatusCode::IM_A_TEAPOT.into_response())
        });

        let app = Router::new()
            .route("/profile", post(wrap_validated_handler(greet)))
            .route("/plain", post(wrap_handler(greet)));

        let response = app
            .clone()
            .oneshot(json(r#"{"display_name":"Ada","age":7}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let response = app
            .oneshot(
                http::Request::post("/plain")
                    .header(CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"display_name":"Ada","age":7}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "POST Ada 7");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
