//! Demo routes, one per binding style.

use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use form_binding::{
    Bind, BindFormLayer, BoundForm, FormBinder, FormError, wrap_validated_handler_with,
};
use http::StatusCode;
use http::request::Parts;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Sign-up form, bound by middleware.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SignUpForm {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8))]
    pub password: String,
    #[validate(length(min = 1, max = 255))]
    pub display_name: String,
}

/// Search query, bound by extractor.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchQuery {
    pub q: String,
    #[serde(default = "first_page")]
    pub page: u32,
}

const fn first_page() -> u32 {
    1
}

/// Profile update, bound by handler wrapper.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ProfileForm {
    #[validate(length(min = 1, max = 255))]
    pub display_name: String,
    #[validate(url)]
    pub website: Option<String>,
}

#[derive(Serialize)]
struct Accepted<'a> {
    status: &'static str,
    subject: &'a str,
}

/// Build demo routes using `binder` for key and body limit.
pub fn demo_routes(binder: FormBinder) -> Router {
    let sign_up = Router::new()
        .route("/v1/signup", post(sign_up_handler))
        .route_layer(BindFormLayer::<SignUpForm>::from_binder(binder.clone()).validated());

    Router::new()
        .route("/", get(|| async { "form-binding-demo" }))
        .route("/health", get(|| async { "OK" }))
        .route("/v1/search", get(search_handler))
        .route(
            "/v1/profile",
            post(wrap_validated_handler_with(binder.clone(), profile_handler)),
        )
        .merge(sign_up)
        .layer(Extension(binder))
}

async fn sign_up_handler(
    form: Option<BoundForm<SignUpForm>>,
    error: Option<FormError>,
) -> Response {
    match (form, error) {
        (Some(BoundForm(form)), _) => (
            StatusCode::CREATED,
            Json(Accepted {
                status: "created",
                subject: &form.email,
            }),
        )
            .into_response(),
        (None, Some(error)) => error.into_response(),
        (None, None) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

async fn search_handler(Bind(query): Bind<SearchQuery>) -> String {
    format!("search {} page {}", query.q, query.page)
}

async fn profile_handler(parts: Parts, form: ProfileForm) -> Response {
    let subject = format!("{} {}", parts.method, form.display_name);
    Json(Accepted {
        status: "updated",
        subject: &subject,
    })
    .into_response()
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use form_binding::ErrorHandlers;
    use http::Request;
    use http::header::CONTENT_TYPE;
    use tower::ServiceExt;

    use super::*;

    fn app() -> Router {
        demo_routes(FormBinder::with_key("demo-tests").with_handlers(ErrorHandlers::new()))
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn sign_up_accepts_valid_form() {
        let request = Request::post("/v1/signup")
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(
                "email=ada%40example.com&password=analytical1&display_name=Ada",
            ))
            .unwrap();

        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(json_body(response).await["subject"], "ada@example.com");
    }

    #[tokio::test]
    async fn sign_up_reports_violations() {
        let request = Request::post("/v1/signup")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(
                r#"{"email":"nope","password":"short","display_name":"Ada"}"#,
            ))
            .unwrap();

        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = json_body(response).await;
        assert_eq!(body["violations"][0]["field"], "email");
        assert_eq!(body["violations"][1]["field"], "password");
    }

    #[tokio::test]
    async fn search_binds_query() {
        let request = Request::get("/v1/search?q=rust")
            .body(Body::empty())
            .unwrap();

        let response = app().oneshot(request).await.unwrap();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&bytes[..], b"search rust page 1");
    }

    #[tokio::test]
    async fn profile_wrapper_validates() {
        let request = Request::post("/v1/profile")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"display_name":"Ada","website":"not a url"}"#))
            .unwrap();

        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn profile_wrapper_calls_handler() {
        let request = Request::post("/v1/profile")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"display_name":"Ada"}"#))
            .unwrap();

        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["subject"], "POST Ada");
    }
}
