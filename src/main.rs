//! Form binding demo server.

use std::net::SocketAddr;

use axum::Json;
use axum::response::IntoResponse;
use form_binding::config::Config;
use form_binding::error::{BindError, ErrorBody};
use form_binding::telemetry::setup_telemetry;
use form_binding::{FormBinder, register_error_handler_with_key};
use http::Request;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{Level, info, warn};

mod routes;

/// Build version.
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::init()?;
    setup_telemetry(&config)?;

    info!(
        version = VERSION,
        address = %config.address,
        body_limit = config.bind.max_body_bytes,
        error_key = %config.bind.error_key,
        pid = std::process::id(),
        "Starting form-binding-demo"
    );

    // Malformed requests are answered here; validation failures fall
    // through to the handlers, which see them as `FormError`.
    register_error_handler_with_key(config.bind.error_key.as_str(), |parts, err: &BindError| {
        if err.is_validation() {
            return None;
        }
        warn!(path = parts.uri.path(), error = %err, "Rejected malformed form");
        let body = ErrorBody {
            error: err.to_string(),
            violations: Vec::new(),
        };
        Some((err.status(), Json(body)).into_response())
    });

    let binder = FormBinder::with_config(&config.bind);
    let addr: SocketAddr = config.address.parse()?;

    let middleware = ServiceBuilder::new().layer(
        TraceLayer::new_for_http()
            .make_span_with(|req: &Request<_>| {
                tracing::info_span!("request", method = %req.method(), uri = %req.uri())
            })
            .on_response(tower_http::trace::DefaultOnResponse::new().level(Level::DEBUG)),
    );
    let app = routes::demo_routes(binder).layer(middleware);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "Listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C, shutting down"),
        () = terminate => info!("Received SIGTERM, shutting down"),
    }
}
