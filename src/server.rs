//! HTTP server for the tunetrace service.
//!
//! Exposes the public API used by the binary to accept uploads, recognize
//! clips and manage the stored corpus.

use std::net::SocketAddr;

use axum::extract::DefaultBodyLimit;
use axum::http::header::{ACCEPT_ENCODING, AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::Method;
use axum::routing::{delete, get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use crate::matcher::Matcher;
use crate::routes::{self, AppState};

pub fn router(matcher: Matcher, body_limit: usize) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route("/fingerprint", post(routes::fingerprint))
        .route("/fingerprint/:name", delete(routes::delete_song))
        .route("/recognize", post(routes::recognize))
        .route("/songs", get(routes::list_songs))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors())
        .with_state(AppState { matcher })
}

/// Any origin may call the API; preflight requests are answered before routing.
fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, CONTENT_LENGTH, ACCEPT_ENCODING, AUTHORIZATION])
}

/// Serve `app` on `addr` until Ctrl-C or SIGTERM.
pub async fn serve(addr: SocketAddr, app: Router) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server exited");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            error!(%error, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => {
                error!(%error, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutting down server");
}
