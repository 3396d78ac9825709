//! HTTP API for digit classification.
//!
//! ## Endpoints
//!
//! - `GET /` - service status and whether a model is loaded
//! - `POST /predict` - classify one 64-value image
//!
//! ## Example
//!
//! ```rust,ignore
//! use digits_api::server::{router, AppState};
//!
//! let app = router(AppState::new(handle));
//! axum::serve(listener, app).await?;
//! ```

use std::future::Future;
use std::net::SocketAddr;

use axum::routing::{get, post};
use axum::Router;
use log::{error, info};
use tokio::net::TcpListener;

use crate::model::ModelHandle;

pub mod error;
pub mod handlers;
pub mod types;

pub use error::ApiError;
pub use handlers::INPUT_LEN;
pub use types::{ErrorResponse, PredictionRequest, PredictionResponse, StatusResponse};

/// Application state shared across handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Predictor slot, filled at most once.
    pub model: ModelHandle,
}

impl AppState {
    pub fn new(model: ModelHandle) -> Self {
        Self { model }
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::status))
        .route("/predict", post(handlers::predict))
        .fallback(handlers::not_found)
        .with_state(state)
}

/// Serve on an already bound listener until `shutdown` resolves.
pub async fn serve_with_shutdown(
    listener: TcpListener,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!("listening on http://{addr}");
    }
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}

/// Bind `addr` and serve until Ctrl-C or SIGTERM.
pub async fn serve(addr: SocketAddr, state: AppState) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    serve_with_shutdown(listener, state, shutdown_signal()).await?;
    info!("server stopped");
    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on Unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("cannot listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("cannot listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl-C"),
        _ = terminate => info!("received SIGTERM"),
    }
}
