//! Shared helpers for integration tests.
//!
//! Servers are bound to `127.0.0.1:0` and driven over real sockets with
//! `reqwest`. The fake tracker mimics the MLflow endpoints and the DagsHub
//! artifact route used during acquisition.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::net::TcpListener;

use digits_api::config::{Credential, ServiceConfig};
use digits_api::model::ModelHandle;
use digits_api::server::{self, AppState};

pub use digits_api::testing::{digit_image, digits_classifier, digits_classifier_bytes};

/// Token the fake tracker accepts.
pub const TOKEN: &str = "test-token";

/// Experiment id served by the fake tracker.
pub const EXPERIMENT_ID: &str = "7";

/// Run id of the best run served by the fake tracker.
pub const RUN_ID: &str = "0f3c2a9e5b1d4e6f";

// =============================================================================
// API server
// =============================================================================

/// Serve the API on a loopback port; returns its base URL.
pub async fn spawn_api(handle: ModelHandle) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(server::serve_with_shutdown(
        listener,
        AppState::new(handle),
        std::future::pending(),
    ));
    format!("http://{addr}")
}

pub fn credential() -> Credential {
    Credential::new(TOKEN).unwrap()
}

// =============================================================================
// Fake tracker
// =============================================================================

/// What the fake tracker answers.
#[derive(Debug, Clone)]
pub struct FakeTracker {
    /// Name of the only known experiment.
    pub experiment_name: String,
    /// Runs returned by `runs/search`; `None` omits the `runs` key.
    pub runs: Option<Vec<Value>>,
    /// Artifact bytes; `None` answers 404.
    pub artifact: Option<Vec<u8>>,
    /// Search requests received so far.
    pub searches: Arc<Mutex<Vec<Value>>>,
}

impl Default for FakeTracker {
    fn default() -> Self {
        Self {
            experiment_name: "RandomForestExperiment_2".into(),
            runs: Some(vec![run(RUN_ID, EXPERIMENT_ID, Some(0.98))]),
            artifact: Some(digits_classifier_bytes()),
            searches: Arc::default(),
        }
    }
}

/// A run as the MLflow REST API reports it.
pub fn run(run_id: &str, experiment_id: &str, accuracy: Option<f64>) -> Value {
    let metrics: Vec<Value> = accuracy
        .map(|value| json!({"key": "accuracy", "value": value, "step": 0}))
        .into_iter()
        .collect();
    json!({
        "info": {
            "run_id": run_id,
            "run_uuid": run_id,
            "experiment_id": experiment_id,
            "status": "FINISHED"
        },
        "data": {"metrics": metrics}
    })
}

#[derive(Deserialize)]
struct ByName {
    experiment_name: String,
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {TOKEN}"))
}

fn unauthorized() -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({"error_code": "UNAUTHENTICATED"}))).into_response()
}

async fn get_by_name(
    State(fake): State<FakeTracker>,
    headers: HeaderMap,
    Query(query): Query<ByName>,
) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    if query.experiment_name != fake.experiment_name {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({"error_code": "RESOURCE_DOES_NOT_EXIST"})),
        )
            .into_response();
    }
    Json(json!({
        "experiment": {
            "experiment_id": EXPERIMENT_ID,
            "name": fake.experiment_name,
            "lifecycle_stage": "active"
        }
    }))
    .into_response()
}

async fn search(
    State(fake): State<FakeTracker>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    fake.searches.lock().unwrap().push(body);
    match &fake.runs {
        Some(runs) => Json(json!({"runs": runs})).into_response(),
        None => Json(json!({})).into_response(),
    }
}

async fn artifact(
    State(fake): State<FakeTracker>,
    headers: HeaderMap,
    Path((experiment_id, run_id)): Path<(String, String)>,
) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    match &fake.artifact {
        Some(bytes) if experiment_id == EXPERIMENT_ID && run_id == RUN_ID => bytes.clone().into_response(),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Serve `fake` on a loopback port; returns its base URL.
pub async fn spawn_tracker(fake: FakeTracker) -> String {
    let app = Router::new()
        .route(
            "/paulker194/mlops.mlflow/api/2.0/mlflow/experiments/get-by-name",
            get(get_by_name),
        )
        .route("/paulker194/mlops.mlflow/api/2.0/mlflow/runs/search", post(search))
        .route(
            "/api/v1/repos/paulker194/mlops/dvc/files/DVC/.mlflow/mlruns/:experiment_id/:run_id/artifacts/model/model.bstr",
            get(artifact),
        )
        .with_state(fake);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await });
    format!("http://{addr}")
}

/// Config pointing both tracker and artifact store at `host_url`.
pub fn config_for(host_url: &str) -> ServiceConfig {
    ServiceConfig::builder().host_url(host_url).build().unwrap()
}

/// A loopback address nothing listens on.
pub async fn closed_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}
