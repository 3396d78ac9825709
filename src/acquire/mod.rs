//! Startup model acquisition.
//!
//! Locates the best run of the configured experiment, downloads its model
//! artifact and publishes the decoded classifier to a [`ModelHandle`].
//! Every failure is logged and leaves the handle empty; none of them stop
//! the process.
//!
//! ```ignore
//! let handle = acquire::initialize(&config).await;
//! server::serve(config.addr, AppState::new(handle.clone())).await?;
//! acquire::teardown(&handle);
//! ```

use std::sync::Arc;

use log::{debug, error, info, warn};
use thiserror::Error;

use crate::config::{Credential, ServiceConfig};
use crate::io::DeserializeError;
use crate::model::{ForestClassifier, ModelHandle};

pub mod artifact;
pub mod tracker;

pub use artifact::{download, DownloadError};
pub use tracker::{Experiment, ExperimentRun, TrackerClient, TrackerError};

/// Reasons a model could not be acquired.
#[derive(Debug, Error)]
pub enum AcquireError {
    /// No credential in the environment.
    #[error("environment variable DAGSHUB_TOKEN is missing")]
    MissingCredential,

    /// HTTP client could not be constructed.
    #[error("http client setup failed: {0}")]
    Client(#[source] reqwest::Error),

    /// Tracker call failed.
    #[error(transparent)]
    Tracker(#[from] TrackerError),

    /// Tracker does not know the experiment.
    #[error("experiment '{0}' not found")]
    ExperimentNotFound(String),

    /// Experiment has no runs.
    #[error("no run found for experiment '{0}'")]
    NoRuns(String),

    /// Artifact download failed.
    #[error(transparent)]
    Download(#[from] DownloadError),

    /// Artifact is not a usable model.
    #[error("model artifact is unusable: {0}")]
    Deserialize(#[from] DeserializeError),
}

/// Find the best run of the configured experiment.
pub async fn best_run(
    tracker: &TrackerClient,
    config: &ServiceConfig,
) -> Result<ExperimentRun, AcquireError> {
    let experiment = tracker
        .experiment_by_name(&config.experiment_name)
        .await?
        .ok_or_else(|| AcquireError::ExperimentNotFound(config.experiment_name.clone()))?;
    debug!(
        "experiment '{}' has id {}",
        config.experiment_name, experiment.experiment_id
    );

    tracker
        .search_runs(
            &[experiment.experiment_id],
            &config.order_by(),
            &config.metric,
            1,
        )
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| AcquireError::NoRuns(config.experiment_name.clone()))
}

/// Fetch and decode the model of the best run, without publishing it.
pub async fn acquire(
    config: &ServiceConfig,
    credential: &Credential,
) -> Result<ForestClassifier, AcquireError> {
    let http = reqwest::Client::builder()
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(AcquireError::Client)?;

    let tracker = TrackerClient::new(http.clone(), config.tracking_uri(), credential.clone());
    info!("searching tracker {} for the best run", tracker.tracking_uri());

    let run = best_run(&tracker, config).await?;
    match run.metric {
        Some(score) => info!("best run: {} ({} = {score})", run.run_id, config.metric),
        None => info!("best run: {} (no {} recorded)", run.run_id, config.metric),
    }

    let url = config.artifact_url(&run.experiment_id, &run.run_id);
    info!("downloading model from {url}");
    let bytes = download(&http, &url, credential).await?;
    debug!("downloaded {} bytes", bytes.len());

    Ok(ForestClassifier::from_bytes(&bytes)?)
}

/// Acquire a model with an explicit credential and publish it.
///
/// The returned handle is empty when acquisition failed.
pub async fn initialize_with(config: &ServiceConfig, credential: Option<Credential>) -> ModelHandle {
    let handle = ModelHandle::empty();

    let Some(credential) = credential else {
        error!("fatal: {}", AcquireError::MissingCredential);
        return handle;
    };

    match acquire(config, &credential).await {
        Ok(model) => {
            info!(
                "model loaded: {} trees, {} classes, {} features",
                model.forest().n_trees(),
                model.n_classes(),
                model.meta().n_features
            );
            if handle.publish(Arc::new(model)).is_err() {
                warn!("model handle was already filled; keeping the existing model");
            }
        }
        Err(e) => error!("fatal: could not load model: {e}"),
    }

    handle
}

/// Acquire a model using the credential from the environment.
pub async fn initialize(config: &ServiceConfig) -> ModelHandle {
    info!("starting: fetching model for experiment '{}'", config.experiment_name);
    initialize_with(config, Credential::from_env()).await
}

/// Shutdown hook run after the server stops.
pub fn teardown(handle: &ModelHandle) {
    info!("shutting down (model loaded: {})", handle.is_loaded());
}
