//! Minimal MLflow tracking client (REST API 2.0).
//!
//! Only the two calls needed to locate a run are implemented:
//! `experiments/get-by-name` and `runs/search`.

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::Credential;

/// Errors raised by tracker calls.
#[derive(Debug, Error)]
pub enum TrackerError {
    /// Request could not be sent or the response body could not be read.
    #[error("tracker request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Tracker answered with a non-success status.
    #[error("tracker returned {status} for {endpoint}: {body}")]
    Status {
        endpoint: &'static str,
        status: StatusCode,
        body: String,
    },
}

/// A tracked experiment.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Experiment {
    pub experiment_id: String,
    #[serde(default)]
    pub name: String,
}

/// The run chosen for serving.
#[derive(Debug, Clone, PartialEq)]
pub struct ExperimentRun {
    pub run_id: String,
    pub experiment_id: String,
    /// Value of the ranking metric, when the run logged it.
    pub metric: Option<f64>,
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Deserialize)]
struct GetExperimentResponse {
    experiment: Experiment,
}

#[derive(Debug, Serialize)]
struct SearchRunsRequest<'a> {
    experiment_ids: &'a [String],
    order_by: Vec<String>,
    max_results: u32,
}

#[derive(Debug, Deserialize)]
struct SearchRunsResponse {
    #[serde(default)]
    runs: Vec<Run>,
}

#[derive(Debug, Deserialize)]
struct Run {
    info: RunInfo,
    #[serde(default)]
    data: RunData,
}

#[derive(Debug, Deserialize)]
struct RunInfo {
    run_id: String,
    experiment_id: String,
}

#[derive(Debug, Default, Deserialize)]
struct RunData {
    #[serde(default)]
    metrics: Vec<Metric>,
}

#[derive(Debug, Deserialize)]
struct Metric {
    key: String,
    value: f64,
}

impl Run {
    fn into_experiment_run(self, metric: &str) -> ExperimentRun {
        let value = self
            .data
            .metrics
            .iter()
            .find(|m| m.key == metric)
            .map(|m| m.value);
        ExperimentRun {
            run_id: self.info.run_id,
            experiment_id: self.info.experiment_id,
            metric: value,
        }
    }
}

// ============================================================================
// Client
// ============================================================================

/// Authenticated client bound to one tracking URI.
#[derive(Debug, Clone)]
pub struct TrackerClient {
    http: Client,
    tracking_uri: String,
    credential: Credential,
}

impl TrackerClient {
    pub fn new(http: Client, tracking_uri: impl Into<String>, credential: Credential) -> Self {
        Self {
            http,
            tracking_uri: tracking_uri.into().trim_end_matches('/').to_owned(),
            credential,
        }
    }

    pub fn tracking_uri(&self) -> &str {
        &self.tracking_uri
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/api/2.0/mlflow/{}", self.tracking_uri, path)
    }

    /// Look up an experiment by name. Unknown names yield `None`.
    pub async fn experiment_by_name(&self, name: &str) -> Result<Option<Experiment>, TrackerError> {
        let response = self
            .http
            .get(self.endpoint("experiments/get-by-name"))
            .bearer_auth(self.credential.expose())
            .query(&[("experiment_name", name)])
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = check_status("experiments/get-by-name", response).await?;
        let body: GetExperimentResponse = response.json().await?;
        Ok(Some(body.experiment))
    }

    /// Search runs of the given experiments sorted by `order_by`.
    ///
    /// `metric` is the key reported back in [`ExperimentRun::metric`].
    pub async fn search_runs(
        &self,
        experiment_ids: &[String],
        order_by: &str,
        metric: &str,
        max_results: u32,
    ) -> Result<Vec<ExperimentRun>, TrackerError> {
        let request = SearchRunsRequest {
            experiment_ids,
            order_by: vec![order_by.to_owned()],
            max_results,
        };

        let response = self
            .http
            .post(self.endpoint("runs/search"))
            .bearer_auth(self.credential.expose())
            .json(&request)
            .send()
            .await?;
        let response = check_status("runs/search", response).await?;
        let body: SearchRunsResponse = response.json().await?;

        Ok(body
            .runs
            .into_iter()
            .map(|run| run.into_experiment_run(metric))
            .collect())
    }
}

async fn check_status(
    endpoint: &'static str,
    response: reqwest::Response,
) -> Result<reqwest::Response, TrackerError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(TrackerError::Status {
        endpoint,
        status,
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn search_response_without_runs_is_empty() {
        let body: SearchRunsResponse = serde_json::from_value(json!({})).unwrap();
        assert!(body.runs.is_empty());
    }

    #[test]
    fn run_picks_ranking_metric() {
        let body: SearchRunsResponse = serde_json::from_value(json!({
            "runs": [{
                "info": {"run_id": "r1", "experiment_id": "4", "status": "FINISHED"},
                "data": {"metrics": [
                    {"key": "f1", "value": 0.5},
                    {"key": "accuracy", "value": 0.97}
                ]}
            }]
        }))
        .unwrap();

        let run = body.runs.into_iter().next().unwrap().into_experiment_run("accuracy");
        assert_eq!(run.run_id, "r1");
        assert_eq!(run.experiment_id, "4");
        assert_eq!(run.metric, Some(0.97));
    }

    #[test]
    fn run_without_metrics_has_no_score() {
        let body: SearchRunsResponse = serde_json::from_value(json!({
            "runs": [{"info": {"run_id": "r2", "experiment_id": "4"}}]
        }))
        .unwrap();

        let run = body.runs.into_iter().next().unwrap().into_experiment_run("accuracy");
        assert_eq!(run.metric, None);
    }

    #[test]
    fn search_request_shape() {
        let ids = vec!["4".to_string()];
        let request = SearchRunsRequest {
            experiment_ids: &ids,
            order_by: vec!["metrics.accuracy DESC".into()],
            max_results: 1,
        };

        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "experiment_ids": ["4"],
                "order_by": ["metrics.accuracy DESC"],
                "max_results": 1
            })
        );
    }
}
