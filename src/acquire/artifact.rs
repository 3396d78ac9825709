//! Authenticated artifact download.

use reqwest::{Client, StatusCode};
use thiserror::Error;

use crate::config::Credential;

/// Errors raised while downloading an artifact.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Request could not be sent or the body could not be read.
    #[error("download of {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Artifact store answered with a non-success status.
    #[error("download of {url} returned {status}")]
    Status { url: String, status: StatusCode },
}

/// Fetch the raw bytes at `url` with a bearer token.
pub async fn download(
    http: &Client,
    url: &str,
    credential: &Credential,
) -> Result<Vec<u8>, DownloadError> {
    let transport = |source| DownloadError::Transport {
        url: url.to_owned(),
        source,
    };

    let response = http
        .get(url)
        .bearer_auth(credential.expose())
        .send()
        .await
        .map_err(transport)?;

    let status = response.status();
    if !status.is_success() {
        return Err(DownloadError::Status {
            url: url.to_owned(),
            status,
        });
    }

    let bytes = response.bytes().await.map_err(transport)?;
    Ok(bytes.to_vec())
}
