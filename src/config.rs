//! Service configuration.
//!
//! [`ServiceConfig`] names the tracker project to load from and how the
//! server listens. Built-in defaults point at the `RandomForestExperiment_2`
//! experiment of the `paulker194/mlops` DagsHub repository; the environment
//! and command line override the listen address, the host URL and the log
//! level.
//!
//! # Example
//!
//! ```
//! use digits_api::config::ServiceConfig;
//!
//! let config = ServiceConfig::builder()
//!     .experiment_name("RandomForestExperiment_3")
//!     .build()
//!     .unwrap();
//! assert_eq!(config.tracking_uri(), "https://dagshub.com/paulker194/mlops.mlflow");
//! ```

use std::net::SocketAddr;

use bon::Builder;
use log::LevelFilter;
use reqwest::Url;
use thiserror::Error;

// =============================================================================
// Defaults
// =============================================================================

pub const DEFAULT_REPO_OWNER: &str = "paulker194";
pub const DEFAULT_REPO_NAME: &str = "mlops";
pub const DEFAULT_EXPERIMENT_NAME: &str = "RandomForestExperiment_2";
pub const DEFAULT_METRIC: &str = "accuracy";
pub const DEFAULT_HOST_URL: &str = "https://dagshub.com";
pub const DEFAULT_ARTIFACT_PATH: &str = "artifacts/model/model.bstr";
pub const DEFAULT_ADDR: SocketAddr =
    SocketAddr::new(std::net::IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED), 8000);

/// Credential variable.
pub const ENV_TOKEN: &str = "DAGSHUB_TOKEN";
/// Listen address variable.
pub const ENV_ADDR: &str = "DIGITS_API_ADDR";
/// Tracker and artifact host variable.
pub const ENV_HOST_URL: &str = "DIGITS_API_HOST_URL";
/// Log level variable.
pub const ENV_LOG: &str = "DIGITS_API_LOG";

// =============================================================================
// ConfigError
// =============================================================================

/// Errors that can occur during configuration validation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// A required text field is empty.
    #[error("{field} must not be empty")]
    Empty { field: &'static str },

    /// The host URL does not parse or cannot carry a path.
    #[error("invalid host url {url:?}: {reason}")]
    InvalidHostUrl { url: String, reason: String },

    /// The listen address does not parse.
    #[error("invalid listen address {0:?}")]
    InvalidAddr(String),

    /// The log level is not a known level name.
    #[error("invalid log level {0:?}")]
    InvalidLogLevel(String),
}

// =============================================================================
// ServiceConfig
// =============================================================================

/// Configuration for model acquisition and the HTTP listener.
#[derive(Debug, Clone, PartialEq, Builder)]
#[builder(
    derive(Clone, Debug),
    finish_fn(vis = "", name = __build_internal)
)]
pub struct ServiceConfig {
    // === Tracker project ===
    /// Account owning the repository.
    #[builder(into, default = DEFAULT_REPO_OWNER.to_owned())]
    pub repo_owner: String,

    /// Repository holding the experiment.
    #[builder(into, default = DEFAULT_REPO_NAME.to_owned())]
    pub repo_name: String,

    /// Experiment whose best run is served.
    #[builder(into, default = DEFAULT_EXPERIMENT_NAME.to_owned())]
    pub experiment_name: String,

    /// Run metric ranked in descending order.
    #[builder(into, default = DEFAULT_METRIC.to_owned())]
    pub metric: String,

    // === Endpoints ===
    /// Base URL of both the tracker and the artifact store.
    #[builder(into, default = DEFAULT_HOST_URL.to_owned())]
    pub host_url: String,

    /// Artifact path of the model inside a run.
    #[builder(into, default = DEFAULT_ARTIFACT_PATH.to_owned())]
    pub artifact_path: String,

    // === Server ===
    /// Listen address.
    #[builder(default = DEFAULT_ADDR)]
    pub addr: SocketAddr,

    /// Log level filter.
    #[builder(default = LevelFilter::Info)]
    pub log_level: LevelFilter,
}

impl<S: service_config_builder::IsComplete> ServiceConfigBuilder<S> {
    /// Build and validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a project field is empty or the host URL
    /// is not an absolute `http(s)` URL.
    pub fn build(self) -> Result<ServiceConfig, ConfigError> {
        let config = self.__build_internal();
        config.validate()?;
        Ok(config)
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self::builder().__build_internal()
    }
}

impl ServiceConfig {
    /// Defaults overridden by the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for
    /// [`ENV_ADDR`], [`ENV_HOST_URL`] and [`ENV_LOG`]. Blank values are ignored.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let addr = match get(ENV_ADDR) {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidAddr(raw))?,
            None => DEFAULT_ADDR,
        };
        let log_level = match get(ENV_LOG) {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidLogLevel(raw))?,
            None => LevelFilter::Info,
        };
        let host_url = get(ENV_HOST_URL).unwrap_or_else(|| DEFAULT_HOST_URL.to_owned());

        Self::builder()
            .host_url(host_url)
            .addr(addr)
            .log_level(log_level)
            .build()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("repo_owner", &self.repo_owner),
            ("repo_name", &self.repo_name),
            ("experiment_name", &self.experiment_name),
            ("metric", &self.metric),
            ("artifact_path", &self.artifact_path),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Empty { field });
            }
        }

        let invalid = |reason: &str| ConfigError::InvalidHostUrl {
            url: self.host_url.clone(),
            reason: reason.to_owned(),
        };
        let url = Url::parse(&self.host_url).map_err(|e| invalid(&e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(invalid("scheme must be http or https"));
        }
        if url.cannot_be_a_base() {
            return Err(invalid("url cannot carry a path"));
        }

        Ok(())
    }

    fn host(&self) -> &str {
        self.host_url.trim_end_matches('/')
    }

    /// MLflow tracking URI of the repository.
    pub fn tracking_uri(&self) -> String {
        format!("{}/{}/{}.mlflow", self.host(), self.repo_owner, self.repo_name)
    }

    /// Run ordering clause for the tracker search.
    pub fn order_by(&self) -> String {
        format!("metrics.{} DESC", self.metric)
    }

    /// Download URL of a run's model artifact.
    pub fn artifact_url(&self, experiment_id: &str, run_id: &str) -> String {
        format!(
            "{}/api/v1/repos/{}/{}/dvc/files/DVC/.mlflow/mlruns/{}/{}/{}",
            self.host(),
            self.repo_owner,
            self.repo_name,
            experiment_id,
            run_id,
            self.artifact_path.trim_start_matches('/')
        )
    }
}

// =============================================================================
// Credential
// =============================================================================

/// Bearer token for the tracker and artifact store. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wrap a token. Blank tokens count as absent.
    pub fn new(token: impl Into<String>) -> Option<Self> {
        let token = token.into();
        if token.trim().is_empty() {
            None
        } else {
            Some(Self(token))
        }
    }

    /// Read the token from [`ENV_TOKEN`].
    pub fn from_env() -> Option<Self> {
        std::env::var(ENV_TOKEN).ok().and_then(Self::new)
    }

    /// The raw token.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}
