//! digits-api: an HTTP service classifying 8x8 digit images.
//!
//! At startup the service locates the best run of an MLflow experiment,
//! downloads its tree-ensemble model and keeps it in memory; requests are
//! then answered from that model.
//!
//! - [`acquire`] - tracker lookup, artifact download, model publication
//! - [`server`] - axum router and handlers
//! - [`model`] - the [`Predictor`](model::Predictor) seam and the forest classifier
//! - [`repr`] - tree and forest storage
//! - [`io`] - the native `.bstr` model container

pub mod acquire;
pub mod config;
pub mod io;
pub mod logging;
pub mod model;
pub mod repr;
pub mod server;
pub mod testing;
