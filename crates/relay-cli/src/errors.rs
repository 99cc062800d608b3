//! Error types for the CLI runtime.

use std::io;
use std::sync::Arc;

use thiserror::Error;

use crate::telemetry::TelemetryError;

#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error("failed to load configuration: {0}")]
    LoadConfiguration(Arc<ortho_config::OrthoError>),
    #[error("{0}")]
    CliUsage(clap::Error),
    #[error("--params must be a JSON object: {0}")]
    InvalidParams(serde_json::Error),
    #[error("failed to initialise logging: {0}")]
    Telemetry(#[from] TelemetryError),
    #[error("failed to start the async runtime: {0}")]
    Runtime(io::Error),
    #[error("failed to serialise the command result: {0}")]
    SerialiseResult(serde_json::Error),
    #[error("failed to write the command result: {0}")]
    WriteResult(io::Error),
}
