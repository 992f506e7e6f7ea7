use std::time::Duration;

use thiserror::Error;

use crate::deploy::DeploySummary;

#[derive(Debug, Error)]
pub enum StagehandError {
    #[error("config error: {0}")]
    Config(String),

    #[error("config file not found: {0}")]
    ConfigNotFound(String),

    #[error("template error: {0}")]
    Template(String),

    #[error("install of '{app}' failed: {reason}")]
    Install { app: String, reason: String },

    /// `summary` holds every group run so far, including the failing one.
    #[error("app group '{group}' finished with failures: {failed}")]
    GroupFailed {
        group: String,
        failed: String,
        summary: Box<DeploySummary>,
    },

    #[error("failed to persist installed record for '{app}': {reason}")]
    Persist { app: String, reason: String },

    #[error("namespace '{namespace}' could not be marked privileged: {reason}")]
    Privilege { namespace: String, reason: String },

    #[error("deployment status poll failed: {0}")]
    Poll(String),

    #[error("deployment tracking timed out after {}s: {last_message}", elapsed.as_secs())]
    Timeout {
        elapsed: Duration,
        last_message: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StagehandError>;
