//! Error types for the project deployer

use project_models::ModelError;
use thiserror::Error;

/// Main error type for the project deployer
#[derive(Error, Debug)]
pub enum DeployError {
    #[error("Input error: {0}")]
    Input(String),

    #[error("Submission error ({status_code}): {message}")]
    Submission { status_code: u16, message: String },

    #[error("Provisioning error: {0}")]
    Provisioning(String),

    #[error("Compensation error: {0}")]
    Compensation(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Notification error: {0}")]
    Notification(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Workflow error: {0}")]
    Workflow(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<ModelError> for DeployError {
    fn from(err: ModelError) -> Self {
        DeployError::Input(err.to_string())
    }
}

impl From<anyhow::Error> for DeployError {
    fn from(err: anyhow::Error) -> Self {
        DeployError::Provisioning(format!("{:#}", err))
    }
}

impl From<sqlx::Error> for DeployError {
    fn from(err: sqlx::Error) -> Self {
        DeployError::Persistence(err.to_string())
    }
}

impl From<kube::Error> for DeployError {
    fn from(err: kube::Error) -> Self {
        match err {
            kube::Error::Api(response) => DeployError::Submission {
                status_code: response.code,
                message: response.message,
            },
            other => DeployError::Submission {
                status_code: 0,
                message: other.to_string(),
            },
        }
    }
}
