//! Shared data model for project deployments
//!
//! Types exchanged between the job submission side and the provisioning
//! process running inside the job.

pub mod job;
pub mod members;
pub mod project;
pub mod request;

pub use job::{JobIdentity, JobKind};
pub use members::{parse_members, Member, Members};
pub use project::{ProjectRecord, ProjectStatus};
pub use request::DeploymentRequest;

use thiserror::Error;

/// Validation errors raised while building a request
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("Invalid members JSON: {0}")]
    InvalidMembers(String),

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid {field}: {value:?} ({reason})")]
    InvalidField {
        field: &'static str,
        value: String,
        reason: &'static str,
    },
}
