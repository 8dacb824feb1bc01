//! Provisioning collaborator interface

use std::collections::BTreeSet;

use async_trait::async_trait;
use project_models::{DeploymentRequest, Members};

use crate::errors::DeployError;

/// Project context a provisioner is bound to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectBinding {
    pub project_name: String,
    pub enterprise_id: u64,
    pub members: Members,
    pub components: BTreeSet<String>,
    pub cluster_namespace: String,
}

impl From<&DeploymentRequest> for ProjectBinding {
    fn from(request: &DeploymentRequest) -> Self {
        Self {
            project_name: request.project_name.clone(),
            enterprise_id: request.enterprise_id,
            members: request.members.clone(),
            components: request.components.clone(),
            cluster_namespace: request.cluster_namespace.clone(),
        }
    }
}

/// Result of a successful launch, as it should be recorded
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProvisionOutcome {
    pub members: Members,
    pub applications: Vec<String>,
}

/// Performs the multi-step creation and teardown of a project's applications
#[async_trait]
pub trait Provisioner: Send + Sync {
    /// Create every application of the project.
    ///
    /// May fail partway, leaving some applications behind.
    async fn launch_project(&self) -> Result<ProvisionOutcome, DeployError>;

    /// Remove the project's applications and, when given, the named job.
    ///
    /// With `raise_error` unset, failures are logged and `Ok` is returned.
    async fn clean_project(
        &self,
        delete_job_name: Option<&str>,
        raise_error: bool,
    ) -> Result<(), DeployError>;
}

/// Builds a provisioner for a project
pub trait ProvisionerFactory: Send + Sync {
    fn bind(&self, binding: &ProjectBinding) -> Result<Box<dyn Provisioner>, DeployError>;
}
