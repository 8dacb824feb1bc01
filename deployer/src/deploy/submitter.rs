//! Job submission to the cluster scheduler

use std::sync::Arc;

use async_trait::async_trait;
use k8s_openapi::api::batch::v1::Job;
use kube::api::{Api, DeleteParams, PostParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use project_models::DeploymentRequest;
use tracing::{debug, error, info};

use crate::app::settings::Environment;
use crate::deploy::manifest::{build_job_manifest, ManifestSettings};
use crate::errors::DeployError;

/// Kubeconfig context used when running outside the cluster
pub const LOCAL_CONTEXT: &str = "staging";

/// Batch job API of the cluster scheduler
#[async_trait]
pub trait JobScheduler: Send + Sync {
    /// Create a job, returning the scheduler's view of it
    async fn create_job(&self, namespace: &str, job: &Job) -> Result<Job, DeployError>;

    /// Delete a job and its pods
    async fn delete_job(&self, namespace: &str, name: &str) -> Result<(), DeployError>;
}

/// Scheduler backed by the Kubernetes API
#[derive(Clone)]
pub struct KubeScheduler {
    client: Client,
}

impl KubeScheduler {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Namespace of the loaded credentials, the pod's own namespace in-cluster
    pub fn default_namespace(&self) -> &str {
        self.client.default_namespace()
    }

    /// Connect using the credentials selected by the deployment environment.
    ///
    /// `local` reads the kubeconfig with the staging context, every other
    /// environment uses the in-cluster service account.
    pub async fn connect(environment: &Environment) -> Result<Self, DeployError> {
        let config = match environment {
            Environment::Local => {
                let kubeconfig = Kubeconfig::read().map_err(|e| {
                    DeployError::Config(format!("Failed to read kubeconfig: {}", e))
                })?;
                let options = KubeConfigOptions {
                    context: Some(LOCAL_CONTEXT.to_string()),
                    cluster: None,
                    user: None,
                };
                Config::from_custom_kubeconfig(kubeconfig, &options)
                    .await
                    .map_err(|e| {
                        DeployError::Config(format!("Failed to create Kubernetes config: {}", e))
                    })?
            }
            _ => Config::incluster().map_err(|e| {
                DeployError::Config(format!("Failed to load in-cluster config: {}", e))
            })?,
        };

        let client = Client::try_from(config).map_err(|e| {
            DeployError::Config(format!("Failed to create Kubernetes client: {}", e))
        })?;

        info!("Connected to Kubernetes ({} credentials)", environment);
        Ok(Self::new(client))
    }
}

#[async_trait]
impl JobScheduler for KubeScheduler {
    async fn create_job(&self, namespace: &str, job: &Job) -> Result<Job, DeployError> {
        let jobs: Api<Job> = Api::namespaced(self.client.clone(), namespace);
        Ok(jobs.create(&PostParams::default(), job).await?)
    }

    async fn delete_job(&self, namespace: &str, name: &str) -> Result<(), DeployError> {
        let jobs: Api<Job> = Api::namespaced(self.client.clone(), namespace);
        jobs.delete(name, &DeleteParams::background()).await?;
        Ok(())
    }
}

/// Single-attempt job submitter
#[derive(Clone)]
pub struct JobSubmitter {
    scheduler: Arc<dyn JobScheduler>,
    namespace: String,
}

impl JobSubmitter {
    pub fn new(scheduler: Arc<dyn JobScheduler>, namespace: impl Into<String>) -> Self {
        Self {
            scheduler,
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Validate a request, build its manifest and submit it once
    pub async fn submit_request(
        &self,
        settings: &ManifestSettings,
        request: &DeploymentRequest,
    ) -> Result<Job, DeployError> {
        request.validate()?;
        let job = build_job_manifest(settings, request);

        match self.submit(&job).await {
            Ok(created) => {
                debug!(
                    "Job submitted - clean: {}, project: {}, project_id: {}, job: {:?}",
                    request.clean,
                    request.project_name,
                    request.project_id,
                    created.metadata.name
                );
                Ok(created)
            }
            Err(e) => {
                error!(
                    "Job submission failed - clean: {}, project: {}, project_id: {}, error: {}",
                    request.clean, request.project_name, request.project_id, e
                );
                Err(e)
            }
        }
    }

    /// Submit a manifest. No retry is attempted on rejection.
    pub async fn submit(&self, job: &Job) -> Result<Job, DeployError> {
        let namespace = job.metadata.namespace.as_deref().unwrap_or(&self.namespace);
        let name = job.metadata.name.as_deref().unwrap_or_default();
        debug!("Submitting job {} to namespace {}", name, namespace);

        self.scheduler.create_job(namespace, job).await
    }

    /// Delete a job by name. A job that no longer exists counts as deleted.
    pub async fn delete(&self, name: &str) -> Result<(), DeployError> {
        match self.scheduler.delete_job(&self.namespace, name).await {
            Ok(()) => {
                info!("Job {} deleted", name);
                Ok(())
            }
            Err(DeployError::Submission {
                status_code: 404, ..
            }) => {
                debug!("Job {} already deleted", name);
                Ok(())
            }
            Err(e) => {
                error!("Failed to delete job {}: {}", name, e);
                Err(e)
            }
        }
    }
}
