//! Deployment workflow
//!
//! Drives one launch or clean of a project across three systems that share no
//! transaction: the provisioning collaborator, the state store and the
//! notification sink. A failed launch is compensated by cleaning whatever was
//! created. Every failure is recorded, then notified, then returned.

use std::future::Future;
use std::sync::Arc;

use project_models::{DeploymentRequest, JobIdentity, ProjectStatus};
use tracing::{error, info, warn};

use crate::app::options::WorkflowOptions;
use crate::deploy::fsm::{WorkflowEvent, WorkflowFsm, WorkflowState};
use crate::deploy::provisioner::{ProjectBinding, Provisioner, ProvisionerFactory};
use crate::errors::DeployError;
use crate::notify::NotificationSink;
use crate::storage::state_store::{StateStore, StoreSession};

/// Session slot; `None` until a session is opened
type OpenSession = Option<Box<dyn StoreSession>>;

/// Orchestrates a single deployment invocation
pub struct DeploymentWorkflow {
    factory: Arc<dyn ProvisionerFactory>,
    store: Arc<dyn StateStore>,
    notifier: Arc<dyn NotificationSink>,
    options: WorkflowOptions,
    fsm: WorkflowFsm,
}

impl DeploymentWorkflow {
    pub fn new(
        factory: Arc<dyn ProvisionerFactory>,
        store: Arc<dyn StateStore>,
        notifier: Arc<dyn NotificationSink>,
        options: WorkflowOptions,
    ) -> Self {
        Self {
            factory,
            store,
            notifier,
            options,
            fsm: WorkflowFsm::new(),
        }
    }

    pub fn state(&self) -> WorkflowState {
        self.fsm.state()
    }

    /// Launch or clean, depending on the request
    pub async fn run(&mut self, request: &DeploymentRequest) -> Result<WorkflowState, DeployError> {
        if request.clean {
            self.clean(request).await
        } else {
            self.launch(request).await
        }
    }

    /// Launch the project, compensating on failure
    pub async fn launch(&mut self, request: &DeploymentRequest) -> Result<WorkflowState, DeployError> {
        self.transition(WorkflowEvent::Launch)?;
        info!("Launching project {} ({})", request.project_name, request.project_id);

        let binding = ProjectBinding::from(request);
        let mut provisioner: Option<Box<dyn Provisioner>> = None;
        let mut session: OpenSession = None;

        match self
            .try_launch(request, &binding, &mut provisioner, &mut session)
            .await
        {
            Ok(()) => {
                if let Some(session) = session.take() {
                    session.close().await;
                }
                info!("Project {} launched", request.project_name);
                self.transition(WorkflowEvent::Succeeded)
            }
            Err(err) => {
                error!("Project {} launch failed: {}", request.project_name, err);
                discard(session).await;

                match provisioner.as_deref() {
                    Some(provisioner) => match self.compensate(provisioner).await {
                        Ok(()) => info!("Compensation completed"),
                        Err(e) => error!("{}", e),
                    },
                    None => warn!(
                        "No provisioner was bound for project {}, nothing to compensate",
                        request.project_name
                    ),
                }

                self.record_failure(request.project_id, ProjectStatus::Failed)
                    .await;
                self.notify(&self.options.launch_label, &err).await;
                self.fail(&err);
                Err(err)
            }
        }
    }

    /// Tear the project down, removing its launch job
    pub async fn clean(&mut self, request: &DeploymentRequest) -> Result<WorkflowState, DeployError> {
        self.transition(WorkflowEvent::Clean)?;
        info!("Cleaning project {} ({})", request.project_name, request.project_id);

        let binding = ProjectBinding::from(request);
        let target = JobIdentity::clean(request.project_id, request.project_name.clone())
            .delete_target()
            .name();
        let mut session: OpenSession = None;

        match self.try_clean(request, &binding, &target, &mut session).await {
            Ok(()) => {
                if let Some(session) = session.take() {
                    session.close().await;
                }
                info!("Project {} deleted", request.project_name);
                self.transition(WorkflowEvent::Succeeded)
            }
            Err(err) => {
                error!("Project {} clean failed: {}", request.project_name, err);
                discard(session).await;

                self.record_failure(request.project_id, ProjectStatus::Deleted)
                    .await;
                self.notify(&self.options.deletion_label, &err).await;
                self.fail(&err);
                Err(err)
            }
        }
    }

    async fn try_launch(
        &self,
        request: &DeploymentRequest,
        binding: &ProjectBinding,
        provisioner: &mut Option<Box<dyn Provisioner>>,
        session: &mut OpenSession,
    ) -> Result<(), DeployError> {
        let provisioner = provisioner.insert(self.factory.bind(binding)?);
        let outcome = self.bounded("launch", provisioner.launch_project()).await?;

        let session = session.insert(self.store.open_session().await?);
        session
            .record_launch(request.project_id, &outcome.members, &outcome.applications)
            .await
    }

    async fn try_clean(
        &self,
        request: &DeploymentRequest,
        binding: &ProjectBinding,
        target: &str,
        session: &mut OpenSession,
    ) -> Result<(), DeployError> {
        let provisioner = self.factory.bind(binding)?;
        self.bounded("clean", provisioner.clean_project(Some(target), true))
            .await?;

        let session = session.insert(self.store.open_session().await?);
        session.record_deletion(request.project_id).await
    }

    /// Clean up after a failed launch.
    ///
    /// Hook failures are raised so they surface as a `Compensation` error; the
    /// caller only logs it and never lets it replace the launch error.
    async fn compensate(&self, provisioner: &dyn Provisioner) -> Result<(), DeployError> {
        self.bounded("compensation", provisioner.clean_project(None, true))
            .await
            .map_err(|e| DeployError::Compensation(e.to_string()))
    }

    /// Record a failure status in a fresh session
    async fn record_failure(&self, project_id: u64, status: ProjectStatus) {
        let mut session = match self.store.open_session().await {
            Ok(session) => session,
            Err(e) => {
                error!("Unable to record {} for project {}: {}", status, project_id, e);
                return;
            }
        };

        match session.record_failure(project_id, status).await {
            Ok(()) => session.close().await,
            Err(e) => {
                error!("Unable to record {} for project {}: {}", status, project_id, e);
                session.discard().await;
            }
        }
    }

    async fn notify(&self, label: &str, err: &DeployError) {
        if let Err(e) = self.notifier.notify(label, &err.to_string()).await {
            warn!("Failed to notify operators: {}", e);
        }
    }

    async fn bounded<T, F>(&self, action: &str, call: F) -> Result<T, DeployError>
    where
        F: Future<Output = Result<T, DeployError>>,
    {
        match tokio::time::timeout(self.options.provisioning_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(DeployError::Provisioning(format!(
                "{} timed out after {:?}",
                action, self.options.provisioning_timeout
            ))),
        }
    }

    fn transition(&mut self, event: WorkflowEvent) -> Result<WorkflowState, DeployError> {
        self.fsm.process(event).map_err(DeployError::Workflow)
    }

    /// Move to the failed state without masking the error being returned
    fn fail(&mut self, err: &DeployError) {
        if let Err(e) = self.transition(WorkflowEvent::Failed(err.to_string())) {
            error!("{}", e);
        }
    }
}

async fn discard(session: OpenSession) {
    if let Some(session) = session {
        warn!("Discarding datastore session left open by the failed attempt");
        session.discard().await;
    }
}
