//! Command execution

use std::sync::Arc;

use k8s_openapi::api::batch::v1::Job;
use tracing::info;

use crate::app::cli::{RunArgs, SubmitArgs};
use crate::app::options::WorkflowOptions;
use crate::app::settings::Settings;
use crate::deploy::fsm::WorkflowState;
use crate::deploy::hooks::HookProvisionerFactory;
use crate::deploy::manifest::{build_job_manifest, render_manifest, ManifestSettings};
use crate::deploy::submitter::{JobSubmitter, KubeScheduler};
use crate::deploy::workflow::DeploymentWorkflow;
use crate::errors::DeployError;
use crate::notify::teams::TeamsNotifier;
use crate::notify::{LogNotifier, NotificationSink};
use crate::storage::postgres::PgStateStore;

/// Launch or clean a project from inside its job
pub async fn run(settings: Settings, args: RunArgs) -> Result<WorkflowState, DeployError> {
    // Input is checked before any external system is touched
    let request = args
        .project
        .into_request(settings.environment.as_str(), &settings.release_version)?;

    let database = settings
        .database
        .as_ref()
        .ok_or_else(|| DeployError::Config("DB_IP is not set".to_string()))?;
    let store = Arc::new(PgStateStore::connect_lazy(database));

    let notifier: Arc<dyn NotificationSink> = match settings.webhook_url {
        Some(url) => Arc::new(TeamsNotifier::new(url, settings.host_label.clone())?),
        None => Arc::new(LogNotifier::new(settings.host_label.clone())),
    };

    let scheduler = KubeScheduler::connect(&settings.environment).await?;
    let namespace = scheduler.default_namespace().to_string();
    let submitter = JobSubmitter::new(Arc::new(scheduler), namespace);
    let factory = Arc::new(HookProvisionerFactory::new(
        settings.hooks_dir.clone(),
        Some(submitter),
    ));

    let options = WorkflowOptions {
        provisioning_timeout: settings.provisioning_timeout,
        ..Default::default()
    };
    let mut workflow = DeploymentWorkflow::new(factory, store, notifier, options);
    workflow.run(&request).await
}

/// Build the project's job manifest and submit it once
pub async fn submit(settings: Settings, args: SubmitArgs) -> Result<Option<Job>, DeployError> {
    let environment = args
        .environment
        .unwrap_or_else(|| settings.environment.as_str().to_string());
    let request = args.project.into_request(&environment, &args.image_tag)?;

    let manifest_settings = ManifestSettings {
        namespace: args.namespace.clone(),
        ..Default::default()
    };

    if args.dry_run {
        let job = build_job_manifest(&manifest_settings, &request);
        println!("{}", render_manifest(&job)?);
        return Ok(None);
    }

    let scheduler = KubeScheduler::connect(&settings.environment).await?;
    let submitter = JobSubmitter::new(Arc::new(scheduler), args.namespace);
    let job = submitter.submit_request(&manifest_settings, &request).await?;
    info!(
        "Submitted job {} in namespace {}",
        job.metadata.name.as_deref().unwrap_or_default(),
        submitter.namespace()
    );
    Ok(Some(job))
}
