//! Component hook provisioner
//!
//! Each component is provisioned by an executable named after it in the hooks
//! directory, invoked as `<hooks_dir>/<component> launch|clean` with the
//! project context in its environment.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::Context;
use async_trait::async_trait;
use project_models::members::members_to_compact_json;
use tokio::process::Command;
use tracing::{debug, error, info, warn};

use crate::deploy::provisioner::{ProjectBinding, ProvisionOutcome, Provisioner, ProvisionerFactory};
use crate::deploy::submitter::JobSubmitter;
use crate::errors::DeployError;

/// Hook action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HookAction {
    Launch,
    Clean,
}

impl HookAction {
    fn as_str(&self) -> &'static str {
        match self {
            HookAction::Launch => "launch",
            HookAction::Clean => "clean",
        }
    }
}

/// Creates [`HookProvisioner`]s sharing one hooks directory and job submitter
#[derive(Clone)]
pub struct HookProvisionerFactory {
    hooks_dir: PathBuf,
    submitter: Option<JobSubmitter>,
}

impl HookProvisionerFactory {
    pub fn new(hooks_dir: impl Into<PathBuf>, submitter: Option<JobSubmitter>) -> Self {
        Self {
            hooks_dir: hooks_dir.into(),
            submitter,
        }
    }
}

impl ProvisionerFactory for HookProvisionerFactory {
    fn bind(&self, binding: &ProjectBinding) -> Result<Box<dyn Provisioner>, DeployError> {
        for component in &binding.components {
            let hook = self.hooks_dir.join(component);
            if !hook.is_file() {
                return Err(DeployError::Provisioning(format!(
                    "No hook for component {} at {}",
                    component,
                    hook.display()
                )));
            }
        }

        Ok(Box::new(HookProvisioner {
            binding: binding.clone(),
            hooks_dir: self.hooks_dir.clone(),
            submitter: self.submitter.clone(),
        }))
    }
}

/// Provisioner running one hook per component
pub struct HookProvisioner {
    binding: ProjectBinding,
    hooks_dir: PathBuf,
    submitter: Option<JobSubmitter>,
}

impl HookProvisioner {
    async fn run_hook(&self, component: &str, action: HookAction) -> Result<(), DeployError> {
        let hook = self.hooks_dir.join(component);
        debug!("Running {} {} for project {}", hook.display(), action.as_str(), self.binding.project_name);

        let status = self
            .command(&hook, component, action)
            .status()
            .await
            .with_context(|| format!("Failed to run hook {}", hook.display()))?;

        if !status.success() {
            return Err(DeployError::Provisioning(format!(
                "{} {} failed for project {}: {}",
                component,
                action.as_str(),
                self.binding.project_name,
                status
            )));
        }

        Ok(())
    }

    fn command(&self, hook: &Path, component: &str, action: HookAction) -> Command {
        let mut command = Command::new(hook);
        command
            .arg(action.as_str())
            .env("PROJECT_NAME", &self.binding.project_name)
            .env("PROJECT_COMPONENT", component)
            .env("ENTERPRISE_ID", self.binding.enterprise_id.to_string())
            .env("CLUSTER_NAMESPACE", &self.binding.cluster_namespace)
            .env("PROJECT_MEMBERS", members_to_compact_json(&self.binding.members))
            .stdin(Stdio::null())
            // Dropped when the provisioning timeout fires
            .kill_on_drop(true);
        command
    }
}

#[async_trait]
impl Provisioner for HookProvisioner {
    async fn launch_project(&self) -> Result<ProvisionOutcome, DeployError> {
        info!(
            "Launching project {} with {} components",
            self.binding.project_name,
            self.binding.components.len()
        );

        let mut applications = Vec::with_capacity(self.binding.components.len());
        for component in &self.binding.components {
            self.run_hook(component, HookAction::Launch).await?;
            applications.push(component.clone());
        }

        info!("Project {} launched", self.binding.project_name);
        Ok(ProvisionOutcome {
            members: self.binding.members.clone(),
            applications,
        })
    }

    async fn clean_project(
        &self,
        delete_job_name: Option<&str>,
        raise_error: bool,
    ) -> Result<(), DeployError> {
        info!("Cleaning project {}", self.binding.project_name);

        let mut first_error = None;

        // Reverse launch order so dependants go first
        for component in self.binding.components.iter().rev() {
            if let Err(e) = self.run_hook(component, HookAction::Clean).await {
                if raise_error {
                    error!("{}", e);
                    first_error.get_or_insert(e);
                } else {
                    warn!("Ignoring clean failure: {}", e);
                }
            }
        }

        if let (Some(name), Some(submitter)) = (delete_job_name, &self.submitter) {
            if let Err(e) = submitter.delete(name).await {
                if raise_error {
                    first_error.get_or_insert(e);
                } else {
                    warn!("Ignoring job deletion failure: {}", e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => {
                info!("Project {} cleaned", self.binding.project_name);
                Ok(())
            }
        }
    }
}
