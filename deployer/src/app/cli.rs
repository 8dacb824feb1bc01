//! Command line interface

use clap::{Args, Parser, Subcommand};
use project_models::members::DEFAULT_MEMBERS;
use project_models::{parse_members, DeploymentRequest};

use crate::errors::DeployError;

/// Provisions and decommissions per-project tenant environments
#[derive(Debug, Parser)]
#[command(name = "project-deployer", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Launch or clean a project (the job entry point)
    Run(RunArgs),

    /// Build the project's job manifest and submit it to the cluster
    Submit(SubmitArgs),

    /// Print build information as JSON
    Version,
}

/// Project arguments shared by every command
#[derive(Debug, Clone, Args)]
pub struct ProjectArgs {
    /// Name of the project
    pub project_name: String,

    /// ID of the project in the database
    pub project_id: u64,

    /// ID of the enterprise account
    pub enterprise_id: u64,

    /// Namespace where the project's applications are deployed
    #[arg(long = "cluster-namespace", default_value = "lequanha")]
    pub cluster_namespace: String,

    /// Applications to launch
    #[arg(long, num_args = 1.., value_name = "COMPONENT")]
    pub components: Vec<String>,

    /// JSON map of account id to password and permission; single quotes are accepted
    #[arg(long, default_value = DEFAULT_MEMBERS)]
    pub members: String,

    /// Remove the project in its entirety
    #[arg(long)]
    pub clean: bool,
}

impl ProjectArgs {
    /// Parse and validate into a request
    pub fn into_request(
        self,
        environment: &str,
        image_tag: &str,
    ) -> Result<DeploymentRequest, DeployError> {
        let request = DeploymentRequest {
            project_name: self.project_name,
            project_id: self.project_id,
            enterprise_id: self.enterprise_id,
            members: parse_members(&self.members)?,
            cluster_namespace: self.cluster_namespace,
            components: self.components.into_iter().collect(),
            environment: environment.to_string(),
            image_tag: image_tag.to_string(),
            clean: self.clean,
        };
        request.validate()?;
        Ok(request)
    }
}

#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    #[command(flatten)]
    pub project: ProjectArgs,
}

#[derive(Debug, Clone, Args)]
pub struct SubmitArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Namespace the job is created in
    #[arg(long, default_value = "default")]
    pub namespace: String,

    /// Tag of the deployment image
    #[arg(long, default_value = "latest")]
    pub image_tag: String,

    /// Environment name passed to the job; defaults to ENVIRONMENT
    #[arg(long)]
    pub environment: Option<String>,

    /// Print the manifest instead of submitting it
    #[arg(long)]
    pub dry_run: bool,
}
