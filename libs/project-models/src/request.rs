//! Deployment request

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::job::JobIdentity;
use crate::members::{validate_members, Members};
use crate::ModelError;

/// Kubernetes object names are limited to a DNS label
const MAX_JOB_NAME_LEN: usize = 63;

/// Everything needed to launch or clean one project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRequest {
    pub project_name: String,
    pub project_id: u64,
    pub enterprise_id: u64,
    pub members: Members,
    pub cluster_namespace: String,

    /// Applications to provision, order is irrelevant
    pub components: BTreeSet<String>,

    /// Deployment environment name passed to the job (e.g. `staging`)
    pub environment: String,
    pub image_tag: String,

    /// Tear the project down instead of launching it
    #[serde(default)]
    pub clean: bool,
}

impl DeploymentRequest {
    /// Identity of the job this request runs as
    pub fn job_identity(&self) -> JobIdentity {
        if self.clean {
            JobIdentity::clean(self.project_id, self.project_name.clone())
        } else {
            JobIdentity::launch(self.project_id, self.project_name.clone())
        }
    }

    /// Validate fields that end up in job names or in the shell command
    pub fn validate(&self) -> Result<(), ModelError> {
        check_dns_label("project_name", &self.project_name)?;
        check_dns_label("cluster_namespace", &self.cluster_namespace)?;

        if self.environment.is_empty() {
            return Err(ModelError::MissingField("environment"));
        }
        if self.image_tag.is_empty() {
            return Err(ModelError::MissingField("image_tag"));
        }
        if !self.image_tag.chars().all(|c| c.is_ascii_alphanumeric() || "._-".contains(c)) {
            return Err(ModelError::InvalidField {
                field: "image_tag",
                value: self.image_tag.clone(),
                reason: "only alphanumerics, '.', '_' and '-' are allowed",
            });
        }

        for component in &self.components {
            if component.is_empty()
                || !component.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
            {
                return Err(ModelError::InvalidField {
                    field: "components",
                    value: component.clone(),
                    reason: "only alphanumerics, '-' and '_' are allowed",
                });
            }
        }

        validate_members(&self.members)?;

        // The launch name is the longest of the two identities
        let name = JobIdentity::launch(self.project_id, self.project_name.clone()).name();
        if name.len() > MAX_JOB_NAME_LEN {
            return Err(ModelError::InvalidField {
                field: "project_name",
                value: self.project_name.clone(),
                reason: "job name would exceed 63 characters",
            });
        }

        Ok(())
    }
}

fn check_dns_label(field: &'static str, value: &str) -> Result<(), ModelError> {
    if value.is_empty() {
        return Err(ModelError::MissingField(field));
    }
    let valid_chars = value
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if !valid_chars || value.starts_with('-') || value.ends_with('-') {
        return Err(ModelError::InvalidField {
            field,
            value: value.to_string(),
            reason: "must be a lowercase RFC 1123 label",
        });
    }
    Ok(())
}
