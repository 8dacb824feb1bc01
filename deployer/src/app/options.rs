//! Workflow options

use std::time::Duration;

/// Tunables of the deployment workflow
#[derive(Debug, Clone)]
pub struct WorkflowOptions {
    /// Bound on a single launch or clean call
    pub provisioning_timeout: Duration,

    /// Notification label for launch failures
    pub launch_label: String,

    /// Notification label for clean failures
    pub deletion_label: String,
}

impl Default for WorkflowOptions {
    fn default() -> Self {
        Self {
            provisioning_timeout: Duration::from_secs(30 * 60), // 30 minutes
            launch_label: "Project Deployment".to_string(),
            deletion_label: "Project Deletion".to_string(),
        }
    }
}
