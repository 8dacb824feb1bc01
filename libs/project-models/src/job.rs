//! Job naming

use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of job run for a project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    Launch,
    Clean,
}

impl JobKind {
    fn prefix(&self) -> &'static str {
        match self {
            JobKind::Launch => "project-deployment",
            JobKind::Clean => "project-clean",
        }
    }
}

/// Deterministic identity of a project job
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobIdentity {
    pub kind: JobKind,
    pub project_id: u64,
    pub project_name: String,
}

impl JobIdentity {
    pub fn launch(project_id: u64, project_name: impl Into<String>) -> Self {
        Self {
            kind: JobKind::Launch,
            project_id,
            project_name: project_name.into(),
        }
    }

    pub fn clean(project_id: u64, project_name: impl Into<String>) -> Self {
        Self {
            kind: JobKind::Clean,
            project_id,
            project_name: project_name.into(),
        }
    }

    /// The job a clean run has to remove: always the launch job of the same project
    pub fn delete_target(&self) -> JobIdentity {
        JobIdentity::launch(self.project_id, self.project_name.clone())
    }

    /// Rendered job name
    pub fn name(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for JobIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.kind.prefix(), self.project_id, self.project_name)
    }
}
