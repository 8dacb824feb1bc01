//! Persisted project lifecycle

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::members::Members;

/// Project lifecycle status as stored in the datastore
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    Launched,

    /// Launch failed, or deletion failed when recorded with `Deleted`
    #[default]
    Failed,

    Deleted,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Launched => "launched",
            ProjectStatus::Failed => "failed",
            ProjectStatus::Deleted => "deleted",
        }
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot written for a project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectRecord {
    pub project_id: u64,
    pub status: ProjectStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub members: Option<Members>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applications: Option<Vec<String>>,
}

impl ProjectRecord {
    pub fn launched(project_id: u64, members: Members, applications: Vec<String>) -> Self {
        Self {
            project_id,
            status: ProjectStatus::Launched,
            members: Some(members),
            applications: Some(applications),
        }
    }

    pub fn with_status(project_id: u64, status: ProjectStatus) -> Self {
        Self {
            project_id,
            status,
            members: None,
            applications: None,
        }
    }
}
