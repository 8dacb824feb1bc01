//! Project state persistence interface

use async_trait::async_trait;
use project_models::{Members, ProjectStatus};

use crate::errors::DeployError;

/// Relational store of project lifecycle transitions
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Open a session for one logical write
    async fn open_session(&self) -> Result<Box<dyn StoreSession>, DeployError>;
}

/// A datastore session.
///
/// Each `record_*` call runs in its own transaction and commits it. A call
/// that fails may leave the session dirty; such a session must be
/// [`discard`](StoreSession::discard)ed before anything else is written.
#[async_trait]
pub trait StoreSession: Send {
    /// Mark the project launched with its resulting members and applications
    async fn record_launch(
        &mut self,
        project_id: u64,
        members: &Members,
        applications: &[String],
    ) -> Result<(), DeployError>;

    /// Mark the project failed. The clean path passes [`ProjectStatus::Deleted`].
    async fn record_failure(
        &mut self,
        project_id: u64,
        status: ProjectStatus,
    ) -> Result<(), DeployError>;

    /// Mark the project deleted
    async fn record_deletion(&mut self, project_id: u64) -> Result<(), DeployError>;

    /// Roll back anything pending, release the connection and close it
    async fn discard(self: Box<Self>);

    /// Release a clean session
    async fn close(self: Box<Self>);
}
