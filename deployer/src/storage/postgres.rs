//! PostgreSQL-backed state store

use std::time::Duration;

use async_trait::async_trait;
use project_models::{Members, ProjectStatus};
use secrecy::ExposeSecret;
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgSslMode};
use sqlx::types::Json;
use sqlx::{query, Connection, Postgres};
use tracing::{debug, info, warn};

use crate::app::settings::DatabaseSettings;
use crate::errors::DeployError;
use crate::storage::state_store::{StateStore, StoreSession};

/// State store writing to the `projects` table
#[derive(Clone)]
pub struct PgStateStore {
    pool: PgPool,
}

impl PgStateStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a lazily connecting pool; nothing is dialed until the first write
    pub fn connect_lazy(settings: &DatabaseSettings) -> Self {
        let options = PgConnectOptions::new()
            .host(&settings.host)
            .port(settings.port)
            .username(&settings.user)
            .password(settings.password.expose_secret())
            .database(&settings.name)
            .ssl_mode(PgSslMode::Require);

        let pool = PgPoolOptions::new()
            .max_connections(2)
            .acquire_timeout(Duration::from_secs(30))
            .connect_lazy_with(options);

        info!(
            "Datastore configured at {}:{}/{}",
            settings.host, settings.port, settings.name
        );
        Self::new(pool)
    }
}

#[async_trait]
impl StateStore for PgStateStore {
    async fn open_session(&self) -> Result<Box<dyn StoreSession>, DeployError> {
        let conn = self.pool.acquire().await.map_err(|e| {
            DeployError::Persistence(format!("Failed to open datastore session: {}", e))
        })?;
        Ok(Box::new(PgSession { conn: Some(conn) }))
    }
}

/// One pooled connection
pub struct PgSession {
    conn: Option<PoolConnection<Postgres>>,
}

impl PgSession {
    async fn write(
        &mut self,
        project_id: u64,
        status: ProjectStatus,
        members: Option<&Members>,
        applications: Option<&[String]>,
    ) -> Result<(), DeployError> {
        let id = i64::try_from(project_id)
            .map_err(|_| DeployError::Persistence(format!("Project id out of range: {}", project_id)))?;
        let conn = self
            .conn
            .as_mut()
            .ok_or_else(|| DeployError::Persistence("Session already released".to_string()))?;

        let mut tx = conn.begin().await?;
        let result = query(
            r#"
            UPDATE projects
            SET status = $2,
                members = COALESCE($3, members),
                applications = COALESCE($4, applications),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .bind(members.map(|m| Json(m.clone())))
        .bind(applications.map(|a| Json(a.to_vec())))
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            DeployError::Persistence(format!(
                "Failed to record status {} for project {}: {}",
                status, project_id, e
            ))
        })?;
        tx.commit().await?;

        if result.rows_affected() == 0 {
            warn!("No project record {} to mark {}", project_id, status);
        } else {
            debug!("Project {} marked {}", project_id, status);
        }
        Ok(())
    }
}

#[async_trait]
impl StoreSession for PgSession {
    async fn record_launch(
        &mut self,
        project_id: u64,
        members: &Members,
        applications: &[String],
    ) -> Result<(), DeployError> {
        self.write(
            project_id,
            ProjectStatus::Launched,
            Some(members),
            Some(applications),
        )
        .await
    }

    async fn record_failure(
        &mut self,
        project_id: u64,
        status: ProjectStatus,
    ) -> Result<(), DeployError> {
        self.write(project_id, status, None, None).await
    }

    async fn record_deletion(&mut self, project_id: u64) -> Result<(), DeployError> {
        self.write(project_id, ProjectStatus::Deleted, None, None).await
    }

    async fn discard(mut self: Box<Self>) {
        if let Some(conn) = self.conn.take() {
            // Closing aborts any transaction left open on the server
            if let Err(e) = conn.close().await {
                warn!("Failed to close datastore session: {}", e);
            }
        }
    }

    async fn close(mut self: Box<Self>) {
        // Returned to the pool on drop
        self.conn.take();
    }
}
