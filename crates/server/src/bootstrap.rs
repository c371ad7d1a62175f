use std::sync::Arc;

use opsdesk_core::config::{AppConfig, ConfigError};
use opsdesk_core::notify::NotifyError;
use opsdesk_core::workflow::RequestService;
use opsdesk_db::{connect, migrations, DbPool, SqlRequestRepository};
use thiserror::Error;
use tracing::info;

use crate::notifier;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub service: Arc<RequestService>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("notifier setup failed: {0}")]
    Notifier(#[source] NotifyError),
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );
    let machine = config.request_machine()?;

    let db_pool = connect(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let notifier = notifier::from_config(&config.notifications).map_err(BootstrapError::Notifier)?;
    info!(
        event_name = "system.bootstrap.notifier_ready",
        correlation_id = "bootstrap",
        webhook = config.notifications.webhook_url.is_some(),
        "notifier initialized"
    );

    let repository = Arc::new(SqlRequestRepository::new(db_pool.clone()));
    let service = Arc::new(RequestService::new(machine, repository, notifier));

    Ok(Application { config, db_pool, service })
}
