use std::path::Path;
use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use leadflow_agent::{
    Collaborators, DialogueOrchestrator, DialogueSettings, DisabledLlm, HttpCalendarClient,
    HttpLlmClient, KnowledgeBase, LlmClient, LlmError,
};
use leadflow_channel::{GatewayClient, NotifyError};
use leadflow_core::config::{AppConfig, ConfigError, LoadOptions};
use leadflow_core::scheduling::{AvailabilityEngine, BusinessHours, CalendarError, SystemClock};
use leadflow_db::repositories::{
    SqlBookingRepository, SqlLeadRepository, SqlSchedulingStateRepository, SqlTurnRepository,
};
use leadflow_db::{connect_with_settings, migrations, DbPool};

const KNOWLEDGE_PATH: &str = "data/knowledge_base.md";

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub orchestrator: Arc<DialogueOrchestrator>,
    pub gateway: Arc<GatewayClient>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("gateway client construction failed: {0}")]
    Gateway(#[source] NotifyError),
    #[error("calendar client construction failed: {0}")]
    Calendar(#[source] CalendarError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(event_name = "system.bootstrap.start", "starting application bootstrap");

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(event_name = "system.bootstrap.database_connected", "database connection established");

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(event_name = "system.bootstrap.migrations_applied", "database migrations applied");

    let gateway =
        Arc::new(GatewayClient::new(&config.gateway).map_err(BootstrapError::Gateway)?);
    let calendar =
        Arc::new(HttpCalendarClient::from_config(&config.calendar).map_err(BootstrapError::Calendar)?);

    let llm: Arc<dyn LlmClient> = match HttpLlmClient::from_config(&config.llm) {
        Ok(client) => Arc::new(client),
        Err(LlmError::Unavailable) => {
            warn!(
                event_name = "system.bootstrap.llm_disabled",
                "no generative credential configured; dialogue will use scripted replies"
            );
            Arc::new(DisabledLlm)
        }
        Err(other) => {
            warn!(
                event_name = "system.bootstrap.llm_disabled",
                error = %other,
                "generative client unavailable; dialogue will use scripted replies"
            );
            Arc::new(DisabledLlm)
        }
    };

    let availability = AvailabilityEngine::new(
        BusinessHours {
            open_hour: config.scheduling.open_hour,
            close_hour: config.scheduling.close_hour,
            ..BusinessHours::default()
        },
        config.scheduling.grid_step_minutes,
        config.scheduling.max_slots,
    );

    let orchestrator = Arc::new(DialogueOrchestrator::new(
        Collaborators {
            leads: Arc::new(SqlLeadRepository::new(db_pool.clone())),
            turns: Arc::new(SqlTurnRepository::new(db_pool.clone())),
            bookings: Arc::new(SqlBookingRepository::new(db_pool.clone())),
            sessions: Arc::new(SqlSchedulingStateRepository::new(db_pool.clone())),
            calendar,
            notifier: gateway.clone(),
            llm,
            clock: Arc::new(SystemClock),
        },
        availability,
        KnowledgeBase::load(Path::new(KNOWLEDGE_PATH)),
        DialogueSettings::from_config(&config),
    ));

    Ok(Application { config, db_pool, orchestrator, gateway })
}
