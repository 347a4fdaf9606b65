use std::path::Path;
use std::sync::Arc;

use leadflow_agent::{
    Collaborators, DialogueOrchestrator, DialogueSettings, DisabledLlm, HttpCalendarClient,
    HttpLlmClient, KnowledgeBase, LlmClient,
};
use leadflow_channel::GatewayClient;
use leadflow_core::config::{AppConfig, LoadOptions};
use leadflow_core::domain::lead::LeadId;
use leadflow_core::scheduling::{AvailabilityEngine, BusinessHours, SystemClock};
use leadflow_db::repositories::{
    SqlBookingRepository, SqlLeadRepository, SqlSchedulingStateRepository, SqlTurnRepository,
};
use leadflow_db::{connect_with_settings, migrations};

use crate::commands::{runtime, CommandResult};

/// Opens the funnel for one lead: sends the feedback question and marks
/// the lead as contacted.
pub fn run(phone: &str, name: &str, topic: Option<&str>) -> CommandResult {
    let digits: String = phone.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return CommandResult::failure(
            "campaign",
            "invalid_phone",
            format!("`{phone}` contains no digits"),
            2,
        );
    }

    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "campaign",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let runtime = match runtime() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "campaign",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let started = runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;

        let gateway = GatewayClient::new(&config.gateway)
            .map_err(|error| ("gateway_init", error.to_string(), 6u8))?;
        let calendar = HttpCalendarClient::from_config(&config.calendar)
            .map_err(|error| ("calendar_init", error.to_string(), 6u8))?;
        let llm: Arc<dyn LlmClient> = match HttpLlmClient::from_config(&config.llm) {
            Ok(client) => Arc::new(client),
            Err(_) => Arc::new(DisabledLlm),
        };

        let orchestrator = DialogueOrchestrator::new(
            Collaborators {
                leads: Arc::new(SqlLeadRepository::new(pool.clone())),
                turns: Arc::new(SqlTurnRepository::new(pool.clone())),
                bookings: Arc::new(SqlBookingRepository::new(pool.clone())),
                sessions: Arc::new(SqlSchedulingStateRepository::new(pool.clone())),
                calendar: Arc::new(calendar),
                notifier: Arc::new(gateway),
                llm,
                clock: Arc::new(SystemClock),
            },
            AvailabilityEngine::new(
                BusinessHours {
                    open_hour: config.scheduling.open_hour,
                    close_hour: config.scheduling.close_hour,
                    ..BusinessHours::default()
                },
                config.scheduling.grid_step_minutes,
                config.scheduling.max_slots,
            ),
            KnowledgeBase::load(Path::new("data/knowledge_base.md")),
            DialogueSettings::from_config(&config),
        );

        let started = orchestrator.start_campaign(&LeadId(digits.clone()), name, topic).await;
        pool.close().await;
        Ok::<bool, (&'static str, String, u8)>(started)
    });

    match started {
        Ok(true) => CommandResult::success("campaign", format!("campaign started for {digits}")),
        Ok(false) => CommandResult::failure(
            "campaign",
            "delivery",
            format!("opening message was not delivered to {digits}"),
            7,
        ),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("campaign", error_class, message, exit_code)
        }
    }
}
