use serde_json::json;

use leadflow_core::config::{AppConfig, LoadOptions};
use leadflow_db::repositories::{LeadRepository, SqlLeadRepository};
use leadflow_db::connect_with_settings;

use crate::commands::{runtime, CommandResult};

/// Funnel conversion totals for operators.
pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "stats",
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
                "stats",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let stats = runtime.block_on(async {
        let pool = connect_with_settings(&config.database.url, 1, config.database.timeout_secs)
            .await
            .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
        let stats = SqlLeadRepository::new(pool.clone())
            .conversion_stats()
            .await
            .map_err(|error| ("query", error.to_string(), 5u8))?;
        pool.close().await;
        Ok::<_, (&'static str, String, u8)>(stats)
    });

    match stats {
        Ok(stats) => {
            let payload = json!({
                "command": "stats",
                "status": "ok",
                "total_leads": stats.total_leads,
                "contacted": stats.contacted,
                "qualified": stats.qualified,
                "scheduled": stats.scheduled,
                "converted": stats.converted,
                "contact_rate_pct": (stats.contact_rate() * 10.0).round() / 10.0,
                "conversion_rate_pct": (stats.conversion_rate() * 10.0).round() / 10.0,
            });
            CommandResult { exit_code: 0, output: payload.to_string() }
        }
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("stats", error_class, message, exit_code)
        }
    }
}
