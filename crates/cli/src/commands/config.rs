use serde_json::json;

use leadflow_core::config::{AppConfig, LoadOptions};

/// Prints the effective configuration with secrets redacted.
pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return json!({
                "command": "config",
                "status": "error",
                "message": format!("configuration issue: {error}"),
            })
            .to_string();
        }
    };

    let payload = json!({
        "command": "config",
        "status": "ok",
        "database": {
            "url": config.database.url,
            "max_connections": config.database.max_connections,
            "timeout_secs": config.database.timeout_secs,
        },
        "gateway": {
            "base_url": config.gateway.base_url,
            "api_token": "<redacted>",
            "instance_id": config.gateway.instance_id,
            "min_send_interval_secs": config.gateway.min_send_interval_secs,
        },
        "llm": {
            "api_key": if config.llm.api_key.is_some() { "<redacted>" } else { "<unset>" },
            "base_url": config.llm.base_url,
            "model": config.llm.model,
            "max_tokens": config.llm.max_tokens,
            "timeout_secs": config.llm.timeout_secs,
        },
        "calendar": {
            "base_url": config.calendar.base_url,
            "api_token": if config.calendar.api_token.is_some() { "<redacted>" } else { "<unset>" },
            "calendar_id": config.calendar.calendar_id,
        },
        "scheduling": {
            "horizon_days": config.scheduling.horizon_days,
            "meeting_duration_minutes": config.scheduling.meeting_duration_minutes,
            "open_hour": config.scheduling.open_hour,
            "close_hour": config.scheduling.close_hour,
            "grid_step_minutes": config.scheduling.grid_step_minutes,
            "max_slots": config.scheduling.max_slots,
            "snapshot_cap": config.scheduling.snapshot_cap,
            "snapshot_ttl_minutes": config.scheduling.snapshot_ttl_minutes,
        },
        "dialogue": {
            "history_window": config.dialogue.history_window,
            "campaign_source": config.dialogue.campaign_source,
        },
        "server": {
            "bind_address": config.server.bind_address,
            "port": config.server.port,
        },
        "logging": {
            "level": config.logging.level,
            "format": format!("{:?}", config.logging.format).to_lowercase(),
        },
    });

    serde_json::to_string_pretty(&payload).unwrap_or_else(|_| payload.to_string())
}

#[cfg(test)]
mod tests {
    #[test]
    fn output_never_leaks_secrets() {
        let output = super::run();
        assert!(!output.to_lowercase().contains("token\": \"sk"), "secrets must be redacted");
        assert!(output.contains("\"command\": \"config\"") || output.contains("\"command\":\"config\""));
    }
}
