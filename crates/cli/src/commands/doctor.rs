use secrecy::ExposeSecret;
use serde::Serialize;
use serde_json::json;

use leadflow_core::config::{AppConfig, LoadOptions};
use leadflow_db::connect_with_settings;

use crate::commands::runtime;

#[derive(Debug, Serialize)]
struct Check {
    name: &'static str,
    status: &'static str,
    detail: String,
}

/// Readiness probe: configuration, credentials, and database connectivity.
pub fn run(json_output: bool) -> String {
    let mut checks = Vec::new();

    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(Check {
                name: "config",
                status: "ok",
                detail: "configuration loaded and validated".to_string(),
            });
            Some(config)
        }
        Err(error) => {
            checks.push(Check { name: "config", status: "fail", detail: error.to_string() });
            None
        }
    };

    if let Some(config) = &config {
        let gateway_ready = !config.gateway.api_token.expose_secret().is_empty()
            && !config.gateway.instance_id.is_empty();
        checks.push(Check {
            name: "gateway_credentials",
            status: if gateway_ready { "ok" } else { "fail" },
            detail: if gateway_ready {
                "gateway token and instance id are set".to_string()
            } else {
                "gateway.api_token and gateway.instance_id must be configured".to_string()
            },
        });

        checks.push(Check {
            name: "llm_credentials",
            status: if config.llm.api_key.is_some() { "ok" } else { "warn" },
            detail: if config.llm.api_key.is_some() {
                "generative credential configured".to_string()
            } else {
                "no generative credential; dialogue degrades to scripted replies".to_string()
            },
        });

        match runtime() {
            Ok(runtime) => {
                let db_check = runtime.block_on(async {
                    match connect_with_settings(&config.database.url, 1, 5).await {
                        Ok(pool) => {
                            let probe =
                                sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(&pool).await;
                            pool.close().await;
                            match probe {
                                Ok(_) => ("ok", "database reachable".to_string()),
                                Err(error) => ("fail", format!("database probe failed: {error}")),
                            }
                        }
                        Err(error) => ("fail", format!("database connection failed: {error}")),
                    }
                });
                checks.push(Check {
                    name: "database",
                    status: db_check.0,
                    detail: db_check.1,
                });
            }
            Err(error) => {
                checks.push(Check {
                    name: "database",
                    status: "fail",
                    detail: format!("async runtime init failed: {error}"),
                });
            }
        }
    }

    let healthy = checks.iter().all(|check| check.status != "fail");

    if json_output {
        json!({
            "command": "doctor",
            "status": if healthy { "ok" } else { "error" },
            "checks": checks,
        })
        .to_string()
    } else {
        let mut lines = vec![format!(
            "leadflow doctor: {}",
            if healthy { "all checks passed" } else { "problems found" }
        )];
        for check in checks {
            lines.push(format!("  [{}] {} - {}", check.status, check.name, check.detail));
        }
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn doctor_reports_every_check_in_json_mode() {
        let output = super::run(true);
        let value: serde_json::Value = serde_json::from_str(&output).expect("valid json");
        let names: Vec<&str> = value["checks"]
            .as_array()
            .expect("checks array")
            .iter()
            .filter_map(|check| check["name"].as_str())
            .collect();
        assert!(names.contains(&"config"));
    }
}
