use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub gateway: GatewayConfig,
    pub llm: LlmConfig,
    pub calendar: CalendarConfig,
    pub scheduling: SchedulingConfig,
    pub dialogue: DialogueConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

/// Messaging-gateway credentials (static bearer token; no refresh flow).
#[derive(Clone, Debug)]
pub struct GatewayConfig {
    pub base_url: String,
    pub api_token: SecretString,
    pub instance_id: String,
    pub min_send_interval_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub api_key: Option<SecretString>,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct CalendarConfig {
    pub base_url: String,
    pub api_token: Option<SecretString>,
    pub calendar_id: String,
}

#[derive(Clone, Debug)]
pub struct SchedulingConfig {
    pub horizon_days: u32,
    pub meeting_duration_minutes: u32,
    pub open_hour: u32,
    pub close_hour: u32,
    pub grid_step_minutes: u32,
    pub max_slots: usize,
    pub snapshot_cap: usize,
    pub snapshot_ttl_minutes: u32,
}

#[derive(Clone, Debug)]
pub struct DialogueConfig {
    /// How many recent turns the stage classifier reads.
    pub history_window: usize,
    /// Acquisition source recorded on leads created by campaigns.
    pub campaign_source: String,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub gateway_api_token: Option<String>,
    pub gateway_instance_id: Option<String>,
    pub llm_api_key: Option<String>,
    pub llm_model: Option<String>,
    pub calendar_api_token: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://leadflow.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            gateway: GatewayConfig {
                base_url: "https://gateway.example.invalid".to_string(),
                api_token: String::new().into(),
                instance_id: String::new(),
                min_send_interval_secs: 5,
            },
            llm: LlmConfig {
                api_key: None,
                base_url: "https://api.anthropic.com".to_string(),
                model: "claude-3-5-sonnet-latest".to_string(),
                max_tokens: 180,
                timeout_secs: 10,
            },
            calendar: CalendarConfig {
                base_url: "https://calendar.example.invalid".to_string(),
                api_token: None,
                calendar_id: "primary".to_string(),
            },
            scheduling: SchedulingConfig {
                horizon_days: 7,
                meeting_duration_minutes: 30,
                open_hour: 9,
                close_hour: 18,
                grid_step_minutes: 30,
                max_slots: 10,
                snapshot_cap: 5,
                snapshot_ttl_minutes: 240,
            },
            dialogue: DialogueConfig {
                history_window: 6,
                campaign_source: "post_seminar".to_string(),
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("leadflow.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }
        if let Some(gateway) = patch.gateway {
            if let Some(base_url) = gateway.base_url {
                self.gateway.base_url = base_url;
            }
            if let Some(api_token) = gateway.api_token {
                self.gateway.api_token = api_token.into();
            }
            if let Some(instance_id) = gateway.instance_id {
                self.gateway.instance_id = instance_id;
            }
            if let Some(interval) = gateway.min_send_interval_secs {
                self.gateway.min_send_interval_secs = interval;
            }
        }
        if let Some(llm) = patch.llm {
            if let Some(api_key) = llm.api_key {
                self.llm.api_key = Some(api_key.into());
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = base_url;
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(max_tokens) = llm.max_tokens {
                self.llm.max_tokens = max_tokens;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
        }
        if let Some(calendar) = patch.calendar {
            if let Some(base_url) = calendar.base_url {
                self.calendar.base_url = base_url;
            }
            if let Some(api_token) = calendar.api_token {
                self.calendar.api_token = Some(api_token.into());
            }
            if let Some(calendar_id) = calendar.calendar_id {
                self.calendar.calendar_id = calendar_id;
            }
        }
        if let Some(scheduling) = patch.scheduling {
            if let Some(horizon_days) = scheduling.horizon_days {
                self.scheduling.horizon_days = horizon_days;
            }
            if let Some(duration) = scheduling.meeting_duration_minutes {
                self.scheduling.meeting_duration_minutes = duration;
            }
            if let Some(open_hour) = scheduling.open_hour {
                self.scheduling.open_hour = open_hour;
            }
            if let Some(close_hour) = scheduling.close_hour {
                self.scheduling.close_hour = close_hour;
            }
            if let Some(grid) = scheduling.grid_step_minutes {
                self.scheduling.grid_step_minutes = grid;
            }
            if let Some(max_slots) = scheduling.max_slots {
                self.scheduling.max_slots = max_slots;
            }
            if let Some(snapshot_cap) = scheduling.snapshot_cap {
                self.scheduling.snapshot_cap = snapshot_cap;
            }
            if let Some(ttl) = scheduling.snapshot_ttl_minutes {
                self.scheduling.snapshot_ttl_minutes = ttl;
            }
        }
        if let Some(dialogue) = patch.dialogue {
            if let Some(history_window) = dialogue.history_window {
                self.dialogue.history_window = history_window;
            }
            if let Some(campaign_source) = dialogue.campaign_source {
                self.dialogue.campaign_source = campaign_source;
            }
        }
        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }
        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(url) = env::var("LEADFLOW_DATABASE_URL") {
            self.database.url = url;
        }
        if let Ok(level) = env::var("LEADFLOW_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = env::var("LEADFLOW_LOG_FORMAT") {
            self.logging.format = format.parse().map_err(|_| ConfigError::InvalidEnvOverride {
                key: "LEADFLOW_LOG_FORMAT".to_string(),
                value: format,
            })?;
        }
        if let Ok(base_url) = env::var("LEADFLOW_GATEWAY_BASE_URL") {
            self.gateway.base_url = base_url;
        }
        if let Ok(token) = env::var("LEADFLOW_GATEWAY_API_TOKEN") {
            self.gateway.api_token = token.into();
        }
        if let Ok(instance_id) = env::var("LEADFLOW_GATEWAY_INSTANCE_ID") {
            self.gateway.instance_id = instance_id;
        }
        if let Ok(api_key) = env::var("LEADFLOW_LLM_API_KEY") {
            if !api_key.is_empty() {
                self.llm.api_key = Some(api_key.into());
            }
        }
        if let Ok(model) = env::var("LEADFLOW_LLM_MODEL") {
            self.llm.model = model;
        }
        if let Ok(base_url) = env::var("LEADFLOW_CALENDAR_BASE_URL") {
            self.calendar.base_url = base_url;
        }
        if let Ok(token) = env::var("LEADFLOW_CALENDAR_API_TOKEN") {
            if !token.is_empty() {
                self.calendar.api_token = Some(token.into());
            }
        }
        if let Ok(calendar_id) = env::var("LEADFLOW_CALENDAR_ID") {
            self.calendar.calendar_id = calendar_id;
        }
        if let Ok(port) = env::var("LEADFLOW_SERVER_PORT") {
            self.server.port = port.parse().map_err(|_| ConfigError::InvalidEnvOverride {
                key: "LEADFLOW_SERVER_PORT".to_string(),
                value: port,
            })?;
        }
        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(url) = overrides.database_url {
            self.database.url = url;
        }
        if let Some(level) = overrides.log_level {
            self.logging.level = level;
        }
        if let Some(token) = overrides.gateway_api_token {
            self.gateway.api_token = token.into();
        }
        if let Some(instance_id) = overrides.gateway_instance_id {
            self.gateway.instance_id = instance_id;
        }
        if let Some(api_key) = overrides.llm_api_key {
            self.llm.api_key = Some(api_key.into());
        }
        if let Some(model) = overrides.llm_model {
            self.llm.model = model;
        }
        if let Some(token) = overrides.calendar_api_token {
            self.calendar.api_token = Some(token.into());
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let mut problems = Vec::new();

        if self.database.url.trim().is_empty() {
            problems.push("database.url must not be empty".to_string());
        }
        if self.gateway.base_url.trim().is_empty() {
            problems.push("gateway.base_url must not be empty".to_string());
        }
        if self.llm.model.trim().is_empty() {
            problems.push("llm.model must not be empty".to_string());
        }
        if !(1..=60).contains(&self.llm.timeout_secs) {
            problems.push("llm.timeout_secs must be between 1 and 60".to_string());
        }
        if self.calendar.base_url.trim().is_empty() {
            problems.push("calendar.base_url must not be empty".to_string());
        }
        if self.calendar.calendar_id.trim().is_empty() {
            problems.push("calendar.calendar_id must not be empty".to_string());
        }
        if self.scheduling.open_hour >= self.scheduling.close_hour {
            problems.push("scheduling.open_hour must be before scheduling.close_hour".to_string());
        }
        if self.scheduling.close_hour > 24 {
            problems.push("scheduling.close_hour must be at most 24".to_string());
        }
        if self.scheduling.meeting_duration_minutes == 0 {
            problems.push("scheduling.meeting_duration_minutes must be positive".to_string());
        }
        if !(5..=120).contains(&self.scheduling.grid_step_minutes) {
            problems.push("scheduling.grid_step_minutes must be between 5 and 120".to_string());
        }
        if !(1..=30).contains(&self.scheduling.horizon_days) {
            problems.push("scheduling.horizon_days must be between 1 and 30".to_string());
        }
        if self.scheduling.max_slots == 0 || self.scheduling.max_slots > 20 {
            problems.push("scheduling.max_slots must be between 1 and 20".to_string());
        }
        if self.scheduling.snapshot_cap == 0
            || self.scheduling.snapshot_cap > self.scheduling.max_slots
        {
            problems
                .push("scheduling.snapshot_cap must be between 1 and scheduling.max_slots".to_string());
        }
        if self.scheduling.snapshot_ttl_minutes < 5 {
            problems.push("scheduling.snapshot_ttl_minutes must be at least 5".to_string());
        }
        if !(2..=50).contains(&self.dialogue.history_window) {
            problems.push("dialogue.history_window must be between 2 and 50".to_string());
        }
        if self.server.port == 0 {
            problems.push("server.port must not be zero".to_string());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(problems.join("; ")))
        }
    }
}

fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    if let Ok(from_env) = env::var("LEADFLOW_CONFIG") {
        return Some(PathBuf::from(from_env));
    }
    let default = PathBuf::from("leadflow.toml");
    default.exists().then_some(default)
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;
    let interpolated = interpolate_env(&raw)?;
    toml::from_str(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

/// Replaces `${VAR}` expressions with the named environment variable.
fn interpolate_env(content: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(content.len());
    let mut rest = content;

    while let Some(start) = rest.find("${") {
        output.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            return Err(ConfigError::UnterminatedInterpolation);
        };
        let var = &after[..end];
        let value = env::var(var)
            .map_err(|_| ConfigError::MissingEnvInterpolation { var: var.to_string() })?;
        output.push_str(&value);
        rest = &after[end + 1..];
    }
    output.push_str(rest);
    Ok(output)
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    gateway: Option<GatewayPatch>,
    llm: Option<LlmPatch>,
    calendar: Option<CalendarPatch>,
    scheduling: Option<SchedulingPatch>,
    dialogue: Option<DialoguePatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct GatewayPatch {
    base_url: Option<String>,
    api_token: Option<String>,
    instance_id: Option<String>,
    min_send_interval_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    max_tokens: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct CalendarPatch {
    base_url: Option<String>,
    api_token: Option<String>,
    calendar_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SchedulingPatch {
    horizon_days: Option<u32>,
    meeting_duration_minutes: Option<u32>,
    open_hour: Option<u32>,
    close_hour: Option<u32>,
    grid_step_minutes: Option<u32>,
    max_slots: Option<usize>,
    snapshot_cap: Option<usize>,
    snapshot_ttl_minutes: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct DialoguePatch {
    history_window: Option<usize>,
    campaign_source: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
