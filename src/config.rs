use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub widget: WidgetConfig,
    pub llm: LlmConfig,
    pub documents: DocumentsConfig,
    pub session: SessionConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WidgetConfig {
    pub title: String,
    pub greeting_message: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    pub provider: String,
    pub model: String,
    /// Overrides the provider's API host. Only used for Cohere.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Operator-configured key. Empty or the placeholder value means the
    /// widget has to supply one interactively.
    #[serde(default)]
    pub api_key: String,
    pub preamble: String,
    #[serde(default)]
    pub prompt_truncation: PromptTruncation,
    pub request_timeout_secs: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    /// Number of trailing transcript messages sent with each turn.
    /// Unset sends the whole transcript.
    #[serde(default)]
    pub history_window: Option<usize>,
}

impl LlmConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PromptTruncation {
    #[default]
    Auto,
    Off,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DocumentsConfig {
    pub chunk_size: usize,
    pub extract_timeout_secs: u64,
    pub default_location: String,
    pub locations: Vec<LocationConfig>,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct LocationConfig {
    pub name: String,
    pub path: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    /// Sessions untouched for this long are dropped with their transcript.
    pub idle_ttl_secs: u64,
    pub sweep_interval_secs: u64,
}

impl SessionConfig {
    pub fn idle_ttl(&self) -> Duration {
        Duration::from_secs(self.idle_ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_env(app_environment())
    }

    fn load_with_env(env: Environment) -> Result<Self, ConfigError> {
        let environment = std::env::var("RUN_ENV").unwrap_or_else(|_| "development".into());

        let config: AppConfig = Config::builder()
            .add_source(File::with_name("config/default"))
            .add_source(File::with_name(&format!("config/{environment}")).required(false))
            .add_source(env)
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.documents.chunk_size == 0 {
            return Err(ConfigError::Message(
                "documents.chunk_size must be greater than zero".to_string(),
            ));
        }

        if !self
            .documents
            .locations
            .iter()
            .any(|l| l.name == self.documents.default_location)
        {
            return Err(ConfigError::Message(format!(
                "documents.default_location '{}' is not one of the configured locations",
                self.documents.default_location
            )));
        }

        if self.session.sweep_interval_secs == 0 {
            return Err(ConfigError::Message(
                "session.sweep_interval_secs must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

fn app_environment() -> Environment {
    Environment::with_prefix("APP").separator("__")
}
