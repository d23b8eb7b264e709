//! Configuration loading and validation.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub telemetry: TelemetryConfig,
    pub generation: GenerationConfig,
    pub logging: LoggingConfig,
    #[serde(default)]
    pub email: EmailConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

/// Telemetry source (InfluxDB 2.x) connection settings.
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    pub url: String,
    pub token: String,
    pub org: String,
    pub bucket: String,

    #[serde(default = "default_telemetry_timeout")]
    pub timeout_secs: u64,
}

/// Generation engine (Gemini) settings.
#[derive(Debug, Clone, Deserialize)]
pub struct GenerationConfig {
    pub api_key: String,

    #[serde(default = "default_generation_model")]
    pub model: String,

    #[serde(default = "default_generation_base_url")]
    pub base_url: String,

    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

/// Email delivery configuration for scheduled weekly reports.
#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    /// Whether email sending is enabled
    #[serde(default)]
    pub enabled: bool,

    /// Email provider: sendgrid, or console (for development)
    #[serde(default = "default_email_provider")]
    pub provider: String,

    /// SendGrid API key (for sendgrid provider)
    #[serde(default)]
    pub sendgrid_api_key: String,

    /// Sender email address (From header)
    #[serde(default = "default_sender_email")]
    pub sender_email: String,

    /// Sender name (From header)
    #[serde(default = "default_sender_name")]
    pub sender_name: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: default_email_provider(),
            sendgrid_api_key: String::new(),
            sender_email: default_sender_email(),
            sender_name: default_sender_name(),
        }
    }
}

// Default value functions
fn default_max_connections() -> u32 {
    20
}
fn default_min_connections() -> u32 {
    5
}
fn default_connect_timeout() -> u64 {
    10
}
fn default_idle_timeout() -> u64 {
    600
}
fn default_telemetry_timeout() -> u64 {
    30
}
fn default_generation_model() -> String {
    "gemini-2.0-flash-exp".to_string()
}
fn default_generation_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}
fn default_generation_timeout() -> u64 {
    120
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "json".to_string()
}
fn default_email_provider() -> String {
    "console".to_string()
}
fn default_sender_email() -> String {
    "reports@worktrace.app".to_string()
}
fn default_sender_name() -> String {
    "Worktrace Reports".to_string()
}

/// Configuration validation error
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Loading order (later sources override earlier):
    /// 1. config/default.toml - base configuration with defaults
    /// 2. config/local.toml - local overrides (optional, not in git)
    /// 3. Environment variables with WT__ prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        // Load .env overrides if present
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(config::Environment::with_prefix("WT").separator("__"))
            .build()?;

        let cfg: Self = config.try_deserialize()?;
        cfg.validate()
            .map_err(|e| config::ConfigError::Message(e.to_string()))?;
        Ok(cfg)
    }

    /// Rejects configurations that cannot possibly serve requests.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.database.url.is_empty() {
            return Err(ConfigValidationError::MissingRequired("database.url".into()));
        }
        if self.telemetry.url.is_empty() {
            return Err(ConfigValidationError::MissingRequired("telemetry.url".into()));
        }
        if self.telemetry.token.is_empty() {
            return Err(ConfigValidationError::MissingRequired(
                "telemetry.token".into(),
            ));
        }
        if self.telemetry.org.is_empty() {
            return Err(ConfigValidationError::MissingRequired("telemetry.org".into()));
        }
        if self.telemetry.bucket.is_empty() {
            return Err(ConfigValidationError::MissingRequired(
                "telemetry.bucket".into(),
            ));
        }
        if self.generation.api_key.is_empty() {
            return Err(ConfigValidationError::MissingRequired(
                "generation.api_key".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config {
            database: DatabaseConfig {
                url: "postgres://localhost/worktrace".to_string(),
                max_connections: default_max_connections(),
                min_connections: default_min_connections(),
                connect_timeout_secs: default_connect_timeout(),
                idle_timeout_secs: default_idle_timeout(),
            },
            telemetry: TelemetryConfig {
                url: "http://localhost:8086".to_string(),
                token: "token".to_string(),
                org: "worktrace".to_string(),
                bucket: "worktrace-metrics".to_string(),
                timeout_secs: default_telemetry_timeout(),
            },
            generation: GenerationConfig {
                api_key: "key".to_string(),
                model: default_generation_model(),
                base_url: default_generation_base_url(),
                timeout_secs: default_generation_timeout(),
            },
            logging: LoggingConfig {
                level: default_log_level(),
                format: default_log_format(),
            },
            email: EmailConfig::default(),
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(config().validate().is_ok());
    }

    #[test]
    fn test_missing_telemetry_token_rejected() {
        let mut cfg = config();
        cfg.telemetry.token = String::new();
        assert!(matches!(
            cfg.validate(),
            Err(ConfigValidationError::MissingRequired(field)) if field == "telemetry.token"
        ));
    }

    #[test]
    fn test_missing_generation_key_rejected() {
        let mut cfg = config();
        cfg.generation.api_key = String::new();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_email_defaults_to_console_disabled() {
        let email = EmailConfig::default();
        assert!(!email.enabled);
        assert_eq!(email.provider, "console");
    }
}
