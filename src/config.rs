use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Application configuration, layered from `config/{default,local}.toml` and
/// `APP__*` environment variables (highest precedence).
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub log_level: String,
    #[serde(default)]
    pub log_json: bool,

    /// Key material for the cart cookie and admin session signing. Must be at
    /// least 32 bytes.
    pub session_secret: String,
    #[serde(default = "default_session_ttl")]
    pub session_ttl_secs: u64,
    pub admin_username: String,
    /// Argon2 PHC-format hash of the admin password.
    pub admin_password_hash: String,

    /// `memory` or `sheets`.
    #[serde(default = "default_store_backend")]
    pub store_backend: String,
    #[serde(default)]
    pub sheets_spreadsheet_id: String,
    #[serde(default)]
    pub sheets_access_token: String,
    #[serde(default = "default_sheets_api_base")]
    pub sheets_api_base: String,

    #[serde(default)]
    pub flutterwave_secret_key: String,
    #[serde(default = "default_flutterwave_api_base")]
    pub flutterwave_api_base: String,
    /// Shared secret echoed by the gateway in the `verif-hash` webhook header.
    #[serde(default)]
    pub payment_webhook_secret: String,

    #[serde(default)]
    pub resend_api_key: String,
    #[serde(default = "default_resend_api_base")]
    pub resend_api_base: String,
    #[serde(default = "default_email_from")]
    pub email_from: String,
    /// Internal recipient for new-order and payment notifications.
    #[serde(default = "default_notification_email")]
    pub notification_email: String,

    pub public_base_url: String,
    #[serde(default = "default_order_prefix")]
    pub order_number_prefix: String,
    #[serde(default = "default_currency")]
    pub currency: String,

    #[serde(default)]
    pub cors_allowed_origins: Vec<String>,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_session_ttl() -> u64 {
    24 * 60 * 60
}

fn default_store_backend() -> String {
    "memory".to_string()
}

fn default_sheets_api_base() -> String {
    "https://sheets.googleapis.com/v4".to_string()
}

fn default_flutterwave_api_base() -> String {
    "https://api.flutterwave.com/v3".to_string()
}

fn default_resend_api_base() -> String {
    "https://api.resend.com".to_string()
}

fn default_email_from() -> String {
    "ATELIER <orders@atelier.co.ke>".to_string()
}

fn default_notification_email() -> String {
    "orders@atelier.co.ke".to_string()
}

fn default_order_prefix() -> String {
    "ATELIER".to_string()
}

fn default_currency() -> String {
    "KES".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

impl AppConfig {
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.session_secret.len() < 32 {
            return Err(ConfigError::Message(
                "session_secret must be at least 32 bytes".to_string(),
            ));
        }
        if self.store_backend != "memory" && self.store_backend != "sheets" {
            return Err(ConfigError::Message(format!(
                "unknown store_backend '{}'",
                self.store_backend
            )));
        }
        if self.store_backend == "sheets" && self.sheets_spreadsheet_id.is_empty() {
            return Err(ConfigError::Message(
                "sheets backend requires sheets_spreadsheet_id".to_string(),
            ));
        }
        Ok(())
    }
}

pub fn load_config() -> Result<AppConfig, ConfigError> {
    let config: AppConfig = Config::builder()
        .set_default("host", "0.0.0.0")?
        .set_default("port", 8080)?
        .set_default("environment", "development")?
        .set_default("log_level", "info")?
        .set_default("public_base_url", "http://localhost:8080")?
        .add_source(File::with_name("config/default").required(false))
        .add_source(File::with_name("config/local").required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?
        .try_deserialize()?;
    config.validate()?;
    Ok(config)
}

/// Installs the global tracing subscriber. JSON output in production,
/// human-readable elsewhere; `RUST_LOG` overrides the configured level.
pub fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    if config.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}
