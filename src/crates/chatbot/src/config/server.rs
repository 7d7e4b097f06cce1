//! Server configuration for chatbot-server
//!
//! Loads and parses chatbot-server.toml with server, database, auth,
//! provider, retry, data source and search settings. Every section has
//! defaults so the server starts without a config file.

use super::loader::load_toml_config;
use crate::executor::RetryConfig;
use llm::{ProviderKind, RemoteLlmConfig, GEMINI_BASE_URL, OPENAI_BASE_URL};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    ParseError(toml::de::Error),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.clone().filter(|v| !v.trim().is_empty())
}

/// Server identification and listen address
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerInfoConfig {
    /// Server name for identification (reported by health endpoints)
    pub name: String,
    pub host: String,
    pub port: u16,
}

impl Default for ServerInfoConfig {
    fn default() -> Self {
        Self {
            name: "chatbot-server".to_string(),
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite database file path
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "chatbot.db".to_string(),
        }
    }
}

/// Token authentication
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HS256 signing secret (can be overridden by JWT_SECRET)
    pub jwt_secret: Option<String>,
    pub token_ttl_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            token_ttl_secs: 24 * 60 * 60,
        }
    }
}

/// Settings for one chat provider. Unset fields take provider defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub timeout_secs: Option<u64>,
    pub organization: Option<String>,
}

impl ProviderConfig {
    fn api_key_env(kind: ProviderKind) -> &'static str {
        match kind {
            ProviderKind::OpenAi => "OPENAI_API_KEY",
            ProviderKind::Gemini => "GOOGLE_GEMINI_API_KEY",
        }
    }

    /// API key from the config file, else from the provider's env var.
    pub fn api_key(&self, kind: ProviderKind) -> Option<String> {
        non_empty(&self.api_key).or_else(|| env_non_empty(Self::api_key_env(kind)))
    }

    /// Client settings for `kind`, or `None` when no API key is available.
    pub fn remote_config(&self, kind: ProviderKind) -> Option<RemoteLlmConfig> {
        let api_key = self.api_key(kind)?;
        let (base_url, model, timeout) = match kind {
            ProviderKind::OpenAi => (OPENAI_BASE_URL, "gpt-4o-mini", 15),
            ProviderKind::Gemini => (GEMINI_BASE_URL, "gemini-2.5-flash", 60),
        };

        let mut config = RemoteLlmConfig::new(
            api_key,
            non_empty(&self.base_url).unwrap_or_else(|| base_url.to_string()),
            non_empty(&self.model).unwrap_or_else(|| model.to_string()),
        )
        .with_timeout(Duration::from_secs(self.timeout_secs.unwrap_or(timeout)));

        if let Some(org) = non_empty(&self.organization) {
            config = config.with_organization(org);
        }
        Some(config)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub openai: ProviderConfig,
    pub gemini: ProviderConfig,
}

impl ProvidersConfig {
    pub fn get(&self, kind: ProviderKind) -> &ProviderConfig {
        match kind {
            ProviderKind::OpenAi => &self.openai,
            ProviderKind::Gemini => &self.gemini,
        }
    }
}

/// Retry settings for the preferred and the fallback provider
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub primary: RetryConfig,
    pub fallback: RetryConfig,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            primary: RetryConfig::default(),
            fallback: RetryConfig::fallback_default(),
        }
    }
}

/// Where project data comes from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSourceKind {
    #[default]
    Sheets,
    Sql,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub source: DataSourceKind,
    /// Lifetime of the cached data snapshot
    pub cache_ttl_secs: u64,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            source: DataSourceKind::Sheets,
            cache_ttl_secs: 300,
        }
    }
}

/// Google Sheets data source
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SheetsConfig {
    /// Spreadsheet used as the `default` sheet (GOOGLE_SHEETS_PROJECT_DB)
    pub spreadsheet_id: Option<String>,
    /// API key for read access (GOOGLE_SHEETS_API_KEY)
    pub api_key: Option<String>,
    /// Service account key file (GOOGLE_SHEETS_CREDENTIALS_FILE)
    pub credentials_file: Option<String>,
    pub base_url: String,
    pub timeout_secs: u64,
    /// Extra named spreadsheets: name -> spreadsheet id
    pub additional: BTreeMap<String, String>,
}

impl Default for SheetsConfig {
    fn default() -> Self {
        Self {
            spreadsheet_id: None,
            api_key: None,
            credentials_file: None,
            base_url: "https://sheets.googleapis.com/v4".to_string(),
            timeout_secs: 30,
            additional: BTreeMap::new(),
        }
    }
}

impl SheetsConfig {
    pub fn spreadsheet_id(&self) -> Option<String> {
        non_empty(&self.spreadsheet_id).or_else(|| env_non_empty("GOOGLE_SHEETS_PROJECT_DB"))
    }

    pub fn api_key(&self) -> Option<String> {
        non_empty(&self.api_key).or_else(|| env_non_empty("GOOGLE_SHEETS_API_KEY"))
    }

    pub fn credentials_file(&self) -> Option<String> {
        non_empty(&self.credentials_file)
            .or_else(|| env_non_empty("GOOGLE_SHEETS_CREDENTIALS_FILE"))
    }

    /// Named spreadsheets: `default` plus the additional ones.
    pub fn sheets(&self) -> BTreeMap<String, String> {
        let mut sheets = self.additional.clone();
        if let Some(id) = self.spreadsheet_id() {
            sheets.insert("default".to_string(), id);
        }
        sheets
    }
}

/// SQL data source
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SqlConfig {
    /// sqlx SQLite URL of the database queried for answers
    pub url: String,
}

impl Default for SqlConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://projects.db".to_string(),
        }
    }
}

/// Google Custom Search
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub enabled: bool,
    pub api_key: Option<String>,
    pub engine_id: Option<String>,
    pub base_url: String,
    pub max_results: usize,
    pub retries: u32,
    pub cooldown_ms: u64,
    pub cache_ttl_secs: u64,
    pub timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_key: None,
            engine_id: None,
            base_url: "https://www.googleapis.com/customsearch/v1".to_string(),
            max_results: 5,
            retries: 3,
            cooldown_ms: 2000,
            cache_ttl_secs: 1800,
            timeout_secs: 10,
        }
    }
}

impl SearchConfig {
    pub fn api_key(&self) -> Option<String> {
        non_empty(&self.api_key).or_else(|| env_non_empty("GOOGLE_SEARCH_API_KEY"))
    }

    pub fn engine_id(&self) -> Option<String> {
        non_empty(&self.engine_id).or_else(|| env_non_empty("GOOGLE_SEARCH_ENGINE_ID"))
    }
}

/// Chat turn settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// History entries kept from a request
    pub history_limit: usize,
    /// Model used when neither request nor preferences choose one
    pub default_model: ProviderKind,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            history_limit: 50,
            default_model: ProviderKind::Gemini,
        }
    }
}

/// Complete server configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub server: ServerInfoConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub providers: ProvidersConfig,
    pub retry: RetrySettings,
    pub data: DataConfig,
    pub sheets: SheetsConfig,
    pub sql: SqlConfig,
    pub search: SearchConfig,
    pub chat: ChatConfig,
}

impl ServerConfig {
    /// Load configuration from a TOML file, expanding `${VAR:default}`
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ServerConfigError> {
        let config: Self = load_toml_config(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from TOML string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, ServerConfigError> {
        let config: Self = toml::from_str(content).map_err(ServerConfigError::ParseError)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from default location or environment
    ///
    /// Searches for config in:
    /// 1. CONFIG_PATH environment variable
    /// 2. ./config/chatbot-server.toml
    /// 3. ./chatbot-server.toml
    ///
    /// Falls back to defaults when no file exists.
    pub fn load() -> Result<Self, ServerConfigError> {
        if let Ok(config_path) = std::env::var("CONFIG_PATH") {
            return Self::from_file(config_path);
        }

        let paths = [
            PathBuf::from("config/chatbot-server.toml"),
            PathBuf::from("./chatbot-server.toml"),
        ];

        for path in &paths {
            if path.exists() {
                return Self::from_file(path);
            }
        }

        tracing::info!("No configuration file found, using defaults");
        Ok(Self::default())
    }

    fn validate(&self) -> Result<(), ServerConfigError> {
        if self.chat.history_limit == 0 {
            return Err(ServerConfigError::InvalidConfig(
                "chat.history_limit must be at least 1".to_string(),
            ));
        }
        if self.search.max_results == 0 {
            return Err(ServerConfigError::InvalidConfig(
                "search.max_results must be at least 1".to_string(),
            ));
        }
        if self.data.source == DataSourceKind::Sql && self.sql.url.trim().is_empty() {
            return Err(ServerConfigError::InvalidConfig(
                "sql.url is required when data.source = \"sql\"".to_string(),
            ));
        }
        Ok(())
    }

    /// Listen address, with HOST and PORT environment overrides
    pub fn bind_address(&self) -> String {
        let host = env_non_empty("HOST").unwrap_or_else(|| self.server.host.clone());
        let port = env_non_empty("PORT")
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(self.server.port);
        format!("{}:{}", host, port)
    }

    /// JWT signing secret, checking the JWT_SECRET environment variable first
    pub fn jwt_secret(&self) -> Option<String> {
        env_non_empty("JWT_SECRET").or_else(|| non_empty(&self.auth.jwt_secret))
    }

    /// Get database URL from configuration
    pub fn database_url(&self) -> String {
        format!("sqlite://{}", self.database.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_parsing() {
        let toml_content = r#"
[server]
name = "project-chat"
port = 9000

[database]
path = "chat.db"

[providers.openai]
api_key = "sk-test"
model = "gpt-4o"

[retry.fallback]
max_retries = 4

[data]
source = "sql"

[sql]
url = "sqlite://data.db"

[sheets]
spreadsheet_id = "sheet-1"

[sheets.additional]
archive = "sheet-2"

[chat]
default_model = "openai"
"#;

        let config = ServerConfig::from_str(toml_content).unwrap();
        assert_eq!(config.server.name, "project-chat");
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.database_url(), "sqlite://chat.db");
        assert_eq!(config.data.source, DataSourceKind::Sql);
        assert_eq!(config.retry.fallback.max_retries, 4);
        assert_eq!(config.retry.primary.max_retries, 3);
        assert_eq!(config.chat.default_model, ProviderKind::OpenAi);

        let openai = config
            .providers
            .openai
            .remote_config(ProviderKind::OpenAi)
            .unwrap();
        assert_eq!(openai.model, "gpt-4o");
        assert_eq!(openai.base_url, OPENAI_BASE_URL);
        assert_eq!(openai.timeout, Duration::from_secs(15));

        let sheets = config.sheets.sheets();
        assert_eq!(sheets.get("default").map(String::as_str), Some("sheet-1"));
        assert_eq!(sheets.get("archive").map(String::as_str), Some("sheet-2"));
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::from_str("").unwrap();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.data.cache_ttl_secs, 300);
        assert_eq!(config.search.cache_ttl_secs, 1800);
        assert_eq!(config.search.max_results, 5);
        assert_eq!(config.retry.fallback.initial_backoff_ms, 5000);
        assert_eq!(config.chat.history_limit, 50);
    }

    #[test]
    fn test_invalid_config() {
        let err = ServerConfig::from_str("[chat]\nhistory_limit = 0\n").unwrap_err();
        assert!(matches!(err, ServerConfigError::InvalidConfig(_)));

        let err = ServerConfig::from_str("[data]\nsource = \"oracle\"\n").unwrap_err();
        assert!(matches!(err, ServerConfigError::ParseError(_)));
    }
}
