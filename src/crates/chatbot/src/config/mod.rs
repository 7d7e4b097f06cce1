//! Configuration module for the chatbot server
//!
//! TOML configuration with environment variable expansion.

pub mod loader;
pub mod server;

pub use loader::{expand_variables, load_toml_config, load_toml_file};
pub use server::{
    AuthConfig, ChatConfig, DataConfig, DataSourceKind, DatabaseConfig, ProviderConfig,
    ProvidersConfig, RetrySettings, SearchConfig, ServerConfig, ServerConfigError,
    ServerInfoConfig, SheetsConfig, SqlConfig,
};
