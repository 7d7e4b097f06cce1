use serde::{Deserialize, Serialize};

/// Which integrations have credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrationStatus {
    pub openai: bool,
    pub gemini: bool,
    pub search: bool,
    pub sheets: bool,
    pub data_source: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub database: String,
    pub server: String,
    pub version: String,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub integrations: Option<IntegrationStatus>,
}

impl HealthResponse {
    pub fn new(status: impl Into<String>, database: impl Into<String>, server: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            database: database.into(),
            server: server.into(),
            version: crate::version::VERSION.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            integrations: None,
        }
    }

    pub fn with_integrations(mut self, integrations: IntegrationStatus) -> Self {
        self.integrations = Some(integrations);
        self
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectQuery {
    pub project: Option<String>,
    pub sheet: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SheetQuery {
    pub sheet: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchMetricsQuery {
    /// `YYYYMMDD`, today when absent
    pub date: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClearSearchCacheQuery {
    pub query: Option<String>,
}
