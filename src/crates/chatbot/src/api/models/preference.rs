use serde::Deserialize;

/// Raw strings so unknown values are reported as validation errors.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdatePreferencesRequest {
    #[serde(default)]
    pub theme: Option<String>,
    #[serde(default)]
    pub default_model: Option<String>,
}
