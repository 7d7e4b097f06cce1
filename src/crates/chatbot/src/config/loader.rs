//! TOML configuration loader with environment variable support
//!
//! String values may reference the environment as `${ENV_VAR}` or
//! `${ENV_VAR:default}`. Expansion happens after parsing so substituted
//! values can never break the TOML syntax.

use super::server::ServerConfigError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use std::env;
use std::fs;
use std::path::Path;
use toml::Value;

static ENV_PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{([^:}]+)(?::([^}]*))?\}").unwrap());

/// Load a TOML file and expand environment placeholders in its strings
pub fn load_toml_file<P: AsRef<Path>>(path: P) -> Result<Value, ServerConfigError> {
    let content = fs::read_to_string(path.as_ref()).map_err(ServerConfigError::ReadError)?;
    let mut value: Value = toml::from_str(&content).map_err(ServerConfigError::ParseError)?;
    expand_variables(&mut value);
    Ok(value)
}

/// Load and deserialize a TOML file into a specific type
pub fn load_toml_config<T: DeserializeOwned, P: AsRef<Path>>(
    path: P,
) -> Result<T, ServerConfigError> {
    let value = load_toml_file(path)?;
    value.try_into().map_err(ServerConfigError::ParseError)
}

/// Expand `${ENV:default}` placeholders in every string value
pub fn expand_variables(value: &mut Value) {
    match value {
        Value::String(s) => {
            if let Some(expanded) = expand_env_in_string(s) {
                *s = expanded;
            }
        }
        Value::Table(table) => {
            for (_, v) in table.iter_mut() {
                expand_variables(v);
            }
        }
        Value::Array(items) => {
            for item in items.iter_mut() {
                expand_variables(item);
            }
        }
        _ => {}
    }
}

/// Expand environment variables in a string
///
/// Supports syntax: ${ENV_VAR} and ${ENV_VAR:default_value}
fn expand_env_in_string(s: &str) -> Option<String> {
    if !s.contains("${") {
        return None;
    }

    let expanded = ENV_PLACEHOLDER.replace_all(s, |caps: &regex::Captures<'_>| {
        let default_value = caps.get(2).map(|m| m.as_str()).unwrap_or("");
        env::var(&caps[1]).unwrap_or_else(|_| default_value.to_string())
    });
    Some(expanded.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    #[serial]
    fn test_expand_env_in_string() {
        env::set_var("CHATBOT_TEST_VAR", "test_value");

        let result = expand_env_in_string("prefix ${CHATBOT_TEST_VAR} suffix");
        assert_eq!(result, Some("prefix test_value suffix".to_string()));

        env::remove_var("CHATBOT_TEST_VAR");
    }

    #[test]
    fn test_expand_env_with_default() {
        let result = expand_env_in_string("value: ${CHATBOT_MISSING_VAR:default_val}");
        assert_eq!(result, Some("value: default_val".to_string()));
        assert_eq!(expand_env_in_string("plain"), None);
    }

    #[test]
    #[serial]
    fn test_load_toml_file() -> Result<(), Box<dyn std::error::Error>> {
        env::set_var("CHATBOT_TEST_DB", "from-env.db");

        let mut temp_file = NamedTempFile::new()?;
        write!(
            temp_file,
            r#"
[database]
path = "${{CHATBOT_TEST_DB:fallback.db}}"

[server]
name = "${{CHATBOT_UNSET_NAME:chat}}"
port = 8100
"#
        )?;

        let value = load_toml_file(temp_file.path())?;
        assert_eq!(value["database"]["path"].as_str(), Some("from-env.db"));
        assert_eq!(value["server"]["name"].as_str(), Some("chat"));
        assert_eq!(value["server"]["port"].as_integer(), Some(8100));

        env::remove_var("CHATBOT_TEST_DB");
        Ok(())
    }

    #[test]
    fn test_unquoted_placeholder_is_not_expanded() -> Result<(), Box<dyn std::error::Error>> {
        let mut temp_file = NamedTempFile::new()?;
        write!(temp_file, "[server]\nport = ${{CHATBOT_TEST_PORT:9000}}\n")?;

        assert!(matches!(
            load_toml_file(temp_file.path()),
            Err(ServerConfigError::ParseError(_))
        ));
        Ok(())
    }
}
