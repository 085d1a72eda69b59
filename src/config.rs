use crate::error::{AppError, Result};
use crate::parameter::Pollutant;
use serde::{Deserialize, Deserializer};
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub source: SourceConfig,
    #[serde(default)]
    pub defaults: RequestDefaults,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    pub base_url: String,
    #[serde(default = "default_query_type")]
    pub query_type: String,
    #[serde(default = "default_timeout", deserialize_with = "deserialize_u64")]
    pub timeout_seconds: u64,
    #[serde(default = "default_max_retries", deserialize_with = "deserialize_u32")]
    pub max_retries: u32,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_query_type() -> String {
    "HORARIO".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_user_agent() -> String {
    concat!("aire-ingest/", env!("CARGO_PKG_VERSION")).to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct RequestDefaults {
    #[serde(default = "default_parameter")]
    pub parameter: String,
    #[serde(default)]
    pub station: Option<String>,
}

impl Default for RequestDefaults {
    fn default() -> Self {
        Self {
            parameter: default_parameter(),
            station: None,
        }
    }
}

fn default_parameter() -> String {
    Pollutant::O3.code().to_string()
}

/// Numbers may arrive as strings after `${VAR}` substitution.
///
/// Accepts:
/// - `timeout_seconds: 30` (number)
/// - `timeout_seconds: "30"` (string that parses to number)
#[derive(Deserialize)]
#[serde(untagged)]
enum NumberValue {
    Number(u64),
    String(String),
}

impl NumberValue {
    fn into_u64<E: serde::de::Error>(self) -> std::result::Result<u64, E> {
        match self {
            NumberValue::Number(n) => Ok(n),
            NumberValue::String(s) => s
                .trim()
                .parse::<u64>()
                .map_err(|_| E::custom(format!("Invalid number: '{}'", s))),
        }
    }
}

fn deserialize_u64<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    NumberValue::deserialize(deserializer)?.into_u64()
}

fn deserialize_u32<'de, D>(deserializer: D) -> std::result::Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let n = NumberValue::deserialize(deserializer)?.into_u64::<D::Error>()?;
    u32::try_from(n).map_err(|_| serde::de::Error::custom(format!("Number {} out of range", n)))
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| AppError::Config(format!("Failed to read config file: {}", e)))?;

        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        // Substitute environment variables
        let expanded = expand_env_vars(content)?;

        let config: Config = serde_yaml::from_str(&expanded)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    ///
    /// Checks for:
    /// - Valid http(s) base URL
    /// - Non-empty query type and default parameter
    /// - Positive timeout and a sane retry count
    fn validate(&self) -> Result<()> {
        let parsed = url::Url::parse(&self.source.base_url).map_err(|e| {
            AppError::Config(format!(
                "Invalid source base_url '{}': {}",
                self.source.base_url, e
            ))
        })?;

        if parsed.scheme() != "https" && parsed.scheme() != "http" {
            return Err(AppError::Config(format!(
                "Source base_url must use http or https, got: {}",
                parsed.scheme()
            )));
        }

        if parsed.scheme() == "http" {
            tracing::warn!(
                "Source base_url {} is not HTTPS; responses are unauthenticated",
                self.source.base_url
            );
        }

        if self.source.query_type.trim().is_empty() {
            return Err(AppError::Config(
                "Source query_type cannot be empty".to_string(),
            ));
        }

        if self.source.timeout_seconds == 0 {
            return Err(AppError::Config(
                "Source timeout_seconds must be greater than 0".to_string(),
            ));
        }

        if self.source.max_retries > 10 {
            return Err(AppError::Config(format!(
                "Source max_retries {} seems too high, maximum is 10",
                self.source.max_retries
            )));
        }

        if self.defaults.parameter.trim().is_empty() {
            return Err(AppError::Config(
                "Default parameter cannot be empty".to_string(),
            ));
        }

        if Pollutant::from_code(&self.defaults.parameter).is_none() {
            tracing::warn!(
                "Default parameter '{}' has no category table; ozone breakpoints will be used",
                self.defaults.parameter
            );
        }

        Ok(())
    }
}

/// Substitute `${NAME}` placeholders from the environment. `${NAME:-value}`
/// falls back to `value` when `NAME` is unset; every other unset name is
/// collected into one error.
fn expand_env_vars(content: &str) -> Result<String> {
    let re = regex_lite::Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}")
        .map_err(|e| AppError::Config(format!("Invalid placeholder pattern: {}", e)))?;

    let mut missing: Vec<String> = Vec::new();
    let expanded = re.replace_all(content, |caps: &regex_lite::Captures<'_>| {
        let name = &caps[1];
        match (std::env::var(name), caps.get(2)) {
            (Ok(value), _) => value,
            (Err(_), Some(fallback)) => fallback.as_str().to_string(),
            (Err(_), None) => {
                if !missing.iter().any(|m| m == name) {
                    missing.push(name.to_string());
                }
                String::new()
            }
        }
    });

    if missing.is_empty() {
        return Ok(expanded.into_owned());
    }

    Err(AppError::Config(format!(
        "Unset environment variable(s) in config: {}. Export them or add them to .env (see .env.example)",
        missing.join(", ")
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let yaml = r#"
source:
  base_url: https://aire.example.gob.mx/reportes/horario.php
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.source.query_type, "HORARIO");
        assert_eq!(config.source.timeout_seconds, 30);
        assert_eq!(config.source.max_retries, 3);
        assert!(config.source.user_agent.starts_with("aire-ingest/"));
        assert_eq!(config.defaults.parameter, "o3");
        assert_eq!(config.defaults.station, None);
    }

    #[test]
    fn test_timeout_deserialize_from_string() {
        let yaml = r#"
base_url: https://aire.example.gob.mx/
timeout_seconds: "45"
max_retries: "2"
"#;
        let source: SourceConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(source.timeout_seconds, 45);
        assert_eq!(source.max_retries, 2);
    }

    #[test]
    fn test_timeout_deserialize_invalid_string() {
        let yaml = r#"
base_url: https://aire.example.gob.mx/
timeout_seconds: "soon"
"#;
        let result: std::result::Result<SourceConfig, _> = serde_yaml::from_str(yaml);
        assert!(result.is_err());
    }

    #[test]
    fn test_rejects_non_http_scheme() {
        let yaml = r#"
source:
  base_url: ftp://aire.example.gob.mx/
"#;
        let err = Config::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("http or https"));
    }

    #[test]
    fn test_rejects_zero_timeout() {
        let yaml = r#"
source:
  base_url: https://aire.example.gob.mx/
  timeout_seconds: 0
"#;
        assert!(Config::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_missing_env_var_is_reported() {
        let yaml = r#"
source:
  base_url: ${AIRE_INGEST_TEST_UNSET_VARIABLE}
"#;
        let err = Config::from_yaml(yaml).unwrap_err();
        assert!(err
            .to_string()
            .contains("AIRE_INGEST_TEST_UNSET_VARIABLE"));
    }

    #[test]
    fn test_env_placeholders_expand_with_fallback() {
        std::env::set_var("AIRE_INGEST_TEST_QUERY_TYPE", "DIARIO");
        let expanded = expand_env_vars(
            "a: ${AIRE_INGEST_TEST_QUERY_TYPE}\nb: ${AIRE_INGEST_TEST_UNSET_WITH_FALLBACK:-30}\n",
        )
        .unwrap();
        assert_eq!(expanded, "a: DIARIO\nb: 30\n");
    }

    #[test]
    fn test_missing_env_vars_listed_once() {
        let err = expand_env_vars(
            "a: ${AIRE_INGEST_TEST_UNSET_ONE}\nb: ${AIRE_INGEST_TEST_UNSET_ONE}\nc: ${AIRE_INGEST_TEST_UNSET_TWO}",
        )
        .unwrap_err();
        let message = err.to_string();
        assert_eq!(message.matches("AIRE_INGEST_TEST_UNSET_ONE").count(), 1);
        assert!(message.contains("AIRE_INGEST_TEST_UNSET_TWO"));
    }
}
