use thiserror::Error;

use crate::api::DEFAULT_API_URL;

pub const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error", "off"];
pub const DEFAULT_LOG_LEVEL: &str = "info";

pub const ENV_API_KEY: &str = "KATAPULT_API_KEY";
pub const ENV_API_URL: &str = "KATAPULT_API_URL";
pub const ENV_DEBUG_API_URL: &str = "KATAPULT_TF_DEBUG_API_URL";
pub const ENV_ORGANIZATION: &str = "KATAPULT_ORGANIZATION";
pub const ENV_DATA_CENTER: &str = "KATAPULT_DATA_CENTER";
pub const ENV_SKIP_TRASH_OBJECT_PURGE: &str = "KATAPULT_SKIP_TRASH_OBJECT_PURGE";
pub const ENV_LOG_LEVEL: &str = "KATAPULT_LOG_LEVEL";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("`{attribute}` must be set in the provider configuration or with the `{env}` environment variable")]
    Missing {
        attribute: &'static str,
        env: &'static str,
    },

    #[error("invalid log level `{0}`, expected one of: trace, debug, info, warn, error, off")]
    InvalidLogLevel(String),
}

impl ConfigError {
    /// Provider attribute the error relates to
    pub fn attribute(&self) -> &'static str {
        match self {
            Self::Missing { attribute, .. } => attribute,
            Self::InvalidLogLevel(_) => "log_level",
        }
    }
}

/// Values explicitly given in the provider block
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigInput {
    pub api_key: Option<String>,
    pub api_url: Option<String>,
    pub organization: Option<String>,
    pub data_center: Option<String>,
    pub skip_trash_object_purge: Option<bool>,
    pub log_level: Option<String>,
}

/// Resolved provider configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub api_key: String,
    pub api_url: String,
    pub organization: String,
    pub data_center: String,
    pub skip_trash_object_purge: bool,
    pub log_level: String,
}

/// Environment truthy values
pub fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on" | "y" | "t"
    )
}

pub fn validate_log_level(level: &str) -> Result<(), ConfigError> {
    if LOG_LEVELS.contains(&level.to_ascii_lowercase().as_str()) {
        Ok(())
    } else {
        Err(ConfigError::InvalidLogLevel(level.to_owned()))
    }
}

impl Config {
    /// Resolve the configuration, explicit values taking precedence over the environment
    pub fn resolve<E>(input: ConfigInput, env: E) -> Result<Self, Vec<ConfigError>>
    where
        E: Fn(&str) -> Option<String>,
    {
        let env = |name: &str| env(name).filter(|value| !value.is_empty());
        let explicit = |value: Option<String>| value.filter(|value| !value.is_empty());
        let mut errors = Vec::new();

        let mut required = |value: Option<String>, attribute: &'static str, var: &'static str| {
            match explicit(value).or_else(|| env(var)) {
                Some(value) => value,
                None => {
                    errors.push(ConfigError::Missing {
                        attribute,
                        env: var,
                    });
                    String::new()
                }
            }
        };

        let api_key = required(input.api_key, "api_key", ENV_API_KEY);
        let organization = required(input.organization, "organization", ENV_ORGANIZATION);
        let data_center = required(input.data_center, "data_center", ENV_DATA_CENTER);

        let api_url = explicit(input.api_url)
            .or_else(|| env(ENV_API_URL))
            .or_else(|| env(ENV_DEBUG_API_URL))
            .unwrap_or_else(|| String::from(DEFAULT_API_URL));

        let skip_trash_object_purge = input
            .skip_trash_object_purge
            .or_else(|| env(ENV_SKIP_TRASH_OBJECT_PURGE).map(|value| parse_bool(&value)))
            .unwrap_or(false);

        let log_level = explicit(input.log_level)
            .or_else(|| env(ENV_LOG_LEVEL))
            .unwrap_or_else(|| String::from(DEFAULT_LOG_LEVEL))
            .to_ascii_lowercase();
        if let Err(err) = validate_log_level(&log_level) {
            errors.push(err);
        }

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(Self {
            api_key,
            api_url,
            organization,
            data_center,
            skip_trash_object_purge,
            log_level,
        })
    }

    pub fn from_env(input: ConfigInput) -> Result<Self, Vec<ConfigError>> {
        Self::resolve(input, |name| std::env::var(name).ok())
    }
}
