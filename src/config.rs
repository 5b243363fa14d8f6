//! Configuration management for Agilow.
//!
//! Configuration can be set via environment variables:
//! - `HOST` - Optional. Server host. Defaults to `127.0.0.1`.
//! - `PORT` - Optional. Server port. Defaults to `3000`.
//! - `TRELLO_API_KEY` - Optional. Trello API key.
//! - `TRELLO_TOKEN` - Optional. Trello member token.
//! - `TRELLO_BOARD_ID` - Optional. Board the Trello backend works against.
//! - `LINEAR_API_KEY` - Optional. Linear personal API key.
//! - `LINEAR_TEAM_ID` - Optional. Team id or name; defaults to the first team.
//! - `ASANA_TOKEN` - Optional. Asana personal access token.
//! - `ASANA_PROJECT_ID` - Optional. Project the Asana backend works against.
//!
//! All backend credentials are optional at startup; a request naming a
//! platform whose credentials are absent (from both the request and the
//! environment) is rejected at the API layer.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

#[derive(Debug, Clone)]
pub struct TrelloConfig {
    pub api_key: String,
    pub token: String,
    pub board_id: String,
}

#[derive(Debug, Clone)]
pub struct LinearConfig {
    pub api_key: String,
    /// Team id or name; `None` picks the first team the key can see.
    pub team_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AsanaConfig {
    pub token: String,
    pub project_id: String,
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Trello credentials, if fully configured
    pub trello: Option<TrelloConfig>,

    /// Linear credentials, if configured
    pub linear: Option<LinearConfig>,

    /// Asana credentials, if fully configured
    pub asana: Option<AsanaConfig>,
}

/// Drop credential values that are blank or an obvious placeholder the
/// caller forgot to substitute ("undefined" from a JS client, "null",
/// "your-api-key-here" from a template).
pub fn clean_credential(raw: Option<&str>) -> Option<String> {
    let value = raw?.trim();
    if value.is_empty() {
        return None;
    }
    let lower = value.to_lowercase();
    if lower == "undefined" || lower == "null" || lower == "none" {
        return None;
    }
    if lower.starts_with("your-") || lower.starts_with("your_") {
        return None;
    }
    Some(value.to_string())
}

fn env(name: &str) -> Option<String> {
    clean_credential(std::env::var(name).ok().as_deref())
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if `PORT` is not a valid port
    /// number.
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());

        let port = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .map_err(|e| ConfigError::InvalidValue("PORT".to_string(), format!("{}", e)))?;

        let trello = match (env("TRELLO_API_KEY"), env("TRELLO_TOKEN"), env("TRELLO_BOARD_ID")) {
            (Some(api_key), Some(token), Some(board_id)) => Some(TrelloConfig {
                api_key,
                token,
                board_id,
            }),
            _ => None,
        };

        let linear = env("LINEAR_API_KEY").map(|api_key| LinearConfig {
            api_key,
            team_id: env("LINEAR_TEAM_ID"),
        });

        let asana = match (env("ASANA_TOKEN"), env("ASANA_PROJECT_ID")) {
            (Some(token), Some(project_id)) => Some(AsanaConfig { token, project_id }),
            _ => None,
        };

        Ok(Self {
            host,
            port,
            trello,
            linear,
            asana,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_credential_rejects_placeholders() {
        assert_eq!(clean_credential(None), None);
        assert_eq!(clean_credential(Some("")), None);
        assert_eq!(clean_credential(Some("   ")), None);
        assert_eq!(clean_credential(Some("undefined")), None);
        assert_eq!(clean_credential(Some("NULL")), None);
        assert_eq!(clean_credential(Some("your-api-key-here")), None);
        assert_eq!(
            clean_credential(Some("  abc123  ")),
            Some("abc123".to_string())
        );
    }
}
