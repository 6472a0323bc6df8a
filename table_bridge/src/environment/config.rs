//! Deployment environment configuration.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Connection settings for one deployment environment (PRD, UAT, STG, ...).
///
/// The same client code serves every environment; only these values differ.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    /// Short upper-case name, e.g. `PRD`
    pub name: String,
    pub base_url: String,
    /// Bearer token, supplied from the process environment
    pub token: String,
    pub game_code: String,
}

impl EnvironmentConfig {
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        token: impl Into<String>,
        game_code: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into().to_ascii_uppercase(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            game_code: game_code.into(),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.name.is_empty() {
            return Err("Environment name must not be empty".to_string());
        }

        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(format!(
                "{}: base URL must start with http:// or https://",
                self.name
            ));
        }

        if self.token.is_empty() {
            return Err(format!("{}: token must not be empty", self.name));
        }

        if self.game_code.is_empty() {
            return Err(format!("{}: game code must not be empty", self.name));
        }

        Ok(())
    }
}

// Tokens never end up in logs
impl fmt::Debug for EnvironmentConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvironmentConfig")
            .field("name", &self.name)
            .field("base_url", &self.base_url)
            .field("token", &"<redacted>")
            .field("game_code", &self.game_code)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_normalises() {
        let config = EnvironmentConfig::new("uat", "https://uat.example.com/", "t", "ARO-001");
        assert_eq!(config.name, "UAT");
        assert_eq!(config.base_url, "https://uat.example.com");
    }

    #[test]
    fn test_validate() {
        let good = EnvironmentConfig::new("PRD", "https://prd.example.com", "secret", "ARO-001");
        assert!(good.validate().is_ok());

        let bad_url = EnvironmentConfig {
            base_url: "prd.example.com".to_string(),
            ..good.clone()
        };
        assert!(bad_url.validate().is_err());

        let no_token = EnvironmentConfig {
            token: String::new(),
            ..good
        };
        assert!(no_token.validate().unwrap_err().contains("token"));
    }

    #[test]
    fn test_debug_redacts_token() {
        let config = EnvironmentConfig::new("PRD", "https://prd.example.com", "secret", "ARO-001");
        let debug = format!("{config:?}");
        assert!(!debug.contains("secret"));
        assert!(debug.contains("redacted"));
    }
}
