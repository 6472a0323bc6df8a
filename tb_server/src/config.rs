//! Bridge configuration management.
//!
//! Consolidates all environment variable reads and provides validated configuration.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use table_bridge::EnvironmentConfig;

/// Complete bridge configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Table identifier used in logs and round calls
    pub table: String,
    /// Protocol log written by the device driver
    pub log_path: PathBuf,
    /// Replay the existing log before following it
    pub from_start: bool,
    /// Log poll cadence
    pub tick: Duration,
    /// Device acknowledgement timeout
    pub ack_timeout: Duration,
    /// How often non-primary environments are checked against the primary
    pub align_interval: Duration,
    /// Name of the environment that drives the game
    pub primary: String,
    /// Every environment rounds are reported to, primary included
    pub environments: Vec<EnvironmentConfig>,
}

/// Values given on the command line take precedence over the environment
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub table: Option<String>,
    pub log_path: Option<PathBuf>,
    pub from_start: bool,
}

impl BridgeConfig {
    /// Load configuration from the process environment
    ///
    /// # Errors
    ///
    /// Returns error if required variables are missing or invalid
    pub fn from_env(overrides: CliOverrides) -> Result<Self, ConfigError> {
        Self::from_lookup(overrides, |key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(overrides: CliOverrides, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let table = overrides
            .table
            .or_else(|| lookup("BRIDGE_TABLE"))
            .ok_or_else(|| ConfigError::MissingRequired {
                var: "BRIDGE_TABLE".to_string(),
                hint: "Set to the table identifier, e.g. ARO-001".to_string(),
            })?;

        let log_path = overrides
            .log_path
            .or_else(|| lookup("BRIDGE_LOG_PATH").map(PathBuf::from))
            .ok_or_else(|| ConfigError::MissingRequired {
                var: "BRIDGE_LOG_PATH".to_string(),
                hint: "Path of the device protocol log to follow".to_string(),
            })?;

        let from_start = overrides.from_start || parse_or(&lookup, "BRIDGE_FROM_START", false);
        let tick = Duration::from_millis(parse_or(&lookup, "BRIDGE_TICK_MS", 500));
        let ack_timeout = Duration::from_millis(parse_or(&lookup, "BRIDGE_ACK_TIMEOUT_MS", 1000));
        let align_interval = Duration::from_secs(parse_or(&lookup, "BRIDGE_ALIGN_INTERVAL_SECS", 30));

        let primary = lookup("BRIDGE_PRIMARY")
            .unwrap_or_else(|| "PRD".to_string())
            .trim()
            .to_ascii_uppercase();
        let default_game_code = lookup("BRIDGE_GAME_CODE").unwrap_or_else(|| table.clone());

        let names = lookup("BRIDGE_ENVIRONMENTS").unwrap_or_else(|| primary.clone());
        let mut environments = Vec::new();
        for name in names.split(',').map(str::trim).filter(|n| !n.is_empty()) {
            let name = name.to_ascii_uppercase();

            let url_var = format!("BRIDGE_{name}_BASE_URL");
            let base_url = lookup(&url_var).ok_or_else(|| ConfigError::MissingRequired {
                var: url_var.clone(),
                hint: format!("Round API base URL for {name}"),
            })?;

            let token_var = format!("BRIDGE_{name}_TOKEN");
            let token = lookup(&token_var).ok_or_else(|| ConfigError::MissingRequired {
                var: token_var.clone(),
                hint: format!("Bearer token for the {name} round API"),
            })?;

            let game_code = lookup(&format!("BRIDGE_{name}_GAME_CODE"))
                .unwrap_or_else(|| default_game_code.clone());

            environments.push(EnvironmentConfig::new(name, base_url, token, game_code));
        }

        Ok(BridgeConfig {
            table,
            log_path,
            from_start,
            tick,
            ack_timeout,
            align_interval,
            primary,
            environments,
        })
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.table.trim().is_empty() {
            return Err(ConfigError::Invalid {
                var: "BRIDGE_TABLE".to_string(),
                reason: "Must not be empty".to_string(),
            });
        }

        if self.tick.is_zero() {
            return Err(ConfigError::Invalid {
                var: "BRIDGE_TICK_MS".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        if self.ack_timeout.is_zero() {
            return Err(ConfigError::Invalid {
                var: "BRIDGE_ACK_TIMEOUT_MS".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        if self.align_interval.is_zero() {
            return Err(ConfigError::Invalid {
                var: "BRIDGE_ALIGN_INTERVAL_SECS".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        if self.environments.is_empty() {
            return Err(ConfigError::Invalid {
                var: "BRIDGE_ENVIRONMENTS".to_string(),
                reason: "At least one environment is required".to_string(),
            });
        }

        let mut seen = HashSet::new();
        for env in &self.environments {
            if !seen.insert(env.name.as_str()) {
                return Err(ConfigError::Invalid {
                    var: "BRIDGE_ENVIRONMENTS".to_string(),
                    reason: format!("Duplicate environment {}", env.name),
                });
            }
            env.validate().map_err(|reason| ConfigError::Invalid {
                var: format!("BRIDGE_{}_*", env.name),
                reason,
            })?;
        }

        if !seen.contains(self.primary.as_str()) {
            return Err(ConfigError::Invalid {
                var: "BRIDGE_PRIMARY".to_string(),
                reason: format!("{} is not listed in BRIDGE_ENVIRONMENTS", self.primary),
            });
        }

        Ok(())
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {var}\nHint: {hint}")]
    MissingRequired { var: String, hint: String },

    #[error("Invalid configuration for {var}: {reason}")]
    Invalid { var: String, reason: String },
}

/// Helper to parse a variable with default fallback
fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> T
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<BridgeConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        BridgeConfig::from_lookup(CliOverrides::default(), |key| vars.get(key).cloned())
    }

    const BASE: &[(&str, &str)] = &[
        ("BRIDGE_TABLE", "ARO-001"),
        ("BRIDGE_LOG_PATH", "/var/log/ss2/ARO-001.log"),
        ("BRIDGE_ENVIRONMENTS", "prd, uat"),
        ("BRIDGE_PRD_BASE_URL", "https://prd.example.com/"),
        ("BRIDGE_PRD_TOKEN", "prd-token"),
        ("BRIDGE_UAT_BASE_URL", "https://uat.example.com"),
        ("BRIDGE_UAT_TOKEN", "uat-token"),
        ("BRIDGE_UAT_GAME_CODE", "ARO-001-UAT"),
    ];

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::MissingRequired {
            var: "BRIDGE_PRD_TOKEN".to_string(),
            hint: "Bearer token".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("BRIDGE_PRD_TOKEN"));
        assert!(msg.contains("Bearer token"));
    }

    #[test]
    fn test_load_defaults() {
        let config = load(BASE).unwrap();
        assert_eq!(config.tick, Duration::from_millis(500));
        assert_eq!(config.ack_timeout, Duration::from_millis(1000));
        assert_eq!(config.primary, "PRD");
        assert!(!config.from_start);

        let names: Vec<_> = config.environments.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["PRD", "UAT"]);
        assert_eq!(config.environments[0].base_url, "https://prd.example.com");
        assert_eq!(config.environments[0].game_code, "ARO-001");
        assert_eq!(config.environments[1].game_code, "ARO-001-UAT");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_token() {
        let vars: Vec<_> = BASE
            .iter()
            .copied()
            .filter(|(k, _)| *k != "BRIDGE_UAT_TOKEN")
            .collect();
        let err = load(&vars).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::MissingRequired { ref var, .. } if var == "BRIDGE_UAT_TOKEN"
        ));
    }

    #[test]
    fn test_overrides_win() {
        let vars: HashMap<String, String> = BASE
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let overrides = CliOverrides {
            table: Some("SBO-002".to_string()),
            log_path: Some(PathBuf::from("/tmp/replay.log")),
            from_start: true,
        };
        let config = BridgeConfig::from_lookup(overrides, |key| vars.get(key).cloned()).unwrap();
        assert_eq!(config.table, "SBO-002");
        assert_eq!(config.log_path, PathBuf::from("/tmp/replay.log"));
        assert!(config.from_start);
    }

    #[test]
    fn test_validation_primary_not_listed() {
        let mut vars = BASE.to_vec();
        vars.push(("BRIDGE_PRIMARY", "stg"));
        let err = load(&vars).unwrap().validate().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref var, .. } if var == "BRIDGE_PRIMARY"));
    }

    #[test]
    fn test_validation_zero_tick() {
        let mut vars = BASE.to_vec();
        vars.push(("BRIDGE_TICK_MS", "0"));
        let err = load(&vars).unwrap().validate().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref var, .. } if var == "BRIDGE_TICK_MS"));
    }

    #[test]
    fn test_validation_duplicate_environment() {
        let mut vars: Vec<_> = BASE
            .iter()
            .copied()
            .filter(|(k, _)| *k != "BRIDGE_ENVIRONMENTS")
            .collect();
        vars.push(("BRIDGE_ENVIRONMENTS", "PRD,UAT,prd"));
        let err = load(&vars).unwrap().validate().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref reason, .. } if reason.contains("Duplicate")));
    }
}
