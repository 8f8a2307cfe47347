use std::collections::HashMap;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;

use cafe_api::HashCost;
use thiserror::Error;

/// Placeholder secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me", "dev-secret-change-me", "secret"];

/// Upper bound for `CAFE_SESSION_HOURS` (366 days).
const MAX_SESSION_HOURS: i64 = 24 * 366;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("CAFE_SECRET_KEY is unset or still a placeholder")]
    MissingSecret,

    #[error("Invalid {key} value '{value}': {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub secret_key: String,
    pub db_path: PathBuf,
    pub host: String,
    pub port: u16,
    pub session_hours: i64,
    pub hash_cost: HashCost,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&std::env::vars().collect())
    }

    fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let secret_key = vars.get("CAFE_SECRET_KEY").cloned().unwrap_or_default();
        if secret_key.is_empty() || PLACEHOLDER_SECRETS.contains(&secret_key.as_str()) {
            return Err(ConfigError::MissingSecret);
        }

        let session_hours = parse(vars, "CAFE_SESSION_HOURS", 168)?; // 7 days
        if !(1..=MAX_SESSION_HOURS).contains(&session_hours) {
            return Err(ConfigError::Invalid {
                key: "CAFE_SESSION_HOURS",
                value: session_hours.to_string(),
                reason: format!("must be between 1 and {}", MAX_SESSION_HOURS),
            });
        }

        let defaults = HashCost::default();

        Ok(Config {
            secret_key,
            db_path: vars
                .get("CAFE_DB_PATH")
                .cloned()
                .unwrap_or_else(|| "cafes.db".into())
                .into(),
            host: vars
                .get("CAFE_HOST")
                .cloned()
                .unwrap_or_else(|| "0.0.0.0".into()),
            port: parse(vars, "CAFE_PORT", 5000)?,
            session_hours,
            hash_cost: HashCost {
                memory_kib: parse(vars, "CAFE_HASH_MEMORY_KIB", defaults.memory_kib)?,
                iterations: parse(vars, "CAFE_HASH_ITERATIONS", defaults.iterations)?,
                parallelism: defaults.parallelism,
            },
        })
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse<T>(vars: &HashMap<String, String>, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    match vars.get(key) {
        None => Ok(default),
        Some(value) => value.parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            value: value.clone(),
            reason: e.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults_apply_when_only_secret_is_set() {
        let config = Config::from_vars(&vars(&[("CAFE_SECRET_KEY", "s3cr3t-value")])).unwrap();
        assert_eq!(config.port, 5000);
        assert_eq!(config.db_path, PathBuf::from("cafes.db"));
        assert_eq!(config.session_hours, 168);
        assert_eq!(config.hash_cost, HashCost::default());
        assert_eq!(config.server_address(), "0.0.0.0:5000");
    }

    #[test]
    fn missing_or_placeholder_secret_is_rejected() {
        assert!(matches!(Config::from_vars(&vars(&[])), Err(ConfigError::MissingSecret)));
        assert!(matches!(
            Config::from_vars(&vars(&[("CAFE_SECRET_KEY", "dev-secret-change-me")])),
            Err(ConfigError::MissingSecret)
        ));
    }

    #[test]
    fn bad_port_names_the_variable() {
        let err = Config::from_vars(&vars(&[("CAFE_SECRET_KEY", "k"), ("CAFE_PORT", "eighty")])).unwrap_err();
        assert!(err.to_string().contains("CAFE_PORT"));
    }

    #[test]
    fn session_hours_must_be_in_range() {
        for hours in ["0", "-5", "9223372036854775807", "8785"] {
            let err = Config::from_vars(&vars(&[("CAFE_SECRET_KEY", "k"), ("CAFE_SESSION_HOURS", hours)]))
                .unwrap_err();
            assert!(
                matches!(err, ConfigError::Invalid { key: "CAFE_SESSION_HOURS", .. }),
                "{hours} was accepted"
            );
        }

        let config = Config::from_vars(&vars(&[("CAFE_SECRET_KEY", "k"), ("CAFE_SESSION_HOURS", "8784")])).unwrap();
        assert_eq!(config.session_hours, 8784);
    }
}
