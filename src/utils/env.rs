//! Helpers for reading configuration from environment-style lookups.
//!
//! Configuration constructors take a lookup closure instead of reading
//! `std::env` directly so tests can supply a fixed map.

use std::collections::HashMap;

use crate::error::ConfigError;

/// Parse an environment variable value into the requested type.
pub fn parse_env_value<T: std::str::FromStr>(value: &str, key: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("could not parse '{}'", value),
    })
}

/// Parse an environment variable as a boolean.
pub fn parse_env_bool(value: &str, key: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "y" | "on" => Ok(true),
        "false" | "0" | "no" | "n" | "off" | "" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected boolean value, got '{}'", value),
        }),
    }
}

/// Reads a non-blank value, trimmed.
pub fn non_blank<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Splits a comma separated list, dropping blank entries.
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Lookup backed by the process environment.
pub fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Lookup backed by a fixed map, for tests and embedding.
pub fn map_lookup(vars: &HashMap<String, String>) -> impl Fn(&str) -> Option<String> + '_ {
    move |key| vars.get(key).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_env_value() {
        let parsed: u32 = parse_env_value(" 7 ", "N").expect("should parse");
        assert_eq!(parsed, 7);
        let err = parse_env_value::<u32>("seven", "N").expect_err("should fail");
        assert!(err.to_string().contains("N"));
    }

    #[test]
    fn test_parse_env_bool() {
        assert!(parse_env_bool("Y", "FLAG").expect("bool"));
        assert!(parse_env_bool("yes", "FLAG").expect("bool"));
        assert!(!parse_env_bool("0", "FLAG").expect("bool"));
        assert!(parse_env_bool("maybe", "FLAG").is_err());
    }

    #[test]
    fn test_split_list_and_non_blank() {
        assert_eq!(split_list("a, ,b,"), vec!["a", "b"]);

        let mut vars = HashMap::new();
        vars.insert("EMPTY".to_string(), "   ".to_string());
        vars.insert("SET".to_string(), " value ".to_string());
        let lookup = map_lookup(&vars);
        assert_eq!(non_blank(&lookup, "EMPTY"), None);
        assert_eq!(non_blank(&lookup, "SET"), Some("value".to_string()));
        assert_eq!(non_blank(&lookup, "MISSING"), None);
    }
}
