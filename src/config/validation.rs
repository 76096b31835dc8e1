//! Configuration validation utilities.

use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

/// Configuration error types.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file or a TLS PEM file.
    #[error("failed to read {}: {source}", path.display())]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse YAML configuration.
    #[error("failed to parse YAML config: {0}")]
    ParseError(#[from] serde_yaml::Error),

    /// Configuration validation failed.
    #[error("config validation error: {0}")]
    ValidationError(String),
}

/// Parse duration string using humantime.
///
/// Supports `100ms`, `2s`, `1m30s` and the other humantime formats.
///
/// # Examples
///
/// ```
/// use mockngm::config::parse_duration;
///
/// assert_eq!(parse_duration("2s").unwrap().as_secs(), 2);
/// assert_eq!(parse_duration("100ms").unwrap().as_millis(), 100);
/// assert_eq!(parse_duration("1m30s").unwrap().as_secs(), 90);
/// ```
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("duration string is empty".to_string());
    }
    humantime::parse_duration(s).map_err(|e| e.to_string())
}

/// Expand environment variables in a string.
/// Supports ${VAR} and ${VAR:-default} syntax.
pub fn expand_env_vars(input: &str) -> String {
    static ENV_VAR_REGEX: std::sync::OnceLock<regex::Regex> = std::sync::OnceLock::new();

    let regex = ENV_VAR_REGEX.get_or_init(|| {
        regex::Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}")
            .expect("failed to compile env var regex")
    });

    regex
        .replace_all(input, |caps: &regex::Captures| {
            let var_name = &caps[1];
            let default_value = caps.get(2).map(|m| m.as_str()).unwrap_or("");
            std::env::var(var_name).unwrap_or_else(|_| default_value.to_string())
        })
        .into_owned()
}

/// Read a file referenced by the configuration, keeping its path in the error.
pub(crate) fn read_file(path: &Path) -> Result<Vec<u8>, ConfigError> {
    std::fs::read(path).map_err(|source| ConfigError::IoError {
        path: path.to_path_buf(),
        source,
    })
}

/// Wrap a field-level validation message with its config path.
pub(crate) fn invalid(section: &str, reason: impl std::fmt::Display) -> ConfigError {
    ConfigError::ValidationError(format!("{section}: {reason}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration_valid() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("100ms").unwrap(), Duration::from_millis(100));
        assert_eq!(parse_duration(" 10s ").unwrap(), Duration::from_secs(10));
    }

    #[test]
    fn test_parse_duration_invalid() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("fast").is_err());
        assert!(parse_duration("5").is_err());
    }

    #[test]
    fn test_expand_env_vars_no_vars() {
        assert_eq!(expand_env_vars("address: 127.0.0.1:10080"), "address: 127.0.0.1:10080");
    }

    #[test]
    fn test_expand_env_vars_with_default() {
        let result = expand_env_vars("address: ${MOCKNGM_TEST_UNSET_ADDR_12345:-127.0.0.1:20180}");
        assert_eq!(result, "address: 127.0.0.1:20180");
    }

    #[test]
    fn test_expand_env_vars_from_env() {
        // SAFETY: This test runs in isolation and only modifies a test-specific variable.
        unsafe {
            std::env::set_var("MOCKNGM_TEST_CA_DIR", "/etc/tidb/tls");
        }
        let result = expand_env_vars("ca_path: ${MOCKNGM_TEST_CA_DIR}/ca.pem");
        assert_eq!(result, "ca_path: /etc/tidb/tls/ca.pem");
        // SAFETY: Cleanup test variable.
        unsafe {
            std::env::remove_var("MOCKNGM_TEST_CA_DIR");
        }
    }

    #[test]
    fn test_read_file_error_names_path() {
        let err = read_file(Path::new("/nonexistent/mockngm/client.pem")).unwrap_err();
        assert!(matches!(err, ConfigError::IoError { .. }));
        assert!(
            err.to_string()
                .starts_with("failed to read /nonexistent/mockngm/client.pem:")
        );
    }

    #[test]
    fn test_invalid_prefixes_section() {
        let err = invalid("scrape.backoff", "max_attempts must be positive");
        assert_eq!(
            err.to_string(),
            "config validation error: scrape.backoff: max_attempts must be positive"
        );
    }
}
