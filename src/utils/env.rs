//! Environment variable management
//!
//! Handles loading and validation of environment variables for provider API keys.

use crate::error::ConfigError;
use std::env;

/// Load environment variables from .env file
///
/// Uses dotenv crate to load variables from .env file in the working directory.
/// Does not fail if .env file doesn't exist (optional configuration).
pub fn load_env() {
    dotenv::dotenv().ok();
}

/// Get an API key from the environment
///
/// # Errors
/// Returns `ConfigError::MissingKey` if the variable is unset or empty
pub fn get_api_key(var: &str) -> Result<String, ConfigError> {
    match env::var(var) {
        Ok(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
        _ => Err(ConfigError::MissingKey {
            var: var.to_string(),
        }),
    }
}

/// Validate API key format
///
/// Checks that API key meets minimum requirements:
/// - Not empty
/// - At least 20 characters long
///
/// # Errors
/// Returns error if key doesn't meet validation requirements
pub fn validate_api_key(key: &str) -> Result<(), ConfigError> {
    if key.is_empty() {
        return Err(ConfigError::InvalidApiKey {
            reason: "API key cannot be empty".to_string(),
        });
    }
    if key.len() < 20 {
        return Err(ConfigError::InvalidApiKey {
            reason: format!(
                "too short, expected >= 20 characters, got {}",
                key.len()
            ),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_validate_api_key_valid_length() {
        assert!(validate_api_key("xai-1234567890123456789").is_ok());
    }

    #[test]
    fn test_validate_api_key_empty() {
        let result = validate_api_key("");
        assert!(result.unwrap_err().to_string().contains("empty"));
    }

    #[test]
    fn test_validate_api_key_too_short() {
        let result = validate_api_key("short");
        assert!(result.unwrap_err().to_string().contains("too short"));
    }

    #[test]
    fn test_validate_api_key_boundary() {
        assert!(validate_api_key(&"a".repeat(20)).is_ok());
        assert!(validate_api_key(&"a".repeat(19)).is_err());
    }

    #[test]
    #[serial]
    fn test_get_api_key_missing() {
        env::remove_var("RYN_AUTOFIX_TEST_MISSING_KEY");
        let err = get_api_key("RYN_AUTOFIX_TEST_MISSING_KEY").unwrap_err();
        assert!(err.to_string().contains("RYN_AUTOFIX_TEST_MISSING_KEY"));
    }

    #[test]
    #[serial]
    fn test_get_api_key_trims_whitespace() {
        env::set_var("RYN_AUTOFIX_TEST_KEY", "  sk-ant-REDACTED  ");
        let key = get_api_key("RYN_AUTOFIX_TEST_KEY").unwrap();
        assert_eq!(key, "sk-ant-REDACTED");
        env::remove_var("RYN_AUTOFIX_TEST_KEY");
    }

    #[test]
    fn test_load_env_doesnt_fail_on_missing_file() {
        load_env();
    }
}
