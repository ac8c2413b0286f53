//! Configuration validation.
//!
//! Validates configuration at startup to catch common errors early, before
//! any collaborator is dialed or the listener is bound.

use super::Config;
use thiserror::Error;

/// Validation errors for configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("listen.port must be nonzero")]
    ZeroPort,
    #[error("collaborators.user_directory_url is required (no persistent user store configured)")]
    MissingUserDirectoryUrl,
    #[error("turn.secret is empty; TURN credential issuance will be disabled")]
    EmptyTurnSecret,
    #[error("matcher.pair_ban_ms must be nonzero")]
    ZeroPairBan,
    #[error("matcher.ring_timeout_ms must be nonzero")]
    ZeroRingTimeout,
}

/// Validate a configuration, returning all errors found. Callers distinguish
/// fatal errors (missing user directory) from advisory ones (empty TURN
/// secret just disables credential issuance) by inspecting the variant.
pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listen.port == 0 {
        errors.push(ValidationError::ZeroPort);
    }
    if config.collaborators.user_directory_url.trim().is_empty() {
        errors.push(ValidationError::MissingUserDirectoryUrl);
    }
    if config.turn.secret.as_deref().unwrap_or("").is_empty() {
        errors.push(ValidationError::EmptyTurnSecret);
    }
    if config.matcher.pair_ban_ms == 0 {
        errors.push(ValidationError::ZeroPairBan);
    }
    if config.matcher.ring_timeout_ms == 0 {
        errors.push(ValidationError::ZeroRingTimeout);
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

/// Errors here are fatal (process must abort before binding the listener).
pub fn is_fatal(err: &ValidationError) -> bool {
    matches!(err, ValidationError::ZeroPort | ValidationError::MissingUserDirectoryUrl)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_valid_config() -> &'static str {
        r#"
        [listen]
        port = 8080

        [collaborators]
        user_directory_url = "http://localhost:4000"

        [turn]
        secret = "s3cr3t"
        "#
    }

    #[test]
    fn accepts_minimal_config() {
        let config: Config = toml::from_str(minimal_valid_config()).unwrap();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn rejects_missing_user_directory() {
        let toml = r#"
        [listen]
        port = 8080
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        let errs = validate(&config).unwrap_err();
        assert!(errs.iter().any(|e| matches!(e, ValidationError::MissingUserDirectoryUrl)));
    }

    #[test]
    fn rejects_zero_port() {
        let toml = r#"
        [listen]
        port = 0

        [collaborators]
        user_directory_url = "http://localhost:4000"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        let errs = validate(&config).unwrap_err();
        assert!(errs.iter().any(|e| matches!(e, ValidationError::ZeroPort)));
    }
}
