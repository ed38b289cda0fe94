//! Configuration validation

use super::schema::PromptConfig;
use crate::error::Result;

pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate prompt defaults before a session starts
    pub fn validate(prompt: &PromptConfig) -> Result<()> {
        prompt.timeout_secs()?;
        prompt.action()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{PromptError, ValidationError};

    #[test]
    fn test_defaults_are_valid() {
        assert!(ConfigValidator::validate(&PromptConfig::default()).is_ok());
    }

    #[test]
    fn test_negative_timeout() {
        let prompt = PromptConfig {
            default_timeout: -1,
            ..Default::default()
        };

        let err = ConfigValidator::validate(&prompt).unwrap_err();
        assert!(matches!(
            err,
            PromptError::Validation(ValidationError::NegativeTimeout { value: -1 })
        ));
    }

    #[test]
    fn test_zero_timeout_is_valid() {
        let prompt = PromptConfig {
            default_timeout: 0,
            ..Default::default()
        };
        assert!(ConfigValidator::validate(&prompt).is_ok());
    }

    #[test]
    fn test_unknown_action() {
        let prompt = PromptConfig {
            default_action: "reject".to_string(),
            ..Default::default()
        };

        let err = ConfigValidator::validate(&prompt).unwrap_err();
        assert!(matches!(
            err,
            PromptError::Validation(ValidationError::UnknownAction { .. })
        ));
    }
}
