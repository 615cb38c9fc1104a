//! Engine configuration.

use crate::error::FlowError;
use crate::policy::StagePolicyTable;
use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Fresh submissions allowed for temporary-class results
    #[serde(default = "default_submission")]
    pub submission: RetryPolicy,

    /// Validation polls per accepted submission
    #[serde(default = "default_confirmation")]
    pub confirmation: RetryPolicy,

    /// Lookups for a derived identifier after validation
    #[serde(default = "default_identifier")]
    pub identifier: RetryPolicy,

    /// Checks that a participating account exists before the first submission
    #[serde(default = "default_account_readiness")]
    pub account_readiness: RetryPolicy,

    /// Holdings reporting
    #[serde(default)]
    pub reporting: ReportingConfig,

    /// Stage failure policy
    #[serde(default)]
    pub stages: StagePolicyTable,

    /// Run the account readiness preflight
    #[serde(default = "default_true")]
    pub preflight_accounts: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            submission: default_submission(),
            confirmation: default_confirmation(),
            identifier: default_identifier(),
            account_readiness: default_account_readiness(),
            reporting: ReportingConfig::default(),
            stages: StagePolicyTable::default(),
            preflight_accounts: true,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), FlowError> {
        self.submission.validate("submission")?;
        self.confirmation.validate("confirmation")?;
        self.identifier.validate("identifier")?;
        self.account_readiness.validate("account_readiness")?;
        self.reporting.validate()
    }
}

/// Holdings reporting configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportingConfig {
    /// Objects requested per page
    #[serde(default = "default_page_limit")]
    pub page_limit: u32,

    /// Pages followed before truncating
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
}

impl Default for ReportingConfig {
    fn default() -> Self {
        Self {
            page_limit: default_page_limit(),
            max_pages: default_max_pages(),
        }
    }
}

impl ReportingConfig {
    fn validate(&self) -> Result<(), FlowError> {
        if self.page_limit == 0 || self.max_pages == 0 {
            return Err(FlowError::Configuration(
                "reporting: page_limit and max_pages must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_submission() -> RetryPolicy {
    RetryPolicy::exponential(3, Duration::from_secs(1), 2.0, Duration::from_secs(8))
}

fn default_confirmation() -> RetryPolicy {
    RetryPolicy::exponential(20, Duration::from_millis(500), 2.0, Duration::from_secs(4))
}

fn default_identifier() -> RetryPolicy {
    RetryPolicy::fixed(5, Duration::from_secs(2))
}

fn default_account_readiness() -> RetryPolicy {
    RetryPolicy::fixed(5, Duration::from_secs(3))
}

fn default_page_limit() -> u32 {
    200
}

fn default_max_pages() -> u32 {
    10
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::Backoff;

    #[test]
    fn defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.submission.max_attempts, 3);
        assert_eq!(config.confirmation.max_attempts, 20);
        assert_eq!(
            config.identifier.backoff,
            Backoff::Fixed { delay_ms: 2_000 }
        );
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: EngineConfig = serde_json::from_str(
            r#"{ "identifier": { "max_attempts": 2, "backoff": { "type": "fixed", "delay_ms": 10 } } }"#,
        )
        .unwrap();
        assert_eq!(config.identifier.max_attempts, 2);
        assert_eq!(config.submission, EngineConfig::default().submission);
        assert!(config.preflight_accounts);
    }

    #[test]
    fn zero_attempts_are_a_configuration_error() {
        let mut config = EngineConfig::default();
        config.confirmation.max_attempts = 0;
        assert_eq!(
            config.validate().unwrap_err().kind(),
            crate::ErrorKind::Configuration
        );
    }
}
