//! Reconnection policy and pure backoff decisions
//!
//! Only interruption of an established session triggers reconnection;
//! a failed initial connect is surfaced to the caller and never retried
//! here. The policy is a configuration value, not hardwired.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Exponential backoff policy for resuming an interrupted session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReconnectPolicy {
    /// Delay before the first attempt, in milliseconds
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    /// Upper bound for the backoff delay, in milliseconds
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Multiplier applied per attempt
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    /// Maximum number of attempts (None = retry forever)
    #[serde(default)]
    pub max_attempts: Option<u32>,
}

fn default_initial_delay_ms() -> u64 {
    250
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_multiplier() -> f64 {
    2.0
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            multiplier: default_multiplier(),
            max_attempts: None,
        }
    }
}

impl ReconnectPolicy {
    /// Backoff delay for a 1-based attempt number, capped at max_delay_ms.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32);
        let factor = self.multiplier.max(1.0).powi(exponent as i32);
        let delay_ms = (self.initial_delay_ms as f64 * factor).min(self.max_delay_ms as f64);
        Duration::from_millis(delay_ms as u64)
    }

    /// Decide whether to attempt another reconnection.
    pub fn decide(&self, completed_attempts: u32, shutdown_requested: bool) -> ReconnectDecision {
        if shutdown_requested {
            return ReconnectDecision::AbortShutdownRequested;
        }

        if let Some(max_attempts) = self.max_attempts {
            if completed_attempts >= max_attempts {
                return ReconnectDecision::AbortMaxAttemptsExceeded;
            }
        }

        let attempt = completed_attempts + 1;
        ReconnectDecision::Proceed {
            attempt,
            delay: self.delay_for_attempt(attempt),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.initial_delay_ms == 0 {
            return Err("initial_delay_ms must be greater than 0".to_string());
        }
        if self.max_delay_ms < self.initial_delay_ms {
            return Err("max_delay_ms must be at least initial_delay_ms".to_string());
        }
        if self.multiplier < 1.0 {
            return Err("multiplier must be at least 1.0".to_string());
        }
        if self.max_attempts == Some(0) {
            return Err("max_attempts must be greater than 0 or unset for unlimited".to_string());
        }
        Ok(())
    }
}

/// Decision result for reconnection attempts.
#[derive(Debug, Clone, PartialEq)]
pub enum ReconnectDecision {
    /// Proceed with the given attempt after the given delay
    Proceed { attempt: u32, delay: Duration },
    /// Abort - shutdown requested
    AbortShutdownRequested,
    /// Abort - max attempts exhausted
    AbortMaxAttemptsExceeded,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_grows_exponentially_and_caps() {
        let policy = ReconnectPolicy {
            initial_delay_ms: 100,
            max_delay_ms: 1000,
            multiplier: 2.0,
            max_attempts: None,
        };

        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(400));
        assert_eq!(policy.delay_for_attempt(4), Duration::from_millis(800));
        // Capped from here on
        assert_eq!(policy.delay_for_attempt(5), Duration::from_millis(1000));
        assert_eq!(policy.delay_for_attempt(50), Duration::from_millis(1000));
    }

    #[test]
    fn test_decide_proceeds_then_exhausts() {
        let policy = ReconnectPolicy {
            max_attempts: Some(2),
            ..Default::default()
        };

        assert!(matches!(
            policy.decide(0, false),
            ReconnectDecision::Proceed { attempt: 1, .. }
        ));
        assert!(matches!(
            policy.decide(1, false),
            ReconnectDecision::Proceed { attempt: 2, .. }
        ));
        assert_eq!(
            policy.decide(2, false),
            ReconnectDecision::AbortMaxAttemptsExceeded
        );
    }

    #[test]
    fn test_decide_unlimited_by_default() {
        let policy = ReconnectPolicy::default();
        assert!(matches!(
            policy.decide(10_000, false),
            ReconnectDecision::Proceed { .. }
        ));
    }

    #[test]
    fn test_decide_aborts_on_shutdown() {
        let policy = ReconnectPolicy::default();
        assert_eq!(
            policy.decide(0, true),
            ReconnectDecision::AbortShutdownRequested
        );
    }

    #[test]
    fn test_validate() {
        assert!(ReconnectPolicy::default().validate().is_ok());

        let zero_delay = ReconnectPolicy {
            initial_delay_ms: 0,
            ..Default::default()
        };
        assert!(zero_delay.validate().is_err());

        let inverted = ReconnectPolicy {
            initial_delay_ms: 1000,
            max_delay_ms: 100,
            ..Default::default()
        };
        assert!(inverted.validate().is_err());

        let zero_attempts = ReconnectPolicy {
            max_attempts: Some(0),
            ..Default::default()
        };
        assert!(zero_attempts.validate().is_err());

        let shrinking = ReconnectPolicy {
            multiplier: 0.5,
            ..Default::default()
        };
        assert!(shrinking.validate().is_err());
    }
}
