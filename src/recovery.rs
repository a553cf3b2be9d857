use crate::config::VoiceConfig;
use crate::error::PosecamError;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{error, info, warn};

/// Recovery action to take after an error
#[derive(Debug, Clone, PartialEq)]
pub enum RecoveryAction {
    /// Retry after a delay
    RetryAfterDelay(Duration),
    /// Stop retrying the failed component
    GiveUp,
}

/// Recovery strategy configuration
#[derive(Debug, Clone)]
pub struct RecoveryConfig {
    /// Maximum number of consecutive retry attempts
    pub max_retries: u32,
    /// Base delay for exponential backoff
    pub base_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Whether to use exponential backoff
    pub exponential_backoff: bool,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            exponential_backoff: true,
        }
    }
}

impl From<&VoiceConfig> for RecoveryConfig {
    fn from(config: &VoiceConfig) -> Self {
        Self {
            max_retries: config.max_restart_attempts,
            base_delay: Duration::from_millis(config.restart_base_delay_ms),
            max_delay: Duration::from_millis(config.restart_max_delay_ms),
            exponential_backoff: true,
        }
    }
}

/// Tracks consecutive failures per component and decides when to retry
#[derive(Debug)]
pub struct RecoveryManager {
    config: RecoveryConfig,
    retry_counts: HashMap<String, u32>,
}

impl RecoveryManager {
    /// Create a new recovery manager with default configuration
    pub fn new() -> Self {
        Self::with_config(RecoveryConfig::default())
    }

    /// Create a new recovery manager with custom configuration
    pub fn with_config(config: RecoveryConfig) -> Self {
        Self {
            config,
            retry_counts: HashMap::new(),
        }
    }

    /// Determine recovery action for an error
    pub fn handle_error(&mut self, component: &str, error: &PosecamError) -> RecoveryAction {
        if !error.is_recoverable() {
            warn!("Non-recoverable error in {}: {}", component, error);
            return RecoveryAction::GiveUp;
        }

        let retry_count = self.get_retry_count(component);
        if retry_count >= self.config.max_retries {
            error!(
                "Maximum retries ({}) exceeded for component {}: {}",
                self.config.max_retries, component, error
            );
            return RecoveryAction::GiveUp;
        }

        self.retry_counts.insert(component.to_string(), retry_count + 1);
        let delay = self.calculate_delay(retry_count);

        info!(
            "Scheduling recovery for {} in {:?} (attempt {}/{}): {}",
            component,
            delay,
            retry_count + 1,
            self.config.max_retries,
            error
        );

        RecoveryAction::RetryAfterDelay(delay)
    }

    /// Reset retry count for a component after successful recovery
    pub fn reset_retry_count(&mut self, component: &str) {
        if self.retry_counts.remove(component).is_some() {
            info!("Component {} recovered, reset retry count", component);
        }
    }

    /// Calculate delay for retry with exponential backoff
    fn calculate_delay(&self, retry_count: u32) -> Duration {
        if !self.config.exponential_backoff {
            return self.config.base_delay;
        }

        let factor = 1u32.checked_shl(retry_count).unwrap_or(u32::MAX);
        self.config
            .base_delay
            .checked_mul(factor)
            .unwrap_or(self.config.max_delay)
            .min(self.config.max_delay)
    }

    /// Get current retry count for a component
    pub fn get_retry_count(&self, component: &str) -> u32 {
        self.retry_counts.get(component).copied().unwrap_or(0)
    }

    /// Check if component has exceeded retry limit
    pub fn has_exceeded_retry_limit(&self, component: &str) -> bool {
        self.get_retry_count(component) >= self.config.max_retries
    }

    pub fn config(&self) -> &RecoveryConfig {
        &self.config
    }
}

impl Default for RecoveryManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CameraError, VoiceError};

    fn recognition_error() -> PosecamError {
        PosecamError::Voice(VoiceError::Recognition {
            details: "no match".to_string(),
        })
    }

    #[test]
    fn test_backoff_doubles_up_to_max() {
        let mut manager = RecoveryManager::with_config(RecoveryConfig {
            max_retries: 8,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            exponential_backoff: true,
        });

        let delays: Vec<_> = (0..7)
            .map(|_| match manager.handle_error("voice", &recognition_error()) {
                RecoveryAction::RetryAfterDelay(d) => d.as_secs(),
                other => panic!("unexpected action {:?}", other),
            })
            .collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 16, 30, 30]);
    }

    #[test]
    fn test_gives_up_after_max_retries() {
        let mut manager = RecoveryManager::new();
        for _ in 0..5 {
            assert!(matches!(
                manager.handle_error("voice", &recognition_error()),
                RecoveryAction::RetryAfterDelay(_)
            ));
        }
        assert!(manager.has_exceeded_retry_limit("voice"));
        assert_eq!(
            manager.handle_error("voice", &recognition_error()),
            RecoveryAction::GiveUp
        );

        // Other components keep their own budget
        assert_eq!(manager.get_retry_count("camera"), 0);

        manager.reset_retry_count("voice");
        assert!(matches!(
            manager.handle_error("voice", &recognition_error()),
            RecoveryAction::RetryAfterDelay(d) if d == Duration::from_secs(1)
        ));
    }

    #[test]
    fn test_non_recoverable_error_gives_up_immediately() {
        let mut manager = RecoveryManager::new();
        let error = PosecamError::Camera(CameraError::NotBound);
        assert_eq!(manager.handle_error("camera", &error), RecoveryAction::GiveUp);
    }

    #[test]
    fn test_huge_retry_counts_saturate() {
        let manager = RecoveryManager::new();
        assert_eq!(manager.calculate_delay(40), Duration::from_secs(30));
    }

    #[test]
    fn test_config_from_voice_settings() {
        let voice = crate::config::PosecamConfig::default().voice;
        let config = RecoveryConfig::from(&voice);
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.base_delay, Duration::from_secs(1));
        assert_eq!(config.max_delay, Duration::from_secs(30));
    }
}
