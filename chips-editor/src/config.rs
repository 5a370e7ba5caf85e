//! Editor configuration: backend selection and retry policy.

use std::path::PathBuf;

use chips_core::ChipsResult;
use chips_sdk::{BackendMode, MockSeed, SdkConnectorOptions, DEFAULT_CLIENT_NAME};

/// Configuration for retrying transient backend failures with exponential backoff.
///
/// Only `BackendUnavailable` errors are retried.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Initial delay between attempts in milliseconds.
    pub initial_delay_ms: u64,
    /// Maximum delay between attempts in milliseconds.
    pub max_delay_ms: u64,
    /// Multiplier for exponential backoff.
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 50,
            max_delay_ms: 2_000,
            multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Create a new retry configuration with custom values.
    #[must_use]
    pub fn new(
        max_attempts: u32,
        initial_delay_ms: u64,
        max_delay_ms: u64,
        multiplier: f64,
    ) -> Self {
        Self {
            max_attempts,
            initial_delay_ms,
            max_delay_ms,
            multiplier,
        }
    }

    /// A policy that never retries.
    #[must_use]
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay before the retry that follows attempt `attempt` (0-indexed).
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss,
        clippy::cast_possible_wrap
    )]
    pub fn delay_for_attempt(&self, attempt: u32) -> u64 {
        let base_delay = self.initial_delay_ms as f64 * self.multiplier.powi(attempt as i32);
        base_delay.min(self.max_delay_ms as f64) as u64
    }
}

/// Editor configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct EditorConfig {
    /// Which backend the connector talks to.
    pub backend: BackendMode,
    /// Service URL for the live backend.
    pub endpoint: Option<String>,
    /// JSON seed file for the mock backend.
    pub seed_path: Option<PathBuf>,
    /// Client name presented to the live backend.
    pub client_name: String,
    /// Retry policy for transient failures.
    pub retry: RetryConfig,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl EditorConfig {
    /// Mock backend, no seed, default retry policy.
    #[must_use]
    pub fn new() -> Self {
        Self {
            backend: BackendMode::Mock,
            endpoint: None,
            seed_path: None,
            client_name: DEFAULT_CLIENT_NAME.to_string(),
            retry: RetryConfig::default(),
        }
    }

    /// Build connector options, loading the seed file if one is configured.
    ///
    /// # Errors
    ///
    /// Returns an error if the seed file cannot be read or parsed.
    pub fn to_connector_options(&self) -> ChipsResult<SdkConnectorOptions> {
        let seed = match (&self.backend, &self.seed_path) {
            (BackendMode::Mock, Some(path)) => MockSeed::from_file(path)?,
            _ => MockSeed::default(),
        };
        Ok(SdkConnectorOptions {
            mode: self.backend,
            seed,
            endpoint: self.endpoint.clone(),
            client_name: self.client_name.clone(),
        })
    }
}
