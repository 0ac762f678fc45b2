//! Configuration management for the Degen CLI
//!
//! Values come from environment variables with sensible defaults; command
//! line flags override them.

use degen_sdk::SessionConfig;
use std::env;
use std::time::Duration;

/// Centralized configuration for the Degen CLI
#[derive(Debug, Clone)]
pub struct DegenCliConfig {
    /// Default RPC URL for Solana connections
    pub default_rpc_url: String,

    /// Default output format for CLI commands
    pub default_output_format: String,

    /// USDC decimals divisor for converting base units to display units
    pub usdc_decimals_divisor: u64,

    /// Interval between authorization reads while awaiting an approval
    pub poll_interval_ms: u64,

    /// How long to wait for an approval before reporting it as still pending
    pub confirmation_timeout_secs: u64,
}

impl DegenCliConfig {
    /// Create a new configuration instance with values from environment variables
    /// or sensible defaults if not set
    #[must_use]
    pub fn new() -> Self {
        Self {
            default_rpc_url: env::var("DEGEN_RPC_URL")
                .unwrap_or_else(|_| "https://api.devnet.solana.com".to_string()),

            default_output_format: env::var("DEGEN_DEFAULT_OUTPUT_FORMAT")
                .unwrap_or_else(|_| "human".to_string()),

            usdc_decimals_divisor: env::var("USDC_DECIMALS_DIVISOR")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|divisor| *divisor > 0)
                .unwrap_or(1_000_000),

            poll_interval_ms: env::var("DEGEN_POLL_INTERVAL_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|ms| *ms > 0)
                .unwrap_or(2_000),

            confirmation_timeout_secs: env::var("DEGEN_CONFIRMATION_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(300), // 5 minutes
        }
    }

    /// Convert USDC base units to display units for JSON output
    #[allow(clippy::cast_precision_loss)] // Acceptable for display formatting
    #[must_use]
    pub fn usdc_amount(&self, base_units: u64) -> f64 {
        base_units as f64 / self.usdc_decimals_divisor as f64
    }

    /// Session timing derived from this configuration
    #[must_use]
    pub fn session_config(&self) -> SessionConfig {
        let timeout = Duration::from_secs(self.confirmation_timeout_secs);
        SessionConfig {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            confirmation_timeout: timeout,
            allowance_timeout: timeout,
            ..SessionConfig::default()
        }
    }
}

impl Default for DegenCliConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = DegenCliConfig::new();

        assert_eq!(config.default_rpc_url, "https://api.devnet.solana.com");
        assert_eq!(config.default_output_format, "human");
        assert_eq!(config.usdc_decimals_divisor, 1_000_000);
        assert_eq!(config.poll_interval_ms, 2_000);
        assert_eq!(config.confirmation_timeout_secs, 300);
    }

    #[test]
    fn test_usdc_amount() {
        let config = DegenCliConfig::new();

        assert!((config.usdc_amount(15_000_000) - 15.0).abs() < f64::EPSILON);
        assert!((config.usdc_amount(500_000) - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_session_config() {
        let session = DegenCliConfig::new().session_config();

        assert_eq!(session.poll_interval, Duration::from_secs(2));
        assert_eq!(session.confirmation_timeout, Duration::from_secs(300));
        assert_eq!(session.allowance_timeout, Duration::from_secs(300));
        assert_eq!(session.success_display, Duration::from_secs(10));
    }
}
