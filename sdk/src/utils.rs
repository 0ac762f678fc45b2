//! General utility functions for amounts, addresses and time formatting
//!
//! Amounts are always integers in USDC base units (6 decimals). Display
//! formatting rounds to 2 decimals using integer arithmetic only.

#![forbid(unsafe_code)]

use crate::error::{DegenError, Result};
use anchor_client::solana_sdk::pubkey::Pubkey;
use chrono::{DateTime, Utc};
use std::str::FromStr;

/// USDC decimals
pub const USDC_DECIMALS: u8 = 6;

/// Base units per whole USDC
pub const USDC_UNIT: u64 = 1_000_000;

/// Base units per displayed cent
const UNITS_PER_CENT: u64 = USDC_UNIT / 100;

/// Format a base-unit amount as a USDC string with 2 decimals
///
/// Rounds half up at the cent.
///
/// # Examples
/// ```
/// use degen_sdk::utils::format_usdc;
///
/// assert_eq!(format_usdc(15_000_000), "15.00");
/// assert_eq!(format_usdc(4_995_000), "5.00");
/// assert_eq!(format_usdc(1_234), "0.00");
/// ```
#[must_use]
pub fn format_usdc(amount: u64) -> String {
    let cents = amount
        .saturating_add(UNITS_PER_CENT / 2)
        .checked_div(UNITS_PER_CENT)
        .unwrap_or(0);
    let whole = cents.checked_div(100).unwrap_or(0);
    let frac = cents.checked_rem(100).unwrap_or(0);
    format!("{whole}.{frac:02}")
}

/// Parse an account address
///
/// Accepts base58 (the native Solana form) or 32 bytes of hex with an
/// optional `0x` prefix.
///
/// # Examples
/// ```
/// use degen_sdk::utils::parse_address;
///
/// let from_hex = parse_address(&format!("0x{}", "00".repeat(32))).unwrap();
/// let from_b58 = parse_address("11111111111111111111111111111111").unwrap();
/// assert_eq!(from_hex, from_b58);
/// ```
pub fn parse_address(input: &str) -> Result<Pubkey> {
    let trimmed = input.trim();
    let hex_body = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"));

    let looks_hex = hex_body.is_some()
        || (trimmed.len() == 64 && trimmed.chars().all(|c| c.is_ascii_hexdigit()));

    if looks_hex {
        let body = hex_body.unwrap_or(trimmed);
        let bytes = hex::decode(body).map_err(|e| DegenError::InvalidAddress {
            input: input.to_string(),
            reason: e.to_string(),
        })?;
        let array: [u8; 32] = bytes.try_into().map_err(|bytes: Vec<u8>| {
            DegenError::InvalidAddress {
                input: input.to_string(),
                reason: format!("expected 32 bytes, got {}", bytes.len()),
            }
        })?;
        return Ok(Pubkey::new_from_array(array));
    }

    Pubkey::from_str(trimmed).map_err(|e| DegenError::InvalidAddress {
        input: input.to_string(),
        reason: e.to_string(),
    })
}

/// Format a Unix timestamp as a UTC date-time string
///
/// # Examples
/// ```
/// use degen_sdk::utils::format_timestamp;
///
/// assert_eq!(format_timestamp(0), "1970-01-01 00:00:00 UTC");
/// ```
#[must_use]
pub fn format_timestamp(timestamp: i64) -> String {
    DateTime::<Utc>::from_timestamp(timestamp, 0).map_or_else(
        || format!("invalid timestamp {timestamp}"),
        |dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

/// Format duration in seconds to human readable string
///
/// # Examples
/// ```
/// use degen_sdk::utils::format_duration;
///
/// assert_eq!(format_duration(30), "30s");
/// assert_eq!(format_duration(90), "1m 30s");
/// assert_eq!(format_duration(2_592_000), "30d 0h 0m 0s");
/// ```
#[must_use]
#[allow(clippy::arithmetic_side_effects)] // divisors are non-zero constants
pub fn format_duration(seconds: u64) -> String {
    let days = seconds / 86400;
    let hours = (seconds % 86400) / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;

    if days > 0 {
        format!("{days}d {hours}h {minutes}m {secs}s")
    } else if hours > 0 {
        format!("{hours}h {minutes}m {secs}s")
    } else if minutes > 0 {
        format!("{minutes}m {secs}s")
    } else {
        format!("{secs}s")
    }
}

/// Whether a subscription expiring at `expires_at` is active at `now`
#[must_use]
pub const fn is_active_at(expires_at: i64, now: i64) -> bool {
    expires_at > now
}

/// Whether a subscription is expired but still inside its grace window at `now`
#[must_use]
pub const fn is_in_grace_period_at(expires_at: i64, grace_period_secs: i64, now: i64) -> bool {
    now >= expires_at && now <= expires_at.saturating_add(grace_period_secs)
}

/// Average amount paid per period, zero when nothing was paid yet
#[must_use]
pub fn average_payment(total_paid: u64, payment_count: u64) -> u64 {
    total_paid.checked_div(payment_count).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_usdc_rounding() {
        assert_eq!(format_usdc(0), "0.00");
        assert_eq!(format_usdc(10_000_000), "10.00");
        assert_eq!(format_usdc(11_000_000), "11.00");
        assert_eq!(format_usdc(5_004_999), "5.00");
        assert_eq!(format_usdc(5_005_000), "5.01");
        assert_eq!(format_usdc(100_000_000), "100.00");
    }

    #[test]
    fn test_format_usdc_large_value_does_not_overflow() {
        assert!(!format_usdc(u64::MAX).is_empty());
    }

    #[test]
    fn test_parse_address_hex_and_base58() {
        let key = Pubkey::new_unique();
        let hex_form = hex::encode(key.to_bytes());

        assert_eq!(parse_address(&key.to_string()).unwrap(), key);
        assert_eq!(parse_address(&hex_form).unwrap(), key);
        assert_eq!(parse_address(&format!("0x{hex_form}")).unwrap(), key);
    }

    #[test]
    fn test_parse_address_rejects_wrong_length() {
        let err = parse_address("0xdeadbeef").unwrap_err();
        assert!(err.to_string().contains("expected 32 bytes"));
        assert!(parse_address("not an address").is_err());
    }

    #[test]
    fn test_active_and_grace_windows() {
        let expires_at = 1_000;
        let grace = 7 * 86_400;

        assert!(is_active_at(expires_at, 999));
        assert!(!is_active_at(expires_at, 1_000));

        assert!(!is_in_grace_period_at(expires_at, grace, 999));
        assert!(is_in_grace_period_at(expires_at, grace, 1_000));
        assert!(is_in_grace_period_at(expires_at, grace, 1_000 + grace));
        assert!(!is_in_grace_period_at(expires_at, grace, 1_001 + grace));
    }

    #[test]
    fn test_average_payment() {
        assert_eq!(average_payment(30_000_000, 3), 10_000_000);
        assert_eq!(average_payment(30_000_000, 0), 0);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0), "0s");
        assert_eq!(format_duration(3661), "1h 1m 1s");
        assert_eq!(format_duration(604_800), "7d 0h 0m 0s");
    }
}
