//! Error types for the Degen SDK
//!
//! Every failure of a subscribe or renew flow is caught at the orchestrator
//! boundary and surfaces as one of these variants. [`DegenError::user_message`]
//! renders the single message shown to the user; the `Display` form is the
//! diagnostic text written to the log.
//!
//! # Program Error Mapping
//!
//! Custom error codes raised by the subscription program are turned into
//! [`DegenError::WriteReverted`] with a readable reason:
//!
//! - **6000**: username must not be empty
//! - **6001**: username is too long
//! - **6002**: no subscription to renew
//! - **6003**: insufficient allowance for the subscription fee
//! - **6004**: insufficient USDC balance
//! - **6005**: arithmetic overflow
//! - **6006**: unauthorized
//!
//! # Example
//!
//! ```rust
//! use degen_sdk::error::DegenError;
//!
//! let err = DegenError::InsufficientBalance {
//!     required: 15_000_000,
//!     available: 4_000_000,
//! };
//! assert_eq!(err.shortfall(), Some(11_000_000));
//! assert!(err.user_message().contains("15.00 USDC"));
//! ```

use crate::utils::format_usdc;
use thiserror::Error;

/// Result type for Degen SDK operations
pub type Result<T> = std::result::Result<T, DegenError>;

/// Error types that can occur when using the Degen SDK
#[derive(Error, Debug)]
pub enum DegenError {
    /// Local balance pre-check failed; no write was submitted
    #[error(
        "Insufficient USDC balance. You need {} USDC but only have {} USDC.",
        usdc_display(.required),
        usdc_display(.available)
    )]
    InsufficientBalance { required: u64, available: u64 },

    /// The signer declined to sign the approval
    #[error("Approval was rejected by the signer")]
    AuthorizationRejectedBySigner,

    /// The ledger rejected a subscribe, renew or approve write
    #[error("Transaction reverted: {}", reason_display(.reason))]
    WriteReverted { reason: Option<String> },

    /// A read belonged to an identity or decision cycle that is no longer current
    #[error("Stale read: {0}")]
    StaleRead(String),

    /// The fee for the current identity has not been resolved yet
    #[error("Subscription fee is not resolved yet")]
    UnresolvedFee,

    /// Balance or authorization has not been read yet
    #[error("Account data is not loaded yet: {0}")]
    NotReady(String),

    /// A paying action is already in flight for this account
    #[error("Another subscription action is already in progress")]
    FlowInProgress,

    /// Renewal requested without an existing subscription record
    #[error("No subscription found to renew")]
    NoSubscription,

    /// Identity input is empty after normalization
    #[error("Telegram username must not be empty")]
    EmptyIdentity,

    /// The subscription program config account does not exist
    #[error("Subscription program is not initialized at {0}")]
    NotInitialized(String),

    /// Account not found
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    /// Address could not be parsed
    #[error("Invalid address '{input}': {reason}")]
    InvalidAddress { input: String, reason: String },

    /// Invalid token program
    #[error("Invalid token program: expected {expected}, found {found}")]
    InvalidTokenProgram { expected: String, found: String },

    /// RPC error for blockchain queries
    #[error("RPC error: {0}")]
    Rpc(String),

    /// Error from Anchor client
    #[error("Anchor client error: {0}")]
    AnchorClient(Box<anchor_client::ClientError>),

    /// Error from serde JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with message
    #[error("Degen SDK error: {0}")]
    Generic(String),
}

impl From<anchor_client::ClientError> for DegenError {
    fn from(error: anchor_client::ClientError) -> Self {
        if let anchor_client::ClientError::SolanaClientError(solana_err) = &error {
            if let Some(tx_err) = solana_err.get_transaction_error() {
                return Self::from_transaction_error(&tx_err);
            }
        }
        Self::AnchorClient(Box::new(error))
    }
}

impl From<anchor_client::solana_client::client_error::ClientError> for DegenError {
    fn from(error: anchor_client::solana_client::client_error::ClientError) -> Self {
        error.get_transaction_error().map_or_else(
            || Self::Rpc(error.to_string()),
            |tx_err| Self::from_transaction_error(&tx_err),
        )
    }
}

impl From<anchor_client::solana_sdk::pubkey::ParsePubkeyError> for DegenError {
    fn from(error: anchor_client::solana_sdk::pubkey::ParsePubkeyError) -> Self {
        Self::Generic(format!("Invalid pubkey: {error}"))
    }
}

impl From<String> for DegenError {
    fn from(msg: String) -> Self {
        Self::Generic(msg)
    }
}

impl From<&str> for DegenError {
    fn from(msg: &str) -> Self {
        Self::Generic(msg.to_string())
    }
}

impl From<anyhow::Error> for DegenError {
    fn from(error: anyhow::Error) -> Self {
        Self::Generic(error.to_string())
    }
}

impl DegenError {
    /// Map a failed transaction to [`DegenError::WriteReverted`]
    ///
    /// Custom program errors get a readable reason; anything else keeps the
    /// ledger's own text.
    #[must_use]
    pub fn from_transaction_error(
        tx_err: &anchor_client::solana_sdk::transaction::TransactionError,
    ) -> Self {
        use anchor_client::solana_sdk::instruction::InstructionError;
        use anchor_client::solana_sdk::transaction::TransactionError;

        let reason = match tx_err {
            TransactionError::InstructionError(_, InstructionError::Custom(code)) => {
                program_error_reason(*code)
                    .map_or_else(|| format!("custom program error {code}"), str::to_string)
            }
            other => other.to_string(),
        };
        Self::WriteReverted {
            reason: Some(reason),
        }
    }

    /// Shortfall in token base units, for [`DegenError::InsufficientBalance`]
    #[must_use]
    pub const fn shortfall(&self) -> Option<u64> {
        match self {
            Self::InsufficientBalance {
                required,
                available,
            } => Some(required.saturating_sub(*available)),
            _ => None,
        }
    }

    /// True for conditions that only disable the action instead of failing it
    #[must_use]
    pub const fn is_silent(&self) -> bool {
        matches!(self, Self::UnresolvedFee | Self::NotReady(_))
    }

    /// The single message shown to the user for this failure
    ///
    /// Revert reasons are passed through verbatim when the ledger provided
    /// one; otherwise a generic failure message is used.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::InsufficientBalance { .. } => self.to_string(),
            Self::AuthorizationRejectedBySigner => {
                "USDC approval was rejected. No payment was made.".to_string()
            }
            Self::WriteReverted {
                reason: Some(reason),
            } => reason.clone(),
            Self::WriteReverted { reason: None } => {
                "Transaction failed. Please try again.".to_string()
            }
            Self::StaleRead(_) => {
                "Subscription details changed while loading. Please try again.".to_string()
            }
            Self::UnresolvedFee => "Subscription fee is still loading.".to_string(),
            Self::NotReady(_) => "Account data is still loading. Please try again.".to_string(),
            Self::FlowInProgress
            | Self::NoSubscription
            | Self::EmptyIdentity
            | Self::NotInitialized(_) => self.to_string(),
            _ => "Something went wrong. Please try again.".to_string(),
        }
    }
}

fn usdc_display(amount: &u64) -> String {
    format_usdc(*amount)
}

fn reason_display(reason: &Option<String>) -> &str {
    reason.as_deref().unwrap_or("unknown reason")
}

/// Readable reason for a subscription program custom error code
#[must_use]
pub const fn program_error_reason(code: u32) -> Option<&'static str> {
    match code {
        6000 => Some("Username must not be empty"),
        6001 => Some("Username is too long"),
        6002 => Some("No subscription found to renew"),
        6003 => Some("Insufficient USDC allowance for the subscription fee"),
        6004 => Some("Insufficient USDC balance"),
        6005 => Some("Arithmetic overflow"),
        6006 => Some("Unauthorized"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anchor_client::solana_sdk::instruction::InstructionError;
    use anchor_client::solana_sdk::transaction::TransactionError;

    #[test]
    fn test_insufficient_balance_message() {
        let err = DegenError::InsufficientBalance {
            required: 15_000_000,
            available: 4_000_000,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient USDC balance. You need 15.00 USDC but only have 4.00 USDC."
        );
        assert_eq!(err.shortfall(), Some(11_000_000));
    }

    #[test]
    fn test_custom_program_error_mapping() {
        let tx_err = TransactionError::InstructionError(1, InstructionError::Custom(6002));
        match DegenError::from_transaction_error(&tx_err) {
            DegenError::WriteReverted { reason } => {
                assert_eq!(reason.as_deref(), Some("No subscription found to renew"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_custom_code_keeps_number() {
        let tx_err = TransactionError::InstructionError(0, InstructionError::Custom(7777));
        let err = DegenError::from_transaction_error(&tx_err);
        assert_eq!(err.user_message(), "custom program error 7777");
    }

    #[test]
    fn test_user_message_without_reason_is_generic() {
        let err = DegenError::WriteReverted { reason: None };
        assert_eq!(err.user_message(), "Transaction failed. Please try again.");
    }

    #[test]
    fn test_unresolved_fee_is_silent() {
        assert!(DegenError::UnresolvedFee.is_silent());
        assert!(!DegenError::NoSubscription.is_silent());
    }
}
