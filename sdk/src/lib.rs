//! Degen SDK - Rust SDK for paying USDC subscriptions on Solana
//!
//! This crate drives the subscribe and renew flows of the Degen subscription
//! program from the subscriber's side:
//!
//! - Resolving the (possibly discounted) fee for a Telegram identity
//! - Checking the USDC balance before anything is submitted
//! - Deciding between paying directly and approving the program delegate first
//! - Waiting for the approval to confirm and resuming the paying write exactly once
//!
//! The ledger is reached through the [`Ledger`] trait; [`RpcLedger`] is the
//! Solana RPC implementation.
//!
//! # Example Usage
//!
//! ```no_run
//! use degen_sdk::{load_keypair, RpcLedger, SessionConfig, SubscriptionSession};
//!
//! # async fn run() -> degen_sdk::Result<()> {
//! let signer = load_keypair(None)?;
//! let ledger = RpcLedger::builder("https://api.devnet.solana.com", signer).build()?;
//! let mut session = SubscriptionSession::new(ledger, SessionConfig::default());
//!
//! session.refresh().await?;
//! session.set_identity("dave");
//! session.subscribe().await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod allowance;
pub mod ata;
pub mod balance;
pub mod client;
pub mod error;
pub mod fee;
pub mod keypair;
pub mod ledger;
pub mod orchestrator;
pub mod pda;
pub mod program_types;
pub mod session;
pub mod tracker;
pub mod transaction_builder;
pub mod utils;

// Re-export commonly used items
pub use allowance::AllowanceWatcher;
pub use balance::{Admission, BalanceGuard};
pub use client::{RpcLedger, RpcLedgerBuilder};
pub use error::{DegenError, Result};
pub use fee::{normalize_identity, FeeQuote, FeeResolver, FeeTicket, Generation};
pub use keypair::load_keypair;
pub use ledger::Ledger;
pub use orchestrator::{
    ActionOrchestrator, BoundAction, Command, DecisionInputs, PayingAction, PendingAction, Phase,
    Settlement,
};
pub use program_types::*;
pub use session::{PendingStage, SessionConfig, SessionStatus, Step, SubscriptionSession};
pub use tracker::{Confirmation, TransactionState, TransactionTracker};
pub use transaction_builder::{ApproveBuilder, RenewBuilder, SubscribeBuilder};

// Re-export general utilities
pub use utils::{format_duration, format_timestamp, format_usdc, parse_address};

// Re-export commonly used external types
pub use anchor_client::solana_client;
pub use anchor_client::solana_sdk;
pub use anchor_lang::{AnchorDeserialize, AnchorSerialize};

use anchor_client::solana_sdk::pubkey::Pubkey;
use once_cell::sync::Lazy;
use std::str::FromStr;

/// Program ID loaded from the `DEGEN_PROGRAM_ID` environment variable at runtime
///
/// # Example
/// ```bash
/// export DEGEN_PROGRAM_ID=YourProgramIdHere111111111111111111111111111
/// ```
pub static PROGRAM_ID: Lazy<Option<String>> =
    Lazy::new(|| std::env::var("DEGEN_PROGRAM_ID").ok());

/// Get the program ID as a `Pubkey`
///
/// # Errors
/// Returns an error if `DEGEN_PROGRAM_ID` is unset or not a valid pubkey.
/// There is no built-in fallback, so a wrong cluster is never used silently.
pub fn program_id() -> Result<Pubkey> {
    let raw = PROGRAM_ID.as_deref().ok_or_else(|| {
        DegenError::Generic(
            "DEGEN_PROGRAM_ID environment variable must be set to the deployed program ID"
                .to_string(),
        )
    })?;
    Pubkey::from_str(raw)
        .map_err(|e| DegenError::Generic(format!("Invalid program ID '{raw}': {e}")))
}
