//! Read and write surface of the remote subscription ledger
//!
//! Everything the payment flow knows about subscriptions, fees, balances and
//! authorizations comes through this trait. Reads are pure; writes require
//! the acting account's signature and return the transaction handle.

use crate::{error::Result, program_types::SubscriptionRecord, tracker::TransactionState};
use anchor_client::solana_sdk::{pubkey::Pubkey, signature::Signature};
use async_trait::async_trait;

/// Remote ledger operations used by the subscription session
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Account that signs writes and pays fees
    fn owner(&self) -> Pubkey;

    /// Address that subscribers authorize to pull the fee
    fn spender(&self) -> Pubkey;

    /// Subscription record for `account`, `None` when it never subscribed
    async fn subscription(&self, account: &Pubkey) -> Result<Option<SubscriptionRecord>>;

    /// Global standard fee, `None` when the ledger returned nothing
    async fn standard_fee(&self) -> Result<Option<u64>>;

    /// Fee charged for `identity`, `None` when the ledger returned nothing
    ///
    /// A discount record overrides the standard fee unconditionally.
    async fn effective_fee(&self, identity: &str) -> Result<Option<u64>>;

    /// Whether the subscription of `account` is active at ledger time
    async fn is_active(&self, account: &Pubkey) -> Result<bool>;

    /// Whether the subscription of `account` is expired but inside the grace window
    async fn is_in_grace_period(&self, account: &Pubkey) -> Result<bool>;

    /// Amount `owner` currently authorizes `spender` to pull
    async fn allowance(&self, owner: &Pubkey, spender: &Pubkey) -> Result<u64>;

    /// Spendable token balance of `account`
    async fn token_balance(&self, account: &Pubkey) -> Result<u64>;

    /// Set the authorization of `spender` to exactly `amount`
    async fn approve(&self, spender: &Pubkey, amount: u64) -> Result<Signature>;

    /// Create or replace the caller's subscription bound to `identity`
    async fn subscribe(&self, identity: &str) -> Result<Signature>;

    /// Extend the caller's existing subscription
    async fn renew(&self) -> Result<Signature>;

    /// Current confirmation state of a submitted write
    async fn transaction_status(&self, signature: &Signature) -> Result<TransactionState>;
}
