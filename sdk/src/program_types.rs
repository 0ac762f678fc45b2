//! Subscription program account types and the client-side record view

use anchor_lang::prelude::*;
use serde::{Deserialize, Serialize};

/// Global program configuration
/// PDA seeds: ["config"]
#[derive(
    Clone, Debug, PartialEq, Eq, Serialize, Deserialize, AnchorSerialize, AnchorDeserialize,
)]
pub struct LedgerConfig {
    /// Program owner (admin operations)
    pub owner: Pubkey,
    /// Pinned USDC mint
    pub usdc_mint: Pubkey,
    /// Standard subscription fee in USDC base units (6 decimals)
    pub subscription_fee: u64,
    /// Period added to the expiry by each subscribe or renew, in seconds
    pub period_secs: i64,
    /// Window after expiry during which the record is kept, in seconds
    pub grace_period_secs: i64,
    /// Lifetime amount collected
    pub total_collected: u64,
    /// PDA bump seed
    pub bump: u8,
}

/// Per-subscriber subscription account
/// PDA seeds: ["subscription", subscriber]
#[derive(
    Clone, Debug, PartialEq, Eq, Serialize, Deserialize, AnchorSerialize, AnchorDeserialize,
)]
pub struct SubscriptionAccount {
    /// Wallet that pays for the subscription
    pub subscriber: Pubkey,
    /// Telegram handle bound to the subscription
    pub telegram_username: String,
    /// Unix timestamp when access ends
    pub expires_at: i64,
    /// Cumulative amount paid in USDC base units
    pub total_paid: u64,
    /// Number of completed payments
    pub subscription_count: u64,
    /// PDA bump seed
    pub bump: u8,
}

/// Per-identity price override
/// PDA seeds: ["discount", sha256(username)]
#[derive(
    Clone, Debug, PartialEq, Eq, Serialize, Deserialize, AnchorSerialize, AnchorDeserialize,
)]
pub struct DiscountAccount {
    /// Telegram handle the price applies to
    pub telegram_username: String,
    /// Price charged instead of the standard fee
    pub price: u64,
    /// PDA bump seed
    pub bump: u8,
}

/// Arguments for the `subscribe` instruction
#[derive(
    Clone, Debug, PartialEq, Eq, Serialize, Deserialize, AnchorSerialize, AnchorDeserialize,
)]
pub struct SubscribeArgs {
    /// Telegram handle to bind
    pub telegram_username: String,
}

/// Read-only cached copy of a subscription as reported by the ledger
///
/// Never mutated locally; refetched after every state-changing call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionRecord {
    /// Identity (Telegram handle) bound to the subscription
    pub identity: String,
    /// Unix timestamp when access ends
    pub expires_at: i64,
    /// Cumulative amount paid in USDC base units
    pub total_paid: u64,
    /// Number of completed payments
    pub payment_count: u64,
}

impl SubscriptionRecord {
    /// A record with an empty identity is the ledger's "no subscription"
    #[must_use]
    pub fn has_identity(&self) -> bool {
        !self.identity.is_empty()
    }

    /// Average paid per period in base units
    #[must_use]
    pub fn average_payment(&self) -> u64 {
        crate::utils::average_payment(self.total_paid, self.payment_count)
    }
}

impl From<SubscriptionAccount> for SubscriptionRecord {
    fn from(account: SubscriptionAccount) -> Self {
        Self {
            identity: account.telegram_username,
            expires_at: account.expires_at,
            total_paid: account.total_paid,
            payment_count: account.subscription_count,
        }
    }
}

/// Subscription record plus the ledger's activity flags for one account
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionStatus {
    /// Account the status belongs to
    pub account: String,
    /// Record, when the account has ever subscribed
    pub record: Option<SubscriptionRecord>,
    /// Ledger reports the subscription as active
    pub active: bool,
    /// Ledger reports the subscription as expired but inside the grace window
    pub in_grace_period: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_from_account() {
        let account = SubscriptionAccount {
            subscriber: Pubkey::new_unique(),
            telegram_username: "dave".to_string(),
            expires_at: 1_700_000_000,
            total_paid: 45_000_000,
            subscription_count: 3,
            bump: 254,
        };

        let record = SubscriptionRecord::from(account);
        assert_eq!(record.identity, "dave");
        assert_eq!(record.payment_count, 3);
        assert_eq!(record.average_payment(), 15_000_000);
        assert!(record.has_identity());
    }

    #[test]
    fn test_account_borsh_layout_tolerates_trailing_space() {
        let account = DiscountAccount {
            telegram_username: "carol".to_string(),
            price: 5_000_000,
            bump: 1,
        };
        let mut data = Vec::new();
        AnchorSerialize::serialize(&account, &mut data).unwrap();
        // Accounts are allocated at max size, leaving zeroed tail bytes
        data.extend_from_slice(&[0u8; 16]);

        let decoded =
            <DiscountAccount as AnchorDeserialize>::deserialize(&mut data.as_slice()).unwrap();
        assert_eq!(decoded, account);
    }
}
