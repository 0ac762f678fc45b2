//! Confirmation lifecycle of submitted writes
//!
//! Only the approval's confirmation gates the payment flow. Paying writes are
//! tracked for logging but the flow does not wait on them. Handles are
//! dropped once their wait settles or the next cycle starts.

use crate::{error::Result, ledger::Ledger};
use anchor_client::solana_sdk::signature::Signature;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

/// Lifecycle of one submitted transaction
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum TransactionState {
    /// Sent to the cluster, not yet seen in a block
    Submitted,
    /// Seen but below the confirmed commitment
    Confirming,
    /// Reached confirmed commitment
    Confirmed,
    /// Executed with an error
    Failed(String),
}

impl TransactionState {
    /// Confirmed or failed
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Confirmed | Self::Failed(_))
    }

    const fn rank(&self) -> u8 {
        match self {
            Self::Submitted => 0,
            Self::Confirming => 1,
            Self::Confirmed | Self::Failed(_) => 2,
        }
    }
}

/// Outcome of waiting for a transaction
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Confirmation {
    /// The transaction confirmed
    Confirmed,
    /// The transaction failed on the ledger
    Failed(String),
    /// The wait timed out; the transaction may still land
    StillPending,
}

/// Maps transaction handles to their confirmation state
#[derive(Debug, Default)]
pub struct TransactionTracker {
    states: HashMap<Signature, TransactionState>,
}

impl TransactionTracker {
    /// Create an empty tracker
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a freshly submitted transaction
    ///
    /// Returns `false` when the handle is already tracked; its state is kept.
    pub fn track(&mut self, signature: Signature) -> bool {
        if self.states.contains_key(&signature) {
            warn!(
                service = "degen-sdk",
                component = "transaction_tracker",
                event = "duplicate_track",
                signature = %signature,
                "Transaction is already tracked"
            );
            return false;
        }
        self.states.insert(signature, TransactionState::Submitted);
        true
    }

    /// Current state of a tracked transaction
    #[must_use]
    pub fn state(&self, signature: &Signature) -> Option<&TransactionState> {
        self.states.get(signature)
    }

    /// Record an observed state
    ///
    /// States only move forward. Once terminal, later observations are
    /// ignored. Returns the state held after the update, or `None` when the
    /// handle is not tracked.
    pub fn update(
        &mut self,
        signature: &Signature,
        observed: TransactionState,
    ) -> Option<TransactionState> {
        let current = self.states.get_mut(signature)?;
        if !current.is_terminal() && observed.rank() > current.rank() {
            debug!(
                service = "degen-sdk",
                component = "transaction_tracker",
                event = "state_changed",
                signature = %signature,
                from = ?current,
                to = ?observed,
                "Transaction state advanced"
            );
            *current = observed;
        }
        Some(current.clone())
    }

    /// Stop tracking a transaction
    pub fn forget(&mut self, signature: &Signature) -> Option<TransactionState> {
        self.states.remove(signature)
    }

    /// Drop every tracked handle
    pub fn clear(&mut self) {
        self.states.clear();
    }

    /// Number of tracked handles
    #[must_use]
    pub fn len(&self) -> usize {
        self.states.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Poll the ledger until `signature` confirms, fails or `timeout` elapses
    ///
    /// Transient status read errors are logged and polling continues. A
    /// timeout is not a failure: the transaction may still land later.
    pub async fn wait_for_confirmation<L: Ledger + ?Sized>(
        &mut self,
        ledger: &L,
        signature: &Signature,
        poll_interval: Duration,
        timeout: Duration,
    ) -> Result<Confirmation> {
        if !self.states.contains_key(signature) {
            self.track(*signature);
        }

        let deadline = Instant::now()
            .checked_add(timeout)
            .unwrap_or_else(Instant::now);
        let mut ticker = interval(poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                () = tokio::time::sleep_until(deadline) => {
                    info!(
                        service = "degen-sdk",
                        component = "transaction_tracker",
                        event = "confirmation_timeout",
                        signature = %signature,
                        timeout_secs = timeout.as_secs(),
                        "Transaction still pending after timeout"
                    );
                    return Ok(Confirmation::StillPending);
                }
            }

            let observed = match ledger.transaction_status(signature).await {
                Ok(state) => state,
                Err(e) => {
                    warn!(
                        service = "degen-sdk",
                        component = "transaction_tracker",
                        event = "status_read_failed",
                        signature = %signature,
                        error = %e,
                        "Failed to read transaction status, retrying"
                    );
                    continue;
                }
            };

            trace!(
                service = "degen-sdk",
                component = "transaction_tracker",
                event = "poll_tick",
                signature = %signature,
                observed = ?observed,
            );

            match self.update(signature, observed) {
                Some(TransactionState::Confirmed) => return Ok(Confirmation::Confirmed),
                Some(TransactionState::Failed(reason)) => {
                    return Ok(Confirmation::Failed(reason))
                }
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_only_moves_forward() {
        let mut tracker = TransactionTracker::new();
        let sig = Signature::from([1u8; 64]);

        assert!(tracker.track(sig));
        assert_eq!(tracker.state(&sig), Some(&TransactionState::Submitted));

        tracker.update(&sig, TransactionState::Confirming);
        tracker.update(&sig, TransactionState::Submitted);
        assert_eq!(tracker.state(&sig), Some(&TransactionState::Confirming));

        tracker.update(&sig, TransactionState::Confirmed);
        tracker.update(&sig, TransactionState::Failed("late".to_string()));
        assert_eq!(tracker.state(&sig), Some(&TransactionState::Confirmed));
    }

    #[test]
    fn test_handles_are_not_reused() {
        let mut tracker = TransactionTracker::new();
        let sig = Signature::from([2u8; 64]);

        assert!(tracker.track(sig));
        tracker.update(&sig, TransactionState::Failed("reverted".to_string()));
        assert!(!tracker.track(sig));
        assert_eq!(
            tracker.state(&sig),
            Some(&TransactionState::Failed("reverted".to_string()))
        );
    }

    #[test]
    fn test_forget_and_clear() {
        let mut tracker = TransactionTracker::new();
        let first = Signature::from([4u8; 64]);
        let second = Signature::from([5u8; 64]);
        tracker.track(first);
        tracker.track(second);
        assert_eq!(tracker.len(), 2);

        assert_eq!(tracker.forget(&first), Some(TransactionState::Submitted));
        assert_eq!(tracker.state(&first), None);
        assert_eq!(tracker.len(), 1);

        tracker.clear();
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_update_unknown_handle() {
        let mut tracker = TransactionTracker::new();
        assert_eq!(
            tracker.update(&Signature::from([3u8; 64]), TransactionState::Confirmed),
            None
        );
    }
}
