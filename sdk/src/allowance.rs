//! Authorization polling with an explicit active window
//!
//! The watcher owns no timer while inactive. [`AllowanceWatcher::start`]
//! creates one, [`AllowanceWatcher::stop`] drops it, and
//! [`AllowanceWatcher::tick`] returns `None` immediately when there is
//! nothing to watch.

use crate::{error::Result, ledger::Ledger};
use std::time::Duration;
use tokio::time::{interval, Interval, MissedTickBehavior};
use tracing::{debug, trace};

/// Polls the authorization granted to the ledger's spender
#[derive(Debug)]
pub struct AllowanceWatcher {
    poll_interval: Duration,
    ticker: Option<Interval>,
    threshold: u64,
    ticks: u64,
}

impl AllowanceWatcher {
    /// Create an inactive watcher
    #[must_use]
    pub const fn new(poll_interval: Duration) -> Self {
        Self {
            poll_interval,
            ticker: None,
            threshold: 0,
            ticks: 0,
        }
    }

    /// Start polling until the authorization reaches `threshold`
    pub fn start(&mut self, threshold: u64) {
        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.ticker = Some(ticker);
        self.threshold = threshold;
        self.ticks = 0;

        debug!(
            service = "degen-sdk",
            component = "allowance_watcher",
            event = "watch_started",
            threshold = threshold,
            poll_interval_ms = self.poll_interval.as_millis(),
        );
    }

    /// Stop polling
    pub fn stop(&mut self) {
        if self.ticker.take().is_some() {
            debug!(
                service = "degen-sdk",
                component = "allowance_watcher",
                event = "watch_stopped",
                ticks = self.ticks,
            );
        }
    }

    /// Whether a poll timer exists
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.ticker.is_some()
    }

    /// Threshold of the current watch window
    #[must_use]
    pub const fn threshold(&self) -> u64 {
        self.threshold
    }

    /// Number of reads issued in the current window
    #[must_use]
    pub const fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Wait for the next tick and read the authorization
    ///
    /// Returns `None` without touching the ledger when inactive. The watcher
    /// does not stop itself; the caller decides when the value suffices.
    pub async fn tick<L: Ledger + ?Sized>(&mut self, ledger: &L) -> Option<Result<u64>> {
        let ticker = self.ticker.as_mut()?;
        ticker.tick().await;
        self.ticks = self.ticks.saturating_add(1);

        let read = ledger.allowance(&ledger.owner(), &ledger.spender()).await;
        trace!(
            service = "degen-sdk",
            component = "allowance_watcher",
            event = "poll_tick",
            tick = self.ticks,
            threshold = self.threshold,
            allowance = ?read.as_ref().ok(),
        );
        Some(read)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_start_stop_window() {
        let mut watcher = AllowanceWatcher::new(Duration::from_secs(2));
        assert!(!watcher.is_active());

        watcher.start(15_000_000);
        assert!(watcher.is_active());
        assert_eq!(watcher.threshold(), 15_000_000);

        watcher.stop();
        assert!(!watcher.is_active());
        assert_eq!(watcher.ticks(), 0);
    }
}
