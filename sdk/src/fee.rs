//! Fee resolution for the identity currently entered
//!
//! Every identity change starts a new generation. A fee read is applied only
//! if its ticket still carries the current generation, so a slow read for an
//! old identity can never become the fee for a new one.

use crate::error::{DegenError, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Monotonic counter tagging each identity or decision cycle
pub type Generation = u64;

/// Normalize a user-typed identity: the first `@` and surrounding whitespace are dropped
///
/// # Examples
/// ```
/// use degen_sdk::fee::normalize_identity;
///
/// assert_eq!(normalize_identity("  @dave "), "dave");
/// assert_eq!(normalize_identity("da@ve"), "dave");
/// assert_eq!(normalize_identity("   "), "");
/// ```
#[must_use]
pub fn normalize_identity(raw: &str) -> String {
    raw.replacen('@', "", 1).trim().to_string()
}

/// Handle for one in-flight fee read
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FeeTicket {
    /// Identity the read was issued for
    pub identity: String,
    /// Generation at the time the read was issued
    pub generation: Generation,
}

/// Resolved fee for an identity
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeQuote {
    /// Fee that will be charged
    pub fee: u64,
    /// Global standard fee, when known
    pub standard_fee: Option<u64>,
    /// The charged fee differs from the standard fee
    pub discounted: bool,
    /// The per-identity price is higher than the standard fee
    pub above_standard: bool,
}

/// Resolves and caches the fee for the currently entered identity
#[derive(Debug, Default)]
pub struct FeeResolver {
    identity: Option<String>,
    generation: Generation,
    fee: Option<u64>,
    standard_fee: Option<u64>,
}

impl FeeResolver {
    /// Create an inactive resolver
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the entered identity
    ///
    /// Returns a ticket for the fee read to issue, or `None` when the
    /// normalized identity is empty and the resolver goes inactive.
    pub fn set_identity(&mut self, raw: &str) -> Option<FeeTicket> {
        let identity = normalize_identity(raw);
        self.generation = self.generation.saturating_add(1);
        self.fee = None;

        if identity.is_empty() {
            self.identity = None;
            return None;
        }

        self.identity = Some(identity.clone());
        Some(FeeTicket {
            identity,
            generation: self.generation,
        })
    }

    /// Ticket for re-reading the fee of the current identity
    ///
    /// Does not invalidate the cached fee.
    #[must_use]
    pub fn ticket(&self) -> Option<FeeTicket> {
        self.identity.as_ref().map(|identity| FeeTicket {
            identity: identity.clone(),
            generation: self.generation,
        })
    }

    /// Apply the result of a fee read
    ///
    /// A read that returned nothing falls back to the last-known standard
    /// fee. A discount is applied as the ledger reports it, including one
    /// above the standard fee.
    ///
    /// # Errors
    /// [`DegenError::StaleRead`] when the identity changed after the read
    /// was issued.
    pub fn complete(&mut self, ticket: &FeeTicket, read: Option<u64>) -> Result<FeeQuote> {
        if ticket.generation != self.generation || self.identity.as_ref() != Some(&ticket.identity)
        {
            debug!(
                service = "degen-sdk",
                component = "fee_resolver",
                event = "stale_fee_discarded",
                identity = %ticket.identity,
                ticket_generation = ticket.generation,
                current_generation = self.generation,
                "Discarding fee read for a previous identity"
            );
            return Err(DegenError::StaleRead(format!(
                "fee read for '{}' is out of date",
                ticket.identity
            )));
        }

        let fee = read.or(self.standard_fee).ok_or(DegenError::UnresolvedFee)?;
        self.fee = Some(fee);
        let quote = self.quote_for(fee);

        if quote.above_standard {
            warn!(
                service = "degen-sdk",
                component = "fee_resolver",
                event = "discount_above_standard",
                identity = %ticket.identity,
                fee = fee,
                standard_fee = ?self.standard_fee,
                "Per-identity price exceeds the standard fee"
            );
        }

        Ok(quote)
    }

    /// Record the latest standard fee read
    ///
    /// A read that returned nothing keeps the previous value.
    pub fn set_standard_fee(&mut self, standard_fee: Option<u64>) {
        if standard_fee.is_some() {
            self.standard_fee = standard_fee;
        }
    }

    /// Currently entered identity, if any
    #[must_use]
    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    /// Current generation
    #[must_use]
    pub const fn generation(&self) -> Generation {
        self.generation
    }

    /// Resolved fee for the current identity
    #[must_use]
    pub const fn fee(&self) -> Option<u64> {
        self.fee
    }

    /// Last-known standard fee
    #[must_use]
    pub const fn standard_fee(&self) -> Option<u64> {
        self.standard_fee
    }

    /// Quote for the resolved fee of the current identity
    #[must_use]
    pub fn quote(&self) -> Option<FeeQuote> {
        self.fee.map(|fee| self.quote_for(fee))
    }

    fn quote_for(&self, fee: u64) -> FeeQuote {
        FeeQuote {
            fee,
            standard_fee: self.standard_fee,
            discounted: self.standard_fee.is_some_and(|standard| standard != fee),
            above_standard: self.standard_fee.is_some_and(|standard| fee > standard),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_first_at_sign_is_removed() {
        assert_eq!(normalize_identity("@dave"), "dave");
        assert_eq!(normalize_identity("da@ve"), "dave");
        assert_eq!(normalize_identity("@@dave"), "@dave");
        assert_eq!(normalize_identity(" @ "), "");
    }

    #[test]
    fn test_empty_identity_is_inactive() {
        let mut resolver = FeeResolver::new();
        assert!(resolver.set_identity("   ").is_none());
        assert!(resolver.set_identity("@").is_none());
        assert_eq!(resolver.identity(), None);
        assert_eq!(resolver.fee(), None);
    }

    #[test]
    fn test_discount_applies() {
        let mut resolver = FeeResolver::new();
        resolver.set_standard_fee(Some(20_000_000));
        let ticket = resolver.set_identity("@carol").unwrap();
        assert_eq!(ticket.identity, "carol");

        let quote = resolver.complete(&ticket, Some(5_000_000)).unwrap();
        assert_eq!(quote.fee, 5_000_000);
        assert!(quote.discounted);
        assert!(!quote.above_standard);
    }

    #[test]
    fn test_higher_discount_is_flagged_not_corrected() {
        let mut resolver = FeeResolver::new();
        resolver.set_standard_fee(Some(20_000_000));
        let ticket = resolver.set_identity("erin").unwrap();

        let quote = resolver.complete(&ticket, Some(25_000_000)).unwrap();
        assert_eq!(quote.fee, 25_000_000);
        assert!(quote.above_standard);
    }

    #[test]
    fn test_stale_read_is_discarded() {
        let mut resolver = FeeResolver::new();
        let alice = resolver.set_identity("alice").unwrap();
        let bob = resolver.set_identity("bob").unwrap();

        assert!(matches!(
            resolver.complete(&alice, Some(10_000_000)),
            Err(DegenError::StaleRead(_))
        ));
        assert_eq!(resolver.fee(), None);

        resolver.complete(&bob, Some(20_000_000)).unwrap();
        assert_eq!(resolver.fee(), Some(20_000_000));
    }

    #[test]
    fn test_empty_read_falls_back_to_standard_fee() {
        let mut resolver = FeeResolver::new();
        let ticket = resolver.set_identity("dave").unwrap();
        assert!(matches!(
            resolver.complete(&ticket, None),
            Err(DegenError::UnresolvedFee)
        ));

        resolver.set_standard_fee(Some(15_000_000));
        resolver.set_standard_fee(None);
        let quote = resolver.complete(&ticket, None).unwrap();
        assert_eq!(quote.fee, 15_000_000);
        assert!(!quote.discounted);
    }
}
