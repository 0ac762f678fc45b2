//! Spendable balance pre-check

use crate::error::{DegenError, Result};
use tracing::debug;

/// Result of checking a fee against a balance
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Admission {
    /// Balance covers the fee
    Accepted,
    /// Fee or balance is not known yet
    Undecided,
    /// Balance is below the fee
    Rejected { required: u64, available: u64 },
}

impl Admission {
    /// Turn a rejection into [`DegenError::InsufficientBalance`]
    pub fn into_result(self) -> Result<Self> {
        match self {
            Self::Rejected {
                required,
                available,
            } => Err(DegenError::InsufficientBalance {
                required,
                available,
            }),
            other => Ok(other),
        }
    }
}

/// Checks that the acting account can pay a fee before anything is submitted
#[derive(Clone, Copy, Debug, Default)]
pub struct BalanceGuard;

impl BalanceGuard {
    /// Check `balance` against `fee`
    ///
    /// Unknown values never reject.
    #[must_use]
    pub fn check(fee: Option<u64>, balance: Option<u64>) -> Admission {
        let admission = match (fee, balance) {
            (Some(required), Some(available)) if available < required => Admission::Rejected {
                required,
                available,
            },
            (Some(_), Some(_)) => Admission::Accepted,
            _ => Admission::Undecided,
        };

        debug!(
            service = "degen-sdk",
            component = "balance_guard",
            event = "balance_checked",
            fee = ?fee,
            balance = ?balance,
            admission = ?admission,
        );

        admission
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_shortfall() {
        let admission = BalanceGuard::check(Some(15_000_000), Some(4_000_000));
        assert_eq!(
            admission,
            Admission::Rejected {
                required: 15_000_000,
                available: 4_000_000
            }
        );

        let err = admission.into_result().unwrap_err();
        assert_eq!(err.shortfall(), Some(11_000_000));
        assert!(err.to_string().contains("need 15.00 USDC but only have 4.00 USDC"));
    }

    #[test]
    fn test_exact_balance_is_enough() {
        assert_eq!(
            BalanceGuard::check(Some(15_000_000), Some(15_000_000)),
            Admission::Accepted
        );
    }

    #[test]
    fn test_unknown_values_defer() {
        assert_eq!(BalanceGuard::check(None, Some(0)), Admission::Undecided);
        assert_eq!(BalanceGuard::check(Some(1), None), Admission::Undecided);
        assert!(Admission::Undecided.into_result().is_ok());
    }
}
