//! Renew command implementation

use crate::utils::{
    formatting::{format_abandoned, format_step, Report},
    user_error,
};
use anyhow::Result;
use degen_sdk::{format_usdc, Ledger, SubscriptionSession};
use tracing::info;

/// Execute the renew command
///
/// Renews the existing subscription at the fee for its stored username. The
/// approval and Ctrl-C handling match the subscribe command.
///
/// # Errors
///
/// Returns an error if there is no subscription, the balance does not cover
/// the fee, or any transaction is rejected.
pub async fn execute<L: Ledger>(session: &mut SubscriptionSession<L>) -> Result<Report> {
    session.refresh().await.map_err(|e| user_error(&e))?;

    if let Some(record) = session.record().filter(|record| record.has_identity()) {
        info!(
            service = "degen-cli",
            component = "renew",
            event = "renew_requested",
            identity = %record.identity,
            average_payment = %format_usdc(record.average_payment()),
        );
    }

    let outcome = tokio::select! {
        step = session.renew() => Some(step),
        _ = tokio::signal::ctrl_c() => None,
    };

    let Some(step) = outcome else {
        session.abandon();
        return Ok(format_abandoned());
    };
    let step = step.map_err(|e| user_error(&e))?;

    Ok(format_step(&step))
}
