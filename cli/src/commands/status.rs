//! Status command implementation

use crate::{
    config::DegenCliConfig,
    utils::{
        formatting::{format_status, Report},
        user_error,
    },
};
use anyhow::Result;
use degen_sdk::{Ledger, SubscriptionSession};
use tracing::debug;

/// Execute the status command
///
/// Shows the acting wallet's subscription, balance, authorization and fee.
/// When a subscription exists, the fee is resolved for its stored identity so
/// a discounted renewal price is shown.
pub async fn execute<L: Ledger>(
    session: &mut SubscriptionSession<L>,
    period_secs: Option<i64>,
    config: &DegenCliConfig,
) -> Result<Report> {
    session.refresh().await.map_err(|e| user_error(&e))?;

    let identity = session
        .record()
        .filter(|record| record.has_identity())
        .map(|record| record.identity.clone());
    if let Some(identity) = identity {
        session.set_identity(&identity);
        if let Err(e) = session.quote().await {
            debug!(
                service = "degen-cli",
                component = "status",
                event = "quote_unavailable",
                error = %e,
            );
        }
    }

    Ok(format_status(&session.status(), period_secs, config))
}
