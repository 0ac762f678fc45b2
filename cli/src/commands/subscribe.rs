//! Subscribe command implementation

use crate::{
    config::DegenCliConfig,
    utils::{
        formatting::{format_abandoned, format_quote, format_step, Report},
        user_error,
    },
};
use anyhow::Result;
use degen_sdk::{DegenError, Ledger, SubscriptionSession};
use tracing::info;

/// Execute the subscribe command
///
/// Approves the program delegate for exactly the fee when needed, waits for
/// the approval, then subscribes. Ctrl-C stops waiting; transactions already
/// sent complete on their own.
///
/// # Errors
///
/// Returns an error if:
/// - The username is empty
/// - The USDC balance does not cover the fee
/// - The approval is rejected or fails
/// - The subscribe transaction is rejected by the program
pub async fn execute<L: Ledger>(
    session: &mut SubscriptionSession<L>,
    identity: &str,
    config: &DegenCliConfig,
) -> Result<Report> {
    session.refresh().await.map_err(|e| user_error(&e))?;

    let ticket = session
        .set_identity(identity)
        .ok_or_else(|| user_error(&DegenError::EmptyIdentity))?;
    let quote = session.quote().await.map_err(|e| user_error(&e))?;
    let quote_report = format_quote(&ticket.identity, &quote, config);

    info!(
        service = "degen-cli",
        component = "subscribe",
        event = "subscribe_requested",
        identity = %ticket.identity,
        fee = quote.fee,
    );

    let outcome = tokio::select! {
        step = session.subscribe() => Some(step),
        _ = tokio::signal::ctrl_c() => None,
    };

    let Some(step) = outcome else {
        session.abandon();
        return Ok(format_abandoned());
    };
    let step = step.map_err(|e| user_error(&e))?;

    let report = format_step(&step);
    Ok(Report {
        human: format!("{}\n{}", quote_report.human, report.human),
        data: serde_json::json!({ "quote": quote_report.data, "result": report.data }),
    })
}
