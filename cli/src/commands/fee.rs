//! Fee command implementation

use crate::{
    config::DegenCliConfig,
    utils::{
        formatting::{format_quote, Report},
        user_error,
    },
};
use anyhow::Result;
use degen_sdk::{DegenError, Ledger, SubscriptionSession};

/// Execute the fee command
///
/// # Errors
///
/// Returns an error if the username is empty or no fee can be read
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

    Ok(format_quote(&ticket.identity, &quote, config))
}
