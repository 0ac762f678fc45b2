//! Lookup command implementation

use crate::{
    config::DegenCliConfig,
    utils::{
        formatting::{format_lookup, Report},
        user_error,
    },
};
use anyhow::Result;
use degen_sdk::{parse_address, Ledger, SubscriptionSession};

/// Execute the lookup command for any account (base58 or hex address)
pub async fn execute<L: Ledger>(
    session: &SubscriptionSession<L>,
    address: &str,
    config: &DegenCliConfig,
) -> Result<Report> {
    let account = parse_address(address).map_err(|e| anyhow::anyhow!(e))?;
    let status = session.lookup(&account).await.map_err(|e| user_error(&e))?;
    Ok(format_lookup(&status, config))
}
