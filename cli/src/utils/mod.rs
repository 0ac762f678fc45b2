//! Shared helpers for CLI commands

pub mod formatting;

use degen_sdk::DegenError;

/// Turn an SDK error into the single message shown to the user
///
/// The diagnostic form is already in the log.
#[must_use]
pub fn user_error(error: &DegenError) -> anyhow::Error {
    anyhow::anyhow!(error.user_message())
}
