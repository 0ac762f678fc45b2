//! Loading the subscriber's signing keypair

use crate::error::{DegenError, Result};
use anchor_client::solana_sdk::signature::{read_keypair_file, Keypair};
use std::path::PathBuf;

/// Path of the Solana CLI default keypair (`~/.config/solana/id.json`)
pub fn default_keypair_path() -> Result<PathBuf> {
    Ok(dirs::home_dir()
        .ok_or_else(|| DegenError::Generic("Cannot determine home directory".to_string()))?
        .join(".config")
        .join("solana")
        .join("id.json"))
}

/// Load the subscriber keypair from `keypair_path`, or the Solana CLI default
///
/// # Errors
/// Returns an error if the file is missing or is not a keypair JSON array.
pub fn load_keypair(keypair_path: Option<&str>) -> Result<Keypair> {
    if let Some(path) = keypair_path {
        return read_keypair_file(path)
            .map_err(|e| DegenError::Generic(format!("Failed to load keypair from {path}: {e}")));
    }

    let default_path = default_keypair_path()?;
    read_keypair_file(&default_path).map_err(|e| {
        DegenError::Generic(format!(
            "Failed to load default keypair from {}: {e}. Use --keypair to choose the subscriber wallet.",
            default_path.display()
        ))
    })
}
