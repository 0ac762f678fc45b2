//! Program Derived Address (PDA) computation utilities

use crate::{error::Result, program_id};
use anchor_client::solana_sdk::pubkey::Pubkey;
use anchor_lang::solana_program::hash::hash;

/// Compute the config PDA with custom program ID
#[must_use]
pub fn config_with_program_id(program_id: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[b"config"], program_id)
}

/// Compute the config PDA address only (without bump) with custom program ID
#[must_use]
pub fn config_address_with_program_id(program_id: &Pubkey) -> Pubkey {
    config_with_program_id(program_id).0
}

/// Compute the config PDA address using the program ID from the environment
///
/// # Errors
/// Returns an error if `DEGEN_PROGRAM_ID` is unset or invalid
pub fn config_address() -> Result<Pubkey> {
    Ok(config_address_with_program_id(&program_id()?))
}

/// Compute the subscription PDA for a subscriber with custom program ID
///
/// # Arguments
/// * `subscriber` - The paying wallet
/// * `program_id` - The program ID to use for PDA computation
///
/// # Returns
/// * `(Pubkey, u8)` - The PDA address and bump seed
#[must_use]
pub fn subscription_with_program_id(subscriber: &Pubkey, program_id: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[b"subscription", subscriber.as_ref()], program_id)
}

/// Compute the subscription PDA address only (without bump) with custom program ID
#[must_use]
pub fn subscription_address_with_program_id(subscriber: &Pubkey, program_id: &Pubkey) -> Pubkey {
    subscription_with_program_id(subscriber, program_id).0
}

/// Compute the subscription PDA address using the program ID from the environment
///
/// # Errors
/// Returns an error if `DEGEN_PROGRAM_ID` is unset or invalid
pub fn subscription_address(subscriber: &Pubkey) -> Result<Pubkey> {
    Ok(subscription_address_with_program_id(
        subscriber,
        &program_id()?,
    ))
}

/// Seed used for an identity's discount account
///
/// Usernames can exceed the 32-byte seed limit, so the program seeds with
/// their SHA-256 digest.
#[must_use]
pub fn identity_seed(identity: &str) -> [u8; 32] {
    hash(identity.as_bytes()).to_bytes()
}

/// Compute the discount PDA for an identity with custom program ID
///
/// # Arguments
/// * `identity` - Normalized Telegram handle
/// * `program_id` - The program ID to use for PDA computation
///
/// # Returns
/// * `(Pubkey, u8)` - The PDA address and bump seed
#[must_use]
pub fn discount_with_program_id(identity: &str, program_id: &Pubkey) -> (Pubkey, u8) {
    let seed = identity_seed(identity);
    Pubkey::find_program_address(&[b"discount", seed.as_ref()], program_id)
}

/// Compute the discount PDA address only (without bump) with custom program ID
#[must_use]
pub fn discount_address_with_program_id(identity: &str, program_id: &Pubkey) -> Pubkey {
    discount_with_program_id(identity, program_id).0
}

/// Compute the program delegate PDA with custom program ID
///
/// This is the spender every subscriber approves; the program signs token
/// transfers with it.
#[must_use]
pub fn delegate_with_program_id(program_id: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[b"delegate"], program_id)
}

/// Compute the program delegate PDA address only (without bump) with custom program ID
#[must_use]
pub fn delegate_address_with_program_id(program_id: &Pubkey) -> Pubkey {
    delegate_with_program_id(program_id).0
}

/// Compute the program delegate PDA address using the program ID from the environment
///
/// # Errors
/// Returns an error if `DEGEN_PROGRAM_ID` is unset or invalid
pub fn delegate_address() -> Result<Pubkey> {
    Ok(delegate_address_with_program_id(&program_id()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscription_pda_is_deterministic_per_subscriber() {
        let program_id = Pubkey::new_unique();
        let alice = Pubkey::new_unique();
        let bob = Pubkey::new_unique();

        let first = subscription_address_with_program_id(&alice, &program_id);
        let second = subscription_address_with_program_id(&alice, &program_id);
        let other = subscription_address_with_program_id(&bob, &program_id);

        assert_eq!(first, second);
        assert_ne!(first, other);
    }

    #[test]
    fn test_discount_pda_handles_long_identities() {
        let program_id = Pubkey::new_unique();
        let long_identity = "x".repeat(64);

        let (address, _bump) = discount_with_program_id(&long_identity, &program_id);
        assert_ne!(
            address,
            discount_address_with_program_id("carol", &program_id)
        );
    }

    #[test]
    fn test_pdas_are_distinct() {
        let program_id = Pubkey::new_unique();
        let config = config_address_with_program_id(&program_id);
        let delegate = delegate_address_with_program_id(&program_id);
        assert_ne!(config, delegate);
    }
}
