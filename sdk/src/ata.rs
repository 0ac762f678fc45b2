//! Associated Token Account (ATA) computation and token account decoding

use crate::{error::Result, DegenError};
use anchor_client::solana_sdk::pubkey::Pubkey;
use anchor_client::solana_sdk::{account::Account, program_pack::Pack};
use spl_token::state::Account as TokenAccount;
use spl_token_2022::extension::StateWithExtensions;

/// Token program variants supported by the SDK
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenProgram {
    /// Classic SPL Token program
    Token,
    /// Token Extensions (Token-2022) program
    Token2022,
}

impl TokenProgram {
    /// Get the program ID for this token program variant
    #[must_use]
    pub const fn program_id(&self) -> Pubkey {
        match self {
            Self::Token => spl_token::id(),
            Self::Token2022 => spl_token_2022::id(),
        }
    }

    /// Detect the token program from an account owner
    ///
    /// # Errors
    /// Returns an error if the owner is neither token program
    pub fn from_owner(owner: &Pubkey) -> Result<Self> {
        if *owner == spl_token::id() {
            Ok(Self::Token)
        } else if *owner == spl_token_2022::id() {
            Ok(Self::Token2022)
        } else {
            Err(DegenError::InvalidTokenProgram {
                expected: "SPL Token or Token-2022".to_string(),
                found: owner.to_string(),
            })
        }
    }
}

/// Fields of a token account that the payment flow reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenAccountState {
    /// Mint the account holds
    pub mint: Pubkey,
    /// Wallet owning the account
    pub owner: Pubkey,
    /// Spendable balance in base units
    pub amount: u64,
    /// Current delegate, if any
    pub delegate: Option<Pubkey>,
    /// Amount the delegate may still pull
    pub delegated_amount: u64,
}

impl TokenAccountState {
    /// Amount `spender` is currently authorized to pull from this account
    ///
    /// A single delegate exists per token account, so any other spender sees
    /// zero.
    #[must_use]
    pub fn allowance_for(&self, spender: &Pubkey) -> u64 {
        match self.delegate {
            Some(delegate) if delegate == *spender => self.delegated_amount,
            _ => 0,
        }
    }
}

/// Get the associated token address with explicit token program
///
/// # Arguments
/// * `wallet` - The wallet pubkey
/// * `mint` - The token mint pubkey
/// * `token_program` - The token program to use
#[must_use]
pub fn get_associated_token_address_with_program(
    wallet: &Pubkey,
    mint: &Pubkey,
    token_program: TokenProgram,
) -> Pubkey {
    spl_associated_token_account::get_associated_token_address_with_program_id(
        wallet,
        mint,
        &token_program.program_id(),
    )
}

/// Decode a token account owned by either token program
///
/// # Arguments
/// * `account` - The raw account fetched from the cluster
///
/// # Returns
/// * `Ok(TokenAccountState)` - The decoded fields
/// * `Err(DegenError)` - If the owner is not a token program or decoding fails
pub fn parse_token_account(account: &Account) -> Result<TokenAccountState> {
    match TokenProgram::from_owner(&account.owner)? {
        TokenProgram::Token => {
            let state = TokenAccount::unpack(&account.data).map_err(|e| {
                DegenError::Generic(format!("Failed to parse SPL Token account: {e}"))
            })?;
            Ok(TokenAccountState {
                mint: state.mint,
                owner: state.owner,
                amount: state.amount,
                delegate: state.delegate.into(),
                delegated_amount: state.delegated_amount,
            })
        }
        TokenProgram::Token2022 => {
            let state =
                StateWithExtensions::<spl_token_2022::state::Account>::unpack(&account.data)
                    .map_err(|e| {
                        DegenError::Generic(format!("Failed to parse Token-2022 account: {e}"))
                    })?;
            Ok(TokenAccountState {
                mint: state.base.mint,
                owner: state.base.owner,
                amount: state.base.amount,
                delegate: state.base.delegate.into(),
                delegated_amount: state.base.delegated_amount,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spl_token::state::AccountState;

    fn packed_token_account(delegate: Option<Pubkey>, delegated_amount: u64) -> Account {
        let state = TokenAccount {
            mint: Pubkey::new_unique(),
            owner: Pubkey::new_unique(),
            amount: 100_000_000,
            delegate: delegate.into(),
            state: AccountState::Initialized,
            is_native: None.into(),
            delegated_amount,
            close_authority: None.into(),
        };
        let mut data = vec![0u8; TokenAccount::LEN];
        TokenAccount::pack(state, &mut data).unwrap();
        Account {
            lamports: 2_039_280,
            data,
            owner: spl_token::id(),
            executable: false,
            rent_epoch: 0,
        }
    }

    #[test]
    fn test_parse_token_account_with_delegate() {
        let spender = Pubkey::new_unique();
        let account = packed_token_account(Some(spender), 15_000_000);

        let state = parse_token_account(&account).unwrap();
        assert_eq!(state.amount, 100_000_000);
        assert_eq!(state.allowance_for(&spender), 15_000_000);
        assert_eq!(state.allowance_for(&Pubkey::new_unique()), 0);
    }

    #[test]
    fn test_parse_token_account_without_delegate() {
        let account = packed_token_account(None, 0);
        let state = parse_token_account(&account).unwrap();
        assert_eq!(state.delegate, None);
        assert_eq!(state.allowance_for(&Pubkey::new_unique()), 0);
    }

    #[test]
    fn test_rejects_non_token_owner() {
        let mut account = packed_token_account(None, 0);
        account.owner = Pubkey::new_unique();
        assert!(matches!(
            parse_token_account(&account),
            Err(DegenError::InvalidTokenProgram { .. })
        ));
    }

    #[test]
    fn test_ata_is_deterministic() {
        let wallet = Pubkey::new_unique();
        let mint = Pubkey::new_unique();
        assert_eq!(
            get_associated_token_address_with_program(&wallet, &mint, TokenProgram::Token),
            get_associated_token_address_with_program(&wallet, &mint, TokenProgram::Token)
        );
        assert_ne!(
            get_associated_token_address_with_program(&wallet, &mint, TokenProgram::Token),
            get_associated_token_address_with_program(&wallet, &mint, TokenProgram::Token2022)
        );
    }
}
