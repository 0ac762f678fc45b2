//! Instruction builders for the approve, subscribe and renew writes

use crate::{
    ata::{get_associated_token_address_with_program, TokenProgram},
    error::{DegenError, Result},
    pda,
    program_types::SubscribeArgs,
    utils::USDC_DECIMALS,
};
use anchor_client::solana_sdk::instruction::{AccountMeta, Instruction};
use anchor_lang::prelude::Pubkey;
use anchor_lang::solana_program::hash::hash;
use anchor_lang::system_program;
use anchor_lang::AnchorSerialize;

/// Anchor instruction discriminator: first 8 bytes of `sha256("global:<name>")`
#[must_use]
pub fn instruction_discriminator(name: &str) -> [u8; 8] {
    let digest = hash(format!("global:{name}").as_bytes()).to_bytes();
    let mut discriminator = [0u8; 8];
    discriminator.copy_from_slice(&digest[..8]);
    discriminator
}

/// Creates a Memo instruction for transaction traceability
#[must_use]
pub fn create_memo_instruction(memo: &str) -> Instruction {
    Instruction {
        program_id: spl_memo::ID,
        accounts: vec![],
        data: memo.as_bytes().to_vec(),
    }
}

/// Builder for the token approval that authorizes the program delegate
#[derive(Clone, Debug, Default)]
pub struct ApproveBuilder {
    owner: Option<Pubkey>,
    spender: Option<Pubkey>,
    usdc_mint: Option<Pubkey>,
    amount: Option<u64>,
    token_program: Option<TokenProgram>,
}

/// Builder for `subscribe` transactions
#[derive(Clone, Debug, Default)]
pub struct SubscribeBuilder {
    subscriber: Option<Pubkey>,
    usdc_mint: Option<Pubkey>,
    identity: Option<String>,
    token_program: Option<TokenProgram>,
    program_id: Option<Pubkey>,
}

/// Builder for `renew` transactions
#[derive(Clone, Debug, Default)]
pub struct RenewBuilder {
    subscriber: Option<Pubkey>,
    usdc_mint: Option<Pubkey>,
    identity: Option<String>,
    token_program: Option<TokenProgram>,
    program_id: Option<Pubkey>,
}

impl ApproveBuilder {
    /// Create a new approve builder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the token account owner (the acting wallet)
    #[must_use]
    pub const fn owner(mut self, owner: Pubkey) -> Self {
        self.owner = Some(owner);
        self
    }

    /// Set the spender being authorized
    #[must_use]
    pub const fn spender(mut self, spender: Pubkey) -> Self {
        self.spender = Some(spender);
        self
    }

    /// Set the USDC mint
    #[must_use]
    pub const fn usdc_mint(mut self, usdc_mint: Pubkey) -> Self {
        self.usdc_mint = Some(usdc_mint);
        self
    }

    /// Set the exact amount to authorize
    #[must_use]
    pub const fn amount(mut self, amount: u64) -> Self {
        self.amount = Some(amount);
        self
    }

    /// Set the token program to use
    #[must_use]
    pub const fn token_program(mut self, token_program: TokenProgram) -> Self {
        self.token_program = Some(token_program);
        self
    }

    /// Build the `approve_checked` instruction
    ///
    /// Replaces any existing delegation on the owner's token account.
    pub fn build_instruction(self) -> Result<Instruction> {
        let owner = self.owner.ok_or("Owner not set")?;
        let spender = self.spender.ok_or("Spender not set")?;
        let usdc_mint = self.usdc_mint.ok_or("USDC mint not set")?;
        let amount = self.amount.ok_or("Amount not set")?;
        let token_program = self.token_program.unwrap_or(TokenProgram::Token);

        let owner_ata = get_associated_token_address_with_program(&owner, &usdc_mint, token_program);

        let instruction = match token_program {
            TokenProgram::Token => spl_token::instruction::approve_checked(
                &token_program.program_id(),
                &owner_ata,
                &usdc_mint,
                &spender,
                &owner,
                &[],
                amount,
                USDC_DECIMALS,
            ),
            TokenProgram::Token2022 => spl_token_2022::instruction::approve_checked(
                &token_program.program_id(),
                &owner_ata,
                &usdc_mint,
                &spender,
                &owner,
                &[],
                amount,
                USDC_DECIMALS,
            ),
        }
        .map_err(|e| DegenError::Generic(format!("Failed to build approve instruction: {e}")))?;

        Ok(instruction)
    }
}

impl SubscribeBuilder {
    /// Create a new subscribe builder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the subscriber pubkey
    #[must_use]
    pub const fn subscriber(mut self, subscriber: Pubkey) -> Self {
        self.subscriber = Some(subscriber);
        self
    }

    /// Set the USDC mint
    #[must_use]
    pub const fn usdc_mint(mut self, usdc_mint: Pubkey) -> Self {
        self.usdc_mint = Some(usdc_mint);
        self
    }

    /// Set the identity (Telegram handle) to bind
    #[must_use]
    pub fn identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = Some(identity.into());
        self
    }

    /// Set the token program to use
    #[must_use]
    pub const fn token_program(mut self, token_program: TokenProgram) -> Self {
        self.token_program = Some(token_program);
        self
    }

    /// Set the program ID to use
    #[must_use]
    pub const fn program_id(mut self, program_id: Pubkey) -> Self {
        self.program_id = Some(program_id);
        self
    }

    /// Build the transaction instructions
    ///
    /// # Returns
    /// * `Ok(Vec<Instruction>)` - `subscribe` followed by a traceability memo
    /// * `Err(DegenError)` - If a required field is missing or serialization fails
    pub fn build_instructions(self) -> Result<Vec<Instruction>> {
        let subscriber = self.subscriber.ok_or("Subscriber not set")?;
        let usdc_mint = self.usdc_mint.ok_or("USDC mint not set")?;
        let identity = self.identity.ok_or("Identity not set")?;
        let token_program = self.token_program.unwrap_or(TokenProgram::Token);
        let program_id = match self.program_id {
            Some(program_id) => program_id,
            None => crate::program_id()?,
        };

        let accounts = PaymentAccounts::derive(
            &subscriber,
            &usdc_mint,
            &identity,
            token_program,
            &program_id,
        );

        let mut data = instruction_discriminator("subscribe").to_vec();
        SubscribeArgs {
            telegram_username: identity.clone(),
        }
        .serialize(&mut data)
        .map_err(|e| DegenError::Generic(format!("Failed to serialize args: {e}")))?;

        let subscribe_ix = Instruction {
            program_id,
            accounts: accounts.metas(),
            data,
        };

        Ok(vec![
            subscribe_ix,
            create_memo_instruction(&format!("degen:subscribe:{identity}")),
        ])
    }
}

impl RenewBuilder {
    /// Create a new renew builder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the subscriber pubkey
    #[must_use]
    pub const fn subscriber(mut self, subscriber: Pubkey) -> Self {
        self.subscriber = Some(subscriber);
        self
    }

    /// Set the USDC mint
    #[must_use]
    pub const fn usdc_mint(mut self, usdc_mint: Pubkey) -> Self {
        self.usdc_mint = Some(usdc_mint);
        self
    }

    /// Set the identity stored on the subscription (used for the discount account)
    #[must_use]
    pub fn identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = Some(identity.into());
        self
    }

    /// Set the token program to use
    #[must_use]
    pub const fn token_program(mut self, token_program: TokenProgram) -> Self {
        self.token_program = Some(token_program);
        self
    }

    /// Set the program ID to use
    #[must_use]
    pub const fn program_id(mut self, program_id: Pubkey) -> Self {
        self.program_id = Some(program_id);
        self
    }

    /// Build the `renew` instruction
    pub fn build_instruction(self) -> Result<Instruction> {
        let subscriber = self.subscriber.ok_or("Subscriber not set")?;
        let usdc_mint = self.usdc_mint.ok_or("USDC mint not set")?;
        let identity = self.identity.ok_or("Identity not set")?;
        let token_program = self.token_program.unwrap_or(TokenProgram::Token);
        let program_id = match self.program_id {
            Some(program_id) => program_id,
            None => crate::program_id()?,
        };

        let accounts = PaymentAccounts::derive(
            &subscriber,
            &usdc_mint,
            &identity,
            token_program,
            &program_id,
        );

        Ok(Instruction {
            program_id,
            accounts: accounts.metas(),
            data: instruction_discriminator("renew").to_vec(),
        })
    }
}

/// Accounts shared by `subscribe` and `renew`
struct PaymentAccounts {
    config: Pubkey,
    subscription: Pubkey,
    discount: Pubkey,
    subscriber: Pubkey,
    subscriber_ata: Pubkey,
    treasury_ata: Pubkey,
    usdc_mint: Pubkey,
    delegate: Pubkey,
    token_program: Pubkey,
}

impl PaymentAccounts {
    fn derive(
        subscriber: &Pubkey,
        usdc_mint: &Pubkey,
        identity: &str,
        token_program: TokenProgram,
        program_id: &Pubkey,
    ) -> Self {
        let config = pda::config_address_with_program_id(program_id);
        Self {
            config,
            subscription: pda::subscription_address_with_program_id(subscriber, program_id),
            discount: pda::discount_address_with_program_id(identity, program_id),
            subscriber: *subscriber,
            subscriber_ata: get_associated_token_address_with_program(
                subscriber,
                usdc_mint,
                token_program,
            ),
            treasury_ata: get_associated_token_address_with_program(
                &config,
                usdc_mint,
                token_program,
            ),
            usdc_mint: *usdc_mint,
            delegate: pda::delegate_address_with_program_id(program_id),
            token_program: token_program.program_id(),
        }
    }

    fn metas(&self) -> Vec<AccountMeta> {
        vec![
            AccountMeta::new(self.config, false),                // config
            AccountMeta::new(self.subscription, false),          // subscription (PDA)
            AccountMeta::new_readonly(self.discount, false),     // discount (may be empty)
            AccountMeta::new(self.subscriber, true),             // subscriber (signer)
            AccountMeta::new(self.subscriber_ata, false),        // subscriber_usdc_ata
            AccountMeta::new(self.treasury_ata, false),          // treasury_ata
            AccountMeta::new_readonly(self.usdc_mint, false),    // usdc_mint
            AccountMeta::new_readonly(self.delegate, false),     // program_delegate
            AccountMeta::new_readonly(self.token_program, false), // token_program
            AccountMeta::new_readonly(system_program::ID, false), // system_program
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_approve_is_exact_amount_to_spender() {
        let owner = Pubkey::new_unique();
        let spender = Pubkey::new_unique();
        let mint = Pubkey::new_unique();

        let ix = ApproveBuilder::new()
            .owner(owner)
            .spender(spender)
            .usdc_mint(mint)
            .amount(15_000_000)
            .build_instruction()
            .unwrap();

        assert_eq!(ix.program_id, spl_token::id());
        assert!(ix.accounts.iter().any(|meta| meta.pubkey == spender));
        // ApproveChecked: tag 13, u64 amount, u8 decimals
        assert_eq!(ix.data[0], 13);
        assert_eq!(&ix.data[1..9], &15_000_000u64.to_le_bytes());
        assert_eq!(ix.data[9], USDC_DECIMALS);
    }

    #[test]
    fn test_approve_requires_amount() {
        let result = ApproveBuilder::new()
            .owner(Pubkey::new_unique())
            .spender(Pubkey::new_unique())
            .usdc_mint(Pubkey::new_unique())
            .build_instruction();
        assert!(result.is_err());
    }

    #[test]
    fn test_subscribe_instruction_layout() {
        let program_id = Pubkey::new_unique();
        let subscriber = Pubkey::new_unique();

        let instructions = SubscribeBuilder::new()
            .subscriber(subscriber)
            .usdc_mint(Pubkey::new_unique())
            .identity("dave")
            .program_id(program_id)
            .build_instructions()
            .unwrap();

        assert_eq!(instructions.len(), 2);
        let subscribe = &instructions[0];
        assert_eq!(subscribe.program_id, program_id);
        assert_eq!(&subscribe.data[..8], &instruction_discriminator("subscribe"));
        // borsh string: u32 length prefix then bytes
        assert_eq!(&subscribe.data[8..12], &4u32.to_le_bytes());
        assert_eq!(&subscribe.data[12..], b"dave");
        assert!(subscribe.accounts[3].is_signer);
        assert_eq!(subscribe.accounts[3].pubkey, subscriber);
        assert_eq!(
            subscribe.accounts[2].pubkey,
            pda::discount_address_with_program_id("dave", &program_id)
        );

        assert_eq!(instructions[1].program_id, spl_memo::ID);
        assert_eq!(instructions[1].data, b"degen:subscribe:dave");
    }

    #[test]
    fn test_renew_has_no_args() {
        let program_id = Pubkey::new_unique();
        let ix = RenewBuilder::new()
            .subscriber(Pubkey::new_unique())
            .usdc_mint(Pubkey::new_unique())
            .identity("alice")
            .program_id(program_id)
            .build_instruction()
            .unwrap();

        assert_eq!(ix.data, instruction_discriminator("renew").to_vec());
        assert_eq!(ix.accounts.len(), 10);
    }

    #[test]
    fn test_discriminators_differ() {
        assert_ne!(
            instruction_discriminator("subscribe"),
            instruction_discriminator("renew")
        );
    }
}
