//! RPC-backed [`Ledger`] for the Degen subscription program

use crate::{
    ata::{
        get_associated_token_address_with_program, parse_token_account, TokenAccountState,
        TokenProgram,
    },
    error::{DegenError, Result},
    ledger::Ledger,
    pda,
    program_types::{DiscountAccount, LedgerConfig, SubscriptionAccount, SubscriptionRecord},
    tracker::TransactionState,
    transaction_builder::{ApproveBuilder, RenewBuilder, SubscribeBuilder},
    utils,
};
use anchor_client::solana_client::nonblocking::rpc_client::RpcClient;
use anchor_client::solana_sdk::{
    account::Account,
    clock::Clock,
    commitment_config::CommitmentConfig,
    instruction::Instruction,
    pubkey::Pubkey,
    signature::Signature,
    signer::{Signer, SignerError},
    sysvar,
    transaction::Transaction,
};
use anchor_lang::AnchorDeserialize;
use async_trait::async_trait;
use tracing::{debug, info};
use url::Url;

/// Builder for [`RpcLedger`]
pub struct RpcLedgerBuilder<S> {
    rpc_url: String,
    signer: S,
    program_id: Option<Pubkey>,
    usdc_mint: Option<Pubkey>,
    token_program: TokenProgram,
    commitment: CommitmentConfig,
}

impl<S: Signer + Send + Sync> RpcLedgerBuilder<S> {
    /// Use an explicit program ID instead of `DEGEN_PROGRAM_ID`
    #[must_use]
    pub const fn program_id(mut self, program_id: Pubkey) -> Self {
        self.program_id = Some(program_id);
        self
    }

    /// Pin the USDC mint instead of reading it from the program config
    #[must_use]
    pub const fn usdc_mint(mut self, usdc_mint: Pubkey) -> Self {
        self.usdc_mint = Some(usdc_mint);
        self
    }

    /// Token program holding the subscriber's USDC
    #[must_use]
    pub const fn token_program(mut self, token_program: TokenProgram) -> Self {
        self.token_program = token_program;
        self
    }

    /// Commitment used for reads
    #[must_use]
    pub const fn commitment(mut self, commitment: CommitmentConfig) -> Self {
        self.commitment = commitment;
        self
    }

    /// Validate the settings and create the ledger
    ///
    /// # Errors
    /// Returns an error if the RPC URL is not an http(s) URL or no program ID
    /// is available.
    pub fn build(self) -> Result<RpcLedger<S>> {
        let url = Url::parse(&self.rpc_url)
            .map_err(|e| DegenError::Generic(format!("Invalid RPC URL '{}': {e}", self.rpc_url)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(DegenError::Generic(format!(
                "Invalid RPC URL '{}': expected http or https",
                self.rpc_url
            )));
        }

        let program_id = match self.program_id {
            Some(program_id) => program_id,
            None => crate::program_id()?,
        };

        info!(
            service = "degen-sdk",
            component = "rpc_ledger",
            event = "ledger_created",
            rpc_url = %url,
            program_id = %program_id,
            owner = %self.signer.pubkey(),
            token_program = ?self.token_program,
        );

        Ok(RpcLedger {
            rpc: RpcClient::new_with_commitment(self.rpc_url, self.commitment),
            signer: self.signer,
            program_id,
            usdc_mint: self.usdc_mint,
            token_program: self.token_program,
            commitment: self.commitment,
        })
    }
}

/// Ledger backed by a Solana RPC node and a local signer
pub struct RpcLedger<S> {
    rpc: RpcClient,
    signer: S,
    program_id: Pubkey,
    usdc_mint: Option<Pubkey>,
    token_program: TokenProgram,
    commitment: CommitmentConfig,
}

impl<S: Signer + Send + Sync> RpcLedger<S> {
    /// Start building a ledger for `rpc_url` that signs with `signer`
    pub fn builder(rpc_url: impl Into<String>, signer: S) -> RpcLedgerBuilder<S> {
        RpcLedgerBuilder {
            rpc_url: rpc_url.into(),
            signer,
            program_id: None,
            usdc_mint: None,
            token_program: TokenProgram::Token,
            commitment: CommitmentConfig::confirmed(),
        }
    }

    #[must_use]
    pub const fn program_id(&self) -> Pubkey {
        self.program_id
    }

    #[must_use]
    pub const fn rpc(&self) -> &RpcClient {
        &self.rpc
    }

    /// Fetch the program config
    ///
    /// # Errors
    /// [`DegenError::NotInitialized`] when the config account does not exist.
    pub async fn config(&self) -> Result<LedgerConfig> {
        let address = pda::config_address_with_program_id(&self.program_id);
        let account = self
            .fetch_account(&address)
            .await?
            .ok_or_else(|| DegenError::NotInitialized(address.to_string()))?;
        decode_anchor_account(&account.data, "config")
    }

    /// USDC mint, pinned or read from the config
    pub async fn usdc_mint(&self) -> Result<Pubkey> {
        match self.usdc_mint {
            Some(mint) => Ok(mint),
            None => Ok(self.config().await?.usdc_mint),
        }
    }

    /// Discount account for `identity`, if one exists
    pub async fn discount(&self, identity: &str) -> Result<Option<DiscountAccount>> {
        let address = pda::discount_address_with_program_id(identity, &self.program_id);
        self.fetch_account(&address)
            .await?
            .map(|account| decode_anchor_account(&account.data, "discount"))
            .transpose()
    }

    /// Cluster clock; subscription activity is judged on ledger time
    pub async fn clock(&self) -> Result<Clock> {
        let account = self
            .fetch_account(&sysvar::clock::ID)
            .await?
            .ok_or_else(|| DegenError::AccountNotFound(sysvar::clock::ID.to_string()))?;
        bincode::deserialize(&account.data)
            .map_err(|e| DegenError::Generic(format!("Failed to deserialize clock: {e}")))
    }

    async fn fetch_account(&self, address: &Pubkey) -> Result<Option<Account>> {
        Ok(self
            .rpc
            .get_account_with_commitment(address, self.commitment)
            .await?
            .value)
    }

    async fn token_account(&self, owner: &Pubkey) -> Result<Option<TokenAccountState>> {
        let mint = self.usdc_mint().await?;
        let ata = get_associated_token_address_with_program(owner, &mint, self.token_program);
        self.fetch_account(&ata)
            .await?
            .map(|account| parse_token_account(&account))
            .transpose()
    }

    async fn raw_subscription(&self, account: &Pubkey) -> Result<Option<SubscriptionAccount>> {
        let address = pda::subscription_address_with_program_id(account, &self.program_id);
        self.fetch_account(&address)
            .await?
            .map(|account| decode_anchor_account(&account.data, "subscription"))
            .transpose()
    }

    /// Sign and submit without waiting for confirmation
    async fn submit(&self, instructions: &[Instruction], label: &str) -> Result<Signature> {
        let owner = self.signer.pubkey();
        let blockhash = self.rpc.get_latest_blockhash().await?;

        let mut transaction = Transaction::new_with_payer(instructions, Some(&owner));
        transaction
            .try_sign(&[&self.signer], blockhash)
            .map_err(|e| map_signer_error(e, label))?;

        let signature = self.rpc.send_transaction(&transaction).await?;
        debug!(
            service = "degen-sdk",
            component = "rpc_ledger",
            event = "transaction_sent",
            kind = label,
            signature = %signature,
        );
        Ok(signature)
    }
}

#[async_trait]
impl<S: Signer + Send + Sync> Ledger for RpcLedger<S> {
    fn owner(&self) -> Pubkey {
        self.signer.pubkey()
    }

    fn spender(&self) -> Pubkey {
        pda::delegate_address_with_program_id(&self.program_id)
    }

    async fn subscription(&self, account: &Pubkey) -> Result<Option<SubscriptionRecord>> {
        Ok(self.raw_subscription(account).await?.map(Into::into))
    }

    async fn standard_fee(&self) -> Result<Option<u64>> {
        Ok(Some(self.config().await?.subscription_fee))
    }

    async fn effective_fee(&self, identity: &str) -> Result<Option<u64>> {
        let (discount, config) = tokio::join!(self.discount(identity), self.config());

        if let Some(discount) = discount? {
            return Ok(Some(discount.price));
        }
        match config {
            Ok(config) => Ok(Some(config.subscription_fee)),
            Err(DegenError::NotInitialized(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn is_active(&self, account: &Pubkey) -> Result<bool> {
        let (record, clock) = tokio::join!(self.raw_subscription(account), self.clock());
        let Some(record) = record? else {
            return Ok(false);
        };
        Ok(utils::is_active_at(record.expires_at, clock?.unix_timestamp))
    }

    async fn is_in_grace_period(&self, account: &Pubkey) -> Result<bool> {
        let (record, clock, config) =
            tokio::join!(self.raw_subscription(account), self.clock(), self.config());
        let Some(record) = record? else {
            return Ok(false);
        };
        Ok(utils::is_in_grace_period_at(
            record.expires_at,
            config?.grace_period_secs,
            clock?.unix_timestamp,
        ))
    }

    async fn allowance(&self, owner: &Pubkey, spender: &Pubkey) -> Result<u64> {
        Ok(self
            .token_account(owner)
            .await?
            .map_or(0, |state| state.allowance_for(spender)))
    }

    async fn token_balance(&self, account: &Pubkey) -> Result<u64> {
        Ok(self
            .token_account(account)
            .await?
            .map_or(0, |state| state.amount))
    }

    async fn approve(&self, spender: &Pubkey, amount: u64) -> Result<Signature> {
        let instruction = ApproveBuilder::new()
            .owner(self.signer.pubkey())
            .spender(*spender)
            .usdc_mint(self.usdc_mint().await?)
            .amount(amount)
            .token_program(self.token_program)
            .build_instruction()?;
        self.submit(&[instruction], "approve").await
    }

    async fn subscribe(&self, identity: &str) -> Result<Signature> {
        let instructions = SubscribeBuilder::new()
            .subscriber(self.signer.pubkey())
            .usdc_mint(self.usdc_mint().await?)
            .identity(identity)
            .token_program(self.token_program)
            .program_id(self.program_id)
            .build_instructions()?;
        self.submit(&instructions, "subscribe").await
    }

    async fn renew(&self) -> Result<Signature> {
        let owner = self.signer.pubkey();
        let record = self
            .raw_subscription(&owner)
            .await?
            .ok_or(DegenError::NoSubscription)?;
        let instruction = RenewBuilder::new()
            .subscriber(owner)
            .usdc_mint(self.usdc_mint().await?)
            .identity(record.telegram_username)
            .token_program(self.token_program)
            .program_id(self.program_id)
            .build_instruction()?;
        self.submit(&[instruction], "renew").await
    }

    async fn transaction_status(&self, signature: &Signature) -> Result<TransactionState> {
        let statuses = self.rpc.get_signature_statuses(&[*signature]).await?.value;
        let state = match statuses.into_iter().next().flatten() {
            None => TransactionState::Submitted,
            Some(status) => match &status.err {
                Some(err) => TransactionState::Failed(
                    DegenError::from_transaction_error(err).user_message(),
                ),
                None if status.satisfies_commitment(CommitmentConfig::confirmed()) => {
                    TransactionState::Confirmed
                }
                None => TransactionState::Confirming,
            },
        };
        Ok(state)
    }
}

/// Decode an Anchor account, skipping its 8-byte discriminator
///
/// Accounts are allocated at their maximum size, so trailing bytes are
/// expected and ignored.
fn decode_anchor_account<T: AnchorDeserialize>(data: &[u8], name: &str) -> Result<T> {
    let body = data
        .get(8..)
        .ok_or_else(|| DegenError::Generic(format!("Invalid {name} account data")))?;
    <T as AnchorDeserialize>::deserialize(&mut &body[..])
        .map_err(|e| DegenError::Generic(format!("Failed to deserialize {name}: {e}")))
}

/// A refused approval is the user's decision; any other refusal is a failed write
fn map_signer_error(error: SignerError, label: &str) -> DegenError {
    match error {
        SignerError::UserCancel(_) if label == "approve" => {
            DegenError::AuthorizationRejectedBySigner
        }
        SignerError::UserCancel(message) => DegenError::WriteReverted {
            reason: Some(message),
        },
        other => DegenError::Generic(format!("Failed to sign {label} transaction: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anchor_client::solana_sdk::signature::Keypair;

    #[test]
    fn test_builder_rejects_bad_url() {
        let result = RpcLedger::builder("not a url", Keypair::new())
            .program_id(Pubkey::new_unique())
            .build();
        assert!(result.is_err());

        let result = RpcLedger::builder("ftp://example.com", Keypair::new())
            .program_id(Pubkey::new_unique())
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_spender_is_delegate_pda() {
        let program_id = Pubkey::new_unique();
        let signer = Keypair::new();
        let owner = signer.pubkey();
        let ledger = RpcLedger::builder("http://localhost:8899", signer)
            .program_id(program_id)
            .build()
            .unwrap();

        assert_eq!(ledger.owner(), owner);
        assert_eq!(
            ledger.spender(),
            pda::delegate_address_with_program_id(&program_id)
        );
    }

    #[test]
    fn test_decode_anchor_account_skips_discriminator() {
        let account = DiscountAccount {
            telegram_username: "carol".to_string(),
            price: 5_000_000,
            bump: 255,
        };
        let mut data = vec![0u8; 8];
        anchor_lang::AnchorSerialize::serialize(&account, &mut data).unwrap();
        data.extend_from_slice(&[0u8; 32]);

        let decoded: DiscountAccount = decode_anchor_account(&data, "discount").unwrap();
        assert_eq!(decoded, account);
        assert!(decode_anchor_account::<DiscountAccount>(&[0u8; 4], "discount").is_err());
    }

    #[test]
    fn test_signer_refusal_mapping() {
        assert!(matches!(
            map_signer_error(SignerError::UserCancel("no".to_string()), "approve"),
            DegenError::AuthorizationRejectedBySigner
        ));
        assert!(matches!(
            map_signer_error(SignerError::UserCancel("no".to_string()), "subscribe"),
            DegenError::WriteReverted { reason: Some(_) }
        ));
    }
}
