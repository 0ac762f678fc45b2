//! Async driver for subscribe and renew flows
//!
//! [`SubscriptionSession`] owns the fee resolver, the orchestrator, the
//! allowance watcher and the transaction tracker for one acting account and
//! performs the ledger I/O they ask for. It is the UI collaborator's only
//! entry point.
//!
//! # Example
//!
//! ```no_run
//! use degen_sdk::{RpcLedger, SessionConfig, Step, SubscriptionSession};
//! use degen_sdk::solana_sdk::signature::Keypair;
//!
//! # async fn run() -> degen_sdk::Result<()> {
//! let ledger = RpcLedger::builder("https://api.devnet.solana.com", Keypair::new()).build()?;
//! let mut session = SubscriptionSession::new(ledger, SessionConfig::default());
//!
//! session.refresh().await?;
//! session.set_identity("@dave");
//! let quote = session.quote().await?;
//! println!("fee: {}", degen_sdk::utils::format_usdc(quote.fee));
//!
//! match session.subscribe().await? {
//!     Step::Submitted { signature, .. } => println!("subscribed: {signature}"),
//!     Step::StillPending { .. } => println!("still pending, check back later"),
//!     _ => {}
//! }
//! # Ok(())
//! # }
//! ```

use crate::{
    allowance::AllowanceWatcher,
    error::{DegenError, Result},
    fee::{FeeQuote, FeeResolver, FeeTicket},
    ledger::Ledger,
    orchestrator::{ActionOrchestrator, Command, DecisionInputs, PayingAction, Phase},
    program_types::{SubscriptionRecord, SubscriptionStatus},
    tracker::{Confirmation, TransactionTracker},
};
use anchor_client::solana_sdk::{pubkey::Pubkey, signature::Signature};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Timing knobs for a session
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    /// Interval between authorization reads while awaiting allowance
    pub poll_interval: Duration,
    /// Interval between status reads while waiting for the approval to confirm
    pub confirmation_poll_interval: Duration,
    /// How long to wait for the approval to confirm before reporting still pending
    pub confirmation_timeout: Duration,
    /// How long to poll the authorization before reporting still pending
    pub allowance_timeout: Duration,
    /// How long the success notice stays visible
    pub success_display: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            confirmation_poll_interval: Duration::from_secs(1),
            confirmation_timeout: Duration::from_secs(300),
            allowance_timeout: Duration::from_secs(300),
            success_display: Duration::from_secs(10),
        }
    }
}

/// What is still outstanding when a wait timed out
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingStage {
    /// The approval transaction has not confirmed yet
    ApprovalConfirmation,
    /// The approval confirmed but the authorization read does not reflect it yet
    Allowance,
}

/// Progress reported by the session after issuing or waiting
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Step {
    /// No cycle is in flight
    Idle,
    /// The approval was submitted; [`SubscriptionSession::drive`] continues the cycle
    ApprovalSubmitted { signature: Signature, amount: u64 },
    /// The paying write was submitted
    Submitted {
        action: PayingAction,
        signature: Signature,
        resumed: bool,
    },
    /// A bounded wait ran out; the pending action is kept
    StillPending { stage: PendingStage },
}

/// Cached view of the acting account
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStatus {
    /// Acting account
    pub account: String,
    /// Identity currently entered
    pub identity: Option<String>,
    /// Subscription record as last read
    pub record: Option<SubscriptionRecord>,
    /// Activity flags, when the last read succeeded
    pub active: Option<bool>,
    pub in_grace_period: Option<bool>,
    /// Token balance, when the last read succeeded
    pub balance: Option<u64>,
    /// Authorization granted to the spender, when the last read succeeded
    pub allowance: Option<u64>,
    pub standard_fee: Option<u64>,
    /// Resolved fee for the entered identity
    pub quote: Option<FeeQuote>,
}

/// Subscription flows for one acting account against one ledger
pub struct SubscriptionSession<L: Ledger> {
    ledger: L,
    config: SessionConfig,
    fees: FeeResolver,
    orchestrator: ActionOrchestrator,
    watcher: AllowanceWatcher,
    tracker: TransactionTracker,
    record: Option<SubscriptionRecord>,
    active: Option<bool>,
    in_grace_period: Option<bool>,
    balance: Option<u64>,
    allowance: Option<u64>,
}

impl<L: Ledger> SubscriptionSession<L> {
    /// Create a session with nothing read yet
    pub fn new(ledger: L, config: SessionConfig) -> Self {
        Self {
            watcher: AllowanceWatcher::new(config.poll_interval),
            ledger,
            config,
            fees: FeeResolver::new(),
            orchestrator: ActionOrchestrator::new(),
            tracker: TransactionTracker::new(),
            record: None,
            active: None,
            in_grace_period: None,
            balance: None,
            allowance: None,
        }
    }

    pub const fn ledger(&self) -> &L {
        &self.ledger
    }

    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub const fn orchestrator(&self) -> &ActionOrchestrator {
        &self.orchestrator
    }

    pub const fn watcher(&self) -> &AllowanceWatcher {
        &self.watcher
    }

    pub const fn tracker(&self) -> &TransactionTracker {
        &self.tracker
    }

    pub const fn record(&self) -> Option<&SubscriptionRecord> {
        self.record.as_ref()
    }

    /// Replace the entered identity
    ///
    /// A cycle already in flight keeps the identity and fee it was decided
    /// with.
    pub fn set_identity(&mut self, raw: &str) -> Option<FeeTicket> {
        let ticket = self.fees.set_identity(raw);
        debug!(
            service = "degen-sdk",
            component = "session",
            event = "identity_changed",
            identity = ?ticket.as_ref().map(|t| &t.identity),
            generation = self.fees.generation(),
        );
        ticket
    }

    /// Re-read every cached value for the acting account
    ///
    /// Reads run concurrently. A failed read leaves its value unknown and is
    /// logged; a failed subscription read keeps the previous record; only a missing program config is returned as an error.
    pub async fn refresh(&mut self) -> Result<()> {
        let owner = self.ledger.owner();
        let spender = self.ledger.spender();

        let (record, standard_fee, active, in_grace, balance, allowance) = tokio::join!(
            self.ledger.subscription(&owner),
            self.ledger.standard_fee(),
            self.ledger.is_active(&owner),
            self.ledger.is_in_grace_period(&owner),
            self.ledger.token_balance(&owner),
            self.ledger.allowance(&owner, &spender),
        );

        match record {
            Ok(record) => self.record = record,
            Err(e) => log_read_failure("subscription", &e),
        }
        self.active = active
            .inspect_err(|e| log_read_failure("is_active", e))
            .ok();
        self.in_grace_period = in_grace
            .inspect_err(|e| log_read_failure("is_in_grace_period", e))
            .ok();
        self.balance = balance
            .inspect_err(|e| log_read_failure("token_balance", e))
            .ok();
        self.allowance = allowance
            .inspect_err(|e| log_read_failure("allowance", e))
            .ok();

        match standard_fee {
            Ok(fee) => self.fees.set_standard_fee(fee),
            Err(e @ DegenError::NotInitialized(_)) => return Err(e),
            Err(e) => log_read_failure("standard_fee", &e),
        }

        debug!(
            service = "degen-sdk",
            component = "session",
            event = "refreshed",
            account = %owner,
            has_record = self.record.is_some(),
            active = ?self.active,
            balance = ?self.balance,
            allowance = ?self.allowance,
        );
        Ok(())
    }

    /// Resolve the fee for the entered identity
    ///
    /// # Errors
    /// [`DegenError::EmptyIdentity`] when no identity is entered,
    /// [`DegenError::UnresolvedFee`] when the ledger reports no fee and no
    /// standard fee is known. A failed fee read is returned as is and never
    /// replaced by the standard fee.
    pub async fn quote(&mut self) -> Result<FeeQuote> {
        let ticket = self.fees.ticket().ok_or(DegenError::EmptyIdentity)?;
        let read = self.read_effective_fee(&ticket.identity).await?;
        self.fees.complete(&ticket, read)
    }

    /// Snapshot of the cached values
    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            account: self.ledger.owner().to_string(),
            identity: self.fees.identity().map(str::to_string),
            record: self.record.clone(),
            active: self.active,
            in_grace_period: self.in_grace_period,
            balance: self.balance,
            allowance: self.allowance,
            standard_fee: self.fees.standard_fee(),
            quote: self.fees.quote(),
        }
    }

    /// Subscription record and activity flags for any account
    pub async fn lookup(&self, account: &Pubkey) -> Result<SubscriptionStatus> {
        let (record, active, in_grace_period) = tokio::join!(
            self.ledger.subscription(account),
            self.ledger.is_active(account),
            self.ledger.is_in_grace_period(account),
        );

        Ok(SubscriptionStatus {
            account: account.to_string(),
            record: record?,
            active: active?,
            in_grace_period: in_grace_period?,
        })
    }

    /// Whether the success notice of the last cycle is still visible
    pub fn success_visible(&self) -> bool {
        self.orchestrator.success_visible(Instant::now())
    }

    /// Start a new subscription for the entered identity
    ///
    /// Issues either the subscribe write or the approval; see [`Step`].
    pub async fn start_subscribe(&mut self) -> Result<Step> {
        if self.orchestrator.is_busy() {
            return Err(DegenError::FlowInProgress);
        }
        let ticket = self.fees.ticket().ok_or(DegenError::EmptyIdentity)?;
        let action = PayingAction::Subscribe {
            identity: ticket.identity.clone(),
        };
        self.start(action, Some(ticket)).await
    }

    /// Start a renewal of the existing subscription
    ///
    /// The fee is resolved for the identity stored on the record, not the
    /// entered one.
    pub async fn start_renew(&mut self) -> Result<Step> {
        if self.orchestrator.is_busy() {
            return Err(DegenError::FlowInProgress);
        }
        let owner = self.ledger.owner();
        let record = self
            .ledger
            .subscription(&owner)
            .await?
            .filter(SubscriptionRecord::has_identity)
            .ok_or(DegenError::NoSubscription)?;
        let action = PayingAction::Renew {
            identity: record.identity.clone(),
        };
        self.record = Some(record);
        self.start(action, None).await
    }

    /// Subscribe and wait for the outcome
    pub async fn subscribe(&mut self) -> Result<Step> {
        match self.start_subscribe().await? {
            Step::ApprovalSubmitted { .. } => self.drive().await,
            step => Ok(step),
        }
    }

    /// Renew and wait for the outcome
    pub async fn renew(&mut self) -> Result<Step> {
        match self.start_renew().await? {
            Step::ApprovalSubmitted { .. } => self.drive().await,
            step => Ok(step),
        }
    }

    /// Continue the in-flight cycle until it settles or a wait runs out
    ///
    /// After [`Step::StillPending`] the pending action is kept; call again to
    /// keep waiting or [`Self::abandon`] to drop it.
    pub async fn drive(&mut self) -> Result<Step> {
        loop {
            match self.orchestrator.phase().clone() {
                Phase::Approving {
                    approval: Some(signature),
                } => {
                    let confirmation = self
                        .tracker
                        .wait_for_confirmation(
                            &self.ledger,
                            &signature,
                            self.config.confirmation_poll_interval,
                            self.config.confirmation_timeout,
                        )
                        .await?;

                    if confirmation != Confirmation::StillPending {
                        self.tracker.forget(&signature);
                    }

                    match confirmation {
                        Confirmation::Confirmed => {
                            if let Some(threshold) = self.orchestrator.on_approval_confirmed() {
                                self.watcher.start(threshold);
                            }
                        }
                        Confirmation::Failed(reason) => {
                            return Err(self
                                .fail(DegenError::WriteReverted {
                                    reason: Some(reason),
                                })
                                .await);
                        }
                        Confirmation::StillPending => {
                            return Ok(Step::StillPending {
                                stage: PendingStage::ApprovalConfirmation,
                            });
                        }
                    }
                }
                Phase::Approving { approval: None } => {
                    return Err(self
                        .fail(DegenError::Generic(
                            "approval was requested but never submitted".to_string(),
                        ))
                        .await);
                }
                Phase::AwaitingAllowance => return self.await_allowance().await,
                Phase::Idle | Phase::Executing { .. } | Phase::Settled(_) => {
                    return Ok(Step::Idle)
                }
            }
        }
    }

    /// Stop polling and drop any pending action
    ///
    /// Transactions already submitted complete on their own.
    pub fn abandon(&mut self) {
        self.watcher.stop();
        if let Some(bound) = self.orchestrator.abandon() {
            info!(
                service = "degen-sdk",
                component = "session",
                event = "pending_action_abandoned",
                action = %bound.action,
                fee = bound.fee,
            );
        }
    }

    async fn start(&mut self, action: PayingAction, ticket: Option<FeeTicket>) -> Result<Step> {
        let generation = self.orchestrator.begin_cycle();
        // Handles from earlier cycles are no longer awaited
        self.tracker.clear();
        let owner = self.ledger.owner();
        let spender = self.ledger.spender();

        let (fee_read, balance, allowance) = tokio::join!(
            self.read_effective_fee(action.identity()),
            self.ledger.token_balance(&owner),
            self.ledger.allowance(&owner, &spender),
        );

        self.balance = balance
            .inspect_err(|e| log_read_failure("token_balance", e))
            .ok();
        self.allowance = allowance
            .inspect_err(|e| log_read_failure("allowance", e))
            .ok();

        // Only a read that returned nothing may fall back to the standard fee
        let fee_read = match fee_read {
            Ok(read) => read,
            Err(e) => return Err(self.reject(e)),
        };

        let fee = match ticket {
            Some(ticket) => match self.fees.complete(&ticket, fee_read) {
                Ok(quote) => Some(quote.fee),
                Err(DegenError::UnresolvedFee) => None,
                Err(e) => return Err(self.reject(e)),
            },
            None => fee_read.or(self.fees.standard_fee()),
        };

        let inputs = DecisionInputs {
            generation,
            fee,
            balance: self.balance,
            allowance: self.allowance,
        };

        match self.orchestrator.decide(action, inputs) {
            Ok(command) => self.issue(command).await,
            Err(e) => Err(self.reject(e)),
        }
    }

    async fn await_allowance(&mut self) -> Result<Step> {
        if !self.watcher.is_active() {
            match self.orchestrator.pending().bound() {
                Some(bound) => self.watcher.start(bound.fee),
                None => return Ok(Step::Idle),
            }
        }

        let deadline = Instant::now()
            .checked_add(self.config.allowance_timeout)
            .unwrap_or_else(Instant::now);

        loop {
            let tick = tokio::select! {
                read = self.watcher.tick(&self.ledger) => Some(read),
                () = tokio::time::sleep_until(deadline) => None,
            };

            let Some(read) = tick else {
                self.watcher.stop();
                info!(
                    service = "degen-sdk",
                    component = "session",
                    event = "allowance_timeout",
                    timeout_secs = self.config.allowance_timeout.as_secs(),
                    "Authorization not visible yet, still pending"
                );
                return Ok(Step::StillPending {
                    stage: PendingStage::Allowance,
                });
            };

            match read {
                None => return Ok(Step::Idle),
                Some(Err(e)) => log_read_failure("allowance", &e),
                Some(Ok(value)) => {
                    self.allowance = Some(value);
                    if let Some(command) = self.orchestrator.on_allowance(value) {
                        self.watcher.stop();
                        return self.issue(command).await;
                    }
                }
            }
        }
    }

    async fn issue(&mut self, command: Command) -> Result<Step> {
        match command {
            Command::Approve { amount } => {
                let spender = self.ledger.spender();
                match self.ledger.approve(&spender, amount).await {
                    Ok(signature) => {
                        info!(
                            service = "degen-sdk",
                            component = "session",
                            event = "approval_submitted",
                            spender = %spender,
                            amount = amount,
                            signature = %signature,
                        );
                        self.tracker.track(signature);
                        self.orchestrator.on_approval_submitted(signature);
                        Ok(Step::ApprovalSubmitted { signature, amount })
                    }
                    Err(e) => Err(self.fail(e).await),
                }
            }
            Command::Execute(bound) => {
                let resumed = matches!(
                    self.orchestrator.phase(),
                    Phase::Executing { resumed: true }
                );
                let write = match &bound.action {
                    PayingAction::Subscribe { identity } => self.ledger.subscribe(identity).await,
                    PayingAction::Renew { .. } => self.ledger.renew().await,
                };
                match write {
                    Ok(signature) => {
                        info!(
                            service = "degen-sdk",
                            component = "session",
                            event = "action_submitted",
                            action = %bound.action,
                            fee = bound.fee,
                            resumed = resumed,
                            signature = %signature,
                        );
                        self.tracker.track(signature);
                        self.orchestrator.on_action_submitted(
                            bound.action.clone(),
                            signature,
                            self.config.success_display,
                        );
                        self.refresh_after_write().await;
                        Ok(Step::Submitted {
                            action: bound.action,
                            signature,
                            resumed,
                        })
                    }
                    Err(e) => Err(self.fail(e).await),
                }
            }
        }
    }

    /// Settle the cycle as failed and re-read ledger state
    async fn fail(&mut self, error: DegenError) -> DegenError {
        self.watcher.stop();
        self.orchestrator.on_failure(&error);
        self.refresh_after_write().await;
        error
    }

    /// Log a refusal that happened before any write
    fn reject(&self, error: DegenError) -> DegenError {
        if error.is_silent() {
            debug!(
                service = "degen-sdk",
                component = "session",
                event = "action_disabled",
                reason = %error,
            );
        } else {
            warn!(
                service = "degen-sdk",
                component = "session",
                event = "action_refused",
                error = %error,
                "Subscription action refused before submission"
            );
        }
        error
    }

    async fn refresh_after_write(&mut self) {
        if let Err(e) = self.refresh().await {
            log_read_failure("refresh", &e);
        }
    }

    async fn read_effective_fee(&self, identity: &str) -> Result<Option<u64>> {
        self.ledger
            .effective_fee(identity)
            .await
            .inspect_err(|e| log_read_failure("effective_fee", e))
    }
}

fn log_read_failure(read: &str, error: &DegenError) {
    warn!(
        service = "degen-sdk",
        component = "session",
        event = "read_failed",
        read = read,
        error = %error,
        "Ledger read failed"
    );
}
