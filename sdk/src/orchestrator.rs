//! Approve-then-act state machine for subscribe and renew
//!
//! The orchestrator performs no I/O. The session feeds it read results and
//! write outcomes, and it answers with the next [`Command`] to issue.
//!
//! ```text
//! Idle ──decide──► Executing ─────────────────────────────► Settled
//!   │                  ▲
//!   └──► Approving ──► AwaitingAllowance ──on_allowance──┘
//! ```
//!
//! At most one [`PendingAction`] exists at a time. It is bound to the
//! identity and fee seen when the cycle was decided, and it is taken out of
//! the orchestrator in the same transition that emits the resumed
//! [`Command::Execute`], so a second sufficient allowance read finds nothing
//! to resume.

use crate::{
    balance::{Admission, BalanceGuard},
    error::{DegenError, Result},
    fee::Generation,
};
use anchor_client::solana_sdk::signature::Signature;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Paying write requested by the user
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PayingAction {
    /// New subscription bound to the entered identity
    Subscribe { identity: String },
    /// Renewal of the existing record, bound to its stored identity
    Renew { identity: String },
}

impl PayingAction {
    /// Identity the action pays for
    #[must_use]
    pub fn identity(&self) -> &str {
        match self {
            Self::Subscribe { identity } | Self::Renew { identity } => identity,
        }
    }

    /// Short name used in logs
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Subscribe { .. } => "subscribe",
            Self::Renew { .. } => "renew",
        }
    }
}

impl fmt::Display for PayingAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.kind(), self.identity())
    }
}

/// A paying action together with the fee it was decided at
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundAction {
    pub action: PayingAction,
    pub fee: u64,
}

/// The single in-flight action waiting for authorization
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum PendingAction {
    #[default]
    None,
    AwaitingApproval(BoundAction),
}

impl PendingAction {
    /// Bound action, if one is pending
    #[must_use]
    pub const fn bound(&self) -> Option<&BoundAction> {
        match self {
            Self::None => None,
            Self::AwaitingApproval(bound) => Some(bound),
        }
    }

    #[must_use]
    pub const fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

/// Terminal outcome of a cycle
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Settlement {
    /// The paying write was accepted for submission
    Success {
        action: PayingAction,
        signature: Signature,
        show_until: Instant,
    },
    /// The cycle failed; `message` is the single user-visible text
    Failure { message: String },
}

/// Where the current cycle stands
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Phase {
    #[default]
    Idle,
    /// Approval requested; `approval` is set once it was submitted
    Approving { approval: Option<Signature> },
    /// Approval confirmed; waiting for the authorization read to reflect it
    AwaitingAllowance,
    /// Paying write issued, either directly or resumed after approval
    Executing { resumed: bool },
    Settled(Settlement),
}

/// Reads joined for one decision, tagged with the cycle they belong to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DecisionInputs {
    pub generation: Generation,
    pub fee: Option<u64>,
    pub balance: Option<u64>,
    pub allowance: Option<u64>,
}

/// Next write to issue
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Authorize the spender for exactly `amount`
    Approve { amount: u64 },
    /// Issue the paying write
    Execute(BoundAction),
}

/// State machine deciding between direct execution and approve-then-resume
#[derive(Debug, Default)]
pub struct ActionOrchestrator {
    phase: Phase,
    pending: PendingAction,
    generation: Generation,
}

impl ActionOrchestrator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn phase(&self) -> &Phase {
        &self.phase
    }

    #[must_use]
    pub const fn pending(&self) -> &PendingAction {
        &self.pending
    }

    /// Whether a cycle is between decision and settlement
    #[must_use]
    pub const fn is_busy(&self) -> bool {
        matches!(
            self.phase,
            Phase::Approving { .. } | Phase::AwaitingAllowance | Phase::Executing { .. }
        ) || !self.pending.is_none()
    }

    /// Whether the authorization should be polled right now
    #[must_use]
    pub const fn should_poll(&self) -> bool {
        matches!(self.phase, Phase::AwaitingAllowance) && !self.pending.is_none()
    }

    /// Whether the success notice is still within its display window
    #[must_use]
    pub fn success_visible(&self, now: Instant) -> bool {
        matches!(&self.phase, Phase::Settled(Settlement::Success { show_until, .. }) if now < *show_until)
    }

    /// Start a new decision cycle
    ///
    /// Reads issued for earlier cycles become stale.
    pub fn begin_cycle(&mut self) -> Generation {
        self.generation = self.generation.saturating_add(1);
        self.generation
    }

    /// Decide how to carry out `action`
    ///
    /// The balance check runs before anything else is considered. On success
    /// the phase moves to `Executing` or `Approving` and the returned command
    /// must be issued by the caller.
    ///
    /// # Errors
    /// * [`DegenError::FlowInProgress`] - another cycle is still outstanding
    /// * [`DegenError::StaleRead`] - inputs belong to an older cycle
    /// * [`DegenError::UnresolvedFee`] - no fee is known
    /// * [`DegenError::InsufficientBalance`] - balance below fee; nothing changes
    /// * [`DegenError::NotReady`] - token balance unknown
    pub fn decide(&mut self, action: PayingAction, inputs: DecisionInputs) -> Result<Command> {
        if self.is_busy() {
            return Err(DegenError::FlowInProgress);
        }
        if inputs.generation != self.generation {
            return Err(DegenError::StaleRead(format!(
                "decision inputs from cycle {} but cycle {} is current",
                inputs.generation, self.generation
            )));
        }

        let fee = inputs.fee.ok_or(DegenError::UnresolvedFee)?;

        match BalanceGuard::check(Some(fee), inputs.balance).into_result()? {
            Admission::Accepted => {}
            Admission::Undecided | Admission::Rejected { .. } => {
                return Err(DegenError::NotReady("token balance".to_string()));
            }
        }

        let bound = BoundAction { action, fee };

        // An unknown authorization is treated as insufficient; approve replaces it
        if let Some(allowance) = inputs.allowance.filter(|allowance| *allowance >= fee) {
            info!(
                service = "degen-sdk",
                component = "orchestrator",
                event = "direct_execute",
                action = %bound.action,
                fee = fee,
                allowance = allowance,
                "Authorization covers the fee, executing directly"
            );
            self.phase = Phase::Executing { resumed: false };
            return Ok(Command::Execute(bound));
        }

        info!(
            service = "degen-sdk",
            component = "orchestrator",
            event = "approval_required",
            action = %bound.action,
            fee = fee,
            allowance = ?inputs.allowance,
            "Authorization below fee, requesting approval"
        );
        self.pending = PendingAction::AwaitingApproval(bound);
        self.phase = Phase::Approving { approval: None };
        Ok(Command::Approve { amount: fee })
    }

    /// The approval write was submitted
    pub fn on_approval_submitted(&mut self, signature: Signature) {
        if let Phase::Approving { approval } = &mut self.phase {
            debug!(
                service = "degen-sdk",
                component = "orchestrator",
                event = "approval_submitted",
                signature = %signature,
            );
            *approval = Some(signature);
        }
    }

    /// The approval reached confirmed commitment
    ///
    /// Returns the fee the authorization must reach, which is the threshold
    /// for the allowance watcher.
    pub fn on_approval_confirmed(&mut self) -> Option<u64> {
        if !matches!(self.phase, Phase::Approving { .. }) {
            return None;
        }
        let fee = self.pending.bound()?.fee;
        info!(
            service = "degen-sdk",
            component = "orchestrator",
            event = "approval_confirmed",
            threshold = fee,
            "Approval confirmed, watching authorization"
        );
        self.phase = Phase::AwaitingAllowance;
        Some(fee)
    }

    /// A freshly read authorization value
    ///
    /// The first value at or above the bound fee takes the pending action
    /// and returns it for execution. Any later call returns `None`.
    pub fn on_allowance(&mut self, allowance: u64) -> Option<Command> {
        if !matches!(self.phase, Phase::AwaitingAllowance) {
            return None;
        }
        let fee = self.pending.bound()?.fee;
        if allowance < fee {
            return None;
        }

        let PendingAction::AwaitingApproval(bound) = std::mem::take(&mut self.pending) else {
            return None;
        };
        self.phase = Phase::Executing { resumed: true };
        info!(
            service = "degen-sdk",
            component = "orchestrator",
            event = "resume",
            action = %bound.action,
            fee = bound.fee,
            allowance = allowance,
            "Authorization sufficient, resuming pending action"
        );
        Some(Command::Execute(bound))
    }

    /// The paying write was submitted
    pub fn on_action_submitted(
        &mut self,
        action: PayingAction,
        signature: Signature,
        display_for: Duration,
    ) {
        let now = Instant::now();
        let show_until = now.checked_add(display_for).unwrap_or(now);
        info!(
            service = "degen-sdk",
            component = "orchestrator",
            event = "settled_success",
            action = %action,
            signature = %signature,
        );
        self.pending = PendingAction::None;
        self.phase = Phase::Settled(Settlement::Success {
            action,
            signature,
            show_until,
        });
    }

    /// Any write of the cycle failed or the signer refused
    ///
    /// Clears the pending action and settles with the error's user message.
    pub fn on_failure(&mut self, error: &DegenError) {
        warn!(
            service = "degen-sdk",
            component = "orchestrator",
            event = "settled_failure",
            phase = ?self.phase,
            pending = ?self.pending.bound().map(|bound| &bound.action),
            error = %error,
            "Subscription action failed"
        );
        self.pending = PendingAction::None;
        self.phase = Phase::Settled(Settlement::Failure {
            message: error.user_message(),
        });
    }

    /// Drop the in-flight cycle
    ///
    /// Already submitted transactions are not affected. Reads issued for the
    /// dropped cycle become stale.
    pub fn abandon(&mut self) -> Option<BoundAction> {
        let dropped = match std::mem::take(&mut self.pending) {
            PendingAction::None => None,
            PendingAction::AwaitingApproval(bound) => Some(bound),
        };
        if dropped.is_some() || self.is_busy() {
            info!(
                service = "degen-sdk",
                component = "orchestrator",
                event = "abandoned",
                phase = ?self.phase,
                action = ?dropped.as_ref().map(|bound| &bound.action),
            );
        }
        self.phase = Phase::Idle;
        self.generation = self.generation.saturating_add(1);
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEE: u64 = 15_000_000;

    fn subscribe(identity: &str) -> PayingAction {
        PayingAction::Subscribe {
            identity: identity.to_string(),
        }
    }

    fn inputs(generation: Generation, allowance: u64) -> DecisionInputs {
        DecisionInputs {
            generation,
            fee: Some(FEE),
            balance: Some(100_000_000),
            allowance: Some(allowance),
        }
    }

    #[test]
    fn test_direct_execute_when_authorized() {
        let mut orch = ActionOrchestrator::new();
        let generation = orch.begin_cycle();

        let command = orch.decide(subscribe("dave"), inputs(generation, FEE)).unwrap();
        assert_eq!(
            command,
            Command::Execute(BoundAction {
                action: subscribe("dave"),
                fee: FEE
            })
        );
        assert!(orch.pending().is_none());
        assert_eq!(orch.phase(), &Phase::Executing { resumed: false });
    }

    #[test]
    fn test_approval_for_exact_fee() {
        let mut orch = ActionOrchestrator::new();
        let generation = orch.begin_cycle();

        let command = orch.decide(subscribe("dave"), inputs(generation, 0)).unwrap();
        assert_eq!(command, Command::Approve { amount: FEE });
        assert!(!orch.pending().is_none());
        assert!(!orch.should_poll());
    }

    #[test]
    fn test_unknown_authorization_requests_approval() {
        let mut orch = ActionOrchestrator::new();
        let generation = orch.begin_cycle();

        let command = orch
            .decide(
                subscribe("dave"),
                DecisionInputs {
                    allowance: None,
                    ..inputs(generation, 0)
                },
            )
            .unwrap();
        assert_eq!(command, Command::Approve { amount: FEE });
        assert_eq!(orch.phase(), &Phase::Approving { approval: None });
    }

    #[test]
    fn test_resume_exactly_once() {
        let mut orch = ActionOrchestrator::new();
        let generation = orch.begin_cycle();
        orch.decide(subscribe("dave"), inputs(generation, 0)).unwrap();

        // Allowance reads before confirmation are not trusted
        assert_eq!(orch.on_allowance(FEE), None);

        orch.on_approval_submitted(Signature::from([7u8; 64]));
        assert_eq!(orch.on_approval_confirmed(), Some(FEE));
        assert!(orch.should_poll());

        assert_eq!(orch.on_allowance(FEE.saturating_sub(1)), None);
        assert!(matches!(orch.on_allowance(FEE), Some(Command::Execute(_))));
        assert_eq!(orch.on_allowance(FEE), None);
        assert!(orch.pending().is_none());
        assert!(!orch.should_poll());
    }

    #[test]
    fn test_stale_inputs_rejected() {
        let mut orch = ActionOrchestrator::new();
        let old = orch.begin_cycle();
        orch.begin_cycle();

        assert!(matches!(
            orch.decide(subscribe("dave"), inputs(old, 0)),
            Err(DegenError::StaleRead(_))
        ));
        assert_eq!(orch.phase(), &Phase::Idle);
    }

    #[test]
    fn test_insufficient_balance_changes_nothing() {
        let mut orch = ActionOrchestrator::new();
        let generation = orch.begin_cycle();
        let result = orch.decide(
            subscribe("dave"),
            DecisionInputs {
                generation,
                fee: Some(FEE),
                balance: Some(4_000_000),
                allowance: Some(0),
            },
        );

        assert!(matches!(
            result,
            Err(DegenError::InsufficientBalance {
                required: FEE,
                available: 4_000_000
            })
        ));
        assert!(orch.pending().is_none());
        assert_eq!(orch.phase(), &Phase::Idle);
    }

    #[test]
    fn test_unresolved_fee_blocks() {
        let mut orch = ActionOrchestrator::new();
        let generation = orch.begin_cycle();
        let mut unresolved = inputs(generation, 0);
        unresolved.fee = None;
        assert!(matches!(
            orch.decide(subscribe("dave"), unresolved),
            Err(DegenError::UnresolvedFee)
        ));
    }

    #[test]
    fn test_second_flow_refused_while_pending() {
        let mut orch = ActionOrchestrator::new();
        let generation = orch.begin_cycle();
        orch.decide(subscribe("alice"), inputs(generation, 0)).unwrap();

        let generation = orch.begin_cycle();
        assert!(matches!(
            orch.decide(subscribe("bob"), inputs(generation, 0)),
            Err(DegenError::FlowInProgress)
        ));
    }

    #[test]
    fn test_failure_clears_pending() {
        let mut orch = ActionOrchestrator::new();
        let generation = orch.begin_cycle();
        orch.decide(subscribe("dave"), inputs(generation, 0)).unwrap();

        orch.on_failure(&DegenError::AuthorizationRejectedBySigner);
        assert!(orch.pending().is_none());
        assert!(!orch.is_busy());
        assert!(matches!(
            orch.phase(),
            Phase::Settled(Settlement::Failure { .. })
        ));
    }

    #[test]
    fn test_abandon_clears_pending() {
        let mut orch = ActionOrchestrator::new();
        let generation = orch.begin_cycle();
        orch.decide(subscribe("dave"), inputs(generation, 0)).unwrap();
        orch.on_approval_confirmed();

        let dropped = orch.abandon().unwrap();
        assert_eq!(dropped.action, subscribe("dave"));
        assert!(!orch.should_poll());
        assert_eq!(orch.on_allowance(FEE), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_display_window() {
        let mut orch = ActionOrchestrator::new();
        let generation = orch.begin_cycle();
        orch.decide(subscribe("dave"), inputs(generation, FEE)).unwrap();
        orch.on_action_submitted(
            subscribe("dave"),
            Signature::from([9u8; 64]),
            Duration::from_secs(10),
        );

        assert!(orch.success_visible(Instant::now()));
        tokio::time::advance(Duration::from_secs(11)).await;
        assert!(!orch.success_visible(Instant::now()));
    }
}
