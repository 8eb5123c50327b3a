use crate::analytics::{
    ActivitySummary, AnalyticsBook, AnalyticsConfig, MemberStats, PeriodStats, TxDirection,
};
use crate::connectors::LedgerConnector;
use crate::error::TreasuryError;
use crate::history::{HistoryEntry, TransactionKind, TransactionLog};
use crate::limits::{LimitWindowConfig, SpendingLimit, SpendingLimitBook};
use crate::members::{Member, MemberRegistry, Role};
use crate::proposals::{Proposal, ProposalBook, ProposalKind, Vote};
use crate::recurring::{BatchOutcome, PaymentScheduler, RecurringPayment};
use crate::types::{CallContext, Principal, Tick, VaultStats};
use std::sync::Arc;
use tracing::{info, warn};

/// How an emergency withdrawal's seeded approval is represented.
///
/// `CounterOnly` reproduces the source behavior: the seed is a bare tally
/// increment and the proposing admin may still cast a normal vote later,
/// double-counting their approval. `RecordVote` writes a real vote record
/// at creation so a later vote fails `AlreadyVoted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmergencySeedVote {
    CounterOnly,
    RecordVote,
}

/// Engine configuration, fixed at bootstrap.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Principal seeded as the first Admin member.
    pub genesis_admin: Principal,
    /// Account the external ledger holds treasury funds under.
    pub vault_account: Principal,
    /// Signature threshold installed at deployment.
    pub initial_threshold: u64,
    /// Added on top of the live threshold for emergency withdrawals.
    pub emergency_threshold_bump: u64,
    /// Expiry window for emergency proposals, longer than typical payouts.
    pub emergency_expiry_window: Tick,
    pub emergency_seed_vote: EmergencySeedVote,
    /// Upper bound on batch execution list size.
    pub max_batch: usize,
    pub limit_windows: LimitWindowConfig,
    pub analytics: AnalyticsConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            genesis_admin: Principal::from("treasury-admin"),
            vault_account: Principal::from("treasury-vault"),
            initial_threshold: 2,
            emergency_threshold_bump: 2,
            emergency_expiry_window: 4_320,
            emergency_seed_vote: EmergencySeedVote::CounterOnly,
            max_batch: 20,
            limit_windows: LimitWindowConfig::default(),
            analytics: AnalyticsConfig::default(),
        }
    }
}

/// Treasury state-transition engine.
///
/// Owns every table and scalar of the vault and is the only mutation
/// surface. Operations run synchronously against `&mut self`; the single
/// external call is the ledger transfer, which gates all bookkeeping that
/// follows it. Each public operation takes a host-supplied [`CallContext`]
/// carrying the invoking principal and the current tick.
pub struct TreasuryEngine {
    registry: MemberRegistry,
    limits: SpendingLimitBook,
    proposals: ProposalBook,
    scheduler: PaymentScheduler,
    analytics: AnalyticsBook,
    history: TransactionLog,
    connector: Arc<dyn LedgerConnector>,
    balance_minor: u64,
    signature_threshold: u64,
    paused: bool,
    config: EngineConfig,
}

impl TreasuryEngine {
    /// Initialize the vault once at deployment: empty tables, the genesis
    /// admin registered, and the initial signature threshold installed.
    pub fn bootstrap(config: EngineConfig, connector: Arc<dyn LedgerConnector>) -> Self {
        info!(
            admin = %config.genesis_admin,
            threshold = config.initial_threshold,
            "bootstrapping treasury engine"
        );

        let mut registry = MemberRegistry::new();
        registry.seed_admin(config.genesis_admin.clone(), 0);

        Self {
            registry,
            limits: SpendingLimitBook::new(config.limit_windows),
            proposals: ProposalBook::new(),
            scheduler: PaymentScheduler::new(),
            analytics: AnalyticsBook::new(config.analytics),
            history: TransactionLog::new(),
            connector,
            balance_minor: 0,
            signature_threshold: config.initial_threshold,
            paused: false,
            config,
        }
    }

    // ---- gates -----------------------------------------------------------

    fn ensure_not_paused(&self) -> Result<(), TreasuryError> {
        if self.paused {
            return Err(TreasuryError::paused());
        }
        Ok(())
    }

    fn ensure_admin(&self, caller: &Principal) -> Result<(), TreasuryError> {
        if !self.registry.has_role(caller, Role::Admin) {
            return Err(TreasuryError::Unauthorized(format!(
                "'{caller}' lacks admin authority"
            )));
        }
        Ok(())
    }

    fn ensure_authorized(&self, caller: &Principal) -> Result<(), TreasuryError> {
        if !self.registry.is_authorized(caller) {
            return Err(TreasuryError::Unauthorized(format!(
                "'{caller}' is not an active signer"
            )));
        }
        Ok(())
    }

    fn transfer(
        &self,
        amount_minor: u64,
        from: &Principal,
        to: &Principal,
    ) -> Result<(), TreasuryError> {
        self.connector.transfer(amount_minor, from, to).map_err(|err| {
            warn!(%from, %to, amount_minor, %err, "ledger transfer failed");
            TreasuryError::ExecutionFailed(format!("ledger transfer failed: {err}"))
        })
    }

    // ---- member registry -------------------------------------------------

    pub fn add_member(
        &mut self,
        ctx: &CallContext,
        principal: Principal,
        role: Role,
    ) -> Result<(), TreasuryError> {
        self.ensure_not_paused()?;
        self.ensure_admin(&ctx.caller)?;
        self.registry.add(principal.clone(), role, ctx.now)?;
        info!(member = %principal, role = role.name(), "member added");
        Ok(())
    }

    pub fn remove_member(
        &mut self,
        ctx: &CallContext,
        principal: &Principal,
    ) -> Result<(), TreasuryError> {
        self.ensure_not_paused()?;
        self.ensure_admin(&ctx.caller)?;
        self.registry.deactivate(principal)?;
        info!(member = %principal, "member deactivated");
        Ok(())
    }

    pub fn update_role(
        &mut self,
        ctx: &CallContext,
        principal: &Principal,
        role: Role,
    ) -> Result<(), TreasuryError> {
        self.ensure_not_paused()?;
        self.ensure_admin(&ctx.caller)?;
        self.registry.set_role(principal, role, ctx.now)
    }

    // ---- administrative plumbing -----------------------------------------

    /// Toggle the global pause flag. Admin-only, and deliberately not gated
    /// on the pause flag itself so a paused vault can be resumed.
    pub fn set_paused(&mut self, ctx: &CallContext, paused: bool) -> Result<(), TreasuryError> {
        self.ensure_admin(&ctx.caller)?;
        self.paused = paused;
        info!(paused, "pause flag updated");
        Ok(())
    }

    /// Update the live signature threshold. Open proposals keep the
    /// threshold snapshotted at their creation.
    pub fn set_signature_threshold(
        &mut self,
        ctx: &CallContext,
        threshold: u64,
    ) -> Result<(), TreasuryError> {
        self.ensure_not_paused()?;
        self.ensure_admin(&ctx.caller)?;
        if threshold == 0 {
            return Err(TreasuryError::InvalidAmount(
                "signature threshold must be at least 1".to_string(),
            ));
        }
        self.signature_threshold = threshold;
        Ok(())
    }

    pub fn configure_spending_limit(
        &mut self,
        ctx: &CallContext,
        member: Principal,
        daily_limit_minor: u64,
        monthly_limit_minor: u64,
        total_limit_minor: u64,
    ) -> Result<(), TreasuryError> {
        self.ensure_not_paused()?;
        self.ensure_admin(&ctx.caller)?;
        let registered = self
            .registry
            .get(&member)
            .map(|record| record.active)
            .unwrap_or(false);
        if !registered {
            return Err(TreasuryError::missing_member(&member));
        }
        self.limits.configure(
            member,
            daily_limit_minor,
            monthly_limit_minor,
            total_limit_minor,
            ctx.now,
        );
        Ok(())
    }

    // ---- funds in --------------------------------------------------------

    /// Move funds from the caller into the vault through the external
    /// ledger and credit the treasury balance.
    pub fn deposit(&mut self, ctx: &CallContext, amount_minor: u64) -> Result<(), TreasuryError> {
        self.ensure_not_paused()?;
        if amount_minor == 0 {
            return Err(TreasuryError::InvalidAmount(
                "deposit amount must be positive".to_string(),
            ));
        }

        self.transfer(amount_minor, &ctx.caller, &self.config.vault_account)?;
        self.balance_minor = self.balance_minor.saturating_add(amount_minor);
        self.history.append(
            TransactionKind::Deposit,
            amount_minor,
            ctx.caller.clone(),
            self.config.vault_account.clone(),
            ctx.now,
            "deposit",
        );
        self.analytics
            .record_transaction(ctx.now, amount_minor, TxDirection::Inflow);
        info!(from = %ctx.caller, amount_minor, "deposit received");
        Ok(())
    }

    // ---- proposal engine -------------------------------------------------

    /// Create a payout proposal. The live signature threshold is
    /// snapshotted into the proposal; later threshold changes never
    /// retroactively affect it.
    pub fn create_proposal(
        &mut self,
        ctx: &CallContext,
        recipient: Principal,
        amount_minor: u64,
        description: impl Into<String>,
        expiry_delta: Tick,
    ) -> Result<u64, TreasuryError> {
        self.ensure_not_paused()?;
        self.ensure_authorized(&ctx.caller)?;
        if amount_minor == 0 {
            return Err(TreasuryError::InvalidAmount(
                "proposal amount must be positive".to_string(),
            ));
        }
        if expiry_delta == 0 {
            return Err(TreasuryError::InvalidAmount(
                "proposal expiry window must be positive".to_string(),
            ));
        }

        let id = self.proposals.create(
            ctx.caller.clone(),
            ProposalKind::Payout,
            recipient,
            amount_minor,
            description,
            ctx.now,
            ctx.now + expiry_delta,
            self.signature_threshold,
        );
        self.registry.touch(&ctx.caller, ctx.now);
        self.analytics
            .record_member_activity(&ctx.caller, ctx.now, amount_minor, 0, false, false);
        info!(proposal_id = id, proposer = %ctx.caller, amount_minor, "proposal created");
        Ok(id)
    }

    /// Admin shortcut that creates a pre-approved proposal under a raised
    /// vote bar: the tally is seeded with one approval and the required
    /// threshold is the live threshold plus the configured bump. Execution
    /// still goes through the normal gate.
    pub fn emergency_withdrawal(
        &mut self,
        ctx: &CallContext,
        recipient: Principal,
        amount_minor: u64,
        reason: impl Into<String>,
    ) -> Result<u64, TreasuryError> {
        self.ensure_not_paused()?;
        self.ensure_admin(&ctx.caller)?;
        if amount_minor == 0 {
            return Err(TreasuryError::InvalidAmount(
                "withdrawal amount must be positive".to_string(),
            ));
        }

        let id = self.proposals.create(
            ctx.caller.clone(),
            ProposalKind::Emergency,
            recipient,
            amount_minor,
            reason,
            ctx.now,
            ctx.now + self.config.emergency_expiry_window,
            self.signature_threshold + self.config.emergency_threshold_bump,
        );
        let proposal = self.proposals.get_mut(id).expect("proposal just created");
        proposal.votes_for = 1;
        if self.config.emergency_seed_vote == EmergencySeedVote::RecordVote {
            self.proposals
                .record_seed_vote(id, ctx.caller.clone(), ctx.now);
        }

        self.registry.touch(&ctx.caller, ctx.now);
        self.analytics
            .record_member_activity(&ctx.caller, ctx.now, amount_minor, 0, false, false);
        warn!(proposal_id = id, proposer = %ctx.caller, amount_minor, "emergency withdrawal proposed");
        Ok(id)
    }

    pub fn vote(
        &mut self,
        ctx: &CallContext,
        proposal_id: u64,
        approve: bool,
    ) -> Result<(), TreasuryError> {
        self.ensure_not_paused()?;
        self.ensure_authorized(&ctx.caller)?;
        self.proposals
            .vote(proposal_id, ctx.caller.clone(), approve, ctx.now)?;
        self.registry.touch(&ctx.caller, ctx.now);
        self.analytics
            .record_member_activity(&ctx.caller, ctx.now, 0, 0, true, false);
        Ok(())
    }

    /// Execute an approved proposal.
    ///
    /// Order is fixed: validate everything, perform the one external
    /// transfer, then commit bookkeeping. A transfer failure aborts the
    /// call with no state change.
    pub fn execute_proposal(
        &mut self,
        ctx: &CallContext,
        proposal_id: u64,
    ) -> Result<(), TreasuryError> {
        self.ensure_not_paused()?;
        self.ensure_authorized(&ctx.caller)?;

        let (amount_minor, recipient, kind, description) = {
            let proposal = self.proposals.ready_to_execute(proposal_id, ctx.now)?;
            (
                proposal.amount_minor,
                proposal.recipient.clone(),
                proposal.kind,
                proposal.description.clone(),
            )
        };
        if self.balance_minor < amount_minor {
            return Err(TreasuryError::InvalidAmount(format!(
                "treasury balance {} below proposal amount {amount_minor}",
                self.balance_minor
            )));
        }
        self.limits.validate(&ctx.caller, amount_minor, ctx.now)?;

        self.transfer(amount_minor, &self.config.vault_account, &recipient)?;

        self.balance_minor -= amount_minor;
        self.limits.consume(&ctx.caller, amount_minor, ctx.now);
        self.proposals
            .get_mut(proposal_id)
            .expect("proposal checked as executable")
            .executed = true;
        let tx_kind = match kind {
            ProposalKind::Payout => TransactionKind::ProposalPayout,
            ProposalKind::Emergency => TransactionKind::EmergencyPayout,
        };
        self.history.append(
            tx_kind,
            amount_minor,
            self.config.vault_account.clone(),
            recipient.clone(),
            ctx.now,
            description,
        );
        self.analytics
            .record_transaction(ctx.now, amount_minor, TxDirection::Outflow);
        self.analytics
            .record_member_activity(&ctx.caller, ctx.now, 0, amount_minor, false, true);
        self.registry.touch(&ctx.caller, ctx.now);
        info!(proposal_id, executor = %ctx.caller, %recipient, amount_minor, "proposal executed");
        Ok(())
    }

    /// Every execute-time precondition of [`execute_proposal`], evaluated
    /// without performing the execution.
    pub fn can_execute(&self, ctx: &CallContext, proposal_id: u64) -> bool {
        if self.paused || !self.registry.is_authorized(&ctx.caller) {
            return false;
        }
        self.proposals
            .ready_to_execute(proposal_id, ctx.now)
            .map(|proposal| {
                self.balance_minor >= proposal.amount_minor
                    && self
                        .limits
                        .validate(&ctx.caller, proposal.amount_minor, ctx.now)
                        .is_ok()
            })
            .unwrap_or(false)
    }

    // ---- recurring payments ----------------------------------------------

    pub fn create_recurring_payment(
        &mut self,
        ctx: &CallContext,
        recipient: Principal,
        amount_minor: u64,
        frequency: Tick,
        total_payments: u32,
        description: impl Into<String>,
    ) -> Result<u64, TreasuryError> {
        self.ensure_not_paused()?;
        self.ensure_admin(&ctx.caller)?;
        if amount_minor == 0 {
            return Err(TreasuryError::InvalidAmount(
                "payment amount must be positive".to_string(),
            ));
        }
        if frequency == 0 {
            return Err(TreasuryError::InvalidAmount(
                "payment frequency must be positive".to_string(),
            ));
        }
        if total_payments == 0 {
            return Err(TreasuryError::InvalidAmount(
                "total payment count must be positive".to_string(),
            ));
        }

        let id = self.scheduler.create(
            recipient,
            amount_minor,
            frequency,
            total_payments,
            ctx.caller.clone(),
            description,
            ctx.now,
        );
        info!(payment_id = id, creator = %ctx.caller, amount_minor, frequency, "recurring payment created");
        Ok(id)
    }

    /// Execute one due recurring payment. Callable by anyone: the series
    /// was pre-authorized at creation, so the only caller gate is the pause
    /// flag, and no spending limit is consulted or consumed.
    pub fn execute_recurring_payment(
        &mut self,
        ctx: &CallContext,
        payment_id: u64,
    ) -> Result<(), TreasuryError> {
        self.ensure_not_paused()?;

        let (amount_minor, recipient, description) = {
            let payment = self.scheduler.due_payment(payment_id, ctx.now)?;
            (
                payment.amount_minor,
                payment.recipient.clone(),
                payment.description.clone(),
            )
        };
        if self.balance_minor < amount_minor {
            return Err(TreasuryError::InvalidAmount(format!(
                "treasury balance {} below payment amount {amount_minor}",
                self.balance_minor
            )));
        }

        self.transfer(amount_minor, &self.config.vault_account, &recipient)?;

        self.balance_minor -= amount_minor;
        self.scheduler.mark_executed(payment_id);
        self.history.append(
            TransactionKind::RecurringPayout,
            amount_minor,
            self.config.vault_account.clone(),
            recipient.clone(),
            ctx.now,
            description,
        );
        self.analytics
            .record_transaction(ctx.now, amount_minor, TxDirection::Outflow);
        info!(payment_id, %recipient, amount_minor, "recurring payment executed");
        Ok(())
    }

    /// Attempt execution of each listed payment independently, collecting a
    /// per-id outcome. One stuck payment never blocks the rest.
    pub fn execute_recurring_batch(
        &mut self,
        ctx: &CallContext,
        payment_ids: &[u64],
    ) -> Result<Vec<BatchOutcome>, TreasuryError> {
        self.ensure_not_paused()?;
        if payment_ids.len() > self.config.max_batch {
            return Err(TreasuryError::InvalidAmount(format!(
                "batch of {} exceeds the {}-element bound",
                payment_ids.len(),
                self.config.max_batch
            )));
        }

        Ok(payment_ids
            .iter()
            .map(|&payment_id| BatchOutcome {
                payment_id,
                result: self.execute_recurring_payment(ctx, payment_id),
            })
            .collect())
    }

    /// Cancel a series. Only an admin or the original creator may cancel;
    /// cancellation is permanent.
    pub fn cancel_recurring_payment(
        &mut self,
        ctx: &CallContext,
        payment_id: u64,
    ) -> Result<(), TreasuryError> {
        self.ensure_not_paused()?;
        let payment = self
            .scheduler
            .get(payment_id)
            .ok_or_else(|| TreasuryError::missing_payment(payment_id))?;
        let allowed = payment.created_by == ctx.caller
            || self.registry.has_role(&ctx.caller, Role::Admin);
        if !allowed {
            return Err(TreasuryError::Unauthorized(format!(
                "'{}' is neither an admin nor the creator of payment {payment_id}",
                ctx.caller
            )));
        }
        self.scheduler.cancel(payment_id)?;
        info!(payment_id, cancelled_by = %ctx.caller, "recurring payment cancelled");
        Ok(())
    }

    /// Freeze the whole schedule: walk every series in id order and
    /// deactivate the active ones. Returns how many were frozen.
    pub fn deactivate_all_payments(&mut self, ctx: &CallContext) -> Result<u64, TreasuryError> {
        self.ensure_not_paused()?;
        self.ensure_admin(&ctx.caller)?;
        let frozen = self.scheduler.deactivate_all();
        info!(frozen, "all recurring payments deactivated");
        Ok(frozen)
    }

    // ---- read queries ----------------------------------------------------

    pub fn member(&self, principal: &Principal) -> Option<&Member> {
        self.registry.get(principal)
    }

    pub fn is_authorized(&self, principal: &Principal) -> bool {
        self.registry.is_authorized(principal)
    }

    pub fn proposal(&self, id: u64) -> Option<&Proposal> {
        self.proposals.get(id)
    }

    pub fn vote_record(&self, proposal_id: u64, voter: &Principal) -> Option<&Vote> {
        self.proposals.vote_record(proposal_id, voter)
    }

    pub fn spending_limit(&self, member: &Principal) -> Option<&SpendingLimit> {
        self.limits.get(member)
    }

    pub fn remaining_daily_limit(&self, member: &Principal, now: Tick) -> u64 {
        self.limits.remaining_daily(member, now)
    }

    pub fn recurring_payment(&self, id: u64) -> Option<&RecurringPayment> {
        self.scheduler.get(id)
    }

    pub fn history(&self) -> &[HistoryEntry] {
        self.history.entries()
    }

    pub fn history_entry(&self, index: u64) -> Option<&HistoryEntry> {
        self.history.get(index)
    }

    pub fn verify_history_chain(&self) -> bool {
        self.history.verify_chain()
    }

    pub fn period_stats(&self, period_index: u64) -> Option<&PeriodStats> {
        self.analytics.period(period_index)
    }

    pub fn member_stats(&self, member: &Principal) -> Option<&MemberStats> {
        self.analytics.member(member)
    }

    pub fn activity_summary(&self, member: &Principal) -> Result<ActivitySummary, TreasuryError> {
        self.analytics.activity_summary(member)
    }

    pub fn burn_rate(&self, now: Tick) -> u64 {
        self.analytics.burn_rate(now)
    }

    pub fn health_score(&self, now: Tick) -> u8 {
        self.analytics.health_score(self.balance_minor, now)
    }

    pub fn treasury_balance(&self) -> u64 {
        self.balance_minor
    }

    pub fn signature_threshold(&self) -> u64 {
        self.signature_threshold
    }

    pub fn paused(&self) -> bool {
        self.paused
    }

    pub fn vault_stats(&self) -> VaultStats {
        VaultStats {
            member_count: self.registry.active_count(),
            signature_threshold: self.signature_threshold,
            balance_minor: self.balance_minor,
            proposal_count: self.proposals.count(),
            paused: self.paused,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectors::TransferError;

    /// Connector that settles every transfer.
    struct StaticLedger;

    impl LedgerConnector for StaticLedger {
        fn transfer(
            &self,
            _amount_minor: u64,
            _from: &Principal,
            _to: &Principal,
        ) -> Result<(), TransferError> {
            Ok(())
        }
    }

    /// Connector that accepts deposits but rejects vault payouts.
    struct PayoutFailLedger {
        vault: Principal,
    }

    impl LedgerConnector for PayoutFailLedger {
        fn transfer(
            &self,
            _amount_minor: u64,
            from: &Principal,
            _to: &Principal,
        ) -> Result<(), TransferError> {
            if *from == self.vault {
                return Err(TransferError::Rejected("settlement rail down".to_string()));
            }
            Ok(())
        }
    }

    fn admin() -> CallContext {
        CallContext::new("treasury-admin", 0)
    }

    fn engine() -> TreasuryEngine {
        TreasuryEngine::bootstrap(EngineConfig::default(), Arc::new(StaticLedger))
    }

    /// Engine with admin + signer "bob", threshold 1, and a funded vault.
    fn funded_engine() -> TreasuryEngine {
        let mut engine = engine();
        engine
            .add_member(&admin(), Principal::from("bob"), Role::Signer)
            .unwrap();
        engine.set_signature_threshold(&admin(), 1).unwrap();
        engine
            .deposit(&CallContext::new("treasury-admin", 0), 10_000)
            .unwrap();
        engine
    }

    #[test]
    fn bootstrap_seeds_genesis_admin() {
        let engine = engine();
        let stats = engine.vault_stats();
        assert_eq!(stats.member_count, 1);
        assert_eq!(stats.signature_threshold, 2);
        assert_eq!(stats.balance_minor, 0);
        assert!(!stats.paused);
        assert!(engine.is_authorized(&Principal::from("treasury-admin")));
    }

    #[test]
    fn non_admin_cannot_mutate_membership() {
        let mut engine = funded_engine();
        let bob = CallContext::new("bob", 10);

        let err = engine
            .add_member(&bob, Principal::from("carol"), Role::Signer)
            .unwrap_err();
        assert!(matches!(err, TreasuryError::Unauthorized(_)));
    }

    #[test]
    fn proposal_keeps_threshold_snapshot_across_global_change() {
        let mut engine = funded_engine();
        let bob = CallContext::new("bob", 10);
        let id = engine
            .create_proposal(&bob, Principal::from("vendor"), 1_000, "invoice", 100)
            .unwrap();

        engine.set_signature_threshold(&admin(), 3).unwrap();
        assert_eq!(engine.proposal(id).unwrap().threshold_required, 1);

        engine.vote(&bob, id, true).unwrap();
        engine
            .execute_proposal(&CallContext::new("bob", 50), id)
            .unwrap();
        assert!(engine.proposal(id).unwrap().executed);
    }

    #[test]
    fn second_execution_fails_and_debits_once() {
        let mut engine = funded_engine();
        let bob = CallContext::new("bob", 10);
        let id = engine
            .create_proposal(&bob, Principal::from("vendor"), 1_000, "invoice", 100)
            .unwrap();
        engine.vote(&bob, id, true).unwrap();

        engine.execute_proposal(&bob, id).unwrap();
        assert_eq!(engine.treasury_balance(), 9_000);

        let err = engine.execute_proposal(&bob, id).unwrap_err();
        assert!(matches!(err, TreasuryError::ExecutionFailed(_)));
        assert_eq!(engine.treasury_balance(), 9_000);
        assert_eq!(engine.history().len(), 2); // one deposit, one payout
    }

    #[test]
    fn spending_limit_blocks_execution_without_side_effects() {
        let mut engine = funded_engine();
        let bob = CallContext::new("bob", 10);
        engine
            .configure_spending_limit(&admin(), Principal::from("bob"), 500, 5_000, 50_000)
            .unwrap();

        let id = engine
            .create_proposal(&bob, Principal::from("vendor"), 1_000, "invoice", 100)
            .unwrap();
        engine.vote(&bob, id, true).unwrap();

        let err = engine.execute_proposal(&bob, id).unwrap_err();
        assert!(matches!(err, TreasuryError::LimitExceeded(_)));

        // Nothing moved and nothing was consumed.
        assert_eq!(engine.treasury_balance(), 10_000);
        assert!(!engine.proposal(id).unwrap().executed);
        assert_eq!(engine.spending_limit(&Principal::from("bob")).unwrap().total_spent_minor, 0);
    }

    #[test]
    fn transfer_failure_leaves_no_partial_state() {
        let vault = Principal::from("treasury-vault");
        let mut engine = TreasuryEngine::bootstrap(
            EngineConfig::default(),
            Arc::new(PayoutFailLedger { vault }),
        );
        engine
            .add_member(&admin(), Principal::from("bob"), Role::Signer)
            .unwrap();
        engine.set_signature_threshold(&admin(), 1).unwrap();
        engine.deposit(&admin(), 10_000).unwrap();

        let bob = CallContext::new("bob", 10);
        let id = engine
            .create_proposal(&bob, Principal::from("vendor"), 1_000, "invoice", 100)
            .unwrap();
        engine.vote(&bob, id, true).unwrap();

        let err = engine.execute_proposal(&bob, id).unwrap_err();
        assert!(matches!(err, TreasuryError::ExecutionFailed(_)));
        assert_eq!(engine.treasury_balance(), 10_000);
        assert!(!engine.proposal(id).unwrap().executed);
        assert_eq!(engine.spending_limit(&Principal::from("bob")), None);
        // The proposal stays executable once the rail recovers.
        assert_eq!(engine.proposal(id).unwrap().votes_for, 1);
    }

    #[test]
    fn insufficient_treasury_balance_rejects_execution() {
        let mut engine = funded_engine();
        let bob = CallContext::new("bob", 10);
        let id = engine
            .create_proposal(&bob, Principal::from("vendor"), 50_000, "too big", 100)
            .unwrap();
        engine.vote(&bob, id, true).unwrap();

        let err = engine.execute_proposal(&bob, id).unwrap_err();
        assert!(matches!(err, TreasuryError::InvalidAmount(_)));
    }

    #[test]
    fn emergency_counter_only_seed_allows_proposer_double_vote() {
        let mut engine = funded_engine();
        let id = engine
            .emergency_withdrawal(&admin(), Principal::from("rescue"), 2_000, "incident")
            .unwrap();

        let proposal = engine.proposal(id).unwrap();
        assert_eq!(proposal.kind, ProposalKind::Emergency);
        assert_eq!(proposal.votes_for, 1);
        assert_eq!(proposal.threshold_required, 1 + 2);
        assert!(engine.vote_record(id, &Principal::from("treasury-admin")).is_none());

        // Source behavior: the seeded approval is a bare counter, so the
        // proposing admin can still cast a normal vote.
        engine.vote(&CallContext::new("treasury-admin", 20), id, true).unwrap();
        assert_eq!(engine.proposal(id).unwrap().votes_for, 2);
    }

    #[test]
    fn emergency_record_vote_seed_blocks_proposer_double_vote() {
        let mut engine = TreasuryEngine::bootstrap(
            EngineConfig {
                emergency_seed_vote: EmergencySeedVote::RecordVote,
                ..EngineConfig::default()
            },
            Arc::new(StaticLedger),
        );
        let id = engine
            .emergency_withdrawal(&admin(), Principal::from("rescue"), 2_000, "incident")
            .unwrap();

        assert!(engine.vote_record(id, &Principal::from("treasury-admin")).is_some());
        let err = engine
            .vote(&CallContext::new("treasury-admin", 20), id, true)
            .unwrap_err();
        assert!(matches!(err, TreasuryError::AlreadyVoted { .. }));
    }

    #[test]
    fn recurring_payment_is_exempt_from_spending_limits() {
        let mut engine = funded_engine();
        engine
            .configure_spending_limit(&admin(), Principal::from("bob"), 10, 10, 10)
            .unwrap();
        let id = engine
            .create_recurring_payment(
                &admin(),
                Principal::from("contractor"),
                2_500,
                100,
                3,
                "retainer",
            )
            .unwrap();

        // bob's tight limit is irrelevant: the series was pre-authorized.
        engine
            .execute_recurring_payment(&CallContext::new("bob", 100), id)
            .unwrap();
        assert_eq!(engine.treasury_balance(), 7_500);
        assert_eq!(
            engine.spending_limit(&Principal::from("bob")).unwrap().total_spent_minor,
            0
        );
    }

    #[test]
    fn batch_execution_collects_independent_outcomes() {
        let mut engine = funded_engine();
        let due = engine
            .create_recurring_payment(&admin(), Principal::from("a"), 100, 50, 2, "a")
            .unwrap();
        let not_due = engine
            .create_recurring_payment(&admin(), Principal::from("b"), 100, 500, 2, "b")
            .unwrap();

        let outcomes = engine
            .execute_recurring_batch(&CallContext::new("anyone", 60), &[due, not_due, 99])
            .unwrap();

        assert_eq!(outcomes.len(), 3);
        assert!(outcomes[0].result.is_ok());
        assert!(matches!(
            outcomes[1].result,
            Err(TreasuryError::ExecutionFailed(_))
        ));
        assert!(matches!(outcomes[2].result, Err(TreasuryError::NotFound(_))));
        assert_eq!(engine.treasury_balance(), 9_900);
    }

    #[test]
    fn oversized_batch_is_rejected() {
        let mut engine = funded_engine();
        let ids: Vec<u64> = (1..=21).collect();
        let err = engine
            .execute_recurring_batch(&CallContext::new("anyone", 0), &ids)
            .unwrap_err();
        assert!(matches!(err, TreasuryError::InvalidAmount(_)));
    }

    #[test]
    fn cancel_requires_admin_or_creator() {
        let mut engine = funded_engine();
        let id = engine
            .create_recurring_payment(&admin(), Principal::from("a"), 100, 50, 2, "a")
            .unwrap();

        let err = engine
            .cancel_recurring_payment(&CallContext::new("bob", 10), id)
            .unwrap_err();
        assert!(matches!(err, TreasuryError::Unauthorized(_)));

        engine
            .cancel_recurring_payment(&admin(), id)
            .unwrap();
        assert!(!engine.recurring_payment(id).unwrap().active);
    }

    #[test]
    fn pause_blocks_every_mutator_until_resumed() {
        let mut engine = funded_engine();
        engine.set_paused(&admin(), true).unwrap();

        let bob = CallContext::new("bob", 10);
        assert!(matches!(
            engine.deposit(&bob, 100),
            Err(TreasuryError::Unauthorized(_))
        ));
        assert!(matches!(
            engine.create_proposal(&bob, Principal::from("v"), 100, "x", 10),
            Err(TreasuryError::Unauthorized(_))
        ));
        assert!(matches!(
            engine.add_member(&admin(), Principal::from("c"), Role::Viewer),
            Err(TreasuryError::Unauthorized(_))
        ));
        assert!(matches!(
            engine.execute_recurring_payment(&bob, 1),
            Err(TreasuryError::Unauthorized(_))
        ));

        // Unpausing is possible while paused, then operations resume.
        engine.set_paused(&admin(), false).unwrap();
        engine.deposit(&bob, 100).unwrap();
    }

    #[test]
    fn can_execute_mirrors_the_execution_gate() {
        let mut engine = funded_engine();
        let bob = CallContext::new("bob", 10);
        let id = engine
            .create_proposal(&bob, Principal::from("vendor"), 1_000, "invoice", 100)
            .unwrap();

        assert!(!engine.can_execute(&bob, id)); // below threshold
        engine.vote(&bob, id, true).unwrap();
        assert!(engine.can_execute(&bob, id));
        assert!(!engine.can_execute(&CallContext::new("stranger", 10), id));
        assert!(!engine.can_execute(&CallContext::new("bob", 200), id)); // expired

        engine.execute_proposal(&bob, id).unwrap();
        assert!(!engine.can_execute(&bob, id)); // terminal
    }

    #[test]
    fn viewer_cannot_propose_or_vote() {
        let mut engine = funded_engine();
        engine
            .add_member(&admin(), Principal::from("watcher"), Role::Viewer)
            .unwrap();
        let watcher = CallContext::new("watcher", 10);

        assert!(matches!(
            engine.create_proposal(&watcher, Principal::from("v"), 100, "x", 10),
            Err(TreasuryError::Unauthorized(_))
        ));
    }

    #[test]
    fn spending_limit_for_unknown_member_is_rejected() {
        let mut engine = funded_engine();
        let err = engine
            .configure_spending_limit(&admin(), Principal::from("ghost"), 1, 1, 1)
            .unwrap_err();
        assert!(matches!(err, TreasuryError::NotFound(_)));
    }
}
