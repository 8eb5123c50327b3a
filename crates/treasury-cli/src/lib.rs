//! Scenario runner for the treasury engine.
//!
//! A scenario is an ordered list of operations with explicit caller and
//! tick, applied against a fresh engine wired to an in-memory recording
//! ledger. Step failures are collected per step, batch-style, so a scenario
//! can exercise rejection paths as well as the happy path.

#![deny(unsafe_code)]

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use treasury_adapters::RecordingLedgerConnector;
use treasury_core::{
    CallContext, EngineConfig, Principal, Role, Tick, TreasuryEngine, TreasuryError, VaultStats,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ScenarioStep {
    AddMember {
        caller: String,
        at: Tick,
        member: String,
        role: String,
    },
    RemoveMember {
        caller: String,
        at: Tick,
        member: String,
    },
    UpdateRole {
        caller: String,
        at: Tick,
        member: String,
        role: String,
    },
    Deposit {
        caller: String,
        at: Tick,
        amount_minor: u64,
    },
    ConfigureLimit {
        caller: String,
        at: Tick,
        member: String,
        daily_minor: u64,
        monthly_minor: u64,
        total_minor: u64,
    },
    CreateProposal {
        caller: String,
        at: Tick,
        recipient: String,
        amount_minor: u64,
        description: String,
        expiry_delta: Tick,
    },
    Vote {
        caller: String,
        at: Tick,
        proposal_id: u64,
        approve: bool,
    },
    ExecuteProposal {
        caller: String,
        at: Tick,
        proposal_id: u64,
    },
    EmergencyWithdrawal {
        caller: String,
        at: Tick,
        recipient: String,
        amount_minor: u64,
        reason: String,
    },
    CreateRecurring {
        caller: String,
        at: Tick,
        recipient: String,
        amount_minor: u64,
        frequency: Tick,
        total_payments: u32,
        description: String,
    },
    ExecuteRecurring {
        caller: String,
        at: Tick,
        payment_id: u64,
    },
    ExecuteRecurringBatch {
        caller: String,
        at: Tick,
        payment_ids: Vec<u64>,
    },
    CancelRecurring {
        caller: String,
        at: Tick,
        payment_id: u64,
    },
    SetThreshold {
        caller: String,
        at: Tick,
        threshold: u64,
    },
    SetPaused {
        caller: String,
        at: Tick,
        paused: bool,
    },
}

impl ScenarioStep {
    fn op_name(&self) -> &'static str {
        match self {
            Self::AddMember { .. } => "add_member",
            Self::RemoveMember { .. } => "remove_member",
            Self::UpdateRole { .. } => "update_role",
            Self::Deposit { .. } => "deposit",
            Self::ConfigureLimit { .. } => "configure_limit",
            Self::CreateProposal { .. } => "create_proposal",
            Self::Vote { .. } => "vote",
            Self::ExecuteProposal { .. } => "execute_proposal",
            Self::EmergencyWithdrawal { .. } => "emergency_withdrawal",
            Self::CreateRecurring { .. } => "create_recurring",
            Self::ExecuteRecurring { .. } => "execute_recurring",
            Self::ExecuteRecurringBatch { .. } => "execute_recurring_batch",
            Self::CancelRecurring { .. } => "cancel_recurring",
            Self::SetThreshold { .. } => "set_threshold",
            Self::SetPaused { .. } => "set_paused",
        }
    }

    fn tick(&self) -> Tick {
        match self {
            Self::AddMember { at, .. }
            | Self::RemoveMember { at, .. }
            | Self::UpdateRole { at, .. }
            | Self::Deposit { at, .. }
            | Self::ConfigureLimit { at, .. }
            | Self::CreateProposal { at, .. }
            | Self::Vote { at, .. }
            | Self::ExecuteProposal { at, .. }
            | Self::EmergencyWithdrawal { at, .. }
            | Self::CreateRecurring { at, .. }
            | Self::ExecuteRecurring { at, .. }
            | Self::ExecuteRecurringBatch { at, .. }
            | Self::CancelRecurring { at, .. }
            | Self::SetThreshold { at, .. }
            | Self::SetPaused { at, .. } => *at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub steps: Vec<ScenarioStep>,
}

/// Per-step result, batch-style: a failed step never stops the run.
#[derive(Debug, Clone, Serialize)]
pub struct StepOutcome {
    pub index: usize,
    pub op: &'static str,
    pub ok: bool,
    pub detail: String,
}

#[derive(Debug, Serialize)]
pub struct ScenarioReport {
    pub steps: Vec<StepOutcome>,
    pub stats: VaultStats,
    pub history_len: u64,
    pub chain_verified: bool,
    pub settled_transfers: usize,
    pub burn_rate: u64,
    pub health_score: u8,
}

/// Run a scenario against a fresh engine and summarize the end state.
pub fn run_scenario(scenario: &Scenario) -> ScenarioReport {
    let ledger = Arc::new(RecordingLedgerConnector::new());
    let mut engine = TreasuryEngine::bootstrap(EngineConfig::default(), ledger.clone());

    let mut outcomes = Vec::with_capacity(scenario.steps.len());
    let mut last_tick = 0;
    for (index, step) in scenario.steps.iter().enumerate() {
        last_tick = last_tick.max(step.tick());
        let outcome = match apply_step(&mut engine, step) {
            Ok(detail) => StepOutcome {
                index,
                op: step.op_name(),
                ok: true,
                detail,
            },
            Err(err) => StepOutcome {
                index,
                op: step.op_name(),
                ok: false,
                detail: err.to_string(),
            },
        };
        outcomes.push(outcome);
    }

    ScenarioReport {
        steps: outcomes,
        stats: engine.vault_stats(),
        history_len: engine.history().len() as u64,
        chain_verified: engine.verify_history_chain(),
        settled_transfers: ledger.settled_count(),
        burn_rate: engine.burn_rate(last_tick),
        health_score: engine.health_score(last_tick),
    }
}

fn apply_step(engine: &mut TreasuryEngine, step: &ScenarioStep) -> Result<String, TreasuryError> {
    match step {
        ScenarioStep::AddMember {
            caller,
            at,
            member,
            role,
        } => {
            let role: Role = role.parse()?;
            let ctx = CallContext::new(caller.as_str(), *at);
            engine.add_member(&ctx, Principal::from(member.as_str()), role)?;
            Ok(format!("member '{member}' added as {}", role.name()))
        }
        ScenarioStep::RemoveMember { caller, at, member } => {
            let ctx = CallContext::new(caller.as_str(), *at);
            engine.remove_member(&ctx, &Principal::from(member.as_str()))?;
            Ok(format!("member '{member}' deactivated"))
        }
        ScenarioStep::UpdateRole {
            caller,
            at,
            member,
            role,
        } => {
            let role: Role = role.parse()?;
            let ctx = CallContext::new(caller.as_str(), *at);
            engine.update_role(&ctx, &Principal::from(member.as_str()), role)?;
            Ok(format!("member '{member}' now {}", role.name()))
        }
        ScenarioStep::Deposit {
            caller,
            at,
            amount_minor,
        } => {
            let ctx = CallContext::new(caller.as_str(), *at);
            engine.deposit(&ctx, *amount_minor)?;
            Ok(format!("deposited {amount_minor}"))
        }
        ScenarioStep::ConfigureLimit {
            caller,
            at,
            member,
            daily_minor,
            monthly_minor,
            total_minor,
        } => {
            let ctx = CallContext::new(caller.as_str(), *at);
            engine.configure_spending_limit(
                &ctx,
                Principal::from(member.as_str()),
                *daily_minor,
                *monthly_minor,
                *total_minor,
            )?;
            Ok(format!("spending limit configured for '{member}'"))
        }
        ScenarioStep::CreateProposal {
            caller,
            at,
            recipient,
            amount_minor,
            description,
            expiry_delta,
        } => {
            let ctx = CallContext::new(caller.as_str(), *at);
            let id = engine.create_proposal(
                &ctx,
                Principal::from(recipient.as_str()),
                *amount_minor,
                description.as_str(),
                *expiry_delta,
            )?;
            Ok(format!("proposal {id} created"))
        }
        ScenarioStep::Vote {
            caller,
            at,
            proposal_id,
            approve,
        } => {
            let ctx = CallContext::new(caller.as_str(), *at);
            engine.vote(&ctx, *proposal_id, *approve)?;
            Ok(format!("vote recorded on proposal {proposal_id}"))
        }
        ScenarioStep::ExecuteProposal {
            caller,
            at,
            proposal_id,
        } => {
            let ctx = CallContext::new(caller.as_str(), *at);
            engine.execute_proposal(&ctx, *proposal_id)?;
            Ok(format!("proposal {proposal_id} executed"))
        }
        ScenarioStep::EmergencyWithdrawal {
            caller,
            at,
            recipient,
            amount_minor,
            reason,
        } => {
            let ctx = CallContext::new(caller.as_str(), *at);
            let id = engine.emergency_withdrawal(
                &ctx,
                Principal::from(recipient.as_str()),
                *amount_minor,
                reason.as_str(),
            )?;
            Ok(format!("emergency proposal {id} created"))
        }
        ScenarioStep::CreateRecurring {
            caller,
            at,
            recipient,
            amount_minor,
            frequency,
            total_payments,
            description,
        } => {
            let ctx = CallContext::new(caller.as_str(), *at);
            let id = engine.create_recurring_payment(
                &ctx,
                Principal::from(recipient.as_str()),
                *amount_minor,
                *frequency,
                *total_payments,
                description.as_str(),
            )?;
            Ok(format!("recurring payment {id} created"))
        }
        ScenarioStep::ExecuteRecurring {
            caller,
            at,
            payment_id,
        } => {
            let ctx = CallContext::new(caller.as_str(), *at);
            engine.execute_recurring_payment(&ctx, *payment_id)?;
            Ok(format!("recurring payment {payment_id} executed"))
        }
        ScenarioStep::ExecuteRecurringBatch {
            caller,
            at,
            payment_ids,
        } => {
            let ctx = CallContext::new(caller.as_str(), *at);
            let outcomes = engine.execute_recurring_batch(&ctx, payment_ids)?;
            let executed = outcomes.iter().filter(|o| o.result.is_ok()).count();
            Ok(format!("batch executed {executed}/{} payments", outcomes.len()))
        }
        ScenarioStep::CancelRecurring {
            caller,
            at,
            payment_id,
        } => {
            let ctx = CallContext::new(caller.as_str(), *at);
            engine.cancel_recurring_payment(&ctx, *payment_id)?;
            Ok(format!("recurring payment {payment_id} cancelled"))
        }
        ScenarioStep::SetThreshold {
            caller,
            at,
            threshold,
        } => {
            let ctx = CallContext::new(caller.as_str(), *at);
            engine.set_signature_threshold(&ctx, *threshold)?;
            Ok(format!("signature threshold set to {threshold}"))
        }
        ScenarioStep::SetPaused { caller, at, paused } => {
            let ctx = CallContext::new(caller.as_str(), *at);
            engine.set_paused(&ctx, *paused)?;
            Ok(format!("paused set to {paused}"))
        }
    }
}

/// Built-in demo: fund the vault, run one proposal through approval and
/// execution, and let a recurring retainer fire once.
pub fn demo_scenario() -> Scenario {
    let admin = "treasury-admin".to_string();
    Scenario {
        steps: vec![
            ScenarioStep::AddMember {
                caller: admin.clone(),
                at: 0,
                member: "bob".to_string(),
                role: "signer".to_string(),
            },
            ScenarioStep::SetThreshold {
                caller: admin.clone(),
                at: 0,
                threshold: 1,
            },
            ScenarioStep::Deposit {
                caller: "alice".to_string(),
                at: 10,
                amount_minor: 50_000,
            },
            ScenarioStep::CreateProposal {
                caller: "bob".to_string(),
                at: 20,
                recipient: "vendor".to_string(),
                amount_minor: 4_000,
                description: "invoice 1042".to_string(),
                expiry_delta: 1_000,
            },
            ScenarioStep::Vote {
                caller: "bob".to_string(),
                at: 30,
                proposal_id: 1,
                approve: true,
            },
            ScenarioStep::ExecuteProposal {
                caller: "bob".to_string(),
                at: 40,
                proposal_id: 1,
            },
            ScenarioStep::CreateRecurring {
                caller: admin,
                at: 50,
                recipient: "contractor".to_string(),
                amount_minor: 1_500,
                frequency: 100,
                total_payments: 4,
                description: "ops retainer".to_string(),
            },
            ScenarioStep::ExecuteRecurring {
                caller: "keeper".to_string(),
                at: 150,
                payment_id: 1,
            },
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_scenario_runs_clean() {
        let report = run_scenario(&demo_scenario());

        assert!(report.steps.iter().all(|step| step.ok));
        assert_eq!(report.stats.balance_minor, 50_000 - 4_000 - 1_500);
        assert_eq!(report.stats.member_count, 2);
        assert_eq!(report.history_len, 3);
        assert!(report.chain_verified);
        assert_eq!(report.settled_transfers, 3);
    }

    #[test]
    fn failed_steps_are_reported_not_fatal() {
        let scenario = Scenario {
            steps: vec![
                ScenarioStep::Deposit {
                    caller: "alice".to_string(),
                    at: 0,
                    amount_minor: 0,
                },
                ScenarioStep::Deposit {
                    caller: "alice".to_string(),
                    at: 5,
                    amount_minor: 100,
                },
            ],
        };

        let report = run_scenario(&scenario);
        assert!(!report.steps[0].ok);
        assert!(report.steps[0].detail.contains("invalid amount"));
        assert!(report.steps[1].ok);
        assert_eq!(report.stats.balance_minor, 100);
    }

    #[test]
    fn scenario_steps_deserialize_from_tagged_json() {
        let raw = r#"{
            "steps": [
                {"op": "add_member", "caller": "treasury-admin", "at": 0,
                 "member": "bob", "role": "signer"},
                {"op": "deposit", "caller": "alice", "at": 5, "amount_minor": 250}
            ]
        }"#;

        let scenario: Scenario = serde_json::from_str(raw).unwrap();
        assert_eq!(scenario.steps.len(), 2);
        assert!(matches!(scenario.steps[0], ScenarioStep::AddMember { .. }));

        let report = run_scenario(&scenario);
        assert!(report.steps.iter().all(|step| step.ok));
    }

    #[test]
    fn unknown_role_is_surfaced_as_step_failure() {
        let scenario = Scenario {
            steps: vec![ScenarioStep::AddMember {
                caller: "treasury-admin".to_string(),
                at: 0,
                member: "bob".to_string(),
                role: "owner".to_string(),
            }],
        };

        let report = run_scenario(&scenario);
        assert!(!report.steps[0].ok);
        assert!(report.steps[0].detail.contains("invalid role"));
    }
}
