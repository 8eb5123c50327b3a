use crate::error::TreasuryError;
use crate::types::{Principal, Tick};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalKind {
    Payout,
    Emergency,
}

/// Derived lifecycle state. `Approved` means enough votes to execute and not
/// yet past expiry; an open proposal below threshold stays votable until it
/// expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    Open,
    Approved,
    Expired,
    Executed,
}

/// A pending or resolved request to move treasury funds.
///
/// `threshold_required` is snapshotted at creation; later changes to the
/// global signature threshold never retouch an open proposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    pub id: u64,
    pub proposer: Principal,
    pub kind: ProposalKind,
    pub recipient: Principal,
    pub amount_minor: u64,
    pub description: String,
    pub votes_for: u64,
    pub votes_against: u64,
    pub executed: bool,
    pub created_at: Tick,
    pub expires_at: Tick,
    pub threshold_required: u64,
}

impl Proposal {
    pub fn is_expired(&self, now: Tick) -> bool {
        now >= self.expires_at
    }

    pub fn status(&self, now: Tick) -> ProposalStatus {
        if self.executed {
            ProposalStatus::Executed
        } else if self.is_expired(now) {
            ProposalStatus::Expired
        } else if self.votes_for >= self.threshold_required {
            ProposalStatus::Approved
        } else {
            ProposalStatus::Open
        }
    }
}

/// Write-once vote record; one per (proposal, member) pair, no change or
/// retraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub proposal_id: u64,
    pub voter: Principal,
    pub approve: bool,
    pub cast_at: Tick,
}

/// Proposal and vote tables with the per-proposal state machine:
/// Open -> (Approved | Expired) -> Executed.
#[derive(Debug, Default, Clone)]
pub struct ProposalBook {
    proposals: BTreeMap<u64, Proposal>,
    votes: BTreeMap<(u64, Principal), Vote>,
    next_id: u64,
}

impl ProposalBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new proposal and return its id. Ids are sequential from 1.
    /// Precondition validation (authorization, amounts) happens at the
    /// engine boundary.
    #[allow(clippy::too_many_arguments)]
    pub fn create(
        &mut self,
        proposer: Principal,
        kind: ProposalKind,
        recipient: Principal,
        amount_minor: u64,
        description: impl Into<String>,
        created_at: Tick,
        expires_at: Tick,
        threshold_required: u64,
    ) -> u64 {
        self.next_id += 1;
        let id = self.next_id;
        self.proposals.insert(
            id,
            Proposal {
                id,
                proposer,
                kind,
                recipient,
                amount_minor,
                description: description.into(),
                votes_for: 0,
                votes_against: 0,
                executed: false,
                created_at,
                expires_at,
                threshold_required,
            },
        );
        id
    }

    pub fn get(&self, id: u64) -> Option<&Proposal> {
        self.proposals.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: u64) -> Option<&mut Proposal> {
        self.proposals.get_mut(&id)
    }

    pub fn vote_record(&self, id: u64, voter: &Principal) -> Option<&Vote> {
        self.votes.get(&(id, voter.clone()))
    }

    pub fn count(&self) -> u64 {
        self.proposals.len() as u64
    }

    /// Record a vote. Votes are monotonic: once written they can be neither
    /// changed nor withdrawn.
    pub fn vote(
        &mut self,
        id: u64,
        voter: Principal,
        approve: bool,
        now: Tick,
    ) -> Result<(), TreasuryError> {
        let proposal = self
            .proposals
            .get_mut(&id)
            .ok_or_else(|| TreasuryError::missing_proposal(id))?;
        if proposal.executed {
            return Err(TreasuryError::ExecutionFailed(format!(
                "proposal {id} already executed"
            )));
        }
        if proposal.is_expired(now) {
            return Err(TreasuryError::Expired(format!(
                "proposal {id} expired at tick {}",
                proposal.expires_at
            )));
        }

        let key = (id, voter.clone());
        if self.votes.contains_key(&key) {
            return Err(TreasuryError::AlreadyVoted {
                proposal_id: id,
                voter: voter.to_string(),
            });
        }

        if approve {
            proposal.votes_for += 1;
        } else {
            proposal.votes_against += 1;
        }
        self.votes.insert(
            key,
            Vote {
                proposal_id: id,
                voter,
                approve,
                cast_at: now,
            },
        );
        Ok(())
    }

    /// Record the seeded approval of an emergency proposal as a real vote,
    /// without touching the already-seeded tally.
    pub(crate) fn record_seed_vote(&mut self, id: u64, voter: Principal, now: Tick) {
        self.votes.insert(
            (id, voter.clone()),
            Vote {
                proposal_id: id,
                voter,
                approve: true,
                cast_at: now,
            },
        );
    }

    /// Check every proposal-local execute precondition and return the
    /// proposal on success. Balance and spending-limit gates live at the
    /// engine boundary.
    pub fn ready_to_execute(&self, id: u64, now: Tick) -> Result<&Proposal, TreasuryError> {
        let proposal = self
            .proposals
            .get(&id)
            .ok_or_else(|| TreasuryError::missing_proposal(id))?;
        if proposal.executed {
            return Err(TreasuryError::ExecutionFailed(format!(
                "proposal {id} already executed"
            )));
        }
        if proposal.is_expired(now) {
            return Err(TreasuryError::Expired(format!(
                "proposal {id} expired at tick {}",
                proposal.expires_at
            )));
        }
        if proposal.votes_for < proposal.threshold_required {
            return Err(TreasuryError::InsufficientVotes {
                have: proposal.votes_for,
                need: proposal.threshold_required,
            });
        }
        Ok(proposal)
    }
}
