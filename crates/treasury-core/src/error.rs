use thiserror::Error;

/// Treasury engine errors.
///
/// Every public operation returns exactly one of these kinds; there is no
/// silent recovery, and a failed operation leaves no partial state behind.
#[derive(Debug, Error)]
pub enum TreasuryError {
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("invalid role: {0}")]
    InvalidRole(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("member '{voter}' already voted on proposal {proposal_id}")]
    AlreadyVoted { proposal_id: u64, voter: String },

    #[error("expired: {0}")]
    Expired(String),

    #[error("insufficient votes: have {have}, need {need}")]
    InsufficientVotes { have: u64, need: u64 },

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("execution failed: {0}")]
    ExecutionFailed(String),

    #[error("spending limit exceeded: {0}")]
    LimitExceeded(String),
}

impl TreasuryError {
    pub fn paused() -> Self {
        Self::Unauthorized("treasury is paused".to_string())
    }

    pub fn missing_member(principal: impl std::fmt::Display) -> Self {
        Self::NotFound(format!("member '{principal}'"))
    }

    pub fn missing_proposal(id: u64) -> Self {
        Self::NotFound(format!("proposal {id}"))
    }

    pub fn missing_payment(id: u64) -> Self {
        Self::NotFound(format!("recurring payment {id}"))
    }
}
