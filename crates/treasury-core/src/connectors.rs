use crate::types::Principal;
use thiserror::Error;

/// Failure surfaced by the external asset ledger.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("insufficient funds in source account '{0}'")]
    InsufficientFunds(String),

    #[error("transfer rejected: {0}")]
    Rejected(String),
}

/// External asset-ledger collaborator.
///
/// The one call the engine makes outside its own state. A transfer must be
/// atomic: it either moves the full amount or moves nothing, and a failure
/// aborts the surrounding operation before any bookkeeping is committed.
pub trait LedgerConnector: Send + Sync {
    fn transfer(
        &self,
        amount_minor: u64,
        from: &Principal,
        to: &Principal,
    ) -> Result<(), TransferError>;
}
