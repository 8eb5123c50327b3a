//! Ledger connector adapters for the treasury engine.

#![deny(unsafe_code)]

use std::sync::Mutex;
use treasury_core::{LedgerConnector, Principal, TransferError};

/// One settled transfer as seen by the external ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettledTransfer {
    pub amount_minor: u64,
    pub from: Principal,
    pub to: Principal,
}

/// In-memory ledger that settles every transfer and records it for
/// assertions and demo reporting.
#[derive(Debug, Default)]
pub struct RecordingLedgerConnector {
    transfers: Mutex<Vec<SettledTransfer>>,
}

impl RecordingLedgerConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn settled(&self) -> Vec<SettledTransfer> {
        self.transfers
            .lock()
            .expect("transfer log lock poisoned")
            .clone()
    }

    pub fn settled_count(&self) -> usize {
        self.transfers
            .lock()
            .expect("transfer log lock poisoned")
            .len()
    }
}

impl LedgerConnector for RecordingLedgerConnector {
    fn transfer(
        &self,
        amount_minor: u64,
        from: &Principal,
        to: &Principal,
    ) -> Result<(), TransferError> {
        self.transfers
            .lock()
            .expect("transfer log lock poisoned")
            .push(SettledTransfer {
                amount_minor,
                from: from.clone(),
                to: to.clone(),
            });
        Ok(())
    }
}

/// Deterministic failing ledger useful for chaos testing the abort paths.
#[derive(Debug, Clone)]
pub struct AlwaysFailLedgerConnector {
    reason: String,
}

impl AlwaysFailLedgerConnector {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl LedgerConnector for AlwaysFailLedgerConnector {
    fn transfer(
        &self,
        _amount_minor: u64,
        _from: &Principal,
        _to: &Principal,
    ) -> Result<(), TransferError> {
        Err(TransferError::Rejected(self.reason.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_connector_keeps_transfer_order() {
        let connector = RecordingLedgerConnector::new();
        connector
            .transfer(100, &Principal::from("alice"), &Principal::from("vault"))
            .unwrap();
        connector
            .transfer(40, &Principal::from("vault"), &Principal::from("vendor"))
            .unwrap();

        let settled = connector.settled();
        assert_eq!(settled.len(), 2);
        assert_eq!(settled[0].amount_minor, 100);
        assert_eq!(settled[1].to, Principal::from("vendor"));
    }

    #[test]
    fn always_fail_connector_rejects_with_reason() {
        let connector = AlwaysFailLedgerConnector::new("rail down");
        let err = connector
            .transfer(1, &Principal::from("a"), &Principal::from("b"))
            .unwrap_err();
        assert!(err.to_string().contains("rail down"));
    }
}
